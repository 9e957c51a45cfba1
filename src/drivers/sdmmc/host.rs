//! Host controller capability interface
//!
//! Each host controller (uSDHC, SDHCI, SDIF, ...) implements [`SdmmcHost`]
//! once. The command layer never touches controller registers directly.

use super::command::Transfer;
use super::SdmmcError;

bitflags::bitflags! {
    /// Host present-state snapshot relevant to command sequencing
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PresentStatus: u32 {
        /// DAT0 is high (card not signalling busy)
        const DATA0_LEVEL = 1 << 0;
        /// DAT1 is high
        const DATA1_LEVEL = 1 << 1;
        /// DAT2 is high
        const DATA2_LEVEL = 1 << 2;
        /// DAT3 is high
        const DATA3_LEVEL = 1 << 3;
        /// CMD line is high
        const CMD_LEVEL = 1 << 4;
        /// Card inserted
        const CARD_INSERTED = 1 << 5;
    }
}

impl PresentStatus {
    /// Level bits of DAT[3:0]
    pub const DATA_LINES: Self = Self::DATA0_LEVEL
        .union(Self::DATA1_LEVEL)
        .union(Self::DATA2_LEVEL)
        .union(Self::DATA3_LEVEL);
}

bitflags::bitflags! {
    /// Standard tuning state reported by the host
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TuningStatus: u32 {
        /// Execute-tuning bit still set, more tuning blocks required
        const ACTIVE = 1 << 0;
        /// Host flagged a tuning error in the current window
        const ERROR = 1 << 1;
        /// Host switched to the tuned sampling clock
        const SAMPLING_CLOCK_SELECTED = 1 << 2;
    }
}

/// SD/MMC host controller capabilities
pub trait SdmmcHost {
    /// Bring the controller up. Called once when a device is created.
    fn init(&mut self) -> Result<(), SdmmcError> {
        Ok(())
    }

    /// Issue one command (and its data phase) and block until it completes.
    ///
    /// On success the host stores the response words in `transfer.command.response`.
    fn transfer(&mut self, transfer: &mut Transfer<'_>) -> Result<(), SdmmcError>;

    /// Gate the SD clock to the card
    fn enable_card_clock(&mut self, enable: bool);

    /// Keep the SD clock running even without a pending command
    fn force_clock_on(&mut self, enable: bool);

    /// Snapshot of the line levels and card presence
    fn present_status(&self) -> PresentStatus;

    /// Switch the bus signalling level to 1.8V (`true`) or back to 3.3V
    fn select_1v8_signalling(&mut self, enable: bool);

    /// Busy-wait for `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Start (or stop) standard tuning at delay `start`, advancing by `step`
    fn enable_standard_tuning(&mut self, start: u32, step: u32, enable: bool);

    /// Current standard tuning state
    fn tuning_status(&self) -> TuningStatus;
}
