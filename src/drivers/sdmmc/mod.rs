//! SD/MMC Command Sequencing
//!
//! This module builds SD/MMC commands for the common card operations, runs
//! them through a host controller implementing [`SdmmcHost`] and maps host
//! failures and card error bits to [`SdmmcError`].
//!
//! Nothing here retries on its own except the single tuning window restart in
//! [`execute_tuning`]; callers decide how to recover.

pub mod command;
pub mod host;
pub mod regs;

#[cfg(test)]
pub(crate) mod mock;

use core::fmt;

use tock_registers::LocalRegisterCopy;

pub use command::{Command, Data, DataBuffer, ResponseType, Transfer};
pub use host::{PresentStatus, SdmmcHost, TuningStatus};

use regs::*;

/// SD/MMC error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdmmcError {
    /// Host transfer failed or the card reported an error bit
    TransferFailed,
    /// Card rejected a capability (APP_CMD not accepted)
    CardNotSupport,
    /// Data line handshake around CMD11 did not complete
    SwitchVoltageFail,
    /// No valid sampling point found
    TuningFail,
    /// Host controller initialization failed
    HostNotReady,
    /// Parameter cannot be encoded for this command
    InvalidArgument,
}

impl fmt::Display for SdmmcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::TransferFailed => "transfer failed",
            Self::CardNotSupport => "card does not support the command",
            Self::SwitchVoltageFail => "voltage switch failed",
            Self::TuningFail => "tuning failed",
            Self::HostNotReady => "host controller not ready",
            Self::InvalidArgument => "invalid argument",
        };
        f.write_str(msg)
    }
}

/// Card status word of an R1 response
pub type CardStatus = LocalRegisterCopy<u32, R1::Register>;

/// Run a transfer through the host.
///
/// Any host-level failure is reported as [`SdmmcError::TransferFailed`].
pub fn execute<H: SdmmcHost + ?Sized>(
    host: &mut H,
    transfer: &mut Transfer<'_>,
) -> Result<(), SdmmcError> {
    if let Err(e) = host.transfer(transfer) {
        log::debug!(
            "SDMMC: CMD{} arg={:#010x} failed: {}",
            transfer.command.index,
            transfer.command.argument,
            e
        );
        return Err(SdmmcError::TransferFailed);
    }
    Ok(())
}

/// Run a command-only transfer and return the completed command
fn execute_command<H: SdmmcHost + ?Sized>(
    host: &mut H,
    command: Command,
) -> Result<Command, SdmmcError> {
    let mut transfer = Transfer::command(command);
    execute(host, &mut transfer)?;
    Ok(transfer.command)
}

/// Reject an R1 response that carries any error flag
fn check_r1(command: &Command) -> Result<CardStatus, SdmmcError> {
    let status = command.response[0];
    if status & R1_ERROR_ALL != 0 {
        log::debug!("SDMMC: CMD{} R1 error flags {:#010x}", command.index, status);
        return Err(SdmmcError::TransferFailed);
    }
    Ok(CardStatus::new(status))
}

/// CMD7: select (`true`) or deselect the card at `rca`
pub fn select_card<H: SdmmcHost + ?Sized>(
    host: &mut H,
    rca: u16,
    select: bool,
) -> Result<(), SdmmcError> {
    let cmd = execute_command(host, Command::select_card(rca, select))?;
    // Deselect has no response; the word stays zero and passes the check.
    check_r1(&cmd)?;
    Ok(())
}

/// CMD55: announce an application-specific command.
///
/// Fails with [`SdmmcError::CardNotSupport`] when the card did not set
/// APP_CMD, which callers should treat as final rather than retry.
pub fn send_application_command<H: SdmmcHost + ?Sized>(
    host: &mut H,
    rca: u16,
) -> Result<(), SdmmcError> {
    let cmd = execute_command(host, Command::app_cmd(rca))?;
    let status = check_r1(&cmd)?;
    if !status.is_set(R1::APP_CMD) {
        log::debug!("SDMMC: card at RCA {:#06x} did not accept APP_CMD", rca);
        return Err(SdmmcError::CardNotSupport);
    }
    Ok(())
}

/// CMD23: block count for the next multi-block command
pub fn set_block_count<H: SdmmcHost + ?Sized>(
    host: &mut H,
    block_count: u32,
) -> Result<(), SdmmcError> {
    let cmd = execute_command(host, Command::set_block_count(block_count))?;
    check_r1(&cmd)?;
    Ok(())
}

/// CMD16: block length for block commands
pub fn set_block_size<H: SdmmcHost + ?Sized>(
    host: &mut H,
    block_size: u32,
) -> Result<(), SdmmcError> {
    let cmd = execute_command(host, Command::set_block_size(block_size))?;
    check_r1(&cmd)?;
    Ok(())
}

/// CMD0: reset every card to idle
pub fn go_idle<H: SdmmcHost + ?Sized>(host: &mut H) -> Result<(), SdmmcError> {
    execute_command(host, Command::go_idle())?;
    Ok(())
}

/// CMD0 with the pre-idle argument
pub fn go_pre_idle<H: SdmmcHost + ?Sized>(host: &mut H) -> Result<(), SdmmcError> {
    execute_command(host, Command::go_pre_idle())?;
    Ok(())
}

/// CMD15: move the card at `rca` to the inactive state
pub fn set_card_inactive<H: SdmmcHost + ?Sized>(host: &mut H, rca: u16) -> Result<(), SdmmcError> {
    execute_command(host, Command::go_inactive(rca))?;
    Ok(())
}

/// CMD11 plus the host side of the 1.8V signalling handshake.
///
/// After CMD11 the card drives DAT[3:0] low; once the host runs 1.8V clock the
/// card releases them. Either check failing is a hardware condition, not a
/// race worth retrying.
pub fn switch_voltage<H: SdmmcHost + ?Sized>(host: &mut H) -> Result<(), SdmmcError> {
    execute_command(host, Command::voltage_switch())?;

    host.enable_card_clock(false);

    let status = host.present_status();
    if status.intersects(PresentStatus::DATA_LINES) {
        log::debug!("SDMMC: data lines not held low after CMD11: {:?}", status);
        return Err(SdmmcError::SwitchVoltageFail);
    }

    host.select_1v8_signalling(true);
    host.delay_ms(VOLTAGE_SWITCH_SETTLE_MS);

    host.enable_card_clock(true);
    host.force_clock_on(true);
    host.delay_ms(VOLTAGE_SWITCH_CLOCK_MS);
    host.force_clock_on(false);

    let status = host.present_status();
    if !status.intersects(PresentStatus::DATA_LINES) {
        log::debug!("SDMMC: data lines not released after 1.8V switch");
        return Err(SdmmcError::SwitchVoltageFail);
    }

    Ok(())
}

/// Run standard tuning with `tuning_cmd` (CMD19 or CMD21).
///
/// The tuning window restarts at most once after a tuning error. Each window
/// is limited to [`TUNING_COMMAND_LIMIT`] commands; a host that never clears
/// its execute-tuning bit ends in [`SdmmcError::TuningFail`]. Standard tuning
/// is switched off again whenever a tuning command fails.
pub fn execute_tuning<H: SdmmcHost + ?Sized>(
    host: &mut H,
    tuning_cmd: u8,
    block_size: u32,
    tuning_start: u32,
    tuning_step: u32,
) -> Result<(), SdmmcError> {
    let len = block_size as usize;
    if len == 0 || len > MAX_TUNING_BLOCK_SIZE {
        return Err(SdmmcError::InvalidArgument);
    }

    let mut buffer = [0u8; MAX_TUNING_BLOCK_SIZE];
    let mut restart_available = true;
    let mut window_commands = 0u32;

    host.enable_standard_tuning(tuning_start, tuning_step, true);

    loop {
        if window_commands >= TUNING_COMMAND_LIMIT {
            log::debug!(
                "SDMMC: tuning still active after {} commands",
                TUNING_COMMAND_LIMIT
            );
            host.enable_standard_tuning(tuning_start, tuning_step, false);
            return Err(SdmmcError::TuningFail);
        }

        let mut data = Data::new(block_size, 1, DataBuffer::Read(&mut buffer[..len]));
        data.tuning = true;
        let mut transfer = Transfer::with_data(Command::send_tuning_block(tuning_cmd), data);
        if let Err(e) = execute(host, &mut transfer) {
            host.enable_standard_tuning(tuning_start, tuning_step, false);
            return Err(e);
        }
        window_commands += 1;

        host.delay_ms(TUNING_POLL_DELAY_MS);

        let status = host.tuning_status();
        if status.contains(TuningStatus::ACTIVE) {
            continue;
        }

        if status.contains(TuningStatus::ERROR) && restart_available {
            log::trace!("SDMMC: tuning error, restarting window at {}", tuning_start);
            restart_available = false;
            window_commands = 0;
            host.enable_standard_tuning(tuning_start, tuning_step, true);
            continue;
        }

        break;
    }

    if !host.tuning_status().contains(TuningStatus::SAMPLING_CLOCK_SELECTED) {
        log::debug!("SDMMC: tuning found no sampling point");
        return Err(SdmmcError::TuningFail);
    }

    Ok(())
}
