//! sdmmc-glue - SD/MMC command sequencing and SDIO transport for MCU hosts
//!
//! The crate sits between a host controller driver and card-level code:
//!
//! - [`drivers::sdmmc`] builds SD/MMC commands, runs them through an
//!   [`SdmmcHost`] and maps host and card errors to [`SdmmcError`].
//! - [`drivers::sdio`] serialises CMD52/CMD53 register and block I/O behind a
//!   bus lock and relays card interrupts to a client handler.
//!
//! The library is `no_std` and allocation free.

#![cfg_attr(not(test), no_std)]

pub mod drivers;
pub mod logger;

pub use drivers::sdio::irq::{CardInterruptControl, CardIrqHandler, CardIrqRelay};
pub use drivers::sdio::{IoRwFlags, SdioConfig, SdioDevice, SdioError};
pub use drivers::sdmmc::{
    Command, Data, DataBuffer, PresentStatus, ResponseType, SdmmcError, SdmmcHost, Transfer,
    TuningStatus,
};
