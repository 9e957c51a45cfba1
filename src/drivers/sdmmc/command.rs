//! Command and transfer descriptors
//!
//! A [`Command`] is built per operation, handed to the host inside a
//! [`Transfer`] and dropped once the response has been inspected. Data buffers
//! are borrowed for the duration of the transfer only.

use super::regs::*;

#[cfg(feature = "scatter-gather")]
use crate::drivers::sdio::sg::{RxSgList, TxSgList};

/// Expected response format of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    /// No response
    #[default]
    None,
    /// R1 - Normal response
    R1,
    /// R1b - Normal response with busy
    R1b,
    /// R2 - CID/CSD response (136 bits)
    R2,
    /// R3 - OCR response
    R3,
    /// R4 - IO_SEND_OP_COND response (SDIO)
    R4,
    /// R5 - IO_RW_DIRECT/EXTENDED response (SDIO)
    R5,
    /// R5b - R5 with busy
    R5b,
    /// R6 - RCA response (SD)
    R6,
    /// R7 - Card interface condition (SD)
    R7,
}

/// A single SD/MMC command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Command {
    /// Command index (0..=63)
    pub index: u8,
    /// 32-bit argument
    pub argument: u32,
    /// Expected response format
    pub response_type: ResponseType,
    /// Response words, filled in by the host
    pub response: [u32; 4],
}

impl Command {
    /// Create a command with a zeroed response
    pub const fn new(index: u8, argument: u32, response_type: ResponseType) -> Self {
        Self {
            index,
            argument,
            response_type,
            response: [0; 4],
        }
    }

    /// CMD0 with the normal reset argument
    pub const fn go_idle() -> Self {
        Self::new(MMC_CMD_GO_IDLE_STATE, 0, ResponseType::None)
    }

    /// CMD0 with the pre-idle argument
    pub const fn go_pre_idle() -> Self {
        Self::new(MMC_CMD_GO_IDLE_STATE, MMC_GO_PRE_IDLE_ARG, ResponseType::None)
    }

    /// CMD7; deselecting sends RCA 0 and expects no response
    pub const fn select_card(rca: u16, select: bool) -> Self {
        if select {
            Self::new(MMC_CMD_SELECT_CARD, (rca as u32) << RCA_SHIFT, ResponseType::R1)
        } else {
            Self::new(MMC_CMD_SELECT_CARD, 0, ResponseType::None)
        }
    }

    /// CMD55
    pub const fn app_cmd(rca: u16) -> Self {
        Self::new(MMC_CMD_APP_CMD, (rca as u32) << RCA_SHIFT, ResponseType::R1)
    }

    /// CMD15
    pub const fn go_inactive(rca: u16) -> Self {
        Self::new(MMC_CMD_GO_INACTIVE_STATE, (rca as u32) << RCA_SHIFT, ResponseType::None)
    }

    /// CMD23
    pub const fn set_block_count(count: u32) -> Self {
        Self::new(MMC_CMD_SET_BLOCK_COUNT, count, ResponseType::R1)
    }

    /// CMD16
    pub const fn set_block_size(size: u32) -> Self {
        Self::new(MMC_CMD_SET_BLOCKLEN, size, ResponseType::R1)
    }

    /// CMD11
    pub const fn voltage_switch() -> Self {
        Self::new(SD_CMD_SWITCH_UHS18V, 0, ResponseType::R1)
    }

    /// Tuning block read (CMD19 or CMD21)
    pub const fn send_tuning_block(index: u8) -> Self {
        Self::new(index, 0, ResponseType::R1)
    }

    /// CMD52
    pub const fn io_rw_direct(write: bool, func: u8, addr: u32, raw: bool, data: u8) -> Self {
        Self::new(
            SDIO_CMD_IO_RW_DIRECT,
            make_io_rw_direct_arg(write, func, addr, raw, data),
            ResponseType::R5,
        )
    }

    /// CMD53
    pub const fn io_rw_extended(write: bool, func: u8, addr: u32, flags: u32, count: u32) -> Self {
        Self::new(
            SDIO_CMD_IO_RW_EXTENDED,
            make_io_rw_extended_arg(write, func, addr, flags, count),
            ResponseType::R5,
        )
    }
}

/// Data phase buffer
#[derive(Debug)]
pub enum DataBuffer<'a> {
    /// Card-to-host into one buffer
    Read(&'a mut [u8]),
    /// Host-to-card from one buffer
    Write(&'a [u8]),
    /// Card-to-host into a segment list
    #[cfg(feature = "scatter-gather")]
    ReadSg(&'a RxSgList<'a>),
    /// Host-to-card from a segment list
    #[cfg(feature = "scatter-gather")]
    WriteSg(&'a TxSgList<'a>),
}

impl DataBuffer<'_> {
    /// `true` for card-to-host transfers
    pub fn is_read(&self) -> bool {
        match self {
            Self::Read(_) => true,
            Self::Write(_) => false,
            #[cfg(feature = "scatter-gather")]
            Self::ReadSg(_) => true,
            #[cfg(feature = "scatter-gather")]
            Self::WriteSg(_) => false,
        }
    }

    /// Total number of bytes described by the buffer
    pub fn len(&self) -> usize {
        match self {
            Self::Read(buf) => buf.len(),
            Self::Write(buf) => buf.len(),
            #[cfg(feature = "scatter-gather")]
            Self::ReadSg(list) => list.total_len(),
            #[cfg(feature = "scatter-gather")]
            Self::WriteSg(list) => list.total_len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Data phase of a transfer
#[derive(Debug)]
pub struct Data<'a> {
    /// Bytes per block
    pub block_size: u32,
    /// Number of blocks
    pub block_count: u32,
    /// Caller-owned buffer
    pub buffer: DataBuffer<'a>,
    /// Tuning block read; the host must not treat it as card data
    pub tuning: bool,
}

impl<'a> Data<'a> {
    pub fn new(block_size: u32, block_count: u32, buffer: DataBuffer<'a>) -> Self {
        Self {
            block_size,
            block_count,
            buffer,
            tuning: false,
        }
    }
}

/// Command plus optional data handed to [`SdmmcHost::transfer`](super::SdmmcHost::transfer)
#[derive(Debug)]
pub struct Transfer<'a> {
    pub command: Command,
    pub data: Option<Data<'a>>,
}

impl<'a> Transfer<'a> {
    /// Command-only transfer
    pub const fn command(command: Command) -> Self {
        Self {
            command,
            data: None,
        }
    }

    /// Transfer with a data phase
    pub fn with_data(command: Command, data: Data<'a>) -> Self {
        Self {
            command,
            data: Some(data),
        }
    }
}
