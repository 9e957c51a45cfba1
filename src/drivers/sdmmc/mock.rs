//! Scriptable host used by the unit tests

use std::collections::BTreeMap;
use std::vec::Vec;

use super::command::{Command, DataBuffer, ResponseType, Transfer};
use super::host::{PresentStatus, SdmmcHost, TuningStatus};
use super::regs::*;
use super::SdmmcError;

/// Data phase as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRecord {
    pub block_size: u32,
    pub block_count: u32,
    pub len: usize,
    pub read: bool,
    pub tuning: bool,
    pub segments: usize,
}

#[derive(Debug, Default)]
pub struct MockHost {
    /// Every command issued, in order
    pub commands: Vec<Command>,
    /// Every data phase issued, in order
    pub data: Vec<DataRecord>,
    /// Response word for commands that expect one (CMD52 data bits are added)
    pub response: u32,
    pub fail_transfer: bool,
    pub fail_init: bool,

    pub status_before_switch: PresentStatus,
    pub status_after_switch: PresentStatus,
    pub card_clock: bool,
    pub force_clock: bool,
    pub signalling_1v8: bool,
    pub delays: Vec<u32>,

    /// Tuning commands per window before the execute-tuning bit clears
    pub tuning_active_commands: u32,
    /// Number of windows that end with a tuning error
    pub tuning_errors: u32,
    pub tuning_result: bool,
    pub tuning_commands: u32,
    pub tuning_enables: u32,
    pub tuning_window: Option<(u32, u32)>,
    window_count: u32,
    window_error: bool,

    /// SDIO register file keyed by (function, address)
    pub registers: BTreeMap<(u8, u32), u8>,
    /// Byte written into every read buffer
    pub read_fill: u8,
    /// Bytes received by CMD53 writes
    pub written: Vec<u8>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            card_clock: true,
            ..Default::default()
        }
    }

    fn io_rw_direct(&mut self, command: &mut Command) {
        let arg = command.argument;
        let func = ((arg >> SDIO_ARG_FUNC_SHIFT) & 0x7) as u8;
        let addr = (arg >> SDIO_ARG_ADDR_SHIFT) & SDIO_MAX_ADDRESS;
        let reg = self.registers.entry((func, addr)).or_insert(0);
        if arg & SDIO_ARG_RW_FLAG != 0 {
            *reg = (arg & 0xFF) as u8;
        }
        command.response[0] = self.response | *reg as u32;
    }
}

impl SdmmcHost for MockHost {
    fn init(&mut self) -> Result<(), SdmmcError> {
        if self.fail_init {
            return Err(SdmmcError::HostNotReady);
        }
        Ok(())
    }

    fn transfer(&mut self, transfer: &mut Transfer<'_>) -> Result<(), SdmmcError> {
        self.commands.push(transfer.command);
        if self.fail_transfer {
            return Err(SdmmcError::TransferFailed);
        }

        if transfer.command.index == SDIO_CMD_IO_RW_DIRECT {
            self.io_rw_direct(&mut transfer.command);
        } else if transfer.command.response_type != ResponseType::None {
            transfer.command.response[0] = self.response;
        }

        if let Some(data) = transfer.data.as_mut() {
            let mut segments = 1;
            let fill = self.read_fill;
            match &mut data.buffer {
                DataBuffer::Read(buf) => buf.fill(fill),
                DataBuffer::Write(buf) => self.written.extend_from_slice(buf),
                #[cfg(feature = "scatter-gather")]
                DataBuffer::ReadSg(list) => {
                    segments = list.segments().len();
                    let src = std::vec![fill; list.total_len()];
                    list.scatter(&src);
                }
                #[cfg(feature = "scatter-gather")]
                DataBuffer::WriteSg(list) => {
                    segments = list.segments().len();
                    let mut dst = std::vec![0u8; list.total_len()];
                    list.gather(&mut dst);
                    self.written.extend_from_slice(&dst);
                }
            }
            self.data.push(DataRecord {
                block_size: data.block_size,
                block_count: data.block_count,
                len: data.buffer.len(),
                read: data.buffer.is_read(),
                tuning: data.tuning,
                segments,
            });
            if data.tuning {
                self.tuning_commands += 1;
                self.window_count = self.window_count.saturating_add(1);
            }
        }

        Ok(())
    }

    fn enable_card_clock(&mut self, enable: bool) {
        self.card_clock = enable;
    }

    fn force_clock_on(&mut self, enable: bool) {
        self.force_clock = enable;
    }

    fn present_status(&self) -> PresentStatus {
        if self.signalling_1v8 {
            self.status_after_switch
        } else {
            self.status_before_switch
        }
    }

    fn select_1v8_signalling(&mut self, enable: bool) {
        self.signalling_1v8 = enable;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }

    fn enable_standard_tuning(&mut self, start: u32, step: u32, enable: bool) {
        if !enable {
            self.tuning_window = None;
            return;
        }
        self.tuning_enables += 1;
        self.tuning_window = Some((start, step));
        self.window_count = 0;
        self.window_error = self.tuning_errors > 0;
        self.tuning_errors = self.tuning_errors.saturating_sub(1);
    }

    fn tuning_status(&self) -> TuningStatus {
        let mut status = TuningStatus::empty();
        if self.window_count < self.tuning_active_commands {
            status |= TuningStatus::ACTIVE;
            return status;
        }
        if self.window_error {
            status |= TuningStatus::ERROR;
        }
        if self.tuning_result {
            status |= TuningStatus::SAMPLING_CLOCK_SELECTED;
        }
        status
    }
}
