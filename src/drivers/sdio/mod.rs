//! SDIO Register and Block I/O
//!
//! [`SdioDevice`] wraps a host controller in a mutex so that every CMD52
//! register access and every CMD53 block transfer owns the bus for the whole
//! transaction. Card interrupts are relayed separately by [`irq::CardIrqRelay`]
//! because they arrive in interrupt context where the bus lock must not be
//! taken.

pub mod irq;
#[cfg(feature = "scatter-gather")]
pub mod sg;

use core::fmt;
use core::num::NonZeroU32;

use spin::{Mutex, MutexGuard};
use tock_registers::LocalRegisterCopy;

use crate::drivers::sdmmc::regs::*;
use crate::drivers::sdmmc::{self, Command, Data, DataBuffer, SdmmcError, SdmmcHost, Transfer};

#[cfg(feature = "scatter-gather")]
use sg::{RxSgList, TxSgList};

/// SDIO error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdioError {
    /// Command failed on the bus or in the card
    Bus(SdmmcError),
    /// Function number outside 0..=7
    InvalidFunction,
    /// Register address wider than 17 bits
    InvalidAddress,
    /// Buffer length does not match the requested blocks
    InvalidLength,
    /// Bus lock not acquired within the configured attempts
    LockTimeout,
    /// Segment list is full
    SgOverflow,
}

impl From<SdmmcError> for SdioError {
    fn from(e: SdmmcError) -> Self {
        Self::Bus(e)
    }
}

impl fmt::Display for SdioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus error: {}", e),
            Self::InvalidFunction => f.write_str("invalid function number"),
            Self::InvalidAddress => f.write_str("invalid register address"),
            Self::InvalidLength => f.write_str("buffer length does not match transfer"),
            Self::LockTimeout => f.write_str("bus lock timeout"),
            Self::SgOverflow => f.write_str("scatter-gather list full"),
        }
    }
}

bitflags::bitflags! {
    /// CMD53 mode bits, placed at their argument positions
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct IoRwFlags: u32 {
        /// Count is in blocks instead of bytes
        const BLOCK_MODE = SDIO_ARG_BLOCK_MODE;
        /// Register address increments per byte
        const INCREMENT_ADDRESS = SDIO_ARG_OP_CODE;
    }
}

impl IoRwFlags {
    /// Mode flags for a transfer of `block_count` blocks
    pub fn for_transfer(block_count: u32, increment_address: bool) -> Self {
        let mut flags = Self::empty();
        if block_count > 1 {
            flags |= Self::BLOCK_MODE;
        }
        if increment_address {
            flags |= Self::INCREMENT_ADDRESS;
        }
        flags
    }
}

/// Runtime configuration of an [`SdioDevice`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SdioConfig {
    /// Use incrementing addresses for CMD53 (memory-like windows) instead of a fixed FIFO port
    pub increment_address: bool,
    /// Give up on the bus lock after this many attempts; `None` waits forever
    pub lock_attempts: Option<NonZeroU32>,
}

/// SDIO card behind a host controller
pub struct SdioDevice<H> {
    bus: Mutex<H>,
    config: SdioConfig,
}

impl<H: SdmmcHost> SdioDevice<H> {
    /// Initialize the host and wrap it.
    ///
    /// Any host init failure is reported as [`SdmmcError::HostNotReady`].
    pub fn new(mut host: H, config: SdioConfig) -> Result<Self, SdioError> {
        if let Err(e) = host.init() {
            log::error!("SDIO: host init failed: {}", e);
            return Err(SdmmcError::HostNotReady.into());
        }
        Ok(Self {
            bus: Mutex::new(host),
            config,
        })
    }

    /// Release the host controller
    pub fn into_inner(self) -> H {
        self.bus.into_inner()
    }

    /// Acquire the bus lock
    fn lock(&self) -> Result<MutexGuard<'_, H>, SdioError> {
        let Some(attempts) = self.config.lock_attempts else {
            return Ok(self.bus.lock());
        };
        for _ in 0..attempts.get() {
            if let Some(guard) = self.bus.try_lock() {
                return Ok(guard);
            }
            core::hint::spin_loop();
        }
        log::warn!("SDIO: bus lock not acquired after {} attempts", attempts);
        Err(SdioError::LockTimeout)
    }

    /// Run SD/MMC operations while holding the bus lock
    pub fn with_bus<R>(
        &self,
        f: impl FnOnce(&mut H) -> Result<R, SdmmcError>,
    ) -> Result<R, SdioError> {
        let mut host = self.lock()?;
        Ok(f(&mut *host)?)
    }

    /// CMD52 read of one register
    pub fn read_register(&self, func: u8, addr: u32) -> Result<u8, SdioError> {
        check_target(func, addr)?;
        let mut host = self.lock()?;
        io_rw_direct(&mut *host, Command::io_rw_direct(false, func, addr, false, 0))
    }

    /// CMD52 write of one register
    pub fn write_register(&self, func: u8, addr: u32, value: u8) -> Result<(), SdioError> {
        check_target(func, addr)?;
        let mut host = self.lock()?;
        io_rw_direct(&mut *host, Command::io_rw_direct(true, func, addr, false, value))?;
        Ok(())
    }

    /// CMD52 write with read-after-write; returns the register value after the write
    pub fn write_read_register(&self, func: u8, addr: u32, value: u8) -> Result<u8, SdioError> {
        check_target(func, addr)?;
        let mut host = self.lock()?;
        io_rw_direct(&mut *host, Command::io_rw_direct(true, func, addr, true, value))
    }

    /// CMD53 read of `block_count` blocks of `block_size` bytes into `buf`
    pub fn read_blocks(
        &self,
        func: u8,
        addr: u32,
        block_count: u32,
        block_size: u32,
        buf: &mut [u8],
    ) -> Result<(), SdioError> {
        let len = check_extended(func, addr, block_count, block_size, buf.len())?;
        let flags = IoRwFlags::for_transfer(block_count, self.config.increment_address);
        let mut host = self.lock()?;

        if !flags.contains(IoRwFlags::BLOCK_MODE) {
            let cmd = Command::io_rw_extended(false, func, addr, flags.bits(), block_size);
            let data = Data::new(block_size, 1, DataBuffer::Read(&mut buf[..len]));
            return io_rw_extended(&mut *host, cmd, data);
        }

        let mut addr = addr;
        for part in buf[..len].chunks_mut(block_chunk_len(block_size)) {
            let blocks = (part.len() / block_size as usize) as u32;
            let cmd = Command::io_rw_extended(false, func, addr, flags.bits(), blocks);
            let data = Data::new(block_size, blocks, DataBuffer::Read(part));
            io_rw_extended(&mut *host, cmd, data)?;
            addr = next_address(addr, part.len(), flags);
        }
        Ok(())
    }

    /// CMD53 write of `block_count` blocks of `block_size` bytes from `buf`
    pub fn write_blocks(
        &self,
        func: u8,
        addr: u32,
        block_count: u32,
        block_size: u32,
        buf: &[u8],
    ) -> Result<(), SdioError> {
        let len = check_extended(func, addr, block_count, block_size, buf.len())?;
        let flags = IoRwFlags::for_transfer(block_count, self.config.increment_address);
        let mut host = self.lock()?;

        if !flags.contains(IoRwFlags::BLOCK_MODE) {
            let cmd = Command::io_rw_extended(true, func, addr, flags.bits(), block_size);
            let data = Data::new(block_size, 1, DataBuffer::Write(&buf[..len]));
            return io_rw_extended(&mut *host, cmd, data);
        }

        let mut addr = addr;
        for part in buf[..len].chunks(block_chunk_len(block_size)) {
            let blocks = (part.len() / block_size as usize) as u32;
            let cmd = Command::io_rw_extended(true, func, addr, flags.bits(), blocks);
            let data = Data::new(block_size, blocks, DataBuffer::Write(part));
            io_rw_extended(&mut *host, cmd, data)?;
            addr = next_address(addr, part.len(), flags);
        }
        Ok(())
    }

    /// CMD53 read spread across `bufs` as one scatter-gather transfer.
    ///
    /// The segment list is built under the bus lock, right before the
    /// command, so no other caller can observe a half-built list.
    #[cfg(feature = "scatter-gather")]
    pub fn read_blocks_sg(
        &self,
        func: u8,
        addr: u32,
        block_size: u32,
        bufs: &mut [&mut [u8]],
    ) -> Result<(), SdioError> {
        check_target(func, addr)?;
        let mut host = self.lock()?;

        let mut list = RxSgList::new();
        for buf in bufs.iter_mut() {
            list.append(&mut **buf)?;
        }
        let block_count = sg_block_count(list.total_len(), block_size)?;
        let (flags, count) = sg_mode(block_count, block_size, self.config.increment_address);

        let cmd = Command::io_rw_extended(false, func, addr, flags.bits(), count);
        let data = Data::new(block_size, block_count, DataBuffer::ReadSg(&list));
        io_rw_extended(&mut *host, cmd, data)
    }

    /// CMD53 write gathered from `bufs` as one scatter-gather transfer
    #[cfg(feature = "scatter-gather")]
    pub fn write_blocks_sg(
        &self,
        func: u8,
        addr: u32,
        block_size: u32,
        bufs: &[&[u8]],
    ) -> Result<(), SdioError> {
        check_target(func, addr)?;
        let mut host = self.lock()?;

        let mut list = TxSgList::new();
        for buf in bufs.iter() {
            list.append(buf)?;
        }
        let block_count = sg_block_count(list.total_len(), block_size)?;
        let (flags, count) = sg_mode(block_count, block_size, self.config.increment_address);

        let cmd = Command::io_rw_extended(true, func, addr, flags.bits(), count);
        let data = Data::new(block_size, block_count, DataBuffer::WriteSg(&list));
        io_rw_extended(&mut *host, cmd, data)
    }
}

/// Validate function number and register address
fn check_target(func: u8, addr: u32) -> Result<(), SdioError> {
    if func > SDIO_MAX_FUNCTION {
        return Err(SdioError::InvalidFunction);
    }
    if addr > SDIO_MAX_ADDRESS {
        return Err(SdioError::InvalidAddress);
    }
    Ok(())
}

/// Validate a CMD53 request and return the number of bytes it moves
fn check_extended(
    func: u8,
    addr: u32,
    block_count: u32,
    block_size: u32,
    buf_len: usize,
) -> Result<usize, SdioError> {
    check_target(func, addr)?;
    if block_count == 0 || block_size == 0 || block_size > SDIO_MAX_BLOCK_SIZE {
        return Err(SdioError::InvalidLength);
    }
    // Byte mode carries the length in the 9-bit count field
    if block_count == 1 && block_size > SDIO_MAX_BYTE_COUNT {
        return Err(SdioError::InvalidLength);
    }
    let len = (block_count as usize)
        .checked_mul(block_size as usize)
        .ok_or(SdioError::InvalidLength)?;
    if buf_len < len {
        return Err(SdioError::InvalidLength);
    }
    Ok(len)
}

/// Bytes moved by one block-mode CMD53 of at most 511 blocks
fn block_chunk_len(block_size: u32) -> usize {
    SDIO_MAX_BLOCK_COUNT as usize * block_size as usize
}

#[cfg(feature = "scatter-gather")]
fn sg_block_count(total_len: usize, block_size: u32) -> Result<u32, SdioError> {
    if block_size == 0 || block_size > SDIO_MAX_BLOCK_SIZE {
        return Err(SdioError::InvalidLength);
    }
    if total_len == 0 || total_len % block_size as usize != 0 {
        return Err(SdioError::InvalidLength);
    }
    let blocks = total_len / block_size as usize;
    let byte_mode_too_long = blocks == 1 && block_size > SDIO_MAX_BYTE_COUNT;
    if blocks > SDIO_MAX_BLOCK_COUNT as usize || byte_mode_too_long {
        return Err(SdioError::InvalidLength);
    }
    Ok(blocks as u32)
}

/// Flags and count field for a scatter-gather transfer
#[cfg(feature = "scatter-gather")]
fn sg_mode(block_count: u32, block_size: u32, increment_address: bool) -> (IoRwFlags, u32) {
    let flags = IoRwFlags::for_transfer(block_count, increment_address);
    if flags.contains(IoRwFlags::BLOCK_MODE) {
        (flags, block_count)
    } else {
        (flags, block_size)
    }
}

/// Register address of the chunk following `len` bytes
fn next_address(addr: u32, len: usize, flags: IoRwFlags) -> u32 {
    if flags.contains(IoRwFlags::INCREMENT_ADDRESS) {
        addr.wrapping_add(len as u32) & SDIO_MAX_ADDRESS
    } else {
        addr
    }
}

/// R5 response word
type IoStatus = LocalRegisterCopy<u32, R5::Register>;

/// Reject an R5 response that carries any error flag
fn check_r5(command: &Command) -> Result<IoStatus, SdioError> {
    let status = command.response[0];
    if status & R5_ERROR_ALL != 0 {
        log::debug!("SDIO: CMD{} R5 error flags {:#06x}", command.index, status & 0xFF00);
        return Err(SdmmcError::TransferFailed.into());
    }
    Ok(IoStatus::new(status))
}

fn io_rw_direct<H: SdmmcHost + ?Sized>(host: &mut H, command: Command) -> Result<u8, SdioError> {
    let mut transfer = Transfer::command(command);
    sdmmc::execute(host, &mut transfer)?;
    let status = check_r5(&transfer.command)?;
    Ok(status.read(R5::DATA) as u8)
}

fn io_rw_extended<H: SdmmcHost + ?Sized>(
    host: &mut H,
    command: Command,
    data: Data<'_>,
) -> Result<(), SdioError> {
    let mut transfer = Transfer::with_data(command, data);
    sdmmc::execute(host, &mut transfer)?;
    check_r5(&transfer.command)?;
    Ok(())
}
