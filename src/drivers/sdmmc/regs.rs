//! SD/MMC/SDIO Protocol Definitions
//!
//! Command indices, argument layouts and response bitfields as specified in the
//! SD Physical Layer Simplified Specification and the SDIO Simplified
//! Specification. Response words are decoded with tock-registers
//! `LocalRegisterCopy` so field access stays type-checked.

use tock_registers::register_bitfields;

// ============================================================================
// SD/MMC Commands
// ============================================================================

/// GO_IDLE_STATE - Resets all cards to idle state
pub const MMC_CMD_GO_IDLE_STATE: u8 = 0;

/// SELECT/DESELECT_CARD - Toggles card between stand-by and transfer states
pub const MMC_CMD_SELECT_CARD: u8 = 7;

/// VOLTAGE_SWITCH - Switch to 1.8V signaling
pub const SD_CMD_SWITCH_UHS18V: u8 = 11;

/// GO_INACTIVE_STATE - Sends an addressed card into the inactive state
pub const MMC_CMD_GO_INACTIVE_STATE: u8 = 15;

/// SET_BLOCKLEN - Sets block length for block commands
pub const MMC_CMD_SET_BLOCKLEN: u8 = 16;

/// SEND_TUNING_BLOCK - Sends tuning block (SD)
pub const MMC_CMD_SEND_TUNING_BLOCK: u8 = 19;

/// SEND_TUNING_BLOCK_HS200 - Sends tuning block for HS200 (MMC)
pub const MMC_CMD_SEND_TUNING_BLOCK_HS200: u8 = 21;

/// SET_BLOCK_COUNT - Sets block count for next multi-block command
pub const MMC_CMD_SET_BLOCK_COUNT: u8 = 23;

/// IO_RW_DIRECT - Single register read/write (SDIO)
pub const SDIO_CMD_IO_RW_DIRECT: u8 = 52;

/// IO_RW_EXTENDED - Multi-byte / multi-block read/write (SDIO)
pub const SDIO_CMD_IO_RW_EXTENDED: u8 = 53;

/// APP_CMD - Indicates next command is application specific
pub const MMC_CMD_APP_CMD: u8 = 55;

// ============================================================================
// Argument Encodings
// ============================================================================

/// GO_PRE_IDLE_STATE argument for CMD0 (eMMC boot partition reset)
pub const MMC_GO_PRE_IDLE_ARG: u32 = 0xF0F0_F0F0;

/// Relative card address position in addressed commands
pub const RCA_SHIFT: u32 = 16;

/// CMD52/CMD53 direction bit (1 = write)
pub const SDIO_ARG_RW_FLAG: u32 = 1 << 31;

/// CMD52/CMD53 function number shift (bits 30:28)
pub const SDIO_ARG_FUNC_SHIFT: u32 = 28;

/// CMD52 read-after-write flag
pub const SDIO_ARG_RAW_FLAG: u32 = 1 << 27;

/// CMD53 block mode flag
pub const SDIO_ARG_BLOCK_MODE: u32 = 1 << 27;

/// CMD53 incrementing address (OP code) flag
pub const SDIO_ARG_OP_CODE: u32 = 1 << 26;

/// CMD52/CMD53 register address shift (bits 25:9)
pub const SDIO_ARG_ADDR_SHIFT: u32 = 9;

/// Largest register address reachable by CMD52/CMD53 (17 bits)
pub const SDIO_MAX_ADDRESS: u32 = 0x1_FFFF;

/// CMD53 byte/block count mask (bits 8:0)
pub const SDIO_ARG_COUNT_MASK: u32 = 0x1FF;

/// Highest SDIO function number
pub const SDIO_MAX_FUNCTION: u8 = 7;

/// Largest byte count of a byte-mode CMD53 (encoded as 0)
pub const SDIO_MAX_BYTE_COUNT: u32 = 512;

/// Largest block count of a block-mode CMD53
pub const SDIO_MAX_BLOCK_COUNT: u32 = 511;

/// Largest I/O block size a function can be programmed with (FBR, 0x10-0x11)
pub const SDIO_MAX_BLOCK_SIZE: u32 = 2048;

/// Build a CMD52 argument
#[inline]
pub const fn make_io_rw_direct_arg(write: bool, func: u8, addr: u32, raw: bool, data: u8) -> u32 {
    let mut arg = ((func as u32 & 0x7) << SDIO_ARG_FUNC_SHIFT)
        | ((addr & SDIO_MAX_ADDRESS) << SDIO_ARG_ADDR_SHIFT)
        | data as u32;
    if write {
        arg |= SDIO_ARG_RW_FLAG;
        if raw {
            arg |= SDIO_ARG_RAW_FLAG;
        }
    }
    arg
}

/// Build a CMD53 argument; `flags` carries the block-mode and OP-code bits
#[inline]
pub const fn make_io_rw_extended_arg(
    write: bool,
    func: u8,
    addr: u32,
    flags: u32,
    count: u32,
) -> u32 {
    let mut arg = ((func as u32 & 0x7) << SDIO_ARG_FUNC_SHIFT)
        | ((addr & SDIO_MAX_ADDRESS) << SDIO_ARG_ADDR_SHIFT)
        | (flags & (SDIO_ARG_BLOCK_MODE | SDIO_ARG_OP_CODE))
        | (count & SDIO_ARG_COUNT_MASK);
    if write {
        arg |= SDIO_ARG_RW_FLAG;
    }
    arg
}

// ============================================================================
// Response Bitfield Definitions
// ============================================================================

register_bitfields! [
    u32,
    /// R1 card status (SD Physical Layer 4.10.1)
    pub R1 [
        /// Extension function event pending
        FX_EVENT OFFSET(6) NUMBITS(1) [],
        /// Card expects an application command / accepted the last CMD55
        APP_CMD OFFSET(5) NUMBITS(1) [],
        /// Authentication sequence error
        AKE_SEQ_ERROR OFFSET(3) NUMBITS(1) [],
        /// Buffer empty, ready for data
        READY_FOR_DATA OFFSET(8) NUMBITS(1) [],
        /// Card state when the command was received
        CURRENT_STATE OFFSET(9) NUMBITS(4) [
            Idle = 0,
            Ready = 1,
            Identification = 2,
            Standby = 3,
            Transfer = 4,
            SendingData = 5,
            ReceiveData = 6,
            Programming = 7,
            Disconnect = 8
        ],
        /// Card is locked by the user
        CARD_IS_LOCKED OFFSET(25) NUMBITS(1) []
    ],

    /// R5 IO_RW_DIRECT / IO_RW_EXTENDED response (SDIO 5.2)
    pub R5 [
        /// Register data (CMD52)
        DATA OFFSET(0) NUMBITS(8) [],
        /// Argument out of range
        OUT_OF_RANGE OFFSET(8) NUMBITS(1) [],
        /// Invalid function number
        FUNCTION_NUMBER OFFSET(9) NUMBITS(1) [],
        /// General error
        ERROR OFFSET(11) NUMBITS(1) [],
        /// Card IO state
        IO_CURRENT_STATE OFFSET(12) NUMBITS(2) [
            Disabled = 0,
            Command = 1,
            Transfer = 2
        ],
        /// Illegal command
        ILLEGAL_COMMAND OFFSET(14) NUMBITS(1) [],
        /// CRC of the previous command failed
        COM_CRC_ERROR OFFSET(15) NUMBITS(1) []
    ]
];

// ============================================================================
// R1 Error Flags
// ============================================================================

pub const R1_OUT_OF_RANGE: u32 = 1 << 31;
pub const R1_ADDRESS_ERROR: u32 = 1 << 30;
pub const R1_BLOCK_LEN_ERROR: u32 = 1 << 29;
pub const R1_ERASE_SEQ_ERROR: u32 = 1 << 28;
pub const R1_ERASE_PARAM: u32 = 1 << 27;
pub const R1_WP_VIOLATION: u32 = 1 << 26;
pub const R1_CARD_IS_LOCKED: u32 = 1 << 25;
pub const R1_LOCK_UNLOCK_FAILED: u32 = 1 << 24;
pub const R1_COM_CRC_ERROR: u32 = 1 << 23;
pub const R1_ILLEGAL_COMMAND: u32 = 1 << 22;
pub const R1_CARD_ECC_FAILED: u32 = 1 << 21;
pub const R1_CC_ERROR: u32 = 1 << 20;
pub const R1_ERROR: u32 = 1 << 19;
pub const R1_CID_CSD_OVERWRITE: u32 = 1 << 16;
pub const R1_WP_ERASE_SKIP: u32 = 1 << 15;
pub const R1_ERASE_RESET: u32 = 1 << 13;
pub const R1_SWITCH_ERROR: u32 = 1 << 7;

/// Every R1 bit that marks the previous command as failed
pub const R1_ERROR_ALL: u32 = R1_OUT_OF_RANGE
    | R1_ADDRESS_ERROR
    | R1_BLOCK_LEN_ERROR
    | R1_ERASE_SEQ_ERROR
    | R1_ERASE_PARAM
    | R1_WP_VIOLATION
    | R1_CARD_IS_LOCKED
    | R1_LOCK_UNLOCK_FAILED
    | R1_COM_CRC_ERROR
    | R1_ILLEGAL_COMMAND
    | R1_CARD_ECC_FAILED
    | R1_CC_ERROR
    | R1_ERROR
    | R1_CID_CSD_OVERWRITE
    | R1_WP_ERASE_SKIP
    | R1_ERASE_RESET
    | R1_SWITCH_ERROR;

/// R5 flags that mark the IO command as failed
pub const R5_ERROR_ALL: u32 = (1 << 15) | (1 << 14) | (1 << 11) | (1 << 9) | (1 << 8);

// ============================================================================
// Timing
// ============================================================================

/// Settle time after selecting 1.8V signaling (milliseconds)
pub const VOLTAGE_SWITCH_SETTLE_MS: u32 = 5;

/// Forced SD clock time after a voltage switch (milliseconds)
pub const VOLTAGE_SWITCH_CLOCK_MS: u32 = 1;

/// Delay between tuning block reads (milliseconds)
pub const TUNING_POLL_DELAY_MS: u32 = 1;

/// Maximum tuning commands per tuning window (SD Physical Layer 4.2.4.5)
pub const TUNING_COMMAND_LIMIT: u32 = 40;

/// Largest tuning block (HS200 8-bit bus)
pub const MAX_TUNING_BLOCK_SIZE: usize = 128;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_arg_layout() {
        let arg = make_io_rw_direct_arg(true, 1, 0x1_0000, true, 0xA5);
        assert_eq!(arg >> 31, 1);
        assert_eq!((arg >> SDIO_ARG_FUNC_SHIFT) & 0x7, 1);
        assert_ne!(arg & SDIO_ARG_RAW_FLAG, 0);
        assert_eq!((arg >> SDIO_ARG_ADDR_SHIFT) & SDIO_MAX_ADDRESS, 0x1_0000);
        assert_eq!(arg & 0xFF, 0xA5);
    }

    #[test]
    fn test_direct_read_ignores_raw() {
        let arg = make_io_rw_direct_arg(false, 2, 0x10, true, 0);
        assert_eq!(arg & (SDIO_ARG_RW_FLAG | SDIO_ARG_RAW_FLAG), 0);
    }

    #[test]
    fn test_extended_arg_layout() {
        let arg = make_io_rw_extended_arg(false, 2, 0x108, SDIO_ARG_BLOCK_MODE, 4);
        assert_eq!(arg & SDIO_ARG_RW_FLAG, 0);
        assert_eq!((arg >> SDIO_ARG_FUNC_SHIFT) & 0x7, 2);
        assert_ne!(arg & SDIO_ARG_BLOCK_MODE, 0);
        assert_eq!(arg & SDIO_ARG_OP_CODE, 0);
        assert_eq!((arg >> SDIO_ARG_ADDR_SHIFT) & SDIO_MAX_ADDRESS, 0x108);
        assert_eq!(arg & SDIO_ARG_COUNT_MASK, 4);
    }

    #[test]
    fn test_byte_count_512_encodes_as_zero() {
        let arg = make_io_rw_extended_arg(true, 1, 0, 0, SDIO_MAX_BYTE_COUNT);
        assert_eq!(arg & SDIO_ARG_COUNT_MASK, 0);
    }

    #[test]
    fn test_r1_error_mask_excludes_status_bits() {
        assert_eq!(R1_ERROR_ALL & (1 << 5), 0);
        assert_eq!(R1_ERROR_ALL & (0xF << 9), 0);
        assert_eq!(R1_ERROR_ALL & (1 << 8), 0);
    }
}
