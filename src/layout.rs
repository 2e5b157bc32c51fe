//! Persisted block layout
//!
//! ```text
//! block 0..=1   untouched
//! block 2       device state   [magic][state][reserved ...]
//! block 3..=10  rollback index 32 x u64 (little endian) per block
//! ```

use crate::error::RpmbError;

/// RPMB block size in bytes
pub const RPMB_BLOCK_SIZE: usize = 256;

/// One RPMB block
pub type Block = [u8; RPMB_BLOCK_SIZE];

pub const DEVICE_STATE_BLOCK_ADDR: u16 = 2;
pub const DEVICE_STATE_BLOCK_COUNT: u16 = 1;
pub const DEVICE_STATE_MAGIC: u8 = 0xDC;

pub const ROLLBACK_INDEX_BLOCK_ADDR: u16 = 3;
pub const ROLLBACK_INDEX_BLOCK_TOTAL_COUNT: usize = 8;

/// Size of one rollback index slot
pub const ROLLBACK_INDEX_SIZE: usize = std::mem::size_of::<u64>();

pub const ROLLBACK_INDEX_COUNT_PER_BLOCK: usize = RPMB_BLOCK_SIZE / ROLLBACK_INDEX_SIZE;

/// Total rollback index slots reserved
pub const ROLLBACK_INDEX_SLOTS: usize =
    ROLLBACK_INDEX_BLOCK_TOTAL_COUNT * ROLLBACK_INDEX_COUNT_PER_BLOCK;

/// Where a rollback index slot lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAddress {
    /// Block number on the real partition
    pub block: u16,
    /// Byte offset of the slot inside `block`
    pub offset: usize,
}

impl SlotAddress {
    /// Locate rollback index slot `index`
    pub fn for_index(index: usize) -> Result<Self, RpmbError> {
        if index >= ROLLBACK_INDEX_SLOTS {
            return Err(RpmbError::OutOfRange {
                index,
                slots: ROLLBACK_INDEX_SLOTS,
            });
        }
        Ok(Self {
            block: ROLLBACK_INDEX_BLOCK_ADDR + (index / ROLLBACK_INDEX_COUNT_PER_BLOCK) as u16,
            offset: (index % ROLLBACK_INDEX_COUNT_PER_BLOCK) * ROLLBACK_INDEX_SIZE,
        })
    }

    /// Same slot as a byte offset into a flat image
    pub fn byte_offset(&self) -> u64 {
        self.block as u64 * RPMB_BLOCK_SIZE as u64 + self.offset as u64
    }
}

/// Byte offset of the device state block in a flat image
pub fn device_state_byte_offset() -> u64 {
    DEVICE_STATE_BLOCK_ADDR as u64 * RPMB_BLOCK_SIZE as u64
}
