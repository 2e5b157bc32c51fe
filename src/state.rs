//! Device state record codec
//!
//! Byte 0 of the state block carries [`DEVICE_STATE_MAGIC`], byte 1 the state.
//! Anything else in the block is preserved as read.

use crate::layout::{Block, DEVICE_STATE_MAGIC};

/// Stamp `state` into a block that was read back from storage
pub fn encode(block: &mut Block, state: u8) {
    block[0] = DEVICE_STATE_MAGIC;
    block[1] = state;
}

/// Extract the state, or `None` if the block was never written or is corrupted
pub fn decode(block: &Block) -> Option<u8> {
    if block[0] != DEVICE_STATE_MAGIC {
        return None;
    }
    Some(block[1])
}
