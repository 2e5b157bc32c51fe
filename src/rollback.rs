//! Rollback index codec
//!
//! Each slot is a little-endian `u64`. The codec never checks monotonicity;
//! that policy belongs to the boot-verification caller. Offsets come from
//! [`SlotAddress`](crate::layout::SlotAddress), which keeps them inside a block.

use crate::layout::ROLLBACK_INDEX_SIZE;

/// Read the slot at `offset`
pub(crate) fn read_slot(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; ROLLBACK_INDEX_SIZE];
    bytes.copy_from_slice(&buf[offset..offset + ROLLBACK_INDEX_SIZE]);
    u64::from_le_bytes(bytes)
}

/// Store `value` at `offset`
///
/// Returns `false` when the slot already holds `value` and the buffer was left
/// as is, in which case no write needs to be issued.
pub(crate) fn write_slot(buf: &mut [u8], offset: usize, value: u64) -> bool {
    let slot = &mut buf[offset..offset + ROLLBACK_INDEX_SIZE];
    let encoded = value.to_le_bytes();
    if *slot == encoded {
        return false;
    }
    slot.copy_from_slice(&encoded);
    true
}
