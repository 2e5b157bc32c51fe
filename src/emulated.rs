//! In-memory RPMB part for exercising the real backend on a host
//!
//! Requests are authenticated the way a part would check them: the request is
//! MACed with the presented key and compared, in constant time, with the MAC
//! under the programmed key. The key can be programmed once.

use crate::device::{DeviceError, RpmbDevice};
use crate::key::RpmbKey;
use crate::layout::{Block, RPMB_BLOCK_SIZE};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const REQ_GET_COUNTER: u8 = 0x02;
const REQ_WRITE: u8 = 0x03;
const REQ_READ: u8 = 0x04;

/// Default partition size of the emulated part, in blocks
pub const DEFAULT_PARTITION_BLOCKS: usize = 64;

#[derive(Debug)]
pub struct MemoryRpmbDevice {
    key: Option<RpmbKey>,
    write_counter: u32,
    blocks: Vec<Block>,
    block_reads: usize,
    block_writes: usize,
    fail_io: bool,
}

impl Default for MemoryRpmbDevice {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITION_BLOCKS)
    }
}

impl MemoryRpmbDevice {
    /// Create an unprovisioned part with `blocks` zeroed blocks
    pub fn new(blocks: usize) -> Self {
        Self {
            key: None,
            write_counter: 0,
            blocks: vec![[0u8; RPMB_BLOCK_SIZE]; blocks],
            block_reads: 0,
            block_writes: 0,
            fail_io: false,
        }
    }

    /// Authenticated write counter as the part sees it
    pub fn write_counter(&self) -> u32 {
        self.write_counter
    }

    /// Number of successful block write requests
    pub fn block_writes(&self) -> usize {
        self.block_writes
    }

    /// Number of successful block read requests
    pub fn block_reads(&self) -> usize {
        self.block_reads
    }

    /// Make every following request fail with an I/O error
    pub fn set_io_failure(&mut self, fail: bool) {
        self.fail_io = fail;
    }

    /// Raw block contents, bypassing authentication
    pub fn raw_block(&self, address: u16) -> Option<&Block> {
        self.blocks.get(address as usize)
    }

    /// Mutable raw block contents, for tamper simulations
    pub fn raw_block_mut(&mut self, address: u16) -> Option<&mut Block> {
        self.blocks.get_mut(address as usize)
    }

    fn check_io(&self) -> Result<(), DeviceError> {
        if self.fail_io {
            return Err(DeviceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected transport failure",
            )));
        }
        Ok(())
    }

    fn authenticate(&self, presented: &RpmbKey, request: &[u8]) -> Result<(), DeviceError> {
        let programmed = self.key.as_ref().ok_or(DeviceError::NoAuthKeyProgrammed)?;
        let expected = request_mac(programmed, request)?;
        let actual = request_mac(presented, request)?;
        if expected.ct_eq(&actual).into() {
            Ok(())
        } else {
            Err(DeviceError::AuthenticationFailed)
        }
    }

    fn request(&self, kind: u8, count: u16, address: u16, data: &[u8]) -> Vec<u8> {
        let mut request = Vec::with_capacity(9 + data.len());
        request.push(kind);
        request.extend_from_slice(&self.write_counter.to_be_bytes());
        request.extend_from_slice(&address.to_be_bytes());
        request.extend_from_slice(&count.to_be_bytes());
        request.extend_from_slice(data);
        request
    }

    fn span(
        &self,
        count: u16,
        address: u16,
        len: usize,
    ) -> Result<std::ops::Range<usize>, DeviceError> {
        let start = address as usize;
        let end = start + count as usize;
        if count == 0 || end > self.blocks.len() {
            return Err(DeviceError::Rejected(format!(
                "address {} count {} outside partition of {} blocks",
                address,
                count,
                self.blocks.len()
            )));
        }
        if len < count as usize * RPMB_BLOCK_SIZE {
            return Err(DeviceError::Rejected(format!(
                "buffer of {} bytes too small for {} blocks",
                len, count
            )));
        }
        Ok(start..end)
    }
}

fn request_mac(key: &RpmbKey, request: &[u8]) -> Result<Vec<u8>, DeviceError> {
    let mut mac = HmacSha256::new_from_slice(key.as_slice())
        .map_err(|_| DeviceError::Rejected("HMAC initialization failed".to_string()))?;
    mac.update(request);
    Ok(mac.finalize().into_bytes().to_vec())
}

impl RpmbDevice for MemoryRpmbDevice {
    fn get_write_counter(&mut self, key: &RpmbKey) -> Result<u32, DeviceError> {
        self.check_io()?;
        let request = self.request(REQ_GET_COUNTER, 0, 0, &[]);
        self.authenticate(key, &request)?;
        Ok(self.write_counter)
    }

    fn program_key(&mut self, key: &RpmbKey) -> Result<(), DeviceError> {
        self.check_io()?;
        if self.key.is_some() {
            return Err(DeviceError::Rejected(
                "authentication key already programmed".to_string(),
            ));
        }
        self.key = Some(key.clone());
        Ok(())
    }

    fn read_blocks(
        &mut self,
        count: u16,
        address: u16,
        buf: &mut [u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError> {
        self.check_io()?;
        let span = self.span(count, address, buf.len())?;
        let request = self.request(REQ_READ, count, address, &[]);
        self.authenticate(key, &request)?;

        for (chunk, block) in buf.chunks_mut(RPMB_BLOCK_SIZE).zip(&self.blocks[span]) {
            chunk.copy_from_slice(block);
        }
        self.block_reads += 1;
        Ok(())
    }

    fn write_blocks(
        &mut self,
        count: u16,
        address: u16,
        data: &[u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError> {
        self.check_io()?;
        let span = self.span(count, address, data.len())?;
        let payload = &data[..count as usize * RPMB_BLOCK_SIZE];
        let request = self.request(REQ_WRITE, count, address, payload);
        self.authenticate(key, &request)?;

        let blocks = self.blocks[span].iter_mut();
        for (block, chunk) in blocks.zip(payload.chunks(RPMB_BLOCK_SIZE)) {
            block.copy_from_slice(chunk);
        }
        self.write_counter = self.write_counter.wrapping_add(1);
        self.block_writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> RpmbKey {
        RpmbKey::new([byte; 32])
    }

    #[test]
    fn test_unprovisioned_part() {
        let mut dev = MemoryRpmbDevice::default();
        assert!(matches!(
            dev.get_write_counter(&key(1)),
            Err(DeviceError::NoAuthKeyProgrammed)
        ));
    }

    #[test]
    fn test_key_is_one_time_programmable() {
        let mut dev = MemoryRpmbDevice::default();
        dev.program_key(&key(1)).unwrap();
        assert!(matches!(dev.program_key(&key(2)), Err(DeviceError::Rejected(_))));
        assert_eq!(dev.get_write_counter(&key(1)).unwrap(), 0);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let mut dev = MemoryRpmbDevice::default();
        dev.program_key(&key(1)).unwrap();

        let mut buf = [0u8; RPMB_BLOCK_SIZE];
        assert!(matches!(
            dev.read_blocks(1, 2, &mut buf, &key(2)),
            Err(DeviceError::AuthenticationFailed)
        ));
        assert!(matches!(
            dev.write_blocks(1, 2, &buf, &RpmbKey::new([0; 32])),
            Err(DeviceError::AuthenticationFailed)
        ));
        assert_eq!(dev.write_counter(), 0);
    }

    #[test]
    fn test_write_advances_counter() {
        let mut dev = MemoryRpmbDevice::default();
        dev.program_key(&key(9)).unwrap();

        let data = [0xEEu8; RPMB_BLOCK_SIZE];
        dev.write_blocks(1, 5, &data, &key(9)).unwrap();
        assert_eq!(dev.write_counter(), 1);
        assert_eq!(dev.block_writes(), 1);

        let mut buf = [0u8; RPMB_BLOCK_SIZE];
        dev.read_blocks(1, 5, &mut buf, &key(9)).unwrap();
        assert_eq!(buf, data);
        assert_eq!(dev.block_reads(), 1);
    }

    #[test]
    fn test_out_of_partition_request() {
        let mut dev = MemoryRpmbDevice::new(4);
        dev.program_key(&key(1)).unwrap();
        let mut buf = [0u8; RPMB_BLOCK_SIZE];
        assert!(matches!(
            dev.read_blocks(1, 4, &mut buf, &key(1)),
            Err(DeviceError::Rejected(_))
        ));
    }

    #[test]
    fn test_injected_io_failure() {
        let mut dev = MemoryRpmbDevice::default();
        dev.set_io_failure(true);
        assert!(matches!(dev.program_key(&key(1)), Err(DeviceError::Io(_))));
    }
}
