//! Hardware RPMB collaborator
//!
//! Frame construction, HMAC verification and the write-counter handshake live
//! behind this trait. The storage layer only ever asks for the four
//! operations below and passes the in-memory key for authentication.

use crate::key::RpmbKey;
use thiserror::Error;

/// Failures reported by an RPMB collaborator
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("No authentication key programmed")]
    NoAuthKeyProgrammed,

    #[error("Region not found")]
    NotFound,

    #[error("Authentication failure")]
    AuthenticationFailed,

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Authenticated block access to a real RPMB partition
pub trait RpmbDevice {
    /// Read the authenticated write counter
    fn get_write_counter(&mut self, key: &RpmbKey) -> Result<u32, DeviceError>;

    /// Program the authentication key
    fn program_key(&mut self, key: &RpmbKey) -> Result<(), DeviceError>;

    /// Read `count` blocks starting at `address` into `buf`
    ///
    /// `buf` must hold at least `count` blocks.
    fn read_blocks(
        &mut self,
        count: u16,
        address: u16,
        buf: &mut [u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError>;

    /// Write `count` blocks from `data` starting at `address`
    fn write_blocks(
        &mut self,
        count: u16,
        address: u16,
        data: &[u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError>;
}

impl<T: RpmbDevice + ?Sized> RpmbDevice for Box<T> {
    fn get_write_counter(&mut self, key: &RpmbKey) -> Result<u32, DeviceError> {
        (**self).get_write_counter(key)
    }

    fn program_key(&mut self, key: &RpmbKey) -> Result<(), DeviceError> {
        (**self).program_key(key)
    }

    fn read_blocks(
        &mut self,
        count: u16,
        address: u16,
        buf: &mut [u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError> {
        (**self).read_blocks(count, address, buf, key)
    }

    fn write_blocks(
        &mut self,
        count: u16,
        address: u16,
        data: &[u8],
        key: &RpmbKey,
    ) -> Result<(), DeviceError> {
        (**self).write_blocks(count, address, data, key)
    }
}
