//! RPMB authentication key material
//!
//! The key is secret: it zeroizes on drop, its `Debug` output is redacted and
//! it is never logged.

use crate::error::RpmbError;
use rand::RngCore;
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// RPMB authentication key length in bytes
pub const RPMB_KEY_SIZE: usize = 32;

/// Key in effect before the device has been provisioned
const PLACEHOLDER_KEY: &[u8; RPMB_KEY_SIZE] = b"12345ABCDEF1234512345ABCDEF12345";

/// RPMB authentication key (32 bytes) that zeroizes on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RpmbKey([u8; RPMB_KEY_SIZE]);

impl RpmbKey {
    /// Create a key from raw bytes
    pub fn new(bytes: [u8; RPMB_KEY_SIZE]) -> Self {
        RpmbKey(bytes)
    }

    /// Create a key from a 32-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RpmbError> {
        if bytes.len() != RPMB_KEY_SIZE {
            return Err(RpmbError::Config(format!(
                "Invalid key length: expected {}, got {}",
                RPMB_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key = [0u8; RPMB_KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(RpmbKey(key))
    }

    /// Get a reference to the key bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// True if every byte is zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl PartialEq for RpmbKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for RpmbKey {}

impl std::fmt::Debug for RpmbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RpmbKey(<redacted>)")
    }
}

/// Owner of the single in-memory authentication key
#[derive(Debug)]
pub struct KeyManager {
    key: RpmbKey,
}

impl Default for KeyManager {
    fn default() -> Self {
        Self {
            key: RpmbKey(*PLACEHOLDER_KEY),
        }
    }
}

impl KeyManager {
    /// Derive a fresh key from the random source and the device serial number
    ///
    /// The key is `SHA-256(random || serial)`. The stored key is left
    /// untouched; callers decide whether to [`set`](Self::set) the result.
    pub fn derive<R: RngCore + ?Sized>(
        rng: &mut R,
        serial: &[u8],
    ) -> Result<RpmbKey, RpmbError> {
        let mut random = Zeroizing::new([0u8; RPMB_KEY_SIZE]);
        rng.try_fill_bytes(&mut random[..]).map_err(|e| {
            tracing::error!("Failed to generate random numbers: {}", e);
            RpmbError::RandomSource(e)
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&random[..]);
        hasher.update(serial);

        let mut digest = Output::<Sha256>::default();
        hasher.finalize_into_reset(&mut digest);

        let mut out = [0u8; RPMB_KEY_SIZE];
        out.copy_from_slice(&digest);
        digest.as_mut_slice().zeroize();
        let key = RpmbKey(out);
        out.zeroize();
        Ok(key)
    }

    /// Overwrite the in-memory key
    pub fn set(&mut self, key: &RpmbKey) {
        self.key.0.copy_from_slice(&key.0);
    }

    /// Zero the in-memory key
    pub fn clear(&mut self) {
        self.key.zeroize();
    }

    /// True once the key has been cleared
    pub fn is_cleared(&self) -> bool {
        self.key.is_zero()
    }

    /// The key currently used to authenticate device requests
    pub fn current(&self) -> &RpmbKey {
        &self.key
    }
}
