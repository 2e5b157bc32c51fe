//! RPMB storage facade
//!
//! [`RpmbStorage`] is what boot verification and provisioning talk to. It owns
//! the authentication key, the bound backend and the block scratch buffer, so
//! two instances never share state.
//!
//! # Example
//!
//! ```
//! use rpmb_storage::{Backend, MemorySimulatedRpmb, RpmbKey, RpmbStorage};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut storage = RpmbStorage::new(Backend::Simulated(Box::new(
//!     MemorySimulatedRpmb::default(),
//! )));
//!
//! if !storage.is_provisioned() {
//!     storage.program_key(&RpmbKey::new([0x42; 32]))?;
//! }
//!
//! storage.write_rollback_index(5, 42)?;
//! assert_eq!(storage.read_rollback_index(5)?, 42);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use crate::backend::{Backend, BackendKind};
use crate::config::StorageConfig;
use crate::device::RpmbDevice;
use crate::error::RpmbError;
use crate::key::{KeyManager, RpmbKey};
use crate::layout::{Block, SlotAddress, RPMB_BLOCK_SIZE, ROLLBACK_INDEX_SLOTS};
use rand::RngCore;
use tracing::{debug, warn};

/// Anti-rollback and device state storage on an RPMB partition
///
/// Operations are blocking and take `&mut self`; the scratch buffer is never
/// shared between calls in flight.
#[derive(Debug)]
pub struct RpmbStorage {
    keys: KeyManager,
    backend: Backend,
    scratch: Block,
}

impl RpmbStorage {
    /// Build a storage facade on an already bound backend
    ///
    /// The key starts out as the pre-provisioning placeholder.
    pub fn new(backend: Backend) -> Self {
        debug!("rpmb storage bound to {:?} backend", backend.kind());
        Self {
            keys: KeyManager::default(),
            backend,
            scratch: [0u8; RPMB_BLOCK_SIZE],
        }
    }

    /// Bind the backend selected by `config`
    pub fn from_config(
        config: &StorageConfig,
        device: Option<Box<dyn RpmbDevice>>,
    ) -> Result<Self, RpmbError> {
        Ok(Self::new(Backend::from_config(config, device)?))
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Number of rollback index slots
    pub fn rollback_slot_count(&self) -> usize {
        ROLLBACK_INDEX_SLOTS
    }

    /// Derive a new key from `rng` and the device serial number
    ///
    /// The in-memory key is not changed.
    pub fn derive_key<R: RngCore + ?Sized>(
        &self,
        rng: &mut R,
        serial: &[u8],
    ) -> Result<RpmbKey, RpmbError> {
        KeyManager::derive(rng, serial)
    }

    /// Replace the in-memory key, e.g. with one recovered from a sealed blob
    pub fn set_key(&mut self, key: &RpmbKey) {
        self.keys.set(key);
    }

    /// Zero the in-memory key
    pub fn clear_key(&mut self) {
        self.keys.clear();
    }

    /// True unless the device reports that no key has been programmed
    ///
    /// Fail-open: any other failure, including a transport error, is reported
    /// as provisioned so the caller never reprograms a part it could not talk
    /// to.
    pub fn is_provisioned(&mut self) -> bool {
        self.backend.is_provisioned(self.keys.current())
    }

    /// Program `key` into the device, then adopt it as the in-memory key
    ///
    /// On failure the previous in-memory key is kept.
    pub fn program_key(&mut self, key: &RpmbKey) -> Result<(), RpmbError> {
        self.backend.program_key(key)?;
        self.keys.set(key);
        debug!("rpmb key programmed");
        Ok(())
    }

    /// Persist the device state byte
    pub fn write_device_state(&mut self, state: u8) -> Result<(), RpmbError> {
        self.backend
            .write_device_state(self.keys.current(), &mut self.scratch, state)
    }

    /// Read the device state byte
    ///
    /// [`RpmbError::NotFound`] covers both a state that was never written and a
    /// block whose magic marker does not match.
    pub fn read_device_state(&mut self) -> Result<u8, RpmbError> {
        self.backend
            .read_device_state(self.keys.current(), &mut self.scratch)
    }

    /// Store rollback index `index`
    ///
    /// No write is issued when the slot already holds `value`. Monotonicity is
    /// the caller's policy and is not checked here.
    pub fn write_rollback_index(&mut self, index: usize, value: u64) -> Result<(), RpmbError> {
        let slot = self.slot(index)?;
        self.backend
            .write_rollback_index(self.keys.current(), &mut self.scratch, slot, value)
    }

    /// Read rollback index `index`
    pub fn read_rollback_index(&mut self, index: usize) -> Result<u64, RpmbError> {
        let slot = self.slot(index)?;
        self.backend
            .read_rollback_index(self.keys.current(), &mut self.scratch, slot)
    }

    fn slot(&self, index: usize) -> Result<SlotAddress, RpmbError> {
        SlotAddress::for_index(index).map_err(|e| {
            warn!("rejecting rollback index {}: {}", index, e);
            e
        })
    }
}
