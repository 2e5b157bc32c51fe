//! Real and simulated storage backends
//!
//! A [`Backend`] is bound once, when the storage facade is built, and carries
//! the six storage operations. Both variants share the block layout and the
//! codecs; they differ in how a block is reached:
//!
//! - **Real**: authenticated block reads and writes on the hardware partition,
//!   using the in-memory key
//! - **Simulated**: unauthenticated byte-offset access to a flat image. A
//!   missing partition is tolerated on the write paths and reads back as zero
//!   for rollback indices.

use crate::config::StorageConfig;
use crate::device::{DeviceError, RpmbDevice};
use crate::error::RpmbError;
use crate::key::RpmbKey;
use crate::layout::{
    device_state_byte_offset, Block, SlotAddress, DEVICE_STATE_BLOCK_ADDR,
    DEVICE_STATE_BLOCK_COUNT, ROLLBACK_INDEX_SIZE,
};
use crate::simulated::{FileSimulatedRpmb, MemorySimulatedRpmb, SimulatedRpmb};
use crate::{rollback, state};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Which backend to bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Authenticated hardware partition
    Real,
    /// Unauthenticated host-side image
    #[default]
    Simulated,
}

/// The bound storage backend carrying the six storage operations
///
/// A backend must be bound, through [`Backend::from_config`] or by building a
/// variant directly, before any storage operation is called. It is not
/// re-selected afterwards.
pub enum Backend {
    /// Hardware collaborator, authenticated with the in-memory key
    Real(Box<dyn RpmbDevice>),
    /// Simulated image, no authentication
    Simulated(Box<dyn SimulatedRpmb>),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

impl Backend {
    /// Bind the backend selected by `config`
    ///
    /// `Real` needs the hardware collaborator in `device`. `Simulated` uses the
    /// image file named in the config, or a fresh in-memory image.
    pub fn from_config(
        config: &StorageConfig,
        device: Option<Box<dyn RpmbDevice>>,
    ) -> Result<Self, RpmbError> {
        match config.backend {
            BackendKind::Real => device.map(Backend::Real).ok_or_else(|| {
                RpmbError::Config("real backend selected without an RPMB device".to_string())
            }),
            BackendKind::Simulated => Ok(match &config.simulated_image {
                Some(path) => Backend::Simulated(Box::new(FileSimulatedRpmb::new(path))),
                None => Backend::Simulated(Box::new(MemorySimulatedRpmb::default())),
            }),
        }
    }

    /// Which variant is bound
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Real(_) => BackendKind::Real,
            Backend::Simulated(_) => BackendKind::Simulated,
        }
    }

    /// Query the write counter; only a `NoAuthKeyProgrammed` answer counts as
    /// unprovisioned
    pub fn is_provisioned(&mut self, key: &RpmbKey) -> bool {
        let result = match self {
            Backend::Real(dev) => dev.get_write_counter(key),
            Backend::Simulated(sim) => sim.get_counter(key),
        };
        debug!("get_counter result={:?}", result);
        match result {
            Err(DeviceError::NoAuthKeyProgrammed) => {
                debug!("rpmb key is not programmed");
                false
            }
            _ => true,
        }
    }

    /// Program `key` into the device; failures become `ProgrammingFailed`
    pub fn program_key(&mut self, key: &RpmbKey) -> Result<(), RpmbError> {
        let result = match self {
            Backend::Real(dev) => dev.program_key(key),
            Backend::Simulated(sim) => sim.program_key(key),
        };
        result.map_err(|e| {
            error!("Failed to program rpmb key: {}", e);
            RpmbError::ProgrammingFailed(e)
        })
    }

    /// Read-modify-write the state block with the magic marker and `value`
    pub fn write_device_state(
        &mut self,
        key: &RpmbKey,
        scratch: &mut Block,
        value: u8,
    ) -> Result<(), RpmbError> {
        match self {
            Backend::Real(dev) => {
                dev.read_blocks(
                    DEVICE_STATE_BLOCK_COUNT,
                    DEVICE_STATE_BLOCK_ADDR,
                    scratch,
                    key,
                )
                .map_err(|e| failed("read device state", e))?;

                state::encode(scratch, value);
                dev.write_blocks(
                    DEVICE_STATE_BLOCK_COUNT,
                    DEVICE_STATE_BLOCK_ADDR,
                    scratch,
                    key,
                )
                .map_err(|e| failed("write device state", e))?;
            }
            Backend::Simulated(sim) => {
                let offset = device_state_byte_offset();
                match sim.read(offset, scratch) {
                    Err(DeviceError::NotFound) => {
                        debug!("simulated partition missing, device state not stored");
                        return Ok(());
                    }
                    result => result.map_err(|e| failed("read device state", e))?,
                }

                state::encode(scratch, value);
                sim.write(offset, scratch)
                    .map_err(|e| failed("write device state", e))?;
            }
        }
        debug!("device state written");
        Ok(())
    }

    /// Read the state block; a missing magic marker is `NotFound`
    pub fn read_device_state(
        &mut self,
        key: &RpmbKey,
        scratch: &mut Block,
    ) -> Result<u8, RpmbError> {
        let result = match self {
            Backend::Real(dev) => dev.read_blocks(
                DEVICE_STATE_BLOCK_COUNT,
                DEVICE_STATE_BLOCK_ADDR,
                scratch,
                key,
            ),
            Backend::Simulated(sim) => sim.read(device_state_byte_offset(), scratch),
        };
        result.map_err(|e| failed("read device state", e))?;

        let value = state::decode(scratch).ok_or(RpmbError::NotFound)?;
        debug!("magic={:02x}, state={:02x}", scratch[0], value);
        Ok(value)
    }

    /// Store `value` in `slot`, skipping the write when it is unchanged
    pub fn write_rollback_index(
        &mut self,
        key: &RpmbKey,
        scratch: &mut Block,
        slot: SlotAddress,
        value: u64,
    ) -> Result<(), RpmbError> {
        match self {
            Backend::Real(dev) => {
                dev.read_blocks(1, slot.block, scratch, key)
                    .map_err(|e| failed("read rollback index", e))?;

                if !rollback::write_slot(scratch, slot.offset, value) {
                    debug!("rollback index unchanged, write skipped");
                    return Ok(());
                }
                dev.write_blocks(1, slot.block, scratch, key)
                    .map_err(|e| failed("write rollback index", e))?;
            }
            Backend::Simulated(sim) => {
                let offset = slot.byte_offset();
                let buf = &mut scratch[..ROLLBACK_INDEX_SIZE];
                match sim.read(offset, buf) {
                    Err(DeviceError::NotFound) => {
                        debug!("simulated partition missing, rollback index not stored");
                        return Ok(());
                    }
                    result => result.map_err(|e| failed("read rollback index", e))?,
                }

                if !rollback::write_slot(buf, 0, value) {
                    debug!("rollback index unchanged, write skipped");
                    return Ok(());
                }
                sim.write(offset, buf)
                    .map_err(|e| failed("write rollback index", e))?;
            }
        }
        debug!("rollback index={:016x} written", value);
        Ok(())
    }

    /// Read the value in `slot`
    pub fn read_rollback_index(
        &mut self,
        key: &RpmbKey,
        scratch: &mut Block,
        slot: SlotAddress,
    ) -> Result<u64, RpmbError> {
        let value = match self {
            Backend::Real(dev) => {
                dev.read_blocks(1, slot.block, scratch, key)
                    .map_err(|e| failed("read rollback index", e))?;
                rollback::read_slot(scratch, slot.offset)
            }
            Backend::Simulated(sim) => {
                let buf = &mut scratch[..ROLLBACK_INDEX_SIZE];
                match sim.read(slot.byte_offset(), buf) {
                    Err(DeviceError::NotFound) => {
                        debug!("simulated partition missing, rollback index defaults to 0");
                        return Ok(0);
                    }
                    result => result.map_err(|e| failed("read rollback index", e))?,
                }
                rollback::read_slot(buf, 0)
            }
        };
        debug!("rollback index={:016x}", value);
        Ok(value)
    }
}

fn failed(what: &str, err: DeviceError) -> RpmbError {
    error!("Failed to {}: {}", what, err);
    RpmbError::from(err)
}
