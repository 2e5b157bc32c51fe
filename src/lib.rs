//! Anti-rollback and tamper-evident device state storage on RPMB
//!
//! This crate maps the values a secure-boot bootloader has to keep across power
//! loss onto a Replay Protected Memory Block partition:
//! - A single device state byte (locked, unlocked, ...) guarded by a magic marker
//! - 256 rollback index slots of 64 bits each
//!
//! # Security Features
//!
//! - **Zeroization**: the authentication key uses `zeroize` and is never logged
//! - **Write-skip**: unchanged rollback indices do not consume the device's
//!   authenticated write counter
//! - **Bounded addressing**: rollback slots beyond the reserved span are rejected
//!
//! The RPMB frame protocol itself stays behind [`RpmbDevice`]. A
//! [`SimulatedRpmb`] store stands in for the partition on hosts.
//!
//! # Example
//!
//! ```
//! use rand::rngs::OsRng;
//! use rpmb_storage::{RpmbStorage, StorageConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut storage = RpmbStorage::from_config(&StorageConfig::default(), None)?;
//!
//! let key = storage.derive_key(&mut OsRng, b"0123456789ABCDEF")?;
//! storage.program_key(&key)?;
//!
//! storage.write_device_state(1)?;
//! assert_eq!(storage.read_device_state()?, 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod backend;
pub mod config;
pub mod device;
pub mod emulated;
mod error;
pub mod key;
pub mod layout;
pub mod prelude;
mod rollback;
pub mod simulated;
pub mod state;
mod storage;

pub use backend::{Backend, BackendKind};
pub use config::StorageConfig;
pub use device::{DeviceError, RpmbDevice};
pub use emulated::MemoryRpmbDevice;
pub use error::RpmbError;
pub use key::{KeyManager, RpmbKey, RPMB_KEY_SIZE};
pub use layout::{RPMB_BLOCK_SIZE, ROLLBACK_INDEX_SLOTS};
pub use simulated::{FileSimulatedRpmb, MemorySimulatedRpmb, SimulatedRpmb};
pub use storage::RpmbStorage;
