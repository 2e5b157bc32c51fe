//! Prelude
//!
//! ```rust
//! use rpmb_storage::prelude::*;
//!
//! let storage = RpmbStorage::new(Backend::Simulated(Box::new(MemorySimulatedRpmb::default())));
//! assert_eq!(storage.backend_kind(), BackendKind::Simulated);
//! ```

pub use crate::backend::{Backend, BackendKind};
pub use crate::config::StorageConfig;
pub use crate::device::{DeviceError, RpmbDevice};
pub use crate::error::RpmbError;
pub use crate::key::{KeyManager, RpmbKey};
pub use crate::simulated::{FileSimulatedRpmb, MemorySimulatedRpmb, SimulatedRpmb};
pub use crate::storage::RpmbStorage;
