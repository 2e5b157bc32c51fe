//! Unified error type for the RPMB storage API
//!
//! Collaborators report [`DeviceError`]; the storage facade folds those into
//! [`RpmbError`], which is what boot-verification and provisioning callers see.
//!
//! # Example
//!
//! ```no_run
//! use rpmb_storage::{RpmbError, RpmbStorage};
//!
//! fn boot_state(storage: &mut RpmbStorage) -> Result<u8, RpmbError> {
//!     match storage.read_device_state() {
//!         Err(e) if e.is_safe_default() => Ok(0),
//!         other => other,
//!     }
//! }
//! ```

use crate::device::DeviceError;
use thiserror::Error;

/// Unified error type for all RPMB storage operations
///
/// # Error Categories
///
/// - **NoAuthKeyProgrammed**: the part has never been provisioned
/// - **NotFound**: the record is absent or its magic marker did not match
/// - **Everything else**: fatal to the current boot-security decision
#[derive(Debug, Error)]
pub enum RpmbError {
    /// Transport or hardware failure, propagated as-is
    #[error("RPMB I/O error: {0}")]
    Io(#[source] DeviceError),

    /// Record absent, never written, or corrupted
    #[error("RPMB record not found")]
    NotFound,

    /// The device reports that no authentication key has been programmed
    #[error("RPMB authentication key is not programmed")]
    NoAuthKeyProgrammed,

    /// The random source could not produce key material
    #[error("Random source unavailable: {0}")]
    RandomSource(#[from] rand::Error),

    /// The device rejected the key programming request
    #[error("Failed to program RPMB key: {0}")]
    ProgrammingFailed(#[source] DeviceError),

    /// Rollback index slot beyond the reserved span
    #[error("Rollback index {index} out of range (slots: {slots})")]
    OutOfRange { index: usize, slots: usize },

    /// Invalid configuration or key material
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<DeviceError> for RpmbError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::NotFound => RpmbError::NotFound,
            other => RpmbError::Io(other),
        }
    }
}

impl RpmbError {
    /// Returns true if the caller should run first-time provisioning
    pub fn needs_provisioning(&self) -> bool {
        matches!(self, Self::NoAuthKeyProgrammed)
    }

    /// Returns true if the caller should fall back to a safe default value
    pub fn is_safe_default(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns true if the error must halt the current boot-security decision
    pub fn is_fatal(&self) -> bool {
        !self.needs_provisioning() && !self.is_safe_default()
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NoAuthKeyProgrammed => Some("Provision the RPMB authentication key first"),
            Self::NotFound => Some("Treat the value as unset and use a safe default"),
            Self::OutOfRange { .. } => Some("Rollback index slots are numbered 0..256"),
            Self::Io(DeviceError::AuthenticationFailed) => {
                Some("The in-memory key does not match the key programmed in the device")
            }
            _ => None,
        }
    }
}
