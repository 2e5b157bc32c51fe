//! Storage configuration
//!
//! ```json
//! { "backend": "simulated", "simulated_image": "/tmp/rpmb.img" }
//! ```

use crate::backend::BackendKind;
use crate::error::RpmbError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend bound at initialization
    #[serde(default)]
    pub backend: BackendKind,

    /// Image file for the simulated backend; in-memory when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulated_image: Option<PathBuf>,
}

impl StorageConfig {
    pub fn real() -> Self {
        Self {
            backend: BackendKind::Real,
            simulated_image: None,
        }
    }

    pub fn simulated(image: Option<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Simulated,
            simulated_image: image,
        }
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, RpmbError> {
        let config: Self = serde_json::from_str(json)?;
        if config.backend == BackendKind::Real && config.simulated_image.is_some() {
            return Err(RpmbError::Config(
                "simulated_image is only valid with the simulated backend".to_string(),
            ));
        }
        Ok(config)
    }
}
