//! Client configuration.
//!
//! Passed as JSON through [`crate::create_client`]; every field is optional.
//!
//! ```rust
//! use ecosafe_core::config::{ClientConfig, FallbackPolicy};
//!
//! let config = ClientConfig::from_json(r#"{"api_base_url":"http://10.0.2.2:8080/api","timeout_ms":2000}"#)?;
//! assert_eq!(config.timeout_ms, 2000);
//! assert_eq!(config.fallback_policy, FallbackPolicy::Sticky);
//! # Ok::<(), serde_json::Error>(())
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FacadeError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DATA_DIR: &str = "ecosafe_data";

/// When the facade stops probing the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// A session established through the fallback stays local until logout.
    #[default]
    Sticky,
    /// Every call tries the remote first and falls back on its own.
    PerCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub timeout_ms: u64,
    pub fallback_policy: FallbackPolicy,
    /// Never call the remote API.
    pub offline_only: bool,
    /// Write fallback collections to the local store after each mutation.
    pub persist_fallback: bool,
    /// Directory holding the LMDB environment.
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            fallback_policy: FallbackPolicy::default(),
            offline_only: false,
            persist_fallback: true,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), FacadeError> {
        if self.api_base_url.trim().is_empty() {
            return Err(FacadeError::validation("api_base_url must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(FacadeError::validation("timeout_ms must be greater than zero"));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(FacadeError::validation("data_dir must not be empty"));
        }
        Ok(())
    }
}
