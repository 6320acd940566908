//! Persisted client settings: the storage backend abstraction and the
//! degraded-save adapter that keeps configuration writes from ever blocking
//! the caller.

mod file;
mod settings;

pub use file::FileBackend;
pub use settings::{SettingsStore, TrimThresholds};

use std::error::Error;

use thiserror::Error;

/// Storage key for the versioned configuration record.
pub const CONFIG_KEY: &str = "config_v1";
/// Storage key for the controller base-URL string.
pub const CONTROLLER_URL_KEY: &str = "controller_url_v1";

/// Result alias for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by settings backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write was rejected because it would exceed the backend's capacity.
    #[error("storage capacity exceeded ({needed} bytes needed, {capacity} available)")]
    QuotaExceeded {
        /// Total bytes the store would hold after the write.
        needed: usize,
        /// Capacity limit of the backend.
        capacity: usize,
    },
    /// The backend failed for a reason other than capacity.
    #[error("storage backend failure: {message}")]
    Backend {
        /// Human-readable description of the failed operation.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StoreError {
    /// Construct a backend error from any underlying failure.
    pub fn backend(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StoreError::Backend {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error is the capacity-exceeded case that triggers a
    /// degraded save.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, StoreError::QuotaExceeded { .. })
    }
}

/// Abstraction over the key-value medium that keeps client settings across
/// restarts. Implementations report capacity rejections as
/// [`StoreError::QuotaExceeded`] so the adapter can retry with a trimmed
/// record.
pub trait SettingsBackend: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn load(&self, key: &str) -> StoreResult<Option<String>>;
    /// Write `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> StoreResult<()>;
    /// Delete the value stored under `key`. Removing a missing key is not an
    /// error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
