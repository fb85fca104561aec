//! Settings loading error types.

use sealconf_protect::ProtectError;
use thiserror::Error;

/// Result type for settings loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading and flattening settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The content is neither valid ciphertext nor valid JSON.
    #[error("settings content is not valid JSON: {0}")]
    Format(String),

    /// A classified genuine cryptographic failure.
    #[error("settings decryption failed: {0}")]
    Decryption(#[source] ProtectError),

    /// Two property paths normalize to the same flat key.
    #[error("duplicate settings key '{0}'")]
    DuplicateKey(String),

    /// Missing required setup (no pipeline configured, no path set, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
