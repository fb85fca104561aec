//! Settings loading for sealconf.
//!
//! Turns settings files that may be encrypted at rest into the flat
//! key/value map a hierarchical configuration system consumes:
//!
//! 1. [`SettingsLoader`] asks the protection pipeline to unprotect the
//!    file bytes, classifying ambiguous failures (corrupt ciphertext vs.
//!    a file that was never encrypted) and optionally self-healing by
//!    re-encrypting plaintext files on first run.
//! 2. [`flatten_json`] converts the recovered JSON document into a
//!    [`FlatConfigMap`]: `:`-joined, case-insensitively unique path keys
//!    mapping to scalar string projections.
//!
//! The cryptographic capability itself lives in `sealconf-protect`; this
//! crate only consumes it.

pub mod error;
pub mod flatten;
pub mod loader;
pub mod shared;

pub use error::{ConfigError, ConfigResult};
pub use flatten::{flatten_json, FlatConfigMap, FlatKey, KEY_SEPARATOR};
pub use loader::{
    classify_not_an_envelope, PlaintextClassifier, SettingsLoader, SkipCondition,
    WritebackObserver,
};
pub use shared::{init_shared_pipeline, shared_pipeline};
