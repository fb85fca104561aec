//! Protection layer for sealconf.
//!
//! Provides at-rest protection of settings payloads using:
//! - A [`Protector`] capability boundary (protect/unprotect with key
//!   migration and revocation metadata)
//! - A default [`LocalKeyProtector`] built on XChaCha20-Poly1305 with a
//!   persisted JSON key ring
//! - An envelope [`ProtectionPipeline`] in two persistence variants:
//!   raw bytes ([`BinaryPipeline`]) or UTF-8 base64 text
//!   ([`Base64Pipeline`])
//!
//! # Architecture
//!
//! The pipeline never interprets envelope contents; everything key-related
//! stays behind the `Protector` trait. Unprotect attempts return an
//! [`UnprotectOutcome`] — recovered payload XOR failure cause — so callers
//! above (the settings loader) can classify failures without this layer
//! deciding what a failure means.

pub mod error;
pub mod local;
pub mod pipeline;
pub mod protector;

pub use error::{CryptoFailure, ProtectError, ProtectResult};
pub use local::{KeyState, LocalKeyProtector};
pub use pipeline::{
    Base64Pipeline, BinaryPipeline, ProtectionPipeline, Recovered, UnprotectOutcome,
};
pub use protector::{Protector, Unprotected};
