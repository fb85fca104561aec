//! Protection layer error types.

use thiserror::Error;
use uuid::Uuid;

/// Result type for protection operations.
pub type ProtectResult<T> = Result<T, ProtectError>;

/// Errors that can occur while protecting or unprotecting payloads.
#[derive(Debug, Error)]
pub enum ProtectError {
    /// The provider's single generic cryptographic-failure kind.
    ///
    /// Covers everything from "this is not an envelope at all" to "the key
    /// was rotated away". Callers that need to tell those apart inspect the
    /// structured [`CryptoFailure`] payload instead of matching strings.
    #[error("cryptographic failure: {0}")]
    Cryptographic(CryptoFailure),

    /// The provider cannot currently protect or unprotect anything.
    #[error("protector unavailable: {0}")]
    Unavailable(String),

    /// The key ring file is missing, unreadable, or corrupt.
    #[error("key store error: {0}")]
    KeyStore(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtectError {
    /// Whether this is the generic cryptographic-failure kind that
    /// unprotect pipelines catch and convert into a failed outcome.
    pub fn is_cryptographic(&self) -> bool {
        matches!(self, ProtectError::Cryptographic(_))
    }
}

/// Provider-specific payload carried by [`ProtectError::Cryptographic`].
///
/// The same failure kind can mean "plaintext file" or "key rotated away";
/// this payload is what classification predicates inspect to decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoFailure {
    /// The input does not carry a recognizable envelope header.
    NotAnEnvelope(String),
    /// The envelope references a key this protector does not hold.
    UnknownKey(Uuid),
    /// The referenced key is revoked and revoked use was not allowed.
    RevokedKey(Uuid),
    /// Authentication failed — tampered envelope or wrong key material.
    Verification(String),
}

impl std::fmt::Display for CryptoFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoFailure::NotAnEnvelope(reason) => {
                write!(f, "not a protected envelope: {reason}")
            }
            CryptoFailure::UnknownKey(id) => write!(f, "unknown key {id}"),
            CryptoFailure::RevokedKey(id) => write!(f, "key {id} is revoked"),
            CryptoFailure::Verification(reason) => {
                write!(f, "envelope verification failed: {reason}")
            }
        }
    }
}
