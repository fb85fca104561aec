//! The protect/unprotect capability boundary.
//!
//! Key management, rotation, and revocation live behind this trait. The
//! pipeline and everything above it only ever see opaque envelope bytes
//! plus the migration/revocation metadata carried on [`Unprotected`].

use crate::error::ProtectResult;

/// Decrypted payload plus key-lifecycle metadata from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unprotected {
    /// The recovered plaintext.
    pub data: Vec<u8>,
    /// The envelope was sealed under an old-but-usable key; callers should
    /// re-protect at the next opportunity.
    pub requires_migration: bool,
    /// The envelope was sealed under an explicitly revoked key and was only
    /// opened because the caller allowed it.
    pub was_revoked: bool,
}

/// An encrypt/decrypt capability with persisted keys.
///
/// Implementations must tolerate concurrent use by multiple callers —
/// every method takes `&self` and the trait requires `Send + Sync`.
pub trait Protector: Send + Sync {
    /// Seals `plain` into an opaque envelope.
    ///
    /// Only fails on unrecoverable provider state (for example a revoked
    /// primary key); such errors propagate to the caller untouched.
    fn protect(&self, plain: &[u8]) -> ProtectResult<Vec<u8>>;

    /// Opens an envelope produced by [`Protector::protect`].
    ///
    /// `allow_revoked` is the explicit dangerous opt-in: without it,
    /// envelopes sealed under a revoked key fail with the generic
    /// cryptographic kind.
    fn unprotect(&self, envelope: &[u8], allow_revoked: bool) -> ProtectResult<Unprotected>;
}
