//! Envelope pipeline — byte- and file-level protect/unprotect.
//!
//! Two persistence variants sit on top of any [`Protector`]:
//! [`BinaryPipeline`] writes raw envelope bytes, [`Base64Pipeline`] writes
//! the envelope as UTF-8 base64 text (diff-friendly, ~33% larger).
//!
//! Unprotecting catches only the provider's generic cryptographic-failure
//! kind and surfaces it as a failed [`UnprotectOutcome`]; anything else
//! (i/o, provider unavailable) propagates as a plain error.

use crate::error::{CryptoFailure, ProtectError, ProtectResult};
use crate::protector::Protector;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Result of an unprotect attempt: recovered payload XOR failure cause.
///
/// A recovered outcome cannot carry an error and a failed one cannot carry
/// data, so the invalid "success with error attached" state from older
/// result shapes is unrepresentable.
#[derive(Debug)]
pub enum UnprotectOutcome<T> {
    Recovered(Recovered<T>),
    Failed(ProtectError),
}

/// Successfully unprotected payload plus key-lifecycle metadata.
#[derive(Debug)]
pub struct Recovered<T> {
    pub data: T,
    /// The pipeline was configured with the revoked-key opt-in.
    pub was_dangerous: bool,
    /// Sealed under an old-but-usable key; re-protect when convenient.
    pub requires_migration: bool,
    /// Sealed under an explicitly revoked key.
    pub was_revoked: bool,
}

impl<T> UnprotectOutcome<T> {
    pub fn is_recovered(&self) -> bool {
        matches!(self, UnprotectOutcome::Recovered(_))
    }

    /// Converts a failed outcome back into its underlying error.
    pub fn into_result(self) -> ProtectResult<Recovered<T>> {
        match self {
            UnprotectOutcome::Recovered(r) => Ok(r),
            UnprotectOutcome::Failed(e) => Err(e),
        }
    }
}

/// Byte- and file-level protection operations.
///
/// File operations write back to the source path when `dest` is `None`
/// (exclusively locked for the whole read-transform-write span) or produce
/// a sibling copy when `dest` is given.
pub trait ProtectionPipeline: Send + Sync {
    /// Seals `plain` into this pipeline's persisted form.
    fn protect_bytes(&self, plain: &[u8]) -> ProtectResult<Vec<u8>>;

    /// Opens a payload in this pipeline's persisted form.
    fn unprotect_bytes(&self, raw: &[u8]) -> ProtectResult<UnprotectOutcome<Vec<u8>>>;

    /// Reads and unprotects a file without writing anything back.
    fn unprotect_file_contents(&self, path: &Path) -> ProtectResult<UnprotectOutcome<Vec<u8>>> {
        let raw = fs::read(path)?;
        self.unprotect_bytes(&raw)
    }

    /// Protects the contents of `src`, writing to `dest` or back to `src`.
    fn protect_file(&self, src: &Path, dest: Option<&Path>) -> ProtectResult<()> {
        transform_file(src, dest, &|raw| self.protect_bytes(raw))?;
        debug!("protected {} -> {}", src.display(), dest.unwrap_or(src).display());
        Ok(())
    }

    /// Unprotects the contents of `src`, writing to `dest` or back to `src`.
    ///
    /// A failed outcome is an error here: there is nothing to write.
    fn unprotect_file(&self, src: &Path, dest: Option<&Path>) -> ProtectResult<()> {
        transform_file(src, dest, &|raw| {
            self.unprotect_bytes(raw)?.into_result().map(|r| r.data)
        })
    }
}

impl std::fmt::Debug for dyn ProtectionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ProtectionPipeline")
    }
}

/// Applies `transform` to the contents of `src` and persists the result.
///
/// In-place rewrites hold an exclusive lock on the file from before the
/// read until after the write, so no reader or writer can interleave with
/// a partial overwrite.
fn transform_file(
    src: &Path,
    dest: Option<&Path>,
    transform: &dyn Fn(&[u8]) -> ProtectResult<Vec<u8>>,
) -> ProtectResult<()> {
    match dest {
        None => {
            let mut file = OpenOptions::new().read(true).write(true).open(src)?;
            file.lock_exclusive()?;
            let mut raw = Vec::new();
            file.read_to_end(&mut raw)?;
            let out = transform(&raw)?;
            file.seek(SeekFrom::Start(0))?;
            file.set_len(0)?;
            file.write_all(&out)?;
            file.sync_all()?;
            Ok(())
        }
        Some(dest) => {
            let raw = fs::read(src)?;
            let out = transform(&raw)?;
            let mut file = OpenOptions::new().write(true).create(true).open(dest)?;
            file.lock_exclusive()?;
            file.set_len(0)?;
            file.write_all(&out)?;
            file.sync_all()?;
            Ok(())
        }
    }
}

/// Pipeline persisting raw envelope bytes.
pub struct BinaryPipeline<P> {
    protector: P,
    allow_revoked: bool,
}

impl<P: Protector> BinaryPipeline<P> {
    pub fn new(protector: P) -> Self {
        Self {
            protector,
            allow_revoked: false,
        }
    }

    /// Opts into opening envelopes sealed under revoked keys.
    ///
    /// Recovered outcomes then report `was_dangerous = true`.
    pub fn with_dangerous_unprotect(mut self, allow: bool) -> Self {
        self.allow_revoked = allow;
        self
    }
}

impl<P: Protector> ProtectionPipeline for BinaryPipeline<P> {
    fn protect_bytes(&self, plain: &[u8]) -> ProtectResult<Vec<u8>> {
        self.protector.protect(plain)
    }

    fn unprotect_bytes(&self, raw: &[u8]) -> ProtectResult<UnprotectOutcome<Vec<u8>>> {
        match self.protector.unprotect(raw, self.allow_revoked) {
            Ok(u) => Ok(UnprotectOutcome::Recovered(Recovered {
                data: u.data,
                was_dangerous: self.allow_revoked,
                requires_migration: u.requires_migration,
                was_revoked: u.was_revoked,
            })),
            Err(e) if e.is_cryptographic() => Ok(UnprotectOutcome::Failed(e)),
            Err(e) => Err(e),
        }
    }
}

/// Pipeline persisting envelopes as UTF-8 base64 text.
///
/// Decoding ignores ASCII whitespace, so line-wrapped files written by
/// other tooling still load. Input that is not base64 at all is a
/// "not ciphertext" classification signal, not an error.
pub struct Base64Pipeline<P> {
    inner: BinaryPipeline<P>,
}

impl<P: Protector> Base64Pipeline<P> {
    pub fn new(protector: P) -> Self {
        Self {
            inner: BinaryPipeline::new(protector),
        }
    }

    /// See [`BinaryPipeline::with_dangerous_unprotect`].
    pub fn with_dangerous_unprotect(mut self, allow: bool) -> Self {
        self.inner = self.inner.with_dangerous_unprotect(allow);
        self
    }
}

impl<P: Protector> ProtectionPipeline for Base64Pipeline<P> {
    fn protect_bytes(&self, plain: &[u8]) -> ProtectResult<Vec<u8>> {
        let envelope = self.inner.protect_bytes(plain)?;
        Ok(STANDARD.encode(&envelope).into_bytes())
    }

    fn unprotect_bytes(&self, raw: &[u8]) -> ProtectResult<UnprotectOutcome<Vec<u8>>> {
        let text = match std::str::from_utf8(raw) {
            Ok(t) => t,
            Err(e) => {
                return Ok(UnprotectOutcome::Failed(ProtectError::Cryptographic(
                    CryptoFailure::NotAnEnvelope(format!("not utf-8 text: {e}")),
                )));
            }
        };
        let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let envelope = match STANDARD.decode(compact.as_bytes()) {
            Ok(b) => b,
            Err(e) => {
                return Ok(UnprotectOutcome::Failed(ProtectError::Cryptographic(
                    CryptoFailure::NotAnEnvelope(format!("malformed base64: {e}")),
                )));
            }
        };
        self.inner.unprotect_bytes(&envelope)
    }
}
