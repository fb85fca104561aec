//! Decrypt-or-bootstrap settings loading.
//!
//! [`SettingsLoader`] wraps a [`ProtectionPipeline`] and turns raw file
//! bytes into a [`FlatConfigMap`]:
//!
//! - Decrypt success → decoded text must be valid JSON (a successful-but-
//!   meaningless decrypt is never silently accepted).
//! - Decrypt failure → a classification predicate decides whether the
//!   content is a plaintext candidate (a not-yet-encrypted file) or a
//!   genuine cryptographic failure. The same provider signal can mean
//!   either, so the predicate is injectable.
//! - Classified plaintext → validated as JSON and, when the first-run
//!   policy is enabled, re-encrypted in place as a side effect. A failed
//!   re-encryption never masks the successful load.

use crate::error::{ConfigError, ConfigResult};
use crate::flatten::{flatten_json, FlatConfigMap};
use sealconf_protect::{CryptoFailure, ProtectError, ProtectionPipeline, UnprotectOutcome};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Decides whether a failed unprotect means "this was never encrypted".
pub type PlaintextClassifier = Arc<dyn Fn(&ProtectError) -> bool + Send + Sync>;

/// Receives write-back errors that did not fail the load.
pub type WritebackObserver = Arc<dyn Fn(&ProtectError) + Send + Sync>;

/// When true at load time, bypasses decryption entirely.
pub type SkipCondition = Arc<dyn Fn() -> bool + Send + Sync>;

/// Default classifier: only "not an envelope" signals (missing magic, short
/// input, malformed base64) are plaintext candidates. A well-formed envelope
/// under an unknown or revoked key is never a plaintext file, so those stay
/// hard failures.
pub fn classify_not_an_envelope(error: &ProtectError) -> bool {
    matches!(
        error,
        ProtectError::Cryptographic(CryptoFailure::NotAnEnvelope(_))
    )
}

/// Loads settings files that may be encrypted at rest.
pub struct SettingsLoader {
    pipeline: Arc<dyn ProtectionPipeline>,
    encrypt_on_first_run: bool,
    classifier: PlaintextClassifier,
    writeback_observer: Option<WritebackObserver>,
    skip_condition: Option<SkipCondition>,
}

impl SettingsLoader {
    pub fn new(pipeline: Arc<dyn ProtectionPipeline>) -> Self {
        Self {
            pipeline,
            encrypt_on_first_run: false,
            classifier: Arc::new(classify_not_an_envelope),
            writeback_observer: None,
            skip_condition: None,
        }
    }

    /// Enables the first-run bootstrap: a classified-plaintext file is
    /// re-encrypted in place and the load proceeds with its contents.
    ///
    /// The write-back is a one-way migration with no rollback.
    pub fn with_encrypt_on_first_run(mut self, enabled: bool) -> Self {
        self.encrypt_on_first_run = enabled;
        self
    }

    /// Replaces the plaintext classification predicate.
    pub fn with_classifier(mut self, classifier: PlaintextClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Registers a callback for write-back errors. The callback fires in
    /// addition to the warning log; the load result is unaffected.
    pub fn with_writeback_observer(mut self, observer: WritebackObserver) -> Self {
        self.writeback_observer = Some(observer);
        self
    }

    /// Registers a predicate that, when true at load time, treats the file
    /// as plaintext JSON and skips the pipeline entirely — no decryption,
    /// no write-back. Intended for development environments.
    pub fn with_skip_condition(mut self, condition: SkipCondition) -> Self {
        self.skip_condition = Some(condition);
        self
    }

    /// Reads `path` and loads it, using the same path for any first-run
    /// write-back.
    pub fn load_file(&self, path: &Path) -> ConfigResult<FlatConfigMap> {
        let raw = fs::read(path)?;
        self.load_bytes(&raw, Some(path))
    }

    /// Loads raw settings bytes. `writeback` is the target for first-run
    /// re-encryption; pass `None` when the bytes have no backing file.
    pub fn load_bytes(&self, raw: &[u8], writeback: Option<&Path>) -> ConfigResult<FlatConfigMap> {
        if self.skip_condition.as_ref().is_some_and(|skip| skip()) {
            debug!("skip condition active, loading settings as plaintext");
            return flatten_json(utf8(raw)?);
        }

        let outcome = self
            .pipeline
            .unprotect_bytes(raw)
            .map_err(ConfigError::Decryption)?;

        match outcome {
            UnprotectOutcome::Recovered(recovered) => {
                if recovered.requires_migration {
                    debug!("settings were sealed under a retired key; consider re-protecting");
                }
                if recovered.was_revoked {
                    warn!("settings were decrypted under a revoked key");
                }
                let text = String::from_utf8(recovered.data).map_err(|e| {
                    ConfigError::Format(format!("decrypted settings are not utf-8: {e}"))
                })?;
                flatten_json(&text)
            }
            UnprotectOutcome::Failed(cause) => self.bootstrap(raw, writeback, cause),
        }
    }

    /// The classified-failure path: decide plaintext-candidate vs. hard
    /// failure, validate, optionally re-encrypt.
    fn bootstrap(
        &self,
        raw: &[u8],
        writeback: Option<&Path>,
        cause: ProtectError,
    ) -> ConfigResult<FlatConfigMap> {
        if !(self.classifier)(&cause) {
            return Err(ConfigError::Decryption(cause));
        }
        debug!("unprotect failed with a plaintext-candidate signal: {cause}");

        // Neither ciphertext nor JSON is a format problem, and it must be
        // caught before any write-back encrypts garbage.
        let map = flatten_json(utf8(raw)?)?;

        if !self.encrypt_on_first_run {
            return Err(ConfigError::Decryption(cause));
        }

        if let Some(path) = writeback {
            match self.pipeline.protect_file(path, None) {
                Ok(()) => debug!("re-encrypted {} on first run", path.display()),
                Err(e) => {
                    warn!("first-run re-encryption of {} failed: {e}", path.display());
                    if let Some(observer) = &self.writeback_observer {
                        observer(&e);
                    }
                }
            }
        }

        Ok(map)
    }
}

fn utf8(raw: &[u8]) -> ConfigResult<&str> {
    std::str::from_utf8(raw)
        .map_err(|e| ConfigError::Format(format!("settings are not utf-8 text: {e}")))
}
