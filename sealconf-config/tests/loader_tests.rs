//! Tests for decrypt-or-bootstrap loading.

use sealconf_config::{ConfigError, FlatKey, SettingsLoader};
use sealconf_protect::{
    Base64Pipeline, BinaryPipeline, LocalKeyProtector, ProtectionPipeline,
};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

const SETTINGS: &str = r#"{"Logging": {"Level": "Warning"}, "Retries": 3}"#;

fn base64_pipeline() -> Arc<dyn ProtectionPipeline> {
    Arc::new(Base64Pipeline::new(LocalKeyProtector::ephemeral()))
}

fn settings_file(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("appsettings.json");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

fn assert_settings_map(map: &sealconf_config::FlatConfigMap) {
    assert_eq!(
        map.get(&FlatKey::new("Logging:Level")),
        Some(&Some("Warning".to_string()))
    );
    assert_eq!(
        map.get(&FlatKey::new("retries")),
        Some(&Some("3".to_string()))
    );
}

#[test]
fn loads_an_encrypted_file() {
    let pipeline = base64_pipeline();
    let (_dir, path) = settings_file(SETTINGS.as_bytes());
    pipeline.protect_file(&path, None).unwrap();

    let loader = SettingsLoader::new(pipeline);
    let map = loader.load_file(&path).unwrap();
    assert_settings_map(&map);
}

#[test]
fn loads_an_encrypted_file_through_the_binary_pipeline() {
    let pipeline: Arc<dyn ProtectionPipeline> =
        Arc::new(BinaryPipeline::new(LocalKeyProtector::ephemeral()));
    let (_dir, path) = settings_file(SETTINGS.as_bytes());
    pipeline.protect_file(&path, None).unwrap();

    let loader = SettingsLoader::new(pipeline);
    let map = loader.load_file(&path).unwrap();
    assert_settings_map(&map);
}

#[test]
fn first_run_policy_reencrypts_plaintext_and_converges() {
    let pipeline = base64_pipeline();
    let (_dir, path) = settings_file(SETTINGS.as_bytes());

    let loader = SettingsLoader::new(pipeline.clone()).with_encrypt_on_first_run(true);

    // First load: plaintext goes through the bootstrap path and gets sealed
    let map = loader.load_file(&path).unwrap();
    assert_settings_map(&map);

    let sealed = fs::read(&path).unwrap();
    assert_ne!(sealed, SETTINGS.as_bytes(), "file should be re-encrypted");

    // Second load: decrypt-success path, no further rewrite
    let map = loader.load_file(&path).unwrap();
    assert_settings_map(&map);
    assert_eq!(fs::read(&path).unwrap(), sealed, "converged file should be stable");

    // The sealed file still decrypts to the original document
    let outcome = pipeline.unprotect_file_contents(&path).unwrap();
    assert_eq!(outcome.into_result().unwrap().data, SETTINGS.as_bytes());
}

#[test]
fn plaintext_without_the_policy_fails_with_decryption() {
    let pipeline = base64_pipeline();
    let (_dir, path) = settings_file(SETTINGS.as_bytes());

    let loader = SettingsLoader::new(pipeline);
    let err = loader.load_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Decryption(_)));

    // No write-back happened
    assert_eq!(fs::read(&path).unwrap(), SETTINGS.as_bytes());
}

#[test]
fn garbage_fails_with_format_and_performs_no_writeback() {
    let pipeline = base64_pipeline();
    let (_dir, path) = settings_file(b"neither ciphertext nor json!");

    let loader = SettingsLoader::new(pipeline).with_encrypt_on_first_run(true);
    let err = loader.load_file(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Format(_)));

    assert_eq!(fs::read(&path).unwrap(), b"neither ciphertext nor json!");
}

#[test]
fn successful_decrypt_of_non_json_is_a_format_error() {
    let pipeline = base64_pipeline();
    let sealed = pipeline.protect_bytes(b"hello, not json").unwrap();

    let loader = SettingsLoader::new(pipeline);
    let err = loader.load_bytes(&sealed, None).unwrap_err();
    assert!(matches!(err, ConfigError::Format(_)));
}

#[test]
fn duplicate_keys_surface_from_the_decrypt_path() {
    let pipeline = base64_pipeline();
    let sealed = pipeline.protect_bytes(br#"{"a": 1, "A": 2}"#).unwrap();

    let loader = SettingsLoader::new(pipeline);
    let err = loader.load_bytes(&sealed, None).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateKey(_)));
}

#[test]
fn writeback_failure_does_not_mask_the_load() {
    let pipeline = base64_pipeline();
    let dir = tempfile::tempdir().unwrap();
    // Points into a directory that does not exist, so the rewrite must fail
    let missing = dir.path().join("absent").join("appsettings.json");

    let observed = Arc::new(AtomicBool::new(false));
    let seen = observed.clone();

    let loader = SettingsLoader::new(pipeline)
        .with_encrypt_on_first_run(true)
        .with_writeback_observer(Arc::new(move |_| {
            seen.store(true, Ordering::SeqCst);
        }));

    let map = loader
        .load_bytes(SETTINGS.as_bytes(), Some(&missing))
        .unwrap();
    assert_settings_map(&map);
    assert!(observed.load(Ordering::SeqCst), "observer should see the failure");
}

#[test]
fn load_bytes_without_a_writeback_target_still_succeeds() {
    let loader = SettingsLoader::new(base64_pipeline()).with_encrypt_on_first_run(true);

    let map = loader.load_bytes(SETTINGS.as_bytes(), None).unwrap();
    assert_settings_map(&map);
}

#[test]
fn foreign_key_envelope_is_a_hard_decryption_failure() {
    // Sealed under one ring, loaded with another — the envelope is well
    // formed, so this must never classify as plaintext
    let sealing = base64_pipeline();
    let sealed = sealing.protect_bytes(SETTINGS.as_bytes()).unwrap();

    let loader = SettingsLoader::new(base64_pipeline()).with_encrypt_on_first_run(true);
    let err = loader.load_bytes(&sealed, None).unwrap_err();
    assert!(matches!(err, ConfigError::Decryption(_)));
}

#[test]
fn custom_classifier_can_reject_the_bootstrap() {
    let loader = SettingsLoader::new(base64_pipeline())
        .with_encrypt_on_first_run(true)
        .with_classifier(Arc::new(|_| false));

    let err = loader.load_bytes(SETTINGS.as_bytes(), None).unwrap_err();
    assert!(matches!(err, ConfigError::Decryption(_)));
}

#[test]
fn skip_condition_bypasses_the_pipeline() {
    let pipeline = base64_pipeline();
    let (_dir, path) = settings_file(SETTINGS.as_bytes());

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();

    let loader = SettingsLoader::new(pipeline)
        .with_encrypt_on_first_run(true)
        .with_skip_condition(Arc::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
            true
        }));

    let map = loader.load_file(&path).unwrap();
    assert_settings_map(&map);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Skipped loads never rewrite the file
    assert_eq!(fs::read(&path).unwrap(), SETTINGS.as_bytes());
}

#[test]
fn missing_file_is_an_io_error() {
    let loader = SettingsLoader::new(base64_pipeline());
    let dir = tempfile::tempdir().unwrap();

    let err = loader.load_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
