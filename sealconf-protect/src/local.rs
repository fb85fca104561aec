//! Local key-ring protector.
//!
//! Default [`Protector`] implementation: XChaCha20-Poly1305 envelopes sealed
//! under a key ring persisted as a local JSON file. The ring holds one
//! primary key plus any number of retired or revoked predecessors, so
//! envelopes written before a rotation keep decrypting (with
//! `requires_migration` set) and revoked keys stay refusable by policy.
//!
//! Envelope layout: 4-byte magic, 16-byte key id, 24-byte nonce, ciphertext.

use crate::error::{CryptoFailure, ProtectError, ProtectResult};
use crate::protector::{Protector, Unprotected};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Leading bytes of every envelope this protector writes.
const ENVELOPE_MAGIC: &[u8; 4] = b"SCP1";

/// Magic + key id + nonce + Poly1305 tag.
const ENVELOPE_MIN_LEN: usize = 4 + 16 + 24 + 16;

const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Raw key bytes. Zeroized on drop, redacted in debug output, stored as
/// base64 in the ring file.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_LEN]);

impl KeyMaterial {
    fn generate() -> Self {
        let key = XChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    fn as_key(&self) -> &Key {
        Key::from_slice(&self.0)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial(REDACTED)")
    }
}

impl Serialize for KeyMaterial {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for KeyMaterial {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = STANDARD
            .decode(&encoded)
            .map_err(serde::de::Error::custom)?;
        if bytes.len() != KEY_LEN {
            return Err(serde::de::Error::custom(format!(
                "key material must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut arr = [0u8; KEY_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// Lifecycle state of a ring key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    /// Usable for protect and unprotect.
    Active,
    /// Usable for unprotect only; envelopes under it report
    /// `requires_migration`.
    Retired,
    /// Refused for unprotect unless the caller opts into revoked use.
    Revoked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RingKey {
    id: Uuid,
    state: KeyState,
    material: KeyMaterial,
}

/// Persisted key ring: one primary plus retired/revoked predecessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyRing {
    primary: Uuid,
    keys: Vec<RingKey>,
}

impl KeyRing {
    fn new() -> Self {
        let key = RingKey {
            id: Uuid::new_v4(),
            state: KeyState::Active,
            material: KeyMaterial::generate(),
        };
        Self {
            primary: key.id,
            keys: vec![key],
        }
    }

    fn find(&self, id: Uuid) -> Option<&RingKey> {
        self.keys.iter().find(|k| k.id == id)
    }
}

/// A [`Protector`] backed by a local key ring.
#[derive(Debug)]
pub struct LocalKeyProtector {
    ring: RwLock<KeyRing>,
    path: Option<PathBuf>,
}

impl LocalKeyProtector {
    /// Creates a protector with a fresh in-memory key ring.
    ///
    /// Nothing is persisted; every instance gets its own key.
    pub fn ephemeral() -> Self {
        Self {
            ring: RwLock::new(KeyRing::new()),
            path: None,
        }
    }

    /// Loads the ring at `path`, or creates and persists a new one if the
    /// file does not exist.
    pub fn open_or_create(path: &Path) -> ProtectResult<Self> {
        let ring = if path.exists() {
            let bytes = fs::read(path)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| ProtectError::KeyStore(format!("invalid key ring file: {e}")))?
        } else {
            KeyRing::new()
        };

        let protector = Self {
            ring: RwLock::new(ring),
            path: Some(path.to_path_buf()),
        };
        if !path.exists() {
            protector.persist()?;
        }
        Ok(protector)
    }

    /// The id of the key new envelopes are sealed under.
    pub fn primary_id(&self) -> Uuid {
        self.ring.read().unwrap().primary
    }

    /// Installs a fresh primary key and retires the current one.
    ///
    /// Existing envelopes keep decrypting and report `requires_migration`.
    pub fn rotate(&self) -> ProtectResult<Uuid> {
        let new_id;
        {
            let mut ring = self.ring.write().unwrap();
            let old_primary = ring.primary;
            for key in &mut ring.keys {
                if key.id == old_primary && key.state == KeyState::Active {
                    key.state = KeyState::Retired;
                }
            }
            let key = RingKey {
                id: Uuid::new_v4(),
                state: KeyState::Active,
                material: KeyMaterial::generate(),
            };
            new_id = key.id;
            ring.primary = key.id;
            ring.keys.push(key);
        }
        self.persist()?;
        Ok(new_id)
    }

    /// Marks a key revoked. Envelopes under it are refused unless the
    /// caller unprotects with the revoked opt-in.
    pub fn revoke(&self, id: Uuid) -> ProtectResult<()> {
        {
            let mut ring = self.ring.write().unwrap();
            let key = ring
                .keys
                .iter_mut()
                .find(|k| k.id == id)
                .ok_or_else(|| ProtectError::KeyStore(format!("no such key: {id}")))?;
            key.state = KeyState::Revoked;
        }
        self.persist()
    }

    fn persist(&self) -> ProtectResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let ring = self.ring.read().unwrap();
        let bytes = serde_json::to_vec_pretty(&*ring)
            .map_err(|e| ProtectError::KeyStore(format!("serialize key ring: {e}")))?;
        fs::write(path, bytes)?;
        Ok(())
    }
}

impl Protector for LocalKeyProtector {
    fn protect(&self, plain: &[u8]) -> ProtectResult<Vec<u8>> {
        let ring = self.ring.read().unwrap();
        let key = ring
            .find(ring.primary)
            .ok_or_else(|| ProtectError::Unavailable("key ring has no primary key".into()))?;
        if key.state == KeyState::Revoked {
            return Err(ProtectError::Unavailable(format!(
                "primary key {} is revoked",
                key.id
            )));
        }

        let cipher = XChaCha20Poly1305::new(key.material.as_key());
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plain)
            .map_err(|_| ProtectError::Unavailable("encryption failed".into()))?;

        let mut envelope = Vec::with_capacity(ENVELOPE_MIN_LEN + plain.len());
        envelope.extend_from_slice(ENVELOPE_MAGIC);
        envelope.extend_from_slice(key.id.as_bytes());
        envelope.extend_from_slice(nonce.as_slice());
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    fn unprotect(&self, envelope: &[u8], allow_revoked: bool) -> ProtectResult<Unprotected> {
        if envelope.len() < ENVELOPE_MIN_LEN {
            return Err(ProtectError::Cryptographic(CryptoFailure::NotAnEnvelope(
                format!("{} bytes is shorter than any envelope", envelope.len()),
            )));
        }
        if &envelope[..4] != ENVELOPE_MAGIC {
            return Err(ProtectError::Cryptographic(CryptoFailure::NotAnEnvelope(
                "missing envelope magic".into(),
            )));
        }

        let mut id_bytes = [0u8; 16];
        id_bytes.copy_from_slice(&envelope[4..20]);
        let key_id = Uuid::from_bytes(id_bytes);
        let nonce = XNonce::from_slice(&envelope[20..20 + NONCE_LEN]);
        let ciphertext = &envelope[20 + NONCE_LEN..];

        let ring = self.ring.read().unwrap();
        let key = ring.find(key_id).ok_or(ProtectError::Cryptographic(
            CryptoFailure::UnknownKey(key_id),
        ))?;

        if key.state == KeyState::Revoked && !allow_revoked {
            return Err(ProtectError::Cryptographic(CryptoFailure::RevokedKey(
                key_id,
            )));
        }

        let cipher = XChaCha20Poly1305::new(key.material.as_key());
        let data = cipher.decrypt(nonce, ciphertext).map_err(|_| {
            ProtectError::Cryptographic(CryptoFailure::Verification(
                "tampered envelope or wrong key material".into(),
            ))
        })?;

        Ok(Unprotected {
            data,
            requires_migration: key_id != ring.primary,
            was_revoked: key.state == KeyState::Revoked,
        })
    }
}
