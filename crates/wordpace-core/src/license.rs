//! License key codec
//!
//! A license string is base64 of `salt || nonce || ciphertext`. The cipher key
//! is derived from a shared secret with Argon2id over the salt, and the payload
//! is AES-256-GCM sealed JSON `{ "key": .., "userId": .. }`.

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const TAG_SIZE: usize = 16;

#[derive(Error, Debug)]
pub enum LicenseError {
    #[error("license is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("license is too short ({0} bytes)")]
    Truncated(usize),
    #[error("key derivation failed: {0}")]
    Kdf(String),
    #[error("license could not be decrypted")]
    Cipher,
    #[error("license payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("license has no user id")]
    MissingUserId,
}

pub type Result<T> = std::result::Result<T, LicenseError>;

/// Decrypted license contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub key: String,
    pub user_id: String,
}

/// Argon2id cost parameters
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub mem_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Encrypts and decrypts license strings with a shared secret
#[derive(Clone)]
pub struct LicenseCodec {
    secret: String,
    params: KdfParams,
}

impl std::fmt::Debug for LicenseCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseCodec")
            .field("secret", &"[REDACTED]")
            .field("params", &self.params)
            .finish()
    }
}

impl LicenseCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            params: KdfParams::default(),
        }
    }

    pub fn with_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    /// Decode a license string into its user id and key
    pub fn decrypt(&self, license: &str) -> Result<License> {
        let raw = B64.decode(license.trim())?;
        if raw.len() < SALT_SIZE + NONCE_SIZE + TAG_SIZE {
            return Err(LicenseError::Truncated(raw.len()));
        }

        let (salt, rest) = raw.split_at(SALT_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

        let cipher = self.cipher(salt)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| LicenseError::Cipher)?;

        let license: License = serde_json::from_slice(&plaintext)?;
        if license.user_id.trim().is_empty() {
            return Err(LicenseError::MissingUserId);
        }
        Ok(license)
    }

    /// Issue a license string for the given contents
    pub fn encrypt(&self, license: &License) -> Result<String> {
        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let plaintext = serde_json::to_vec(license)?;
        let ciphertext = self
            .cipher(&salt)?
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_ref())
            .map_err(|_| LicenseError::Cipher)?;

        let mut out = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(B64.encode(out))
    }

    fn cipher(&self, salt: &[u8]) -> Result<Aes256Gcm> {
        let params = Params::new(
            self.params.mem_cost_kib,
            self.params.time_cost,
            self.params.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| LicenseError::Kdf(e.to_string()))?;

        let mut key = [0u8; KEY_SIZE];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(self.secret.as_bytes(), salt, &mut key)
            .map_err(|e| LicenseError::Kdf(e.to_string()))?;

        Aes256Gcm::new_from_slice(&key).map_err(|_| LicenseError::Cipher)
    }
}
