//! Key material and AEAD envelopes
//!
//! Every backend stores 32-byte key material per alias and encrypts with one of
//! two AEADs. Ciphertexts share one envelope layout:
//! `[version(1)][algorithm(1)][nonce(12)][ciphertext(variable)]`.

use crate::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm,
};
use chacha20poly1305::ChaCha20Poly1305;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const ENVELOPE_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 2 + NONCE_LEN;

/// Length of generated key material in bytes
pub const KEY_LEN: usize = 32;

/// Encryption algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    /// AES-256-GCM
    AesGcm,
    /// ChaCha20-Poly1305
    ChaCha20Poly1305,
}

impl EncryptionAlgorithm {
    fn id(self) -> u8 {
        match self {
            EncryptionAlgorithm::AesGcm => 0,
            EncryptionAlgorithm::ChaCha20Poly1305 => 1,
        }
    }
}

/// Secret key bytes, zeroized on drop
#[derive(Clone)]
pub struct KeyMaterial {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyMaterial {
    /// Generate new random key material
    pub fn generate() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key[..]);
        Self { key }
    }

    /// Create from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(Error::Encryption(format!(
                "Invalid key length: expected {}, got {}",
                KEY_LEN,
                bytes.len()
            )));
        }

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// SHA-256 of the key bytes; safe to expose for equality checks
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(&self.key[..]).into()
    }

    /// Encrypt into a versioned envelope
    pub fn encrypt(&self, algorithm: EncryptionAlgorithm, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = match algorithm {
            EncryptionAlgorithm::AesGcm => Aes256Gcm::new_from_slice(&self.key[..])
                .map_err(|e| Error::Encryption(e.to_string()))?
                .encrypt(aes_gcm::Nonce::from_slice(&nonce), plaintext),
            EncryptionAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.key[..])
                .map_err(|e| Error::Encryption(e.to_string()))?
                .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), plaintext),
        }
        .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut result = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        result.push(ENVELOPE_VERSION);
        result.push(algorithm.id());
        result.extend_from_slice(&nonce);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt a versioned envelope produced by [`KeyMaterial::encrypt`]
    pub fn decrypt(&self, algorithm: EncryptionAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < HEADER_LEN {
            return Err(Error::Encryption("Invalid ciphertext length".to_string()));
        }

        if data[0] != ENVELOPE_VERSION {
            return Err(Error::Encryption(format!(
                "Unsupported encryption version: {}",
                data[0]
            )));
        }

        if data[1] != algorithm.id() {
            return Err(Error::Encryption(format!(
                "Algorithm mismatch: expected {:?} ({}), got {}",
                algorithm,
                algorithm.id(),
                data[1]
            )));
        }

        let nonce = &data[2..HEADER_LEN];
        let ciphertext = &data[HEADER_LEN..];

        match algorithm {
            EncryptionAlgorithm::AesGcm => Aes256Gcm::new_from_slice(&self.key[..])
                .map_err(|e| Error::Encryption(e.to_string()))?
                .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext),
            EncryptionAlgorithm::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(&self.key[..])
                .map_err(|e| Error::Encryption(e.to_string()))?
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext),
        }
        .map_err(|e| Error::Encryption(e.to_string()))
    }

    /// Wrap another key under this one
    pub fn wrap(&self, algorithm: EncryptionAlgorithm, key: &KeyMaterial) -> Result<Vec<u8>> {
        self.encrypt(algorithm, key.as_bytes())
    }

    /// Unwrap a key produced by [`KeyMaterial::wrap`]
    pub fn unwrap_key(&self, algorithm: EncryptionAlgorithm, wrapped: &[u8]) -> Result<KeyMaterial> {
        let bytes = Zeroizing::new(self.decrypt(algorithm, wrapped)?);
        KeyMaterial::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial({})", hex::encode(&self.fingerprint()[..4]))
    }
}
