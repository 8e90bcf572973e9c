//! Key-store backends
//!
//! One backend per [`CapabilityTier`]:
//! - [`SoftwareKeyStore`]: unwrapped key material in the preference store
//! - [`FileKeyStore`]: key files sealed under a device key in the app data directory
//! - [`PreferenceKeyStore`]: key records in the preference store, wrapped with
//!   AES-GCM under a key held outside it
//!
//! All backends are shared as `Arc<dyn KeyStore>` and use interior locking.

mod file;
mod preference;
mod software;

pub use file::FileKeyStore;
pub use preference::PreferenceKeyStore;
pub use software::SoftwareKeyStore;

use crate::{CapabilityTier, Error, KeyAlias, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of provisioning one alias
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyProvision {
    /// New key material was generated and stored
    Created,
    /// Key material already existed and was left untouched
    Existing,
}

impl KeyProvision {
    /// New material was written
    pub fn is_created(self) -> bool {
        self == KeyProvision::Created
    }
}

/// Platform handle for backends that live in the app's private storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContext {
    data_dir: PathBuf,
}

impl PlatformContext {
    /// Context rooted at the app data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// App data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding sealed key files
    pub fn keystore_dir(&self) -> PathBuf {
        self.data_dir.join("keystore")
    }
}

/// Secure key storage bound to one capability tier
///
/// `init` must succeed before any other operation; until then operations
/// fail with [`Error::NotInitialized`].
pub trait KeyStore: Send + Sync {
    /// Tier this backend implements
    fn tier(&self) -> CapabilityTier;

    /// Open or create the underlying storage facility
    fn init(&self) -> Result<()>;

    /// Ensure key material exists under `alias`.
    ///
    /// Existing material is never replaced.
    fn create_keys(&self, alias: KeyAlias) -> Result<KeyProvision>;

    /// Key material exists under `alias`
    fn has_key(&self, alias: KeyAlias) -> Result<bool>;

    /// SHA-256 of the key material under `alias`
    fn fingerprint(&self, alias: KeyAlias) -> Result<Option<[u8; 32]>>;

    /// Encrypt with the key under `alias`
    fn encrypt(&self, alias: KeyAlias, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt with the key under `alias`
    fn decrypt(&self, alias: KeyAlias, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Encrypt text into a base64 envelope
    fn encrypt_string(&self, alias: KeyAlias, text: &str) -> Result<String> {
        Ok(STANDARD.encode(self.encrypt(alias, text.as_bytes())?))
    }

    /// Decrypt a base64 envelope produced by [`KeyStore::encrypt_string`]
    fn decrypt_string(&self, alias: KeyAlias, encoded: &str) -> Result<String> {
        let ciphertext = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::Encryption(format!("Invalid base64: {}", e)))?;
        let plaintext = self.decrypt(alias, &ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::Encryption("Decrypted text is not UTF-8".to_string()))
    }
}

/// Write via a temp file and rename so readers never see a partial file.
///
/// The file is owner-only (0600) on unix from the moment it is created.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Checks every backend must pass once initialized
    pub fn exercise_initialized(store: &dyn KeyStore) {
        for alias in KeyAlias::ALL {
            assert!(!store.has_key(alias).unwrap());
            assert_eq!(store.fingerprint(alias).unwrap(), None);
        }

        assert_eq!(store.create_keys(KeyAlias::Salt).unwrap(), KeyProvision::Created);
        let first = store.fingerprint(KeyAlias::Salt).unwrap();
        assert!(first.is_some());

        assert_eq!(store.create_keys(KeyAlias::Salt).unwrap(), KeyProvision::Existing);
        assert_eq!(store.fingerprint(KeyAlias::Salt).unwrap(), first);

        store.create_keys(KeyAlias::AccountKey).unwrap();
        assert_ne!(
            store.fingerprint(KeyAlias::AccountKey).unwrap(),
            store.fingerprint(KeyAlias::Salt).unwrap()
        );

        let ciphertext = store.encrypt(KeyAlias::Salt, b"private key").unwrap();
        assert_eq!(
            store.decrypt(KeyAlias::Salt, &ciphertext).unwrap(),
            b"private key".to_vec()
        );
        assert!(store.decrypt(KeyAlias::AccountKey, &ciphertext).is_err());

        let text = store.encrypt_string(KeyAlias::AccountKey, "TXYZ").unwrap();
        assert_eq!(store.decrypt_string(KeyAlias::AccountKey, &text).unwrap(), "TXYZ");

        assert!(matches!(
            store.encrypt(KeyAlias::AddressKey, b"x"),
            Err(Error::KeyNotFound(KeyAlias::AddressKey))
        ));
    }
}
