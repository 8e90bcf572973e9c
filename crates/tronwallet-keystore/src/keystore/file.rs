//! Key files sealed under a per-device key
//!
//! Layout under `<data_dir>/keystore/`:
//! - `device.key`: 32-byte device key, created on first `init`
//! - `<alias>.sealed`: alias material sealed with ChaCha20-Poly1305

use super::{write_atomic, KeyProvision, KeyStore, PlatformContext};
use crate::security::{EncryptionAlgorithm, KeyMaterial};
use crate::{CapabilityTier, Error, KeyAlias, Result};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

const ALGORITHM: EncryptionAlgorithm = EncryptionAlgorithm::ChaCha20Poly1305;
const DEVICE_KEY_FILE: &str = "device.key";

/// File-backed key store in the app's private data directory
pub struct FileKeyStore {
    root: PathBuf,
    device_key: RwLock<Option<KeyMaterial>>,
}

impl FileKeyStore {
    /// Create uninitialized store for `platform`
    pub fn new(platform: &PlatformContext) -> Self {
        Self {
            root: platform.keystore_dir(),
            device_key: RwLock::new(None),
        }
    }

    /// Directory holding the key files
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn alias_path(&self, alias: KeyAlias) -> PathBuf {
        self.root.join(format!("{}.sealed", alias.name()))
    }

    fn load_or_create_device_key(&self) -> Result<KeyMaterial> {
        let path = self.root.join(DEVICE_KEY_FILE);
        if path.exists() {
            let bytes = Zeroizing::new(fs::read(&path)?);
            return KeyMaterial::from_bytes(&bytes)
                .map_err(|e| Error::storage_init(self.tier(), format!("Corrupted device key: {}", e)));
        }

        let key = KeyMaterial::generate();
        write_atomic(&path, key.as_bytes())?;
        tracing::debug!("Created device key at {}", path.display());
        Ok(key)
    }

    fn load(&self, alias: KeyAlias) -> Result<KeyMaterial> {
        let guard = self.device_key.read();
        let device_key = guard.as_ref().ok_or(Error::NotInitialized(self.tier()))?;

        let path = self.alias_path(alias);
        if !path.exists() {
            return Err(Error::KeyNotFound(alias));
        }
        let sealed = fs::read(&path)?;
        device_key.unwrap_key(ALGORITHM, &sealed)
    }
}

impl KeyStore for FileKeyStore {
    fn tier(&self) -> CapabilityTier {
        CapabilityTier::Sealed
    }

    fn init(&self) -> Result<()> {
        let mut device_key = self.device_key.write();
        if device_key.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&self.root).map_err(|e| {
            Error::storage_init(
                self.tier(),
                format!("Cannot create {}: {}", self.root.display(), e),
            )
        })?;

        let key = self.load_or_create_device_key().map_err(|e| match e {
            Error::StorageInit { .. } => e,
            other => Error::storage_init(self.tier(), other),
        })?;
        *device_key = Some(key);
        Ok(())
    }

    fn create_keys(&self, alias: KeyAlias) -> Result<KeyProvision> {
        // Write lock serializes the exists-check with the write
        let guard = self.device_key.write();
        let device_key = guard.as_ref().ok_or(Error::NotInitialized(self.tier()))?;

        let path = self.alias_path(alias);
        if path.exists() {
            return Ok(KeyProvision::Existing);
        }

        let material = KeyMaterial::generate();
        let sealed = device_key
            .wrap(ALGORITHM, &material)
            .map_err(|e| Error::key_creation(alias, e))?;
        write_atomic(&path, &sealed).map_err(|e| Error::key_creation(alias, e))?;
        Ok(KeyProvision::Created)
    }

    fn has_key(&self, alias: KeyAlias) -> Result<bool> {
        if self.device_key.read().is_none() {
            return Err(Error::NotInitialized(self.tier()));
        }
        Ok(self.alias_path(alias).exists())
    }

    fn fingerprint(&self, alias: KeyAlias) -> Result<Option<[u8; 32]>> {
        match self.load(alias) {
            Ok(key) => Ok(Some(key.fingerprint())),
            Err(Error::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn encrypt(&self, alias: KeyAlias, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.load(alias)?.encrypt(ALGORITHM, plaintext)
    }

    fn decrypt(&self, alias: KeyAlias, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.load(alias)?.decrypt(ALGORITHM, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::test_support::exercise_initialized;
    use tempfile::TempDir;

    #[test]
    fn test_file_store() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(&PlatformContext::new(dir.path()));
        store.init().unwrap();
        exercise_initialized(&store);
    }

    #[test]
    fn test_keys_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let platform = PlatformContext::new(dir.path());

        let store = FileKeyStore::new(&platform);
        store.init().unwrap();
        store.create_keys(KeyAlias::PasswordKey).unwrap();
        let fingerprint = store.fingerprint(KeyAlias::PasswordKey).unwrap();
        let ciphertext = store.encrypt(KeyAlias::PasswordKey, b"hash").unwrap();
        drop(store);

        let reopened = FileKeyStore::new(&platform);
        reopened.init().unwrap();
        assert_eq!(
            reopened.create_keys(KeyAlias::PasswordKey).unwrap(),
            KeyProvision::Existing
        );
        assert_eq!(reopened.fingerprint(KeyAlias::PasswordKey).unwrap(), fingerprint);
        assert_eq!(
            reopened.decrypt(KeyAlias::PasswordKey, &ciphertext).unwrap(),
            b"hash".to_vec()
        );
    }

    #[test]
    fn test_sealed_file_does_not_contain_key() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(&PlatformContext::new(dir.path()));
        store.init().unwrap();
        store.create_keys(KeyAlias::Salt).unwrap();

        let sealed = fs::read(store.root().join("tron_salt.sealed")).unwrap();
        let device = fs::read(store.root().join(DEVICE_KEY_FILE)).unwrap();
        assert_eq!(device.len(), 32);
        assert!(sealed.len() > 32);
        assert!(!sealed.windows(device.len()).any(|w| w == device.as_slice()));
    }

    #[test]
    fn test_corrupted_device_key_fails_init() {
        let dir = TempDir::new().unwrap();
        let platform = PlatformContext::new(dir.path());
        fs::create_dir_all(platform.keystore_dir()).unwrap();
        fs::write(platform.keystore_dir().join(DEVICE_KEY_FILE), b"short").unwrap();

        let store = FileKeyStore::new(&platform);
        assert!(matches!(
            store.init(),
            Err(Error::StorageInit {
                tier: CapabilityTier::Sealed,
                ..
            })
        ));
    }

    #[test]
    fn test_unwritable_root_fails_init() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("data");
        fs::write(&blocker, b"not a directory").unwrap();

        let store = FileKeyStore::new(&PlatformContext::new(&blocker));
        assert!(matches!(store.init(), Err(Error::StorageInit { .. })));
    }

    #[test]
    fn test_requires_init() {
        let dir = TempDir::new().unwrap();
        let store = FileKeyStore::new(&PlatformContext::new(dir.path()));
        assert!(matches!(
            store.has_key(KeyAlias::Salt),
            Err(Error::NotInitialized(CapabilityTier::Sealed))
        ));
    }
}
