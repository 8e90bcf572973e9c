//! Key records wrapped with AES-GCM and kept in the preference store
//!
//! The wrapping key stands in for the platform's non-exportable hardware key
//! and never enters the preference store: it lives in
//! `<data_dir>/keystore/hardware.key` (0600). A copy of the preference
//! database alone does not expose any alias material.

use super::{write_atomic, KeyProvision, KeyStore, PlatformContext};
use crate::security::{EncryptionAlgorithm, KeyMaterial};
use crate::{CapabilityTier, Error, KeyAlias, Preferences, Result};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

const ALGORITHM: EncryptionAlgorithm = EncryptionAlgorithm::AesGcm;
const WRAPPING_KEY_FILE: &str = "hardware.key";

/// Where earlier builds kept the wrapping key; moved out on `init`
const LEGACY_WRAPPING_KEY_PREF: &str = "keystore.wrapping_key";

fn alias_pref(alias: KeyAlias) -> String {
    format!("keystore.{}", alias.name())
}

/// Hardware-tier key store persisted through [`Preferences`]
pub struct PreferenceKeyStore {
    preferences: Arc<dyn Preferences>,
    key_dir: PathBuf,
    wrapping_key: RwLock<Option<KeyMaterial>>,
}

impl PreferenceKeyStore {
    /// Create uninitialized store over `preferences`, with the wrapping key
    /// under `platform`'s key directory
    pub fn new(platform: &PlatformContext, preferences: Arc<dyn Preferences>) -> Self {
        Self {
            preferences,
            key_dir: platform.keystore_dir(),
            wrapping_key: RwLock::new(None),
        }
    }

    /// Wrapping key file
    pub fn wrapping_key_path(&self) -> PathBuf {
        self.key_dir.join(WRAPPING_KEY_FILE)
    }

    fn load_or_create_wrapping_key(&self) -> Result<KeyMaterial> {
        let path = self.wrapping_key_path();
        let legacy = self
            .preferences
            .get_blob(LEGACY_WRAPPING_KEY_PREF)?
            .map(Zeroizing::new);

        let key = if path.exists() {
            read_key(&path)?
        } else {
            let key = match &legacy {
                Some(bytes) => KeyMaterial::from_bytes(bytes)
                    .map_err(|e| Error::Preferences(format!("Corrupted wrapping key: {}", e)))?,
                None => KeyMaterial::generate(),
            };
            fs::create_dir_all(&self.key_dir)?;
            write_atomic(&path, key.as_bytes())?;
            tracing::debug!("Wrote hardware-tier wrapping key to {}", path.display());
            key
        };

        if legacy.is_some() {
            self.preferences.remove(LEGACY_WRAPPING_KEY_PREF)?;
            tracing::info!("Moved hardware-tier wrapping key out of preferences");
        }
        Ok(key)
    }

    fn load(&self, alias: KeyAlias) -> Result<Option<KeyMaterial>> {
        let guard = self.wrapping_key.read();
        let wrapping_key = guard.as_ref().ok_or(Error::NotInitialized(self.tier()))?;

        match self.preferences.get_blob(&alias_pref(alias))? {
            None => Ok(None),
            Some(wrapped) => wrapping_key.unwrap_key(ALGORITHM, &wrapped).map(Some),
        }
    }

    fn require(&self, alias: KeyAlias) -> Result<KeyMaterial> {
        self.load(alias)?.ok_or(Error::KeyNotFound(alias))
    }
}

impl KeyStore for PreferenceKeyStore {
    fn tier(&self) -> CapabilityTier {
        CapabilityTier::Hardware
    }

    fn init(&self) -> Result<()> {
        let mut wrapping_key = self.wrapping_key.write();
        if wrapping_key.is_some() {
            return Ok(());
        }

        let key = self
            .load_or_create_wrapping_key()
            .map_err(|e| Error::storage_init(CapabilityTier::Hardware, e))?;

        *wrapping_key = Some(key);
        Ok(())
    }

    fn create_keys(&self, alias: KeyAlias) -> Result<KeyProvision> {
        let guard = self.wrapping_key.write();
        let wrapping_key = guard.as_ref().ok_or(Error::NotInitialized(self.tier()))?;

        let pref = alias_pref(alias);
        let existing = self
            .preferences
            .get_blob(&pref)
            .map_err(|e| Error::key_creation(alias, e))?;
        if existing.is_some() {
            return Ok(KeyProvision::Existing);
        }

        let wrapped = wrapping_key
            .wrap(ALGORITHM, &KeyMaterial::generate())
            .map_err(|e| Error::key_creation(alias, e))?;
        self.preferences
            .set_blob(&pref, &wrapped)
            .map_err(|e| Error::key_creation(alias, e))?;
        Ok(KeyProvision::Created)
    }

    fn has_key(&self, alias: KeyAlias) -> Result<bool> {
        if self.wrapping_key.read().is_none() {
            return Err(Error::NotInitialized(self.tier()));
        }
        Ok(self.preferences.get_blob(&alias_pref(alias))?.is_some())
    }

    fn fingerprint(&self, alias: KeyAlias) -> Result<Option<[u8; 32]>> {
        Ok(self.load(alias)?.map(|key| key.fingerprint()))
    }

    fn encrypt(&self, alias: KeyAlias, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.require(alias)?.encrypt(ALGORITHM, plaintext)
    }

    fn decrypt(&self, alias: KeyAlias, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.require(alias)?.decrypt(ALGORITHM, ciphertext)
    }
}

fn read_key(path: &Path) -> Result<KeyMaterial> {
    let bytes = Zeroizing::new(fs::read(path)?);
    KeyMaterial::from_bytes(&bytes)
        .map_err(|e| Error::Encryption(format!("Corrupted wrapping key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::test_support::exercise_initialized;
    use crate::{MemoryPreferences, SqlitePreferences};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, prefs: Arc<dyn Preferences>) -> PreferenceKeyStore {
        PreferenceKeyStore::new(&PlatformContext::new(dir.path()), prefs)
    }

    #[test]
    fn test_preference_store_memory() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, Arc::new(MemoryPreferences::new()));
        store.init().unwrap();
        exercise_initialized(&store);
    }

    #[test]
    fn test_preference_store_sqlite() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, Arc::new(SqlitePreferences::open_in_memory().unwrap()));
        store.init().unwrap();
        exercise_initialized(&store);
    }

    #[test]
    fn test_records_are_wrapped() {
        let dir = TempDir::new().unwrap();
        let prefs = Arc::new(MemoryPreferences::new());
        let store = store_in(&dir, prefs.clone());
        store.init().unwrap();
        store.create_keys(KeyAlias::AddressKey).unwrap();

        let record = prefs.get_blob("keystore.tron_address_key").unwrap().unwrap();
        assert!(record.len() > 32);
        assert_eq!(record[1], 0); // AES-GCM
    }

    #[test]
    fn test_keys_survive_new_instance() {
        let dir = TempDir::new().unwrap();
        let prefs: Arc<dyn Preferences> = Arc::new(MemoryPreferences::new());

        let store = store_in(&dir, prefs.clone());
        store.init().unwrap();
        store.create_keys(KeyAlias::Salt).unwrap();
        let fingerprint = store.fingerprint(KeyAlias::Salt).unwrap();

        let second = store_in(&dir, prefs);
        second.init().unwrap();
        assert_eq!(second.create_keys(KeyAlias::Salt).unwrap(), KeyProvision::Existing);
        assert_eq!(second.fingerprint(KeyAlias::Salt).unwrap(), fingerprint);
    }

    #[test]
    fn test_wrapping_key_kept_out_of_preference_database() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("preferences.db");
        let store = store_in(&dir, Arc::new(SqlitePreferences::open(&db_path).unwrap()));
        store.init().unwrap();
        for alias in KeyAlias::ALL {
            store.create_keys(alias).unwrap();
        }

        let key = fs::read(store.wrapping_key_path()).unwrap();
        assert_eq!(key.len(), 32);
        let db = fs::read(&db_path).unwrap();
        assert!(!db.windows(key.len()).any(|w| w == key.as_slice()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(store.wrapping_key_path())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_database_without_key_file_cannot_unwrap() {
        let dir = TempDir::new().unwrap();
        let prefs: Arc<dyn Preferences> = Arc::new(MemoryPreferences::new());
        let store = store_in(&dir, prefs.clone());
        store.init().unwrap();
        store.create_keys(KeyAlias::AccountKey).unwrap();
        let ciphertext = store.encrypt(KeyAlias::AccountKey, b"secret").unwrap();

        // Same preference records, different (fresh) key directory
        let elsewhere = TempDir::new().unwrap();
        let copy = store_in(&elsewhere, prefs);
        copy.init().unwrap();
        assert!(copy.decrypt(KeyAlias::AccountKey, &ciphertext).is_err());
    }

    #[test]
    fn test_legacy_wrapping_key_moved_to_file() {
        let dir = TempDir::new().unwrap();
        let prefs = Arc::new(MemoryPreferences::new());
        let legacy = KeyMaterial::generate();
        prefs
            .set_blob(LEGACY_WRAPPING_KEY_PREF, legacy.as_bytes())
            .unwrap();
        prefs
            .set_blob(
                "keystore.tron_salt",
                &legacy.wrap(ALGORITHM, &KeyMaterial::generate()).unwrap(),
            )
            .unwrap();

        let store = store_in(&dir, prefs.clone());
        store.init().unwrap();

        assert_eq!(prefs.get_blob(LEGACY_WRAPPING_KEY_PREF).unwrap(), None);
        assert_eq!(
            fs::read(store.wrapping_key_path()).unwrap(),
            legacy.as_bytes().to_vec()
        );
        assert_eq!(store.create_keys(KeyAlias::Salt).unwrap(), KeyProvision::Existing);
        assert!(store.fingerprint(KeyAlias::Salt).unwrap().is_some());
    }

    #[test]
    fn test_corrupted_wrapping_key_fails_init() {
        let dir = TempDir::new().unwrap();
        let platform = PlatformContext::new(dir.path());
        fs::create_dir_all(platform.keystore_dir()).unwrap();
        fs::write(platform.keystore_dir().join(WRAPPING_KEY_FILE), [7u8; 5]).unwrap();

        let store = PreferenceKeyStore::new(&platform, Arc::new(MemoryPreferences::new()));
        assert!(matches!(
            store.init(),
            Err(Error::StorageInit {
                tier: CapabilityTier::Hardware,
                ..
            })
        ));
    }
}
