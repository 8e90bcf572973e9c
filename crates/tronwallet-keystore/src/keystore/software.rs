//! Key store for platforms without a usable secure facility
//!
//! Alias material is kept unwrapped under `software.<alias>` in the preference
//! store, so it lives as long as the preference database does and is protected
//! only by that file's permissions.

use super::{KeyProvision, KeyStore};
use crate::security::{EncryptionAlgorithm, KeyMaterial};
use crate::{CapabilityTier, Error, KeyAlias, Preferences, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use zeroize::Zeroizing;

const ALGORITHM: EncryptionAlgorithm = EncryptionAlgorithm::ChaCha20Poly1305;

fn alias_pref(alias: KeyAlias) -> String {
    format!("software.{}", alias.name())
}

/// Software-tier key store persisted through [`Preferences`]
pub struct SoftwareKeyStore {
    preferences: Arc<dyn Preferences>,
    initialized: RwLock<bool>,
}

impl SoftwareKeyStore {
    /// Create uninitialized store over `preferences`
    pub fn new(preferences: Arc<dyn Preferences>) -> Self {
        Self {
            preferences,
            initialized: RwLock::new(false),
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        if *self.initialized.read() {
            Ok(())
        } else {
            Err(Error::NotInitialized(self.tier()))
        }
    }

    fn load(&self, alias: KeyAlias) -> Result<Option<KeyMaterial>> {
        self.ensure_initialized()?;
        match self.preferences.get_blob(&alias_pref(alias))? {
            None => Ok(None),
            Some(bytes) => {
                let bytes = Zeroizing::new(bytes);
                KeyMaterial::from_bytes(&bytes).map(Some)
            }
        }
    }

    fn require(&self, alias: KeyAlias) -> Result<KeyMaterial> {
        self.load(alias)?.ok_or(Error::KeyNotFound(alias))
    }
}

impl KeyStore for SoftwareKeyStore {
    fn tier(&self) -> CapabilityTier {
        CapabilityTier::Software
    }

    fn init(&self) -> Result<()> {
        let mut initialized = self.initialized.write();
        if *initialized {
            return Ok(());
        }

        // Surface an unreadable preference store here rather than at first use
        self.preferences
            .get_blob(&alias_pref(KeyAlias::Salt))
            .map_err(|e| Error::storage_init(CapabilityTier::Software, e))?;

        *initialized = true;
        Ok(())
    }

    fn create_keys(&self, alias: KeyAlias) -> Result<KeyProvision> {
        // Held for the whole check-then-write so concurrent callers cannot both create
        let initialized = self.initialized.write();
        if !*initialized {
            return Err(Error::NotInitialized(self.tier()));
        }

        let pref = alias_pref(alias);
        let existing = self
            .preferences
            .get_blob(&pref)
            .map_err(|e| Error::key_creation(alias, e))?;
        if existing.is_some() {
            return Ok(KeyProvision::Existing);
        }

        self.preferences
            .set_blob(&pref, KeyMaterial::generate().as_bytes())
            .map_err(|e| Error::key_creation(alias, e))?;
        Ok(KeyProvision::Created)
    }

    fn has_key(&self, alias: KeyAlias) -> Result<bool> {
        self.ensure_initialized()?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::test_support::exercise_initialized;
    use crate::{MemoryPreferences, SqlitePreferences};
    use tempfile::TempDir;

    fn memory_store() -> SoftwareKeyStore {
        SoftwareKeyStore::new(Arc::new(MemoryPreferences::new()))
    }

    #[test]
    fn test_software_store() {
        let store = memory_store();
        store.init().unwrap();
        exercise_initialized(&store);
    }

    #[test]
    fn test_requires_init() {
        let store = memory_store();
        assert!(matches!(
            store.create_keys(KeyAlias::Salt),
            Err(Error::NotInitialized(CapabilityTier::Software))
        ));
    }

    #[test]
    fn test_reinit_keeps_keys() {
        let store = memory_store();
        store.init().unwrap();
        store.create_keys(KeyAlias::Salt).unwrap();
        let before = store.fingerprint(KeyAlias::Salt).unwrap();

        store.init().unwrap();
        assert_eq!(store.fingerprint(KeyAlias::Salt).unwrap(), before);
    }

    #[test]
    fn test_keys_survive_reopened_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.db");

        let ciphertext = {
            let store = SoftwareKeyStore::new(Arc::new(SqlitePreferences::open(&path).unwrap()));
            store.init().unwrap();
            store.create_keys(KeyAlias::PasswordKey).unwrap();
            store.encrypt(KeyAlias::PasswordKey, b"pin").unwrap()
        };

        let store = SoftwareKeyStore::new(Arc::new(SqlitePreferences::open(&path).unwrap()));
        store.init().unwrap();
        assert_eq!(
            store.create_keys(KeyAlias::PasswordKey).unwrap(),
            KeyProvision::Existing
        );
        assert_eq!(
            store.decrypt(KeyAlias::PasswordKey, &ciphertext).unwrap(),
            b"pin".to_vec()
        );
    }

    #[test]
    fn test_truncated_record_rejected() {
        let prefs = Arc::new(MemoryPreferences::new());
        prefs.set_blob("software.tron_salt", &[1u8; 7]).unwrap();

        let store = SoftwareKeyStore::new(prefs);
        store.init().unwrap();
        assert!(store.encrypt(KeyAlias::Salt, b"x").is_err());
    }
}
