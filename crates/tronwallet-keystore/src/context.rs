//! Process-wide wallet context
//!
//! Built once at startup, before anything that encrypts with the key store.
//! Dependents receive the key store through this context rather than a global.

use crate::selector::{KeyStoreSelection, KeyStoreSelector, ProvisioningReport};
use crate::{
    CapabilityTier, InitializationState, KeyStore, KeystoreConfig, PlatformContext, PlatformLevel,
    Preferences, Result, SqlitePreferences,
};
use std::sync::Arc;

/// Owns the preference store and the selected key store for the process
pub struct WalletContext {
    preferences: Arc<dyn Preferences>,
    key_store: Arc<dyn KeyStore>,
    tier: CapabilityTier,
    report: ProvisioningReport,
}

impl WalletContext {
    /// Open preferences under the configured data directory and bring up the key store
    pub fn bootstrap(config: &KeystoreConfig) -> Result<Self> {
        let preferences: Arc<dyn Preferences> =
            Arc::new(SqlitePreferences::open(config.preferences_path())?);
        Self::with_preferences(preferences, config.platform_context(), config.platform_level)
    }

    /// Bring up the key store with caller-supplied collaborators
    pub fn with_preferences(
        preferences: Arc<dyn Preferences>,
        platform: PlatformContext,
        current: PlatformLevel,
    ) -> Result<Self> {
        let state = preferences.initialization_state()?;
        let selector = KeyStoreSelector::new(platform, Arc::clone(&preferences));
        let selection = selector.select_and_initialize(&state, current)?;
        selection.commit(preferences.as_ref())?;
        Ok(Self::from_selection(preferences, selection))
    }

    fn from_selection(preferences: Arc<dyn Preferences>, selection: KeyStoreSelection) -> Self {
        let tier = selection.tier();
        let report = selection.report().clone();
        Self {
            preferences,
            key_store: selection.into_store(),
            tier,
            report,
        }
    }

    /// Selected key store
    pub fn key_store(&self) -> Arc<dyn KeyStore> {
        Arc::clone(&self.key_store)
    }

    /// Preference store
    pub fn preferences(&self) -> Arc<dyn Preferences> {
        Arc::clone(&self.preferences)
    }

    /// Tier in use
    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    /// Provisioning outcomes from startup
    pub fn report(&self) -> &ProvisioningReport {
        &self.report
    }

    /// Current initialization state
    pub fn initialization_state(&self) -> Result<InitializationState> {
        self.preferences.initialization_state()
    }
}
