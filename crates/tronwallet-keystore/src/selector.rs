//! Versioned key-store selection
//!
//! Picks exactly one backend per process. A wallet that is already
//! initialized stays on the tier it was created with, even if the platform has
//! since gained capability: key material written by one backend is not
//! readable by another.

use crate::keystore::{
    FileKeyStore, KeyProvision, KeyStore, PlatformContext, PreferenceKeyStore, SoftwareKeyStore,
};
use crate::{CapabilityTier, InitializationState, KeyAlias, PlatformLevel, Preferences, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Per-alias outcome of one provisioning pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningReport {
    /// Outcomes in provisioning order
    pub outcomes: Vec<(KeyAlias, KeyProvision)>,
}

impl ProvisioningReport {
    /// Number of aliases that received new key material
    pub fn created(&self) -> usize {
        self.outcomes.iter().filter(|(_, p)| p.is_created()).count()
    }

    /// Every alias already had key material
    pub fn is_noop(&self) -> bool {
        self.created() == 0
    }
}

/// Level the tier decision is made on.
///
/// First run uses the live platform level; an initialized wallet uses the
/// level recorded when it was created.
pub fn decision_level(state: &InitializationState, current: PlatformLevel) -> PlatformLevel {
    if !state.initialized {
        return current;
    }

    match state.recorded_level {
        Some(level) => level,
        None => {
            tracing::warn!(
                "Wallet initialized without a recorded key store version; using the lowest tier"
            );
            PlatformLevel::default()
        }
    }
}

/// Tier selected for `state` on a platform currently at `current`
pub fn select_tier(state: &InitializationState, current: PlatformLevel) -> CapabilityTier {
    CapabilityTier::for_level(decision_level(state, current))
}

/// Initialize `store` and ensure every alias has key material.
///
/// Stops at the first failure; a failed `init` means no alias is touched.
pub fn provision(store: &dyn KeyStore) -> Result<ProvisioningReport> {
    store.init()?;

    let mut outcomes = Vec::with_capacity(KeyAlias::ALL.len());
    for alias in KeyAlias::ALL {
        let outcome = store.create_keys(alias)?;
        tracing::debug!("Provisioned {} on {} tier: {:?}", alias, store.tier(), outcome);
        outcomes.push((alias, outcome));
    }

    Ok(ProvisioningReport { outcomes })
}

/// Result of [`KeyStoreSelector::select_and_initialize`]
pub struct KeyStoreSelection {
    tier: CapabilityTier,
    decision_level: PlatformLevel,
    first_run: bool,
    report: ProvisioningReport,
    store: Arc<dyn KeyStore>,
}

impl KeyStoreSelection {
    /// Selected tier
    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    /// Level the decision was made on
    pub fn decision_level(&self) -> PlatformLevel {
        self.decision_level
    }

    /// Selection ran for a wallet that was not yet initialized
    pub fn is_first_run(&self) -> bool {
        self.first_run
    }

    /// Provisioning outcomes
    pub fn report(&self) -> &ProvisioningReport {
        &self.report
    }

    /// Initialized backend
    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Take the initialized backend
    pub fn into_store(self) -> Arc<dyn KeyStore> {
        self.store
    }

    /// Persist the pin so later runs select the same backend.
    ///
    /// On first run this records the selected tier's minimum level as the
    /// key store version and marks the wallet initialized. Later runs write
    /// nothing.
    pub fn commit(&self, preferences: &dyn Preferences) -> Result<()> {
        if !self.first_run {
            return Ok(());
        }

        preferences.set_key_store_version(self.tier.min_level())?;
        preferences.set_wallet_initialized(true)?;
        tracing::info!(
            "Pinned key store to {} tier ({})",
            self.tier,
            self.tier.min_level()
        );
        Ok(())
    }
}

impl std::fmt::Debug for KeyStoreSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStoreSelection")
            .field("tier", &self.tier)
            .field("decision_level", &self.decision_level)
            .field("first_run", &self.first_run)
            .field("report", &self.report)
            .finish()
    }
}

/// Builds the backend each tier needs from the collaborators it holds
pub struct KeyStoreSelector {
    platform: PlatformContext,
    preferences: Arc<dyn Preferences>,
}

impl KeyStoreSelector {
    /// Create selector
    pub fn new(platform: PlatformContext, preferences: Arc<dyn Preferences>) -> Self {
        Self {
            platform,
            preferences,
        }
    }

    /// Construct the (uninitialized) backend for `tier`
    pub fn build(&self, tier: CapabilityTier) -> Arc<dyn KeyStore> {
        match tier {
            CapabilityTier::Software => {
                Arc::new(SoftwareKeyStore::new(Arc::clone(&self.preferences)))
            }
            CapabilityTier::Sealed => Arc::new(FileKeyStore::new(&self.platform)),
            CapabilityTier::Hardware => Arc::new(PreferenceKeyStore::new(
                &self.platform,
                Arc::clone(&self.preferences),
            )),
        }
    }

    /// Select, construct, initialize and provision the backend.
    ///
    /// Errors from `init` or `create_keys` are returned as-is and are fatal to
    /// startup; nothing is retried here.
    pub fn select_and_initialize(
        &self,
        state: &InitializationState,
        current: PlatformLevel,
    ) -> Result<KeyStoreSelection> {
        let decision_level = decision_level(state, current);
        let tier = CapabilityTier::for_level(decision_level);

        tracing::info!(
            "Selecting key store: initialized={}, current={}, decision={}, tier={}",
            state.initialized,
            current,
            decision_level,
            tier
        );

        let store = self.build(tier);
        let report = provision(store.as_ref())?;

        if report.created() > 0 {
            tracing::info!("Created {} key(s) on {} tier", report.created(), tier);
        }

        Ok(KeyStoreSelection {
            tier,
            decision_level,
            first_run: !state.initialized,
            report,
            store,
        })
    }
}
