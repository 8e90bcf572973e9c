//! Versioned secure key storage for the TRON wallet
//!
//! Selects one key-store backend per process based on platform capability,
//! pins that choice once the wallet is initialized, and provisions the
//! wallet's fixed key aliases.
//!
//! ## Tiers
//!
//! - **Software** (level 15+): unwrapped key records in the preference store
//! - **Sealed** (level 18+): key files sealed with ChaCha20-Poly1305 under a device key
//! - **Hardware** (level 23+): AES-256-GCM wrapped records in the preference store,
//!   wrapping key in an owner-only file
//!
//! A wallet initialized under one tier keeps using it after platform upgrades.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alias;
pub mod config;
pub mod context;
pub mod error;
pub mod keystore;
pub mod logging;
pub mod migrations;
pub mod preferences;
pub mod security;
pub mod selector;
pub mod tier;

pub use alias::KeyAlias;
pub use config::KeystoreConfig;
pub use context::WalletContext;
pub use error::{Error, Result};
pub use keystore::{
    FileKeyStore, KeyProvision, KeyStore, PlatformContext, PreferenceKeyStore, SoftwareKeyStore,
};
pub use logging::init_logging;
pub use preferences::{
    InitializationState, MemoryPreferences, Preferences, SqlitePreferences, PREF_INIT_WALLET,
    PREF_KEY_STORE_VERSION,
};
pub use security::{EncryptionAlgorithm, KeyMaterial};
pub use selector::{
    decision_level, provision, select_tier, KeyStoreSelection, KeyStoreSelector,
    ProvisioningReport,
};
pub use tier::{CapabilityTier, PlatformLevel};
