//! Error types

use crate::{CapabilityTier, KeyAlias};

/// Key store errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend's underlying secure-storage facility could not be opened or created
    #[error("Key store initialization failed ({tier}): {reason}")]
    StorageInit {
        /// Tier of the backend that failed
        tier: CapabilityTier,
        /// Underlying cause
        reason: String,
    },

    /// Key material could not be generated or persisted for an alias
    #[error("Key creation failed for {alias}: {reason}")]
    KeyCreation {
        /// Alias being provisioned
        alias: KeyAlias,
        /// Underlying cause
        reason: String,
    },

    /// Backend used before `init()`
    #[error("Key store not initialized: {0}")]
    NotInitialized(CapabilityTier),

    /// No key material under the alias
    #[error("Key not found: {0}")]
    KeyNotFound(KeyAlias),

    /// Encryption error
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Preference store error
    #[error("Preferences error: {0}")]
    Preferences(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn storage_init(tier: CapabilityTier, reason: impl ToString) -> Self {
        Error::StorageInit {
            tier,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn key_creation(alias: KeyAlias, reason: impl ToString) -> Self {
        Error::KeyCreation {
            alias,
            reason: reason.to_string(),
        }
    }
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;
