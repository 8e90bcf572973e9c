//! Fixed key aliases provisioned in every key store

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named slot for one piece of key material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAlias {
    /// Password hashing salt key
    Salt,
    /// Account private key wrapping
    AccountKey,
    /// Password verifier wrapping
    PasswordKey,
    /// Address book wrapping
    AddressKey,
}

impl KeyAlias {
    /// Provisioning order
    pub const ALL: [KeyAlias; 4] = [
        KeyAlias::Salt,
        KeyAlias::AccountKey,
        KeyAlias::PasswordKey,
        KeyAlias::AddressKey,
    ];

    /// Name used as the storage key inside backends
    pub const fn name(self) -> &'static str {
        match self {
            KeyAlias::Salt => "tron_salt",
            KeyAlias::AccountKey => "tron_account_key",
            KeyAlias::PasswordKey => "tron_password_key",
            KeyAlias::AddressKey => "tron_address_key",
        }
    }

    /// Parse a storage name or the short CLI form (`salt`, `account-key`, ...)
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.iter().copied().find(|alias| {
            alias.name() == normalized || alias.name().trim_start_matches("tron_") == normalized
        })
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
