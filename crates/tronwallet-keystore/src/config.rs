//! Runtime configuration
//!
//! Resolved from environment variables with a per-user data directory as the
//! fallback:
//! - `TRONWALLET_DATA_DIR`: app data directory
//! - `TRONWALLET_PLATFORM_LEVEL`: override the detected platform level
//! - `TRONWALLET_LOG_JSON`: `1`/`true` for JSON log lines

use crate::{Error, PlatformContext, PlatformLevel, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Environment variable: data directory
pub const ENV_DATA_DIR: &str = "TRONWALLET_DATA_DIR";
/// Environment variable: platform level override
pub const ENV_PLATFORM_LEVEL: &str = "TRONWALLET_PLATFORM_LEVEL";
/// Environment variable: JSON logging
pub const ENV_LOG_JSON: &str = "TRONWALLET_LOG_JSON";

/// Preference database file name inside the data directory
pub const PREFERENCES_FILE: &str = "preferences.db";

/// Key store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreConfig {
    /// App data directory
    pub data_dir: PathBuf,
    /// Live platform capability level
    pub platform_level: PlatformLevel,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl KeystoreConfig {
    /// Config with explicit values
    pub fn new(data_dir: impl Into<PathBuf>, platform_level: PlatformLevel) -> Self {
        Self {
            data_dir: data_dir.into(),
            platform_level,
            log_json: false,
        }
    }

    /// Resolve from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match non_empty(lookup(ENV_DATA_DIR)) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        };

        let platform_level = match non_empty(lookup(ENV_PLATFORM_LEVEL)) {
            Some(raw) => parse_level(&raw)?,
            None => PlatformLevel::detect(),
        };

        let log_json = match non_empty(lookup(ENV_LOG_JSON)) {
            Some(raw) => parse_flag(&raw)?,
            None => false,
        };

        Ok(Self {
            data_dir,
            platform_level,
            log_json,
        })
    }

    /// Preference database path
    pub fn preferences_path(&self) -> PathBuf {
        self.data_dir.join(PREFERENCES_FILE)
    }

    /// Platform handle for file-backed key stores
    pub fn platform_context(&self) -> PlatformContext {
        PlatformContext::new(&self.data_dir)
    }

    /// Data directory
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a platform level
pub fn parse_level(raw: &str) -> Result<PlatformLevel> {
    raw.trim()
        .parse::<u32>()
        .map(PlatformLevel)
        .map_err(|_| Error::Config(format!("Invalid platform level: '{}'", raw)))
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("Invalid boolean: '{}'", raw))),
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "DevBand", "TronWallet")
        .map(|dirs| dirs.data_local_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
