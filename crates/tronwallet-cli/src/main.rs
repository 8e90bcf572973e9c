//! Operator CLI for the wallet key store
//!
//! Brings up the key store the same way the wallet does at startup, and lets
//! an operator inspect the pinned tier or round-trip text through an alias.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tronwallet_keystore::config::parse_level;
use tronwallet_keystore::{
    select_tier, CapabilityTier, InitializationState, KeyAlias, KeyProvision, KeystoreConfig,
    PlatformLevel, Preferences, SqlitePreferences, WalletContext,
};

#[derive(Parser)]
#[command(name = "tronwallet-cli")]
#[command(about = "TRON wallet key store tool", long_about = None)]
struct Cli {
    /// App data directory (overrides TRONWALLET_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Live platform level (overrides TRONWALLET_PLATFORM_LEVEL)
    #[arg(long, global = true)]
    platform_level: Option<String>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select, initialize and provision the key store
    Bootstrap,

    /// Show the pinned tier without touching key material
    Status,

    /// Encrypt text with an alias key
    Encrypt {
        /// Alias (salt, account-key, password-key, address-key)
        #[arg(short, long)]
        alias: String,

        /// Text to encrypt
        text: String,
    },

    /// Decrypt base64 text produced by `encrypt`
    Decrypt {
        /// Alias (salt, account-key, password-key, address-key)
        #[arg(short, long)]
        alias: String,

        /// Base64 ciphertext
        ciphertext: String,
    },
}

#[derive(Serialize)]
struct StatusReport {
    data_dir: PathBuf,
    preferences_found: bool,
    initialized: bool,
    recorded_level: Option<PlatformLevel>,
    current_level: PlatformLevel,
    tier: CapabilityTier,
}

#[derive(Serialize)]
struct BootstrapReport {
    tier: CapabilityTier,
    provisioned: Vec<(KeyAlias, KeyProvision)>,
    state: InitializationState,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tronwallet_keystore::init_logging(config.log_json || cli.log_json);

    match cli.command {
        Commands::Bootstrap => run_bootstrap(&config)?,
        Commands::Status => run_status(&config)?,
        Commands::Encrypt { alias, text } => {
            let alias = parse_alias(&alias)?;
            let context = WalletContext::bootstrap(&config)?;
            println!("{}", context.key_store().encrypt_string(alias, &text)?);
        }
        Commands::Decrypt { alias, ciphertext } => {
            let alias = parse_alias(&alias)?;
            let context = WalletContext::bootstrap(&config)?;
            println!("{}", context.key_store().decrypt_string(alias, &ciphertext)?);
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<KeystoreConfig> {
    let mut config = KeystoreConfig::from_env().context("Failed to read configuration")?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.platform_level {
        config.platform_level = parse_level(level)?;
    }
    Ok(config)
}

fn parse_alias(value: &str) -> anyhow::Result<KeyAlias> {
    KeyAlias::parse(value).ok_or_else(|| anyhow!("Unknown alias: {}", value))
}

fn run_bootstrap(config: &KeystoreConfig) -> anyhow::Result<()> {
    info!("Bootstrapping key store in {}", config.data_dir.display());
    let context = WalletContext::bootstrap(config).context("Key store startup failed")?;

    let report = BootstrapReport {
        tier: context.tier(),
        provisioned: context.report().outcomes.clone(),
        state: context.initialization_state()?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_status(config: &KeystoreConfig) -> anyhow::Result<()> {
    let report = status_report(config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Read-only: a missing database reads as a first run and is not created
fn status_report(config: &KeystoreConfig) -> anyhow::Result<StatusReport> {
    let path = config.preferences_path();
    let prefs = SqlitePreferences::open_read_only(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let state = match &prefs {
        Some(prefs) => prefs.initialization_state()?,
        None => InitializationState::first_run(),
    };

    Ok(StatusReport {
        data_dir: config.data_dir.clone(),
        preferences_found: prefs.is_some(),
        initialized: state.initialized,
        recorded_level: state.recorded_level,
        current_level: config.platform_level,
        tier: select_tier(&state, config.platform_level),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_global_overrides() {
        let cli = Cli::try_parse_from([
            "tronwallet-cli",
            "--data-dir",
            "/tmp/tw",
            "--platform-level",
            "18",
            "encrypt",
            "--alias",
            "salt",
            "hello",
        ])
        .unwrap();

        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/tw")));
        assert!(matches!(cli.command, Commands::Encrypt { .. }));
        assert_eq!(parse_level(cli.platform_level.as_deref().unwrap()).unwrap(), PlatformLevel(18));
    }

    #[test]
    fn test_status_leaves_missing_data_dir_alone() {
        let dir = tempfile::TempDir::new().unwrap();
        let data_dir = dir.path().join("wallet");
        let config = KeystoreConfig::new(&data_dir, PlatformLevel(23));

        let report = status_report(&config).unwrap();
        assert!(!report.preferences_found);
        assert!(!report.initialized);
        assert_eq!(report.tier, CapabilityTier::Hardware);
        assert!(!data_dir.exists());
    }

    #[test]
    fn test_status_reads_pinned_tier() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = KeystoreConfig::new(dir.path(), PlatformLevel(18));
        WalletContext::bootstrap(&config).unwrap();
        let before = std::fs::read(config.preferences_path()).unwrap();

        let upgraded = KeystoreConfig::new(dir.path(), PlatformLevel(30));
        let report = status_report(&upgraded).unwrap();
        assert!(report.preferences_found);
        assert_eq!(report.recorded_level, Some(PlatformLevel(18)));
        assert_eq!(report.tier, CapabilityTier::Sealed);
        assert_eq!(std::fs::read(config.preferences_path()).unwrap(), before);
    }

    #[test]
    fn test_unknown_alias_rejected() {
        assert!(parse_alias("mnemonic").is_err());
        assert_eq!(parse_alias("address-key").unwrap(), KeyAlias::AddressKey);
    }
}
