//! Persisted preference store
//!
//! Holds the wallet initialization flags the key-store selector reads, and the
//! wrapped key records of the preference-backed key store.

use crate::{migrations, Error, PlatformLevel, Result};
use parking_lot::{Mutex, RwLock};
use rusqlite::{params, types::Value, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Preference key: wallet has been initialized
pub const PREF_INIT_WALLET: &str = "init_wallet";

/// Preference key: platform level the key store was created under
pub const PREF_KEY_STORE_VERSION: &str = "key_store_version";

/// Wallet initialization state as read from preferences
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationState {
    /// Wallet was initialized on an earlier run
    pub initialized: bool,
    /// Level recorded at first initialization; meaningful only when `initialized`
    pub recorded_level: Option<PlatformLevel>,
}

impl InitializationState {
    /// State of a wallet that has never been initialized
    pub fn first_run() -> Self {
        Self::default()
    }

    /// State of a wallet initialized under `level`
    pub fn initialized_at(level: PlatformLevel) -> Self {
        Self {
            initialized: true,
            recorded_level: Some(level),
        }
    }
}

/// Typed key/value preference storage
///
/// Booleans are stored as the integers 0 and 1: `get_int` on a boolean key
/// yields 0 or 1, and `get_bool` on an integer key is true when non-zero.
pub trait Preferences: Send + Sync {
    /// Read a boolean
    fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Write a boolean
    fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Read an integer
    fn get_int(&self, key: &str) -> Result<Option<i64>>;

    /// Write an integer
    fn set_int(&self, key: &str, value: i64) -> Result<()>;

    /// Read a blob
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a blob
    fn set_blob(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete a value; missing keys are ignored
    fn remove(&self, key: &str) -> Result<()>;

    /// Has the wallet been initialized
    fn wallet_initialized(&self) -> Result<bool> {
        Ok(self.get_bool(PREF_INIT_WALLET)?.unwrap_or(false))
    }

    /// Mark the wallet initialized (or not)
    fn set_wallet_initialized(&self, initialized: bool) -> Result<()> {
        self.set_bool(PREF_INIT_WALLET, initialized)
    }

    /// Recorded key-store version, if any
    fn key_store_version(&self) -> Result<Option<PlatformLevel>> {
        match self.get_int(PREF_KEY_STORE_VERSION)? {
            None => Ok(None),
            Some(v) => u32::try_from(v)
                .map(|v| Some(PlatformLevel(v)))
                .map_err(|_| Error::Preferences(format!("Invalid key store version: {}", v))),
        }
    }

    /// Record the key-store version
    fn set_key_store_version(&self, level: PlatformLevel) -> Result<()> {
        self.set_int(PREF_KEY_STORE_VERSION, i64::from(level.get()))
    }

    /// Load both initialization accessors
    fn initialization_state(&self) -> Result<InitializationState> {
        let initialized = self.wallet_initialized()?;
        let recorded_level = if initialized {
            self.key_store_version()?
        } else {
            None
        };
        Ok(InitializationState {
            initialized,
            recorded_level,
        })
    }
}

fn type_mismatch(key: &str, expected: &str) -> Error {
    Error::Preferences(format!("Preference '{}' is not {}", key, expected))
}

/// SQLite-backed preference store
pub struct SqlitePreferences {
    conn: Mutex<Connection>,
}

impl SqlitePreferences {
    /// Open (or create) the preference database at `path`
    ///
    /// The file is owner-only (0600) on unix.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        create_private(path.as_ref())?;

        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::from_connection(conn)
    }

    /// Open an existing database read-only
    ///
    /// Returns `None` when nothing exists at `path`. Creates no files and runs
    /// no migrations.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        if !path.as_ref().is_file() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Some(Self {
            conn: Mutex::new(conn),
        }))
    }

    /// In-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                [key],
                |row| row.get::<_, Value>(0),
            )
            .optional()?)
    }

    fn set_value(&self, key: &str, value: Value) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

impl Preferences for SqlitePreferences {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get_value(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(v)) => Ok(Some(v != 0)),
            Some(_) => Err(type_mismatch(key, "a boolean")),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_value(key, Value::Integer(i64::from(value)))
    }

    fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.get_value(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Integer(v)) => Ok(Some(v)),
            Some(_) => Err(type_mismatch(key, "an integer")),
        }
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.set_value(key, Value::Integer(value))
    }

    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get_value(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Blob(v)) => Ok(Some(v)),
            Some(_) => Err(type_mismatch(key, "a blob")),
        }
    }

    fn set_blob(&self, key: &str, value: &[u8]) -> Result<()> {
        self.set_value(key, Value::Blob(value.to_vec()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM preferences WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o600)
        .open(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn create_private(_path: &Path) -> Result<()> {
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum PrefValue {
    Int(i64),
    Blob(Vec<u8>),
}

/// In-memory preference store
#[derive(Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, PrefValue>>,
}

impl MemoryPreferences {
    /// Create empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Store has no entries
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl Preferences for MemoryPreferences {
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.values.read().get(key) {
            None => Ok(None),
            Some(PrefValue::Int(v)) => Ok(Some(*v != 0)),
            Some(_) => Err(type_mismatch(key, "a boolean")),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.values.write().insert(key.to_string(), PrefValue::Int(i64::from(value)));
        Ok(())
    }

    fn get_int(&self, key: &str) -> Result<Option<i64>> {
        match self.values.read().get(key) {
            None => Ok(None),
            Some(PrefValue::Int(v)) => Ok(Some(*v)),
            Some(_) => Err(type_mismatch(key, "an integer")),
        }
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.values.write().insert(key.to_string(), PrefValue::Int(value));
        Ok(())
    }

    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.values.read().get(key) {
            None => Ok(None),
            Some(PrefValue::Blob(v)) => Ok(Some(v.clone())),
            Some(_) => Err(type_mismatch(key, "a blob")),
        }
    }

    fn set_blob(&self, key: &str, value: &[u8]) -> Result<()> {
        self.values
            .write()
            .insert(key.to_string(), PrefValue::Blob(value.to_vec()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
