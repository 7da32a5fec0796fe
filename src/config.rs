use crate::database::{DEFAULT_BUSY_TIMEOUT_MS, DEFAULT_CONNECTION_TIMEOUT_MS, DEFAULT_DB_NAME};
use anyhow::{anyhow, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the directory holding the database file
    ///
    /// Defaults to `~/.dbhandle/data` (`./.dbhandle/data` when no home
    /// directory is known). It is never derived from where the crate itself
    /// is installed; set `DBHANDLE_DATA_DIR` or `data_dir` in the config file
    /// to keep databases elsewhere.
    pub data_dir: String,

    /// File name of the database, must end with `.db`
    pub db_name: String,

    /// Maximum number of connections open at once, idle or in use
    pub pool_size: usize,

    /// How long a connection waits on a locked database, in milliseconds
    pub busy_timeout_ms: u64,

    /// How long a session waits for a free pooled connection, in milliseconds
    pub connection_timeout_ms: u64,

    /// Log every statement issued through a session
    pub echo: bool,
}

const DEFAULT_POOL_SIZE: usize = 5;

const EMPTY_CONFIG: &str = r#"### dbhandle configuration file

### directory holding the database file
# data_dir = "~/.dbhandle/data"

### database file name (must end with .db)
# db_name = "analysis.db"

### connection pool settings
# pool_size = 5
# busy_timeout_ms = 5000
# connection_timeout_ms = 5000

### log every statement
# echo = false
"#;

impl Default for DbConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.dbhandle/data", home_dir),
            db_name: DEFAULT_DB_NAME.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            connection_timeout_ms: DEFAULT_CONNECTION_TIMEOUT_MS,
            echo: false,
        }
    }
}

impl DbConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Reads the TOML file at `path` (by default `$HOME/.dbhandle/dbhandle.toml`),
    /// writing a commented template there if it does not exist, then applies
    /// `DBHANDLE_*` environment variables on top.
    pub fn new(path: &Option<String>) -> Result<DbConfig> {
        load_dotenv();

        let mut builder = Config::builder();

        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                let home_dir =
                    dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
                let dbhandle_dir = home_dir.join(".dbhandle");
                std::fs::create_dir_all(&dbhandle_dir)
                    .map_err(|e| anyhow!("Unable to create dbhandle directory: {}", e))?;
                let p = dbhandle_dir.join("dbhandle.toml");
                if p.exists() {
                    let path_str = p
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(&p, EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.display(), e)
                    })?;
                }
            }
        }

        // E.g., `DBHANDLE_DATA_DIR=/tmp/data dbhandle init` would set the data directory
        builder = builder.add_source(config::Environment::with_prefix("DBHANDLE"));

        Self::from_builder(builder)
    }

    /// Configuration from defaults and `DBHANDLE_*` environment variables only
    pub fn from_env() -> Result<DbConfig> {
        load_dotenv();
        let builder = Config::builder().add_source(config::Environment::with_prefix("DBHANDLE"));
        Self::from_builder(builder)
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<Self> {
        let defaults = DbConfig::default();

        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => defaults.data_dir,
        };

        let db_name = config
            .get("db_name")
            .cloned()
            .unwrap_or(defaults.db_name);

        let pool_size = match config.get("pool_size") {
            Some(s) => s
                .parse()
                .map_err(|e| anyhow!("Invalid pool_size '{}': {}", s, e))?,
            None => defaults.pool_size,
        };

        let busy_timeout_ms = match config.get("busy_timeout_ms") {
            Some(s) => s
                .parse()
                .map_err(|e| anyhow!("Invalid busy_timeout_ms '{}': {}", s, e))?,
            None => defaults.busy_timeout_ms,
        };

        let connection_timeout_ms = match config.get("connection_timeout_ms") {
            Some(s) => s
                .parse()
                .map_err(|e| anyhow!("Invalid connection_timeout_ms '{}': {}", s, e))?,
            None => defaults.connection_timeout_ms,
        };

        let echo = config
            .get("echo")
            .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(defaults.echo);

        Ok(DbConfig {
            data_dir,
            db_name,
            pool_size,
            busy_timeout_ms,
            connection_timeout_ms,
            echo,
        })
    }

    /// Get the path to the SQLite database file for the configured name
    pub fn sqlite_path(&self) -> String {
        self.sqlite_path_for(&self.db_name)
    }

    /// Get the path to the SQLite database file for a given name
    pub fn sqlite_path_for(&self, name: &str) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}", data_dir, name)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!("Pool Size:          {}", self.pool_size),
            format!("Busy Timeout:       {} ms", self.busy_timeout_ms),
            format!("Checkout Timeout:   {} ms", self.connection_timeout_ms),
            format!("Echo Statements:    {}", self.echo),
        ]
        .join("\n")
    }
}

/// Load a `.env` file from the current directory or its parents, if any
fn load_dotenv() {
    // a missing .env file is the normal case
    let _ = dotenvy::dotenv();
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

// =============================================================================
// Storage info (used by the status command)
// =============================================================================

/// Information about the SQLite storage file
#[derive(Debug, Serialize, Clone)]
pub struct StorageInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    pub pool_size: usize,
    pub busy_timeout_ms: u64,
    pub connection_timeout_ms: u64,
}

/// Get information about the storage file at `path`
pub fn get_storage_info(config: &DbConfig, path: &Path) -> StorageInfo {
    let metadata = std::fs::metadata(path).ok();

    let last_modified = metadata
        .as_ref()
        .and_then(|m| m.modified().ok())
        .map(|t| {
            let datetime: chrono::DateTime<chrono::Utc> = t.into();
            datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
        });

    StorageInfo {
        path: path.to_string_lossy().to_string(),
        exists: metadata.is_some(),
        size_bytes: metadata.as_ref().map(|m| m.len()),
        last_modified,
        pool_size: config.pool_size,
        busy_timeout_ms: config.busy_timeout_ms,
        connection_timeout_ms: config.connection_timeout_ms,
    }
}

/// Format a byte count for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
