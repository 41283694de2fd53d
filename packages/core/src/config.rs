//! Store Configuration
//!
//! A single connection string selects the store:
//!
//! - `./data/spot.db`, `file:./data/spot.db` - local libsql/SQLite file
//! - `libsql://spot-graph.example.io?authToken=...` - remote libsql server
//! - `http://127.0.0.1:8080` / `https://...` - remote over plain HTTP(S)
//!
//! Everything else (pool size, waits, bulk chunking, link policy) has a
//! default and can be overridden through `SPOTGRAPH_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SQLite's default limit on bound parameters per statement
pub const MAX_BOUND_PARAMETERS: usize = 32766;

/// Parameters bound per node row in a bulk insert (six coordinates + joint angles)
pub const PARAMETERS_PER_ROW: usize = 7;

/// Environment variable holding the store connection string
pub const DATABASE_URL_ENV: &str = "SPOTGRAPH_DATABASE_URL";

/// What to do when a link field that is already set gets a different target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPolicy {
    /// Replace the existing reference
    #[default]
    Overwrite,
    /// Fail with `LinkAlreadySet` unless the field is null or already holds the target
    RejectIfSet,
}

/// Where the store lives, parsed from `StoreConfig::url`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Local(PathBuf),
    Remote { url: String, auth_token: String },
}

/// Configuration for the graph store and its connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection string (local path, `file:` URI, or remote URL with `authToken`)
    pub url: String,

    /// Upper bound on simultaneously checked-out connections
    pub max_connections: usize,

    /// How long a caller queues for a connection before `StoreUnavailable`
    pub acquire_timeout_ms: u64,

    /// SQLite busy timeout applied to each local connection
    pub busy_timeout_ms: u64,

    /// Rows per bulk insert chunk (one statement, one transaction)
    pub chunk_size: usize,

    /// Overwrite policy for link updates
    pub link_policy: LinkPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "./data/spotgraph.db".to_string(),
            max_connections: 8,
            acquire_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
            chunk_size: 500,
            link_policy: LinkPolicy::Overwrite,
        }
    }
}

impl StoreConfig {
    /// Default configuration pointed at `url`
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from `SPOTGRAPH_*` environment variables
    ///
    /// `SPOTGRAPH_DATABASE_URL` is required; `SPOTGRAPH_MAX_CONNECTIONS`,
    /// `SPOTGRAPH_ACQUIRE_TIMEOUT_MS` and `SPOTGRAPH_CHUNK_SIZE` are optional.
    pub fn from_env() -> Result<Self, String> {
        let url = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| format!("{} is not set", DATABASE_URL_ENV))?;
        let mut config = Self::from_url(url);

        if let Some(v) = env_number("SPOTGRAPH_MAX_CONNECTIONS")? {
            config.max_connections = v as usize;
        }
        if let Some(v) = env_number("SPOTGRAPH_ACQUIRE_TIMEOUT_MS")? {
            config.acquire_timeout_ms = v;
        }
        if let Some(v) = env_number("SPOTGRAPH_CHUNK_SIZE")? {
            config.chunk_size = v as usize;
        }

        Ok(config)
    }

    /// Parse the connection string
    ///
    /// Remote urls accept a single query parameter, `authToken`; any other
    /// parameter is rejected rather than ignored.
    pub fn location(&self) -> Result<StoreLocation, String> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err("url cannot be empty".to_string());
        }

        let is_remote = ["libsql://", "http://", "https://"]
            .iter()
            .any(|scheme| url.starts_with(scheme));

        if !is_remote {
            let path = url.strip_prefix("file:").unwrap_or(url);
            if path.is_empty() {
                return Err("file: url must name a path".to_string());
            }
            return Ok(StoreLocation::Local(PathBuf::from(path)));
        }

        let (base, query) = match url.split_once('?') {
            Some((base, query)) => (base, query),
            None => (url, ""),
        };
        let mut auth_token = String::new();
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            match pair.split_once('=') {
                Some(("authToken", token)) => auth_token = token.to_string(),
                _ => return Err(format!("unsupported url parameter '{}'", pair)),
            }
        }

        Ok(StoreLocation::Remote {
            url: base.to_string(),
            auth_token,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.location()?;

        if self.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than 0".to_string());
        }

        if self.chunk_size * PARAMETERS_PER_ROW > MAX_BOUND_PARAMETERS {
            return Err(format!(
                "chunk_size cannot exceed {} (statement parameter limit)",
                MAX_BOUND_PARAMETERS / PARAMETERS_PER_ROW
            ));
        }

        Ok(())
    }
}

fn env_number(name: &str) -> Result<Option<u64>, String> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{}: {}", name, e)),
        Err(_) => Ok(None),
    }
}
