//! Process configuration: TOML file, then environment overrides.

use crate::collection::{CollectionSpec, DataType, IncludedPath, IndexSpec, IndexingPolicy};
use crate::errors::DbError;
use crate::types::CollectionLink;
use crate::update::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "eventrepo.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Spatial,
    Range,
}

/// One included path of the collection's indexing policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub path: String,
    pub kind: IndexKind,
    pub data_type: DataType,
    /// Range indexes only; `-1` is maximum precision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
}

impl IndexConfig {
    fn to_included_path(&self) -> IncludedPath {
        let index = match self.kind {
            IndexKind::Spatial => IndexSpec::Spatial { data_type: self.data_type },
            IndexKind::Range => {
                IndexSpec::Range { data_type: self.data_type, precision: self.precision.unwrap_or(-1) }
            }
        };
        IncludedPath { path: self.path.clone(), indexes: vec![index] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 16, base_delay_ms: 5, max_delay_ms: 1000, jitter: true }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    pub level: Option<String>,
    pub retention: Option<usize>,
    /// JSON-lines file receiving one entry per content query.
    pub query_log: Option<PathBuf>,
    pub slow_query_ms: Option<u64>,
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub endpoint: String,
    pub credential: String,
    pub database: String,
    pub collection: String,
    pub max_connections: usize,
    pub request_timeout_ms: u64,
    /// Seconds a document lives after its last write; 0 disables expiry.
    pub ttl_secs: u64,
    pub throughput: Option<u32>,
    pub indexes: Vec<IndexConfig>,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "memory://local".into(),
            credential: "local".into(),
            database: "EventDb".into(),
            collection: "EventCollection".into(),
            max_connections: 200,
            request_timeout_ms: 30_000,
            ttl_secs: 86_400,
            throughput: Some(10_000),
            indexes: vec![
                IndexConfig {
                    path: "/Location/?".into(),
                    kind: IndexKind::Spatial,
                    data_type: DataType::Point,
                    precision: None,
                },
                IndexConfig {
                    path: "/Time/?".into(),
                    kind: IndexKind::Range,
                    data_type: DataType::String,
                    precision: Some(-1),
                },
            ],
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("max_connections", &self.max_connections)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("ttl_secs", &self.ttl_secs)
            .field("throughput", &self.throughput)
            .field("indexes", &self.indexes)
            .field("retry", &self.retry)
            .field("logging", &self.logging)
            .finish()
    }
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, DbError> {
        toml::from_str(text).map_err(|e| DbError::Config(format!("invalid config: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DbError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Resolves the configuration file, applies environment overrides and validates.
    ///
    /// File precedence: `cli_path`, then `EVENTREPO_CONFIG`, then
    /// `./eventrepo.toml` when present, else built-in defaults.
    pub fn load(cli_path: Option<&Path>) -> Result<Self, DbError> {
        let from_env = std::env::var_os("EVENTREPO_CONFIG").map(PathBuf::from);
        let local = PathBuf::from(CONFIG_FILE_NAME);
        let path = match (cli_path, from_env) {
            (Some(p), _) => Some(p.to_path_buf()),
            (None, Some(p)) => Some(p),
            (None, None) => local.exists().then_some(local),
        };
        let mut config = match path {
            Some(p) => {
                log::debug!("loading configuration from {}", p.display());
                Self::from_file(&p)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overrides endpoint, key, database and collection from `EVENTREPO_*` variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Same as [`Self::apply_env`] with a caller-supplied variable lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |name: &str, slot: &mut String| {
            if let Some(v) = lookup(name).filter(|v| !v.is_empty()) {
                *slot = v;
            }
        };
        set("EVENTREPO_ENDPOINT", &mut self.endpoint);
        set("EVENTREPO_KEY", &mut self.credential);
        set("EVENTREPO_DATABASE", &mut self.database);
        set("EVENTREPO_COLLECTION", &mut self.collection);
    }

    pub fn validate(&self) -> Result<(), DbError> {
        let bad = |msg: String| Err(DbError::Config(msg));
        if self.endpoint.trim().is_empty() {
            return bad("endpoint must not be empty".into());
        }
        if self.database.trim().is_empty() || self.collection.trim().is_empty() {
            return bad("database and collection names must not be empty".into());
        }
        if self.max_connections == 0 {
            return bad("max_connections must be positive".into());
        }
        if self.retry.max_attempts == 0 {
            return bad("retry.max_attempts must be at least 1".into());
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return bad("retry.base_delay_ms exceeds retry.max_delay_ms".into());
        }
        self.collection_spec().validate().map_err(|e| match e {
            DbError::InvalidArgument(msg) => DbError::Config(msg),
            other => other,
        })
    }

    #[must_use]
    pub fn link(&self) -> CollectionLink {
        CollectionLink::new(self.database.clone(), self.collection.clone())
    }

    /// `None` when `request_timeout_ms` is 0.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.request_timeout_ms))
        }
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// The collection this configuration provisions.
    ///
    /// An empty index list keeps the index-everything default policy.
    #[must_use]
    pub fn collection_spec(&self) -> CollectionSpec {
        let mut spec = CollectionSpec::new(self.collection.clone());
        if !self.indexes.is_empty() {
            spec = spec.with_policy(IndexingPolicy::allow_list(
                self.indexes.iter().map(IndexConfig::to_included_path).collect(),
            ));
        }
        if self.ttl_secs > 0 {
            spec = spec.with_ttl_secs(self.ttl_secs);
        }
        if let Some(units) = self.throughput {
            spec = spec.with_throughput(units);
        }
        spec
    }
}
