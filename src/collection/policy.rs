use crate::errors::DbError;
use crate::query::Filter;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Point,
    String,
    Number,
}

/// Kind of index a query needs on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexUse {
    Spatial,
    Range,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexSpec {
    Spatial { data_type: DataType },
    /// `precision = -1` is maximum precision.
    Range { data_type: DataType, precision: i32 },
}

impl IndexSpec {
    #[must_use]
    pub const fn serves(&self, use_: IndexUse) -> bool {
        matches!(
            (self, use_),
            (Self::Spatial { .. }, IndexUse::Spatial) | (Self::Range { .. }, IndexUse::Range)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncludedPath {
    pub path: String,
    pub indexes: Vec<IndexSpec>,
}

/// Which document paths take part in server-side indexing.
///
/// Paths use the `/Field/Sub/?` form for a scalar at an exact path and
/// `/Field/*` for a whole subtree. The default policy indexes everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexingPolicy {
    pub included_paths: Vec<IncludedPath>,
    pub excluded_paths: Vec<String>,
}

impl IndexingPolicy {
    /// Indexes only `included`; every other path is excluded.
    #[must_use]
    pub fn allow_list(included: Vec<IncludedPath>) -> Self {
        Self { included_paths: included, excluded_paths: vec!["/*".to_string()] }
    }

    /// Whether a query can filter on dotted `field` with an index of kind `use_`.
    #[must_use]
    pub fn covers(&self, field: &str, use_: IndexUse) -> bool {
        let included = self
            .included_paths
            .iter()
            .find(|p| path_matches(&p.path, field));
        if let Some(p) = included {
            return p.indexes.iter().any(|i| i.serves(use_)) || p.indexes.is_empty();
        }
        !self.excluded_paths.iter().any(|p| path_matches(p, field))
    }

    /// Rejects filters that read paths this policy does not index.
    pub fn ensure_covers(&self, filter: &Filter) -> Result<(), DbError> {
        for (path, use_) in filter.index_uses() {
            if !self.covers(&path, use_) {
                return Err(DbError::InvalidArgument(format!(
                    "filter on `{path}` needs a {use_:?} index but the path is excluded from indexing"
                )));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), DbError> {
        let paths = self.included_paths.iter().map(|p| p.path.as_str());
        for p in paths.chain(self.excluded_paths.iter().map(String::as_str)) {
            if !is_valid_path(p) {
                return Err(DbError::InvalidArgument(format!(
                    "index path `{p}` must start with `/` and end with `/?` or `/*`"
                )));
            }
        }
        Ok(())
    }
}

fn is_valid_path(p: &str) -> bool {
    p == "/*" || (p.starts_with('/') && (p.ends_with("/?") || p.ends_with("/*")) && p.len() > 3)
}

/// Matches a policy path against a dotted field path.
fn path_matches(pattern: &str, field: &str) -> bool {
    let Some(rest) = pattern.strip_prefix('/') else {
        return false;
    };
    if rest == "*" {
        return true;
    }
    let dotted = |s: &str| s.replace('/', ".");
    if let Some(exact) = rest.strip_suffix("/?") {
        return dotted(exact) == field;
    }
    if let Some(prefix) = rest.strip_suffix("/*") {
        let prefix = dotted(prefix);
        return field == prefix
            || field.strip_prefix(prefix.as_str()).is_some_and(|t| t.starts_with('.'));
    }
    false
}

/// Everything needed to create a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub id: String,
    pub indexing_policy: IndexingPolicy,
    /// Seconds after the last write before the store purges a document.
    pub default_ttl_secs: Option<u64>,
    /// Provisioned throughput units.
    pub throughput: Option<u32>,
}

impl CollectionSpec {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            indexing_policy: IndexingPolicy::default(),
            default_ttl_secs: None,
            throughput: None,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: IndexingPolicy) -> Self {
        self.indexing_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_ttl_secs(mut self, secs: u64) -> Self {
        self.default_ttl_secs = Some(secs);
        self
    }

    #[must_use]
    pub const fn with_throughput(mut self, units: u32) -> Self {
        self.throughput = Some(units);
        self
    }

    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), DbError> {
        if self.id.trim().is_empty() {
            return Err(DbError::InvalidArgument("collection id must not be empty".into()));
        }
        if self.default_ttl_secs == Some(0) {
            return Err(DbError::InvalidArgument("ttl must be at least one second".into()));
        }
        if let Some(units) = self.throughput
            && (units < 400 || units % 100 != 0)
        {
            return Err(DbError::InvalidArgument(format!(
                "throughput {units} must be at least 400 and a multiple of 100"
            )));
        }
        self.indexing_policy.validate()
    }
}
