use crate::collection::IndexUse;
use crate::geo::GeoPoint;
use crate::types::ContinuationToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Store-side predicate over a document body.
///
/// Paths are dotted (`Address.City`). Callers compose filters and hand them
/// to the store; the paging cursor only ever passes them through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Value> },
    Cmp { path: String, op: CmpOp, value: Value },
    /// Point at `path` lies strictly closer than `max_distance` metres to `center`.
    Within { path: String, center: GeoPoint, max_distance: f64 },
}

impl Filter {
    #[must_use]
    pub fn within(path: impl Into<String>, center: GeoPoint, max_distance: f64) -> Self {
        Self::Within { path: path.into(), center, max_distance }
    }

    #[must_use]
    pub fn cmp(path: impl Into<String>, op: CmpOp, value: impl Into<Value>) -> Self {
        Self::Cmp { path: path.into(), op, value: value.into() }
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::True => other,
            Self::And(mut fs) => {
                fs.push(other);
                Self::And(fs)
            }
            f => Self::And(vec![f, other]),
        }
    }

    /// Every path the filter reads, with the kind of index it needs.
    #[must_use]
    pub fn index_uses(&self) -> Vec<(String, IndexUse)> {
        let mut out = Vec::new();
        self.collect_uses(&mut out);
        out
    }

    fn collect_uses(&self, out: &mut Vec<(String, IndexUse)>) {
        match self {
            Self::True => {}
            Self::And(fs) | Self::Or(fs) => fs.iter().for_each(|f| f.collect_uses(out)),
            Self::Not(f) => f.collect_uses(out),
            Self::Exists { path, .. } | Self::In { path, .. } | Self::Cmp { path, .. } => {
                out.push((path.clone(), IndexUse::Range));
            }
            Self::Within { path, .. } => out.push((path.clone(), IndexUse::Spatial)),
        }
    }
}

/// What the store sends back for each hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// The whole document body.
    #[default]
    Full,
    /// `true` per hit; used when only the continuation token matters.
    Marker,
}

/// One page request against a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub filter: Filter,
    /// `None` lets the store pick the page size.
    pub max_item_count: Option<usize>,
    /// Empty token starts from the beginning.
    pub continuation: ContinuationToken,
    pub projection: Projection,
}

impl QueryRequest {
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            max_item_count: None,
            continuation: ContinuationToken::start(),
            projection: Projection::Full,
        }
    }

    #[must_use]
    pub const fn max_items(mut self, n: usize) -> Self {
        self.max_item_count = Some(n);
        self
    }

    #[must_use]
    pub fn after(mut self, token: ContinuationToken) -> Self {
        self.continuation = token;
        self
    }

    #[must_use]
    pub const fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }
}

/// Raw page returned by the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedResponse {
    pub items: Vec<Value>,
    /// Token for the next page; `None` once the result set is exhausted.
    pub continuation: Option<ContinuationToken>,
}

impl FeedResponse {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A bounded, ordered slice of a result set plus the token to continue from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub continuation: Option<ContinuationToken>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn empty() -> Self {
        Self { items: Vec::new(), continuation: None }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
