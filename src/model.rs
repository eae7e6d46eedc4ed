use crate::geo::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Address {
    pub city: String,
    pub street_name: String,
    pub street_number: String,
}

/// An event record as stored in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(rename = "id", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: GeoPoint,
    pub time: DateTime<Utc>,
    pub address: Address,
    /// Written only by the visitor counter; absent on fresh events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitors: Option<i64>,
}

impl Event {
    #[must_use]
    pub const fn visitor_count(&self) -> i64 {
        match self.visitors {
            Some(n) => n,
            None => 0,
        }
    }
}
