//! Generic record shapes exchanged with the remote data service.

use serde::{Deserialize, Serialize};

/// A single row as returned by the remote data service.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Exact-match filter on one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Check whether a record satisfies this filter.
    ///
    /// Non-string values are compared through their JSON rendering, so a
    /// numeric `id` column matches the filter value `"7"`.
    pub fn matches(&self, record: &Record) -> bool {
        match record.get(&self.column) {
            Some(serde_json::Value::String(s)) => *s == self.value,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Kind of row change reported by a push notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    Truncate,
    /// The change feed reconnected; changes during the outage may be missing.
    Resync,
}

/// Push notification emitted when a watched table changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    #[serde(rename = "op")]
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            table: table.into(),
            kind,
        }
    }
}
