//! Row and snapshot types.

use crate::DbError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored row: a serialized value plus the commit sequence that last wrote it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    /// Commit sequence number of the last write to this row.
    pub version: u64,
    /// Row payload.
    pub data: serde_json::Value,
}

impl Row {
    /// Create a new row.
    pub fn new(version: u64, data: serde_json::Value) -> Self {
        Self { version, data }
    }

    /// Try to deserialize the row into a type.
    pub fn deserialize<T: DeserializeOwned>(&self, table: &str, key: &str) -> Result<T, DbError> {
        T::deserialize(&self.data).map_err(|e| DbError::serialization(table, key, e))
    }
}

/// All rows of one table, ordered by key.
pub type Table = BTreeMap<String, Row>;

/// The full database state as written to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    /// Last commit sequence handed out.
    #[serde(default)]
    pub sequence: u64,
    /// Tables by name.
    #[serde(default)]
    pub tables: BTreeMap<String, Table>,
}

impl Snapshot {
    /// Current version of a row, `0` when absent.
    pub fn version_of(&self, table: &str, key: &str) -> u64 {
        self.tables
            .get(table)
            .and_then(|t| t.get(key))
            .map(|row| row.version)
            .unwrap_or(0)
    }

    pub fn row(&self, table: &str, key: &str) -> Option<&Row> {
        self.tables.get(table).and_then(|t| t.get(key))
    }

    /// Apply buffered writes as commit `sequence`.
    pub fn apply(
        &mut self,
        sequence: u64,
        writes: BTreeMap<(String, String), Option<serde_json::Value>>,
    ) {
        self.sequence = sequence;
        for ((table, key), pending) in writes {
            match pending {
                Some(data) => {
                    self.tables
                        .entry(table)
                        .or_default()
                        .insert(key, Row::new(sequence, data));
                }
                None => {
                    if let Some(rows) = self.tables.get_mut(&table) {
                        rows.remove(&key);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Widget {
        name: String,
        count: i64,
    }

    #[test]
    fn test_row_deserialize() {
        let row = Row::new(3, serde_json::json!({ "name": "bolt", "count": 7 }));
        let widget: Widget = row.deserialize("widgets", "w1").unwrap();
        assert_eq!(
            widget,
            Widget {
                name: "bolt".to_string(),
                count: 7
            }
        );
    }

    #[test]
    fn test_row_deserialize_error_names_row() {
        let row = Row::new(1, serde_json::json!({ "name": 5 }));
        let err = row.deserialize::<Widget>("widgets", "w9").unwrap_err();
        assert!(err.to_string().contains("widgets/w9"));
    }

    #[test]
    fn test_version_of_missing_row() {
        let snapshot = Snapshot::default();
        assert_eq!(snapshot.version_of("orders", "nope"), 0);
    }
}
