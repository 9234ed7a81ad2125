//! Database handle and optimistic transactions.

use crate::types::{Row, Snapshot};
use crate::DbError;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

type RowId = (String, String);

/// Shared database handle.
///
/// Cloning is cheap; all clones see the same tables. Rows are serde values
/// addressed by `(table, key)`. Every committed write stamps the row with a
/// fresh commit sequence, which transactions use to detect lost updates.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Inner>,
}

struct Inner {
    state: RwLock<Snapshot>,
    path: Option<PathBuf>,
}

impl Db {
    /// Open a database that lives only in memory.
    pub fn open_in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Snapshot::default()),
                path: None,
            }),
        }
    }

    /// Open a database backed by a JSON snapshot file.
    ///
    /// The file is created on the first commit if it does not exist yet.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Snapshot::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| DbError::OpenError(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(DbError::OpenError(format!("{}: {}", path.display(), e))),
        };

        tracing::debug!(
            path = %path.display(),
            tables = snapshot.tables.len(),
            "Database opened"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(snapshot),
                path: Some(path),
            }),
        })
    }

    /// Path of the backing snapshot file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Start a new transaction.
    pub fn begin(&self) -> Transaction {
        Transaction {
            db: self.clone(),
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Read a single committed row outside of any transaction.
    pub async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        key: &str,
    ) -> Result<Option<T>, DbError> {
        let state = self.inner.state.read().await;
        state
            .row(table, key)
            .map(|row| row.deserialize(table, key))
            .transpose()
    }

    /// Read all committed rows of a table, ordered by key.
    pub async fn scan<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, DbError> {
        let state = self.inner.state.read().await;
        match state.tables.get(table) {
            Some(rows) => rows
                .iter()
                .map(|(key, row)| row.deserialize(table, key))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Number of committed rows in a table.
    pub async fn count(&self, table: &str) -> usize {
        let state = self.inner.state.read().await;
        state.tables.get(table).map(|t| t.len()).unwrap_or(0)
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), DbError> {
        let Some(path) = self.inner.path.as_ref() else {
            return Ok(());
        };

        let bytes = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| DbError::WriteError(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| DbError::WriteError(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| DbError::WriteError(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

/// A unit of work against the database.
///
/// Reads record the version they observed; writes are buffered until
/// [`Transaction::commit`], which applies all of them atomically or none at
/// all. Dropping a transaction without committing discards its writes.
pub struct Transaction {
    db: Db,
    reads: HashMap<RowId, u64>,
    writes: BTreeMap<RowId, Option<serde_json::Value>>,
}

impl Transaction {
    /// Read a row, seeing this transaction's own pending writes.
    pub async fn get<T: DeserializeOwned>(
        &mut self,
        table: &str,
        key: &str,
    ) -> Result<Option<T>, DbError> {
        let id = (table.to_string(), key.to_string());
        if let Some(pending) = self.writes.get(&id) {
            return match pending {
                Some(value) => T::deserialize(value)
                    .map(Some)
                    .map_err(|e| DbError::serialization(table, key, e)),
                None => Ok(None),
            };
        }

        let row = {
            let state = self.db.inner.state.read().await;
            state.row(table, key).cloned()
        };
        self.reads
            .entry(id)
            .or_insert_with(|| row.as_ref().map(|r| r.version).unwrap_or(0));

        row.map(|r| r.deserialize(table, key)).transpose()
    }

    /// Read every row of a table, merged with this transaction's pending writes.
    ///
    /// All committed rows returned are tracked as reads.
    pub async fn scan<T: DeserializeOwned>(&mut self, table: &str) -> Result<Vec<T>, DbError> {
        let committed: Vec<(String, Row)> = {
            let state = self.db.inner.state.read().await;
            state
                .tables
                .get(table)
                .map(|rows| {
                    rows.iter()
                        .map(|(key, row)| (key.clone(), row.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut merged: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        for (key, row) in committed {
            self.reads
                .entry((table.to_string(), key.clone()))
                .or_insert(row.version);
            merged.insert(key, row.data);
        }

        for ((t, key), pending) in &self.writes {
            if t != table {
                continue;
            }
            match pending {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        merged
            .iter()
            .map(|(key, value)| {
                T::deserialize(value).map_err(|e| DbError::serialization(table, key, e))
            })
            .collect()
    }

    /// Buffer an insert or update.
    pub fn put<T: Serialize>(&mut self, table: &str, key: &str, value: &T) -> Result<(), DbError> {
        let data =
            serde_json::to_value(value).map_err(|e| DbError::serialization(table, key, e))?;
        self.writes
            .insert((table.to_string(), key.to_string()), Some(data));
        Ok(())
    }

    /// Buffer a delete.
    pub fn delete(&mut self, table: &str, key: &str) {
        self.writes
            .insert((table.to_string(), key.to_string()), None);
    }

    /// Whether the transaction has buffered writes.
    pub fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Apply all buffered writes atomically.
    ///
    /// Fails with [`DbError::Conflict`] if any row this transaction read was
    /// committed by someone else in the meantime, or with
    /// [`DbError::WriteError`] if the snapshot file cannot be written. Nothing
    /// becomes visible in either case.
    pub async fn commit(self) -> Result<u64, DbError> {
        if self.writes.is_empty() {
            return Ok(0);
        }

        let mut state = self.db.inner.state.write().await;

        for ((table, key), seen) in &self.reads {
            if state.version_of(table, key) != *seen {
                tracing::debug!(table = %table, key = %key, "Commit rejected: row changed");
                return Err(DbError::Conflict {
                    table: table.clone(),
                    key: key.clone(),
                });
            }
        }

        let sequence = state.sequence + 1;
        if self.db.inner.path.is_some() {
            // Stage on a copy so a failed write leaves the committed state untouched.
            let mut next = (*state).clone();
            next.apply(sequence, self.writes);
            self.db.persist(&next).await?;
            *state = next;
        } else {
            state.apply(sequence, self.writes);
        }
        Ok(sequence)
    }

    /// Discard all buffered writes.
    pub fn rollback(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: i64,
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let db = Db::open_in_memory();
        let mut tx = db.begin();
        tx.put("counters", "a", &Counter { value: 1 }).unwrap();

        assert!(db.get::<Counter>("counters", "a").await.unwrap().is_none());

        tx.commit().await.unwrap();
        let stored: Counter = db.get("counters", "a").await.unwrap().unwrap();
        assert_eq!(stored.value, 1);
    }

    #[tokio::test]
    async fn test_dropped_transaction_writes_nothing() {
        let db = Db::open_in_memory();
        {
            let mut tx = db.begin();
            tx.put("counters", "a", &Counter { value: 1 }).unwrap();
        }
        assert_eq!(db.count("counters").await, 0);
    }

    #[tokio::test]
    async fn test_transaction_sees_own_writes() {
        let db = Db::open_in_memory();
        let mut tx = db.begin();
        tx.put("counters", "a", &Counter { value: 5 }).unwrap();

        let seen: Counter = tx.get("counters", "a").await.unwrap().unwrap();
        assert_eq!(seen.value, 5);

        tx.delete("counters", "a");
        assert!(tx.get::<Counter>("counters", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_update_conflicts() {
        let db = Db::open_in_memory();
        let mut seed = db.begin();
        seed.put("counters", "a", &Counter { value: 10 }).unwrap();
        seed.commit().await.unwrap();

        let mut first = db.begin();
        let mut second = db.begin();

        let a: Counter = first.get("counters", "a").await.unwrap().unwrap();
        let b: Counter = second.get("counters", "a").await.unwrap().unwrap();

        first
            .put("counters", "a", &Counter { value: a.value - 3 })
            .unwrap();
        second
            .put("counters", "a", &Counter { value: b.value - 4 })
            .unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_conflict());

        let stored: Counter = db.get("counters", "a").await.unwrap().unwrap();
        assert_eq!(stored.value, 7);
    }

    #[tokio::test]
    async fn test_conflict_on_insert_of_same_key() {
        let db = Db::open_in_memory();
        let mut first = db.begin();
        let mut second = db.begin();

        assert!(first.get::<Counter>("codes", "SAVE10").await.unwrap().is_none());
        assert!(second.get::<Counter>("codes", "SAVE10").await.unwrap().is_none());

        first.put("codes", "SAVE10", &Counter { value: 1 }).unwrap();
        second.put("codes", "SAVE10", &Counter { value: 2 }).unwrap();

        first.commit().await.unwrap();
        assert!(second.commit().await.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_scan_merges_pending_writes() {
        let db = Db::open_in_memory();
        let mut seed = db.begin();
        seed.put("counters", "a", &Counter { value: 1 }).unwrap();
        seed.put("counters", "b", &Counter { value: 2 }).unwrap();
        seed.commit().await.unwrap();

        let mut tx = db.begin();
        tx.delete("counters", "a");
        tx.put("counters", "c", &Counter { value: 3 }).unwrap();

        let values: Vec<i64> = tx
            .scan::<Counter>("counters")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.value)
            .collect();
        assert_eq!(values, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let db = Db::open(sub.join("store.json")).await.unwrap();

        let mut seed = db.begin();
        seed.put("counters", "a", &Counter { value: 1 }).unwrap();
        seed.commit().await.unwrap();

        std::fs::remove_dir_all(&sub).unwrap();

        let mut tx = db.begin();
        tx.put("counters", "a", &Counter { value: 2 }).unwrap();
        tx.put("counters", "b", &Counter { value: 3 }).unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(!err.is_conflict());

        let stored: Counter = db.get("counters", "a").await.unwrap().unwrap();
        assert_eq!(stored.value, 1);
        assert!(db.get::<Counter>("counters", "b").await.unwrap().is_none());

        // A transaction that read the old row still commits once the disk is back.
        std::fs::create_dir(&sub).unwrap();
        let mut retry = db.begin();
        let current: Counter = retry.get("counters", "a").await.unwrap().unwrap();
        retry
            .put("counters", "a", &Counter { value: current.value + 1 })
            .unwrap();
        retry.commit().await.unwrap();
        let stored: Counter = db.get("counters", "a").await.unwrap().unwrap();
        assert_eq!(stored.value, 2);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let db = Db::open(&path).await.unwrap();
        let mut tx = db.begin();
        tx.put("counters", "a", &Counter { value: 42 }).unwrap();
        tx.commit().await.unwrap();

        let reopened = Db::open(&path).await.unwrap();
        let stored: Counter = reopened.get("counters", "a").await.unwrap().unwrap();
        assert_eq!(stored.value, 42);
    }
}
