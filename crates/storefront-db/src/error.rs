//! Database error types.

use thiserror::Error;

/// Errors that can occur when using the database.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to open the database snapshot.
    #[error("Failed to open database: {0}")]
    OpenError(String),

    /// Failed to write the database snapshot.
    #[error("Failed to write database: {0}")]
    WriteError(String),

    /// Failed to serialize or deserialize a row.
    #[error("Serialization error in {table}/{key}: {message}")]
    SerializationError {
        table: String,
        key: String,
        message: String,
    },

    /// A row read by the transaction was changed by another commit.
    #[error("Write conflict on {table}/{key}")]
    Conflict { table: String, key: String },
}

impl DbError {
    /// Check whether the operation may succeed if retried from scratch.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DbError::Conflict { .. })
    }

    pub(crate) fn serialization(table: &str, key: &str, err: serde_json::Error) -> Self {
        DbError::SerializationError {
            table: table.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}
