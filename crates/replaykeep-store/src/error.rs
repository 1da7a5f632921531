use std::fmt;

use thiserror::Error;

/// Which row of a match upsert failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertRow {
    /// The `matches` row.
    Summary,
    /// A `participants` row, by position in the submitted list.
    Participant { index: usize, participant_id: i64 },
}

impl fmt::Display for UpsertRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertRow::Summary => f.write_str("summary"),
            UpsertRow::Participant {
                index,
                participant_id,
            } => write!(f, "participant #{index} (id {participant_id})"),
        }
    }
}

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A match upsert failed and its transaction was rolled back.
    #[error("Upsert of match {match_id} failed at {row}: {source}")]
    Upsert {
        match_id: i64,
        row: UpsertRow,
        #[source]
        source: rusqlite::Error,
    },

    /// A targeted update named the same column more than once.
    #[error("Invalid field in update: {0}")]
    InvalidField(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
