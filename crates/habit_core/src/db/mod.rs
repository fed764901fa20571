//! SQLite bootstrap for the habit database.
//!
//! # Responsibility
//! - Hand out connections with pragmas set and the schema migrated.
//! - Classify bootstrap failures so callers can log a stable code.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - Deleting a habit row cascades to its completions on every returned
//!   connection.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening, configuring or migrating the habit database.
#[derive(Debug)]
pub enum DbError {
    /// Opening the file or a pragma/statement outside migrations failed.
    Sqlite(rusqlite::Error),
    /// A migration script failed; its transaction was rolled back.
    Migration {
        version: u32,
        source: rusqlite::Error,
    },
    /// The file carries a schema written by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Stable short code used in `db_open` log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "db_sqlite",
            Self::Migration { .. } => "db_migration_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
        }
    }

    pub(crate) fn migration(version: u32) -> impl FnOnce(rusqlite::Error) -> Self {
        move |source| Self::Migration { version, source }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Migration { version, source } => {
                write!(f, "habit schema migration {version} failed: {source}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "habit database schema version {db_version} is newer than supported {latest_supported}; upgrade habit-tracker"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(source) | Self::Migration { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
