//! Per-user data location.
//!
//! # Responsibility
//! - Resolve the fixed application directory under the user's home.
//! - Derive database and log locations from one root.
//!
//! # Invariants
//! - All durable state lives under `AppPaths::root()`.
//! - No environment variable or config file is required.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Directory created under the user's home directory.
pub const DATA_DIR_NAME: &str = ".habit-tracker";
pub const DB_FILE_NAME: &str = "habits.db";
pub const LOG_DIR_NAME: &str = "logs";

#[derive(Debug)]
pub enum ConfigError {
    HomeDirUnavailable,
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HomeDirUnavailable => write!(f, "could not resolve the user's home directory"),
            Self::CreateDir { path, source } => {
                write!(f, "failed to create `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HomeDirUnavailable => None,
            Self::CreateDir { source, .. } => Some(source),
        }
    }
}

/// Resolved filesystem layout for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    /// Resolves `<home>/.habit-tracker`. Does not touch the filesystem.
    pub fn resolve_default() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeDirUnavailable)?;
        Ok(Self::from_root(home.join(DATA_DIR_NAME)))
    }

    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR_NAME)
    }

    /// Creates the data root if missing. Idempotent.
    pub fn ensure_root(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.root).map_err(|source| ConfigError::CreateDir {
            path: self.root.clone(),
            source,
        })
    }
}
