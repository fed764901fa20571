//! Core persistence and consistency layer for the habit tracker.
//! This crate is the single source of truth for habit data and its invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use config::{AppPaths, ConfigError};
pub use logging::{default_log_level, init_logging, log_level_for, logging_status};
pub use model::clock::{Clock, FixedClock, SystemClock};
pub use model::habit::{
    format_completion_date, parse_completion_date, Habit, HabitId, HabitValidationError,
};
pub use repo::habit_repo::{HabitRepository, RepoError, RepoResult, SqliteHabitRepository};
pub use store::habit_store::{HabitStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
