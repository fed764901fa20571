//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable data access contract for habits and completions.
//! - Isolate SQLite query details from the store and its callers.
//!
//! # Invariants
//! - Repository writes must enforce `Habit::validate()` before persistence.
//! - Every multi-statement write commits or rolls back as one transaction.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod habit_repo;
