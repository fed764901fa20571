//! Authoritative habit collection.
//!
//! # Responsibility
//! - Own the in-memory view of all habits and the durable connection.
//! - Expose the only read/write entry points used by presentation code.
//!
//! # Invariants
//! - The raw collection is never handed out; callers receive clones.
//! - Durable state and in-memory view agree after every successful call and
//!   are both unchanged after a failed one.

pub mod habit_store;
