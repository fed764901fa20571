//! Domain model for tracked habits and their daily completions.
//!
//! # Responsibility
//! - Define the canonical `Habit` record and its per-day completion map.
//! - Provide pure, I/O-free operations over a single habit.
//!
//! # Invariants
//! - Every habit is identified by a stable, non-nil `HabitId`.
//! - A habit holds at most one completion record per calendar day.
//! - "Today" is always obtained from a `Clock`, never read ad hoc.

pub mod clock;
pub mod habit;
