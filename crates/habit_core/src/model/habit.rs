//! Habit domain model.
//!
//! # Responsibility
//! - Define the canonical habit record and its completion history.
//! - Provide toggle/query/statistics helpers over one habit.
//!
//! # Invariants
//! - `id` is stable, non-nil and never reused for another habit.
//! - `name` is never blank.
//! - `completions` holds at most one record per calendar day.
//! - `created_at` is set once at construction.

use crate::model::clock::{Clock, SystemClock};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every tracked habit.
pub type HabitId = Uuid;

/// Wire/storage format for completion dates.
pub const COMPLETION_DATE_FORMAT: &str = "%Y-%m-%d";

/// Validation failures for habit construction, mutation and decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HabitValidationError {
    NilId,
    BlankName,
    InvalidDate(String),
}

impl Display for HabitValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "habit id must not be nil"),
            Self::BlankName => write!(f, "habit name must not be blank"),
            Self::InvalidDate(value) => {
                write!(f, "invalid completion date `{value}`; expected YYYY-MM-DD")
            }
        }
    }
}

impl Error for HabitValidationError {}

/// Parses a strict ISO `YYYY-MM-DD` calendar day.
pub fn parse_completion_date(value: &str) -> Result<NaiveDate, HabitValidationError> {
    let trimmed = value.trim();
    // chrono accepts unpadded fields; the stored shape is always zero-padded.
    if trimmed.len() != 10 {
        return Err(HabitValidationError::InvalidDate(value.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, COMPLETION_DATE_FORMAT)
        .map_err(|_| HabitValidationError::InvalidDate(value.to_string()))
}

/// Formats a calendar day in the stored `YYYY-MM-DD` shape.
pub fn format_completion_date(date: NaiveDate) -> String {
    date.format(COMPLETION_DATE_FORMAT).to_string()
}

/// A named habit with its per-day completion history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "HabitWire")]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    /// Keyed by calendar day; absence means "no record", not "not completed".
    pub completions: BTreeMap<NaiveDate, bool>,
    /// Unix epoch milliseconds. Only used for default ordering.
    pub created_at: i64,
}

#[derive(Deserialize)]
struct HabitWire {
    id: HabitId,
    name: String,
    /// Keys go through `parse_completion_date`, not chrono's lenient parser.
    #[serde(default)]
    completions: BTreeMap<String, bool>,
    created_at: i64,
}

impl TryFrom<HabitWire> for Habit {
    type Error = HabitValidationError;

    fn try_from(wire: HabitWire) -> Result<Self, Self::Error> {
        let completions = wire
            .completions
            .into_iter()
            .map(|(date, completed)| parse_completion_date(&date).map(|day| (day, completed)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        let habit = Self {
            id: wire.id,
            name: wire.name,
            completions,
            created_at: wire.created_at,
        };
        habit.validate()?;
        Ok(habit)
    }
}

impl Habit {
    /// Creates a habit with a fresh id, stamped by the system clock.
    pub fn new(name: impl Into<String>) -> Result<Self, HabitValidationError> {
        Self::new_with_clock(name, &SystemClock)
    }

    /// Creates a habit with a fresh id, stamped by `clock`.
    pub fn new_with_clock(
        name: impl Into<String>,
        clock: &dyn Clock,
    ) -> Result<Self, HabitValidationError> {
        Self::with_id(Uuid::new_v4(), name, clock.now_epoch_ms())
    }

    /// Creates a habit with a caller-provided identity and creation time.
    ///
    /// Used by load paths where identity already exists.
    pub fn with_id(
        id: HabitId,
        name: impl Into<String>,
        created_at: i64,
    ) -> Result<Self, HabitValidationError> {
        let habit = Self {
            id,
            name: name.into().trim().to_string(),
            completions: BTreeMap::new(),
            created_at,
        };
        habit.validate()?;
        Ok(habit)
    }

    pub fn validate(&self) -> Result<(), HabitValidationError> {
        if self.id.is_nil() {
            return Err(HabitValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(HabitValidationError::BlankName);
        }
        Ok(())
    }

    /// Replaces the display name. Blank names are rejected and leave the
    /// habit untouched.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), HabitValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(HabitValidationError::BlankName);
        }
        self.name = trimmed.to_string();
        Ok(())
    }

    /// Flips today's record and returns the new value.
    ///
    /// An absent record becomes `true`: the first toggle of a day is always an
    /// affirmative completion.
    pub fn toggle_today(&mut self, clock: &dyn Clock) -> bool {
        self.toggle_on(clock.today())
    }

    pub fn is_completed_today(&self, clock: &dyn Clock) -> bool {
        self.is_completed_on(clock.today())
    }

    /// Flips the record for `date`, creating it as `true` when absent.
    pub fn toggle_on(&mut self, date: NaiveDate) -> bool {
        let next = match self.completions.get(&date) {
            Some(completed) => !completed,
            None => true,
        };
        self.completions.insert(date, next);
        next
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.completions.get(&date).copied().unwrap_or(false)
    }

    /// Returns the recorded value for `date`, or `None` when nothing was
    /// recorded that day.
    pub fn completion(&self, date: NaiveDate) -> Option<bool> {
        self.completions.get(&date).copied()
    }

    /// Records `completed` for `date`, overwriting any existing record.
    pub fn set_completion(&mut self, date: NaiveDate, completed: bool) {
        self.completions.insert(date, completed);
    }

    pub fn recorded_days(&self) -> usize {
        self.completions.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completions.values().filter(|completed| **completed).count()
    }

    /// Percentage (0-100) of recorded days marked completed.
    ///
    /// Days without a record do not count against the rate; a habit with a
    /// single completed record reports 100.
    pub fn completion_rate(&self) -> f64 {
        let recorded = self.recorded_days();
        if recorded == 0 {
            return 0.0;
        }
        self.completed_count() as f64 / recorded as f64 * 100.0
    }
}
