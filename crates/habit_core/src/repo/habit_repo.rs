//! Habit repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/replace/delete/upsert/list APIs over `habits` and
//!   `completions`.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Habit::validate()` before SQL mutations.
//! - Each write runs in one `IMMEDIATE` transaction; a failed write leaves
//!   the database unchanged.
//! - `(habit_id, completed_date)` is unique; upserts overwrite in place.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::habit::{
    format_completion_date, parse_completion_date, Habit, HabitId, HabitValidationError,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const HABIT_SELECT_SQL: &str = "SELECT id, name, created_at FROM habits";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for habit persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(HabitValidationError),
    Db(DbError),
    NotFound(HabitId),
    Conflict(HabitId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "habit not found: {id}"),
            Self::Conflict(id) => write!(f, "habit already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted habit data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<HabitValidationError> for RepoError {
    fn from(value: HabitValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for durable habit storage.
pub trait HabitRepository {
    /// Inserts a new habit and any completions it already carries.
    fn insert_habit(&mut self, habit: &Habit) -> RepoResult<()>;
    /// Replaces name and full completion set of an existing habit.
    /// `created_at` is never rewritten.
    fn replace_habit(&mut self, habit: &Habit) -> RepoResult<()>;
    /// Deletes a habit and its completions. Returns whether a row existed.
    fn delete_habit(&mut self, id: HabitId) -> RepoResult<bool>;
    /// Inserts or overwrites one day's record for an existing habit.
    fn upsert_completion(
        &mut self,
        id: HabitId,
        date: NaiveDate,
        completed: bool,
    ) -> RepoResult<()>;
    fn get_habit(&self, id: HabitId) -> RepoResult<Option<Habit>>;
    /// Lists all habits oldest `created_at` first, ties broken by id.
    fn list_habits(&self) -> RepoResult<Vec<Habit>>;
}

/// SQLite-backed habit repository.
pub struct SqliteHabitRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteHabitRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations have not been applied.
    /// - `MissingRequiredTable`/`MissingRequiredColumn` when the schema shape
    ///   does not match what this binary writes.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection whose schema a previous `try_new` already
    /// accepted, skipping the version/table/column queries.
    ///
    /// A schema changed underneath since then surfaces as `RepoError::Db`
    /// from the failing statement.
    pub(crate) fn new_unchecked(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl HabitRepository for SqliteHabitRepository<'_> {
    fn insert_habit(&mut self, habit: &Habit) -> RepoResult<()> {
        habit.validate()?;
        let id_text = habit.id.to_string();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if habit_exists_in_tx(&tx, &id_text)? {
            return Err(RepoError::Conflict(habit.id));
        }

        tx.execute(
            "INSERT INTO habits (id, name, created_at) VALUES (?1, ?2, ?3);",
            params![id_text, habit.name.as_str(), habit.created_at],
        )?;
        insert_completions(&tx, &id_text, &habit.completions)?;

        tx.commit()?;
        Ok(())
    }

    fn replace_habit(&mut self, habit: &Habit) -> RepoResult<()> {
        habit.validate()?;
        let id_text = habit.id.to_string();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            "UPDATE habits SET name = ?2 WHERE id = ?1;",
            params![id_text, habit.name.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(habit.id));
        }

        tx.execute(
            "DELETE FROM completions WHERE habit_id = ?1;",
            [id_text.as_str()],
        )?;
        insert_completions(&tx, &id_text, &habit.completions)?;

        tx.commit()?;
        Ok(())
    }

    fn delete_habit(&mut self, id: HabitId) -> RepoResult<bool> {
        let id_text = id.to_string();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Cascade covers this, but only while `foreign_keys=ON`.
        tx.execute(
            "DELETE FROM completions WHERE habit_id = ?1;",
            [id_text.as_str()],
        )?;
        let changed = tx.execute("DELETE FROM habits WHERE id = ?1;", [id_text.as_str()])?;
        tx.commit()?;

        Ok(changed > 0)
    }

    fn upsert_completion(
        &mut self,
        id: HabitId,
        date: NaiveDate,
        completed: bool,
    ) -> RepoResult<()> {
        let id_text = id.to_string();

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !habit_exists_in_tx(&tx, &id_text)? {
            return Err(RepoError::NotFound(id));
        }

        tx.execute(
            "INSERT INTO completions (habit_id, completed_date, is_completed)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(habit_id, completed_date)
             DO UPDATE SET is_completed = excluded.is_completed;",
            params![id_text, format_completion_date(date), bool_to_int(completed)],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_habit(&self, id: HabitId) -> RepoResult<Option<Habit>> {
        let id_text = id.to_string();
        let mut stmt = self
            .conn
            .prepare(&format!("{HABIT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id_text.as_str()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut habit = parse_habit_row(row)?;
        let mut stmt = self.conn.prepare(
            "SELECT habit_id, completed_date, is_completed
             FROM completions
             WHERE habit_id = ?1
             ORDER BY completed_date ASC;",
        )?;
        let mut rows = stmt.query([id_text.as_str()])?;
        while let Some(row) = rows.next()? {
            let (_, date, completed) = parse_completion_row(row)?;
            habit.completions.insert(date, completed);
        }

        Ok(Some(habit))
    }

    fn list_habits(&self) -> RepoResult<Vec<Habit>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{HABIT_SELECT_SQL} ORDER BY created_at ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut habits = Vec::new();
        let mut index_by_id = HashMap::new();
        while let Some(row) = rows.next()? {
            let habit = parse_habit_row(row)?;
            index_by_id.insert(habit.id, habits.len());
            habits.push(habit);
        }

        let mut stmt = self.conn.prepare(
            "SELECT habit_id, completed_date, is_completed
             FROM completions
             ORDER BY habit_id ASC, completed_date ASC;",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let (habit_id, date, completed) = parse_completion_row(row)?;
            let Some(&index) = index_by_id.get(&habit_id) else {
                return Err(RepoError::InvalidData(format!(
                    "completion references unknown habit `{habit_id}`"
                )));
            };
            habits[index].completions.insert(date, completed);
        }

        Ok(habits)
    }
}

fn insert_completions(
    tx: &Transaction<'_>,
    habit_id: &str,
    completions: &BTreeMap<NaiveDate, bool>,
) -> RepoResult<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO completions (habit_id, completed_date, is_completed)
         VALUES (?1, ?2, ?3);",
    )?;
    for (date, completed) in completions {
        stmt.execute(params![
            habit_id,
            format_completion_date(*date),
            bool_to_int(*completed)
        ])?;
    }
    Ok(())
}

fn habit_exists_in_tx(tx: &Transaction<'_>, habit_id: &str) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM habits WHERE id = ?1);",
        [habit_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "habits.id")?;
    let name: String = row.get("name")?;
    let created_at: i64 = row.get("created_at")?;

    let habit = Habit {
        id,
        name,
        completions: BTreeMap::new(),
        created_at,
    };
    habit.validate()?;
    Ok(habit)
}

fn parse_completion_row(row: &Row<'_>) -> RepoResult<(HabitId, NaiveDate, bool)> {
    let id_text: String = row.get("habit_id")?;
    let habit_id = parse_uuid(&id_text, "completions.habit_id")?;

    let date_text: String = row.get("completed_date")?;
    let date = parse_completion_date(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in completions.completed_date"
        ))
    })?;

    let completed = match row.get::<_, i64>("is_completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_completed value `{other}` in completions.is_completed"
            )));
        }
    };

    Ok((habit_id, date, completed))
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<HabitId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected = latest_version();
    let actual = schema_version(conn)?;
    if actual != expected {
        return Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        ("habits", &["id", "name", "created_at"]),
        ("completions", &["habit_id", "completed_date", "is_completed"]),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
