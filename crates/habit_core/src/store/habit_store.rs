//! Lock-guarded habit store over SQLite.
//!
//! # Responsibility
//! - Locate/open the durable database and load the collection.
//! - Apply add/update/delete/upsert mutations to disk and memory as a unit.
//! - Serve ordered snapshots of the collection to readers.
//!
//! # Invariants
//! - Readers share the `RwLock`; writers hold it exclusively for the whole
//!   transaction, then take the connection `Mutex`.
//! - The in-memory map is touched only after the SQL transaction commits.
//! - `get_habits()` never fails.
//! - A lock poisoned by a panicking holder is recovered, not propagated. A
//!   poisoned collection is re-read from disk before the next write.

use crate::config::{AppPaths, ConfigError};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::clock::Clock;
use crate::model::habit::{Habit, HabitId, HabitValidationError};
use crate::repo::habit_repo::{HabitRepository, RepoError, SqliteHabitRepository};
use chrono::NaiveDate;
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by `HabitStore` operations.
///
/// Only `Initialization` is fatal; every other variant leaves the store
/// usable and its prior state intact.
#[derive(Debug)]
pub enum StoreError {
    Initialization(String),
    IdentityConflict(HabitId),
    NotFound(HabitId),
    Validation(HabitValidationError),
    Io(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialization(message) => {
                write!(f, "failed to initialize habit store: {message}")
            }
            Self::IdentityConflict(id) => write!(f, "a habit with id {id} already exists"),
            Self::NotFound(id) => write!(f, "habit not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "habit storage failure: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Conflict(id) => Self::IdentityConflict(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Io(other),
        }
    }
}

impl From<HabitValidationError> for StoreError {
    fn from(value: HabitValidationError) -> Self {
        Self::Validation(value)
    }
}

impl StoreError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Initialization(_) => "initialization",
            Self::IdentityConflict(_) => "identity_conflict",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Io(_) => "io",
        }
    }
}

impl From<ConfigError> for StoreError {
    fn from(value: ConfigError) -> Self {
        Self::Initialization(value.to_string())
    }
}

type HabitMap = BTreeMap<HabitId, Habit>;

/// Authoritative, thread-safe habit collection backed by SQLite.
pub struct HabitStore {
    habits: RwLock<HabitMap>,
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl HabitStore {
    /// Opens the store at the per-user default location (`~/.habit-tracker`).
    pub fn initialize() -> StoreResult<Self> {
        let paths = AppPaths::resolve_default()?;
        Self::initialize_at(&paths)
    }

    /// Creates the data root if needed and opens `habits.db` inside it.
    pub fn initialize_at(paths: &AppPaths) -> StoreResult<Self> {
        paths.ensure_root()?;
        Self::open_at(paths.db_path())
    }

    /// Opens (or creates) the database file at `path`.
    pub fn open_at(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = open_db(path).map_err(init_error)?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Opens a throwaway store that lives only as long as the value.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = open_db_in_memory().map_err(init_error)?;
        Self::from_connection(conn, None)
    }

    fn from_connection(mut conn: Connection, db_path: Option<PathBuf>) -> StoreResult<Self> {
        let habits = load_all(&mut conn)
            .map_err(|err| StoreError::Initialization(format!("failed to load habits: {err}")))?;
        info!(
            "event=store_init module=store status=ok habit_count={}",
            habits.len()
        );
        Ok(Self {
            habits: RwLock::new(habits),
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Backing database file, or `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Persists a brand-new habit together with any completions it carries.
    ///
    /// # Errors
    /// - `IdentityConflict` when a habit with the same id already exists.
    /// - `Validation` when the habit has a nil id or blank name.
    pub fn add_habit(&self, habit: &Habit) -> StoreResult<()> {
        habit.validate()?;
        self.write("habit_add", habit.id, |repo, habits| {
            if habits.contains_key(&habit.id) {
                return Err(StoreError::IdentityConflict(habit.id));
            }
            repo.insert_habit(habit)?;
            habits.insert(habit.id, habit.clone());
            Ok(())
        })
    }

    /// Removes a habit and all its completions. Unknown ids succeed.
    pub fn delete_habit(&self, id: HabitId) -> StoreResult<()> {
        self.write("habit_delete", id, |repo, habits| {
            let existed = repo.delete_habit(id)?;
            habits.remove(&id);
            if !existed {
                debug!("event=habit_delete module=store status=noop habit_id={id}");
            }
            Ok(())
        })
    }

    /// Replaces name and full completion set of an existing habit.
    ///
    /// The stored `created_at` is kept even if the caller changed it.
    ///
    /// # Errors
    /// - `NotFound` when `habit.id` is unknown; nothing is created.
    pub fn update_habit(&self, habit: &Habit) -> StoreResult<()> {
        habit.validate()?;
        self.write("habit_update", habit.id, |repo, habits| {
            let Some(existing) = habits.get_mut(&habit.id) else {
                return Err(StoreError::NotFound(habit.id));
            };
            repo.replace_habit(habit)?;
            let created_at = existing.created_at;
            *existing = habit.clone();
            existing.created_at = created_at;
            Ok(())
        })
    }

    /// Inserts or overwrites one day's record for an existing habit.
    pub fn update_completion(
        &self,
        id: HabitId,
        date: NaiveDate,
        completed: bool,
    ) -> StoreResult<()> {
        self.write("completion_upsert", id, |repo, habits| {
            let Some(existing) = habits.get_mut(&id) else {
                return Err(StoreError::NotFound(id));
            };
            repo.upsert_completion(id, date, completed)?;
            existing.set_completion(date, completed);
            Ok(())
        })
    }

    /// Toggles the record for `date` under the write lock and persists it.
    ///
    /// Follows `Habit::toggle_on`: an absent record becomes `true`. Returns
    /// the persisted value.
    pub fn toggle_completion(&self, id: HabitId, date: NaiveDate) -> StoreResult<bool> {
        self.write("completion_toggle", id, |repo, habits| {
            let Some(existing) = habits.get_mut(&id) else {
                return Err(StoreError::NotFound(id));
            };
            let mut updated = existing.clone();
            let completed = updated.toggle_on(date);
            repo.upsert_completion(id, date, completed)?;
            *existing = updated;
            Ok(completed)
        })
    }

    pub fn toggle_today(&self, id: HabitId, clock: &dyn Clock) -> StoreResult<bool> {
        self.toggle_completion(id, clock.today())
    }

    /// Returns every habit, oldest `created_at` first, ties broken by id.
    ///
    /// Never fails. Served from the loaded collection, so storage errors
    /// surface at `open_*`/`reload` instead.
    pub fn get_habits(&self) -> Vec<Habit> {
        ordered(&self.read_habits())
    }

    pub fn get_habit(&self, id: HabitId) -> Option<Habit> {
        self.read_habits().get(&id).cloned()
    }

    /// Re-reads the collection from disk and swaps it in.
    ///
    /// On failure the previous in-memory view is kept.
    pub fn reload(&self) -> StoreResult<usize> {
        let started_at = Instant::now();
        let (mut habits, mut conn) = self.lock_for_write()?;
        let loaded = load_all(&mut conn)?;
        let count = loaded.len();
        *habits = loaded;
        info!(
            "event=store_reload module=store status=ok habit_count={} duration_ms={}",
            count,
            started_at.elapsed().as_millis()
        );
        Ok(count)
    }

    fn write<T>(
        &self,
        event: &'static str,
        id: HabitId,
        apply: impl FnOnce(&mut SqliteHabitRepository<'_>, &mut HabitMap) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = (|| {
            let (mut habits, mut conn) = self.lock_for_write()?;
            // Schema readiness was checked by `load_all` when the store opened.
            let mut repo = SqliteHabitRepository::new_unchecked(&mut conn);
            apply(&mut repo, &mut habits)
        })();

        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => info!(
                "event={event} module=store status=ok habit_id={id} duration_ms={duration_ms}"
            ),
            Err(err @ StoreError::Io(_)) => error!(
                "event={} module=store status=error habit_id={} duration_ms={} error_code={} error={}",
                event,
                id,
                duration_ms,
                err.code(),
                err
            ),
            Err(err) => warn!(
                "event={} module=store status=rejected habit_id={} duration_ms={} error_code={}",
                event,
                id,
                duration_ms,
                err.code()
            ),
        }
        result
    }

    fn read_habits(&self) -> RwLockReadGuard<'_, HabitMap> {
        self.habits.read().unwrap_or_else(|poisoned| {
            warn!("event=store_lock module=store status=recovered lock=habits mode=read");
            poisoned.into_inner()
        })
    }

    /// Takes the collection write lock, then the connection mutex.
    ///
    /// A panicking holder may have left the collection out of step with disk,
    /// so a poisoned collection is reloaded before it is handed out. The
    /// poison flag is only cleared once that reload succeeds.
    fn lock_for_write(
        &self,
    ) -> StoreResult<(RwLockWriteGuard<'_, HabitMap>, MutexGuard<'_, Connection>)> {
        let (mut habits, stale) = match self.habits.write() {
            Ok(habits) => (habits, false),
            Err(poisoned) => (poisoned.into_inner(), true),
        };
        let mut conn = self.conn.lock().unwrap_or_else(|poisoned| {
            warn!("event=store_lock module=store status=recovered lock=connection");
            poisoned.into_inner()
        });
        self.conn.clear_poison();

        if stale {
            *habits = load_all(&mut conn)?;
            self.habits.clear_poison();
            warn!(
                "event=store_lock module=store status=recovered lock=habits mode=write habit_count={}",
                habits.len()
            );
        }
        Ok((habits, conn))
    }
}

fn load_all(conn: &mut Connection) -> StoreResult<HabitMap> {
    let repo = SqliteHabitRepository::try_new(conn)?;
    let habits = repo.list_habits()?;
    Ok(habits.into_iter().map(|habit| (habit.id, habit)).collect())
}

fn ordered(habits: &HabitMap) -> Vec<Habit> {
    let mut list: Vec<Habit> = habits.values().cloned().collect();
    list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    list
}

fn init_error(err: DbError) -> StoreError {
    StoreError::Initialization(format!("failed to open habit database: {err}"))
}

#[cfg(test)]
mod tests {
    use super::HabitStore;
    use crate::model::habit::Habit;
    use chrono::NaiveDate;
    use std::thread;

    fn panic_while_holding_habits(store: &HabitStore, clear: bool) {
        thread::scope(|scope| {
            let joined = scope
                .spawn(|| {
                    let mut habits = store.habits.write().unwrap();
                    if clear {
                        habits.clear();
                    }
                    panic!("writer panicked while holding the collection");
                })
                .join();
            assert!(joined.is_err());
        });
        assert!(store.habits.is_poisoned());
    }

    #[test]
    fn poisoned_collection_still_serves_reads_and_writes() {
        let store = HabitStore::open_in_memory().unwrap();
        let first = Habit::with_id(uuid::Uuid::new_v4(), "first", 1).unwrap();
        store.add_habit(&first).unwrap();

        panic_while_holding_habits(&store, false);

        assert_eq!(store.get_habits(), vec![first.clone()]);
        assert_eq!(store.get_habit(first.id), Some(first.clone()));

        let second = Habit::with_id(uuid::Uuid::new_v4(), "second", 2).unwrap();
        store.add_habit(&second).unwrap();
        assert_eq!(store.get_habits(), vec![first, second]);
        assert!(!store.habits.is_poisoned());
    }

    #[test]
    fn poisoned_collection_is_resynced_from_disk_before_next_write() {
        let store = HabitStore::open_in_memory().unwrap();
        let kept = Habit::with_id(uuid::Uuid::new_v4(), "kept", 1).unwrap();
        store.add_habit(&kept).unwrap();

        panic_while_holding_habits(&store, true);

        let date = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        store.update_completion(kept.id, date, true).unwrap();

        let habits = store.get_habits();
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].completion(date), Some(true));
    }

    #[test]
    fn poisoned_connection_does_not_block_writes() {
        let store = HabitStore::open_in_memory().unwrap();
        let habit = Habit::new("read").unwrap();
        store.add_habit(&habit).unwrap();

        thread::scope(|scope| {
            let joined = scope
                .spawn(|| {
                    let _conn = store.conn.lock().unwrap();
                    panic!("writer panicked while holding the connection");
                })
                .join();
            assert!(joined.is_err());
        });
        assert!(store.conn.is_poisoned());

        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert!(store.toggle_completion(habit.id, date).unwrap());
        assert_eq!(store.get_habit(habit.id).unwrap().completion(date), Some(true));
        assert!(!store.conn.is_poisoned());
        assert_eq!(store.reload().unwrap(), 1);
    }
}
