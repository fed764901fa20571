use chrono::NaiveDate;
use habit_core::{AppPaths, Habit, HabitStore, StoreError};
use rusqlite::Connection;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn restart_reproduces_habits_and_completion_history() {
    let dir = tempfile::tempdir().unwrap();
    let paths = AppPaths::from_root(dir.path().join(".habit-tracker"));

    let before = {
        let store = HabitStore::initialize_at(&paths).unwrap();
        let mut read = Habit::new("read").unwrap();
        read.set_completion(day(2024, 1, 1), true);
        store.add_habit(&read).unwrap();

        let run = Habit::new("run").unwrap();
        store.add_habit(&run).unwrap();
        store.update_completion(run.id, day(2024, 1, 1), true).unwrap();
        store.update_completion(run.id, day(2024, 1, 2), false).unwrap();

        let gone = Habit::new("gone").unwrap();
        store.add_habit(&gone).unwrap();
        store.delete_habit(gone.id).unwrap();

        read.rename("read books").unwrap();
        store.update_habit(&read).unwrap();

        store.get_habits()
    };

    let store = HabitStore::initialize_at(&paths).unwrap();
    assert_eq!(store.get_habits(), before);
    assert_eq!(before.len(), 2);
}

#[test]
fn failed_write_leaves_disk_and_memory_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habits.db");

    let original = Habit::new("original").unwrap();
    {
        let store = HabitStore::open_at(&path).unwrap();
        store.add_habit(&original).unwrap();

        let mut conflicting = original.clone();
        conflicting.name = "overwritten?".to_string();
        conflicting.set_completion(day(2024, 5, 5), true);
        assert!(store.add_habit(&conflicting).is_err());
        assert_eq!(store.get_habits(), vec![original.clone()]);
    }

    let reopened = HabitStore::open_at(&path).unwrap();
    assert_eq!(reopened.get_habits(), vec![original]);
}

#[test]
fn storage_failure_during_write_reports_io_and_keeps_memory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habits.db");
    let store = HabitStore::open_at(&path).unwrap();
    let habit = Habit::new("read").unwrap();
    store.add_habit(&habit).unwrap();
    store.update_completion(habit.id, day(2024, 1, 1), true).unwrap();
    let before = store.get_habits();

    let other = Connection::open(&path).unwrap();
    other.execute_batch("DROP TABLE completions;").unwrap();
    drop(other);

    let err = store
        .update_completion(habit.id, day(2024, 1, 2), true)
        .unwrap_err();
    assert!(matches!(err, StoreError::Io(_)), "unexpected error: {err}");
    assert_eq!(err.code(), "io");

    assert_eq!(store.get_habits(), before);
    let cached = store.get_habit(habit.id).unwrap();
    assert_eq!(cached.completion(day(2024, 1, 1)), Some(true));
    assert_eq!(cached.completion(day(2024, 1, 2)), None);
}

#[test]
fn reload_picks_up_changes_written_by_another_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("habits.db");
    let viewer = HabitStore::open_at(&path).unwrap();
    let writer = HabitStore::open_at(&path).unwrap();

    let habit = Habit::new("shared").unwrap();
    writer.add_habit(&habit).unwrap();
    assert!(viewer.get_habits().is_empty());

    assert_eq!(viewer.reload().unwrap(), 1);
    assert_eq!(viewer.get_habits(), vec![habit]);
}
