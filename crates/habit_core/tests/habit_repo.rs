use chrono::NaiveDate;
use habit_core::db::migrations::latest_version;
use habit_core::db::open_db_in_memory;
use habit_core::{Habit, HabitRepository, RepoError, SqliteHabitRepository};
use rusqlite::Connection;
use uuid::Uuid;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn habit_with_fixed_id(id: &str, name: &str, created_at: i64) -> Habit {
    Habit::with_id(Uuid::parse_str(id).unwrap(), name, created_at).unwrap()
}

#[test]
fn insert_and_get_roundtrip_keeps_completions() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let mut habit = Habit::new("read").unwrap();
    habit.set_completion(day(2024, 1, 1), true);
    habit.set_completion(day(2024, 1, 2), false);
    repo.insert_habit(&habit).unwrap();

    let loaded = repo.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(loaded, habit);
}

#[test]
fn insert_duplicate_id_returns_conflict_and_keeps_original() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let original = Habit::new("original").unwrap();
    repo.insert_habit(&original).unwrap();

    let mut impostor = original.clone();
    impostor.name = "impostor".to_string();
    impostor.set_completion(day(2024, 1, 1), true);
    let err = repo.insert_habit(&impostor).unwrap_err();
    assert!(matches!(err, RepoError::Conflict(id) if id == original.id));

    let loaded = repo.get_habit(original.id).unwrap().unwrap();
    assert_eq!(loaded, original);
}

#[test]
fn insert_rejects_invalid_habit() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let mut habit = Habit::new("ok").unwrap();
    habit.name = "   ".to_string();
    let err = repo.insert_habit(&habit).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert!(repo.list_habits().unwrap().is_empty());
}

#[test]
fn replace_swaps_name_and_completion_set_but_not_created_at() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let mut habit = habit_with_fixed_id("00000000-0000-4000-8000-000000000001", "draft", 100);
    habit.set_completion(day(2024, 1, 1), true);
    repo.insert_habit(&habit).unwrap();

    let mut replacement = habit.clone();
    replacement.name = "final".to_string();
    replacement.completions.clear();
    replacement.set_completion(day(2024, 2, 1), false);
    replacement.created_at = 999;
    repo.replace_habit(&replacement).unwrap();

    let loaded = repo.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(loaded.name, "final");
    assert_eq!(loaded.created_at, 100);
    assert_eq!(loaded.completion(day(2024, 1, 1)), None);
    assert_eq!(loaded.completion(day(2024, 2, 1)), Some(false));
}

#[test]
fn replace_missing_habit_returns_not_found_without_creating() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let ghost = Habit::new("ghost").unwrap();
    let err = repo.replace_habit(&ghost).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == ghost.id));
    assert!(repo.get_habit(ghost.id).unwrap().is_none());
}

#[test]
fn upsert_overwrites_existing_date_without_duplicates() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();
        let habit = habit_with_fixed_id("00000000-0000-4000-8000-000000000001", "gym", 1);
        repo.insert_habit(&habit).unwrap();

        repo.upsert_completion(habit.id, day(2024, 1, 1), true)
            .unwrap();
        repo.upsert_completion(habit.id, day(2024, 1, 1), false)
            .unwrap();

        let loaded = repo.get_habit(habit.id).unwrap().unwrap();
        assert_eq!(loaded.recorded_days(), 1);
        assert_eq!(loaded.completion(day(2024, 1, 1)), Some(false));
    }

    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM completions WHERE completed_date = '2024-01-01';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn upsert_for_unknown_habit_returns_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let id = Uuid::new_v4();
    let err = repo
        .upsert_completion(id, day(2024, 1, 1), true)
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(missing) if missing == id));
}

#[test]
fn delete_removes_completions_and_reports_existence() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();
        let mut habit = Habit::new("floss").unwrap();
        habit.set_completion(day(2024, 1, 1), true);
        repo.insert_habit(&habit).unwrap();

        assert!(repo.delete_habit(habit.id).unwrap());
        assert!(!repo.delete_habit(habit.id).unwrap());
        assert!(repo.get_habit(habit.id).unwrap().is_none());
    }

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM completions;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn list_orders_by_created_at_then_id() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let late = habit_with_fixed_id("00000000-0000-4000-8000-000000000001", "late", 300);
    let tie_b = habit_with_fixed_id("00000000-0000-4000-8000-00000000000b", "tie b", 100);
    let tie_a = habit_with_fixed_id("00000000-0000-4000-8000-00000000000a", "tie a", 100);
    repo.insert_habit(&late).unwrap();
    repo.insert_habit(&tie_b).unwrap();
    repo.insert_habit(&tie_a).unwrap();

    let ids: Vec<_> = repo
        .list_habits()
        .unwrap()
        .into_iter()
        .map(|habit| habit.id)
        .collect();
    assert_eq!(ids, vec![tie_a.id, tie_b.id, late.id]);
}

#[test]
fn list_attaches_completions_to_their_own_habit() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();

    let mut first = habit_with_fixed_id("00000000-0000-4000-8000-000000000001", "one", 1);
    first.set_completion(day(2024, 1, 1), true);
    let second = habit_with_fixed_id("00000000-0000-4000-8000-000000000002", "two", 2);
    repo.insert_habit(&first).unwrap();
    repo.insert_habit(&second).unwrap();

    let habits = repo.list_habits().unwrap();
    assert_eq!(habits[0].recorded_days(), 1);
    assert!(habits[1].completions.is_empty());
}

#[test]
fn list_rejects_corrupt_completion_value() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch("PRAGMA ignore_check_constraints = ON;")
        .unwrap();
    let habit = Habit::new("tamper").unwrap();
    {
        let mut repo = SqliteHabitRepository::try_new(&mut conn).unwrap();
        repo.insert_habit(&habit).unwrap();
    }
    conn.execute(
        "INSERT INTO completions (habit_id, completed_date, is_completed) VALUES (?1, '2024-01-01', 7);",
        [habit.id.to_string()],
    )
    .unwrap();

    let repo = SqliteHabitRepository::try_new(&mut conn).unwrap();
    let err = repo.list_habits().unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(message) if message.contains("is_completed")));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    match SqliteHabitRepository::try_new(&mut conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_completions_table() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE habits (id TEXT PRIMARY KEY, name TEXT, created_at INTEGER);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let result = SqliteHabitRepository::try_new(&mut conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("completions"))
    ));
}

#[test]
fn repository_rejects_habits_table_missing_created_at() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE habits (id TEXT PRIMARY KEY, name TEXT);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();

    let result = SqliteHabitRepository::try_new(&mut conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "habits",
            column: "created_at"
        })
    ));
}
