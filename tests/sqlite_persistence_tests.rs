#![cfg(feature = "sqlite")]

use chrono::NaiveDate;
use music_flow::persistence::sqlite::SqliteStore;
use music_flow::persistence::{SESSION_SLOT_KEY, SessionStorage, StoreBackend};
use music_flow::seed;
use music_flow::session::Session;
use music_flow::task::{Feedback, Task};
use tempfile::NamedTempFile;

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn sqlite_store_round_trip() {
    let file = NamedTempFile::new().unwrap();
    let backend = SqliteStore::new(file.path()).unwrap();
    assert!(backend.load_store().unwrap().is_none());

    let mut store = seed::demo_store(d(2024, 5, 15)).unwrap();
    store.add_task(Task::new("extra", "student-4", "Tárrega study", d(2024, 5, 16), 25));
    store.complete_task("extra", Feedback::new(5, Some("Great".into())).unwrap());
    store.delete_task("task-2");
    backend.save_store(&store).expect("save store");

    let reopened = SqliteStore::new(file.path()).unwrap();
    let loaded = reopened.load_store().unwrap().expect("stored data");
    assert_eq!(loaded.users(), store.users());
    assert_eq!(loaded.files(), store.files());
    assert_eq!(loaded.task_records(), store.task_records());
}

#[test]
fn saving_twice_replaces_previous_rows() {
    let backend = SqliteStore::in_memory().unwrap();
    let mut store = seed::demo_store(d(2024, 5, 15)).unwrap();
    backend.save_store(&store).unwrap();

    store.delete_task("task-1");
    backend.save_store(&store).unwrap();

    let loaded = backend.load_store().unwrap().unwrap();
    assert_eq!(loaded.task_count(), 2);
    assert!(loaded.find_task("task-1").is_none());
}

#[test]
fn session_slots_upsert_and_remove() {
    let backend = SqliteStore::in_memory().unwrap();
    assert_eq!(backend.read_slot(SESSION_SLOT_KEY).unwrap(), None);

    backend.write_slot(SESSION_SLOT_KEY, "first").unwrap();
    backend.write_slot(SESSION_SLOT_KEY, "second").unwrap();
    assert_eq!(backend.read_slot(SESSION_SLOT_KEY).unwrap().as_deref(), Some("second"));

    backend.remove_slot(SESSION_SLOT_KEY).unwrap();
    assert_eq!(backend.read_slot(SESSION_SLOT_KEY).unwrap(), None);
}

#[test]
fn session_survives_reopening_the_database() {
    let file = NamedTempFile::new().unwrap();
    let mut store = seed::demo_store(d(2024, 5, 15)).unwrap();
    {
        let mut session = Session::new(Box::new(SqliteStore::new(file.path()).unwrap()));
        session.login(&store, seed::DEMO_TEACHER_EMAIL).unwrap();
    }

    let mut session = Session::new(Box::new(SqliteStore::new(file.path()).unwrap()));
    let user = session.restore(&mut store).unwrap();
    assert_eq!(user.id, seed::DEMO_TEACHER_ID);
    assert_eq!(user.invite_code.as_deref(), Some(seed::DEMO_INVITE_CODE));
}
