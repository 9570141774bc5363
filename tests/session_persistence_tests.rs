use chrono::NaiveDate;
use music_flow::persistence::{FileSessionStorage, SESSION_SLOT_KEY, SessionStorage};
use music_flow::seed;
use music_flow::session::Session;
use music_flow::store::DataStore;
use music_flow::User;
use tempfile::TempDir;

fn demo() -> DataStore {
    seed::demo_store(NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()).unwrap()
}

fn session_in(dir: &TempDir) -> Session {
    Session::new(Box::new(FileSessionStorage::new(dir.path())))
}

fn stored_user(dir: &TempDir) -> Option<User> {
    FileSessionStorage::new(dir.path())
        .read_slot(SESSION_SLOT_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

#[test]
fn login_writes_camel_case_slot() {
    let dir = TempDir::new().unwrap();
    let store = demo();
    let mut session = session_in(&dir);
    session.login(&store, seed::DEMO_STUDENT_EMAIL).unwrap();

    let raw = FileSessionStorage::new(dir.path())
        .read_slot(SESSION_SLOT_KEY)
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["id"], "student-1");
    assert_eq!(json["role"], "STUDENT");
    assert_eq!(json["teacherId"], "teacher-1");
    assert!(json["avatarUrl"].is_string());
    assert!(json.get("inviteCode").is_none());
}

#[test]
fn unknown_email_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = demo();
    let mut session = session_in(&dir);
    assert!(session.login(&store, "nobody@example.com").is_none());
    assert!(!session.is_authenticated());
    assert!(stored_user(&dir).is_none());
}

#[test]
fn restore_returns_the_last_written_record() {
    let dir = TempDir::new().unwrap();
    let mut store = demo();
    {
        let mut session = session_in(&dir);
        session.login(&store, "bob@example.com").unwrap();
        assert!(session.link_to_teacher(&mut store, "maestro123"));
    }
    let last_written = stored_user(&dir).unwrap();
    assert_eq!(last_written.teacher_id.as_deref(), Some(seed::DEMO_TEACHER_ID));

    // A fresh process starts from the seed data, where Bob is unlinked.
    let mut fresh_store = demo();
    let mut restored = session_in(&dir);
    let user = restored.restore(&mut fresh_store).unwrap();
    assert_eq!(*user, last_written);
    assert_eq!(
        fresh_store.find_user("student-2").unwrap().teacher_id.as_deref(),
        Some(seed::DEMO_TEACHER_ID)
    );
}

#[test]
fn restore_after_unlink_stays_unlinked() {
    let dir = TempDir::new().unwrap();
    let mut store = demo();
    {
        let mut session = session_in(&dir);
        session.login(&store, seed::DEMO_STUDENT_EMAIL).unwrap();
        session.unlink_from_teacher(&mut store);
    }
    let mut fresh_store = demo();
    let mut restored = session_in(&dir);
    let user = restored.restore(&mut fresh_store).unwrap();
    assert!(user.teacher_id.is_none());
    assert!(fresh_store.find_user("student-1").unwrap().teacher_id.is_none());
}

#[test]
fn logout_removes_the_slot() {
    let dir = TempDir::new().unwrap();
    let mut store = demo();
    let mut session = session_in(&dir);
    session.login(&store, seed::DEMO_TEACHER_EMAIL).unwrap();
    session.logout();
    assert!(!session.is_authenticated());
    assert!(stored_user(&dir).is_none());

    let mut restored = session_in(&dir);
    assert!(restored.restore(&mut store).is_none());
}

#[test]
fn malformed_slot_leaves_session_signed_out() {
    let dir = TempDir::new().unwrap();
    FileSessionStorage::new(dir.path())
        .write_slot(SESSION_SLOT_KEY, "{not json")
        .unwrap();
    let mut store = demo();
    let mut session = session_in(&dir);
    assert!(session.restore(&mut store).is_none());
    assert!(!session.is_authenticated());
}

#[test]
fn slot_for_unknown_user_is_ignored() {
    let dir = TempDir::new().unwrap();
    let ghost = User::student("ghost", "Ghost", "ghost@example.com");
    FileSessionStorage::new(dir.path())
        .write_slot(SESSION_SLOT_KEY, &serde_json::to_string(&ghost).unwrap())
        .unwrap();
    let mut store = demo();
    let mut session = session_in(&dir);
    assert!(session.restore(&mut store).is_none());
}

#[test]
fn missing_directory_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    let storage = FileSessionStorage::new(dir.path().join("never-created"));
    assert_eq!(storage.read_slot(SESSION_SLOT_KEY).unwrap(), None);
    storage.remove_slot(SESSION_SLOT_KEY).unwrap();
}
