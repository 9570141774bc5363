use chrono::NaiveDate;
use music_flow::seed;
use music_flow::store::{DataStore, TaskEditError, TaskRecord};
use music_flow::task::{Feedback, Task, TaskPatch, TaskStatus};
use music_flow::validation::{self, ValidationError};
use music_flow::{Material, MaterialKind, User};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    d(2024, 5, 15)
}

fn demo() -> DataStore {
    seed::demo_store(today()).unwrap()
}

#[test]
fn seed_data_is_consistent() {
    let store = demo();
    assert_eq!(store.users().len(), 6);
    assert_eq!(store.files().len(), 3);
    assert_eq!(store.task_count(), 3);
    validation::validate_users(store.users()).unwrap();
    validation::validate_task_collection(store.tasks()).unwrap();

    let done = store.find_task("task-3").unwrap();
    assert_eq!(done.status, TaskStatus::Done);
    assert_eq!(done.date, d(2024, 5, 14));
    assert_eq!(done.feedback.as_ref().unwrap().rating, 4);
}

#[test]
fn add_task_preserves_insertion_order() {
    let mut store = demo();
    let a = store.add_task(Task::new("a", "student-1", "A", today(), 10));
    let b = store.add_task(Task::new("b", "student-1", "B", d(2024, 5, 1), 10));
    assert!(b > a);

    let ids: Vec<&str> = store
        .get_student_tasks("student-1")
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["task-1", "task-2", "task-3", "a", "b"]);
}

#[test]
fn student_tasks_only_include_the_owner() {
    let mut store = demo();
    store.add_task(Task::new("bob-1", "student-2", "Drums", today(), 30));
    assert_eq!(store.get_student_tasks("student-2").len(), 1);
    assert_eq!(store.get_student_tasks("student-1").len(), 3);
    assert!(store.get_student_tasks("nobody").is_empty());
}

#[test]
fn update_merges_patch_and_ignores_unknown_ids() {
    let mut store = demo();
    assert!(store.update_task(
        "task-1",
        TaskPatch::default().title("Hanon 6-10").duration_minutes(25),
    ));
    let task = store.find_task("task-1").unwrap();
    assert_eq!(task.title, "Hanon 6-10");
    assert_eq!(task.duration_minutes, 25);
    assert_eq!(task.objective, "Aumentar independência e igualdade dos dedos.");

    let before: Vec<Task> = store.tasks().cloned().collect();
    assert!(!store.update_task("missing", TaskPatch::default().title("x")));
    let after: Vec<Task> = store.tasks().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn delete_is_a_noop_for_unknown_ids() {
    let mut store = demo();
    assert!(!store.delete_task("missing"));
    assert_eq!(store.task_count(), 3);
    assert!(store.delete_task("task-2"));
    assert!(store.find_task("task-2").is_none());
    assert_eq!(store.task_count(), 2);
}

#[test]
fn completing_records_feedback_and_reopening_clears_it() {
    let mut store = demo();
    let feedback = Feedback::new(5, Some("  clean run  ".into())).unwrap();
    assert!(store.complete_task("task-1", feedback));
    let task = store.find_task("task-1").unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(
        task.feedback,
        Some(Feedback {
            rating: 5,
            comment: Some("clean run".into())
        })
    );

    assert!(store.reopen_task("task-1"));
    let task = store.find_task("task-1").unwrap();
    assert_eq!(task.status, TaskStatus::Todo);
    assert!(task.feedback.is_none());
}

#[test]
fn toggling_to_done_records_skipped_feedback() {
    let mut store = demo();
    assert_eq!(store.toggle_task_status("task-2"), Some(TaskStatus::Done));
    assert_eq!(store.find_task("task-2").unwrap().feedback, Some(Feedback::skipped()));
    assert_eq!(Feedback::skipped().rating, 3);

    assert_eq!(store.toggle_task_status("task-2"), Some(TaskStatus::Todo));
    assert!(store.find_task("task-2").unwrap().feedback.is_none());
    assert_eq!(store.toggle_task_status("missing"), None);
}

#[test]
fn feedback_patch_on_open_task_is_dropped() {
    let mut store = demo();
    store.update_task("task-1", TaskPatch::default().feedback(Feedback::skipped()));
    assert!(store.find_task("task-1").unwrap().feedback.is_none());
}

#[test]
fn added_done_task_without_feedback_is_normalised() {
    let mut store = DataStore::new();
    let mut task = Task::new("t", "s", "Etude", today(), 15);
    task.status = TaskStatus::Done;
    store.add_task(task);
    validation::validate_task_collection(store.tasks()).unwrap();
}

#[test]
fn feedback_rating_must_be_between_one_and_five() {
    assert_eq!(Feedback::new(0, None), Err(ValidationError::RatingOutOfRange(0)));
    assert_eq!(Feedback::new(6, None), Err(ValidationError::RatingOutOfRange(6)));
    assert!(Feedback::new(1, None).is_ok());
    assert_eq!(Feedback::new(5, Some("   ".into())).unwrap().comment, None);
}

#[test]
fn feedback_json_goes_through_rating_checks() {
    let patch = serde_json::from_str::<TaskPatch>(r#"{"status":"DONE","feedback":{"rating":9}}"#);
    assert!(patch.is_err());

    let patch: TaskPatch =
        serde_json::from_str(r#"{"status":"DONE","feedback":{"rating":4,"comment":"  ok "}}"#).unwrap();
    assert_eq!(patch.feedback, Some(Feedback::new(4, Some("ok".into())).unwrap()));
}

#[test]
fn update_leaves_task_alone_when_result_is_invalid() {
    let mut store = demo();
    let before = store.find_task("task-1").unwrap().clone();

    assert!(!store.update_task("task-1", TaskPatch::default().duration_minutes(0)));
    let bad_rating = Feedback {
        rating: 9,
        comment: None,
    };
    assert!(!store.update_task(
        "task-1",
        TaskPatch::default().status(TaskStatus::Done).feedback(bad_rating),
    ));
    assert_eq!(store.find_task("task-1").unwrap(), &before);
    validation::validate_task_collection(store.tasks()).unwrap();
}

#[test]
fn completed_tasks_refuse_content_edits_until_reopened() {
    let mut store = demo();
    let original = store.find_task("task-3").unwrap().clone();
    assert!(original.is_done());

    let err = store
        .edit_task("task-3", TaskPatch::default().title("rewritten"))
        .unwrap_err();
    assert_eq!(err, TaskEditError::Locked("task-3".into()));
    assert_eq!(store.find_task("task-3").unwrap(), &original);

    let rated = Feedback::new(4, None).unwrap();
    let task = store
        .edit_task("task-3", TaskPatch::default().feedback(rated.clone()))
        .unwrap();
    assert_eq!(task.feedback, Some(rated));
    assert_eq!(task.title, original.title);

    let task = store
        .edit_task(
            "task-3",
            TaskPatch::default().status(TaskStatus::Todo).title("Second pass"),
        )
        .unwrap();
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.title, "Second pass");
    assert!(task.feedback.is_none());

    assert!(store.edit_task("task-3", TaskPatch::default().date(d(2024, 6, 1))).is_ok());
    assert_eq!(
        store.edit_task("missing", TaskPatch::default().title("x")).unwrap_err(),
        TaskEditError::NotFound("missing".into())
    );
    assert!(matches!(
        store.edit_task("task-1", TaskPatch::default().duration_minutes(0)),
        Err(TaskEditError::Invalid(ValidationError::NonPositiveDuration(_)))
    ));
}

#[test]
fn from_parts_rejects_a_sequence_that_cannot_advance() {
    let record = |sequence| TaskRecord {
        sequence,
        task: Task::new("t1", "s1", "Etude", today(), 15),
    };
    assert_eq!(
        DataStore::from_parts(Vec::new(), Vec::new(), vec![record(u64::MAX)]).unwrap_err(),
        ValidationError::SequenceExhausted("t1".into())
    );

    let mut store = DataStore::from_parts(Vec::new(), Vec::new(), vec![record(u64::MAX - 1)]).unwrap();
    let sequence = store.add_task(Task::new("t2", "s1", "Scales", today(), 10));
    assert_eq!(sequence, u64::MAX);
}

#[test]
fn files_are_appended_and_searchable() {
    let mut store = demo();
    store.add_file(Material::new("f4", "Scale Workout", MaterialKind::Link, "https://example.com"));
    assert_eq!(store.files().len(), 4);

    let bach: Vec<&str> = store.search_files("bach").iter().map(|f| f.id.as_str()).collect();
    assert_eq!(bach, vec!["f2"]);
    assert_eq!(store.search_files("link").len(), 1);
    assert_eq!(store.search_files("").len(), 4);
}

#[test]
fn range_queries_sort_by_date_then_insertion() {
    let mut store = DataStore::new();
    store.add_task(Task::new("late", "s", "Late", d(2024, 1, 3), 10));
    store.add_task(Task::new("early", "s", "Early", d(2024, 1, 1), 10));
    store.add_task(Task::new("early-2", "s", "Early again", d(2024, 1, 1), 10));
    store.add_task(Task::new("outside", "s", "Outside", d(2024, 1, 9), 10));

    let ids: Vec<&str> = store
        .tasks_in_range("s", d(2024, 1, 1), d(2024, 1, 7))
        .iter()
        .map(|t| t.id.as_str())
        .collect();
    assert_eq!(ids, vec!["early", "early-2", "late"]);
}

#[test]
fn daily_progress_counts_done_tasks_per_day() {
    let store = demo();
    let progress = store.daily_progress("student-1", d(2024, 5, 14), d(2024, 5, 16));
    assert_eq!(progress.len(), 3);
    assert_eq!((progress[0].total, progress[0].done), (1, 1));
    assert_eq!((progress[1].total, progress[1].done), (2, 0));
    assert_eq!((progress[2].total, progress[2].done), (0, 0));
    assert!(store.daily_progress("student-1", d(2024, 5, 16), d(2024, 5, 14)).is_empty());
}

#[test]
fn teacher_roster_lists_linked_students_only() {
    let store = demo();
    let ids: Vec<&str> = store
        .get_students_for_teacher(seed::DEMO_TEACHER_ID)
        .iter()
        .map(|u| u.id.as_str())
        .collect();
    assert_eq!(ids, vec!["student-1", "student-3", "student-4", "student-5"]);

    let diana: Vec<&str> = store
        .search_students_for_teacher(seed::DEMO_TEACHER_ID, "DIANA")
        .iter()
        .map(|u| u.id.as_str())
        .collect();
    assert_eq!(diana, vec!["student-4"]);
    assert!(store.get_students_for_teacher("student-1").is_empty());
}

#[test]
fn import_skips_known_ids() {
    let mut store = demo();
    let added = store.import_tasks(vec![
        Task::new("task-1", "student-1", "Duplicate", today(), 10),
        Task::new("new-1", "student-1", "Fresh", today(), 10),
    ]);
    assert_eq!(added, 1);
    assert_eq!(store.find_task("task-1").unwrap().title, "Exercícios Hanon No. 1-5");
    assert!(store.find_task("new-1").is_some());
}

#[test]
fn from_parts_rejects_inconsistent_users() {
    let users = vec![
        User::teacher("t1", "A", "a@x.com", "code"),
        User::teacher("t2", "B", "b@x.com", "CODE"),
    ];
    assert!(matches!(
        DataStore::from_parts(users, Vec::new(), Vec::new()),
        Err(ValidationError::DuplicateInviteCode { .. })
    ));

    let dangling = vec![User::student("s1", "S", "s@x.com").with_teacher("ghost")];
    assert!(matches!(
        DataStore::from_parts(dangling, Vec::new(), Vec::new()),
        Err(ValidationError::DanglingTeacherLink { .. })
    ));
}

#[test]
fn email_lookup_ignores_case_and_whitespace() {
    let store = demo();
    assert_eq!(
        store.find_user_by_email("  ALICE@example.com ").map(|u| u.id.as_str()),
        Some("student-1")
    );
    assert!(store.find_user_by_email("nobody@example.com").is_none());
}
