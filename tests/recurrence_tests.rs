use chrono::{Datelike, NaiveDate, Weekday};
use music_flow::recurrence::{self, RecurrenceError, RecurrenceRule, TaskTemplate, WeekdaySet, WeeklyRepeat};
use music_flow::{Material, MaterialKind, TaskStatus};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn template() -> TaskTemplate {
    TaskTemplate {
        student_id: "student-1".into(),
        created_by_user_id: "teacher-1".into(),
        title: "Scales".into(),
        duration_minutes: 20,
        objective: "Even tone".into(),
        materials: vec![Material::new("m1", "Hanon", MaterialKind::Pdf, "https://example.com/h.pdf")],
    }
}

#[test]
fn expands_monday_and_wednesday_over_two_weeks() {
    let rule = RecurrenceRule::new(
        d(2024, 1, 1),
        d(2024, 1, 14),
        WeekdaySet::from_indices([1, 3]).unwrap(),
    );
    let tasks = recurrence::expand(&rule, &template());

    let dates: Vec<NaiveDate> = tasks.iter().map(|t| t.date).collect();
    assert_eq!(
        dates,
        vec![d(2024, 1, 1), d(2024, 1, 3), d(2024, 1, 8), d(2024, 1, 10)]
    );
    for task in &tasks {
        assert_eq!(task.student_id, "student-1");
        assert_eq!(task.created_by_user_id, "teacher-1");
        assert_eq!(task.title, "Scales");
        assert_eq!(task.duration_minutes, 20);
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.feedback.is_none());
        assert_eq!(task.materials.len(), 1);
    }
}

#[test]
fn expanded_tasks_get_distinct_ids() {
    let rule = RecurrenceRule::new(d(2024, 1, 1), d(2024, 1, 31), WeekdaySet::from_indices(0..7).unwrap());
    let tasks = recurrence::expand(&rule, &template());
    assert_eq!(tasks.len(), 31);

    let mut ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 31);
}

#[test]
fn deterministic_ids_come_from_the_supplied_generator() {
    let rule = RecurrenceRule::new(d(2024, 1, 1), d(2024, 1, 7), WeekdaySet::from_weekdays([Weekday::Sat, Weekday::Sun]));
    let mut counter = 0;
    let tasks = recurrence::expand_with_ids(&rule, &template(), || {
        counter += 1;
        format!("rec-{counter}")
    });
    let pairs: Vec<(String, NaiveDate)> = tasks.into_iter().map(|t| (t.id, t.date)).collect();
    assert_eq!(
        pairs,
        vec![("rec-1".to_string(), d(2024, 1, 6)), ("rec-2".to_string(), d(2024, 1, 7))]
    );
}

#[test]
fn empty_weekdays_or_inverted_range_produce_nothing() {
    let empty = RecurrenceRule::new(d(2024, 1, 1), d(2024, 1, 14), WeekdaySet::empty());
    assert!(recurrence::expand(&empty, &template()).is_empty());

    let inverted = RecurrenceRule::new(d(2024, 1, 14), d(2024, 1, 1), WeekdaySet::from_indices([1]).unwrap());
    assert!(inverted.dates().is_empty());
}

#[test]
fn single_day_range_is_inclusive() {
    // 2024-01-01 is a Monday.
    let rule = RecurrenceRule::new(d(2024, 1, 1), d(2024, 1, 1), WeekdaySet::from_indices([1]).unwrap());
    assert_eq!(rule.dates(), vec![d(2024, 1, 1)]);

    let miss = RecurrenceRule::new(d(2024, 1, 1), d(2024, 1, 1), WeekdaySet::from_indices([2]).unwrap());
    assert!(miss.dates().is_empty());
}

#[test]
fn weekday_set_parses_indices_and_names() {
    let by_index: WeekdaySet = "1, 3".parse().unwrap();
    let by_name: WeekdaySet = "mon,Wed".parse().unwrap();
    assert_eq!(by_index, by_name);
    assert_eq!(by_index.indices(), vec![1, 3]);
    assert_eq!(by_index.weekdays(), vec![Weekday::Mon, Weekday::Wed]);
    assert_eq!(by_index.to_string(), "Mon,Wed");

    assert_eq!("7".parse::<WeekdaySet>(), Err(RecurrenceError::IndexOutOfRange(7)));
    assert!(matches!(
        "funday".parse::<WeekdaySet>(),
        Err(RecurrenceError::UnknownWeekday(_))
    ));
}

#[test]
fn weekday_set_toggles_like_form_buttons() {
    let mut set = WeekdaySet::empty();
    set.toggle(Weekday::Fri);
    assert!(set.contains(Weekday::Fri));
    assert_eq!(set.len(), 1);
    set.toggle(Weekday::Fri);
    assert!(set.is_empty());
}

#[test]
fn weekday_set_serialises_as_index_list() {
    let set = WeekdaySet::from_indices([0, 6]).unwrap();
    assert_eq!(serde_json::to_string(&set).unwrap(), "[0,6]");
    let back: WeekdaySet = serde_json::from_str("[6,0]").unwrap();
    assert_eq!(back, set);
    assert!(serde_json::from_str::<WeekdaySet>("[9]").is_err());
}

#[test]
fn plan_without_repeat_creates_one_task_on_start() {
    let tasks = recurrence::plan(&template(), d(2024, 2, 5), None);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].date, d(2024, 2, 5));

    let no_days = WeeklyRepeat {
        until: d(2024, 3, 1),
        weekdays: WeekdaySet::empty(),
    };
    assert_eq!(recurrence::plan(&template(), d(2024, 2, 5), Some(&no_days)).len(), 1);
}

#[test]
fn plan_with_repeat_expands_from_start() {
    let repeat = WeeklyRepeat {
        until: d(2024, 1, 14),
        weekdays: WeekdaySet::from_indices([1, 3]).unwrap(),
    };
    let tasks = recurrence::plan(&template(), d(2024, 1, 2), Some(&repeat));
    let dates: Vec<NaiveDate> = tasks.iter().map(|t| t.date).collect();
    assert_eq!(dates, vec![d(2024, 1, 3), d(2024, 1, 8), d(2024, 1, 10)]);
}

#[test]
fn week_of_starts_on_sunday() {
    let week = recurrence::week_of(d(2024, 1, 10)).unwrap();
    assert_eq!(week[0], d(2024, 1, 7));
    assert_eq!(week[6], d(2024, 1, 13));

    let sunday = recurrence::week_of(d(2024, 1, 7)).unwrap();
    assert_eq!(sunday[0], d(2024, 1, 7));
}

#[test]
fn week_of_rejects_weeks_past_the_calendar_edges() {
    let first = NaiveDate::MIN;
    let week = recurrence::week_of(first);
    assert_eq!(week.is_none(), first.weekday() != Weekday::Sun);

    let last = NaiveDate::MAX;
    let week = recurrence::week_of(last);
    assert_eq!(week.is_none(), last.weekday() != Weekday::Sat);
    if let Some(week) = week {
        assert_eq!(week[6], last);
    }
}
