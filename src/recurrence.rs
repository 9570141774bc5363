use crate::material::Material;
use crate::task::{Task, TaskStatus, new_record_id};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecurrenceError {
    #[error("weekday index {0} is out of range (0 = Sunday .. 6 = Saturday)")]
    IndexOutOfRange(u32),
    #[error("unrecognised weekday '{0}'")]
    UnknownWeekday(String),
}

/// Set of weekdays, indexed 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    const SUNDAY_FIRST: [Weekday; 7] = [
        Weekday::Sun,
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
    ];

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_indices<I>(indices: I) -> Result<Self, RecurrenceError>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut set = Self::empty();
        for idx in indices {
            if idx > 6 {
                return Err(RecurrenceError::IndexOutOfRange(idx));
            }
            set.0 |= 1 << idx;
        }
        Ok(set)
    }

    pub fn from_weekdays<I>(days: I) -> Self
    where
        I: IntoIterator<Item = Weekday>,
    {
        let mut set = Self::empty();
        for day in days {
            set.insert(day);
        }
        set
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << day.num_days_from_sunday();
    }

    pub fn remove(&mut self, day: Weekday) {
        self.0 &= !(1 << day.num_days_from_sunday());
    }

    /// Flips membership, the way the weekday buttons of the session form work.
    pub fn toggle(&mut self, day: Weekday) {
        self.0 ^= 1 << day.num_days_from_sunday();
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn indices(&self) -> Vec<u32> {
        (0..7).filter(|idx| self.0 & (1 << idx) != 0).collect()
    }

    pub fn weekdays(&self) -> Vec<Weekday> {
        Self::SUNDAY_FIRST
            .into_iter()
            .filter(|day| self.contains(*day))
            .collect()
    }
}

impl TryFrom<Vec<u32>> for WeekdaySet {
    type Error = RecurrenceError;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        Self::from_indices(value)
    }
}

impl From<WeekdaySet> for Vec<u32> {
    fn from(value: WeekdaySet) -> Self {
        value.indices()
    }
}

impl FromStr for WeekdaySet {
    type Err = RecurrenceError;

    /// Accepts comma separated indices (`1,3`) or weekday names (`mon,wed`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = Self::empty();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Ok(idx) = part.parse::<u32>() {
                set = Self(set.0 | Self::from_indices([idx])?.0);
            } else {
                let day = part
                    .parse::<Weekday>()
                    .map_err(|_| RecurrenceError::UnknownWeekday(part.to_string()))?;
                set.insert(day);
            }
        }
        Ok(set)
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self
            .weekdays()
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&names)
    }
}

/// Weekly repetition over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub weekdays: WeekdaySet,
}

impl RecurrenceRule {
    pub fn new(start: NaiveDate, end: NaiveDate, weekdays: WeekdaySet) -> Self {
        Self {
            start,
            end,
            weekdays,
        }
    }

    /// Every date in `[start, end]` whose weekday is selected, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        if self.weekdays.is_empty() || self.end < self.start {
            return Vec::new();
        }
        self.start
            .iter_days()
            .take_while(|date| *date <= self.end)
            .filter(|date| self.weekdays.contains(date.weekday()))
            .collect()
    }
}

/// The fields shared by every session produced from one form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTemplate {
    pub student_id: String,
    pub created_by_user_id: String,
    pub title: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub materials: Vec<Material>,
}

impl TaskTemplate {
    pub fn instantiate(&self, id: String, date: NaiveDate) -> Task {
        Task {
            id,
            student_id: self.student_id.clone(),
            created_by_user_id: self.created_by_user_id.clone(),
            title: self.title.clone(),
            date,
            duration_minutes: self.duration_minutes,
            objective: self.objective.clone(),
            status: TaskStatus::Todo,
            materials: self.materials.clone(),
            feedback: None,
        }
    }
}

/// Expands a template over a rule, giving each task a fresh random id.
pub fn expand(rule: &RecurrenceRule, template: &TaskTemplate) -> Vec<Task> {
    expand_with_ids(rule, template, new_record_id)
}

pub fn expand_with_ids<F>(rule: &RecurrenceRule, template: &TaskTemplate, mut next_id: F) -> Vec<Task>
where
    F: FnMut() -> String,
{
    rule.dates()
        .into_iter()
        .map(|date| template.instantiate(next_id(), date))
        .collect()
}

/// "Repeat weekly until" options of a session form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyRepeat {
    pub until: NaiveDate,
    pub weekdays: WeekdaySet,
}

/// Tasks for one form submission: a single task on `start`, or the weekly
/// expansion from `start` when a repeat with at least one weekday is given.
pub fn plan(template: &TaskTemplate, start: NaiveDate, repeat: Option<&WeeklyRepeat>) -> Vec<Task> {
    match repeat {
        Some(repeat) if !repeat.weekdays.is_empty() => expand(
            &RecurrenceRule::new(start, repeat.until, repeat.weekdays),
            template,
        ),
        _ => vec![template.instantiate(new_record_id(), start)],
    }
}

/// The Sunday-started week containing `date`, or `None` when part of that
/// week falls outside the representable date range.
pub fn week_of(date: NaiveDate) -> Option<[NaiveDate; 7]> {
    let back = Duration::days(i64::from(date.weekday().num_days_from_sunday()));
    let start = date.checked_sub_signed(back)?;
    let days: Vec<NaiveDate> = start.iter_days().take(7).collect();
    days.try_into().ok()
}
