use crate::material::Material;
use crate::validation::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Fresh random identifier for tasks and attached materials.
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    #[default]
    Todo,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::Done => "DONE",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            TaskStatus::Todo => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TODO" => Ok(TaskStatus::Todo),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

/// Self-assessment attached when a session is completed.
///
/// Deserialization goes through [`Feedback::new`], so out-of-range ratings
/// never reach a stored task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFeedback")]
pub struct Feedback {
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Feedback {
    pub const MIN_RATING: u8 = 1;
    pub const MAX_RATING: u8 = 5;
    /// Rating recorded when the student skips the feedback prompt.
    pub const SKIPPED_RATING: u8 = 3;

    pub fn new(rating: u8, comment: Option<String>) -> Result<Self, ValidationError> {
        if !(Self::MIN_RATING..=Self::MAX_RATING).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating));
        }
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Ok(Self { rating, comment })
    }

    pub fn skipped() -> Self {
        Self {
            rating: Self::SKIPPED_RATING,
            comment: None,
        }
    }
}

#[derive(Deserialize)]
struct RawFeedback {
    rating: u8,
    #[serde(default)]
    comment: Option<String>,
}

impl TryFrom<RawFeedback> for Feedback {
    type Error = ValidationError;

    fn try_from(raw: RawFeedback) -> Result<Self, Self::Error> {
        Feedback::new(raw.rating, raw.comment)
    }
}

/// A scheduled practice session owned by one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub student_id: String,
    pub created_by_user_id: String,
    pub title: String,
    pub date: NaiveDate,
    pub duration_minutes: u32,
    pub objective: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub materials: Vec<Material>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        student_id: impl Into<String>,
        title: impl Into<String>,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Self {
        let student_id = student_id.into();
        Self {
            id: id.into(),
            created_by_user_id: student_id.clone(),
            student_id,
            title: title.into(),
            date,
            duration_minutes,
            objective: String::new(),
            status: TaskStatus::Todo,
            materials: Vec::new(),
            feedback: None,
        }
    }

    pub fn created_by(mut self, user_id: impl Into<String>) -> Self {
        self.created_by_user_id = user_id.into();
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = objective.into();
        self
    }

    pub fn with_materials(mut self, materials: Vec<Material>) -> Self {
        self.materials = materials;
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    /// True when the session was assigned by someone other than its owner.
    pub fn is_assigned(&self) -> bool {
        self.created_by_user_id != self.student_id
    }

    /// Restores the status/feedback pairing: TODO never carries feedback and
    /// DONE always does. Returns true when anything was changed.
    pub fn normalize_feedback(&mut self) -> bool {
        match (self.status, self.feedback.is_some()) {
            (TaskStatus::Todo, true) => {
                self.feedback = None;
                true
            }
            (TaskStatus::Done, false) => {
                self.feedback = Some(Feedback::skipped());
                true
            }
            _ => false,
        }
    }

    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(objective) = patch.objective {
            self.objective = objective;
        }
        if let Some(materials) = patch.materials {
            self.materials = materials;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(feedback) = patch.feedback {
            self.feedback = Some(feedback);
        }
        self.normalize_feedback();
    }
}

/// Partial update merged into an existing task. Unset fields are left alone.
///
/// Feedback is only kept when the resulting status is DONE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub duration_minutes: Option<u32>,
    pub objective: Option<String>,
    pub status: Option<TaskStatus>,
    pub materials: Option<Vec<Material>>,
    pub feedback: Option<Feedback>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// True when the patch touches anything besides status and feedback.
    pub fn edits_content(&self) -> bool {
        self.title.is_some()
            || self.date.is_some()
            || self.duration_minutes.is_some()
            || self.objective.is_some()
            || self.materials.is_some()
    }

    /// True when the patch moves the task back to TODO.
    pub fn reopens(&self) -> bool {
        self.status == Some(TaskStatus::Todo)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn objective(mut self, objective: impl Into<String>) -> Self {
        self.objective = Some(objective.into());
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn materials(mut self, materials: Vec<Material>) -> Self {
        self.materials = Some(materials);
        self
    }

    pub fn feedback(mut self, feedback: Feedback) -> Self {
        self.feedback = Some(feedback);
        self
    }
}
