use crate::task::{Feedback, Task, TaskStatus};
use crate::user::{User, UserRole};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("feedback rating {0} is outside 1..=5")]
    RatingOutOfRange(u8),
    #[error("task {0} must have a positive duration")]
    NonPositiveDuration(String),
    #[error("task {0} is DONE but has no feedback")]
    DoneWithoutFeedback(String),
    #[error("task {0} is TODO but carries feedback")]
    FeedbackOnOpenTask(String),
    #[error("duplicate task id {0}")]
    DuplicateTaskId(String),
    #[error("duplicate user id {0}")]
    DuplicateUserId(String),
    #[error("invite code {code} is used by both {first} and {second}")]
    DuplicateInviteCode {
        code: String,
        first: String,
        second: String,
    },
    #[error("user {0} has an invite code but is not a teacher")]
    InviteCodeOnStudent(String),
    #[error("student {student} is linked to {teacher}, which is not a known teacher")]
    DanglingTeacherLink { student: String, teacher: String },
    #[error("task {0} has the highest possible sequence number")]
    SequenceExhausted(String),
}

pub fn validate_task(task: &Task) -> Result<(), ValidationError> {
    if task.duration_minutes == 0 {
        return Err(ValidationError::NonPositiveDuration(task.id.clone()));
    }

    match (task.status, &task.feedback) {
        (TaskStatus::Done, None) => {
            return Err(ValidationError::DoneWithoutFeedback(task.id.clone()));
        }
        (TaskStatus::Todo, Some(_)) => {
            return Err(ValidationError::FeedbackOnOpenTask(task.id.clone()));
        }
        (TaskStatus::Done, Some(feedback)) => {
            if !(Feedback::MIN_RATING..=Feedback::MAX_RATING).contains(&feedback.rating) {
                return Err(ValidationError::RatingOutOfRange(feedback.rating));
            }
        }
        (TaskStatus::Todo, None) => {}
    }

    Ok(())
}

pub fn validate_task_collection<'a, I>(tasks: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a Task>,
{
    let mut seen_ids = HashSet::new();
    for task in tasks {
        if !seen_ids.insert(task.id.as_str()) {
            return Err(ValidationError::DuplicateTaskId(task.id.clone()));
        }
        validate_task(task)?;
    }
    Ok(())
}

/// Checks the identity invariants: unique ids, invite codes only on teachers
/// and unique among them, and student links pointing at real teachers.
pub fn validate_users(users: &[User]) -> Result<(), ValidationError> {
    let mut seen_ids = HashSet::with_capacity(users.len());
    let mut codes: HashMap<String, &str> = HashMap::new();
    for user in users {
        if !seen_ids.insert(user.id.as_str()) {
            return Err(ValidationError::DuplicateUserId(user.id.clone()));
        }
        let Some(code) = user.invite_code.as_deref() else {
            continue;
        };
        if user.role != UserRole::Teacher {
            return Err(ValidationError::InviteCodeOnStudent(user.id.clone()));
        }
        let normalized = crate::linking::normalize_invite_code(code);
        if let Some(first) = codes.insert(normalized.clone(), user.id.as_str()) {
            return Err(ValidationError::DuplicateInviteCode {
                code: normalized,
                first: first.to_string(),
                second: user.id.clone(),
            });
        }
    }

    let teachers: HashSet<&str> = users
        .iter()
        .filter(|u| u.is_teacher())
        .map(|u| u.id.as_str())
        .collect();
    for user in users.iter().filter(|u| u.is_student()) {
        if let Some(teacher) = user.teacher_id.as_deref() {
            if !teachers.contains(teacher) {
                return Err(ValidationError::DanglingTeacherLink {
                    student: user.id.clone(),
                    teacher: teacher.to_string(),
                });
            }
        }
    }

    Ok(())
}
