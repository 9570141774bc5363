use crate::linking::{self, LinkError};
use crate::material::Material;
use crate::task::{Feedback, Task, TaskPatch, TaskStatus};
use crate::user::User;
use crate::validation::{self, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A stored task together with its insertion sequence number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub sequence: u64,
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskEditError {
    #[error("task {0} not found")]
    NotFound(String),
    #[error("task {0} is completed; reopen it before editing")]
    Locked(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Per-day completion counts for a student's calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayProgress {
    pub date: NaiveDate,
    pub total: usize,
    pub done: usize,
}

/// Authoritative in-memory collections of users, tasks and library files.
///
/// Task order is the order of the monotonic sequence assigned by
/// [`DataStore::add_task`]; queries never reshuffle it.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    users: Vec<User>,
    files: Vec<Material>,
    tasks: Vec<TaskRecord>,
    next_sequence: u64,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from previously persisted parts after checking them.
    pub fn from_parts(
        users: Vec<User>,
        files: Vec<Material>,
        mut tasks: Vec<TaskRecord>,
    ) -> Result<Self, ValidationError> {
        validation::validate_users(&users)?;
        validation::validate_task_collection(tasks.iter().map(|r| &r.task))?;
        tasks.sort_by_key(|r| r.sequence);
        let next_sequence = match tasks.last() {
            Some(last) => last
                .sequence
                .checked_add(1)
                .ok_or_else(|| ValidationError::SequenceExhausted(last.task.id.clone()))?,
            None => 0,
        };
        Ok(Self {
            users,
            files,
            tasks,
            next_sequence,
        })
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn files(&self) -> &[Material] {
        &self.files
    }

    pub fn task_records(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().map(|r| &r.task)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn find_user(&self, user_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == user_id)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim();
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        self.tasks
            .iter()
            .find(|r| r.task.id == task_id)
            .map(|r| &r.task)
    }

    pub fn task_sequence(&self, task_id: &str) -> Option<u64> {
        self.tasks
            .iter()
            .find(|r| r.task.id == task_id)
            .map(|r| r.sequence)
    }

    fn find_task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|r| r.task.id == task_id)
            .map(|r| &mut r.task)
    }

    /// Appends a task. Id uniqueness is the caller's responsibility.
    pub fn add_task(&mut self, mut task: Task) -> u64 {
        task.normalize_feedback();
        let sequence = self.next_sequence;
        self.next_sequence = sequence.saturating_add(1);
        debug!(task_id = %task.id, student_id = %task.student_id, sequence, "task added");
        self.tasks.push(TaskRecord { sequence, task });
        sequence
    }

    pub fn add_tasks<I>(&mut self, tasks: I) -> usize
    where
        I: IntoIterator<Item = Task>,
    {
        tasks.into_iter().map(|task| self.add_task(task)).count()
    }

    /// Appends tasks whose ids are not stored yet and returns how many were
    /// added. Tasks with a known id are skipped.
    pub fn import_tasks<I>(&mut self, tasks: I) -> usize
    where
        I: IntoIterator<Item = Task>,
    {
        let mut added = 0;
        for task in tasks {
            if self.find_task(&task.id).is_some() {
                debug!(task_id = %task.id, "import skipped existing task");
                continue;
            }
            self.add_task(task);
            added += 1;
        }
        added
    }

    /// Merges `patch` into the task with `task_id`. Unknown ids and patches
    /// that would leave the task invalid are ignored. Returns whether the
    /// task was updated.
    pub fn update_task(&mut self, task_id: &str, patch: TaskPatch) -> bool {
        let Some(task) = self.find_task_mut(task_id) else {
            debug!(task_id, "update ignored for unknown task");
            return false;
        };
        let mut updated = task.clone();
        updated.apply(patch);
        if let Err(err) = validation::validate_task(&updated) {
            debug!(task_id, error = %err, "update rejected");
            return false;
        }
        *task = updated;
        debug!(task_id, status = %task.status, "task updated");
        true
    }

    /// User-facing edit. A completed task only accepts status and feedback
    /// changes unless the same patch reopens it.
    pub fn edit_task(&mut self, task_id: &str, patch: TaskPatch) -> Result<&Task, TaskEditError> {
        let task = self
            .find_task_mut(task_id)
            .ok_or_else(|| TaskEditError::NotFound(task_id.to_string()))?;
        if task.is_done() && patch.edits_content() && !patch.reopens() {
            debug!(task_id, "edit refused on completed task");
            return Err(TaskEditError::Locked(task_id.to_string()));
        }
        let mut updated = task.clone();
        updated.apply(patch);
        validation::validate_task(&updated)?;
        *task = updated;
        debug!(task_id, status = %task.status, "task edited");
        Ok(&*task)
    }

    pub fn delete_task(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|r| r.task.id != task_id);
        let removed = self.tasks.len() != before;
        debug!(task_id, removed, "task delete");
        removed
    }

    pub fn complete_task(&mut self, task_id: &str, feedback: Feedback) -> bool {
        self.update_task(
            task_id,
            TaskPatch::default()
                .status(TaskStatus::Done)
                .feedback(feedback),
        )
    }

    pub fn reopen_task(&mut self, task_id: &str) -> bool {
        self.update_task(task_id, TaskPatch::default().status(TaskStatus::Todo))
    }

    /// Flips TODO/DONE. Completing this way records the skipped feedback.
    pub fn toggle_task_status(&mut self, task_id: &str) -> Option<TaskStatus> {
        let next = self.find_task(task_id)?.status.toggled();
        self.update_task(task_id, TaskPatch::default().status(next));
        Some(next)
    }

    pub fn add_file(&mut self, material: Material) {
        debug!(file_id = %material.id, kind = %material.kind, "library file added");
        self.files.push(material);
    }

    pub fn search_files(&self, query: &str) -> Vec<&Material> {
        self.files.iter().filter(|f| f.matches_query(query)).collect()
    }

    pub fn get_student_tasks(&self, student_id: &str) -> Vec<&Task> {
        self.tasks()
            .filter(|t| t.student_id == student_id)
            .collect()
    }

    /// A student's tasks within `[from, to]`, ordered by date then insertion.
    pub fn tasks_in_range(&self, student_id: &str, from: NaiveDate, to: NaiveDate) -> Vec<&Task> {
        let mut records: Vec<&TaskRecord> = self
            .tasks
            .iter()
            .filter(|r| r.task.student_id == student_id && r.task.date >= from && r.task.date <= to)
            .collect();
        records.sort_by_key(|r| (r.task.date, r.sequence));
        records.into_iter().map(|r| &r.task).collect()
    }

    pub fn daily_progress(&self, student_id: &str, from: NaiveDate, to: NaiveDate) -> Vec<DayProgress> {
        if to < from {
            return Vec::new();
        }
        from.iter_days()
            .take_while(|date| *date <= to)
            .map(|date| {
                let day: Vec<&Task> = self
                    .tasks()
                    .filter(|t| t.student_id == student_id && t.date == date)
                    .collect();
                DayProgress {
                    date,
                    total: day.len(),
                    done: day.iter().filter(|t| t.is_done()).count(),
                }
            })
            .collect()
    }

    pub fn get_students_for_teacher(&self, teacher_id: &str) -> Vec<&User> {
        self.users
            .iter()
            .filter(|u| u.is_student() && u.teacher_id.as_deref() == Some(teacher_id))
            .collect()
    }

    /// Teacher roster filtered by a case-insensitive name or email fragment.
    pub fn search_students_for_teacher(&self, teacher_id: &str, query: &str) -> Vec<&User> {
        let query = query.trim().to_lowercase();
        self.get_students_for_teacher(teacher_id)
            .into_iter()
            .filter(|u| {
                query.is_empty()
                    || u.name.to_lowercase().contains(&query)
                    || u.email.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn linked_teacher(&self, student_id: &str) -> Option<&User> {
        let teacher_id = self.find_user(student_id)?.teacher_id.as_deref()?;
        self.find_user(teacher_id).filter(|u| u.is_teacher())
    }

    /// Links a student to the teacher owning `invite_code`, replacing any
    /// previous link.
    pub fn link_student(&mut self, student_id: &str, invite_code: &str) -> Result<&User, LinkError> {
        let student = self
            .find_user(student_id)
            .ok_or_else(|| LinkError::UnknownUser(student_id.to_string()))?;
        if !student.is_student() {
            return Err(LinkError::NotAStudent(student_id.to_string()));
        }
        let teacher_id = linking::find_teacher_by_code(&self.users, invite_code)
            .map(|t| t.id.clone())
            .ok_or_else(|| LinkError::InvalidInviteCode(linking::normalize_invite_code(invite_code)))?;

        let student = self.user_mut(student_id)?;
        debug!(student_id, teacher_id = %teacher_id, "student linked");
        student.teacher_id = Some(teacher_id);
        Ok(&*student)
    }

    pub fn unlink_student(&mut self, student_id: &str) -> Result<&User, LinkError> {
        let student = self.user_mut(student_id)?;
        if !student.is_student() {
            return Err(LinkError::NotAStudent(student_id.to_string()));
        }
        if student.teacher_id.take().is_some() {
            debug!(student_id, "student unlinked");
        }
        Ok(&*student)
    }

    /// Carries a persisted student's teacher link back into the store when it
    /// still points at a known teacher. Returns the store's record.
    pub fn reconcile_user(&mut self, persisted: &User) -> Option<&User> {
        let teacher_valid = match persisted.teacher_id.as_deref() {
            Some(teacher) => self.find_user(teacher).is_some_and(User::is_teacher),
            None => true,
        };
        let user = self.user_mut(&persisted.id).ok()?;
        if user.is_student() && teacher_valid {
            user.teacher_id = persisted.teacher_id.clone();
        }
        Some(&*user)
    }

    fn user_mut(&mut self, user_id: &str) -> Result<&mut User, LinkError> {
        self.users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| LinkError::UnknownUser(user_id.to_string()))
    }
}
