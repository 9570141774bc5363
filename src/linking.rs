//! Invite-code based association between students and teachers.
//!
//! A student is either unlinked or linked to exactly one teacher. Linking
//! again replaces the previous teacher; unlinking keeps no history.

use crate::user::User;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("user {0} does not exist")]
    UnknownUser(String),
    #[error("user {0} is not a student")]
    NotAStudent(String),
    #[error("invite code '{0}' does not match any teacher")]
    InvalidInviteCode(String),
}

/// Codes compare and store in trimmed uppercase.
pub fn normalize_invite_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn find_teacher_by_code<'a>(users: &'a [User], code: &str) -> Option<&'a User> {
    let wanted = normalize_invite_code(code);
    if wanted.is_empty() {
        return None;
    }
    users.iter().find(|user| {
        user.is_teacher()
            && user
                .invite_code
                .as_deref()
                .is_some_and(|own| normalize_invite_code(own) == wanted)
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "teacherId", rename_all = "lowercase")]
pub enum LinkState {
    Unlinked,
    Linked(String),
}

impl LinkState {
    pub fn of(user: &User) -> Self {
        match user.teacher_id.as_deref() {
            Some(teacher) if user.is_student() => LinkState::Linked(teacher.to_string()),
            _ => LinkState::Unlinked,
        }
    }

    pub fn teacher_id(&self) -> Option<&str> {
        match self {
            LinkState::Linked(id) => Some(id),
            LinkState::Unlinked => None,
        }
    }
}
