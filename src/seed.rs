//! Demo data the application starts from when nothing has been persisted.

use crate::material::{Material, MaterialKind};
use crate::store::{DataStore, TaskRecord};
use crate::task::{Feedback, Task, TaskStatus};
use crate::user::User;
use crate::validation::ValidationError;
use chrono::{Duration, NaiveDate};

pub const DEMO_TEACHER_ID: &str = "teacher-1";
pub const DEMO_INVITE_CODE: &str = "MAESTRO123";
pub const DEMO_STUDENT_EMAIL: &str = "alice@example.com";
pub const DEMO_TEACHER_EMAIL: &str = "john@maestro.com";

fn avatar(seed: &str) -> String {
    format!("https://api.dicebear.com/7.x/avataaars/svg?seed={seed}")
}

pub fn users() -> Vec<User> {
    vec![
        User::student("student-1", "Alice Pianista", DEMO_STUDENT_EMAIL)
            .with_teacher(DEMO_TEACHER_ID)
            .with_avatar(avatar("Alice")),
        User::student("student-2", "Bob Baterista", "bob@example.com").with_avatar(avatar("Bob")),
        User::student("student-3", "Carlos Violinista", "carlos@example.com")
            .with_teacher(DEMO_TEACHER_ID)
            .with_avatar(avatar("Carlos")),
        User::student("student-4", "Diana Guitarrista", "diana@example.com")
            .with_teacher(DEMO_TEACHER_ID)
            .with_avatar(avatar("Diana")),
        User::student("student-5", "Eduardo Flautista", "eduardo@example.com")
            .with_teacher(DEMO_TEACHER_ID)
            .with_avatar(avatar("Eduardo")),
        User::teacher(DEMO_TEACHER_ID, "Maestro João", DEMO_TEACHER_EMAIL, DEMO_INVITE_CODE)
            .with_avatar(avatar("John")),
    ]
}

pub fn files() -> Vec<Material> {
    vec![
        Material::new(
            "f1",
            "Hanon - O Pianista Virtuoso",
            MaterialKind::Pdf,
            "https://imslp.org/wiki/Special:ImagefromIndex/03158/hAA23.pdf",
        )
        .uploaded_by("student-1"),
        Material::new(
            "f2",
            "Bach - 15 Invenções",
            MaterialKind::Pdf,
            "https://imslp.org/wiki/Special:ImagefromIndex/00747/hAA23.pdf",
        )
        .uploaded_by(DEMO_TEACHER_ID),
        Material::new(
            "f3",
            "Chopin - Noturno Op 9 No 2",
            MaterialKind::Pdf,
            "https://imslp.org/wiki/Special:ImagefromIndex/00452/hAA23.pdf",
        )
        .uploaded_by("student-1"),
    ]
}

/// Sessions dated relative to `today`: two open today, one finished yesterday.
pub fn tasks(today: NaiveDate) -> Vec<Task> {
    let mut scale = Task::new("task-3", "student-1", "Escala Dó Maior", today - Duration::days(1), 15)
        .with_objective("Tom uniforme e passagem do polegar.");
    scale.status = TaskStatus::Done;
    scale.feedback = Some(Feedback {
        rating: 4,
        comment: Some("Foi bem, mas a descida precisa de mais prática.".to_string()),
    });

    vec![
        Task::new("task-1", "student-1", "Exercícios Hanon No. 1-5", today, 20)
            .with_objective("Aumentar independência e igualdade dos dedos.")
            .with_materials(vec![Material::new(
                "mat-1",
                "Hanon Parte 1",
                MaterialKind::Pdf,
                "https://imslp.org/wiki/Special:ImagefromIndex/03158/hAA23.pdf",
            )]),
        Task::new("task-2", "student-1", "Bach Minueto em Sol", today, 30)
            .created_by(DEMO_TEACHER_ID)
            .with_objective("Focar no fraseado e articulação da mão direita."),
        scale,
    ]
}

pub fn demo_store(today: NaiveDate) -> Result<DataStore, ValidationError> {
    let records = tasks(today)
        .into_iter()
        .enumerate()
        .map(|(idx, task)| TaskRecord {
            sequence: idx as u64,
            task,
        })
        .collect();
    DataStore::from_parts(users(), files(), records)
}
