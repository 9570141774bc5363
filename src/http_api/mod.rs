use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
    AppContext, Feedback, Material, MaterialKind, Task, TaskEditError, TaskPatch, TaskTemplate, User,
    WeeklyRepeat,
};

#[derive(Clone)]
pub struct AppState {
    context: Arc<RwLock<AppContext>>,
}

impl AppState {
    pub fn new(context: AppContext) -> Self {
        Self {
            context: Arc::new(RwLock::new(context)),
        }
    }

    pub fn with_shared(context: Arc<RwLock<AppContext>>) -> Self {
        Self { context }
    }

    fn context(&self) -> Arc<RwLock<AppContext>> {
        self.context.clone()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Invalid(String),
    Conflict(String),
    Unprocessable(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }

    fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    fn signed_out() -> Self {
        ApiError::Unauthorized("no user is signed in".to_string())
    }
}

impl From<crate::ValidationError> for ApiError {
    fn from(value: crate::ValidationError) -> Self {
        ApiError::Invalid(value.to_string())
    }
}

impl From<TaskEditError> for ApiError {
    fn from(value: TaskEditError) -> Self {
        match value {
            TaskEditError::NotFound(_) => ApiError::NotFound(value.to_string()),
            TaskEditError::Locked(_) => ApiError::Conflict(value.to_string()),
            TaskEditError::Invalid(err) => err.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::Invalid(value.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, "forbidden", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "task_locked", message),
            ApiError::Unprocessable(message) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_invite_code", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
}

#[derive(Debug, Deserialize)]
struct LinkPayload {
    #[serde(alias = "inviteCode")]
    invite_code: String,
}

#[derive(Debug, Default, Deserialize)]
struct TaskQuery {
    student_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

/// Body of `POST /tasks`: one session, or a weekly batch when `repeat` is set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTasksPayload {
    student_id: Option<String>,
    title: String,
    date: NaiveDate,
    duration_minutes: u32,
    #[serde(default)]
    objective: String,
    #[serde(default)]
    materials: Vec<Material>,
    /// Bare URLs attached as "Link" materials.
    #[serde(default)]
    links: Vec<String>,
    repeat: Option<WeeklyRepeat>,
}

#[derive(Debug, Default, Deserialize)]
struct CompletePayload {
    rating: Option<u8>,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateFilePayload {
    title: String,
    #[serde(rename = "type")]
    kind: MaterialKind,
    url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/session",
            get(get_session).post(create_session).delete(delete_session),
        )
        .route("/session/link", post(link_teacher).delete(unlink_teacher))
        .route("/tasks", get(list_tasks).post(create_tasks))
        .route(
            "/tasks/:id",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/tasks/:id/complete", post(complete_task))
        .route("/tasks/:id/reopen", post(reopen_task))
        .route("/files", get(list_files).post(create_file))
        .route("/teachers/:id/students", get(list_students))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, context: AppContext) -> std::io::Result<()> {
    let state = AppState::new(context);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http api listening");
    axum::serve(listener, app).await
}

fn signed_in(context: &AppContext) -> Result<User, ApiError> {
    context.current_user().cloned().ok_or_else(ApiError::signed_out)
}

fn managed_task(context: &AppContext, task_id: &str) -> Result<Task, ApiError> {
    signed_in(context)?;
    let task = context
        .store()
        .find_task(task_id)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("task {task_id} not found")))?;
    if !context.can_manage(&task) {
        return Err(ApiError::forbidden(format!("task {task_id} belongs to another student")));
    }
    Ok(task)
}

fn stored_task(context: &AppContext, task_id: &str) -> Result<Json<Task>, ApiError> {
    context
        .store()
        .find_task(task_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("task {task_id} not found")))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_session(State(state): State<AppState>) -> Result<Json<User>, ApiError> {
    let context = state.context();
    let guard = context.read();
    signed_in(&guard).map(Json)
}

async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<User>, ApiError> {
    let context = state.context();
    let mut guard = context.write();
    guard
        .login(&payload.email)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized(format!("no user with email '{}'", payload.email.trim())))
}

async fn delete_session(State(state): State<AppState>) -> StatusCode {
    let context = state.context();
    context.write().logout();
    StatusCode::NO_CONTENT
}

async fn link_teacher(
    State(state): State<AppState>,
    Json(payload): Json<LinkPayload>,
) -> Result<Json<User>, ApiError> {
    let context = state.context();
    let mut guard = context.write();
    let user = signed_in(&guard)?;
    if !user.is_student() {
        return Err(ApiError::forbidden("only students can link to a teacher"));
    }
    if !guard.link_to_teacher(&payload.invite_code) {
        return Err(ApiError::Unprocessable(format!(
            "invite code '{}' does not match any teacher",
            payload.invite_code.trim()
        )));
    }
    guard.commit_best_effort();
    signed_in(&guard).map(Json)
}

async fn unlink_teacher(State(state): State<AppState>) -> Result<Json<User>, ApiError> {
    let context = state.context();
    let mut guard = context.write();
    let user = signed_in(&guard)?;
    if !user.is_student() {
        return Err(ApiError::forbidden("only students can unlink from a teacher"));
    }
    guard.unlink_from_teacher();
    guard.commit_best_effort();
    signed_in(&guard).map(Json)
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let context = state.context();
    let guard = context.read();
    let user = signed_in(&guard)?;
    let student_id = query.student_id.unwrap_or(user.id);
    if !guard.can_plan_for(&student_id) {
        return Err(ApiError::forbidden(format!(
            "tasks of {student_id} are not visible to this user"
        )));
    }
    let tasks = guard
        .store()
        .get_student_tasks(&student_id)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(tasks))
}

async fn create_tasks(
    State(state): State<AppState>,
    Json(payload): Json<CreateTasksPayload>,
) -> Result<(StatusCode, Json<Vec<Task>>), ApiError> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::invalid("title must not be empty"));
    }
    if payload.duration_minutes == 0 {
        return Err(ApiError::invalid("durationMinutes must be positive"));
    }

    let context = state.context();
    let mut guard = context.write();
    let user = signed_in(&guard)?;
    let student_id = payload.student_id.unwrap_or_else(|| user.id.clone());
    if !guard.can_plan_for(&student_id) {
        return Err(ApiError::forbidden(format!(
            "sessions for {student_id} cannot be planned by this user"
        )));
    }

    let mut materials = payload.materials;
    materials.extend(
        payload
            .links
            .into_iter()
            .filter(|url| !url.trim().is_empty())
            .map(Material::link),
    );
    let template = TaskTemplate {
        student_id,
        created_by_user_id: user.id,
        title: payload.title.trim().to_string(),
        duration_minutes: payload.duration_minutes,
        objective: payload.objective,
        materials,
    };
    let ids = guard.plan_sessions(&template, payload.date, payload.repeat.as_ref());
    guard.commit_best_effort();

    let created = ids
        .iter()
        .filter_map(|id| guard.store().find_task(id).cloned())
        .collect();
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let context = state.context();
    let guard = context.read();
    managed_task(&guard, &task_id).map(Json)
}

async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    payload: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(patch) = payload?;
    let context = state.context();
    let mut guard = context.write();
    managed_task(&guard, &task_id)?;
    let task = guard.store_mut().edit_task(&task_id, patch)?.clone();
    guard.commit_best_effort();
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let context = state.context();
    let mut guard = context.write();
    managed_task(&guard, &task_id)?;
    guard.store_mut().delete_task(&task_id);
    guard.commit_best_effort();
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    payload: Option<Json<CompletePayload>>,
) -> Result<Json<Task>, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let feedback = match payload.rating {
        Some(rating) => Feedback::new(rating, payload.comment)?,
        None => Feedback::skipped(),
    };
    let context = state.context();
    let mut guard = context.write();
    managed_task(&guard, &task_id)?;
    guard.store_mut().complete_task(&task_id, feedback);
    guard.commit_best_effort();
    stored_task(&guard, &task_id)
}

async fn reopen_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let context = state.context();
    let mut guard = context.write();
    managed_task(&guard, &task_id)?;
    guard.store_mut().reopen_task(&task_id);
    guard.commit_best_effort();
    stored_task(&guard, &task_id)
}

async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<Material>> {
    let context = state.context();
    let guard = context.read();
    Json(guard.store().search_files(&query.q).into_iter().cloned().collect())
}

async fn create_file(
    State(state): State<AppState>,
    Json(payload): Json<CreateFilePayload>,
) -> Result<(StatusCode, Json<Material>), ApiError> {
    if payload.url.trim().is_empty() {
        return Err(ApiError::invalid("url must not be empty"));
    }
    let context = state.context();
    let mut guard = context.write();
    let user = signed_in(&guard)?;
    let material = Material::new(
        crate::task::new_record_id(),
        payload.title.trim(),
        payload.kind,
        payload.url.trim(),
    )
    .uploaded_by(user.id);
    guard.store_mut().add_file(material.clone());
    guard.commit_best_effort();
    Ok((StatusCode::CREATED, Json(material)))
}

async fn list_students(
    State(state): State<AppState>,
    Path(teacher_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, ApiError> {
    let context = state.context();
    let guard = context.read();
    if !guard.store().find_user(&teacher_id).is_some_and(User::is_teacher) {
        return Err(ApiError::not_found(format!("teacher {teacher_id} not found")));
    }
    let students = guard
        .store()
        .search_students_for_teacher(&teacher_id, &query.q)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(students))
}
