use crate::config::{AppConfig, StorageBackendKind};
use crate::persistence::{
    FileSessionStorage, JsonFileBackend, MemoryBackend, MemorySessionStorage, PersistenceError,
    SessionStorage, StoreBackend,
};
use crate::recurrence::{self, TaskTemplate, WeeklyRepeat};
use crate::seed;
use crate::session::Session;
use crate::store::DataStore;
use crate::task::Task;
use crate::user::User;
use crate::validation::ValidationError;
use chrono::NaiveDate;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("seed data is inconsistent: {0}")]
    Seed(#[from] ValidationError),
    #[error("storage backend '{0}' is not compiled in")]
    BackendUnavailable(&'static str),
}

/// Owns the store, the session and the backend the store is saved to.
/// Front ends hold one of these instead of any global state.
pub struct AppContext {
    store: DataStore,
    session: Session,
    backend: Box<dyn StoreBackend>,
}

impl AppContext {
    pub fn new(store: DataStore, session: Session, backend: Box<dyn StoreBackend>) -> Self {
        Self {
            store,
            session,
            backend,
        }
    }

    /// Demo data with nothing written outside the process.
    pub fn in_memory(today: NaiveDate) -> Result<Self, ContextError> {
        Ok(Self::new(
            seed::demo_store(today)?,
            Session::new(Box::new(MemorySessionStorage::new())),
            Box::new(MemoryBackend::new()),
        ))
    }

    /// Opens the configured backend, loads the stored data (falling back to
    /// the demo data or an empty store) and restores the previous session.
    pub fn bootstrap(config: &AppConfig, today: NaiveDate) -> Result<Self, ContextError> {
        let (backend, storage) = open_backend(config)?;
        let store = match backend.load_store()? {
            Some(store) => {
                info!(tasks = store.task_count(), users = store.users().len(), "store loaded");
                store
            }
            None if config.seed_demo_data => {
                info!("no stored data, starting from demo data");
                seed::demo_store(today)?
            }
            None => DataStore::new(),
        };
        let mut context = Self::new(store, Session::new(storage), backend);
        context.restore_session();
        Ok(context)
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut DataStore {
        &mut self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Swaps in a store loaded from elsewhere. Signs out when the current
    /// user does not exist in it.
    pub fn replace_store(&mut self, store: DataStore) {
        self.store = store;
        let known = self
            .current_user()
            .is_some_and(|user| self.store.find_user(&user.id).is_some());
        if self.session.is_authenticated() && !known {
            self.session.logout();
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.session.current_user()
    }

    pub fn restore_session(&mut self) -> Option<&User> {
        self.session.restore(&mut self.store)
    }

    pub fn login(&mut self, email: &str) -> Option<&User> {
        self.session.login(&self.store, email)
    }

    pub fn logout(&mut self) {
        self.session.logout();
    }

    pub fn link_to_teacher(&mut self, invite_code: &str) -> bool {
        self.session.link_to_teacher(&mut self.store, invite_code)
    }

    pub fn unlink_from_teacher(&mut self) {
        self.session.unlink_from_teacher(&mut self.store);
    }

    /// Whether the signed-in user may plan sessions for `student_id`: the
    /// student themself, or the teacher they are linked to.
    pub fn can_plan_for(&self, student_id: &str) -> bool {
        let Some(user) = self.current_user() else {
            return false;
        };
        if user.is_student() {
            return user.id == student_id;
        }
        self.store
            .find_user(student_id)
            .is_some_and(|s| s.is_student() && s.teacher_id.as_deref() == Some(user.id.as_str()))
    }

    /// Whether the signed-in user may edit or delete `task`: its owner, the
    /// teacher who assigned it, or the owner's linked teacher.
    pub fn can_manage(&self, task: &Task) -> bool {
        let Some(user) = self.current_user() else {
            return false;
        };
        task.student_id == user.id
            || (user.is_teacher() && task.created_by_user_id == user.id)
            || self.can_plan_for(&task.student_id)
    }

    /// Adds the tasks of one form submission and returns their ids.
    pub fn plan_sessions(
        &mut self,
        template: &TaskTemplate,
        start: NaiveDate,
        repeat: Option<&WeeklyRepeat>,
    ) -> Vec<String> {
        let tasks = recurrence::plan(template, start, repeat);
        let ids = tasks.iter().map(|t| t.id.clone()).collect();
        self.store.add_tasks(tasks);
        ids
    }

    /// Writes the store to the backend.
    pub fn commit(&self) -> Result<(), PersistenceError> {
        self.backend.save_store(&self.store)
    }

    /// [`AppContext::commit`] for callers that only log failures.
    pub fn commit_best_effort(&self) {
        if let Err(err) = self.commit() {
            warn!(error = %err, "failed to save store");
        }
    }
}

type OpenedBackend = (Box<dyn StoreBackend>, Box<dyn SessionStorage>);

fn open_backend(config: &AppConfig) -> Result<OpenedBackend, ContextError> {
    let storage = &config.storage;
    match storage.backend {
        StorageBackendKind::Memory => Ok((
            Box::new(MemoryBackend::new()),
            Box::new(MemorySessionStorage::new()),
        )),
        StorageBackendKind::Json => Ok((
            Box::new(JsonFileBackend::new(&storage.path)),
            Box::new(FileSessionStorage::new(&storage.session_dir)),
        )),
        #[cfg(feature = "sqlite")]
        StorageBackendKind::Sqlite => {
            use crate::persistence::sqlite::SqliteStore;
            Ok((
                Box::new(SqliteStore::new(&storage.path)?),
                Box::new(SqliteStore::new(&storage.path)?),
            ))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackendKind::Sqlite => Err(ContextError::BackendUnavailable("sqlite")),
    }
}
