pub mod config;
pub mod context;
pub mod linking;
pub mod material;
pub mod persistence;
pub mod recurrence;
pub mod seed;
pub mod session;
pub mod store;
pub mod task;
pub mod user;
pub mod validation;

#[cfg(feature = "http_api")]
pub mod http_api;

pub use config::AppConfig;
pub use context::{AppContext, ContextError};
pub use linking::{LinkError, LinkState};
pub use material::{Material, MaterialKind};
pub use recurrence::{RecurrenceRule, TaskTemplate, WeekdaySet, WeeklyRepeat};
pub use session::Session;
pub use store::{DataStore, DayProgress, TaskEditError, TaskRecord};
pub use task::{Feedback, Task, TaskPatch, TaskStatus};
pub use user::{User, UserRole};
pub use validation::ValidationError;
