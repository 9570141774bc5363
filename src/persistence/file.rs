use super::{PersistenceError, PersistenceResult, SessionStorage, StoreBackend, StoreSnapshot};
use crate::material::Material;
use crate::store::DataStore;
use crate::task::{Feedback, Task, TaskStatus};
use crate::validation;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

pub fn save_store_to_json<P: AsRef<Path>>(store: &DataStore, path: P) -> PersistenceResult<()> {
    let snapshot = StoreSnapshot::from_store(store);
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    Ok(())
}

pub fn load_store_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<DataStore> {
    let file = File::open(path)?;
    let snapshot: StoreSnapshot = serde_json::from_reader(file)?;
    snapshot.into_store()
}

/// Store snapshots kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreBackend for JsonFileBackend {
    fn save_store(&self, store: &DataStore) -> PersistenceResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        save_store_to_json(store, &self.path)
    }

    fn load_store(&self) -> PersistenceResult<Option<DataStore>> {
        match load_store_from_json(&self.path) {
            Ok(store) => Ok(Some(store)),
            Err(PersistenceError::Io(err)) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// One `<key>.json` file per slot inside a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    dir: PathBuf,
}

impl FileSessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

impl SessionStorage for FileSessionStorage {
    fn read_slot(&self, key: &str) -> PersistenceResult<Option<String>> {
        match fs::read_to_string(self.slot_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_slot(&self, key: &str, value: &str) -> PersistenceResult<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.slot_path(key), value)?;
        debug!(key, dir = %self.dir.display(), "session slot written");
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> PersistenceResult<()> {
        match fs::remove_file(self.slot_path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TaskCsvRecord {
    id: String,
    student_id: String,
    created_by_user_id: String,
    title: String,
    date: String,
    duration_minutes: u32,
    objective: String,
    status: String,
    materials: String,
    feedback_rating: String,
    feedback_comment: String,
}

impl From<&Task> for TaskCsvRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            student_id: task.student_id.clone(),
            created_by_user_id: task.created_by_user_id.clone(),
            title: task.title.clone(),
            date: task.date.format("%Y-%m-%d").to_string(),
            duration_minutes: task.duration_minutes,
            objective: task.objective.clone(),
            status: task.status.as_str().to_string(),
            materials: serde_json::to_string(&task.materials).unwrap_or_else(|_| "[]".to_string()),
            feedback_rating: task
                .feedback
                .as_ref()
                .map(|f| f.rating.to_string())
                .unwrap_or_default(),
            feedback_comment: task
                .feedback
                .as_ref()
                .and_then(|f| f.comment.clone())
                .unwrap_or_default(),
        }
    }
}

impl TaskCsvRecord {
    fn into_task(self) -> PersistenceResult<Task> {
        let date = parse_date(&self.date)?;
        let status = self
            .status
            .parse::<TaskStatus>()
            .map_err(PersistenceError::InvalidData)?;
        let materials = if self.materials.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str::<Vec<Material>>(&self.materials).map_err(|err| {
                PersistenceError::InvalidData(format!("invalid materials for task {}: {err}", self.id))
            })?
        };
        let feedback = match parse_rating(&self.feedback_rating)? {
            Some(rating) => Some(Feedback::new(rating, parse_string_option(self.feedback_comment))?),
            None => None,
        };

        Ok(Task {
            id: self.id,
            student_id: self.student_id,
            created_by_user_id: self.created_by_user_id,
            title: self.title,
            date,
            duration_minutes: self.duration_minutes,
            objective: self.objective,
            status,
            materials,
            feedback,
        })
    }
}

pub fn save_tasks_to_csv<'a, I, P>(tasks: I, path: P) -> PersistenceResult<()>
where
    I: IntoIterator<Item = &'a Task>,
    P: AsRef<Path>,
{
    let tasks: Vec<&Task> = tasks.into_iter().collect();
    validation::validate_task_collection(tasks.iter().copied())?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for task in tasks {
        writer.serialize(TaskCsvRecord::from(task))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn load_tasks_from_csv<P: AsRef<Path>>(path: P) -> PersistenceResult<Vec<Task>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut tasks = Vec::new();
    for record in reader.deserialize::<TaskCsvRecord>() {
        tasks.push(record?.into_task()?);
    }

    if tasks.is_empty() {
        return Err(PersistenceError::InvalidData(
            "CSV file contained no tasks".into(),
        ));
    }

    validation::validate_task_collection(&tasks)?;
    Ok(tasks)
}

fn parse_date(input: &str) -> PersistenceResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}

fn parse_rating(input: &str) -> PersistenceResult<Option<u8>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    input
        .trim()
        .parse::<u8>()
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid rating '{input}': {e}")))
}

fn parse_string_option(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
