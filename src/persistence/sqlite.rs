use super::{PersistenceResult, SessionStorage, StoreBackend};
use crate::material::Material;
use crate::store::{DataStore, TaskRecord};
use crate::task::Task;
use crate::user::User;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;

/// SQLite-backed store snapshots and session slots in one database file.
pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::with_connection(connection)
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> PersistenceResult<Self> {
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS users (
                position INTEGER PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                user_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS materials (
                position INTEGER PRIMARY KEY,
                material_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                sequence INTEGER PRIMARY KEY,
                id TEXT NOT NULL,
                task_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS session_slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn save_users(&self, tx: &Transaction, users: &[User]) -> PersistenceResult<()> {
        tx.execute("DELETE FROM users", [])?;
        let mut stmt = tx.prepare("INSERT INTO users (position, id, user_json) VALUES (?1, ?2, ?3)")?;
        for (position, user) in users.iter().enumerate() {
            let json = serde_json::to_string(user)?;
            stmt.execute(params![position as i64, user.id, json])?;
        }
        Ok(())
    }

    fn save_materials(&self, tx: &Transaction, files: &[Material]) -> PersistenceResult<()> {
        tx.execute("DELETE FROM materials", [])?;
        let mut stmt = tx.prepare("INSERT INTO materials (position, material_json) VALUES (?1, ?2)")?;
        for (position, material) in files.iter().enumerate() {
            let json = serde_json::to_string(material)?;
            stmt.execute(params![position as i64, json])?;
        }
        Ok(())
    }

    fn save_tasks(&self, tx: &Transaction, records: &[TaskRecord]) -> PersistenceResult<()> {
        tx.execute("DELETE FROM tasks", [])?;
        let mut stmt = tx.prepare("INSERT INTO tasks (sequence, id, task_json) VALUES (?1, ?2, ?3)")?;
        for record in records {
            let json = serde_json::to_string(&record.task)?;
            stmt.execute(params![record.sequence as i64, record.task.id, json])?;
        }
        Ok(())
    }

    fn load_json_column<T>(conn: &Connection, sql: &str) -> PersistenceResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut items = Vec::new();
        for json in rows {
            items.push(serde_json::from_str(&json?)?);
        }
        Ok(items)
    }
}

impl StoreBackend for SqliteStore {
    fn save_store(&self, store: &DataStore) -> PersistenceResult<()> {
        let mut conn = self.connection.lock();
        let tx = conn.transaction()?;
        self.save_users(&tx, store.users())?;
        self.save_materials(&tx, store.files())?;
        self.save_tasks(&tx, store.task_records())?;
        tx.commit()?;
        Ok(())
    }

    fn load_store(&self) -> PersistenceResult<Option<DataStore>> {
        let conn = self.connection.lock();

        let users: Vec<User> =
            Self::load_json_column(&conn, "SELECT user_json FROM users ORDER BY position ASC")?;
        if users.is_empty() {
            return Ok(None);
        }
        let files: Vec<Material> = Self::load_json_column(
            &conn,
            "SELECT material_json FROM materials ORDER BY position ASC",
        )?;

        let mut stmt = conn.prepare("SELECT sequence, task_json FROM tasks ORDER BY sequence ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut tasks = Vec::new();
        for row in rows {
            let (sequence, json) = row?;
            let task: Task = serde_json::from_str(&json)?;
            tasks.push(TaskRecord {
                sequence: sequence as u64,
                task,
            });
        }

        Ok(Some(DataStore::from_parts(users, files, tasks)?))
    }
}

impl SessionStorage for SqliteStore {
    fn read_slot(&self, key: &str) -> PersistenceResult<Option<String>> {
        let conn = self.connection.lock();
        let value = conn
            .query_row(
                "SELECT value FROM session_slots WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_slot(&self, key: &str, value: &str) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO session_slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_slot(&self, key: &str) -> PersistenceResult<()> {
        let conn = self.connection.lock();
        conn.execute("DELETE FROM session_slots WHERE key = ?1", params![key])?;
        Ok(())
    }
}
