//! SQLite backend for the authoritative remote store.

use crate::models::{RecordKey, SecretRecord, Timestamp};
use crate::store::sql::{self, Upsert, RECORD_TABLES};
use crate::store::{RecordStore, StoreError, StoreResult, UserAccount};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Thread-safe remote store.
///
/// Cloning shares the underlying connection; request tasks hold a clone each.
#[derive(Clone)]
pub struct RemoteStore {
    conn: Arc<Mutex<Connection>>,
}

impl RemoteStore {
    pub fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                login TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )?;
        conn.execute_batch(RECORD_TABLES)?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Register a new account. Fails with [`StoreError::UserExists`] on a taken login.
    pub fn create_user(&self, login: &str, password_hash: &str) -> StoreResult<()> {
        if login.is_empty() {
            return Err(StoreError::NullValues("login".to_string()));
        }
        if password_hash.is_empty() {
            return Err(StoreError::NullValues("password_hash".to_string()));
        }

        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO users (login, password_hash, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(login) DO NOTHING",
            rusqlite::params![login, password_hash, Timestamp::now().to_string()],
        )?;

        if inserted == 0 {
            return Err(StoreError::UserExists(login.to_string()));
        }
        Ok(())
    }

    pub fn user(&self, login: &str) -> StoreResult<UserAccount> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT login, password_hash FROM users WHERE login = ?1",
            [login],
            |row| {
                Ok(UserAccount {
                    login: row.get(0)?,
                    password_hash: row.get(1)?,
                    last_sync: None,
                })
            },
        );

        match result {
            Ok(user) => Ok(user),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::NotFound(format!("user {}", login)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl RecordStore for RemoteStore {
    fn add<R: SecretRecord>(&self, user: &str, record: &R) -> StoreResult<()> {
        let conn = self.conn()?;
        sql::upsert(&conn, user, record, Upsert::NewerWins)
    }

    fn get<R: SecretRecord>(&self, user: &str, key: &RecordKey) -> StoreResult<R> {
        let conn = self.conn()?;
        sql::select_one(&conn, user, key)
    }

    fn get_all_after<R: SecretRecord>(&self, user: &str, after: &Timestamp) -> StoreResult<Vec<R>> {
        let conn = self.conn()?;
        sql::select_after(&conn, user, after)
    }

    fn force_update<R: SecretRecord>(&self, user: &str, record: &R) -> StoreResult<()> {
        let conn = self.conn()?;
        sql::force_update(&conn, user, record)
    }
}
