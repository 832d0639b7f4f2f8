//! SQLite backend for the on-device cache.

use crate::models::{BinaryRecord, Card, LoginPwd, RecordKey, SecretRecord, TextRecord, Timestamp};
use crate::store::sql::{self, Upsert, RECORD_TABLES};
use crate::store::{RecordStore, StoreError, StoreResult, UserAccount};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Local record cache plus the per-user sync high-water mark.
#[derive(Clone)]
pub struct LocalCache {
    conn: Arc<Mutex<Connection>>,
}

impl LocalCache {
    /// Open (or create) a cache file
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Self::with_connection(conn)
    }

    /// Create a new in-memory cache for testing
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        let cache = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                login TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL,
                last_sync TEXT NOT NULL
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

    /// Create the local account row, or refresh its credential.
    ///
    /// A new row starts with `last_sync` at the beginning of time; an
    /// existing row keeps its high-water mark.
    pub fn upsert_user(&self, login: &str, password_hash: &str) -> StoreResult<()> {
        if login.is_empty() {
            return Err(StoreError::NullValues("login".to_string()));
        }
        if password_hash.is_empty() {
            return Err(StoreError::NullValues("password_hash".to_string()));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (login, password_hash, last_sync) VALUES (?1, ?2, ?3)
             ON CONFLICT(login) DO UPDATE SET password_hash = excluded.password_hash",
            rusqlite::params![
                login,
                password_hash,
                Timestamp::beginning_of_time().to_string()
            ],
        )?;
        Ok(())
    }

    pub fn user(&self, login: &str) -> StoreResult<UserAccount> {
        let conn = self.conn()?;
        let result = conn.query_row(
            "SELECT login, password_hash, last_sync FROM users WHERE login = ?1",
            [login],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        );

        match result {
            Ok((login, password_hash, last_sync)) => Ok(UserAccount {
                login,
                password_hash,
                last_sync: Some(Timestamp::parse(&last_sync)?),
            }),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::NotFound(format!("user {}", login)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The high-water mark of the last completed sync.
    pub fn last_sync(&self, login: &str) -> StoreResult<Timestamp> {
        let user = self.user(login)?;
        Ok(user.last_sync.unwrap_or_else(Timestamp::beginning_of_time))
    }

    /// Advance `last_sync`. Never moves it backwards; an older value is a no-op.
    pub fn set_last_sync(&self, login: &str, at: &Timestamp) -> StoreResult<()> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE login = ?1)",
            [login],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound(format!("user {}", login)));
        }

        conn.execute(
            "UPDATE users SET last_sync = ?1 WHERE login = ?2 AND last_sync < ?1",
            rusqlite::params![at.to_string(), login],
        )?;
        Ok(())
    }

    /// Write a remote delta in one transaction.
    ///
    /// Rows are upserted unconditionally. Any failure rolls back all four
    /// lists. Returns the number of records written.
    pub fn apply_batch(
        &self,
        user: &str,
        cards: &[Card],
        logins: &[LoginPwd],
        texts: &[TextRecord],
        binaries: &[BinaryRecord],
    ) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        apply_all(&tx, user, cards)?;
        apply_all(&tx, user, logins)?;
        apply_all(&tx, user, texts)?;
        apply_all(&tx, user, binaries)?;

        tx.commit()?;
        Ok(cards.len() + logins.len() + texts.len() + binaries.len())
    }
}

fn apply_all<R: SecretRecord>(conn: &Connection, user: &str, records: &[R]) -> StoreResult<()> {
    for record in records {
        sql::upsert(conn, user, record, Upsert::Unconditional)?;
    }
    Ok(())
}

impl RecordStore for LocalCache {
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
