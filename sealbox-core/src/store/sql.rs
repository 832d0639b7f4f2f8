//! Statements shared by both stores.
//!
//! Table and column names come from `SecretRecord` constants, never from
//! input, so building SQL with `format!` is safe here. Everything else is a
//! bound parameter.
//!
//! `timestamp` holds the text exactly as the client sent it; `sort_ts` holds
//! its canonical fixed-width form and is the only column compared.

use crate::models::{RecordKey, SecretRecord, Timestamp, TimestampError};
use crate::store::{StoreError, StoreResult};
use rusqlite::{Connection, ToSql};

/// Record tables, identical in both stores.
pub(crate) const RECORD_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS cards (
        user_login TEXT NOT NULL REFERENCES users(login) ON DELETE CASCADE,
        number BLOB NOT NULL,
        date BLOB NOT NULL,
        code BLOB NOT NULL,
        prompt BLOB NOT NULL,
        note BLOB NOT NULL,
        timestamp TEXT NOT NULL,
        sort_ts TEXT NOT NULL,
        PRIMARY KEY (user_login, number)
    );

    CREATE TABLE IF NOT EXISTS logins (
        user_login TEXT NOT NULL REFERENCES users(login) ON DELETE CASCADE,
        prompt BLOB NOT NULL,
        login BLOB NOT NULL,
        password BLOB NOT NULL,
        note BLOB NOT NULL,
        timestamp TEXT NOT NULL,
        sort_ts TEXT NOT NULL,
        PRIMARY KEY (user_login, prompt, login)
    );

    CREATE TABLE IF NOT EXISTS texts (
        user_login TEXT NOT NULL REFERENCES users(login) ON DELETE CASCADE,
        prompt BLOB NOT NULL,
        text BLOB NOT NULL,
        note BLOB NOT NULL,
        timestamp TEXT NOT NULL,
        sort_ts TEXT NOT NULL,
        PRIMARY KEY (user_login, prompt)
    );

    CREATE TABLE IF NOT EXISTS binaries (
        user_login TEXT NOT NULL REFERENCES users(login) ON DELETE CASCADE,
        prompt BLOB NOT NULL,
        bytes BLOB NOT NULL,
        note BLOB NOT NULL,
        timestamp TEXT NOT NULL,
        sort_ts TEXT NOT NULL,
        PRIMARY KEY (user_login, prompt)
    );

    CREATE INDEX IF NOT EXISTS idx_cards_user_ts ON cards(user_login, sort_ts);
    CREATE INDEX IF NOT EXISTS idx_logins_user_ts ON logins(user_login, sort_ts);
    CREATE INDEX IF NOT EXISTS idx_texts_user_ts ON texts(user_login, sort_ts);
    CREATE INDEX IF NOT EXISTS idx_binaries_user_ts ON binaries(user_login, sort_ts);";

/// How an upsert treats an existing row with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    /// Overwrite only when the incoming timestamp is not older.
    NewerWins,
    /// Always overwrite.
    Unconditional,
}

/// Check required fields and return the parsed timestamp.
///
/// A timestamp at or before [`Timestamp::beginning_of_time`] is rejected, so
/// that bound always lists every stored record.
pub(crate) fn validate<R: SecretRecord>(user: &str, record: &R) -> StoreResult<Timestamp> {
    if user.is_empty() {
        return Err(StoreError::NullValues("user".to_string()));
    }

    let key = record.key();
    let columns = R::KEY_COLUMNS
        .iter()
        .zip(key.parts().iter().map(Vec::as_slice))
        .chain(R::VALUE_COLUMNS.iter().zip(record.values()));
    for (name, value) in columns {
        if value.is_empty() {
            return Err(StoreError::NullValues(format!("{}.{}", R::KIND.table(), name)));
        }
    }

    if record.timestamp().is_empty() {
        return Err(StoreError::NullValues(format!("{}.timestamp", R::KIND.table())));
    }
    let timestamp = Timestamp::parse(record.timestamp())?;
    if timestamp <= Timestamp::beginning_of_time() {
        return Err(TimestampError {
            value: record.timestamp().to_string(),
            reason: "must be after 0001-01-01T00:00:00Z".to_string(),
        }
        .into());
    }
    Ok(timestamp)
}

/// Insert-or-update in one statement.
///
/// With [`Upsert::NewerWins`] a zero row count means the stored row is
/// strictly newer.
pub(crate) fn upsert<R: SecretRecord>(
    conn: &Connection,
    user: &str,
    record: &R,
    mode: Upsert,
) -> StoreResult<()> {
    let sort_ts = validate(user, record)?.to_string();
    let timestamp = record.timestamp();
    let table = R::KIND.table();

    let all_columns: Vec<&str> = R::KEY_COLUMNS
        .iter()
        .chain(R::VALUE_COLUMNS)
        .copied()
        .collect();
    let placeholders = vec!["?"; all_columns.len() + 3].join(", ");
    let updates: Vec<String> = R::VALUE_COLUMNS
        .iter()
        .chain(["timestamp", "sort_ts"].iter())
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    let guard = match mode {
        Upsert::NewerWins => format!(" WHERE excluded.sort_ts >= {table}.sort_ts"),
        Upsert::Unconditional => String::new(),
    };

    let sql = format!(
        "INSERT INTO {table} (user_login, {columns}, timestamp, sort_ts) VALUES ({placeholders})
         ON CONFLICT(user_login, {keys}) DO UPDATE SET {updates}{guard}",
        columns = all_columns.join(", "),
        keys = R::KEY_COLUMNS.join(", "),
        updates = updates.join(", "),
    );

    let key = record.key();
    let mut params: Vec<&dyn ToSql> = vec![&user];
    for part in key.parts() {
        params.push(part);
    }
    let values = record.values();
    for value in &values {
        params.push(value);
    }
    params.push(&timestamp);
    params.push(&sort_ts);

    match conn.execute(&sql, params.as_slice())? {
        1 => Ok(()),
        0 if mode == Upsert::NewerWins => Err(StoreError::ExistsDataNewerVersion),
        n => Err(StoreError::Consistency(format!(
            "upsert into {table} affected {n} rows"
        ))),
    }
}

/// Overwrite the non-key fields of an existing row.
pub(crate) fn force_update<R: SecretRecord>(
    conn: &Connection,
    user: &str,
    record: &R,
) -> StoreResult<()> {
    let sort_ts = validate(user, record)?.to_string();
    let timestamp = record.timestamp();
    let table = R::KIND.table();

    let sets: Vec<String> = R::VALUE_COLUMNS
        .iter()
        .chain(["timestamp", "sort_ts"].iter())
        .map(|c| format!("{c} = ?"))
        .collect();
    let sql = format!(
        "UPDATE {table} SET {sets} WHERE user_login = ? AND {predicate}",
        sets = sets.join(", "),
        predicate = key_predicate::<R>(),
    );

    let values = record.values();
    let key = record.key();
    let mut params: Vec<&dyn ToSql> = Vec::new();
    for value in &values {
        params.push(value);
    }
    params.push(&timestamp);
    params.push(&sort_ts);
    params.push(&user);
    for part in key.parts() {
        params.push(part);
    }

    match conn.execute(&sql, params.as_slice())? {
        1 => Ok(()),
        0 => Err(StoreError::NotFound(format!("{} {}", R::KIND, key))),
        n => Err(StoreError::Consistency(format!(
            "force update of {table} affected {n} rows"
        ))),
    }
}

pub(crate) fn select_one<R: SecretRecord>(
    conn: &Connection,
    user: &str,
    key: &RecordKey,
) -> StoreResult<R> {
    if key.parts().len() != R::KEY_COLUMNS.len() || key.parts().iter().any(Vec::is_empty) {
        return Err(StoreError::NullValues(format!("{} key", R::KIND.table())));
    }

    let sql = format!(
        "SELECT {columns} FROM {table} WHERE user_login = ? AND {predicate}",
        columns = select_columns::<R>(),
        table = R::KIND.table(),
        predicate = key_predicate::<R>(),
    );

    let mut params: Vec<&dyn ToSql> = vec![&user];
    for part in key.parts() {
        params.push(part);
    }

    match conn.query_row(&sql, params.as_slice(), read_row::<R>) {
        Ok(record) => Ok(record),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            Err(StoreError::NotFound(format!("{} {}", R::KIND, key)))
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn select_after<R: SecretRecord>(
    conn: &Connection,
    user: &str,
    after: &Timestamp,
) -> StoreResult<Vec<R>> {
    let sql = format!(
        "SELECT {columns} FROM {table} WHERE user_login = ?1 AND sort_ts > ?2",
        columns = select_columns::<R>(),
        table = R::KIND.table(),
    );

    let mut stmt = conn.prepare(&sql)?;
    let records = stmt
        .query_map(rusqlite::params![user, after.to_string()], read_row::<R>)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn select_columns<R: SecretRecord>() -> String {
    R::KEY_COLUMNS
        .iter()
        .chain(R::VALUE_COLUMNS)
        .chain(["timestamp"].iter())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

fn key_predicate<R: SecretRecord>() -> String {
    R::KEY_COLUMNS
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn read_row<R: SecretRecord>(row: &rusqlite::Row<'_>) -> rusqlite::Result<R> {
    let width = R::KEY_COLUMNS.len() + R::VALUE_COLUMNS.len();
    let mut columns = Vec::with_capacity(width);
    for idx in 0..width {
        columns.push(row.get::<_, Vec<u8>>(idx)?);
    }
    let timestamp: String = row.get(width)?;
    Ok(R::from_columns(columns, timestamp))
}
