//! Secret record types shared by both stores and the sync wire format.
//!
//! Every field except `timestamp` is FieldCodec ciphertext. Timestamps travel
//! as text and are only parsed when a store accepts a write, so one bad
//! timestamp in a sync batch fails that record alone. Stores keep the text
//! exactly as sent and order rows by its canonical form.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical timestamp format (fixed width, UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Accepted input: UTC with a literal `Z`, whole seconds or any fraction.
const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// A UTC instant with microsecond precision.
///
/// Its canonical text form is fixed width, so string order in SQL equals
/// chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// A bound earlier than any record: `0001-01-01T00:00:00.000000Z`.
    pub fn beginning_of_time() -> Self {
        let start = NaiveDate::from_ymd_opt(1, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self(start)
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let micros = dt.timestamp_micros();
        Self(DateTime::from_timestamp_micros(micros).unwrap_or(dt))
    }

    /// Parse `YYYY-MM-DDTHH:MM:SS[.fraction]Z`. Offsets other than `Z` are
    /// rejected; precision beyond microseconds is truncated.
    pub fn parse(s: &str) -> Result<Self, TimestampError> {
        NaiveDateTime::parse_from_str(s, INPUT_FORMAT)
            .map(|naive| Self::from_datetime(naive.and_utc()))
            .map_err(|e| TimestampError {
                value: s.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A timestamp string outside the accepted UTC format.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed timestamp {value:?}: {reason}")]
pub struct TimestampError {
    pub value: String,
    pub reason: String,
}

/// Discriminator for the four record variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Card,
    Login,
    Text,
    Binary,
}

impl RecordKind {
    pub const ALL: [RecordKind; 4] = [Self::Card, Self::Login, Self::Text, Self::Binary];

    /// Tag used in logs and sync error entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Login => "login",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }

    /// Table name in both stores; also the RPC path segment.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Card => "cards",
            Self::Login => "logins",
            Self::Text => "texts",
            Self::Binary => "binaries",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" | "cards" => Some(Self::Card),
            "login" | "logins" => Some(Self::Login),
            "text" | "texts" => Some(Self::Text),
            "binary" | "binaries" => Some(Self::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The encrypted key tuple of a record, in key-column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey(#[serde(with = "base64_list")] pub Vec<Vec<u8>>);

impl RecordKey {
    pub fn single(part: Vec<u8>) -> Self {
        Self(vec![part])
    }

    pub fn parts(&self) -> &[Vec<u8>] {
        &self.0
    }
}

/// Base64 parts joined with `:`.
impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let parts: Vec<String> = self.0.iter().map(|p| STANDARD.encode(p)).collect();
        f.write_str(&parts.join(":"))
    }
}

/// A record variant that can be stored, queried and synced.
///
/// Column lists drive the generic SQL in the store layer: a row is
/// `KEY_COLUMNS ++ VALUE_COLUMNS ++ timestamp`.
pub trait SecretRecord:
    Clone + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    const KIND: RecordKind;
    const KEY_COLUMNS: &'static [&'static str];
    const VALUE_COLUMNS: &'static [&'static str];

    fn key(&self) -> RecordKey;

    /// Non-key encrypted fields, in `VALUE_COLUMNS` order.
    fn values(&self) -> Vec<&[u8]>;

    fn timestamp(&self) -> &str;

    /// Rebuild from `KEY_COLUMNS ++ VALUE_COLUMNS` in order.
    fn from_columns(columns: Vec<Vec<u8>>, timestamp: String) -> Self;
}

/// Payment card. Unique per user by `number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    #[serde(with = "base64_bytes")]
    pub number: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub date: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub code: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub prompt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub note: Vec<u8>,
    pub timestamp: String,
}

/// Login/password pair. Unique per user by `(prompt, login)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginPwd {
    #[serde(with = "base64_bytes")]
    pub prompt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub login: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub password: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub note: Vec<u8>,
    pub timestamp: String,
}

/// Free text. Unique per user by `prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRecord {
    #[serde(with = "base64_bytes")]
    pub prompt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub text: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub note: Vec<u8>,
    pub timestamp: String,
}

/// Binary blob. Unique per user by `prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryRecord {
    #[serde(with = "base64_bytes")]
    pub prompt: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub note: Vec<u8>,
    pub timestamp: String,
}

impl SecretRecord for Card {
    const KIND: RecordKind = RecordKind::Card;
    const KEY_COLUMNS: &'static [&'static str] = &["number"];
    const VALUE_COLUMNS: &'static [&'static str] = &["date", "code", "prompt", "note"];

    fn key(&self) -> RecordKey {
        RecordKey::single(self.number.clone())
    }

    fn values(&self) -> Vec<&[u8]> {
        vec![&self.date, &self.code, &self.prompt, &self.note]
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn from_columns(columns: Vec<Vec<u8>>, timestamp: String) -> Self {
        let mut it = columns.into_iter();
        let mut next = move || it.next().unwrap_or_default();
        Self {
            number: next(),
            date: next(),
            code: next(),
            prompt: next(),
            note: next(),
            timestamp,
        }
    }
}

impl SecretRecord for LoginPwd {
    const KIND: RecordKind = RecordKind::Login;
    const KEY_COLUMNS: &'static [&'static str] = &["prompt", "login"];
    const VALUE_COLUMNS: &'static [&'static str] = &["password", "note"];

    fn key(&self) -> RecordKey {
        RecordKey(vec![self.prompt.clone(), self.login.clone()])
    }

    fn values(&self) -> Vec<&[u8]> {
        vec![&self.password, &self.note]
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn from_columns(columns: Vec<Vec<u8>>, timestamp: String) -> Self {
        let mut it = columns.into_iter();
        let mut next = move || it.next().unwrap_or_default();
        Self {
            prompt: next(),
            login: next(),
            password: next(),
            note: next(),
            timestamp,
        }
    }
}

impl SecretRecord for TextRecord {
    const KIND: RecordKind = RecordKind::Text;
    const KEY_COLUMNS: &'static [&'static str] = &["prompt"];
    const VALUE_COLUMNS: &'static [&'static str] = &["text", "note"];

    fn key(&self) -> RecordKey {
        RecordKey::single(self.prompt.clone())
    }

    fn values(&self) -> Vec<&[u8]> {
        vec![&self.text, &self.note]
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn from_columns(columns: Vec<Vec<u8>>, timestamp: String) -> Self {
        let mut it = columns.into_iter();
        let mut next = move || it.next().unwrap_or_default();
        Self {
            prompt: next(),
            text: next(),
            note: next(),
            timestamp,
        }
    }
}

impl SecretRecord for BinaryRecord {
    const KIND: RecordKind = RecordKind::Binary;
    const KEY_COLUMNS: &'static [&'static str] = &["prompt"];
    const VALUE_COLUMNS: &'static [&'static str] = &["bytes", "note"];

    fn key(&self) -> RecordKey {
        RecordKey::single(self.prompt.clone())
    }

    fn values(&self) -> Vec<&[u8]> {
        vec![&self.bytes, &self.note]
    }

    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn from_columns(columns: Vec<Vec<u8>>, timestamp: String) -> Self {
        let mut it = columns.into_iter();
        let mut next = move || it.next().unwrap_or_default();
        Self {
            prompt: next(),
            bytes: next(),
            note: next(),
            timestamp,
        }
    }
}

/// Custom base64 serialization for `Vec<u8>`.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

mod base64_list {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(parts: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(parts.iter().map(|p| STANDARD.encode(p)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(d)?;
        encoded
            .iter()
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .collect()
    }
}
