//! Client-side vault: plaintext records in, ciphertext rows in the local cache.

use crate::crypto::{
    decrypt_field, decrypt_field_to_string, derive_field_key, encrypt_field, hash_password,
    verify_password, FieldKey, KdfParams,
};
use crate::models::{
    BinaryRecord, Card, LoginPwd, RecordKey, RecordKind, SecretRecord, TextRecord, Timestamp,
};
use crate::store::{LocalCache, RecordStore, StoreError};
use crate::{Result, SealboxError};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The authenticated user and their field key.
///
/// Passed explicitly to every operation that reads or writes records.
#[derive(Debug)]
pub struct Session {
    login: String,
    key: FieldKey,
}

impl Session {
    pub fn new(login: impl Into<String>, key: FieldKey) -> Self {
        Self {
            login: login.into(),
            key,
        }
    }

    /// Derive the field key from the account credentials.
    pub fn derive(login: &str, password: &str, params: &KdfParams) -> Result<Self> {
        let key = derive_field_key(login, password.as_bytes(), params)?;
        Ok(Self::new(login, key))
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn key(&self) -> &FieldKey {
        &self.key
    }

    pub fn seal(&self, plaintext: &str) -> Result<Vec<u8>> {
        Ok(encrypt_field(&self.key, plaintext.as_bytes())?)
    }

    pub fn open(&self, ciphertext: &[u8]) -> Result<String> {
        Ok(decrypt_field_to_string(&self.key, ciphertext)?)
    }

    /// Encrypt a plaintext key tuple for `kind`.
    pub fn record_key(&self, kind: RecordKind, parts: &[&str]) -> Result<RecordKey> {
        let expected = match kind {
            RecordKind::Login => 2,
            RecordKind::Card | RecordKind::Text | RecordKind::Binary => 1,
        };
        if parts.len() != expected {
            return Err(SealboxError::InvalidInput(format!(
                "A {} key has {} part(s), got {}",
                kind,
                expected,
                parts.len()
            )));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(SealboxError::InvalidInput(format!("Empty {} key", kind)));
        }

        let sealed = parts
            .iter()
            .map(|p| self.seal(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(RecordKey(sealed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct CardData {
    pub number: String,
    pub date: String,
    pub code: String,
    pub prompt: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct LoginData {
    pub prompt: String,
    pub login: String,
    pub password: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TextData {
    pub prompt: String,
    pub text: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct BinaryData {
    pub prompt: String,
    pub bytes: Vec<u8>,
    pub note: String,
}

/// Local record operations for one session.
///
/// Writes go to the cache only; they reach the server on the next sync.
pub struct Vault {
    cache: LocalCache,
    session: Session,
}

impl Vault {
    pub fn new(cache: LocalCache, session: Session) -> Self {
        Self { cache, session }
    }

    /// Record a freshly authenticated account locally.
    ///
    /// Stores a password hash for offline unlock; an existing row keeps its
    /// `last_sync`.
    pub fn enroll(
        cache: LocalCache,
        login: &str,
        password: &str,
        params: &KdfParams,
    ) -> Result<Self> {
        if password.is_empty() {
            return Err(SealboxError::InvalidInput("Password must not be empty".to_string()));
        }
        let hash = hash_password(password.as_bytes(), params)?;
        cache.upsert_user(login, &hash)?;
        let session = Session::derive(login, password, params)?;
        Ok(Self::new(cache, session))
    }

    /// Unlock against the local account row, without the server.
    pub fn unlock(
        cache: LocalCache,
        login: &str,
        password: &str,
        params: &KdfParams,
    ) -> Result<Self> {
        let user = match cache.user(login) {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                return Err(SealboxError::Auth(format!(
                    "No local account for {}; log in first",
                    login
                )))
            }
            Err(e) => return Err(e.into()),
        };
        if !verify_password(password.as_bytes(), &user.password_hash)? {
            tracing::warn!(login, "Local unlock rejected");
            return Err(SealboxError::Auth("Invalid login or password".to_string()));
        }
        let session = Session::derive(login, password, params)?;
        Ok(Self::new(cache, session))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn login(&self) -> &str {
        self.session.login()
    }

    /// Add or update a card. The stored copy wins if it is newer.
    pub fn add_card(&self, data: &CardData) -> Result<()> {
        require("card number", &data.number)?;
        let s = &self.session;
        let record = Card {
            number: s.seal(&data.number)?,
            date: s.seal(&data.date)?,
            code: s.seal(&data.code)?,
            prompt: s.seal(&data.prompt)?,
            note: s.seal(&data.note)?,
            timestamp: Timestamp::now().to_string(),
        };
        self.store(&record)
    }

    pub fn add_login(&self, data: &LoginData) -> Result<()> {
        require("prompt", &data.prompt)?;
        require("login", &data.login)?;
        let s = &self.session;
        let record = LoginPwd {
            prompt: s.seal(&data.prompt)?,
            login: s.seal(&data.login)?,
            password: s.seal(&data.password)?,
            note: s.seal(&data.note)?,
            timestamp: Timestamp::now().to_string(),
        };
        self.store(&record)
    }

    pub fn add_text(&self, data: &TextData) -> Result<()> {
        require("prompt", &data.prompt)?;
        let s = &self.session;
        let record = TextRecord {
            prompt: s.seal(&data.prompt)?,
            text: s.seal(&data.text)?,
            note: s.seal(&data.note)?,
            timestamp: Timestamp::now().to_string(),
        };
        self.store(&record)
    }

    pub fn add_binary(&self, data: &BinaryData) -> Result<()> {
        require("prompt", &data.prompt)?;
        let s = &self.session;
        let record = BinaryRecord {
            prompt: s.seal(&data.prompt)?,
            bytes: encrypt_field(s.key(), &data.bytes)?,
            note: s.seal(&data.note)?,
            timestamp: Timestamp::now().to_string(),
        };
        self.store(&record)
    }

    pub fn card(&self, number: &str) -> Result<CardData> {
        let record: Card = self.fetch(RecordKind::Card, &[number])?;
        self.open_card(&record)
    }

    pub fn login_pwd(&self, prompt: &str, login: &str) -> Result<LoginData> {
        let record: LoginPwd = self.fetch(RecordKind::Login, &[prompt, login])?;
        self.open_login(&record)
    }

    pub fn text(&self, prompt: &str) -> Result<TextData> {
        let record: TextRecord = self.fetch(RecordKind::Text, &[prompt])?;
        self.open_text(&record)
    }

    pub fn binary(&self, prompt: &str) -> Result<BinaryData> {
        let record: BinaryRecord = self.fetch(RecordKind::Binary, &[prompt])?;
        self.open_binary(&record)
    }

    pub fn cards(&self) -> Result<Vec<CardData>> {
        self.all::<Card>()?
            .iter()
            .map(|r| self.open_card(r))
            .collect()
    }

    pub fn logins(&self) -> Result<Vec<LoginData>> {
        self.all::<LoginPwd>()?
            .iter()
            .map(|r| self.open_login(r))
            .collect()
    }

    pub fn texts(&self) -> Result<Vec<TextData>> {
        self.all::<TextRecord>()?
            .iter()
            .map(|r| self.open_text(r))
            .collect()
    }

    pub fn binaries(&self) -> Result<Vec<BinaryData>> {
        self.all::<BinaryRecord>()?
            .iter()
            .map(|r| self.open_binary(r))
            .collect()
    }

    fn store<R: SecretRecord>(&self, record: &R) -> Result<()> {
        self.cache.add(self.login(), record)?;
        tracing::debug!(kind = %R::KIND, "Stored record locally");
        Ok(())
    }

    fn fetch<R: SecretRecord>(&self, kind: RecordKind, parts: &[&str]) -> Result<R> {
        let key = self.session.record_key(kind, parts)?;
        Ok(self.cache.get(self.login(), &key)?)
    }

    fn all<R: SecretRecord>(&self) -> Result<Vec<R>> {
        Ok(self
            .cache
            .get_all_after(self.login(), &Timestamp::beginning_of_time())?)
    }

    fn open_card(&self, r: &Card) -> Result<CardData> {
        let s = &self.session;
        Ok(CardData {
            number: s.open(&r.number)?,
            date: s.open(&r.date)?,
            code: s.open(&r.code)?,
            prompt: s.open(&r.prompt)?,
            note: s.open(&r.note)?,
        })
    }

    fn open_login(&self, r: &LoginPwd) -> Result<LoginData> {
        let s = &self.session;
        Ok(LoginData {
            prompt: s.open(&r.prompt)?,
            login: s.open(&r.login)?,
            password: s.open(&r.password)?,
            note: s.open(&r.note)?,
        })
    }

    fn open_text(&self, r: &TextRecord) -> Result<TextData> {
        let s = &self.session;
        Ok(TextData {
            prompt: s.open(&r.prompt)?,
            text: s.open(&r.text)?,
            note: s.open(&r.note)?,
        })
    }

    fn open_binary(&self, r: &BinaryRecord) -> Result<BinaryData> {
        let s = &self.session;
        Ok(BinaryData {
            prompt: s.open(&r.prompt)?,
            bytes: decrypt_field(s.key(), &r.bytes)?,
            note: s.open(&r.note)?,
        })
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(SealboxError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cheap() -> KdfParams {
        KdfParams {
            mem_cost: 8_192,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn vault() -> Vault {
        let cache = LocalCache::in_memory().unwrap();
        cache.upsert_user("alice", "$argon2id$stub").unwrap();
        Vault::new(cache, Session::new("alice", FieldKey::from_bytes([7u8; 32])))
    }

    fn visa() -> CardData {
        CardData {
            number: "4111111111111111".to_string(),
            date: "12/29".to_string(),
            code: "123".to_string(),
            prompt: "visa".to_string(),
            note: String::new(),
        }
    }

    #[test]
    fn card_roundtrip_by_plaintext_key() {
        let vault = vault();
        vault.add_card(&visa()).unwrap();
        assert_eq!(vault.card("4111111111111111").unwrap(), visa());
    }

    #[test]
    fn stored_fields_are_ciphertext() {
        let vault = vault();
        vault.add_card(&visa()).unwrap();

        let key = vault
            .session()
            .record_key(RecordKind::Card, &["4111111111111111"])
            .unwrap();
        let raw: Card = vault.cache().get("alice", &key).unwrap();
        assert_ne!(raw.number, b"4111111111111111".to_vec());
        assert_ne!(raw.code, b"123".to_vec());
    }

    #[test]
    fn login_uses_two_part_key() {
        let vault = vault();
        let data = LoginData {
            prompt: "mail".to_string(),
            login: "alice@example.org".to_string(),
            password: "s3cret".to_string(),
            note: "work".to_string(),
        };
        vault.add_login(&data).unwrap();

        assert_eq!(vault.login_pwd("mail", "alice@example.org").unwrap(), data);
        assert!(vault.login_pwd("mail", "bob@example.org").unwrap_err().is_not_found());
    }

    #[test]
    fn update_replaces_previous_version() {
        let vault = vault();
        let mut data = TextData {
            prompt: "wifi".to_string(),
            text: "old".to_string(),
            note: String::new(),
        };
        vault.add_text(&data).unwrap();
        data.text = "new".to_string();
        vault.add_text(&data).unwrap();

        assert_eq!(vault.text("wifi").unwrap().text, "new");
        assert_eq!(vault.texts().unwrap().len(), 1);
    }

    #[test]
    fn binary_roundtrip() {
        let vault = vault();
        let data = BinaryData {
            prompt: "key.pem".to_string(),
            bytes: vec![0, 159, 146, 150, 255],
            note: String::new(),
        };
        vault.add_binary(&data).unwrap();
        assert_eq!(vault.binary("key.pem").unwrap(), data);
        assert_eq!(vault.binaries().unwrap(), vec![data]);
    }

    #[test]
    fn listings_cover_every_record() {
        let vault = vault();
        vault.add_card(&visa()).unwrap();
        let mut other = visa();
        other.number = "5500000000000004".to_string();
        vault.add_card(&other).unwrap();

        let mut numbers: Vec<String> = vault
            .cards()
            .unwrap()
            .iter()
            .map(|c| c.number.clone())
            .collect();
        numbers.sort();
        assert_eq!(numbers, vec!["4111111111111111", "5500000000000004"]);
        assert!(vault.logins().unwrap().is_empty());
    }

    #[test]
    fn empty_key_rejected() {
        let vault = vault();
        let mut data = visa();
        data.number.clear();
        assert!(matches!(
            vault.add_card(&data),
            Err(SealboxError::InvalidInput(_))
        ));
        assert!(matches!(
            vault.session().record_key(RecordKind::Login, &["only-prompt"]),
            Err(SealboxError::InvalidInput(_))
        ));
    }

    #[test]
    fn other_key_cannot_read() {
        let vault = vault();
        vault.add_card(&visa()).unwrap();

        let intruder = Vault::new(
            vault.cache().clone(),
            Session::new("alice", FieldKey::from_bytes([8u8; 32])),
        );
        assert!(intruder.card("4111111111111111").unwrap_err().is_not_found());
    }

    #[test]
    fn enroll_then_unlock() {
        let cache = LocalCache::in_memory().unwrap();
        let enrolled = Vault::enroll(cache.clone(), "alice", "correct horse", &cheap()).unwrap();
        enrolled.add_text(&TextData {
            prompt: "p".to_string(),
            text: "t".to_string(),
            note: String::new(),
        })
        .unwrap();

        let unlocked = Vault::unlock(cache.clone(), "alice", "correct horse", &cheap()).unwrap();
        assert_eq!(unlocked.text("p").unwrap().text, "t");

        assert!(matches!(
            Vault::unlock(cache.clone(), "alice", "wrong", &cheap()),
            Err(SealboxError::Auth(_))
        ));
        assert!(matches!(
            Vault::unlock(cache, "bob", "correct horse", &cheap()),
            Err(SealboxError::Auth(_))
        ));
    }
}
