//! Client half of a sync exchange, plus the manual conflict overrides.

use crate::models::{
    BinaryRecord, Card, LoginPwd, RecordKey, SecretRecord, TextRecord, Timestamp,
};
use crate::store::{LocalCache, RecordStore, StoreError};
use crate::sync::protocol::{SyncReport, SyncRequest};
use crate::transport::Transport;
use crate::vault::Session;
use crate::Result;
use tracing::{info, warn};

/// Drives sync between the local cache and a transport.
///
/// Holds no state between exchanges; the high-water mark lives in the cache.
pub struct SyncCoordinator<T: Transport> {
    cache: LocalCache,
    transport: T,
}

impl<T: Transport> SyncCoordinator<T> {
    pub fn new(cache: LocalCache, transport: T) -> Self {
        Self { cache, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Run one exchange for the session's user.
    ///
    /// Per-record failures reported by the server are returned in the report
    /// and do not stop `last_sync` from advancing. Any other failure leaves
    /// the cache untouched.
    pub async fn sync(&self, session: &Session) -> Result<SyncReport> {
        let user = session.login();
        let last_sync = self.cache.last_sync(user)?;

        let request = SyncRequest {
            last_sync,
            cards: self.cache.get_all_after(user, &last_sync)?,
            logins: self.cache.get_all_after(user, &last_sync)?,
            texts: self.cache.get_all_after(user, &last_sync)?,
            binaries: self.cache.get_all_after(user, &last_sync)?,
        };
        let pushed = request.len();

        let response = self.transport.sync(&request).await?;

        let pulled = self.cache.apply_batch(
            user,
            &response.new_cards,
            &response.new_logins,
            &response.new_texts,
            &response.new_binaries,
        )?;
        let now = Timestamp::now();
        self.cache.set_last_sync(user, &now)?;

        for error in &response.sync_errors {
            warn!(tag = %error.tag, key = %error.key, "Server rejected record: {}", error.message);
        }
        info!(
            user,
            pushed,
            pulled,
            rejected = response.sync_errors.len(),
            "Sync complete"
        );

        Ok(SyncReport {
            pushed,
            pulled,
            errors: response.sync_errors,
            last_sync: now,
        })
    }

    /// Overwrite the remote copy of one record with the local one.
    pub async fn force_push<R: SecretRecord>(
        &self,
        session: &Session,
        key: &RecordKey,
    ) -> Result<()> {
        let record: R = self.cache.get(session.login(), key)?;
        self.transport.force_update(&record).await?;
        info!(kind = %R::KIND, key = %key, "Forced local record onto server");
        Ok(())
    }

    /// Overwrite the local copy of one record with the remote one.
    ///
    /// Creates the local row when it does not exist yet.
    pub async fn force_pull<R: SecretRecord>(
        &self,
        session: &Session,
        key: &RecordKey,
    ) -> Result<R> {
        let record: R = self.transport.get(key).await?;
        let user = session.login();
        match self.cache.force_update(user, &record) {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => self.cache.add(user, &record)?,
            Err(e) => return Err(e.into()),
        }
        info!(kind = %R::KIND, key = %key, "Forced server record into local cache");
        Ok(record)
    }

    /// Push one local record through the normal conflict check.
    pub async fn push_one<R: SecretRecord>(
        &self,
        session: &Session,
        key: &RecordKey,
    ) -> Result<()> {
        let record: R = self.cache.get(session.login(), key)?;
        self.transport.add(&record).await
    }
}

/// Local delta sizes, for status output.
pub fn pending_changes(cache: &LocalCache, user: &str) -> Result<usize> {
    let since = cache.last_sync(user)?;
    let cards: Vec<Card> = cache.get_all_after(user, &since)?;
    let logins: Vec<LoginPwd> = cache.get_all_after(user, &since)?;
    let texts: Vec<TextRecord> = cache.get_all_after(user, &since)?;
    let binaries: Vec<BinaryRecord> = cache.get_all_after(user, &since)?;
    Ok(cards.len() + logins.len() + texts.len() + binaries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::FieldKey;
    use crate::store::RemoteStore;
    use crate::transport::DirectTransport;

    fn ts(s: &str) -> String {
        Timestamp::parse(s).unwrap().to_string()
    }

    fn text(prompt: &str, body: &str, timestamp: &str) -> TextRecord {
        TextRecord {
            prompt: prompt.as_bytes().to_vec(),
            text: body.as_bytes().to_vec(),
            note: b"-".to_vec(),
            timestamp: ts(timestamp),
        }
    }

    fn setup() -> (SyncCoordinator<DirectTransport>, RemoteStore, Session) {
        let remote = RemoteStore::in_memory().unwrap();
        remote.create_user("alice", "$argon2id$stub").unwrap();
        let cache = LocalCache::in_memory().unwrap();
        cache.upsert_user("alice", "$argon2id$stub").unwrap();
        let session = Session::new("alice", FieldKey::from_bytes([1u8; 32]));
        let coordinator = SyncCoordinator::new(cache, DirectTransport::new(remote.clone(), "alice"));
        (coordinator, remote, session)
    }

    #[tokio::test]
    async fn sync_exchanges_both_deltas() {
        let (coordinator, remote, session) = setup();
        let local = text("local", "l", "2024-01-01T00:00:00Z");
        let server = text("server", "s", "2024-01-02T00:00:00Z");
        coordinator.cache().add("alice", &local).unwrap();
        remote.add("alice", &server).unwrap();

        let report = coordinator.sync(&session).await.unwrap();
        assert_eq!(report.pushed, 1);
        assert_eq!(report.pulled, 1);
        assert!(report.errors.is_empty());

        let pulled: TextRecord = coordinator.cache().get("alice", &server.key()).unwrap();
        assert_eq!(pulled, server);
        let pushed: TextRecord = remote.get("alice", &local.key()).unwrap();
        assert_eq!(pushed, local);
        assert_eq!(coordinator.cache().last_sync("alice").unwrap(), report.last_sync);
    }

    #[tokio::test]
    async fn second_sync_is_empty() {
        let (coordinator, _remote, session) = setup();
        coordinator
            .cache()
            .add("alice", &text("a", "1", "2024-01-01T00:00:00Z"))
            .unwrap();

        coordinator.sync(&session).await.unwrap();
        let report = coordinator.sync(&session).await.unwrap();
        assert_eq!(report.pushed, 0);
        assert_eq!(report.pulled, 0);
        assert_eq!(pending_changes(coordinator.cache(), "alice").unwrap(), 0);
    }

    #[tokio::test]
    async fn rejected_records_still_advance_last_sync() {
        let (coordinator, remote, session) = setup();
        let server_copy = text("a", "server", "2024-06-01T00:00:00Z");
        remote.add("alice", &server_copy).unwrap();
        coordinator
            .cache()
            .add("alice", &text("a", "local", "2024-03-01T00:00:00Z"))
            .unwrap();

        let report = coordinator.sync(&session).await.unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].tag, "text");
        assert_eq!(report.pulled, 0);
        assert_eq!(coordinator.cache().last_sync("alice").unwrap(), report.last_sync);

        // Not retried on the next exchange.
        assert_eq!(pending_changes(coordinator.cache(), "alice").unwrap(), 0);
        let stored: TextRecord = remote.get("alice", &server_copy.key()).unwrap();
        assert_eq!(stored, server_copy);
    }

    #[tokio::test]
    async fn force_push_overrides_newer_remote() {
        let (coordinator, remote, session) = setup();
        let remote_copy = text("a", "server", "2024-06-01T00:00:00Z");
        let local_copy = text("a", "local", "2024-01-01T00:00:00Z");
        remote.add("alice", &remote_copy).unwrap();
        coordinator.cache().add("alice", &local_copy).unwrap();

        assert!(coordinator
            .push_one::<TextRecord>(&session, &local_copy.key())
            .await
            .unwrap_err()
            .is_stale());

        coordinator
            .force_push::<TextRecord>(&session, &local_copy.key())
            .await
            .unwrap();
        let stored: TextRecord = remote.get("alice", &local_copy.key()).unwrap();
        assert_eq!(stored, local_copy);
    }

    #[tokio::test]
    async fn force_push_requires_remote_row() {
        let (coordinator, _remote, session) = setup();
        let local_copy = text("a", "local", "2024-01-01T00:00:00Z");
        coordinator.cache().add("alice", &local_copy).unwrap();

        let err = coordinator
            .force_push::<TextRecord>(&session, &local_copy.key())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn force_pull_overrides_or_creates_local() {
        let (coordinator, remote, session) = setup();
        let remote_copy = text("a", "server", "2024-01-01T00:00:00Z");
        remote.add("alice", &remote_copy).unwrap();
        coordinator
            .cache()
            .add("alice", &text("a", "local", "2024-06-01T00:00:00Z"))
            .unwrap();

        let pulled: TextRecord = coordinator
            .force_pull(&session, &remote_copy.key())
            .await
            .unwrap();
        assert_eq!(pulled, remote_copy);
        let local: TextRecord = coordinator.cache().get("alice", &remote_copy.key()).unwrap();
        assert_eq!(local, remote_copy);

        let only_remote = text("b", "server", "2024-01-01T00:00:00Z");
        remote.add("alice", &only_remote).unwrap();
        coordinator
            .force_pull::<TextRecord>(&session, &only_remote.key())
            .await
            .unwrap();
        let created: TextRecord = coordinator.cache().get("alice", &only_remote.key()).unwrap();
        assert_eq!(created, only_remote);
    }
}
