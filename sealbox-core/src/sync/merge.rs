//! Remote half of a sync exchange.

use crate::models::{
    BinaryRecord, Card, LoginPwd, RecordKey, SecretRecord, TextRecord, Timestamp,
};
use crate::store::{RecordStore, StoreResult};
use crate::sync::protocol::{SyncError, SyncRequest, SyncResponse};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Merge an incoming local delta into `store` and compute the reply.
///
/// The remote delta is read before any incoming record is written. Each
/// incoming record is merged on its own; failures are collected into
/// `sync_errors` and never abort the exchange. Records whose key was sent by
/// the client are dropped from the reply whether or not they merged.
///
/// Only reading the remote delta can fail the call as a whole.
pub fn merge_incoming<S: RecordStore>(
    store: &S,
    user: &str,
    request: &SyncRequest,
) -> StoreResult<SyncResponse> {
    let since = &request.last_sync;
    let remote_cards: Vec<Card> = store.get_all_after(user, since)?;
    let remote_logins: Vec<LoginPwd> = store.get_all_after(user, since)?;
    let remote_texts: Vec<TextRecord> = store.get_all_after(user, since)?;
    let remote_binaries: Vec<BinaryRecord> = store.get_all_after(user, since)?;

    let mut sync_errors = Vec::new();
    let merged = collect_errors(merge_each(store, user, &request.cards), &mut sync_errors)
        + collect_errors(merge_each(store, user, &request.logins), &mut sync_errors)
        + collect_errors(merge_each(store, user, &request.texts), &mut sync_errors)
        + collect_errors(merge_each(store, user, &request.binaries), &mut sync_errors);

    let response = SyncResponse {
        new_cards: suppress_echo(remote_cards, &request.cards),
        new_logins: suppress_echo(remote_logins, &request.logins),
        new_texts: suppress_echo(remote_texts, &request.texts),
        new_binaries: suppress_echo(remote_binaries, &request.binaries),
        sync_errors,
    };

    info!(
        user,
        received = request.len(),
        merged,
        failed = response.sync_errors.len(),
        returned = response.record_count(),
        "Sync exchange merged"
    );
    Ok(response)
}

/// `add` every record, one outcome per record.
pub fn merge_each<S: RecordStore, R: SecretRecord>(
    store: &S,
    user: &str,
    records: &[R],
) -> Vec<Result<RecordKey, SyncError>> {
    records
        .iter()
        .map(|record| {
            let key = record.key();
            match store.add(user, record) {
                Ok(()) => {
                    debug!(kind = %R::KIND, key = %key, "Merged record");
                    Ok(key)
                }
                Err(e) => {
                    warn!(kind = %R::KIND, key = %key, error = %e, "Record rejected during merge");
                    Err(SyncError::new(R::KIND, &key, e))
                }
            }
        })
        .collect()
}

fn collect_errors(
    outcomes: Vec<Result<RecordKey, SyncError>>,
    errors: &mut Vec<SyncError>,
) -> usize {
    let mut merged = 0;
    for outcome in outcomes {
        match outcome {
            Ok(_) => merged += 1,
            Err(e) => errors.push(e),
        }
    }
    merged
}

/// Drop every record whose key appears in `sent`.
pub fn suppress_echo<R: SecretRecord>(delta: Vec<R>, sent: &[R]) -> Vec<R> {
    if sent.is_empty() {
        return delta;
    }
    let sent_keys: HashSet<RecordKey> = sent.iter().map(SecretRecord::key).collect();
    delta
        .into_iter()
        .filter(|record| !sent_keys.contains(&record.key()))
        .collect()
}

/// Everything a fresh device needs: the full remote state for `user`.
pub fn full_snapshot<S: RecordStore>(store: &S, user: &str) -> StoreResult<SyncResponse> {
    let request = SyncRequest {
        last_sync: Timestamp::beginning_of_time(),
        cards: Vec::new(),
        logins: Vec::new(),
        texts: Vec::new(),
        binaries: Vec::new(),
    };
    merge_incoming(store, user, &request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RemoteStore, StoreError};
    use pretty_assertions::assert_eq;

    fn ts(s: &str) -> String {
        Timestamp::parse(s).unwrap().to_string()
    }

    fn card(number: &str, code: &str, timestamp: &str) -> Card {
        Card {
            number: number.as_bytes().to_vec(),
            date: b"12/29".to_vec(),
            code: code.as_bytes().to_vec(),
            prompt: b"visa".to_vec(),
            note: b"-".to_vec(),
            timestamp: ts(timestamp),
        }
    }

    fn text(prompt: &str, timestamp: &str) -> TextRecord {
        TextRecord {
            prompt: prompt.as_bytes().to_vec(),
            text: b"body".to_vec(),
            note: b"-".to_vec(),
            timestamp: ts(timestamp),
        }
    }

    fn store() -> RemoteStore {
        let store = RemoteStore::in_memory().unwrap();
        store.create_user("alice", "$argon2id$stub").unwrap();
        store
    }

    fn request(last_sync: &str, cards: Vec<Card>, texts: Vec<TextRecord>) -> SyncRequest {
        SyncRequest {
            last_sync: Timestamp::parse(last_sync).unwrap(),
            cards,
            logins: Vec::new(),
            texts,
            binaries: Vec::new(),
        }
    }

    #[test]
    fn echo_is_suppressed() {
        let store = store();
        store.add("alice", &card("4111", "111", "2024-02-01T00:00:00Z")).unwrap();
        store.add("alice", &card("5500", "222", "2024-02-02T00:00:00Z")).unwrap();

        let incoming = card("4111", "999", "2024-03-01T00:00:00Z");
        let response = merge_incoming(
            &store,
            "alice",
            &request("2023-01-01T00:00:00Z", vec![incoming.clone()], vec![]),
        )
        .unwrap();

        assert_eq!(response.new_cards, vec![card("5500", "222", "2024-02-02T00:00:00Z")]);
        assert!(response.sync_errors.is_empty());

        let stored: Card = store.get("alice", &incoming.key()).unwrap();
        assert_eq!(stored, incoming);
    }

    #[test]
    fn merged_records_are_not_returned() {
        let store = store();
        let response = merge_incoming(
            &store,
            "alice",
            &request("2023-01-01T00:00:00Z", vec![], vec![text("new", "2024-01-01T00:00:00Z")]),
        )
        .unwrap();

        assert!(response.new_texts.is_empty());
        let all: Vec<TextRecord> = store
            .get_all_after("alice", &Timestamp::beginning_of_time())
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn failures_are_collected_not_raised() {
        let store = store();
        store.add("alice", &text("a", "2024-06-01T00:00:00Z")).unwrap();

        let mut malformed = text("b", "2024-01-01T00:00:00Z");
        malformed.timestamp = "last tuesday".to_string();
        let stale = text("a", "2024-01-01T00:00:00Z");
        let good = text("c", "2024-01-01T00:00:00Z");

        let response = merge_incoming(
            &store,
            "alice",
            &request(
                "2025-01-01T00:00:00Z",
                vec![],
                vec![stale.clone(), malformed.clone(), good.clone()],
            ),
        )
        .unwrap();

        assert_eq!(response.sync_errors.len(), 2);
        assert_eq!(response.sync_errors[0].tag, "text");
        assert_eq!(response.sync_errors[0].key, stale.key().to_string());
        assert_eq!(
            response.sync_errors[0].message,
            StoreError::ExistsDataNewerVersion.to_string()
        );
        assert_eq!(response.sync_errors[1].key, malformed.key().to_string());

        let stored: TextRecord = store.get("alice", &good.key()).unwrap();
        assert_eq!(stored, good);
    }

    #[test]
    fn rejected_record_is_still_not_echoed() {
        let store = store();
        let newer = text("a", "2024-06-01T00:00:00Z");
        store.add("alice", &newer).unwrap();

        let response = merge_incoming(
            &store,
            "alice",
            &request("2024-01-01T00:00:00Z", vec![], vec![text("a", "2024-02-01T00:00:00Z")]),
        )
        .unwrap();

        assert_eq!(response.sync_errors.len(), 1);
        assert!(response.new_texts.is_empty());
    }

    #[test]
    fn merge_each_reports_per_record() {
        let store = store();
        let empty_code = card("4111", "", "2024-01-01T00:00:00Z");

        let outcomes = merge_each(
            &store,
            "alice",
            &[card("5500", "1", "2024-01-01T00:00:00Z"), empty_code],
        );
        assert!(outcomes[0].is_ok());
        let err = outcomes[1].as_ref().unwrap_err();
        assert!(err.message.contains("cards.code"));
    }

    #[test]
    fn full_snapshot_returns_everything() {
        let store = store();
        store.add("alice", &card("4111", "1", "2024-01-01T00:00:00Z")).unwrap();
        store.add("alice", &text("a", "2024-01-01T00:00:00Z")).unwrap();

        let snapshot = full_snapshot(&store, "alice").unwrap();
        assert_eq!(snapshot.record_count(), 2);
    }
}
