//! Two devices sharing one remote store.

use pretty_assertions::assert_eq;
use sealbox_core::{
    Card, DirectTransport, KdfParams, LocalCache, RecordKind, RecordStore, RemoteStore,
    SecretRecord, Session, SyncCoordinator, SyncRequest, TextData, TextRecord, Timestamp,
    Transport, Vault,
};
use std::time::Duration;

const LOGIN: &str = "alice";
const PASSWORD: &str = "correct horse battery staple";

fn cheap() -> KdfParams {
    KdfParams {
        mem_cost: 8_192,
        time_cost: 1,
        parallelism: 1,
    }
}

struct Device {
    vault: Vault,
    coordinator: SyncCoordinator<DirectTransport>,
}

impl Device {
    fn new(remote: &RemoteStore) -> Self {
        let cache = LocalCache::in_memory().unwrap();
        let vault = Vault::enroll(cache.clone(), LOGIN, PASSWORD, &cheap()).unwrap();
        let coordinator = SyncCoordinator::new(cache, DirectTransport::new(remote.clone(), LOGIN));
        Self { vault, coordinator }
    }

    async fn sync(&self) -> sealbox_core::SyncReport {
        self.coordinator.sync(self.vault.session()).await.unwrap()
    }

    fn write_text(&self, prompt: &str, text: &str) {
        self.vault
            .add_text(&TextData {
                prompt: prompt.to_string(),
                text: text.to_string(),
                note: String::new(),
            })
            .unwrap();
    }
}

fn remote() -> RemoteStore {
    let remote = RemoteStore::in_memory().unwrap();
    remote
        .create_user(LOGIN, &sealbox_core::hash_password(PASSWORD.as_bytes(), &cheap()).unwrap())
        .unwrap();
    remote
}

fn ts(s: &str) -> String {
    Timestamp::parse(s).unwrap().to_string()
}

fn card(number: &str, code: &str, timestamp: &str) -> Card {
    Card {
        number: number.as_bytes().to_vec(),
        date: b"01/30".to_vec(),
        code: code.as_bytes().to_vec(),
        prompt: b"visa".to_vec(),
        note: b"-".to_vec(),
        timestamp: ts(timestamp),
    }
}

#[tokio::test]
async fn record_travels_between_devices() {
    let remote = remote();
    let laptop = Device::new(&remote);
    let phone = Device::new(&remote);

    laptop.write_text("wifi", "hunter2");
    laptop.sync().await;
    let report = phone.sync().await;

    assert_eq!(report.pulled, 1);
    assert_eq!(phone.vault.text("wifi").unwrap().text, "hunter2");
}

#[tokio::test]
async fn later_edit_wins_everywhere() {
    let remote = remote();
    let laptop = Device::new(&remote);
    let phone = Device::new(&remote);

    laptop.write_text("wifi", "first");
    laptop.sync().await;
    phone.sync().await;

    phone.write_text("wifi", "second");
    phone.sync().await;
    laptop.sync().await;

    assert_eq!(laptop.vault.text("wifi").unwrap().text, "second");
    assert_eq!(phone.vault.text("wifi").unwrap().text, "second");
}

#[tokio::test]
async fn offline_conflict_reported_then_forced() {
    let remote = remote();
    let laptop = Device::new(&remote);
    let phone = Device::new(&remote);

    laptop.write_text("pin", "laptop-old");
    tokio::time::sleep(Duration::from_millis(5)).await;
    phone.write_text("pin", "phone-new");

    phone.sync().await;
    let report = laptop.sync().await;

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].tag, "text");
    assert_eq!(laptop.vault.text("pin").unwrap().text, "laptop-old");

    let key = laptop
        .vault
        .session()
        .record_key(RecordKind::Text, &["pin"])
        .unwrap();
    laptop
        .coordinator
        .force_push::<TextRecord>(laptop.vault.session(), &key)
        .await
        .unwrap();

    phone
        .coordinator
        .force_pull::<TextRecord>(phone.vault.session(), &key)
        .await
        .unwrap();
    assert_eq!(phone.vault.text("pin").unwrap().text, "laptop-old");
}

#[tokio::test]
async fn echoed_card_is_not_returned() {
    let remote = remote();
    remote.add(LOGIN, &card("4111", "111", "2024-02-01T00:00:00Z")).unwrap();
    remote.add(LOGIN, &card("5500", "222", "2024-02-02T00:00:00Z")).unwrap();

    let transport = DirectTransport::new(remote.clone(), LOGIN);
    let response = transport
        .sync(&SyncRequest {
            last_sync: Timestamp::parse("2023-01-01T00:00:00Z").unwrap(),
            cards: vec![card("4111", "999", "2024-03-01T00:00:00Z")],
            logins: Vec::new(),
            texts: Vec::new(),
            binaries: Vec::new(),
        })
        .await
        .unwrap();

    assert_eq!(response.new_cards, vec![card("5500", "222", "2024-02-02T00:00:00Z")]);
    let stored: Card = remote
        .get(LOGIN, &card("4111", "999", "2024-03-01T00:00:00Z").key())
        .unwrap();
    assert_eq!(stored.code, b"999".to_vec());
}

#[tokio::test]
async fn devices_derive_the_same_field_key() {
    let first = Session::derive(LOGIN, PASSWORD, &cheap()).unwrap();
    let second = Session::derive(LOGIN, PASSWORD, &cheap()).unwrap();
    assert_eq!(
        first.record_key(RecordKind::Card, &["4111"]).unwrap(),
        second.record_key(RecordKind::Card, &["4111"]).unwrap()
    );
}
