//! Carrying sync exchanges and per-record RPCs to the remote side.
//!
//! Every call runs under an identity fixed when the transport is built:
//! a bearer token for [`HttpTransport`], a resolved login for
//! [`DirectTransport`].

#[cfg(feature = "http")]
pub mod http;
pub mod wire;

#[cfg(feature = "http")]
pub use http::HttpTransport;

use crate::models::{RecordKey, SecretRecord};
use crate::store::{RecordStore, RemoteStore};
use crate::sync::{merge_incoming, SyncRequest, SyncResponse};
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait Transport: Send + Sync {
    /// One sync exchange: send the local delta, receive the remote delta.
    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse>;

    /// Remote `add`; a newer stored version fails with `ExistsDataNewerVersion`.
    async fn add<R: SecretRecord>(&self, record: &R) -> Result<()>;

    async fn get<R: SecretRecord>(&self, key: &RecordKey) -> Result<R>;

    /// Remote `force_update`; the row must exist.
    async fn force_update<R: SecretRecord>(&self, record: &R) -> Result<()>;
}

/// In-process access to a [`RemoteStore`] for one resolved identity.
#[derive(Clone)]
pub struct DirectTransport {
    store: RemoteStore,
    login: String,
}

impl DirectTransport {
    /// `login` must already be authenticated.
    pub fn new(store: RemoteStore, login: impl Into<String>) -> Self {
        Self {
            store,
            login: login.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse> {
        Ok(merge_incoming(&self.store, &self.login, request)?)
    }

    async fn add<R: SecretRecord>(&self, record: &R) -> Result<()> {
        Ok(self.store.add(&self.login, record)?)
    }

    async fn get<R: SecretRecord>(&self, key: &RecordKey) -> Result<R> {
        Ok(self.store.get(&self.login, key)?)
    }

    async fn force_update<R: SecretRecord>(&self, record: &R) -> Result<()> {
        Ok(self.store.force_update(&self.login, record)?)
    }
}
