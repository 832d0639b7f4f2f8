//! Shared handler state and the store-call timeout wrapper.

use crate::auth::TokenIssuer;
use crate::error::ServerError;
use sealbox_core::{KdfParams, RemoteStore, StoreError};
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub store: RemoteStore,
    pub tokens: TokenIssuer,
    pub store_timeout: Duration,
    pub kdf: KdfParams,
}

impl AppState {
    /// Run one blocking store operation off the async runtime, bounded by `store_timeout`.
    ///
    /// The bound is independent of any client deadline. A timed-out call
    /// still finishes on its blocking thread; SQLite keeps each statement
    /// atomic.
    pub async fn with_store<T, F>(&self, op: F) -> Result<T, ServerError>
    where
        T: Send + 'static,
        F: FnOnce(&RemoteStore) -> Result<T, StoreError> + Send + 'static,
    {
        self.with_store_ops(1, op).await
    }

    /// Like [`AppState::with_store`] for work made of `ops` store operations.
    pub async fn with_store_ops<T, F>(&self, ops: usize, op: F) -> Result<T, ServerError>
    where
        T: Send + 'static,
        F: FnOnce(&RemoteStore) -> Result<T, StoreError> + Send + 'static,
    {
        let ops = u32::try_from(ops.max(1)).unwrap_or(u32::MAX);
        let budget = self.store_timeout.saturating_mul(ops);
        let store = self.store.clone();
        let task = tokio::task::spawn_blocking(move || op(&store));

        match tokio::time::timeout(budget, task).await {
            Ok(Ok(result)) => result.map_err(ServerError::from),
            Ok(Err(join)) => Err(ServerError::Internal(format!("Store task failed: {}", join))),
            Err(_) => {
                tracing::error!(timeout = ?budget, "Store operation timed out");
                Err(ServerError::Timeout)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_state() -> AppState {
        AppState {
            store: RemoteStore::in_memory().unwrap(),
            tokens: TokenIssuer::new(vec![3u8; 32], Duration::from_secs(300)),
            store_timeout: Duration::from_secs(2),
            kdf: KdfParams {
                mem_cost: 8_192,
                time_cost: 1,
                parallelism: 1,
            },
        }
    }

    #[tokio::test]
    async fn with_store_maps_errors() {
        let state = test_state();
        let err = state
            .with_store(|store| store.user("nobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[tokio::test]
    async fn with_store_times_out() {
        let mut state = test_state();
        state.store_timeout = Duration::from_millis(10);
        let err = state
            .with_store(|_| {
                std::thread::sleep(Duration::from_millis(200));
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Timeout));
    }
}
