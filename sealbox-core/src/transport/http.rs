//! HTTP transport to the sealbox server.

use crate::models::{RecordKey, SecretRecord};
use crate::store::StoreError;
use crate::sync::{SyncRequest, SyncResponse};
use crate::transport::wire::{
    record_path, AuthRequest, AuthResponse, ErrorBody, KeyRequest, RecordOp, HEALTH_PATH,
    LOGIN_PATH, REGISTER_PATH, SYNC_PATH,
};
use crate::transport::Transport;
use crate::{Result, SealboxError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Authenticated JSON client for the sealbox server.
pub struct HttpTransport {
    client: reqwest::Client,
    server_url: String,
    token: String,
}

impl HttpTransport {
    /// Use an existing bearer token.
    pub fn with_token(server_url: &str, token: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            server_url: server_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Create the remote account and authenticate as it.
    pub async fn register(
        server_url: &str,
        login: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::authenticate(server_url, REGISTER_PATH, login, password, timeout)
            .await
            .map_err(|e| match e {
                SealboxError::Remote { status: 409, .. } => {
                    SealboxError::Store(StoreError::UserExists(login.to_string()))
                }
                other => other,
            })
    }

    /// Authenticate an existing remote account.
    pub async fn login(
        server_url: &str,
        login: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        Self::authenticate(server_url, LOGIN_PATH, login, password, timeout).await
    }

    async fn authenticate(
        server_url: &str,
        path: &str,
        login: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = build_client(timeout)?;
        let server_url = server_url.trim_end_matches('/').to_string();
        let body = AuthRequest {
            login: login.to_string(),
            password: password.to_string(),
        };

        let resp = client
            .post(format!("{}{}", server_url, path))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let auth: AuthResponse = decode(resp).await?;

        tracing::debug!(login, expires_at = auth.expires_at, "Authenticated with server");
        Ok(Self {
            client,
            server_url,
            token: auth.token,
        })
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}{}", self.server_url, HEALTH_PATH))
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(resp).await)
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}{}", self.server_url, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        decode(resp).await
    }

    async fn post_empty<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}{}", self.server_url, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(resp).await)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse> {
        self.post(SYNC_PATH, request).await
    }

    async fn add<R: SecretRecord>(&self, record: &R) -> Result<()> {
        self.post_empty(&record_path(R::KIND, RecordOp::Add), record)
            .await
            .map_err(|e| match e {
                SealboxError::Remote { status: 409, .. } => {
                    SealboxError::Store(StoreError::ExistsDataNewerVersion)
                }
                other => other,
            })
    }

    async fn get<R: SecretRecord>(&self, key: &RecordKey) -> Result<R> {
        let body = KeyRequest { key: key.clone() };
        self.post(&record_path(R::KIND, RecordOp::Get), &body).await
    }

    async fn force_update<R: SecretRecord>(&self, record: &R) -> Result<()> {
        self.post_empty(&record_path(R::KIND, RecordOp::ForceUpdate), record)
            .await
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(transport_error)
}

fn transport_error(e: reqwest::Error) -> SealboxError {
    SealboxError::Transport(e.to_string())
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }
    resp.json()
        .await
        .map_err(|e| SealboxError::Transport(format!("Invalid response body: {}", e)))
}

async fn error_from_response(resp: reqwest::Response) -> SealboxError {
    let status = resp.status();
    let message = match resp.text().await {
        Ok(text) => serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text),
        Err(_) => "unknown".to_string(),
    };
    status_error(status, message)
}

/// Map a non-2xx status onto the local error taxonomy.
fn status_error(status: StatusCode, message: String) -> SealboxError {
    match status {
        StatusCode::UNAUTHORIZED => SealboxError::Auth(message),
        StatusCode::NOT_FOUND => SealboxError::Store(StoreError::NotFound(message)),
        StatusCode::BAD_REQUEST => SealboxError::InvalidInput(message),
        _ => SealboxError::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "bad token".into()),
            SealboxError::Auth(_)
        ));
        assert!(status_error(StatusCode::NOT_FOUND, "card".into()).is_not_found());
        assert!(matches!(
            status_error(StatusCode::GATEWAY_TIMEOUT, "slow".into()),
            SealboxError::Remote { status: 504, .. }
        ));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let transport = HttpTransport::with_token(
            "http://127.0.0.1:8744/",
            "t".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(transport.server_url, "http://127.0.0.1:8744");
    }
}
