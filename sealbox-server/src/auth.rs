//! Bearer tokens and the identity middleware.
//!
//! A token is `base64url(claims) "." base64url(HMAC-SHA256(secret, claims))`
//! where `claims` is the JSON object `{"sub": login, "exp": unix_seconds}`.
//! Nothing else is carried.

use crate::error::ServerError;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// The caller resolved from a valid bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub login: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: i64,
}

/// Issues and validates bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Arc<Vec<u8>>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: Vec<u8>, ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret),
            ttl,
        }
    }

    /// Returns the token and its expiry in unix seconds.
    pub fn issue(&self, login: &str) -> Result<(String, i64), ServerError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let exp = Utc::now().timestamp().saturating_add(ttl);
        let claims = serde_json::to_vec(&Claims {
            sub: login.to_string(),
            exp,
        })
        .map_err(|e| ServerError::Internal(e.to_string()))?;

        let signature = self.sign(&claims)?;
        let token = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&claims),
            URL_SAFE_NO_PAD.encode(signature)
        );
        Ok((token, exp))
    }

    pub fn validate(&self, token: &str) -> Result<Identity, ServerError> {
        let (claims_b64, sig_b64) = token
            .split_once('.')
            .ok_or_else(|| ServerError::Auth("Malformed token".to_string()))?;
        let claims_bytes = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| ServerError::Auth("Malformed token".to_string()))?;
        let signature = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| ServerError::Auth("Malformed token".to_string()))?;

        let expected = self.sign(&claims_bytes)?;
        if !bool::from(expected.as_slice().ct_eq(signature.as_slice())) {
            return Err(ServerError::Auth("Invalid token signature".to_string()));
        }

        let claims: Claims = serde_json::from_slice(&claims_bytes)
            .map_err(|_| ServerError::Auth("Malformed token".to_string()))?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(ServerError::Auth("Token expired".to_string()));
        }
        if claims.sub.is_empty() {
            return Err(ServerError::Auth("Malformed token".to_string()));
        }

        Ok(Identity { login: claims.sub })
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, ServerError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ServerError::Internal(format!("HMAC key: {}", e)))?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Resolve `Authorization: Bearer <token>` into an [`Identity`] extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::Auth("Missing Authorization header".to_string()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| ServerError::Auth("Invalid auth scheme".to_string()))?
        .trim()
        .to_string();

    let identity = state.tokens.validate(&token).inspect_err(|e| {
        tracing::warn!(path = %request.uri().path(), "Rejected bearer token: {}", e);
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(vec![7u8; 32], Duration::from_secs(60))
    }

    #[test]
    fn issue_and_validate() {
        let (token, exp) = issuer().issue("alice").unwrap();
        assert!(exp > Utc::now().timestamp());
        assert_eq!(
            issuer().validate(&token).unwrap(),
            Identity {
                login: "alice".to_string()
            }
        );
    }

    #[test]
    fn claims_carry_no_password() {
        let (token, _) = issuer().issue("alice").unwrap();
        let (claims_b64, _) = token.split_once('.').unwrap();
        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64).unwrap()).unwrap();
        let mut keys: Vec<&String> = claims.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["exp", "sub"]);
    }

    #[test]
    fn reject_other_secret() {
        let (token, _) = issuer().issue("alice").unwrap();
        let other = TokenIssuer::new(vec![8u8; 32], Duration::from_secs(60));
        assert!(matches!(other.validate(&token), Err(ServerError::Auth(_))));
    }

    #[test]
    fn reject_tampered_claims() {
        let (token, _) = issuer().issue("alice").unwrap();
        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"mallory","exp":99999999999}"#);
        let forged = format!("{}.{}", forged_claims, sig);
        assert!(matches!(issuer().validate(&forged), Err(ServerError::Auth(_))));
    }

    #[test]
    fn reject_expired() {
        let expired = TokenIssuer::new(vec![7u8; 32], Duration::ZERO);
        let (token, _) = expired.issue("alice").unwrap();
        assert!(matches!(expired.validate(&token), Err(ServerError::Auth(_))));
    }

    #[test]
    fn reject_garbage() {
        for token in ["", "abc", "abc.def", "!!!.???"] {
            assert!(issuer().validate(token).is_err());
        }
    }
}
