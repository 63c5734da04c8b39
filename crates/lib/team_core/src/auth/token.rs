//! Bearer-token validation against the external identity service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::AuthError;
use crate::cache::AuthCache;
use crate::models::Identity;

const BEARER_PREFIX: &str = "bearer ";

/// Pulls the token out of an `Authorization` header value. The scheme is
/// matched case-insensitively and the token must be a single word.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let prefix = header.get(..BEARER_PREFIX.len()).ok_or(AuthError::MissingToken)?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return Err(AuthError::MissingToken);
    }
    let token = header[BEARER_PREFIX.len()..].trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Reads `exp` from the token's claims without checking the signature.
///
/// The identity service is the trust root; the claims are only used to know
/// how long a validated token may stay cached. Returns `Ok(None)` when the
/// token carries no `exp`.
pub fn token_expiry(token: &str) -> Result<Option<DateTime<Utc>>, AuthError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data =
        jsonwebtoken::decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| AuthError::InvalidToken(format!("malformed claims: {e}")))?;

    match data.claims.exp {
        None => Ok(None),
        Some(exp) => DateTime::from_timestamp(exp, 0)
            .map(Some)
            .ok_or_else(|| AuthError::InvalidToken("exp out of range".into())),
    }
}

/// Turns a raw bearer token into a trusted [`Identity`].
#[derive(Debug, Clone)]
pub struct TokenValidator {
    client: reqwest::Client,
    user_url: String,
    timeout: Duration,
    cache: Arc<AuthCache>,
}

impl TokenValidator {
    /// `endpoint` is the identity service base URL; `/user` is appended.
    pub fn new(endpoint: &str, timeout: Duration, cache: Arc<AuthCache>) -> Self {
        Self {
            client: reqwest::Client::new(),
            user_url: format!("{}/user", endpoint.trim_end_matches('/')),
            timeout,
            cache,
        }
    }

    pub fn cache(&self) -> &AuthCache {
        &self.cache
    }

    /// Returns the cached identity for `token`, or asks the identity service
    /// and caches the answer until the token's own expiry.
    ///
    /// Failures are never retried.
    pub async fn validate(&self, token: &str) -> Result<Identity, AuthError> {
        if let Some(identity) = self.cache.lookup(token) {
            return Ok(identity);
        }

        debug!(url = %self.user_url, "validating token with identity service");
        let response = self
            .client
            .get(&self.user_url)
            .bearer_auth(token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("identity service unreachable: {e}")))?;

        if response.status() != StatusCode::OK {
            debug!(status = %response.status(), "identity service rejected token");
            return Err(AuthError::InvalidToken(format!(
                "identity service answered {}",
                response.status()
            )));
        }

        let identity: Identity = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("unreadable identity: {e}")))?;

        match token_expiry(token)? {
            Some(expires_at) => self.cache.store(token, identity.clone(), expires_at),
            None => debug!(user_id = %identity.id, "token has no exp claim, not caching"),
        }

        Ok(identity)
    }
}
