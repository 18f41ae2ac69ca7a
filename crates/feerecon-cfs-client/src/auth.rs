//! OAuth2 client-credentials token cache, refreshed on expiry. CFS issues
//! short-lived bearer tokens; re-authenticating on every call would double
//! the HTTP round trips this facade makes, so the token is cached until
//! shortly before its reported expiry.

use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};

use feerecon_core::ReconcileError;

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct TokenCache {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

impl TokenCache {
    pub fn new(client: reqwest::Client, base_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            base_url,
            client_id,
            client_secret,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, ReconcileError> {
        if let Some(cached) = self.cached.lock().as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.value.clone());
            }
        }

        let resp = self
            .client
            .post(format!("{}/oauth/token", self.base_url))
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ReconcileError::CfsClient(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ReconcileError::CfsClient(format!(
                "token request returned HTTP {}",
                resp.status()
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| ReconcileError::CfsClient(format!("token response decode failed: {e}")))?;

        let expires_at = Instant::now() + Duration::from_secs(body.expires_in.saturating_sub(30));
        let token = body.access_token.clone();
        *self.cached.lock() = Some(CachedToken {
            value: body.access_token,
            expires_at,
        });
        Ok(token)
    }
}
