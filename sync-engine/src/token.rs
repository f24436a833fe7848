//! OAuth token lifecycle management.
//!
//! Every adapter consults [`TokenManager::ensure_valid`] before its first
//! provider call. A fresh token short-circuits with no network traffic; an
//! expired one is refreshed exactly once and persisted before any data
//! fetch, so a stale token never reaches a provider's data endpoint.

use crate::error::SyncError;
use crate::oauth::{self, TokenResponse};
use merchsync::link::{LinkStore, ProviderLink};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Ready-to-use auth material for provider API calls.
#[derive(Clone, Debug)]
pub struct AuthHeaders {
    /// Value for the `Authorization` header
    pub authorization: String,
    /// Raw access token, for clients that take the token directly
    pub access_token: String,
}

impl AuthHeaders {
    fn bearer(access_token: &str) -> Self {
        Self {
            authorization: format!("Bearer {}", access_token),
            access_token: access_token.to_string(),
        }
    }
}

/// Holds and refreshes OAuth credential sets per tenant-provider link.
pub struct TokenManager {
    links: Arc<LinkStore>,
    http_client: reqwest::Client,
    /// Refresh endpoint override for tests (mock server)
    token_url_override: Option<String>,
}

impl TokenManager {
    pub fn new(links: Arc<LinkStore>) -> Self {
        Self {
            links,
            http_client: reqwest::Client::new(),
            token_url_override: None,
        }
    }

    /// Creates a manager that refreshes against a fixed URL (for testing).
    pub fn with_token_url(links: Arc<LinkStore>, token_url: String) -> Self {
        Self {
            links,
            http_client: reqwest::Client::new(),
            token_url_override: Some(token_url),
        }
    }

    /// Returns headers for a valid access token, refreshing first if needed.
    ///
    /// - Unexpired token: returns headers without any network call.
    /// - Expired with a refresh token: calls the provider's refresh endpoint
    ///   once, persists the merged credential set, then returns headers.
    /// - Refresh rejected: `RefreshDenied`, terminal for this provider for
    ///   this run.
    /// - Expired without a refresh token: `Unrefreshable`, no network call.
    pub async fn ensure_valid(&self, link: &ProviderLink) -> Result<AuthHeaders, SyncError> {
        let now = chrono::Utc::now();

        if !link.credentials.is_expired(now) {
            return Ok(AuthHeaders::bearer(&link.credentials.access_token));
        }

        let refresh_token = link
            .credentials
            .refresh_token
            .clone()
            .ok_or(SyncError::Unrefreshable(link.provider))?;

        let refreshed = self.refresh(link, &refresh_token).await?;

        self.links
            .update_credentials(&link.tenant_id, link.provider, &refreshed)
            .map_err(|e| SyncError::PersistFailed {
                provider: link.provider,
                source: e,
            })?;

        info!(
            tenant_id = %link.tenant_id,
            provider = %link.provider,
            "OAuth token refreshed"
        );

        Ok(AuthHeaders::bearer(&refreshed.access_token))
    }

    /// One refresh attempt against the provider's token endpoint.
    async fn refresh(
        &self,
        link: &ProviderLink,
        refresh_token: &str,
    ) -> Result<merchsync::credentials::Credentials, SyncError> {
        let url = self
            .token_url_override
            .clone()
            .unwrap_or_else(|| oauth::token_url(link.provider).to_string());

        let mut form: HashMap<String, String> = HashMap::new();
        form.insert("grant_type".to_string(), "refresh_token".to_string());
        form.insert("refresh_token".to_string(), refresh_token.to_string());

        // Client credentials are optional; included when configured
        if let Some(config) = oauth::oauth_config(link.provider) {
            form.insert("client_id".to_string(), config.client_id);
            form.insert("client_secret".to_string(), config.client_secret);
        }

        let denied = |reason: String| SyncError::RefreshDenied {
            provider: link.provider,
            reason,
        };

        let response = self
            .http_client
            .post(&url)
            .header("Accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| denied(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(denied(format!("status {}: {}", status, body)));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| denied(format!("invalid token response: {}", e)))?;

        Ok(token_response.into_credentials(Some(&link.credentials)))
    }
}
