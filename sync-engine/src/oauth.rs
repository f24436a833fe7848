//! OAuth collaborator contract.
//!
//! Each provider exposes the same three-legged shape: an authorization URL,
//! a code-for-token exchange, and a token refresh. The engine depends only
//! on this shape, never on a provider SDK.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use merchsync::credentials::Credentials;
use merchsync::provider::ProviderKind;
use serde::Deserialize;
use std::collections::HashMap;

/// OAuth endpoints and client credentials for one provider.
#[derive(Clone, Debug)]
pub struct OAuthProviderConfig {
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token exchange/refresh endpoint URL
    pub token_url: String,
    /// Required scopes
    pub scopes: Vec<String>,
    /// Client ID (from environment)
    pub client_id: String,
    /// Client secret (from environment)
    pub client_secret: String,
}

impl OAuthProviderConfig {
    /// Build the authorization URL with state and redirect_uri.
    pub fn build_auth_url(&self, state: &str, redirect_uri: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}&response_type=code",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }
}

/// Token endpoint response (standard OAuth 2.0).
#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Converts the wire response into a credential set, carrying over the
    /// previous refresh token and scope where the provider omitted them.
    pub(crate) fn into_credentials(self, previous: Option<&Credentials>) -> Credentials {
        Credentials {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous.and_then(|c| c.refresh_token.clone())),
            expires_at: self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
            scope: self.scope.or_else(|| previous.and_then(|c| c.scope.clone())),
        }
    }
}

/// Refresh endpoint for a provider, independent of client credentials.
///
/// The token manager needs this even when no OAuth client id/secret are
/// configured in the environment (some providers accept a bare refresh
/// token).
pub fn token_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Ads => "https://oauth2.googleapis.com/token",
        ProviderKind::Commerce => "https://login.bigcommerce.com/oauth2/token",
        ProviderKind::Analytics => "https://oauth2.googleapis.com/token",
        ProviderKind::Feed => "https://oauth2.googleapis.com/token",
        ProviderKind::Bureau => "https://api.bureau-connect.com/oauth2/v1/token",
    }
}

/// Full OAuth configuration for a provider, if its client credentials are
/// present in the environment (`MERCHSYNC_OAUTH_{KIND}_CLIENT_ID` /
/// `_CLIENT_SECRET`).
pub fn oauth_config(kind: ProviderKind) -> Option<OAuthProviderConfig> {
    let env_prefix = kind.as_str().to_uppercase();
    let client_id = std::env::var(format!("MERCHSYNC_OAUTH_{}_CLIENT_ID", env_prefix)).ok()?;
    let client_secret =
        std::env::var(format!("MERCHSYNC_OAUTH_{}_CLIENT_SECRET", env_prefix)).ok()?;

    let (auth_url, scopes) = match kind {
        ProviderKind::Ads => (
            "https://accounts.google.com/o/oauth2/v2/auth",
            vec!["https://www.googleapis.com/auth/adwords"],
        ),
        ProviderKind::Commerce => (
            "https://login.bigcommerce.com/oauth2/authorize",
            vec!["store_v2_products", "store_v2_orders", "store_v2_customers"],
        ),
        ProviderKind::Analytics => (
            "https://accounts.google.com/o/oauth2/v2/auth",
            vec!["https://www.googleapis.com/auth/analytics.readonly"],
        ),
        ProviderKind::Feed => (
            "https://accounts.google.com/o/oauth2/v2/auth",
            vec!["https://www.googleapis.com/auth/content"],
        ),
        ProviderKind::Bureau => (
            "https://api.bureau-connect.com/oauth2/v1/authorize",
            vec!["company.credit.read"],
        ),
    };

    Some(OAuthProviderConfig {
        auth_url: auth_url.to_string(),
        token_url: token_url(kind).to_string(),
        scopes: scopes.into_iter().map(|s| s.to_string()).collect(),
        client_id,
        client_secret,
    })
}

/// Exchange an authorization code for a credential set.
pub async fn exchange_code(
    token_url: &str,
    code: &str,
    redirect_uri: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<Credentials> {
    let client = reqwest::Client::new();

    let mut form = HashMap::new();
    form.insert("grant_type", "authorization_code");
    form.insert("code", code);
    form.insert("redirect_uri", redirect_uri);
    form.insert("client_id", client_id);
    form.insert("client_secret", client_secret);

    tracing::debug!(token_url = %token_url, "Exchanging authorization code");

    let response = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .context("Failed to send token exchange request")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        return Err(anyhow!("Token exchange failed with status {}: {}", status, body));
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    Ok(token_response.into_credentials(None))
}
