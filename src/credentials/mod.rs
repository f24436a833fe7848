//! OAuth credential set for one tenant-provider link.
//!
//! Tokens are encrypted at rest by the link store (AES-256-GCM, unique nonce
//! per token, base64-encoded master key from the environment). This module
//! holds the in-memory representation plus the sealing primitives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod encryption;

pub use encryption::{open, seal, validate_key, Sealed};

/// Credential set for accessing one provider's API.
///
/// Invariant: a set whose `expires_at` is in the past and whose
/// `refresh_token` is `None` is unrefreshable; the sync engine must fail
/// fast for it instead of calling the provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    /// OAuth access token (sent as a Bearer header)
    pub access_token: String,

    /// OAuth refresh token, if the provider issued one
    pub refresh_token: Option<String>,

    /// When the access token expires (UTC); `None` means non-expiring
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted OAuth scope, as reported by the provider
    pub scope: Option<String>,
}

impl Credentials {
    /// True if the access token has expired as of `now`.
    ///
    /// Tokens without an expiry (PAT-style) never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }

    /// True if the set is expired and carries no refresh token.
    pub fn is_unrefreshable(&self, now: DateTime<Utc>) -> bool {
        self.is_expired(now) && self.refresh_token.is_none()
    }
}
