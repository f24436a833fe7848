//! Per-tenant provider links.
//!
//! A `ProviderLink` is the stored OAuth credential set, provider-side
//! account identifier, and cached sync result for one (tenant, provider)
//! pair. At most one link exists per pair; the link is created when the
//! tenant completes that provider's OAuth flow and deleted on explicit
//! disconnect.

use crate::credentials::Credentials;
use crate::provider::ProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod store;

pub use store::LinkStore;

/// One tenant-provider connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderLink {
    /// Owning tenant
    pub tenant_id: String,

    /// Which provider this link connects to
    pub provider: ProviderKind,

    /// Provider-side account identifier (ad-account id, store id,
    /// property id, merchant id). Required before the first sync.
    pub external_account_id: Option<String>,

    /// OAuth credential set (encrypted at rest by the store)
    pub credentials: Credentials,

    /// When the tenant completed the OAuth flow
    pub linked_at: DateTime<Utc>,

    /// Last successful sync, if any
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Raw provider data from the last sync (free-form bag)
    pub data: Value,

    /// Last computed summary + time series (free-form bag)
    pub metrics: Value,
}

impl ProviderLink {
    /// A fresh link as produced by the OAuth connect flow: credentials and
    /// account id set, no sync result yet.
    pub fn new(
        tenant_id: impl Into<String>,
        provider: ProviderKind,
        external_account_id: Option<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            provider,
            external_account_id,
            credentials,
            linked_at: Utc::now(),
            last_synced_at: None,
            data: Value::Null,
            metrics: Value::Null,
        }
    }
}
