//! Provider adapters.
//!
//! One adapter per external provider, all implementing [`ProviderAdapter`]
//! so the orchestrator is written once against the trait. Each `sync` walks
//! the same steps: load the link, validate the token, fetch datasets
//! (critical or best-effort), compute a deterministic summary, persist the
//! result on the link, then archive best-effort snapshots.

use crate::error::SyncError;
use crate::token::TokenManager;
use async_trait::async_trait;
use merchsync::link::{LinkStore, ProviderLink};
use merchsync::provider::ProviderKind;
use merchsync::snapshot::{namespace_for, SnapshotWriter};
use merchsync::tenant::Tenant;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub mod ads;
pub mod analytics;
pub mod bureau;
pub mod commerce;
pub mod feed;

pub use ads::AdsAdapter;
pub use analytics::AnalyticsAdapter;
pub use bureau::BureauAdapter;
pub use commerce::CommerceAdapter;
pub use feed::FeedAdapter;

/// Shared collaborators handed to every adapter.
pub struct SyncContext {
    pub links: Arc<LinkStore>,
    pub tokens: Arc<TokenManager>,
    pub snapshots: Arc<SnapshotWriter>,
    /// Items requested per provider API page
    pub page_size: usize,
    /// Hard cap on pages per dataset
    pub max_pages: usize,
}

/// Result of one successful tenant-provider sync.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Deterministic summary for quick status display
    pub summary: Value,
    /// Per-day series where the provider supplies one
    pub timeseries: Value,
}

/// One provider's fetch-normalize-persist pipeline.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Syncs one tenant. Any `Err` aborts only this tenant-provider pair.
    async fn sync(&self, ctx: &SyncContext, tenant: &Tenant) -> Result<SyncOutcome, SyncError>;
}

/// All production adapters, in orchestrator visit order.
pub fn default_adapters() -> Vec<Arc<dyn ProviderAdapter>> {
    vec![
        Arc::new(AdsAdapter::new()),
        Arc::new(CommerceAdapter::new()),
        Arc::new(AnalyticsAdapter::new()),
        Arc::new(FeedAdapter::new()),
        Arc::new(BureauAdapter::new()),
    ]
}

/// Loads the tenant's link for `kind`, requiring a provider-side account id.
pub(crate) fn require_link(
    ctx: &SyncContext,
    tenant: &Tenant,
    kind: ProviderKind,
) -> Result<ProviderLink, SyncError> {
    let link = ctx
        .links
        .get(&tenant.id, kind)
        .map_err(SyncError::StoreUnavailable)?
        .ok_or(SyncError::NotLinked(kind))?;

    match link.external_account_id.as_deref() {
        Some(id) if !id.is_empty() => Ok(link),
        _ => Err(SyncError::NotLinked(kind)),
    }
}

/// Persists the sync result, then archives snapshots best-effort.
///
/// The relational write is authoritative: its failure is `PersistFailed`.
/// Snapshot failures are logged and swallowed; the sync still counts as
/// updated.
pub(crate) async fn persist_and_archive(
    ctx: &SyncContext,
    tenant: &Tenant,
    kind: ProviderKind,
    data: &Value,
    metrics: &Value,
    snapshots: &[(&str, &Value)],
) -> Result<(), SyncError> {
    ctx.links
        .record_sync(&tenant.id, kind, data, metrics)
        .map_err(|e| SyncError::PersistFailed {
            provider: kind,
            source: e,
        })?;

    let namespace = namespace_for(tenant);
    for (dataset, payload) in snapshots {
        if let Err(e) = ctx.snapshots.write(&namespace, kind, dataset, payload).await {
            let err = SyncError::SnapshotWriteFailed {
                dataset: dataset.to_string(),
                source: e,
            };
            warn!(
                tenant_id = %tenant.id,
                provider = %kind,
                error = %err,
                "Snapshot archival failed, relational result already persisted"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use anyhow::anyhow;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use chrono::{Duration, Utc};
    use merchsync::credentials::Credentials;
    use merchsync::snapshot::{FsObjectStore, ObjectStore};

    /// Object store whose every put fails, for snapshot-failure scenarios.
    pub struct FailingObjectStore;

    #[async_trait]
    impl ObjectStore for FailingObjectStore {
        async fn put(&self, _key: &str, _bytes: &[u8]) -> anyhow::Result<String> {
            Err(anyhow!("bucket unavailable"))
        }
    }

    pub fn make_links() -> Arc<LinkStore> {
        let key = BASE64.encode([0u8; 32]);
        Arc::new(LinkStore::new(":memory:", &key).unwrap())
    }

    pub fn make_ctx(links: Arc<LinkStore>, snapshot_dir: &std::path::Path) -> SyncContext {
        make_ctx_with_store(links, Arc::new(FsObjectStore::new(snapshot_dir)))
    }

    pub fn make_ctx_with_store(
        links: Arc<LinkStore>,
        object_store: Arc<dyn ObjectStore>,
    ) -> SyncContext {
        SyncContext {
            tokens: Arc::new(TokenManager::new(Arc::clone(&links))),
            snapshots: Arc::new(SnapshotWriter::new(object_store)),
            links,
            page_size: 2,
            max_pages: 10,
        }
    }

    pub fn tenant(id: &str) -> Tenant {
        Tenant {
            id: id.to_string(),
            email: Some(format!("{}@example.com", id)),
            active: true,
            last_login_at: None,
            tax_id: None,
        }
    }

    pub fn fresh_credentials() -> Credentials {
        Credentials {
            access_token: "test_token".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(1)),
            scope: None,
        }
    }

    pub fn linked(
        links: &LinkStore,
        tenant_id: &str,
        kind: ProviderKind,
        account: &str,
    ) -> ProviderLink {
        let link = ProviderLink::new(
            tenant_id,
            kind,
            Some(account.to_string()),
            fresh_credentials(),
        );
        links.upsert(&link).unwrap();
        link
    }
}
