//! Sequential sync orchestrator.
//!
//! Visits every active tenant, and for each one every selected provider
//! adapter, strictly sequentially. Sequencing is deliberate: it keeps the
//! engine inside per-provider rate limits without a distributed limiter.
//! A failed tenant-provider pair is logged and counted; it never stops the
//! run.

use crate::error::SyncError;
use crate::providers::{ProviderAdapter, SyncContext};
use crate::report::RunReport;
use chrono::{Duration, Utc};
use merchsync::provider::ProviderKind;
use merchsync::tenant::{Tenant, TenantStore};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What one orchestrator invocation should cover.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Restrict the run to a single provider (manual trigger); `None` runs
    /// all adapters.
    pub provider: Option<ProviderKind>,
    /// Bypass the recent-sync skip window.
    pub force: bool,
}

pub struct Orchestrator {
    tenants: Arc<TenantStore>,
    ctx: SyncContext,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    pacing: std::time::Duration,
    /// Tenant-provider pairs synced more recently than this are skipped
    /// unless the run is forced.
    min_sync_interval: Duration,
}

impl Orchestrator {
    pub fn new(
        tenants: Arc<TenantStore>,
        ctx: SyncContext,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        pacing_ms: u64,
        min_sync_interval_hours: i64,
    ) -> Self {
        Self {
            tenants,
            ctx,
            adapters,
            pacing: std::time::Duration::from_millis(pacing_ms),
            min_sync_interval: Duration::hours(min_sync_interval_hours),
        }
    }

    /// Runs one full sweep and returns the aggregated report.
    ///
    /// Only a failure to enumerate tenants aborts the run; everything
    /// downstream is isolated per tenant-provider pair.
    pub async fn run(&self, opts: RunOptions) -> Result<RunReport, SyncError> {
        let tenants = self
            .tenants
            .list_active()
            .map_err(SyncError::StoreUnavailable)?;

        let mut report = RunReport {
            total: tenants.len(),
            ..Default::default()
        };

        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            tenants = tenants.len(),
            provider = ?opts.provider,
            force = opts.force,
            "Starting sync run"
        );

        for tenant in &tenants {
            for adapter in self.selected_adapters(opts.provider) {
                let kind = adapter.kind();
                match self.sync_pair(adapter.as_ref(), tenant, kind, opts.force).await {
                    Ok(true) => report.record_success(kind),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(
                            tenant_id = %tenant.id,
                            provider = %kind,
                            error = %e,
                            "Tenant-provider sync failed"
                        );
                        report.record_error(kind);
                    }
                }
            }
            // Pace between tenants so bursts stay under provider limits
            sleep(self.pacing).await;
        }

        info!(
            run_id = %run_id,
            tenants = report.total,
            updated = ?report.updated,
            errors = ?report.errors,
            "Sync run finished"
        );

        Ok(report)
    }

    fn selected_adapters(
        &self,
        provider: Option<ProviderKind>,
    ) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .filter(move |a| provider.map_or(true, |p| a.kind() == p))
    }

    /// Syncs one tenant-provider pair. `Ok(true)` means updated, `Ok(false)`
    /// means skipped (not linked, or synced too recently).
    async fn sync_pair(
        &self,
        adapter: &dyn ProviderAdapter,
        tenant: &Tenant,
        kind: ProviderKind,
        force: bool,
    ) -> Result<bool, SyncError> {
        let link = match self
            .ctx
            .links
            .get(&tenant.id, kind)
            .map_err(SyncError::StoreUnavailable)?
        {
            Some(link) => link,
            None => return Ok(false),
        };

        if link.credentials.access_token.is_empty() {
            return Ok(false);
        }
        if kind == ProviderKind::Bureau && tenant.tax_id.as_deref().unwrap_or("").is_empty() {
            return Ok(false);
        }

        if !force {
            if let Some(last) = link.last_synced_at {
                if Utc::now() - last < self.min_sync_interval {
                    debug!(
                        tenant_id = %tenant.id,
                        provider = %kind,
                        last_synced_at = %last,
                        "Skipping recently synced pair"
                    );
                    return Ok(false);
                }
            }
        }

        let outcome = adapter.sync(&self.ctx, tenant).await?;
        info!(
            tenant_id = %tenant.id,
            provider = %kind,
            summary = %outcome.summary,
            "Tenant-provider sync succeeded"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::*;
    use crate::providers::{AdsAdapter, SyncOutcome};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use merchsync::credentials::Credentials;
    use merchsync::link::ProviderLink;
    use serde_json::json;

    /// Succeeds for every tenant except the ones in `fail_for`.
    struct ScriptedAdapter {
        kind: ProviderKind,
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn sync(
            &self,
            ctx: &SyncContext,
            tenant: &Tenant,
        ) -> Result<SyncOutcome, SyncError> {
            if self.fail_for.contains(&tenant.id) {
                return Err(SyncError::DatasetFetchFailed {
                    dataset: "scripted".to_string(),
                    source: anyhow::anyhow!("scripted failure"),
                });
            }
            ctx.links
                .record_sync(&tenant.id, self.kind, &json!({}), &json!({}))
                .map_err(|e| SyncError::PersistFailed {
                    provider: self.kind,
                    source: e,
                })?;
            Ok(SyncOutcome {
                summary: json!({"ok": true}),
                timeseries: serde_json::Value::Null,
            })
        }
    }

    fn make_tenants(ids: &[&str]) -> Arc<TenantStore> {
        let store = TenantStore::new(":memory:").unwrap();
        for id in ids {
            store.upsert(&tenant(id)).unwrap();
        }
        Arc::new(store)
    }

    fn orchestrator_with(
        tenants: Arc<TenantStore>,
        links: Arc<merchsync::link::LinkStore>,
        adapters: Vec<Arc<dyn ProviderAdapter>>,
        dir: &std::path::Path,
    ) -> Orchestrator {
        Orchestrator::new(tenants, make_ctx(links, dir), adapters, 0, 20)
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_tenant() {
        let tenants = make_tenants(&["good", "bad"]);
        let links = make_links();
        linked(&links, "good", ProviderKind::Ads, "a1");
        linked(&links, "bad", ProviderKind::Ads, "a2");

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(ScriptedAdapter {
            kind: ProviderKind::Ads,
            fail_for: vec!["bad".to_string()],
        })];

        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_with(tenants, links, adapters, dir.path());

        let report = orch.run(RunOptions::default()).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.updated_for(ProviderKind::Ads), 1);
        assert_eq!(report.errors_for(ProviderKind::Ads), 1);
    }

    #[tokio::test]
    async fn test_unlinked_tenant_is_silently_skipped() {
        let tenants = make_tenants(&["t1"]);
        let links = make_links();
        // No link at all

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(ScriptedAdapter {
            kind: ProviderKind::Commerce,
            fail_for: vec![],
        })];

        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_with(tenants, links, adapters, dir.path());

        let report = orch.run(RunOptions::default()).await.unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.updated_for(ProviderKind::Commerce), 0);
        assert_eq!(report.errors_for(ProviderKind::Commerce), 0);
    }

    #[tokio::test]
    async fn test_unrefreshable_token_counts_as_error() {
        let tenants = make_tenants(&["t1"]);
        let links = make_links();

        // Expired token with no refresh token: fails before any HTTP call
        let link = ProviderLink::new(
            "t1",
            ProviderKind::Ads,
            Some("acct".to_string()),
            Credentials {
                access_token: "stale".to_string(),
                refresh_token: None,
                expires_at: Some(Utc::now() - ChronoDuration::hours(2)),
                scope: None,
            },
        );
        links.upsert(&link).unwrap();

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(
            AdsAdapter::with_base_url("http://127.0.0.1:1".to_string()),
        )];

        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_with(tenants, links, adapters, dir.path());

        let report = orch
            .run(RunOptions {
                provider: Some(ProviderKind::Ads),
                force: false,
            })
            .await
            .unwrap();

        let single = report.for_provider(ProviderKind::Ads);
        assert_eq!(single.updated, 0);
        assert_eq!(single.errors, 1);
    }

    #[tokio::test]
    async fn test_recent_sync_skipped_unless_forced() {
        let tenants = make_tenants(&["t1"]);
        let links = make_links();
        linked(&links, "t1", ProviderKind::Feed, "m1");
        // Mark the pair as just-synced
        links
            .record_sync("t1", ProviderKind::Feed, &json!({}), &json!({}))
            .unwrap();

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(ScriptedAdapter {
            kind: ProviderKind::Feed,
            fail_for: vec![],
        })];

        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_with(tenants, links, adapters, dir.path());

        let report = orch.run(RunOptions::default()).await.unwrap();
        assert_eq!(report.updated_for(ProviderKind::Feed), 0);
        assert_eq!(report.errors_for(ProviderKind::Feed), 0);

        let forced = orch
            .run(RunOptions {
                provider: None,
                force: true,
            })
            .await
            .unwrap();
        assert_eq!(forced.updated_for(ProviderKind::Feed), 1);
    }

    #[tokio::test]
    async fn test_provider_filter_limits_the_run() {
        let tenants = make_tenants(&["t1"]);
        let links = make_links();
        linked(&links, "t1", ProviderKind::Ads, "a1");
        linked(&links, "t1", ProviderKind::Feed, "m1");

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(ScriptedAdapter {
                kind: ProviderKind::Ads,
                fail_for: vec![],
            }),
            Arc::new(ScriptedAdapter {
                kind: ProviderKind::Feed,
                fail_for: vec![],
            }),
        ];

        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_with(tenants, links, adapters, dir.path());

        let report = orch
            .run(RunOptions {
                provider: Some(ProviderKind::Feed),
                force: false,
            })
            .await
            .unwrap();

        assert_eq!(report.updated_for(ProviderKind::Feed), 1);
        assert_eq!(report.updated_for(ProviderKind::Ads), 0);
    }

    #[tokio::test]
    async fn test_bureau_requires_tax_id_for_eligibility() {
        let tenants = make_tenants(&["t1"]);
        let links = make_links();
        linked(&links, "t1", ProviderKind::Bureau, "biz-1");

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![Arc::new(ScriptedAdapter {
            kind: ProviderKind::Bureau,
            fail_for: vec![],
        })];

        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_with(tenants, links, adapters, dir.path());

        // Tenant has no tax id on file: pair is skipped, not errored
        let report = orch.run(RunOptions::default()).await.unwrap();
        assert_eq!(report.updated_for(ProviderKind::Bureau), 0);
        assert_eq!(report.errors_for(ProviderKind::Bureau), 0);
    }
}
