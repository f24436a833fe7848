//! Snapshot writer and the object-key contract.
//!
//! Key shape (bit-exact contract, batch readers depend on it):
//!
//! ```text
//! {namespace}/{provider}/{dataset}/{yyyy}/{mm}/{dd}/{dataset}-{timestamp}.json
//! ```
//!
//! The timestamp is `%Y%m%dT%H%M%S%.3fZ`: path-safe and lexicographically
//! sortable, so a day's objects list in capture order.

use super::ObjectStore;
use crate::provider::ProviderKind;
use crate::tenant::Tenant;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Writes immutable, timestamped JSON snapshots to an object store.
pub struct SnapshotWriter {
    store: Arc<dyn ObjectStore>,
}

impl SnapshotWriter {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Serializes `payload` and stores it under a fresh timestamped key.
    ///
    /// Every call produces a new object; calling twice with identical
    /// content yields two distinct, both-valid snapshots.
    pub async fn write(
        &self,
        namespace: &str,
        provider: ProviderKind,
        dataset: &str,
        payload: &Value,
    ) -> Result<String> {
        let key = object_key(namespace, provider, dataset, Utc::now());
        let bytes = serde_json::to_vec(payload).context("Failed to serialize snapshot payload")?;

        let address = self.store.put(&key, &bytes).await?;

        debug!(
            namespace = %namespace,
            provider = %provider,
            dataset = %dataset,
            address = %address,
            "Snapshot written"
        );

        Ok(address)
    }
}

/// Derives the storage namespace for a tenant.
///
/// Lower-cased contact email with whitespace and slashes replaced, so the
/// prefix is object-key-safe yet human-traceable. Tenants without an email
/// fall back to their stable id.
pub fn namespace_for(tenant: &Tenant) -> String {
    match tenant.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => email
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_whitespace() || c == '/' || c == '\\' {
                    '-'
                } else {
                    c
                }
            })
            .collect(),
        _ => format!("tenant-{}", tenant.id),
    }
}

/// Builds the deterministic object key for one snapshot.
pub fn object_key(
    namespace: &str,
    provider: ProviderKind,
    dataset: &str,
    at: DateTime<Utc>,
) -> String {
    format!(
        "{}/{}/{}/{}/{}-{}.json",
        namespace,
        provider,
        dataset,
        at.format("%Y/%m/%d"),
        dataset,
        at.format("%Y%m%dT%H%M%S%.3fZ"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn tenant(email: Option<&str>) -> Tenant {
        Tenant {
            id: "t-42".to_string(),
            email: email.map(|e| e.to_string()),
            active: true,
            last_login_at: None,
            tax_id: None,
        }
    }

    #[test]
    fn test_namespace_lowercases_and_sanitizes() {
        assert_eq!(
            namespace_for(&tenant(Some("Shop Owner/Berlin@Example.COM"))),
            "shop-owner-berlin@example.com"
        );
    }

    #[test]
    fn test_namespace_falls_back_to_tenant_id() {
        assert_eq!(namespace_for(&tenant(None)), "tenant-t-42");
        assert_eq!(namespace_for(&tenant(Some("  "))), "tenant-t-42");
    }

    #[test]
    fn test_object_key_shape() {
        let at = Utc.with_ymd_and_hms(2026, 8, 29, 14, 30, 5).unwrap();
        let key = object_key("shop@example.com", ProviderKind::Commerce, "orders", at);
        assert_eq!(
            key,
            "shop@example.com/commerce/orders/2026/08/29/orders-20260829T143005.000Z.json"
        );
    }

    #[test]
    fn test_keys_one_second_apart_are_distinct_and_sorted() {
        let first = Utc.with_ymd_and_hms(2026, 8, 29, 14, 30, 5).unwrap();
        let second = first + Duration::seconds(1);

        let a = object_key("ns", ProviderKind::Ads, "campaigns", first);
        let b = object_key("ns", ProviderKind::Ads, "campaigns", second);

        assert_ne!(a, b);
        assert!(a < b, "keys must sort in capture order");
    }

    #[tokio::test]
    async fn test_write_produces_new_object_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(Arc::new(super::super::FsObjectStore::new(dir.path())));

        let payload = json!({"items": 3});
        let a = writer
            .write("ns", ProviderKind::Feed, "products", &payload)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let b = writer
            .write("ns", ProviderKind::Feed, "products", &payload)
            .await
            .unwrap();

        assert_ne!(a, b, "identical payloads still get distinct addresses");
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }
}
