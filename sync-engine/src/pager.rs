//! Bounded pagination and fallback composition.
//!
//! [`collect`] is the single pagination primitive every adapter builds on:
//! it walks pages until natural exhaustion, a short page, or a hard page
//! cap. The cap guards against providers that keep returning a next-page
//! token forever. There is deliberately no per-page retry: a page failure
//! ends pagination for that dataset.

use crate::error::SyncError;
use anyhow::Result;
use std::future::Future;
use tracing::warn;

/// One page of items plus an opaque continuation token.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Token/offset for the next page; `None` means the source is done
    pub next: Option<String>,
}

impl<T> Page<T> {
    /// A terminal page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Accumulates pages from `fetch_page` until exhaustion, a short page, or
/// `max_pages`.
///
/// `fetch_page` receives the previous page's continuation token (`None` for
/// the first call). Stop conditions, in order of checking:
/// - a page with fewer than `page_size` items (natural end),
/// - a page without a continuation token,
/// - `max_pages` pages fetched (hard safety cap).
pub async fn collect<T, F, Fut>(
    mut fetch_page: F,
    page_size: usize,
    max_pages: usize,
) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..max_pages {
        let page = fetch_page(cursor.take()).await?;
        let fetched = page.items.len();
        items.extend(page.items);

        if fetched < page_size || page.next.is_none() {
            break;
        }
        cursor = page.next;
    }

    Ok(items)
}

/// Fetches a dataset via the current API, falling back to a legacy API on
/// failure.
///
/// If the fallback also fails: critical datasets propagate
/// `DatasetFetchFailed`; best-effort datasets degrade to an empty list.
pub async fn collect_with_fallback<T>(
    dataset: &str,
    primary: impl Future<Output = Result<Vec<T>>>,
    fallback: impl Future<Output = Result<Vec<T>>>,
    critical: bool,
) -> Result<Vec<T>, SyncError> {
    let primary_err = match primary.await {
        Ok(items) => return Ok(items),
        Err(e) => e,
    };

    warn!(
        dataset = %dataset,
        error = %primary_err,
        "Primary API failed, trying legacy fallback"
    );

    match fallback.await {
        Ok(items) => Ok(items),
        Err(fallback_err) => {
            if critical {
                Err(SyncError::DatasetFetchFailed {
                    dataset: dataset.to_string(),
                    source: fallback_err.context(format!("primary error: {}", primary_err)),
                })
            } else {
                warn!(
                    dataset = %dataset,
                    error = %fallback_err,
                    "Legacy fallback also failed, degrading to empty dataset"
                );
                Ok(Vec::new())
            }
        }
    }
}

/// Runs a failure-critical fetch, mapping errors into the taxonomy.
pub async fn critical<T>(
    dataset: &str,
    fetch: impl Future<Output = Result<Vec<T>>>,
) -> Result<Vec<T>, SyncError> {
    fetch.await.map_err(|e| SyncError::DatasetFetchFailed {
        dataset: dataset.to_string(),
        source: e,
    })
}

/// Runs a best-effort fetch; any failure degrades to an empty list.
pub async fn best_effort<T>(dataset: &str, fetch: impl Future<Output = Result<Vec<T>>>) -> Vec<T> {
    match fetch.await {
        Ok(items) => items,
        Err(e) => {
            warn!(
                dataset = %dataset,
                error = %e,
                "Best-effort dataset failed, continuing with empty result"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_stops_on_short_page() {
        let items = collect(
            |cursor| async move {
                match cursor.as_deref() {
                    None => Ok(Page {
                        items: vec![1, 2, 3],
                        next: Some("p2".to_string()),
                    }),
                    Some("p2") => Ok(Page {
                        // Short page: strictly fewer than page_size
                        items: vec![4],
                        next: Some("p3".to_string()),
                    }),
                    Some(other) => panic!("should not fetch page {}", other),
                }
            },
            3,
            10,
        )
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_stops_when_no_next_token() {
        let items = collect(
            |_| async { Ok(Page::last(vec![1, 2, 3])) },
            3,
            10,
        )
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_max_pages_caps_a_misbehaving_source() {
        let calls = AtomicUsize::new(0);

        // Full pages with a constant next token, forever
        let items = collect(
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Page { items: vec![0u8, 0, 0], next: Some("again".to_string()) }) }
            },
            3,
            5,
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(items.len(), 15);
    }

    #[tokio::test]
    async fn test_page_error_ends_pagination() {
        let result: Result<Vec<u8>> = collect(
            |cursor| async move {
                match cursor {
                    None => Ok(Page {
                        items: vec![1, 2, 3],
                        next: Some("p2".to_string()),
                    }),
                    Some(_) => Err(anyhow!("server hiccup")),
                }
            },
            3,
            10,
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let items = collect_with_fallback(
            "products",
            async { Err(anyhow!("v4 is down")) },
            async { Ok(vec![10, 20, 30]) },
            true,
        )
        .await
        .unwrap();

        assert_eq!(items, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_primary_succeeds() {
        let items = collect_with_fallback(
            "products",
            async { Ok(vec![1]) },
            async { panic!("fallback must not run") },
            true,
        )
        .await
        .unwrap();

        assert_eq!(items, vec![1]);
    }

    #[tokio::test]
    async fn test_double_failure_critical_propagates() {
        let result: Result<Vec<u8>, _> = collect_with_fallback(
            "orders",
            async { Err(anyhow!("v4 down")) },
            async { Err(anyhow!("v2 down too")) },
            true,
        )
        .await;

        match result {
            Err(SyncError::DatasetFetchFailed { dataset, .. }) => assert_eq!(dataset, "orders"),
            other => panic!("expected DatasetFetchFailed, got {:?}", other.map(|v| v.len())),
        }
    }

    #[tokio::test]
    async fn test_double_failure_noncritical_degrades_to_empty() {
        let items: Vec<u8> = collect_with_fallback(
            "inventory",
            async { Err(anyhow!("down")) },
            async { Err(anyhow!("down")) },
            false,
        )
        .await
        .unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_best_effort_swallows_errors() {
        let items: Vec<u8> = best_effort("customers", async { Err(anyhow!("down")) }).await;
        assert!(items.is_empty());

        let items = best_effort("customers", async { Ok(vec![7]) }).await;
        assert_eq!(items, vec![7]);
    }

    #[tokio::test]
    async fn test_critical_maps_error() {
        let result: Result<Vec<u8>, _> = critical("report", async { Err(anyhow!("boom")) }).await;
        assert!(matches!(result, Err(SyncError::DatasetFetchFailed { .. })));
    }
}
