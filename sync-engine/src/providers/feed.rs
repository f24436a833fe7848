//! Product feed adapter.
//!
//! Covers the merchant feed service: the submitted product feed (paginated,
//! failure-critical), per-product approval statuses (best-effort) and a
//! clicks/impressions performance report over the clamped window
//! (failure-critical).

use super::{persist_and_archive, require_link, ProviderAdapter, SyncContext, SyncOutcome};
use crate::error::SyncError;
use crate::pager::{self, Page};
use crate::window::report_window;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use merchsync::provider::ProviderKind;
use merchsync::tenant::Tenant;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const BASE_URL: &str = "https://shoppingcontent.googleapis.com/content/v2.1";

/// One feed product entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedProduct {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub availability: Option<String>,
}

/// Approval status for one feed product.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductStatus {
    pub product_id: String,
    pub status: String,
    #[serde(default)]
    pub issues: Vec<String>,
}

/// One day of feed performance.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedPerformance {
    pub date: NaiveDate,
    pub clicks: u64,
    pub impressions: u64,
}

#[derive(Deserialize)]
struct FeedPage<T> {
    #[serde(default = "Vec::new")]
    resources: Vec<T>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PerformanceReport {
    #[serde(default)]
    rows: Vec<FeedPerformance>,
}

/// HTTP client for the merchant feed API.
pub struct FeedClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl FeedClient {
    pub fn new(access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            http_client: Client::new(),
            base_url,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        check_response_status(&response)?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// One page of submitted feed products.
    pub async fn fetch_products(
        &self,
        merchant_id: &str,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<Page<FeedProduct>> {
        let mut url = format!(
            "{}/{}/products?maxResults={}",
            self.base_url, merchant_id, page_size
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let page: FeedPage<FeedProduct> = self.get_json(&url, "feed products").await?;
        Ok(Page {
            items: page.resources,
            next: page.next_page_token,
        })
    }

    /// One page of product approval statuses.
    pub async fn fetch_statuses(
        &self,
        merchant_id: &str,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<Page<ProductStatus>> {
        let mut url = format!(
            "{}/{}/productstatuses?maxResults={}",
            self.base_url, merchant_id, page_size
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let page: FeedPage<ProductStatus> = self.get_json(&url, "product statuses").await?;
        Ok(Page {
            items: page.resources,
            next: page.next_page_token,
        })
    }

    /// Daily feed performance between two dates (inclusive).
    pub async fn fetch_performance(
        &self,
        merchant_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FeedPerformance>> {
        let url = format!(
            "{}/{}/reports/performance?startDate={}&endDate={}",
            self.base_url, merchant_id, start, end
        );

        let report: PerformanceReport = self.get_json(&url, "feed performance").await?;
        Ok(report.rows)
    }
}

fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Feed auth error: token expired or invalid")),
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!("Feed API quota exceeded")),
        s if !s.is_success() => Err(anyhow!("Feed API error: {}", s)),
        _ => Ok(()),
    }
}

fn summarize(
    products: &[FeedProduct],
    statuses: &[ProductStatus],
    report: &[FeedPerformance],
) -> serde_json::Value {
    let disapproved = statuses.iter().filter(|s| s.status == "disapproved").count();
    let clicks: u64 = report.iter().map(|r| r.clicks).sum();
    let impressions: u64 = report.iter().map(|r| r.impressions).sum();

    json!({
        "product_count": products.len(),
        "status_count": statuses.len(),
        "disapproved_count": disapproved,
        "clicks": clicks,
        "impressions": impressions,
    })
}

/// Product feed adapter.
pub struct FeedAdapter {
    base_url: String,
}

impl FeedAdapter {
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
        }
    }

    /// Adapter with a custom API base URL (for testing).
    pub fn with_base_url(base_url: String) -> Self {
        Self { base_url }
    }
}

impl Default for FeedAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for FeedAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Feed
    }

    async fn sync(&self, ctx: &SyncContext, tenant: &Tenant) -> Result<SyncOutcome, SyncError> {
        let link = require_link(ctx, tenant, ProviderKind::Feed)?;
        let headers = ctx.tokens.ensure_valid(&link).await?;

        let merchant_id = link.external_account_id.as_deref().unwrap_or_default();
        let client = FeedClient::new(headers.access_token, self.base_url.clone());

        let products = pager::critical(
            "feed_products",
            pager::collect(
                |cursor| client.fetch_products(merchant_id, ctx.page_size, cursor),
                ctx.page_size,
                ctx.max_pages,
            ),
        )
        .await?;

        let statuses = pager::best_effort(
            "product_statuses",
            pager::collect(
                |cursor| client.fetch_statuses(merchant_id, ctx.page_size, cursor),
                ctx.page_size,
                ctx.max_pages,
            ),
        )
        .await;

        let (start, end) = report_window(link.linked_at, Utc::now().date_naive());
        let report = pager::critical(
            "feed_performance",
            client.fetch_performance(merchant_id, start, end),
        )
        .await?;

        let summary = summarize(&products, &statuses, &report);
        let timeseries = serde_json::to_value(&report).unwrap_or_default();

        let data = json!({
            "products": products,
            "statuses": statuses,
            "performance": report,
        });
        let metrics = json!({
            "summary": summary,
            "timeseries": timeseries,
        });

        persist_and_archive(
            ctx,
            tenant,
            ProviderKind::Feed,
            &data,
            &metrics,
            &[
                ("products", &data["products"]),
                ("statuses", &data["statuses"]),
                ("performance", &data["performance"]),
            ],
        )
        .await?;

        Ok(SyncOutcome {
            summary,
            timeseries,
        })
    }
}
