//! Advertising platform adapter.
//!
//! Fetches the account's campaign list (paginated) and a daily performance
//! report over the clamped date window. Both datasets are failure-critical:
//! an ads sync without campaigns or performance rows is worthless.

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

const BASE_URL: &str = "https://ads.googleapis.com/v16";

/// One advertising campaign.
#[derive(Debug, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: String,
    pub channel: Option<String>,
}

/// One day of account-level performance.
#[derive(Debug, Serialize, Deserialize)]
pub struct DailyPerformance {
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub spend: f64,
}

#[derive(Deserialize)]
struct CampaignPage {
    #[serde(default)]
    campaigns: Vec<Campaign>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct PerformanceReport {
    #[serde(default)]
    rows: Vec<DailyPerformance>,
}

/// HTTP client for the advertising API.
pub struct AdsClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl AdsClient {
    pub fn new(access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            http_client: Client::new(),
            base_url,
        }
    }

    /// Fetch one page of campaigns for an ad account.
    pub async fn fetch_campaigns(
        &self,
        account_id: &str,
        page_size: usize,
        page_token: Option<String>,
    ) -> Result<Page<Campaign>> {
        let mut url = format!(
            "{}/customers/{}/campaigns?pageSize={}",
            self.base_url, account_id, page_size
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", token));
        }

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send campaign request")?;

        check_response_status(&response)?;
        let page: CampaignPage = response
            .json()
            .await
            .context("Failed to parse campaign response")?;

        Ok(Page {
            items: page.campaigns,
            next: page.next_page_token,
        })
    }

    /// Fetch the daily performance report between two dates (inclusive).
    pub async fn fetch_daily_report(
        &self,
        account_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyPerformance>> {
        let url = format!(
            "{}/customers/{}/reports/daily?startDate={}&endDate={}",
            self.base_url, account_id, start, end
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to send daily report request")?;

        check_response_status(&response)?;
        let report: PerformanceReport = response
            .json()
            .await
            .context("Failed to parse daily report response")?;

        Ok(report.rows)
    }
}

fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Ads auth error: token expired or invalid")),
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!("Ads API quota exceeded")),
        s if !s.is_success() => Err(anyhow!("Ads API error: {}", s)),
        _ => Ok(()),
    }
}

/// Deterministic summary over the fetched datasets.
fn summarize(campaigns: &[Campaign], report: &[DailyPerformance]) -> serde_json::Value {
    let enabled = campaigns.iter().filter(|c| c.status == "ENABLED").count();
    let impressions: u64 = report.iter().map(|r| r.impressions).sum();
    let clicks: u64 = report.iter().map(|r| r.clicks).sum();
    let spend: f64 = report.iter().map(|r| r.spend).sum();

    json!({
        "campaign_count": campaigns.len(),
        "enabled_campaign_count": enabled,
        "impressions": impressions,
        "clicks": clicks,
        "spend": spend,
        "first_date": report.first().map(|r| r.date),
        "last_date": report.last().map(|r| r.date),
    })
}

/// Advertising platform adapter.
pub struct AdsAdapter {
    base_url: String,
}

impl AdsAdapter {
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

impl Default for AdsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AdsAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ads
    }

    async fn sync(&self, ctx: &SyncContext, tenant: &Tenant) -> Result<SyncOutcome, SyncError> {
        let link = require_link(ctx, tenant, ProviderKind::Ads)?;
        let headers = ctx.tokens.ensure_valid(&link).await?;

        let account_id = link.external_account_id.as_deref().unwrap_or_default();
        let client = AdsClient::new(headers.access_token, self.base_url.clone());

        let campaigns = pager::critical(
            "campaigns",
            pager::collect(
                |cursor| client.fetch_campaigns(account_id, ctx.page_size, cursor),
                ctx.page_size,
                ctx.max_pages,
            ),
        )
        .await?;

        let (start, end) = report_window(link.linked_at, Utc::now().date_naive());
        let report = pager::critical(
            "daily_report",
            client.fetch_daily_report(account_id, start, end),
        )
        .await?;

        let summary = summarize(&campaigns, &report);
        let timeseries = serde_json::to_value(&report).unwrap_or_default();

        let data = json!({
            "campaigns": campaigns,
            "report": report,
        });
        let metrics = json!({
            "summary": summary,
            "timeseries": timeseries,
        });

        persist_and_archive(
            ctx,
            tenant,
            ProviderKind::Ads,
            &data,
            &metrics,
            &[
                ("campaigns", &data["campaigns"]),
                ("performance", &data["report"]),
            ],
        )
        .await?;

        Ok(SyncOutcome {
            summary,
            timeseries,
        })
    }
}
