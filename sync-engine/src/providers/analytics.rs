//! Web analytics adapter.
//!
//! Single dataset: a per-day traffic report over the clamped date window.
//! Failure-critical, since the report is the whole point of this provider.

use super::{persist_and_archive, require_link, ProviderAdapter, SyncContext, SyncOutcome};
use crate::error::SyncError;
use crate::pager;
use crate::window::report_window;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use merchsync::provider::ProviderKind;
use merchsync::tenant::Tenant;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const BASE_URL: &str = "https://analyticsdata.googleapis.com/v1beta";

/// One day of site traffic.
#[derive(Debug, Serialize, Deserialize)]
pub struct DailyTraffic {
    pub date: NaiveDate,
    pub sessions: u64,
    pub users: u64,
    pub pageviews: u64,
    #[serde(default)]
    pub bounce_rate: Option<f64>,
}

#[derive(Deserialize)]
struct TrafficReport {
    #[serde(default)]
    rows: Vec<DailyTraffic>,
}

/// HTTP client for the analytics reporting API.
pub struct AnalyticsClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl AnalyticsClient {
    pub fn new(access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            http_client: Client::new(),
            base_url,
        }
    }

    /// Runs the daily traffic report for a property between two dates.
    pub async fn fetch_daily_traffic(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyTraffic>> {
        let url = format!("{}/properties/{}:runReport", self.base_url, property_id);
        let body = json!({
            "dateRanges": [{"startDate": start.to_string(), "endDate": end.to_string()}],
            "dimensions": [{"name": "date"}],
            "metrics": [
                {"name": "sessions"},
                {"name": "activeUsers"},
                {"name": "screenPageViews"},
                {"name": "bounceRate"}
            ],
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to send traffic report request")?;

        check_response_status(&response)?;
        let report: TrafficReport = response
            .json()
            .await
            .context("Failed to parse traffic report response")?;

        Ok(report.rows)
    }
}

fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Analytics auth error: token expired or invalid")),
        StatusCode::FORBIDDEN => Err(anyhow!("Analytics property access denied")),
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!("Analytics API quota exceeded")),
        s if !s.is_success() => Err(anyhow!("Analytics API error: {}", s)),
        _ => Ok(()),
    }
}

fn summarize(report: &[DailyTraffic]) -> serde_json::Value {
    let sessions: u64 = report.iter().map(|r| r.sessions).sum();
    let users: u64 = report.iter().map(|r| r.users).sum();
    let pageviews: u64 = report.iter().map(|r| r.pageviews).sum();

    json!({
        "days": report.len(),
        "sessions": sessions,
        "users": users,
        "pageviews": pageviews,
        "first_date": report.first().map(|r| r.date),
        "last_date": report.last().map(|r| r.date),
    })
}

/// Web analytics adapter.
pub struct AnalyticsAdapter {
    base_url: String,
}

impl AnalyticsAdapter {
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

impl Default for AnalyticsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for AnalyticsAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Analytics
    }

    async fn sync(&self, ctx: &SyncContext, tenant: &Tenant) -> Result<SyncOutcome, SyncError> {
        let link = require_link(ctx, tenant, ProviderKind::Analytics)?;
        let headers = ctx.tokens.ensure_valid(&link).await?;

        let property_id = link.external_account_id.as_deref().unwrap_or_default();
        let client = AnalyticsClient::new(headers.access_token, self.base_url.clone());

        let (start, end) = report_window(link.linked_at, Utc::now().date_naive());
        let report = pager::critical(
            "daily_traffic",
            client.fetch_daily_traffic(property_id, start, end),
        )
        .await?;

        let summary = summarize(&report);
        let timeseries = serde_json::to_value(&report).unwrap_or_default();

        let data = json!({ "traffic": report });
        let metrics = json!({
            "summary": summary,
            "timeseries": timeseries,
        });

        persist_and_archive(
            ctx,
            tenant,
            ProviderKind::Analytics,
            &data,
            &metrics,
            &[("traffic", &data["traffic"])],
        )
        .await?;

        Ok(SyncOutcome {
            summary,
            timeseries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use mockito::{Matcher, Server};
    use std::sync::Arc;

    #[test]
    fn test_summary_totals() {
        let report = vec![
            DailyTraffic {
                date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                sessions: 10,
                users: 8,
                pageviews: 30,
                bounce_rate: Some(0.4),
            },
            DailyTraffic {
                date: NaiveDate::from_ymd_opt(2026, 8, 2).unwrap(),
                sessions: 20,
                users: 15,
                pageviews: 55,
                bounce_rate: None,
            },
        ];

        let summary = summarize(&report);
        assert_eq!(summary["days"], 2);
        assert_eq!(summary["sessions"], 30);
        assert_eq!(summary["users"], 23);
        assert_eq!(summary["pageviews"], 85);
    }

    #[tokio::test]
    async fn test_sync_persists_report_and_timeseries() {
        let mut server = Server::new_async().await;

        let _report = server
            .mock("POST", "/properties/prop-7:runReport")
            .match_body(Matcher::PartialJson(json!({
                "dimensions": [{"name": "date"}],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"rows": [
                    {"date": "2026-08-27", "sessions": 12, "users": 9, "pageviews": 40},
                    {"date": "2026-08-28", "sessions": 8, "users": 7, "pageviews": 21}
                ]}"#,
            )
            .create_async()
            .await;

        let links = make_links();
        linked(&links, "t1", ProviderKind::Analytics, "prop-7");

        let dir = tempfile::tempdir().unwrap();
        let ctx = make_ctx(Arc::clone(&links), dir.path());

        let adapter = AnalyticsAdapter::with_base_url(server.url());
        let outcome = adapter.sync(&ctx, &tenant("t1")).await.unwrap();

        assert_eq!(outcome.summary["sessions"], 20);
        assert_eq!(outcome.timeseries[1]["pageviews"], 21);

        let stored = links.get("t1", ProviderKind::Analytics).unwrap().unwrap();
        assert_eq!(stored.data["traffic"][0]["date"], "2026-08-27");
        assert_eq!(stored.metrics["summary"]["days"], 2);
    }

    #[tokio::test]
    async fn test_report_failure_is_critical() {
        let mut server = Server::new_async().await;

        let _report = server
            .mock("POST", "/properties/prop-7:runReport")
            .with_status(403)
            .create_async()
            .await;

        let links = make_links();
        linked(&links, "t1", ProviderKind::Analytics, "prop-7");

        let dir = tempfile::tempdir().unwrap();
        let ctx = make_ctx(links, dir.path());

        let adapter = AnalyticsAdapter::with_base_url(server.url());
        let result = adapter.sync(&ctx, &tenant("t1")).await;

        match result {
            Err(SyncError::DatasetFetchFailed { dataset, .. }) => {
                assert_eq!(dataset, "daily_traffic")
            }
            other => panic!("expected DatasetFetchFailed, got {:?}", other.map(|o| o.summary)),
        }
    }

    #[tokio::test]
    async fn test_unlinked_tenant_is_not_linked() {
        let links = make_links();
        let dir = tempfile::tempdir().unwrap();
        let ctx = make_ctx(links, dir.path());

        let adapter = AnalyticsAdapter::with_base_url("http://127.0.0.1:1".to_string());
        let result = adapter.sync(&ctx, &tenant("t1")).await;

        assert!(matches!(
            result,
            Err(SyncError::NotLinked(ProviderKind::Analytics))
        ));
    }
}
