//! Business credit bureau adapter.
//!
//! One failure-critical call: the business credit report. The bureau keys
//! its lookup on the tenant's tax id, so a tenant without one on file is
//! treated the same as an unlinked tenant.

use super::{persist_and_archive, require_link, ProviderAdapter, SyncContext, SyncOutcome};
use crate::error::SyncError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use merchsync::provider::ProviderKind;
use merchsync::tenant::Tenant;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const BASE_URL: &str = "https://api.bureau-connect.com/v1";

/// Business credit report as returned by the bureau.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreditReport {
    pub score: u32,
    pub risk_class: String,
    #[serde(default)]
    pub delinquencies: u32,
    #[serde(default)]
    pub tradelines: Vec<Tradeline>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Tradeline {
    pub creditor: String,
    pub balance: f64,
    pub status: String,
}

/// HTTP client for the credit bureau API.
pub struct BureauClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl BureauClient {
    pub fn new(access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            http_client: Client::new(),
            base_url,
        }
    }

    /// Fetches the business credit report for a tax id.
    pub async fn fetch_report(&self, account_id: &str, tax_id: &str) -> Result<CreditReport> {
        let url = format!("{}/accounts/{}/report", self.base_url, account_id);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "tax_id": tax_id }))
            .send()
            .await
            .context("Failed to send credit report request")?;

        check_response_status(&response)?;
        response
            .json()
            .await
            .context("Failed to parse credit report response")
    }
}

fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Bureau auth error: token expired or invalid")),
        StatusCode::NOT_FOUND => Err(anyhow!("Bureau has no file for this business")),
        s if !s.is_success() => Err(anyhow!("Bureau API error: {}", s)),
        _ => Ok(()),
    }
}

fn summarize(report: &CreditReport) -> serde_json::Value {
    let open_balance: f64 = report
        .tradelines
        .iter()
        .filter(|t| t.status == "open")
        .map(|t| t.balance)
        .sum();

    json!({
        "score": report.score,
        "risk_class": report.risk_class,
        "delinquencies": report.delinquencies,
        "tradeline_count": report.tradelines.len(),
        "open_balance": open_balance,
    })
}

/// Business credit bureau adapter.
pub struct BureauAdapter {
    base_url: String,
}

impl BureauAdapter {
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

impl Default for BureauAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for BureauAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bureau
    }

    async fn sync(&self, ctx: &SyncContext, tenant: &Tenant) -> Result<SyncOutcome, SyncError> {
        let link = require_link(ctx, tenant, ProviderKind::Bureau)?;
        let tax_id = match tenant.tax_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => return Err(SyncError::NotLinked(ProviderKind::Bureau)),
        };

        let headers = ctx.tokens.ensure_valid(&link).await?;
        let account_id = link.external_account_id.as_deref().unwrap_or_default();
        let client = BureauClient::new(headers.access_token, self.base_url.clone());

        let report = client
            .fetch_report(account_id, tax_id)
            .await
            .map_err(|e| SyncError::DatasetFetchFailed {
                dataset: "credit_report".to_string(),
                source: e,
            })?;

        let summary = summarize(&report);
        let data = json!({ "report": report });
        let metrics = json!({ "summary": summary });

        persist_and_archive(
            ctx,
            tenant,
            ProviderKind::Bureau,
            &data,
            &metrics,
            &[("report", &data["report"])],
        )
        .await?;

        Ok(SyncOutcome {
            summary,
            timeseries: serde_json::Value::Null,
        })
    }
}
