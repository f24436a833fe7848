//! Commerce platform adapter.
//!
//! Pulls the catalog and order history. Products are fetched from the v4
//! catalog API with a fallback to the legacy v2 endpoint, because a slice of
//! older stores still have v4 disabled. Products and orders are
//! failure-critical; customers and inventory degrade to empty.

use super::{persist_and_archive, require_link, ProviderAdapter, SyncContext, SyncOutcome};
use crate::error::SyncError;
use crate::pager::{self, Page};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use merchsync::provider::ProviderKind;
use merchsync::tenant::Tenant;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

const BASE_URL: &str = "https://api.bigcommerce.com";

/// One catalog product. The legacy v2 payload is mapped into this shape at
/// the client boundary so callers never see which API served it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub sku: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub is_visible: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub status: String,
    pub total: f64,
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InventoryLevel {
    pub product_id: u64,
    pub quantity: i64,
}

#[derive(Deserialize)]
struct V4Envelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
    #[serde(default)]
    meta: Option<V4Meta>,
}

#[derive(Deserialize)]
struct V4Meta {
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct V2Product {
    id: u64,
    name: String,
    sku: Option<String>,
    price: String,
    #[serde(default)]
    availability: Option<String>,
}

/// HTTP client for the commerce platform API.
pub struct CommerceClient {
    access_token: String,
    http_client: Client,
    base_url: String,
}

impl CommerceClient {
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
            .header("X-Auth-Token", &self.access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", what))?;

        check_response_status(&response)?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// One page of products from the current v4 catalog API.
    pub async fn fetch_products(
        &self,
        store_id: &str,
        page_size: usize,
        cursor: Option<String>,
    ) -> Result<Page<Product>> {
        let mut url = format!(
            "{}/stores/{}/v4/catalog/products?limit={}",
            self.base_url, store_id, page_size
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={}", cursor));
        }

        let envelope: V4Envelope<Product> = self.get_json(&url, "v4 products").await?;
        Ok(Page {
            items: envelope.data,
            next: envelope.meta.and_then(|m| m.next_cursor),
        })
    }

    /// Entire catalog via the legacy v2 API, in one shot.
    ///
    /// v2 predates cursors and returns the full (capped) list; its price
    /// field is a decimal string.
    pub async fn fetch_products_legacy(&self, store_id: &str) -> Result<Vec<Product>> {
        let url = format!("{}/stores/{}/v2/products", self.base_url, store_id);
        let legacy: Vec<V2Product> = self.get_json(&url, "v2 products").await?;

        legacy
            .into_iter()
            .map(|p| {
                let price = p
                    .price
                    .parse::<f64>()
                    .with_context(|| format!("Bad v2 price for product {}", p.id))?;
                Ok(Product {
                    id: p.id,
                    name: p.name,
                    sku: p.sku,
                    price,
                    is_visible: p.availability.as_deref() != Some("disabled"),
                })
            })
            .collect()
    }

    pub async fn fetch_orders(
        &self,
        store_id: &str,
        page_size: usize,
        cursor: Option<String>,
    ) -> Result<Page<Order>> {
        let mut url = format!(
            "{}/stores/{}/v4/orders?limit={}",
            self.base_url, store_id, page_size
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={}", cursor));
        }

        let envelope: V4Envelope<Order> = self.get_json(&url, "orders").await?;
        Ok(Page {
            items: envelope.data,
            next: envelope.meta.and_then(|m| m.next_cursor),
        })
    }

    pub async fn fetch_customers(
        &self,
        store_id: &str,
        page_size: usize,
        cursor: Option<String>,
    ) -> Result<Page<Customer>> {
        let mut url = format!(
            "{}/stores/{}/v4/customers?limit={}",
            self.base_url, store_id, page_size
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={}", cursor));
        }

        let envelope: V4Envelope<Customer> = self.get_json(&url, "customers").await?;
        Ok(Page {
            items: envelope.data,
            next: envelope.meta.and_then(|m| m.next_cursor),
        })
    }

    pub async fn fetch_inventory(&self, store_id: &str) -> Result<Vec<InventoryLevel>> {
        let url = format!("{}/stores/{}/v4/inventory/levels", self.base_url, store_id);
        let envelope: V4Envelope<InventoryLevel> = self.get_json(&url, "inventory").await?;
        Ok(envelope.data)
    }
}

fn check_response_status(response: &reqwest::Response) -> Result<()> {
    match response.status() {
        StatusCode::UNAUTHORIZED => Err(anyhow!("Commerce auth error: token expired or invalid")),
        StatusCode::NOT_FOUND => Err(anyhow!("Commerce API endpoint not found")),
        StatusCode::TOO_MANY_REQUESTS => Err(anyhow!("Commerce API rate limit exceeded")),
        s if !s.is_success() => Err(anyhow!("Commerce API error: {}", s)),
        _ => Ok(()),
    }
}

fn summarize(
    products: &[Product],
    orders: &[Order],
    customers: &[Customer],
    inventory: &[InventoryLevel],
) -> serde_json::Value {
    let visible = products.iter().filter(|p| p.is_visible).count();
    let revenue: f64 = orders.iter().map(|o| o.total).sum();
    let units: i64 = inventory.iter().map(|i| i.quantity).sum();

    json!({
        "product_count": products.len(),
        "visible_product_count": visible,
        "order_count": orders.len(),
        "revenue": revenue,
        "customer_count": customers.len(),
        "inventory_units": units,
    })
}

/// Commerce platform adapter.
pub struct CommerceAdapter {
    base_url: String,
}

impl CommerceAdapter {
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

impl Default for CommerceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderAdapter for CommerceAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Commerce
    }

    async fn sync(&self, ctx: &SyncContext, tenant: &Tenant) -> Result<SyncOutcome, SyncError> {
        let link = require_link(ctx, tenant, ProviderKind::Commerce)?;
        let headers = ctx.tokens.ensure_valid(&link).await?;

        let store_id = link.external_account_id.as_deref().unwrap_or_default();
        let client = CommerceClient::new(headers.access_token, self.base_url.clone());

        let products = pager::collect_with_fallback(
            "products",
            pager::collect(
                |cursor| client.fetch_products(store_id, ctx.page_size, cursor),
                ctx.page_size,
                ctx.max_pages,
            ),
            client.fetch_products_legacy(store_id),
            true,
        )
        .await?;

        let orders = pager::critical(
            "orders",
            pager::collect(
                |cursor| client.fetch_orders(store_id, ctx.page_size, cursor),
                ctx.page_size,
                ctx.max_pages,
            ),
        )
        .await?;

        let customers = pager::best_effort(
            "customers",
            pager::collect(
                |cursor| client.fetch_customers(store_id, ctx.page_size, cursor),
                ctx.page_size,
                ctx.max_pages,
            ),
        )
        .await;

        let inventory = pager::best_effort("inventory", client.fetch_inventory(store_id)).await;

        let summary = summarize(&products, &orders, &customers, &inventory);

        let data = json!({
            "products": products,
            "orders": orders,
            "customers": customers,
            "inventory": inventory,
        });
        let metrics = json!({ "summary": summary });

        persist_and_archive(
            ctx,
            tenant,
            ProviderKind::Commerce,
            &data,
            &metrics,
            &[
                ("products", &data["products"]),
                ("orders", &data["orders"]),
                ("customers", &data["customers"]),
                ("inventory", &data["inventory"]),
            ],
        )
        .await?;

        Ok(SyncOutcome {
            summary,
            timeseries: serde_json::Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use mockito::Server;
    use std::sync::Arc;

    async fn empty_v4(server: &mut Server, path: &str) -> mockito::Mock {
        server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": []}"#)
            .create_async()
            .await
    }

    #[test]
    fn test_summary_counts_and_revenue() {
        let products = vec![
            Product {
                id: 1,
                name: "Mug".into(),
                sku: Some("MUG-1".into()),
                price: 12.0,
                is_visible: true,
            },
            Product {
                id: 2,
                name: "Retired mug".into(),
                sku: None,
                price: 8.0,
                is_visible: false,
            },
        ];
        let orders = vec![
            Order {
                id: 10,
                status: "completed".into(),
                total: 24.0,
                created_at: None,
            },
            Order {
                id: 11,
                status: "refunded".into(),
                total: 12.0,
                created_at: None,
            },
        ];
        let inventory = vec![InventoryLevel {
            product_id: 1,
            quantity: 40,
        }];

        let summary = summarize(&products, &orders, &[], &inventory);
        assert_eq!(summary["product_count"], 2);
        assert_eq!(summary["visible_product_count"], 1);
        assert_eq!(summary["revenue"], 36.0);
        assert_eq!(summary["inventory_units"], 40);
    }

    #[tokio::test]
    async fn test_legacy_fallback_serves_products_when_v4_fails() {
        let mut server = Server::new_async().await;

        let _v4 = server
            .mock("GET", "/stores/store-9/v4/catalog/products?limit=2")
            .with_status(404)
            .create_async()
            .await;

        let _v2 = server
            .mock("GET", "/stores/store-9/v2/products")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": 1, "name": "Mug", "sku": "MUG-1", "price": "12.00"},
                    {"id": 2, "name": "Shirt", "sku": null, "price": "25.50"},
                    {"id": 3, "name": "Hidden", "sku": null, "price": "1.00", "availability": "disabled"}
                ]"#,
            )
            .create_async()
            .await;

        let _orders = empty_v4(&mut server, "/stores/store-9/v4/orders?limit=2").await;
        let _customers = empty_v4(&mut server, "/stores/store-9/v4/customers?limit=2").await;
        let _inventory = empty_v4(&mut server, "/stores/store-9/v4/inventory/levels").await;

        let links = make_links();
        linked(&links, "t1", ProviderKind::Commerce, "store-9");

        let dir = tempfile::tempdir().unwrap();
        let ctx = make_ctx(Arc::clone(&links), dir.path());

        let adapter = CommerceAdapter::with_base_url(server.url());
        let outcome = adapter.sync(&ctx, &tenant("t1")).await.unwrap();

        // All three legacy products survive the mapping
        assert_eq!(outcome.summary["product_count"], 3);
        assert_eq!(outcome.summary["visible_product_count"], 2);

        let stored = links.get("t1", ProviderKind::Commerce).unwrap().unwrap();
        assert_eq!(stored.data["products"][1]["price"], 25.5);
        assert_eq!(stored.data["products"][2]["is_visible"], false);
    }

    #[tokio::test]
    async fn test_both_product_apis_down_fails_the_sync() {
        let mut server = Server::new_async().await;

        let _v4 = server
            .mock("GET", "/stores/store-9/v4/catalog/products?limit=2")
            .with_status(500)
            .create_async()
            .await;
        let _v2 = server
            .mock("GET", "/stores/store-9/v2/products")
            .with_status(500)
            .create_async()
            .await;

        let links = make_links();
        linked(&links, "t1", ProviderKind::Commerce, "store-9");

        let dir = tempfile::tempdir().unwrap();
        let ctx = make_ctx(links, dir.path());

        let adapter = CommerceAdapter::with_base_url(server.url());
        let result = adapter.sync(&ctx, &tenant("t1")).await;

        match result {
            Err(SyncError::DatasetFetchFailed { dataset, .. }) => assert_eq!(dataset, "products"),
            other => panic!("expected DatasetFetchFailed, got {:?}", other.map(|o| o.summary)),
        }
    }

    #[tokio::test]
    async fn test_best_effort_datasets_degrade_silently() {
        let mut server = Server::new_async().await;

        let _products = server
            .mock("GET", "/stores/store-9/v4/catalog/products?limit=2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"id": 1, "name": "Mug", "sku": null, "price": 12.0, "is_visible": true}]}"#)
            .create_async()
            .await;
        let _orders = empty_v4(&mut server, "/stores/store-9/v4/orders?limit=2").await;

        // Customers and inventory both 500: sync must still succeed
        let _customers = server
            .mock("GET", "/stores/store-9/v4/customers?limit=2")
            .with_status(500)
            .create_async()
            .await;
        let _inventory = server
            .mock("GET", "/stores/store-9/v4/inventory/levels")
            .with_status(500)
            .create_async()
            .await;

        let links = make_links();
        linked(&links, "t1", ProviderKind::Commerce, "store-9");

        let dir = tempfile::tempdir().unwrap();
        let ctx = make_ctx(links, dir.path());

        let adapter = CommerceAdapter::with_base_url(server.url());
        let outcome = adapter.sync(&ctx, &tenant("t1")).await.unwrap();

        assert_eq!(outcome.summary["product_count"], 1);
        assert_eq!(outcome.summary["customer_count"], 0);
        assert_eq!(outcome.summary["inventory_units"], 0);
    }

    #[tokio::test]
    async fn test_paginated_products_follow_cursor() {
        let mut server = Server::new_async().await;

        let _page1 = server
            .mock("GET", "/stores/store-9/v4/catalog/products?limit=2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data": [
                    {"id": 1, "name": "A", "sku": null, "price": 1.0, "is_visible": true},
                    {"id": 2, "name": "B", "sku": null, "price": 2.0, "is_visible": true}
                ], "meta": {"next_cursor": "abc"}}"#,
            )
            .create_async()
            .await;
        let _page2 = server
            .mock("GET", "/stores/store-9/v4/catalog/products?limit=2&cursor=abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": [{"id": 3, "name": "C", "sku": null, "price": 3.0, "is_visible": true}]}"#)
            .create_async()
            .await;

        let _orders = empty_v4(&mut server, "/stores/store-9/v4/orders?limit=2").await;
        let _customers = empty_v4(&mut server, "/stores/store-9/v4/customers?limit=2").await;
        let _inventory = empty_v4(&mut server, "/stores/store-9/v4/inventory/levels").await;

        let links = make_links();
        linked(&links, "t1", ProviderKind::Commerce, "store-9");

        let dir = tempfile::tempdir().unwrap();
        let ctx = make_ctx(links, dir.path());

        let adapter = CommerceAdapter::with_base_url(server.url());
        let outcome = adapter.sync(&ctx, &tenant("t1")).await.unwrap();

        assert_eq!(outcome.summary["product_count"], 3);
    }
}
