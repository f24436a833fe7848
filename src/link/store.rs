//! Encrypted provider-link storage using SQLite.
//!
//! One row per (tenant, provider) pair. Access and refresh tokens are
//! encrypted at rest with AES-256-GCM, each with its own nonce.

use super::ProviderLink;
use crate::credentials::{self, Credentials, Sealed};
use crate::provider::ProviderKind;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// Provider-link storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE provider_links (
///     id INTEGER PRIMARY KEY,
///     tenant_id TEXT NOT NULL,
///     provider TEXT NOT NULL,
///     external_account_id TEXT,
///     access_token TEXT NOT NULL,       -- Encrypted
///     access_token_nonce TEXT NOT NULL,
///     refresh_token TEXT,               -- Encrypted (optional)
///     refresh_token_nonce TEXT,
///     expires_at TEXT,                  -- ISO 8601 (optional)
///     scope TEXT,
///     linked_at TEXT NOT NULL,
///     last_synced_at TEXT,
///     data TEXT NOT NULL,               -- JSON bag
///     metrics TEXT NOT NULL,            -- JSON bag
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL,
///     UNIQUE(tenant_id, provider)
/// );
/// ```
///
/// The UNIQUE constraint enforces the at-most-one-link-per-pair invariant.
pub struct LinkStore {
    conn: Mutex<Connection>,
    encryption_key: Vec<u8>,
}

impl LinkStore {
    /// Creates or opens a link store.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let key = credentials::validate_key(encryption_key).context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open link database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS provider_links (
                id INTEGER PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                provider TEXT NOT NULL,
                external_account_id TEXT,
                access_token TEXT NOT NULL,
                access_token_nonce TEXT NOT NULL,
                refresh_token TEXT,
                refresh_token_nonce TEXT,
                expires_at TEXT,
                scope TEXT,
                linked_at TEXT NOT NULL,
                last_synced_at TEXT,
                data TEXT NOT NULL,
                metrics TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(tenant_id, provider)
            )
            "#,
            [],
        )
        .context("Failed to create provider_links table")?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_links_tenant ON provider_links(tenant_id)",
            [],
        )
        .context("Failed to create link index")?;

        Ok(Self {
            conn: Mutex::new(conn),
            encryption_key: key,
        })
    }

    /// Stores a link, replacing any existing row for the same pair.
    pub fn upsert(&self, link: &ProviderLink) -> Result<()> {
        let access = credentials::seal(&link.credentials.access_token, &self.encryption_key)
            .context("Failed to encrypt access token")?;

        let refresh = link
            .credentials
            .refresh_token
            .as_deref()
            .map(|t| credentials::seal(t, &self.encryption_key))
            .transpose()
            .context("Failed to encrypt refresh token")?;

        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO provider_links (
                    tenant_id, provider, external_account_id,
                    access_token, access_token_nonce,
                    refresh_token, refresh_token_nonce,
                    expires_at, scope, linked_at, last_synced_at,
                    data, metrics, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
                ON CONFLICT(tenant_id, provider) DO UPDATE SET
                    external_account_id = excluded.external_account_id,
                    access_token = excluded.access_token,
                    access_token_nonce = excluded.access_token_nonce,
                    refresh_token = excluded.refresh_token,
                    refresh_token_nonce = excluded.refresh_token_nonce,
                    expires_at = excluded.expires_at,
                    scope = excluded.scope,
                    linked_at = excluded.linked_at,
                    last_synced_at = excluded.last_synced_at,
                    data = excluded.data,
                    metrics = excluded.metrics,
                    updated_at = excluded.updated_at
                "#,
                params![
                    link.tenant_id,
                    link.provider.as_str(),
                    link.external_account_id,
                    access.ciphertext,
                    access.nonce,
                    refresh.as_ref().map(|s| s.ciphertext.clone()),
                    refresh.as_ref().map(|s| s.nonce.clone()),
                    link.credentials.expires_at.map(|dt| dt.to_rfc3339()),
                    link.credentials.scope,
                    link.linked_at.to_rfc3339(),
                    link.last_synced_at.map(|dt| dt.to_rfc3339()),
                    link.data.to_string(),
                    link.metrics.to_string(),
                    now,
                ],
            )
            .context("Failed to store provider link")?;

        Ok(())
    }

    /// Retrieves the link for a (tenant, provider) pair.
    pub fn get(&self, tenant_id: &str, provider: ProviderKind) -> Result<Option<ProviderLink>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT external_account_id,
                       access_token, access_token_nonce,
                       refresh_token, refresh_token_nonce,
                       expires_at, scope, linked_at, last_synced_at,
                       data, metrics
                FROM provider_links
                WHERE tenant_id = ?1 AND provider = ?2
                "#,
            )
            .context("Failed to prepare link query")?;

        let mut rows = stmt
            .query(params![tenant_id, provider.as_str()])
            .context("Failed to execute link query")?;

        let row = match rows.next().context("Failed to read link row")? {
            Some(row) => row,
            None => return Ok(None),
        };

        let access_token = credentials::open(
            &Sealed {
                ciphertext: row.get(1)?,
                nonce: row.get(2)?,
            },
            &self.encryption_key,
        )
        .context("Failed to decrypt access token")?;

        let refresh_token = match (
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
        ) {
            (Some(ciphertext), Some(nonce)) => Some(
                credentials::open(&Sealed { ciphertext, nonce }, &self.encryption_key)
                    .context("Failed to decrypt refresh token")?,
            ),
            _ => None,
        };

        let linked_at: String = row.get(7)?;

        Ok(Some(ProviderLink {
            tenant_id: tenant_id.to_string(),
            provider,
            external_account_id: row.get(0)?,
            credentials: Credentials {
                access_token,
                refresh_token,
                expires_at: parse_opt_ts(row.get(5)?)?,
                scope: row.get(6)?,
            },
            linked_at: parse_ts(&linked_at)?,
            last_synced_at: parse_opt_ts(row.get(8)?)?,
            data: parse_json(row.get::<_, String>(9)?)?,
            metrics: parse_json(row.get::<_, String>(10)?)?,
        }))
    }

    /// Lists every link a tenant has, in provider order.
    pub fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<ProviderLink>> {
        let providers: Vec<ProviderKind> = {
            let conn = self.conn.lock().unwrap();
            let mut stmt = conn
                .prepare(
                    "SELECT provider FROM provider_links WHERE tenant_id = ?1 ORDER BY provider",
                )
                .context("Failed to prepare link-list query")?;

            let names = stmt
                .query_map(params![tenant_id], |row| row.get::<_, String>(0))
                .context("Failed to execute link-list query")?
                .collect::<Result<Vec<String>, _>>()
                .context("Failed to read link-list rows")?;

            names
                .into_iter()
                .map(|n| n.parse())
                .collect::<Result<Vec<_>>>()?
        };

        providers
            .into_iter()
            .map(|p| {
                self.get(tenant_id, p)?
                    .ok_or_else(|| anyhow!("Link vanished during listing"))
            })
            .collect()
    }

    /// Replaces the stored credential set for a pair (token refresh path).
    ///
    /// Fails if no link exists: refreshing credentials for a disconnected
    /// provider is always a bug.
    pub fn update_credentials(
        &self,
        tenant_id: &str,
        provider: ProviderKind,
        creds: &Credentials,
    ) -> Result<()> {
        let access = credentials::seal(&creds.access_token, &self.encryption_key)
            .context("Failed to encrypt access token")?;
        let refresh = creds
            .refresh_token
            .as_deref()
            .map(|t| credentials::seal(t, &self.encryption_key))
            .transpose()
            .context("Failed to encrypt refresh token")?;

        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                r#"
                UPDATE provider_links SET
                    access_token = ?3, access_token_nonce = ?4,
                    refresh_token = ?5, refresh_token_nonce = ?6,
                    expires_at = ?7, scope = ?8, updated_at = ?9
                WHERE tenant_id = ?1 AND provider = ?2
                "#,
                params![
                    tenant_id,
                    provider.as_str(),
                    access.ciphertext,
                    access.nonce,
                    refresh.as_ref().map(|s| s.ciphertext.clone()),
                    refresh.as_ref().map(|s| s.nonce.clone()),
                    creds.expires_at.map(|dt| dt.to_rfc3339()),
                    creds.scope,
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to update credentials")?;

        if affected == 0 {
            return Err(anyhow!(
                "No {} link for tenant '{}' to update",
                provider,
                tenant_id
            ));
        }

        Ok(())
    }

    /// Records a successful sync: raw data, computed metrics, and the
    /// last-synced timestamp.
    pub fn record_sync(
        &self,
        tenant_id: &str,
        provider: ProviderKind,
        data: &Value,
        metrics: &Value,
    ) -> Result<()> {
        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                r#"
                UPDATE provider_links SET
                    data = ?3, metrics = ?4, last_synced_at = ?5, updated_at = ?5
                WHERE tenant_id = ?1 AND provider = ?2
                "#,
                params![
                    tenant_id,
                    provider.as_str(),
                    data.to_string(),
                    metrics.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .context("Failed to record sync result")?;

        if affected == 0 {
            return Err(anyhow!(
                "No {} link for tenant '{}' to record sync on",
                provider,
                tenant_id
            ));
        }

        Ok(())
    }

    /// Deletes a link (explicit disconnect). Returns true if a row was
    /// removed.
    pub fn delete(&self, tenant_id: &str, provider: ProviderKind) -> Result<bool> {
        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute(
                "DELETE FROM provider_links WHERE tenant_id = ?1 AND provider = ?2",
                params![tenant_id, provider.as_str()],
            )
            .context("Failed to delete provider link")?;

        Ok(affected > 0)
    }
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .context("Failed to parse stored timestamp")
}

fn parse_opt_ts(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_ts(&s)).transpose()
}

fn parse_json(value: String) -> Result<Value> {
    serde_json::from_str(&value).context("Failed to parse stored JSON bag")
}
