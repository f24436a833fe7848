//! SQLite-backed tenant store.

use super::Tenant;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

/// Tenant storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE tenants (
///     id TEXT PRIMARY KEY,
///     email TEXT,
///     active INTEGER NOT NULL,
///     last_login_at TEXT,           -- ISO 8601 timestamp (optional)
///     tax_id TEXT,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// # Thread Safety
/// The connection is wrapped in a Mutex; SQLite itself runs in serialized
/// mode.
pub struct TenantStore {
    conn: Mutex<Connection>,
}

impl TenantStore {
    /// Creates or opens a tenant store at `db_path`.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path).context("Failed to open tenant database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                email TEXT,
                active INTEGER NOT NULL,
                last_login_at TEXT,
                tax_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create tenants table")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or replaces a tenant record.
    pub fn upsert(&self, tenant: &Tenant) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        self.conn
            .lock()
            .unwrap()
            .execute(
                r#"
                INSERT INTO tenants (id, email, active, last_login_at, tax_id, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    email = excluded.email,
                    active = excluded.active,
                    last_login_at = excluded.last_login_at,
                    tax_id = excluded.tax_id,
                    updated_at = excluded.updated_at
                "#,
                params![
                    tenant.id,
                    tenant.email,
                    tenant.active as i64,
                    tenant.last_login_at.map(|dt| dt.to_rfc3339()),
                    tenant.tax_id,
                    now,
                ],
            )
            .context("Failed to upsert tenant")?;

        Ok(())
    }

    /// Retrieves a tenant by id.
    pub fn get(&self, id: &str) -> Result<Option<Tenant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, email, active, last_login_at, tax_id FROM tenants WHERE id = ?1",
            )
            .context("Failed to prepare tenant query")?;

        let mut rows = stmt
            .query(params![id])
            .context("Failed to execute tenant query")?;

        match rows.next().context("Failed to read tenant row")? {
            Some(row) => Ok(Some(row_to_tenant(row)?)),
            None => Ok(None),
        }
    }

    /// Lists all active tenants, in the store's default order.
    ///
    /// This is the orchestrator's entry query: inactive tenants never
    /// reach a sync run.
    pub fn list_active(&self) -> Result<Vec<Tenant>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT id, email, active, last_login_at, tax_id FROM tenants WHERE active = 1",
            )
            .context("Failed to prepare active-tenant query")?;

        let tenants = stmt
            .query_map([], |row| {
                // Defer timestamp parsing errors to the anyhow layer below
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })
            .context("Failed to execute active-tenant query")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read tenant rows")?;

        tenants
            .into_iter()
            .map(|(id, email, active, last_login_at, tax_id)| {
                Ok(Tenant {
                    id,
                    email,
                    active: active != 0,
                    last_login_at: parse_opt_ts(last_login_at)?,
                    tax_id,
                })
            })
            .collect()
    }

    /// Deletes a tenant. Returns true if a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn
            .lock()
            .unwrap()
            .execute("DELETE FROM tenants WHERE id = ?1", params![id])
            .context("Failed to delete tenant")?;

        Ok(affected > 0)
    }
}

fn row_to_tenant(row: &Row<'_>) -> Result<Tenant> {
    let active: i64 = row.get(2)?;
    Ok(Tenant {
        id: row.get(0)?,
        email: row.get(1)?,
        active: active != 0,
        last_login_at: parse_opt_ts(row.get(3)?)?,
        tax_id: row.get(4)?,
    })
}

fn parse_opt_ts(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .context("Failed to parse stored timestamp")
        })
        .transpose()
}
