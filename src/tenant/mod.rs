//! Tenant records.
//!
//! A tenant is one merchant account whose external business data is
//! synchronized. The sync engine treats tenants as read-only; they are
//! created and mutated by account-management flows outside this core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod store;

pub use store::TenantStore;

/// One merchant account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
    /// Stable tenant identifier
    pub id: String,

    /// Contact email, also the source of the snapshot namespace
    pub email: Option<String>,

    /// Inactive tenants are skipped by every run
    pub active: bool,

    /// Last portal login (informational)
    pub last_login_at: Option<DateTime<Utc>>,

    /// National tax id; gates the credit-bureau sync
    pub tax_id: Option<String>,
}
