//! Sync error taxonomy.
//!
//! Every failure mode of one tenant-provider sync attempt is a distinct
//! variant so the orchestrator and tests can match on it. Propagation
//! policy:
//!
//! - `NotLinked` / `Unrefreshable` / `RefreshDenied` / `DatasetFetchFailed`
//!   abort that tenant-provider pair and count as a run error.
//! - `SnapshotWriteFailed` is logged and swallowed; the relational write
//!   already succeeded and is the authoritative result.
//! - `StoreUnavailable` means the run itself cannot proceed (database
//!   unreachable) and is the only error a trigger endpoint surfaces as 5xx.

use merchsync::provider::ProviderKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No provider link, or the link is missing the provider-side account
    /// identifier (or tax id, for the bureau).
    #[error("Tenant is not linked to {0}")]
    NotLinked(ProviderKind),

    /// Access token expired with no refresh token stored. Detected without
    /// any network call.
    #[error("{0} access token expired and no refresh token is stored")]
    Unrefreshable(ProviderKind),

    /// The provider rejected the refresh call. Terminal for this provider
    /// for this run.
    #[error("{provider} token refresh denied: {reason}")]
    RefreshDenied {
        provider: ProviderKind,
        reason: String,
    },

    /// A failure-critical dataset could not be fetched (after any fallback).
    #[error("Critical dataset '{dataset}' failed: {source}")]
    DatasetFetchFailed {
        dataset: String,
        #[source]
        source: anyhow::Error,
    },

    /// The relational write of the sync result failed.
    #[error("Failed to persist {provider} sync result")]
    PersistFailed {
        provider: ProviderKind,
        #[source]
        source: anyhow::Error,
    },

    /// A snapshot upload failed. Never fatal; callers log and continue.
    #[error("Snapshot write for dataset '{dataset}' failed")]
    SnapshotWriteFailed {
        dataset: String,
        #[source]
        source: anyhow::Error,
    },

    /// The tenant/link store itself is unusable.
    #[error("Store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}
