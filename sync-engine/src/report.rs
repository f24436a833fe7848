//! Run reports.
//!
//! Built fresh per orchestrator invocation and returned to the caller;
//! never persisted. The cron log is the audit trail.

use merchsync::provider::ProviderKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregated outcome of one orchestrator run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Active tenants considered by this run
    pub total: usize,
    /// Successful tenant-provider syncs, per provider
    pub updated: BTreeMap<ProviderKind, u64>,
    /// Failed tenant-provider syncs, per provider
    pub errors: BTreeMap<ProviderKind, u64>,
}

impl RunReport {
    pub fn record_success(&mut self, provider: ProviderKind) {
        *self.updated.entry(provider).or_default() += 1;
    }

    pub fn record_error(&mut self, provider: ProviderKind) {
        *self.errors.entry(provider).or_default() += 1;
    }

    pub fn updated_for(&self, provider: ProviderKind) -> u64 {
        self.updated.get(&provider).copied().unwrap_or(0)
    }

    pub fn errors_for(&self, provider: ProviderKind) -> u64 {
        self.errors.get(&provider).copied().unwrap_or(0)
    }

    /// Collapses the report to a single provider's counters.
    pub fn for_provider(&self, provider: ProviderKind) -> ProviderRunReport {
        ProviderRunReport {
            updated: self.updated_for(provider),
            errors: self.errors_for(provider),
        }
    }
}

/// Outcome of a single-provider run.
#[derive(Debug, Serialize)]
pub struct ProviderRunReport {
    pub updated: u64,
    pub errors: u64,
}
