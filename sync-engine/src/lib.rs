// Sync error taxonomy
pub mod error;

// OAuth collaborator contract per provider
pub mod oauth;

// Token lifecycle management
pub mod token;

// Bounded pagination + fallback composition
pub mod pager;

// Report date-window clamping
pub mod window;

// Provider adapters
pub mod providers;

// Run reports
pub mod report;

// Tenant/provider iteration
pub mod orchestrator;

// Daily schedule trigger
pub mod scheduler;

// HTTP trigger surface
pub mod api;

pub use error::SyncError;
