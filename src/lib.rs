// Configuration loading
pub mod config;

// Provider kind enumeration
pub mod provider;

// OAuth credential types and at-rest encryption
pub mod credentials;

// Tenant records
pub mod tenant;

// Per-tenant provider links
pub mod link;

// Immutable snapshot archive
pub mod snapshot;
