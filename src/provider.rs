//! Provider kind enumeration.
//!
//! Closed set of external data sources the sync engine knows how to talk to.
//! The lowercase wire name is used in API paths, storage columns, and
//! snapshot object keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One external data source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Advertising platform (campaigns + daily performance)
    Ads,
    /// E-commerce platform (products, orders, customers, inventory)
    Commerce,
    /// Web-analytics platform (daily traffic report)
    Analytics,
    /// Shopping-feed platform (feed items, statuses, performance)
    Feed,
    /// Credit-bureau API (company credit report)
    Bureau,
}

impl ProviderKind {
    /// All provider kinds, in the order the orchestrator visits them.
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Ads,
        ProviderKind::Commerce,
        ProviderKind::Analytics,
        ProviderKind::Feed,
        ProviderKind::Bureau,
    ];

    /// Lowercase wire name (stable; used in storage and object keys).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ads => "ads",
            ProviderKind::Commerce => "commerce",
            ProviderKind::Analytics => "analytics",
            ProviderKind::Feed => "feed",
            ProviderKind::Bureau => "bureau",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ads" => Ok(ProviderKind::Ads),
            "commerce" => Ok(ProviderKind::Commerce),
            "analytics" => Ok(ProviderKind::Analytics),
            "feed" => Ok(ProviderKind::Feed),
            "bureau" => Ok(ProviderKind::Bureau),
            other => Err(anyhow::anyhow!("Unknown provider kind '{}'", other)),
        }
    }
}
