//! Reality-check lookups.
//!
//! Market, competitor, region, and website checks against an external
//! research service, fronted by a 24 h client cache and a per-session usage
//! quota.

pub mod cache;
pub mod provider;
pub mod quota;
pub mod reality;

use serde::{Deserialize, Serialize};

use crate::artifacts::DemoMode;

pub use cache::{CacheKey, LookupCache};
pub use provider::{HttpLookupProvider, LookupProvider, OfflineLookupProvider};
pub use quota::UsageQuota;
pub use reality::{CheckOutcome, RealityCheck};

/// What a lookup researches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKind {
    /// Market size and demand for a business type in a city
    Market,
    /// Competitors of a business type in a city
    Competitors,
    /// Regional regulations and norms
    Region,
    /// Analysis of an existing website
    Website,
}

impl LookupKind {
    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Competitors => "competitors",
            Self::Region => "region",
            Self::Website => "website",
        }
    }
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lookup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    /// What to research
    pub kind: LookupKind,
    /// Business type and city, or a URL for website checks
    pub query: String,
    /// Response language
    pub locale: String,
    /// Demo mode the check runs in
    pub mode: DemoMode,
    /// Optional discriminator (e.g. region code)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_key: Option<String>,
}

/// A lookup answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LookupReport {
    /// One-paragraph summary
    pub summary: String,
    /// Key findings
    pub highlights: Vec<String>,
    /// Source URLs
    pub sources: Vec<String>,
}
