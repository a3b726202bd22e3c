//! Business artifact model and the generation wire format.
//!
//! Field names follow the generation service's camelCase JSON. Optional
//! sections default to empty so older or partial payloads still parse.

use serde::{Deserialize, Serialize};

/// Demo flavour requested from the generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoMode {
    /// Start a business from zero.
    #[default]
    Zero,
    /// Digitize an existing business.
    Digitize,
}

impl DemoMode {
    /// Wire name of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::Digitize => "digitize",
        }
    }
}

impl std::fmt::Display for DemoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sellable offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Offer name
    pub name: String,
    /// Display price, already formatted in the requested currency
    #[serde(default)]
    pub price: Option<String>,
    /// What the offer includes
    #[serde(default)]
    pub includes: Vec<String>,
}

/// An agent or human role in the business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    /// Role title
    pub title: String,
    /// Responsibilities
    #[serde(default)]
    pub responsibilities: Vec<String>,
}

/// The four operating loops of the business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loops {
    /// How the business sells
    #[serde(default)]
    pub sell: String,
    /// How it delivers
    #[serde(default)]
    pub deliver: String,
    /// How money flows
    #[serde(default)]
    pub money: String,
    /// How customers are supported
    #[serde(default)]
    pub support: String,
}

/// A business rule the agents follow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Short policy name
    pub name: String,
    /// Rule text
    #[serde(default)]
    pub rule: String,
}

/// A tracked metric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    /// Metric name
    pub name: String,
    /// Target value
    #[serde(default)]
    pub target: String,
}

/// An automation replacing a manual task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Automation {
    /// What triggers it
    #[serde(default)]
    pub trigger: String,
    /// What it does
    #[serde(default)]
    pub action: String,
}

/// Before/after comparison used by the digitize mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeforeAfter {
    /// Current state
    #[serde(default)]
    pub before: Vec<String>,
    /// State after adoption
    #[serde(default)]
    pub after: Vec<String>,
}

/// Structured business produced by the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessArtifacts {
    /// Business name
    pub name: String,
    /// One-line pitch
    #[serde(default)]
    pub tagline: Option<String>,
    /// Offers
    #[serde(default)]
    pub packages: Vec<Package>,
    /// Target customer
    #[serde(default)]
    pub target: String,
    /// Primary acquisition channel
    #[serde(default)]
    pub channel: String,
    /// First-week goals
    #[serde(default)]
    pub week1_goals: Vec<String>,
    /// Roles
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Operating loops
    #[serde(default)]
    pub loops: Loops,
    /// Policies
    #[serde(default)]
    pub policies: Vec<Policy>,
    /// Metrics
    #[serde(default)]
    pub kpis: Option<Vec<Kpi>>,
    /// Migration steps (digitize mode)
    #[serde(default)]
    pub migration_plan: Option<Vec<String>>,
    /// Automations (digitize mode)
    #[serde(default)]
    pub automations: Option<Vec<Automation>>,
    /// Before/after comparison (digitize mode)
    #[serde(default)]
    pub before_after: Option<BeforeAfter>,
}

/// Request sent to the artifact generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Business description
    pub prompt: String,
    /// UI locale (e.g. `"en"`, `"de"`)
    pub locale: String,
    /// Demo mode
    pub mode: DemoMode,
    /// Region code from the region catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    /// ISO currency code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Industry key from the industry catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_key: Option<String>,
}

/// Response envelope returned by the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    /// Whether generation succeeded
    pub success: bool,
    /// Generated business (present on success)
    #[serde(default)]
    pub artifacts: Option<BusinessArtifacts>,
    /// Failure description
    #[serde(default)]
    pub error: Option<String>,
}
