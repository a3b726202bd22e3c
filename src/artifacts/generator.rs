//! Artifact generation collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::{Endpoint, create_http_client, post_json};
use crate::error::GenerationError;

use super::types::{
    BusinessArtifacts, DemoMode, GenerationRequest, GenerationResponse, Loops, Package, Policy,
    Role,
};

/// External service that turns a prompt into business artifacts.
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    /// Generates artifacts for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] for service rejections, malformed
    /// payloads, and transport failures alike; the session treats all of
    /// them as "generation failed".
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<BusinessArtifacts, GenerationError>;
}

/// Unwraps a response envelope into artifacts.
///
/// # Errors
///
/// `success: false` maps to `Rejected`; `success: true` without artifacts,
/// or with an empty business name, maps to `Malformed`.
pub fn into_artifacts(response: GenerationResponse) -> Result<BusinessArtifacts, GenerationError> {
    if !response.success {
        return Err(GenerationError::Rejected(
            response
                .error
                .unwrap_or_else(|| "unspecified error".to_string()),
        ));
    }
    match response.artifacts {
        Some(artifacts) if !artifacts.name.trim().is_empty() => Ok(artifacts),
        Some(_) => Err(GenerationError::Malformed(
            "artifacts have no business name".to_string(),
        )),
        None => Err(GenerationError::Malformed(
            "success response without artifacts".to_string(),
        )),
    }
}

/// User-facing message shown when generation fails.
#[must_use]
pub fn localized_failure(locale: &str) -> &'static str {
    let lang = locale.split(['-', '_']).next().unwrap_or("en");
    match lang {
        "de" => "Das hat nicht geklappt. Bitte versuche es noch einmal.",
        "es" => "Algo salió mal. Por favor, inténtalo de nuevo.",
        "fr" => "Une erreur est survenue. Merci de réessayer.",
        _ => "Something went wrong. Please try again.",
    }
}

// ============================================================================
// HTTP generator
// ============================================================================

/// Generator backed by the hosted generation function.
#[derive(Debug, Clone)]
pub struct HttpArtifactGenerator {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpArtifactGenerator {
    /// Creates a generator calling `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: create_http_client(),
            endpoint,
        }
    }
}

#[async_trait]
impl ArtifactGenerator for HttpArtifactGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<BusinessArtifacts, GenerationError> {
        let response: GenerationResponse = post_json(&self.client, &self.endpoint, request)
            .await
            .map_err(GenerationError::from)?;
        into_artifacts(response).inspect_err(|e| warn!(error = %e, "generation failed"))
    }
}

// ============================================================================
// Offline generator
// ============================================================================

/// Deterministic generator that needs no network.
///
/// Builds a plausible business from the prompt text; used by the CLI's
/// `--offline` mode and by tests. Counts invocations so callers can assert
/// that a launch reached the collaborator exactly once.
#[derive(Debug, Default)]
pub struct OfflineGenerator {
    calls: AtomicU64,
    fixed_name: Option<String>,
}

impl OfflineGenerator {
    /// Creates an offline generator deriving the name from the prompt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an offline generator that always names the business `name`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fixed_name: Some(name.into()),
        }
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Wraps the generator for sharing with an engine.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl ArtifactGenerator for OfflineGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<BusinessArtifacts, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(prompt = %request.prompt, "offline generation");
        let name = self
            .fixed_name
            .clone()
            .unwrap_or_else(|| business_name_from(&request.prompt));
        Ok(canned_artifacts(name, request))
    }
}

/// Picks a short business name from the longest word of the prompt.
fn business_name_from(prompt: &str) -> String {
    let word = prompt
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        // max_by_key keeps the last maximum; reverse so the first one wins
        .rev()
        .max_by_key(|w| w.chars().count())
        .unwrap_or("Demo");
    let mut chars = word.chars();
    let capitalized: String = chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect())
        .unwrap_or_default();
    format!("{capitalized}Co")
}

fn canned_artifacts(name: String, request: &GenerationRequest) -> BusinessArtifacts {
    let currency = request.currency.as_deref().unwrap_or("EUR");
    let mut artifacts = BusinessArtifacts {
        tagline: Some(format!("{name}, run by agents from day one")),
        name,
        packages: vec![
            Package {
                name: "Starter".to_string(),
                price: Some(format!("49 {currency}")),
                includes: vec!["Single visit".to_string()],
            },
            Package {
                name: "Monthly".to_string(),
                price: Some(format!("179 {currency}")),
                includes: vec!["Four visits".to_string(), "Priority booking".to_string()],
            },
        ],
        target: "Busy professionals nearby".to_string(),
        channel: "Local search and referrals".to_string(),
        week1_goals: vec![
            "Publish the booking page".to_string(),
            "Land the first three customers".to_string(),
        ],
        roles: vec![
            Role {
                title: "Sales agent".to_string(),
                responsibilities: vec!["Answer inquiries".to_string()],
            },
            Role {
                title: "Ops agent".to_string(),
                responsibilities: vec!["Schedule jobs".to_string()],
            },
        ],
        loops: Loops {
            sell: "Inquiry → quote → booking".to_string(),
            deliver: "Booking → job → photo proof".to_string(),
            money: "Invoice on completion".to_string(),
            support: "Complaints escalated within 1h".to_string(),
        },
        policies: vec![Policy {
            name: "Refunds".to_string(),
            rule: "Refunds above 50 need owner approval".to_string(),
        }],
        ..BusinessArtifacts::default()
    };
    if request.mode == DemoMode::Digitize {
        artifacts.migration_plan = Some(vec![
            "Import existing customer list".to_string(),
            "Move bookings off the phone".to_string(),
        ]);
    }
    artifacts
}
