//! Lookup collaborators.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::client::{Endpoint, create_http_client, post_json};
use crate::error::LookupError;

use super::{LookupKind, LookupReport, LookupRequest};

/// External research service.
#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Researches `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] on service or transport failure.
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupReport, LookupError>;
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    success: bool,
    #[serde(default)]
    report: Option<LookupReport>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider backed by the hosted research function.
#[derive(Debug, Clone)]
pub struct HttpLookupProvider {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpLookupProvider {
    /// Creates a provider calling `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: create_http_client(),
            endpoint,
        }
    }
}

#[async_trait]
impl LookupProvider for HttpLookupProvider {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupReport, LookupError> {
        let response: LookupResponse = post_json(&self.client, &self.endpoint, request)
            .await
            .map_err(LookupError::from)?;
        match response {
            LookupResponse {
                success: true,
                report: Some(report),
                ..
            } => Ok(report),
            LookupResponse { error, .. } => {
                let message = error.unwrap_or_else(|| "no report returned".to_string());
                warn!(kind = %request.kind, %message, "lookup failed");
                Err(LookupError::Failed(message))
            }
        }
    }
}

/// Canned provider for offline demos and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineLookupProvider;

#[async_trait]
impl LookupProvider for OfflineLookupProvider {
    async fn lookup(&self, request: &LookupRequest) -> Result<LookupReport, LookupError> {
        let query = request.query.trim();
        let summary = match request.kind {
            LookupKind::Market => format!("Steady local demand for {query}."),
            LookupKind::Competitors => format!("A handful of established players serve {query}."),
            LookupKind::Region => format!("Standard registration rules apply for {query}."),
            LookupKind::Website => format!("{query} loads quickly but lacks online booking."),
        };
        Ok(LookupReport {
            summary,
            highlights: vec![format!("{} check ({})", request.kind, request.locale)],
            sources: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::DemoMode;

    #[tokio::test]
    async fn test_offline_provider_mentions_query() {
        let report = OfflineLookupProvider
            .lookup(&LookupRequest {
                kind: LookupKind::Competitors,
                query: " cleaning Berlin ".to_string(),
                locale: "en".to_string(),
                mode: DemoMode::Zero,
                sub_key: None,
            })
            .await
            .unwrap();
        assert!(report.summary.contains("cleaning Berlin"));
        assert_eq!(report.highlights, vec!["competitors check (en)".to_string()]);
    }

    #[test]
    fn test_response_without_report_deserializes() {
        let parsed: LookupResponse =
            serde_json::from_str(r#"{"success":false,"error":"quota"}"#).unwrap();
        assert!(!parsed.success);
        assert!(parsed.report.is_none());
        assert_eq!(parsed.error.as_deref(), Some("quota"));
    }
}
