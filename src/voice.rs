//! Voice briefing.
//!
//! Composes a short spoken summary of the generated business and sends it
//! to a text-to-speech collaborator. Audio comes back base64-encoded and is
//! decoded here; playback is the caller's concern.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::artifacts::BusinessArtifacts;
use crate::client::{Endpoint, create_http_client, post_json};
use crate::error::VoiceError;
use crate::inflight::InFlight;
use crate::observability::metrics;

/// Synthesis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceRequest {
    /// Text to speak
    pub text: String,
    /// Voice locale
    pub locale: String,
}

/// Raw synthesis response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceResponse {
    /// Base64-encoded audio
    pub audio_content: String,
    /// Text actually spoken
    #[serde(default)]
    pub transcript: String,
}

/// Decoded briefing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceBriefing {
    /// Audio bytes
    pub audio: Vec<u8>,
    /// Text actually spoken
    pub transcript: String,
}

impl TryFrom<VoiceResponse> for VoiceBriefing {
    type Error = VoiceError;

    fn try_from(response: VoiceResponse) -> Result<Self, Self::Error> {
        let audio = STANDARD
            .decode(response.audio_content.trim())
            .map_err(|e| VoiceError::InvalidAudio(e.to_string()))?;
        if audio.is_empty() {
            return Err(VoiceError::InvalidAudio("empty audio".to_string()));
        }
        Ok(Self {
            audio,
            transcript: response.transcript,
        })
    }
}

/// Text-to-speech collaborator.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    /// Synthesizes `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`VoiceError`] on service, transport, or decoding failure.
    async fn synthesize(&self, request: &VoiceRequest) -> Result<VoiceBriefing, VoiceError>;
}

/// Synthesizer backed by the hosted TTS function.
#[derive(Debug, Clone)]
pub struct HttpVoiceSynthesizer {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpVoiceSynthesizer {
    /// Creates a synthesizer calling `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: create_http_client(),
            endpoint,
        }
    }
}

#[async_trait]
impl VoiceSynthesizer for HttpVoiceSynthesizer {
    async fn synthesize(&self, request: &VoiceRequest) -> Result<VoiceBriefing, VoiceError> {
        let response: VoiceResponse = post_json(&self.client, &self.endpoint, request)
            .await
            .map_err(VoiceError::from)?;
        VoiceBriefing::try_from(response)
    }
}

/// Spoken summary of `artifacts` in `locale`.
#[must_use]
pub fn briefing_text(artifacts: &BusinessArtifacts, locale: &str) -> String {
    let lang = locale.split(['-', '_']).next().unwrap_or("en");
    let roles = artifacts
        .roles
        .iter()
        .map(|r| r.title.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let first_goal = artifacts.week1_goals.first().map_or("", String::as_str);
    let mut text = match lang {
        "de" => format!(
            "Willkommen bei {}. {} Pakete, Team: {roles}.",
            artifacts.name,
            artifacts.packages.len()
        ),
        "es" => format!(
            "Bienvenido a {}. {} paquetes, equipo: {roles}.",
            artifacts.name,
            artifacts.packages.len()
        ),
        "fr" => format!(
            "Bienvenue chez {}. {} offres, équipe : {roles}.",
            artifacts.name,
            artifacts.packages.len()
        ),
        _ => format!(
            "Welcome to {}. {} packages, team: {roles}.",
            artifacts.name,
            artifacts.packages.len()
        ),
    };
    if !first_goal.is_empty() {
        text.push(' ');
        text.push_str(first_goal);
        text.push('.');
    }
    text
}

/// Single-flight voice briefing service.
pub struct VoiceBriefer {
    synthesizer: Arc<dyn VoiceSynthesizer>,
    in_flight: InFlight,
}

impl std::fmt::Debug for VoiceBriefer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceBriefer")
            .field("busy", &self.in_flight.is_busy())
            .finish_non_exhaustive()
    }
}

impl VoiceBriefer {
    /// Creates a briefer using `synthesizer`.
    #[must_use]
    pub fn new(synthesizer: Arc<dyn VoiceSynthesizer>) -> Self {
        Self {
            synthesizer,
            in_flight: InFlight::new(),
        }
    }

    /// Synthesizes the briefing for `artifacts`.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Busy` while another briefing is running, or the
    /// synthesizer's error.
    pub async fn brief(
        &self,
        artifacts: &BusinessArtifacts,
        locale: &str,
    ) -> Result<VoiceBriefing, VoiceError> {
        let Some(_guard) = self.in_flight.try_begin() else {
            return Err(VoiceError::Busy);
        };
        let request = VoiceRequest {
            text: briefing_text(artifacts, locale),
            locale: locale.to_string(),
        };
        debug!(chars = request.text.chars().count(), "requesting voice briefing");
        match self.synthesizer.synthesize(&request).await {
            Ok(briefing) => {
                metrics::record_voice("success");
                Ok(briefing)
            }
            Err(e) => {
                warn!(error = %e, "voice briefing failed");
                metrics::record_voice("failure");
                Err(e)
            }
        }
    }
}
