//! Configuration schema.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working offline demo. Durations are humantime strings (`"600ms"`,
//! `"24h"`) kept verbatim here and parsed by the accessors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::Endpoint;
use crate::error::ConfigError;
use crate::session::Timing;
use crate::timeline::{Driver, PlaybackSpeed};

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// Root configuration of the demo engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DemoConfig {
    /// Live timeline driver
    pub timeline: TimelineConfig,
    /// Phase auto-advance delays
    pub delays: DelayConfig,
    /// Locale used when the caller supplies none
    pub locale: LocaleConfig,
    /// Artifact generation collaborator
    pub generator: ServiceConfig,
    /// Reality-check lookups
    pub lookup: LookupConfig,
    /// Voice briefing collaborator
    pub voice: ServiceConfig,
    /// Session snapshot persistence
    pub snapshot: SnapshotConfig,
    /// Region catalog (code → display name and currency)
    pub regions: Vec<RegionEntry>,
    /// Known industry keys
    pub industries: Vec<String>,
}

impl DemoConfig {
    /// Driver built from the timeline settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the tick interval is not a
    /// valid duration.
    pub fn driver(&self) -> Result<Driver, ConfigError> {
        let interval = parse_duration("timeline.tick_interval", &self.timeline.tick_interval)?;
        Ok(Driver::new(self.timeline.step, interval))
    }

    /// Phase delays.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for the first unparsable delay.
    pub fn timing(&self) -> Result<Timing, ConfigError> {
        let delays = &self.delays;
        Ok(Timing {
            decision_confirm: parse_duration("delays.decision_confirm", &delays.decision_confirm)?,
            decided_resume: parse_duration("delays.decided_resume", &delays.decided_resume)?,
            evidence_reveal: parse_duration("delays.evidence_reveal", &delays.evidence_reveal)?,
            playback_interval: parse_duration("delays.replay_tick", &delays.replay_tick)?,
        })
    }

    /// Replay speeds the session may switch between.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a multiplier other than
    /// 0.5, 1, 2 or 4.
    pub fn replay_speeds(&self) -> Result<Vec<PlaybackSpeed>, ConfigError> {
        self.timeline
            .replay_speeds
            .iter()
            .map(|&value| {
                PlaybackSpeed::from_multiplier(value).ok_or_else(|| ConfigError::InvalidValue {
                    field: "timeline.replay_speeds".to_string(),
                    value: value.to_string(),
                    expected: "one of 0.5, 1, 2, 4".to_string(),
                })
            })
            .collect()
    }

    /// Region code → currency map for launch completion.
    #[must_use]
    pub fn region_currencies(&self) -> HashMap<String, String> {
        self.regions
            .iter()
            .map(|r| (r.code.clone(), r.currency.clone()))
            .collect()
    }

    /// Looks up a region by code (case-insensitive).
    #[must_use]
    pub fn region(&self, code: &str) -> Option<&RegionEntry> {
        self.regions
            .iter()
            .find(|r| r.code.eq_ignore_ascii_case(code))
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Live timeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Time between driver ticks
    pub tick_interval: String,
    /// Progress added per tick, in percent
    pub step: f64,
    /// Replay speed multipliers offered to the user
    pub replay_speeds: Vec<f64>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            tick_interval: "100ms".to_string(),
            step: 0.5,
            replay_speeds: PlaybackSpeed::ALL.map(PlaybackSpeed::multiplier).to_vec(),
        }
    }
}

/// Auto-advance delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    /// DECISION choice → DECIDED
    pub decision_confirm: String,
    /// DECIDED → RUNNING
    pub decided_resume: String,
    /// EVIDENCE → REPLAY
    pub evidence_reveal: String,
    /// Replay auto-advance tick
    pub replay_tick: String,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            decision_confirm: "600ms".to_string(),
            decided_resume: "400ms".to_string(),
            evidence_reveal: "1500ms".to_string(),
            replay_tick: "100ms".to_string(),
        }
    }
}

/// Locale settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Default UI locale
    pub default: String,
    /// Locales with localized copy
    pub supported: Vec<String>,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            default: "en".to_string(),
            supported: ["en", "de", "es", "fr"].map(String::from).to_vec(),
        }
    }
}

/// A remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Endpoint URL; the collaborator is disabled (or offline) when unset
    pub url: Option<String>,
    /// Name of the environment variable holding the bearer key
    pub api_key_env: Option<String>,
    /// Per-request timeout
    pub timeout: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_env: Some("TESTDAY_API_KEY".to_string()),
            timeout: "30s".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Resolves the endpoint, reading the API key from the environment.
    ///
    /// Returns `Ok(None)` when no URL is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the timeout does not parse.
    pub fn endpoint(&self, field: &str) -> Result<Option<Endpoint>, ConfigError> {
        let Some(url) = &self.url else {
            return Ok(None);
        };
        let timeout = parse_duration(&format!("{field}.timeout"), &self.timeout)?;
        let api_key = self
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty());
        Ok(Some(Endpoint {
            url: url.clone(),
            api_key,
            timeout,
        }))
    }
}

/// Reality-check lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Remote endpoint
    #[serde(flatten)]
    pub service: ServiceConfig,
    /// Checks allowed per session, cache hits included
    pub limit_per_session: u32,
    /// How long cached answers stay fresh
    pub cache_ttl: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            limit_per_session: 2,
            cache_ttl: "24h".to_string(),
        }
    }
}

impl LookupConfig {
    /// Parsed cache TTL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the TTL does not parse.
    pub fn cache_ttl(&self) -> Result<Duration, ConfigError> {
        parse_duration("lookup.cache_ttl", &self.cache_ttl)
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// File the session is persisted to; persistence is off when unset
    pub path: Option<PathBuf>,
}

/// One entry of the region catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionEntry {
    /// Region code (ISO 3166-1 alpha-2)
    pub code: String,
    /// Display name
    pub name: String,
    /// ISO 4217 currency
    pub currency: String,
}

impl RegionEntry {
    fn new(code: &str, name: &str, currency: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            currency: currency.to_string(),
        }
    }
}

/// Built-in region catalog.
#[must_use]
pub fn default_regions() -> Vec<RegionEntry> {
    vec![
        RegionEntry::new("DE", "Germany", "EUR"),
        RegionEntry::new("AT", "Austria", "EUR"),
        RegionEntry::new("CH", "Switzerland", "CHF"),
        RegionEntry::new("FR", "France", "EUR"),
        RegionEntry::new("ES", "Spain", "EUR"),
        RegionEntry::new("GB", "United Kingdom", "GBP"),
        RegionEntry::new("US", "United States", "USD"),
    ]
}

/// Built-in industry keys.
#[must_use]
pub fn default_industries() -> Vec<String> {
    [
        "cleaning",
        "bakery",
        "consulting",
        "fitness",
        "ecommerce",
        "handyman",
    ]
    .map(String::from)
    .to_vec()
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            timeline: TimelineConfig::default(),
            delays: DelayConfig::default(),
            locale: LocaleConfig::default(),
            generator: ServiceConfig::default(),
            lookup: LookupConfig::default(),
            voice: ServiceConfig::default(),
            snapshot: SnapshotConfig::default(),
            regions: default_regions(),
            industries: default_industries(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parses a humantime duration, naming `field` on failure.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if `value` is not a duration.
pub fn parse_duration(field: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: format!("a duration such as \"600ms\" ({e})"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_timing() {
        let config = DemoConfig::default();
        assert_eq!(config.timing().unwrap(), Timing::default());
        assert_eq!(config.driver().unwrap(), Driver::default());
    }

    #[test]
    fn test_empty_yaml_deserializes_to_defaults() {
        let config: DemoConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, DemoConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
timeline:
  step: 1.0
delays:
  evidence_reveal: "2s"
lookup:
  url: "https://example.invalid/lookup"
  limit_per_session: 5
regions:
  - { code: "CH", name: "Switzerland", currency: "CHF" }
"#;
        let config: DemoConfig = serde_yaml::from_str(yaml).unwrap();
        assert!((config.timeline.step - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.timeline.tick_interval, "100ms");
        let timing = config.timing().unwrap();
        assert_eq!(timing.evidence_reveal, Duration::from_secs(2));
        assert_eq!(timing.decision_confirm, Duration::from_millis(600));
        assert_eq!(config.lookup.limit_per_session, 5);
        assert_eq!(
            config.lookup.service.url.as_deref(),
            Some("https://example.invalid/lookup")
        );
        assert_eq!(config.region_currencies()["CH"], "CHF");
    }

    #[test]
    fn test_bad_duration_names_field() {
        let mut config = DemoConfig::default();
        config.delays.decided_resume = "soon".to_string();
        let err = config.timing().unwrap_err();
        assert!(err.to_string().contains("delays.decided_resume"));
    }

    #[test]
    fn test_service_without_url_is_disabled() {
        assert!(
            ServiceConfig::default()
                .endpoint("generator")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_service_endpoint_parses_timeout() {
        let service = ServiceConfig {
            url: Some("http://127.0.0.1:9/generate".to_string()),
            api_key_env: None,
            timeout: "5s".to_string(),
        };
        let endpoint = service.endpoint("generator").unwrap().unwrap();
        assert_eq!(endpoint.timeout, Duration::from_secs(5));
        assert!(endpoint.api_key.is_none());
    }

    #[test]
    fn test_replay_speeds_parse() {
        let config: DemoConfig =
            serde_yaml::from_str("timeline:\n  replay_speeds: [1, 2]\n").unwrap();
        assert_eq!(
            config.replay_speeds().unwrap(),
            vec![PlaybackSpeed::Normal, PlaybackSpeed::Double]
        );
        assert_eq!(
            DemoConfig::default().replay_speeds().unwrap(),
            PlaybackSpeed::ALL.to_vec()
        );
    }

    #[test]
    fn test_unknown_replay_speed_names_field() {
        let mut config = DemoConfig::default();
        config.timeline.replay_speeds = vec![3.0];
        let err = config.replay_speeds().unwrap_err();
        assert!(err.to_string().contains("timeline.replay_speeds"));
    }

    #[test]
    fn test_region_lookup_is_case_insensitive() {
        let config = DemoConfig::default();
        assert_eq!(config.region("gb").unwrap().currency, "GBP");
        assert!(config.region("XX").is_none());
    }
}
