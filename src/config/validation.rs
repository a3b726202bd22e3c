//! Configuration validation.
//!
//! Runs on the fully deserialized [`DemoConfig`] and collects every issue
//! rather than stopping at the first.

use std::collections::HashSet;

use crate::config::schema::{DemoConfig, ServiceConfig, parse_duration};
use crate::error::{Severity, ValidationIssue};
use crate::timeline::{MAX_PROGRESS, PlaybackSpeed};

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Issues that prevent loading.
    pub errors: Vec<ValidationIssue>,
    /// Informational issues.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `config`.
    pub fn validate(&mut self, config: &DemoConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_timeline(config);
        self.validate_delays(config);
        self.validate_locale(config);
        self.validate_service("generator", &config.generator);
        self.validate_service("voice", &config.voice);
        self.validate_lookup(config);
        self.validate_regions(config);
        self.validate_industries(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_timeline(&mut self, config: &DemoConfig) {
        let step = config.timeline.step;
        if !step.is_finite() || step <= 0.0 {
            self.add_error("timeline.step", "Step must be a positive number");
        } else if step > MAX_PROGRESS {
            self.add_error("timeline.step", "Step cannot exceed 100");
        } else if step >= 12.5 {
            self.add_warning(
                "timeline.step",
                "Step is coarser than the event spacing; events will be skipped in the live log",
            );
        }
        self.check_period("timeline.tick_interval", &config.timeline.tick_interval);

        let speeds = &config.timeline.replay_speeds;
        for (i, &value) in speeds.iter().enumerate() {
            if PlaybackSpeed::from_multiplier(value).is_none() {
                self.add_error(
                    &format!("timeline.replay_speeds[{i}]"),
                    "Replay speed must be one of 0.5, 1, 2, 4",
                );
            }
        }
        if !speeds.iter().any(|&v| (v - 1.0).abs() < f64::EPSILON) {
            self.add_error(
                "timeline.replay_speeds",
                "Replay speeds must include 1 (the default speed)",
            );
        }
    }

    fn validate_delays(&mut self, config: &DemoConfig) {
        let delays = &config.delays;
        self.check_duration("delays.decision_confirm", &delays.decision_confirm);
        self.check_duration("delays.decided_resume", &delays.decided_resume);
        self.check_duration("delays.evidence_reveal", &delays.evidence_reveal);
        self.check_period("delays.replay_tick", &delays.replay_tick);
    }

    fn validate_locale(&mut self, config: &DemoConfig) {
        let locale = &config.locale;
        if locale.default.trim().is_empty() {
            self.add_error("locale.default", "Default locale cannot be empty");
        } else if !locale.supported.iter().any(|l| l == &locale.default) {
            self.add_warning(
                "locale.default",
                "Default locale is not in locale.supported; messages fall back to English",
            );
        }
    }

    fn validate_service(&mut self, field: &str, service: &ServiceConfig) {
        if let Some(url) = &service.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                self.add_error(&format!("{field}.url"), "URL must use http:// or https://");
            }
        }
        self.check_duration(&format!("{field}.timeout"), &service.timeout);
    }

    fn validate_lookup(&mut self, config: &DemoConfig) {
        self.validate_service("lookup", &config.lookup.service);
        self.check_duration("lookup.cache_ttl", &config.lookup.cache_ttl);
        if config.lookup.limit_per_session == 0 {
            self.add_warning(
                "lookup.limit_per_session",
                "Limit is 0; every reality check will report exhausted",
            );
        }
    }

    fn validate_regions(&mut self, config: &DemoConfig) {
        let mut seen = HashSet::new();
        for (i, region) in config.regions.iter().enumerate() {
            let path = format!("regions[{i}]");
            if region.code.trim().is_empty() {
                self.add_error(&format!("{path}.code"), "Region code cannot be empty");
            } else if !seen.insert(region.code.to_ascii_uppercase()) {
                self.add_error(
                    &format!("{path}.code"),
                    &format!("Duplicate region code '{}'", region.code),
                );
            }
            if !is_currency_code(&region.currency) {
                self.add_error(
                    &format!("{path}.currency"),
                    "Currency must be a three-letter ISO 4217 code",
                );
            }
        }
    }

    fn validate_industries(&mut self, config: &DemoConfig) {
        let mut seen = HashSet::new();
        for (i, key) in config.industries.iter().enumerate() {
            if key.trim().is_empty() {
                self.add_error(&format!("industries[{i}]"), "Industry key cannot be empty");
            } else if !seen.insert(key.as_str()) {
                self.add_warning(
                    &format!("industries[{i}]"),
                    &format!("Duplicate industry key '{key}'"),
                );
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_duration(&mut self, path: &str, value: &str) {
        if let Err(e) = parse_duration(path, value) {
            self.add_error(path, &e.to_string());
        }
    }

    /// Like `check_duration`, but a periodic timer also needs a non-zero period.
    fn check_period(&mut self, path: &str, value: &str) {
        match parse_duration(path, value) {
            Ok(period) if period.is_zero() => self.add_error(path, "Period must be non-zero"),
            Ok(_) => {}
            Err(e) => self.add_error(path, &e.to_string()),
        }
    }

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RegionEntry;

    fn validate(config: &DemoConfig) -> ValidationResult {
        Validator::new().validate(config)
    }

    #[test]
    fn test_default_config_is_valid() {
        let result = validate(&DemoConfig::default());
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    }

    #[test]
    fn test_non_positive_step_is_error() {
        let mut config = DemoConfig::default();
        config.timeline.step = 0.0;
        let result = validate(&config);
        assert!(result.errors.iter().any(|e| e.path == "timeline.step"));

        config.timeline.step = f64::NAN;
        assert!(validate(&config).has_errors());
    }

    #[test]
    fn test_coarse_step_is_warning() {
        let mut config = DemoConfig::default();
        config.timeline.step = 20.0;
        let result = validate(&config);
        assert!(!result.has_errors());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = DemoConfig::default();
        config.delays.decision_confirm = "later".to_string();
        config.generator.url = Some("ftp://example.invalid".to_string());
        config.regions.push(RegionEntry {
            code: "DE".to_string(),
            name: "Germany again".to_string(),
            currency: "euro".to_string(),
        });
        let result = validate(&config);
        let paths: Vec<&str> = result.errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"delays.decision_confirm"));
        assert!(paths.contains(&"generator.url"));
        assert!(paths.iter().any(|p| p.ends_with(".code")));
        assert!(paths.iter().any(|p| p.ends_with(".currency")));
    }

    #[test]
    fn test_zero_tick_interval_is_error() {
        let mut config = DemoConfig::default();
        config.timeline.tick_interval = "0s".to_string();
        let result = validate(&config);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "timeline.tick_interval")
        );
    }

    #[test]
    fn test_replay_speeds_must_be_known_and_include_default() {
        let mut config = DemoConfig::default();
        config.timeline.replay_speeds = vec![2.0, 3.0];
        let result = validate(&config);
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "timeline.replay_speeds[1]")
        );
        assert!(
            result
                .errors
                .iter()
                .any(|e| e.path == "timeline.replay_speeds")
        );
    }

    #[test]
    fn test_zero_lookup_limit_warns() {
        let mut config = DemoConfig::default();
        config.lookup.limit_per_session = 0;
        let result = validate(&config);
        assert!(!result.has_errors());
        assert!(
            result
                .warnings
                .iter()
                .any(|w| w.path == "lookup.limit_per_session")
        );
    }

    #[test]
    fn test_issue_display() {
        let mut config = DemoConfig::default();
        config.locale.default = String::new();
        let result = validate(&config);
        assert_eq!(
            result.errors[0].to_string(),
            "error: Default locale cannot be empty at locale.default"
        );
    }
}
