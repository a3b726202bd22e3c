//! Configuration loader.
//!
//! Pipeline:
//! 1. Environment variable expansion on the raw text (`${VAR}`,
//!    `${VAR:-default}`, `${VAR:?message}`, `$$`)
//! 2. YAML parsing into [`DemoConfig`]
//! 3. `TESTDAY_*` environment overrides
//! 4. Validation
//! 5. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::schema::DemoConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Largest configuration file accepted.
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

// ============================================================================
// Public API
// ============================================================================

/// Result of loading a configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<DemoConfig>,
    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,
    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Loads a configuration file, or the defaults when `path` is `None`.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read or parsed, an
/// environment reference cannot be resolved, or validation fails.
pub fn load_config(path: Option<&Path>) -> Result<LoadResult, ConfigError> {
    let (config, mut warnings, label) = match path {
        Some(path) => {
            let (config, warnings) = parse_file(path)?;
            (config, warnings, path.display().to_string())
        }
        None => (DemoConfig::default(), Vec::new(), "<defaults>".to_string()),
    };

    let config = apply_env_overrides(config);

    let result = Validator::new().validate(&config);
    if result.has_errors() {
        return Err(ConfigError::ValidationError {
            path: label,
            errors: result.errors,
        });
    }
    warnings.extend(result.warnings.into_iter().map(|issue| LoadWarning {
        message: issue.message,
        location: Some(issue.path),
    }));

    Ok(LoadResult {
        config: Arc::new(config),
        warnings,
    })
}

/// Applies `TESTDAY_*` environment overrides.
///
/// Unparsable values are ignored and the configured value kept.
#[must_use]
pub fn apply_env_overrides(mut config: DemoConfig) -> DemoConfig {
    config.timeline.step = env_or("TESTDAY_STEP", config.timeline.step);
    config.timeline.tick_interval = env_or("TESTDAY_TICK_INTERVAL", config.timeline.tick_interval);
    config.locale.default = env_or("TESTDAY_LOCALE", config.locale.default);
    config.lookup.limit_per_session =
        env_or("TESTDAY_LOOKUP_LIMIT", config.lookup.limit_per_session);
    if let Ok(url) = std::env::var("TESTDAY_GENERATOR_URL") {
        config.generator.url = Some(url).filter(|u| !u.is_empty());
    }
    if let Ok(path) = std::env::var("TESTDAY_SNAPSHOT") {
        config.snapshot.path = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
    }
    config
}

fn parse_file(path: &Path) -> Result<(DemoConfig, Vec<LoadWarning>), ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(ConfigError::InvalidValue {
            field: "file_size".to_string(),
            value: format!("{} bytes", metadata.len()),
            expected: format!("at most {MAX_CONFIG_SIZE} bytes"),
        });
    }

    let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

    let mut env_sub = EnvSubstitution::new();
    let substituted = env_sub.substitute(raw, path)?;

    // An empty document means "all defaults".
    if substituted.trim().is_empty() {
        return Ok((DemoConfig::default(), env_sub.warnings));
    }

    let config: DemoConfig =
        serde_yaml::from_str(&substituted).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

    Ok((config, env_sub.warnings))
}

// ============================================================================
// Environment Substitution
// ============================================================================

/// Pre-parse environment variable substitution on raw YAML text.
struct EnvSubstitution {
    warnings: Vec<LoadWarning>,
}

impl EnvSubstitution {
    const fn new() -> Self {
        Self {
            warnings: Vec::new(),
        }
    }

    fn substitute(&mut self, raw: &str, source: &Path) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(raw.len());
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    result.push('$');
                }
                Some('{') => {
                    chars.next();
                    let expr = Self::read_until_close(&mut chars).ok_or_else(|| {
                        ConfigError::ParseError {
                            path: source.to_path_buf(),
                            line: None,
                            message: "unclosed environment variable reference".to_string(),
                        }
                    })?;
                    self.expand(&expr, source, &mut result)?;
                }
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    fn expand(&mut self, expr: &str, source: &Path, out: &mut String) -> Result<(), ConfigError> {
        let (name, modifier) = match expr.split_once(':') {
            Some((name, rest)) => (name, Some(rest)),
            None => (expr, None),
        };

        if let Ok(value) = std::env::var(name) {
            out.push_str(&value);
            return Ok(());
        }

        if let Some(default) = modifier.and_then(|m| m.strip_prefix('-')) {
            out.push_str(default);
        } else if let Some(message) = modifier.and_then(|m| m.strip_prefix('?')) {
            return Err(ConfigError::EnvVarNotSet {
                var: name.to_string(),
                location: message.to_string(),
            });
        } else {
            self.warnings.push(LoadWarning {
                message: format!("Environment variable '{name}' is not set, using empty string"),
                location: Some(source.display().to_string()),
            });
        }
        Ok(())
    }

    /// Reads up to the matching `}`, allowing nested braces in defaults.
    fn read_until_close(chars: &mut std::iter::Peekable<std::str::Chars>) -> Option<String> {
        let mut value = String::new();
        let mut depth = 1;
        for c in chars.by_ref() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(value);
                    }
                }
                _ => {}
            }
            value.push(c);
        }
        None
    }
}

/// Parses an environment variable, falling back to `default`.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn substitute(raw: &str) -> Result<String, ConfigError> {
        EnvSubstitution::new().substitute(raw, Path::new("test.yaml"))
    }

    #[test]
    fn test_substitution_default_and_escape() {
        let out = substitute("a: ${TESTDAY_TEST_SURELY_UNSET:-fallback}\nb: $$5").unwrap();
        assert_eq!(out, "a: fallback\nb: $5");
    }

    #[test]
    fn test_substitution_reads_set_variable() {
        // PATH is set in every test environment.
        let out = substitute("p: ${PATH}").unwrap();
        assert!(out.len() > "p: ".len());
    }

    #[test]
    fn test_substitution_required_missing_fails() {
        let err = substitute("k: ${TESTDAY_TEST_SURELY_UNSET:?api key needed}").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotSet { .. }));
    }

    #[test]
    fn test_substitution_missing_warns() {
        let mut sub = EnvSubstitution::new();
        let out = sub
            .substitute("k: '${TESTDAY_TEST_SURELY_UNSET}'", Path::new("x.yaml"))
            .unwrap();
        assert_eq!(out, "k: ''");
        assert_eq!(sub.warnings.len(), 1);
    }

    #[test]
    fn test_substitution_unclosed_fails() {
        assert!(substitute("k: ${OOPS").is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let result = load_config(None).unwrap();
        assert_eq!(result.config.lookup.limit_per_session, 2);
        assert!(!result.config.regions.is_empty());
    }

    #[test]
    fn test_load_file() {
        let file = write_config(
            "delays:\n  evidence_reveal: ${TESTDAY_TEST_SURELY_UNSET:-3s}\nlookup:\n  limit_per_session: 4\n",
        );
        let result = load_config(Some(file.path())).unwrap();
        assert_eq!(result.config.delays.evidence_reveal, "3s");
        assert_eq!(result.config.lookup.limit_per_session, 4);
    }

    #[test]
    fn test_load_empty_file_is_defaults() {
        let file = write_config("\u{feff}\n");
        let result = load_config(Some(file.path())).unwrap();
        assert_eq!(*result.config, DemoConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Some(Path::new("/nonexistent/testday.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_load_reports_parse_error() {
        let file = write_config("timeline: [not, a, mapping\n");
        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let file = write_config("timeline:\n  step: -1\n");
        let err = load_config(Some(file.path())).unwrap_err();
        match err {
            ConfigError::ValidationError { errors, .. } => {
                assert!(errors.iter().any(|e| e.path == "timeline.step"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("TESTDAY_TEST_SURELY_UNSET", 7_u32), 7);
        assert_eq!(env_or("PATH", 7_u32), 7);
    }
}
