//! Configuration module for the version pruner.
//!
//! The pruner is configured via an optional TOML file, with support for
//! environment variable interpolation using `${VAR_NAME}` syntax. Values given
//! on the command line override the file.
//!
//! # Example
//!
//! ```toml
//! [function]
//! name = "checkout-api"
//! keep = 5
//!
//! [aws]
//! region = "${AWS_REGION}"
//! ```

mod aws;
mod observability;
mod retention;

use std::path::Path;

pub use aws::*;
pub use observability::*;
pub use retention::*;
use serde::{Deserialize, Serialize};

/// Commented starting point written by `lambda-pruner init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# lambda-pruner configuration

[function]
# Function name or ARN. Can also be given with --function-name.
name = "my-function"
# Unreferenced versions to keep. Versions referenced by an alias are always kept.
keep = 5

[deletion]
max_concurrency = 10
dry_run = true
# 0 = unlimited
max_deletes_per_run = 0

[run]
# 0 disables the deadline
timeout_secs = 300

[aws]
# region = "us-east-1"
# endpoint_url = "http://localhost:4566"

[observability.logging]
level = "info"
format = "compact"
"#;

/// Root configuration.
///
/// Every section is optional. The function name and keep count are required
/// before a run starts but may come from the command line instead of the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrunerConfig {
    /// Function to prune and how many versions to keep.
    #[serde(default)]
    pub function: FunctionConfig,

    /// Deletion concurrency and safety settings.
    #[serde(default)]
    pub deletion: DeletionConfig,

    /// Run-wide limits.
    #[serde(default)]
    pub run: RunConfig,

    /// AWS client configuration.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Function and keep count of a validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneTarget {
    pub function_name: String,
    pub keep: KeepCount,
}

impl PrunerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    ///
    /// Only section-level consistency is checked here; the function name and
    /// keep count are checked by [`PrunerConfig::validate`] once command line
    /// overrides have been applied.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: PrunerConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate_sections()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    pub fn validate(&self) -> Result<PruneTarget, ConfigError> {
        self.validate_sections()?;

        let function_name = self
            .function
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ConfigError::Validation("function name is required".into()))?;

        let keep = self.function.keep.ok_or_else(|| {
            ConfigError::Validation("number of versions to keep is required".into())
        })?;

        Ok(PruneTarget {
            function_name: function_name.to_string(),
            keep,
        })
    }

    fn validate_sections(&self) -> Result<(), ConfigError> {
        if self.deletion.max_concurrency == 0 {
            return Err(ConfigError::Validation(
                "deletion.max_concurrency must be at least 1".into(),
            ));
        }
        self.aws.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }

    /// Set the keep count from user-supplied text.
    pub fn set_keep_from_str(&mut self, raw: &str) -> Result<(), ConfigError> {
        let keep = raw.parse::<KeepCount>().map_err(ConfigError::Validation)?;
        self.function.keep = Some(keep);
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    static PATTERN: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("static pattern is valid")
    });
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in PATTERN.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Variables after a `#` are inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PrunerConfig::from_str("").unwrap();
        assert!(config.function.name.is_none());
        assert!(config.function.keep.is_none());
        assert_eq!(config.deletion.max_concurrency, 10);
        assert_eq!(config.run.timeout_secs, 300);
        assert_eq!(config.observability.logging.format, LogFormat::Compact);
    }

    #[test]
    fn test_full_config() {
        let config = PrunerConfig::from_str(
            r#"
            [function]
            name = "checkout-api"
            keep = 3

            [deletion]
            max_concurrency = 4
            dry_run = true
            max_deletes_per_run = 50

            [run]
            timeout_secs = 60

            [aws]
            region = "eu-west-1"
            endpoint_url = "http://localhost:4566"

            [observability.logging]
            level = "debug"
            format = "json"
        "#,
        )
        .unwrap();

        let target = config.validate().unwrap();
        assert_eq!(target.function_name, "checkout-api");
        assert_eq!(target.keep, KeepCount::new(3));
        assert_eq!(config.deletion.max_concurrency, 4);
        assert!(config.deletion.dry_run);
        assert_eq!(config.deletion.delete_limit(), Some(50));
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.observability.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_default_config_toml_is_valid() {
        let config = PrunerConfig::from_str(DEFAULT_CONFIG_TOML).unwrap();
        let target = config.validate().unwrap();
        assert_eq!(target.function_name, "my-function");
        assert_eq!(target.keep.get(), 5);
        assert!(config.deletion.dry_run);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PrunerConfig::from_str(
            r#"
            [function]
            name = "f"
            keep_versions = 3
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_function_name() {
        let mut config = PrunerConfig::default();
        config.function.keep = Some(KeepCount::new(1));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("function name"), "{err}");
    }

    #[test]
    fn test_blank_function_name() {
        let mut config = PrunerConfig::default();
        config.function.name = Some("   ".into());
        config.function.keep = Some(KeepCount::new(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_keep_count() {
        let mut config = PrunerConfig::default();
        config.function.name = Some("f".into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("keep"), "{err}");
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = PrunerConfig::from_str(
            r#"
            [deletion]
            max_concurrency = 0
        "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_concurrency"), "{err}");
    }

    #[test]
    fn test_set_keep_from_str() {
        let mut config = PrunerConfig::default();
        config.set_keep_from_str("7").unwrap();
        assert_eq!(config.function.keep, Some(KeepCount::new(7)));

        let err = config.set_keep_from_str("seven").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        // A rejected value leaves the previous one in place
        assert_eq!(config.function.keep, Some(KeepCount::new(7)));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("PRUNER_TEST_FUNCTION", Some("from-env"), || {
            let config = PrunerConfig::from_str(
                r#"
                [function]
                name = "${PRUNER_TEST_FUNCTION}"
                keep = 1
            "#,
            )
            .unwrap();
            assert_eq!(config.function.name.as_deref(), Some("from-env"));
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("PRUNER_TEST_MISSING", || {
            let err = PrunerConfig::from_str(r#"name = "${PRUNER_TEST_MISSING}""#).unwrap_err();
            assert!(matches!(err, ConfigError::EnvVarNotFound(ref v) if v == "PRUNER_TEST_MISSING"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# region = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# region = \"${NONEXISTENT_VAR}\"");
    }

    #[test]
    fn test_env_var_after_comment_ignored() {
        let result = expand_env_vars("keep = 3 # ${NONEXISTENT_VAR}").unwrap();
        assert_eq!(result, "keep = 3 # ${NONEXISTENT_VAR}");
    }

    #[test]
    fn test_multiline_with_comments() {
        temp_env::with_var("PRUNER_TEST_MULTI", Some("value1"), || {
            let input = r#"key1 = "${PRUNER_TEST_MULTI}"
# key2 = "${NONEXISTENT}"
key3 = "literal""#;
            let result = expand_env_vars(input).unwrap();
            assert_eq!(
                result,
                r#"key1 = "value1"
# key2 = "${NONEXISTENT}"
key3 = "literal""#
            );
        });
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pruner.toml");
        std::fs::write(&path, "[function]\nname = \"f\"\nkeep = 2\n").unwrap();

        let config = PrunerConfig::from_file(&path).unwrap();
        assert_eq!(config.validate().unwrap().keep.get(), 2);
    }

    #[test]
    fn test_from_missing_file() {
        let err = PrunerConfig::from_file("/nonexistent/pruner.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
