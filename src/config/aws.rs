//! AWS client configuration.
//!
//! # Example
//!
//! ```toml
//! [aws]
//! region = "eu-west-1"
//! # LocalStack or another Lambda-compatible endpoint
//! endpoint_url = "http://localhost:4566"
//! max_attempts = 3
//! ```

use serde::{Deserialize, Serialize};

/// Settings for the Lambda client.
///
/// Anything left unset falls back to the standard AWS resolution chain
/// (environment variables, shared config files, instance metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsConfig {
    /// AWS region (e.g., "us-east-1").
    #[serde(default)]
    pub region: Option<String>,

    /// Named profile from the shared AWS config files.
    #[serde(default)]
    pub profile: Option<String>,

    /// Custom endpoint URL, for LocalStack and similar.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Static access key ID. Must be given together with `secret_access_key`.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret access key.
    #[serde(default)]
    pub secret_access_key: Option<String>,

    /// Optional session token for temporary static credentials.
    #[serde(default)]
    pub session_token: Option<String>,

    /// Maximum attempts per request, including the first one.
    /// Default: 3
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

impl AwsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(
                "aws.access_key_id and aws.secret_access_key must be set together".to_string(),
            );
        }
        if self.max_attempts == 0 {
            return Err("aws.max_attempts must be at least 1".to_string());
        }
        if let Some(endpoint) = &self.endpoint_url
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(format!(
                "aws.endpoint_url must start with http:// or https://, got '{endpoint}'"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AwsConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_static_credentials_rejected() {
        let config = AwsConfig {
            access_key_id: Some("AKIA".into()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.contains("secret_access_key"), "{err}");
    }

    #[test]
    fn test_endpoint_scheme_required() {
        let config = AwsConfig {
            endpoint_url: Some("localhost:4566".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config: AwsConfig = toml::from_str("max_attempts = 0").unwrap();
        assert!(config.validate().is_err());
    }
}
