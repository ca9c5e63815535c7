//! AWS Lambda version store.
//!
//! Uses the AWS SDK for Rust with the standard credential chain (environment,
//! profile, instance role), optionally overridden by static credentials from
//! configuration.

use async_trait::async_trait;
use aws_sdk_lambda::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use tracing::{debug, info};

use super::{AliasEntry, Page, StoreError, StoreResult, VersionEntry, VersionStore};
use crate::config::AwsConfig;

/// Version store backed by the Lambda control plane API.
#[derive(Debug, Clone)]
pub struct LambdaVersionStore {
    client: Client,
}

impl LambdaVersionStore {
    /// Build a Lambda client from configuration.
    pub async fn new(config: &AwsConfig) -> Self {
        info!(
            region = config.region.as_deref().unwrap_or("<default>"),
            endpoint = config.endpoint_url.as_deref().unwrap_or("<default>"),
            "Initializing Lambda client"
        );

        let mut sdk_config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            sdk_config_builder = sdk_config_builder.region(aws_config::Region::new(region.clone()));
        }

        if let Some(profile) = &config.profile {
            sdk_config_builder = sdk_config_builder.profile_name(profile);
        }

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = aws_credential_types::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                config.session_token.clone(),
                None, // expiry
                "lambda-pruner-config",
            );
            sdk_config_builder = sdk_config_builder.credentials_provider(credentials);
        }

        sdk_config_builder = sdk_config_builder.retry_config(
            aws_config::retry::RetryConfig::standard().with_max_attempts(config.max_attempts),
        );

        let sdk_config = sdk_config_builder.load().await;

        let mut lambda_config = aws_sdk_lambda::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = &config.endpoint_url {
            lambda_config = lambda_config.endpoint_url(endpoint_url);
        }

        Self::from_client(Client::from_conf(lambda_config.build()))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Translate an SDK error into a [`StoreError`], keeping the service error code.
fn store_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> StoreError
where
    SdkError<E, R>: ProvideErrorMetadata + std::error::Error,
{
    let message = DisplayErrorContext(&err).to_string();
    match err.code() {
        Some("ResourceNotFoundException") => StoreError::NotFound(message),
        Some("TooManyRequestsException") => StoreError::Throttled { operation, message },
        _ => StoreError::Service { operation, message },
    }
}

#[async_trait]
impl VersionStore for LambdaVersionStore {
    async fn list_aliases(
        &self,
        function: &str,
        marker: Option<&str>,
    ) -> StoreResult<Page<AliasEntry>> {
        let output = self
            .client
            .list_aliases()
            .function_name(function)
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .map_err(|e| store_error("ListAliases", e))?;

        let items = output
            .aliases()
            .iter()
            .map(|alias| AliasEntry {
                name: alias.name().unwrap_or_default().to_string(),
                primary_version: alias.function_version().map(str::to_string),
                weighted_versions: alias
                    .routing_config()
                    .and_then(|routing| routing.additional_version_weights())
                    .map(|weights| weights.keys().cloned().collect()),
            })
            .collect::<Vec<_>>();

        debug!(function, count = items.len(), "Listed alias page");

        Ok(Page {
            items,
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    async fn list_versions(
        &self,
        function: &str,
        marker: Option<&str>,
    ) -> StoreResult<Page<VersionEntry>> {
        let output = self
            .client
            .list_versions_by_function()
            .function_name(function)
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .map_err(|e| store_error("ListVersionsByFunction", e))?;

        let items = output
            .versions()
            .iter()
            .map(|v| VersionEntry {
                version: v.version().map(str::to_string),
                last_modified: v.last_modified().map(str::to_string),
            })
            .collect::<Vec<_>>();

        debug!(function, count = items.len(), "Listed version page");

        Ok(Page {
            items,
            next_marker: output.next_marker().map(str::to_string),
        })
    }

    async fn delete_version(&self, function: &str, version: &str) -> StoreResult<()> {
        self.client
            .delete_function()
            .function_name(function)
            .qualifier(version)
            .send()
            .await
            .map_err(|e| store_error("DeleteFunction", e))?;
        Ok(())
    }
}
