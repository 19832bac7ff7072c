// Configuration loading - dispatcher tuning, provider scopes and catalog overrides
use crate::application::dispatcher::{DEFAULT_CONCURRENCY_LIMIT, DEFAULT_TIMEOUT, Dispatcher};
use crate::application::metric_catalog::{CatalogEntry, MetricCatalog};
use crate::application::provider_adapter::ProviderAdapter;
use crate::application::retry::RetryPolicy;
use crate::domain::metric_query::Aggregation;
use crate::domain::provider::Provider;
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MonitoringConfig {
    pub dispatcher: DispatcherSettings,
    pub aws: AwsSettings,
    pub gcp: GcpSettings,
    pub azure: AzureSettings,
    /// Extra or replacement catalog entries, layered over the built-in ones.
    pub catalog: Vec<CatalogEntryConfig>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DispatcherSettings {
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_attempts: u32,
    pub concurrency_limit: usize,
    pub default_timeout_secs: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            base_delay_ms: policy.base_delay.as_millis() as u64,
            backoff_factor: policy.backoff_factor,
            max_attempts: policy.max_attempts,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            default_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl DispatcherSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            backoff_factor: self.backoff_factor,
            max_attempts: self.max_attempts.max(1),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AwsSettings {
    pub region: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GcpSettings {
    pub project_id: String,
}

impl Default for GcpSettings {
    fn default() -> Self {
        Self {
            project_id: "default-project".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AzureSettings {
    pub subscription_id: String,
    pub resource_group: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            subscription_id: "00000000-0000-0000-0000-000000000000".to_string(),
            resource_group: "monitoring".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogEntryConfig {
    pub provider: Provider,
    pub metric: String,
    pub namespace: String,
    pub native_id: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub resource_label: String,
    /// Empty means every aggregation.
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
}

/// `config/monitoring.{toml,yaml,json}` if present, then `MONITORING__*` environment overrides
/// (`MONITORING__DISPATCHER__MAX_ATTEMPTS=5`).
pub fn load_monitoring_config() -> anyhow::Result<MonitoringConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/monitoring").required(false))
        .add_source(
            config::Environment::with_prefix("MONITORING")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings
        .try_deserialize()
        .context("Failed to parse monitoring configuration")
}

pub fn load_monitoring_config_from_str(toml: &str) -> anyhow::Result<MonitoringConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?;

    settings
        .try_deserialize()
        .context("Failed to parse monitoring configuration")
}

/// Built-in catalog with the configured entries layered on top.
pub fn build_catalog(config: &MonitoringConfig) -> anyhow::Result<MetricCatalog> {
    let mut builder = MetricCatalog::builder().extend(&MetricCatalog::builtin());
    for entry in &config.catalog {
        if entry.metric.is_empty() || entry.native_id.is_empty() {
            anyhow::bail!(
                "catalog entry for {} needs both a metric and a native_id",
                entry.provider
            );
        }
        let aggregations: &[Aggregation] = if entry.aggregations.is_empty() {
            &Aggregation::ALL
        } else {
            &entry.aggregations
        };
        tracing::debug!(
            provider = %entry.provider,
            metric = %entry.metric,
            native_id = %entry.native_id,
            "Catalog override"
        );
        builder = builder.insert(
            entry.provider,
            &entry.metric,
            CatalogEntry::new(
                &entry.namespace,
                &entry.native_id,
                &entry.unit,
                &entry.resource_label,
                aggregations,
            ),
        );
    }
    Ok(builder.build())
}

/// Dispatcher tuned from `settings`.
pub fn build_dispatcher(
    settings: &DispatcherSettings,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    catalog: Arc<MetricCatalog>,
) -> Dispatcher {
    Dispatcher::new(adapters, catalog)
        .with_retry_policy(settings.retry_policy())
        .with_concurrency_limit(settings.concurrency_limit)
        .with_default_timeout(settings.default_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = load_monitoring_config_from_str("").unwrap();
        assert_eq!(config.dispatcher.max_attempts, 3);
        assert_eq!(config.dispatcher.concurrency_limit, 5);
        assert_eq!(config.dispatcher.retry_policy().base_delay, Duration::from_millis(500));
        assert_eq!(config.aws.region, "us-east-1");
        assert!(config.catalog.is_empty());
    }

    #[test]
    fn test_partial_sections() {
        let config = load_monitoring_config_from_str(
            r#"
            [dispatcher]
            max_attempts = 5

            [gcp]
            project_id = "acme-prod"
            "#,
        )
        .unwrap();
        assert_eq!(config.dispatcher.max_attempts, 5);
        assert_eq!(config.dispatcher.backoff_factor, 2.0);
        assert_eq!(config.gcp.project_id, "acme-prod");
        assert_eq!(config.azure.resource_group, "monitoring");
    }

    #[test]
    fn test_catalog_overrides() {
        let config = load_monitoring_config_from_str(
            r#"
            [[catalog]]
            provider = "aws"
            metric = "queue_depth"
            namespace = "AWS/SQS"
            native_id = "ApproximateNumberOfMessagesVisible"
            unit = "Count"
            resource_label = "QueueName"
            aggregations = ["avg", "max"]
            "#,
        )
        .unwrap();
        let catalog = build_catalog(&config).unwrap();
        let entry = catalog.lookup(Provider::Aws, "queue_depth").unwrap();
        assert_eq!(entry.native_namespace, "AWS/SQS");
        assert!(entry.valid_aggregations.contains(&Aggregation::Max));
        assert!(!entry.valid_aggregations.contains(&Aggregation::Sum));
        assert_eq!(catalog.len(), MetricCatalog::builtin().len() + 1);
    }

    #[test]
    fn test_catalog_entry_needs_native_id() {
        let config = load_monitoring_config_from_str(
            r#"
            [[catalog]]
            provider = "gcp"
            metric = "queue_depth"
            namespace = "pubsub_subscription"
            native_id = ""
            "#,
        )
        .unwrap();
        assert!(build_catalog(&config).is_err());
    }
}
