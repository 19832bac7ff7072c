// Metric catalog - abstract metric names to provider-native identifiers
use crate::domain::metric_query::{Aggregation, CanonicalMetricQuery};
use crate::domain::provider::Provider;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

const ALL: &[Aggregation] = &[
    Aggregation::Avg,
    Aggregation::Sum,
    Aggregation::Max,
    Aggregation::Min,
    Aggregation::Count,
];
const GAUGE: &[Aggregation] = &[
    Aggregation::Avg,
    Aggregation::Max,
    Aggregation::Min,
    Aggregation::Count,
];
const COUNTER: &[Aggregation] = &[Aggregation::Sum, Aggregation::Count];

/// Abstract name, namespace, native id, unit, resource dimension, aggregations.
type BuiltinRow = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static [Aggregation],
);

// AWS CloudWatch
const AWS_BUILTIN: &[BuiltinRow] = &[
    ("cpu_utilization", "AWS/EC2", "CPUUtilization", "Percent", "InstanceId", ALL),
    (
        "database_connections",
        "AWS/RDS",
        "DatabaseConnections",
        "Count",
        "DBInstanceIdentifier",
        ALL,
    ),
    ("function_invocations", "AWS/Lambda", "Invocations", "Count", "FunctionName", COUNTER),
    ("function_errors", "AWS/Lambda", "Errors", "Count", "FunctionName", COUNTER),
    ("request_count", "AWS/ApplicationELB", "RequestCount", "Count", "LoadBalancer", COUNTER),
    ("response_time", "AWS/ApplicationELB", "TargetResponseTime", "Seconds", "LoadBalancer", GAUGE),
    ("unhealthy_hosts", "AWS/ApplicationELB", "UnHealthyHostCount", "Count", "TargetGroup", GAUGE),
    ("active_users", "CustomApp", "ActiveUsers", "Count", "Application", ALL),
    ("error_rate", "CustomApp", "ErrorRate", "Percent", "Application", GAUGE),
];

// GCP Cloud Monitoring
const GCP_BUILTIN: &[BuiltinRow] = &[
    (
        "cpu_utilization",
        "gce_instance",
        "compute.googleapis.com/instance/cpu/utilization",
        "10^2.%",
        "instance_id",
        ALL,
    ),
    (
        "database_connections",
        "cloudsql_database",
        "cloudsql.googleapis.com/database/network/connections",
        "1",
        "database_id",
        ALL,
    ),
    (
        "function_invocations",
        "cloud_function",
        "cloudfunctions.googleapis.com/function/execution_count",
        "1",
        "function_name",
        COUNTER,
    ),
    (
        "request_count",
        "https_lb_rule",
        "loadbalancing.googleapis.com/https/request_count",
        "1",
        "url_map_name",
        COUNTER,
    ),
    (
        "container_cpu",
        "k8s_container",
        "kubernetes.io/container/cpu/core_usage_time",
        "s{CPU}",
        "container_name",
        ALL,
    ),
    (
        "active_users",
        "global",
        "custom.googleapis.com/application/active_users",
        "1",
        "project_id",
        ALL,
    ),
    (
        "error_rate",
        "global",
        "custom.googleapis.com/application/error_rate",
        "1",
        "project_id",
        GAUGE,
    ),
];

// Azure Monitor
const AZURE_BUILTIN: &[BuiltinRow] = &[
    ("cpu_utilization", "Microsoft.Compute/virtualMachines", "Percentage CPU", "Percent", "", ALL),
    (
        "database_dtu",
        "Microsoft.Sql/servers/databases",
        "dtu_consumption_percent",
        "Percent",
        "",
        GAUGE,
    ),
    ("request_count", "Microsoft.Web/sites", "Requests", "Count", "", COUNTER),
    (
        "storage_transactions",
        "Microsoft.Storage/storageAccounts",
        "Transactions",
        "Count",
        "",
        COUNTER,
    ),
    (
        "response_time",
        "Microsoft.Insights/components",
        "requests/duration",
        "MilliSeconds",
        "",
        GAUGE,
    ),
    ("function_errors", "Microsoft.Insights/components", "exceptions/count", "Count", "", COUNTER),
];

/// Native identity of an abstract metric on one provider.
///
/// `native_namespace` is the CloudWatch namespace, the GCP monitored
/// resource type, or the Azure resource provider type. `resource_label` is the
/// dimension (AWS) or resource label (GCP) that carries the resource id; Azure
/// addresses resources by URI and leaves it empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub native_id: String,
    pub native_namespace: String,
    pub native_unit: String,
    pub resource_label: String,
    pub valid_aggregations: HashSet<Aggregation>,
}

impl CatalogEntry {
    pub fn new(
        native_namespace: &str,
        native_id: &str,
        native_unit: &str,
        resource_label: &str,
        valid_aggregations: &[Aggregation],
    ) -> Self {
        Self {
            native_id: native_id.to_string(),
            native_namespace: native_namespace.to_string(),
            native_unit: native_unit.to_string(),
            resource_label: resource_label.to_string(),
            valid_aggregations: valid_aggregations.iter().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("metric '{metric}' is not mapped for {provider}")]
    UnsupportedMetric { provider: Provider, metric: String },
    #[error("aggregation {aggregation} is not valid for metric '{metric}' on {provider}")]
    InvalidAggregation {
        provider: Provider,
        metric: String,
        aggregation: Aggregation,
    },
}

/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct MetricCatalog {
    entries: HashMap<Provider, HashMap<String, CatalogEntry>>,
    reverse: HashMap<Provider, HashMap<(String, String), String>>,
}

impl MetricCatalog {
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn lookup(&self, provider: Provider, metric: &str) -> Result<&CatalogEntry, CatalogError> {
        self.entries
            .get(&provider)
            .and_then(|metrics| metrics.get(metric))
            .ok_or_else(|| CatalogError::UnsupportedMetric {
                provider,
                metric: metric.to_string(),
            })
    }

    /// Lookup plus the aggregation check, for a query about to be dispatched.
    pub fn resolve(&self, query: &CanonicalMetricQuery) -> Result<&CatalogEntry, CatalogError> {
        let entry = self.lookup(query.provider, &query.metric_name)?;
        if !entry.valid_aggregations.contains(&query.aggregation) {
            return Err(CatalogError::InvalidAggregation {
                provider: query.provider,
                metric: query.metric_name.clone(),
                aggregation: query.aggregation,
            });
        }
        Ok(entry)
    }

    /// Reverse mapping used when normalizing provider responses.
    pub fn abstract_name(
        &self,
        provider: Provider,
        namespace: &str,
        native_id: &str,
    ) -> Option<&str> {
        self.reverse
            .get(&provider)
            .and_then(|index| index.get(&(namespace.to_string(), native_id.to_string())))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metrics seen in the CloudWatch, Cloud Monitoring and Azure Monitor dashboards.
    pub fn builtin() -> Self {
        let tables = [
            (Provider::Aws, AWS_BUILTIN),
            (Provider::Gcp, GCP_BUILTIN),
            (Provider::Azure, AZURE_BUILTIN),
        ];
        let mut builder = Self::builder();
        for (provider, rows) in tables {
            for &(metric, namespace, native_id, unit, dimension, aggregations) in rows {
                let entry = CatalogEntry::new(namespace, native_id, unit, dimension, aggregations);
                builder = builder.insert(provider, metric, entry);
            }
        }
        builder.build()
    }
}

#[derive(Debug, Default)]
pub struct CatalogBuilder {
    catalog: MetricCatalog,
}

impl CatalogBuilder {
    /// Later inserts for the same (provider, metric) replace earlier ones.
    pub fn insert(mut self, provider: Provider, metric: &str, entry: CatalogEntry) -> Self {
        let reverse = self.catalog.reverse.entry(provider).or_default();
        if let Some(previous) = self.catalog.entries.get(&provider).and_then(|m| m.get(metric)) {
            reverse.remove(&(previous.native_namespace.clone(), previous.native_id.clone()));
        }
        reverse.insert(
            (entry.native_namespace.clone(), entry.native_id.clone()),
            metric.to_string(),
        );
        self.catalog
            .entries
            .entry(provider)
            .or_default()
            .insert(metric.to_string(), entry);
        self
    }

    pub fn extend(mut self, catalog: &MetricCatalog) -> Self {
        for (provider, metrics) in &catalog.entries {
            for (metric, entry) in metrics {
                self = self.insert(*provider, metric, entry.clone());
            }
        }
        self
    }

    pub fn build(self) -> MetricCatalog {
        self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(provider: Provider, metric: &str, aggregation: Aggregation) -> CanonicalMetricQuery {
        CanonicalMetricQuery::new(provider, "r-1", metric, aggregation, 0, 600, 300)
    }

    #[test]
    fn test_builtin_lookup() {
        let catalog = MetricCatalog::builtin();
        let entry = catalog.lookup(Provider::Aws, "cpu_utilization").unwrap();
        assert_eq!(entry.native_id, "CPUUtilization");
        assert_eq!(entry.native_namespace, "AWS/EC2");

        let entry = catalog.lookup(Provider::Azure, "cpu_utilization").unwrap();
        assert_eq!(entry.native_id, "Percentage CPU");
    }

    #[test]
    fn test_unmapped_metric() {
        let catalog = MetricCatalog::builtin();
        assert_eq!(
            catalog.lookup(Provider::Azure, "container_cpu"),
            Err(CatalogError::UnsupportedMetric {
                provider: Provider::Azure,
                metric: "container_cpu".to_string()
            })
        );
    }

    #[test]
    fn test_resolve_checks_aggregation() {
        let catalog = MetricCatalog::builtin();
        assert!(catalog.resolve(&query(Provider::Aws, "request_count", Aggregation::Sum)).is_ok());
        assert!(matches!(
            catalog.resolve(&query(Provider::Aws, "request_count", Aggregation::Avg)),
            Err(CatalogError::InvalidAggregation { aggregation: Aggregation::Avg, .. })
        ));
    }

    #[test]
    fn test_reverse_lookup() {
        let catalog = MetricCatalog::builtin();
        assert_eq!(
            catalog.abstract_name(
                Provider::Gcp,
                "gce_instance",
                "compute.googleapis.com/instance/cpu/utilization"
            ),
            Some("cpu_utilization")
        );
        assert_eq!(catalog.abstract_name(Provider::Gcp, "global", "nope"), None);
    }

    #[test]
    fn test_override_replaces_reverse_index() {
        let catalog = MetricCatalog::builder()
            .extend(&MetricCatalog::builtin())
            .insert(
                Provider::Aws,
                "cpu_utilization",
                CatalogEntry::new(
                    "AWS/ECS",
                    "CPUUtilization",
                    "Percent",
                    "ServiceName",
                    &[Aggregation::Avg],
                ),
            )
            .build();

        let entry = catalog.lookup(Provider::Aws, "cpu_utilization").unwrap();
        assert_eq!(entry.native_namespace, "AWS/ECS");
        assert_eq!(catalog.abstract_name(Provider::Aws, "AWS/EC2", "CPUUtilization"), None);
        assert_eq!(
            catalog.abstract_name(Provider::Aws, "AWS/ECS", "CPUUtilization"),
            Some("cpu_utilization")
        );
        assert_eq!(catalog.len(), MetricCatalog::builtin().len());
    }
}
