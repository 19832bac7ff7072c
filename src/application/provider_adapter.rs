// Provider adapter trait - the seam between canonical requests and a cloud
use crate::application::metric_catalog::CatalogError;
use crate::domain::alarm::{
    AlarmFilter, AlarmStateChange, CanonicalAlarmRule, ProviderAlarmHandle,
};
use crate::domain::credential::ProviderCredential;
use crate::domain::dashboard::{CanonicalDashboard, ProviderDashboardHandle};
use crate::domain::metric_query::{Aggregation, CanonicalMetricQuery, DataPoint};
use crate::domain::provider::Provider;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("authentication failed: {0}")]
    AuthFailed(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("metric '{0}' is not supported")]
    UnsupportedMetric(String),
    #[error("aggregation {aggregation} is not valid for metric '{metric}'")]
    InvalidAggregation { metric: String, aggregation: Aggregation },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl AdapterError {
    /// Transient failures the dispatcher may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::RateLimited(_) | AdapterError::Unavailable(_))
    }
}

impl From<CatalogError> for AdapterError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::UnsupportedMetric { metric, .. } => {
                AdapterError::UnsupportedMetric(metric)
            }
            CatalogError::InvalidAggregation {
                metric, aggregation, ..
            } => AdapterError::InvalidAggregation { metric, aggregation },
        }
    }
}

/// One implementation per cloud. Every method is a remote call except
/// `parse_alarm_notification`. The credential is borrowed for the call only.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    /// `idempotency_key` is forwarded as the provider's client token when present.
    async fn create_dashboard(
        &self,
        credential: &ProviderCredential,
        dashboard: &CanonicalDashboard,
        idempotency_key: Option<&str>,
    ) -> Result<ProviderDashboardHandle, AdapterError>;

    async fn get_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<CanonicalDashboard, AdapterError>;

    async fn list_dashboards(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Vec<CanonicalDashboard>, AdapterError>;

    async fn delete_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), AdapterError>;

    async fn create_alarm(
        &self,
        credential: &ProviderCredential,
        alarm: &CanonicalAlarmRule,
        idempotency_key: Option<&str>,
    ) -> Result<ProviderAlarmHandle, AdapterError>;

    async fn list_alarms(
        &self,
        credential: &ProviderCredential,
        filter: &AlarmFilter,
    ) -> Result<Vec<CanonicalAlarmRule>, AdapterError>;

    async fn delete_alarm(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), AdapterError>;

    /// Points come back sorted by timestamp, oldest first.
    async fn query_metric(
        &self,
        credential: &ProviderCredential,
        query: &CanonicalMetricQuery,
    ) -> Result<Vec<DataPoint>, AdapterError>;

    /// Publish custom-metric `points` to the series `series` names. Its window
    /// bounds the points; the aggregation is unused. Not idempotent.
    async fn write_metric(
        &self,
        credential: &ProviderCredential,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
    ) -> Result<(), AdapterError>;

    /// Decode an alarm state push from the provider. No I/O.
    fn parse_alarm_notification(
        &self,
        payload: &serde_json::Value,
    ) -> Result<AlarmStateChange, AdapterError>;
}
