// Monitoring error taxonomy surfaced to façade callers
use crate::application::provider_adapter::AdapterError;
use crate::domain::metric_query::Aggregation;
use crate::domain::provider::Provider;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateDashboard,
    GetDashboard,
    ListDashboards,
    DeleteDashboard,
    CreateAlarm,
    ListAlarms,
    DeleteAlarm,
    QueryMetric,
    WriteMetric,
    ApplyNotification,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreateDashboard => "create_dashboard",
            Operation::GetDashboard => "get_dashboard",
            Operation::ListDashboards => "list_dashboards",
            Operation::DeleteDashboard => "delete_dashboard",
            Operation::CreateAlarm => "create_alarm",
            Operation::ListAlarms => "list_alarms",
            Operation::DeleteAlarm => "delete_alarm",
            Operation::QueryMetric => "query_metric",
            Operation::WriteMetric => "write_metric",
            Operation::ApplyNotification => "apply_notification",
        }
    }

    /// Side effects a blind retry could duplicate: creates and metric writes.
    pub fn duplicates_on_retry(self) -> bool {
        matches!(
            self,
            Operation::CreateDashboard | Operation::CreateAlarm | Operation::WriteMetric
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which call failed and against what, for upstream logging and alerting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub provider: Provider,
    pub operation: Operation,
    pub target: String,
}

impl RequestContext {
    pub fn new(provider: Provider, operation: Operation, target: impl Into<String>) -> Self {
        Self {
            provider,
            operation,
            target: target.into(),
        }
    }
}

impl std::fmt::Display for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' on {}", self.operation, self.target, self.provider)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitoringError {
    #[error("rejected {context}: {reason}")]
    Rejected { context: RequestContext, reason: String },

    #[error("metric '{metric}' is not supported on {provider}")]
    UnsupportedMetric { provider: Provider, metric: String },

    #[error("aggregation {aggregation} is not valid for metric '{metric}' on {provider}")]
    InvalidAggregation {
        provider: Provider,
        metric: String,
        aggregation: Aggregation,
    },

    #[error("authentication failed for {context}: {message}")]
    AuthFailed { context: RequestContext, message: String },

    #[error("invalid argument for {context}: {message}")]
    InvalidArgument { context: RequestContext, message: String },

    #[error("not found: {context}: {message}")]
    NotFound { context: RequestContext, message: String },

    #[error("{context} gave up after {attempts} attempt(s): {last_error}")]
    ExhaustedRetries {
        context: RequestContext,
        attempts: u32,
        last_error: AdapterError,
    },

    #[error("{context} timed out after {attempts} attempt(s)")]
    Timeout { context: RequestContext, attempts: u32 },

    #[error("malformed response for {context}: {message}")]
    MalformedResponse { context: RequestContext, message: String },

    #[error("{} provider(s) failed", failures.len())]
    PartialFailure { failures: Vec<ProviderFailure> },
}

impl MonitoringError {
    /// Map a non-retried adapter error to the façade taxonomy.
    pub fn from_adapter(context: RequestContext, error: AdapterError) -> Self {
        match error {
            AdapterError::AuthFailed(message) => MonitoringError::AuthFailed { context, message },
            AdapterError::InvalidArgument(message) => {
                MonitoringError::InvalidArgument { context, message }
            }
            AdapterError::NotFound(message) => MonitoringError::NotFound { context, message },
            AdapterError::MalformedResponse(message) => {
                MonitoringError::MalformedResponse { context, message }
            }
            AdapterError::UnsupportedMetric(metric) => MonitoringError::UnsupportedMetric {
                provider: context.provider,
                metric,
            },
            AdapterError::InvalidAggregation { metric, aggregation } => {
                MonitoringError::InvalidAggregation {
                    provider: context.provider,
                    metric,
                    aggregation,
                }
            }
            transient @ (AdapterError::RateLimited(_) | AdapterError::Unavailable(_)) => {
                MonitoringError::ExhaustedRetries {
                    context,
                    attempts: 1,
                    last_error: transient,
                }
            }
        }
    }

    /// True for errors raised before any request left the process.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            MonitoringError::Rejected { .. }
                | MonitoringError::UnsupportedMetric { .. }
                | MonitoringError::InvalidAggregation { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFailure {
    pub provider: Provider,
    pub error: MonitoringError,
}
