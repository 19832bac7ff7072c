// Normalization engine - pure translation between canonical and provider-native shapes
pub mod aws;
pub mod azure;
pub mod gcp;
pub mod time;

use crate::application::metric_catalog::{CatalogError, MetricCatalog};
use crate::application::provider_adapter::AdapterError;
use crate::domain::alarm::{AlarmStateChange, CanonicalAlarmRule};
use crate::domain::dashboard::CanonicalDashboard;
use crate::domain::metric_query::{CanonicalMetricQuery, DataPoint, Extensions};
use crate::domain::provider::Provider;
use crate::infrastructure::sdk::SdkError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("malformed native payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unrecognized {field} '{value}'")]
    Unrecognized { field: &'static str, value: String },
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("cannot express on this provider: {0}")]
    Unrepresentable(String),
}

impl From<NormalizationError> for AdapterError {
    fn from(error: NormalizationError) -> Self {
        match error {
            NormalizationError::Catalog(catalog) => catalog.into(),
            NormalizationError::Unrepresentable(message) => AdapterError::InvalidArgument(message),
            other => AdapterError::MalformedResponse(other.to_string()),
        }
    }
}

/// Translation rules for one provider. Every method is pure.
///
/// The `encode_*` / `decode_*` pairs are inverses for every canonical field;
/// native fields with no canonical counterpart land in `extensions` and are
/// written back from there.
pub trait NativeCodec: Send + Sync {
    fn provider(&self) -> Provider;

    /// Native dashboard id for a canonical id or an id the provider returned.
    fn dashboard_name(&self, id: &str) -> String;

    fn alarm_name(&self, id: &str) -> String;

    fn encode_dashboard(
        &self,
        dashboard: &CanonicalDashboard,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError>;

    fn decode_dashboard(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalDashboard, NormalizationError>;

    fn encode_alarm(
        &self,
        alarm: &CanonicalAlarmRule,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError>;

    fn decode_alarm(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalAlarmRule, NormalizationError>;

    /// Time-series request body.
    fn encode_query(
        &self,
        query: &CanonicalMetricQuery,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError>;

    fn decode_query(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalMetricQuery, NormalizationError>;

    /// Points from a time-series response, in any order.
    fn decode_series(&self, response: &Value) -> Result<Vec<DataPoint>, NormalizationError>;

    /// Custom-metric write body publishing `points` to the series `series` names.
    fn encode_write(
        &self,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError>;

    fn decode_notification(&self, payload: &Value) -> Result<AlarmStateChange, NormalizationError>;

    fn classify(&self, error: &SdkError) -> AdapterError;
}

/// Native metric id and window of a time-series request, as the provider reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRequest {
    pub metric: String,
    pub start: i64,
    pub end: i64,
}

/// Native metric id and points of a custom-metric write.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesWrite {
    pub metric: String,
    pub points: Vec<DataPoint>,
}

/// Provider-side view of a time-series request.
pub fn series_request(
    provider: Provider,
    request: &Value,
) -> Result<SeriesRequest, NormalizationError> {
    match provider {
        Provider::Aws => aws::series_request(request),
        Provider::Gcp => gcp::series_request(request),
        Provider::Azure => azure::series_request(request),
    }
}

/// Provider-side time-series response for `request`.
pub fn series_response(
    provider: Provider,
    request: &Value,
    points: &[DataPoint],
) -> Result<Value, NormalizationError> {
    match provider {
        Provider::Aws => aws::series_response(request, points),
        Provider::Gcp => gcp::series_response(request, points),
        Provider::Azure => azure::series_response(request, points),
    }
}

/// Provider-side view of a custom-metric write.
pub fn series_write(provider: Provider, body: &Value) -> Result<SeriesWrite, NormalizationError> {
    match provider {
        Provider::Aws => aws::series_write(body),
        Provider::Gcp => gcp::series_write(body),
        Provider::Azure => azure::series_write(body),
    }
}

/// Reverse of a total canonical-to-native naming function.
pub(crate) fn from_native<T, N, V>(
    field: &'static str,
    candidates: &[T],
    native: impl Fn(T) -> N,
    value: V,
) -> Result<T, NormalizationError>
where
    T: Copy,
    N: PartialEq<V>,
    V: std::fmt::Display,
{
    candidates
        .iter()
        .copied()
        .find(|candidate| native(*candidate) == value)
        .ok_or_else(|| NormalizationError::Unrecognized {
            field,
            value: value.to_string(),
        })
}

/// HTTP status fallback when a provider error code is not in its table.
pub(crate) fn classify_status(error: &SdkError) -> AdapterError {
    let message = error.to_string();
    match error.status {
        Some(429) => AdapterError::RateLimited(message),
        Some(401) | Some(403) => AdapterError::AuthFailed(message),
        Some(404) => AdapterError::NotFound(message),
        Some(400..=499) => AdapterError::InvalidArgument(message),
        Some(500..=599) => AdapterError::Unavailable(message),
        // No code and no status means the request never got an answer.
        _ => AdapterError::Unavailable(message),
    }
}

/// Pick a provider error class from code tables, falling back to the HTTP status.
pub(crate) fn classify_with(
    error: &SdkError,
    throttling: &[&str],
    auth: &[&str],
    invalid: &[&str],
    not_found: &[&str],
    unavailable: &[&str],
) -> AdapterError {
    let Some(code) = error.code.as_deref() else {
        return classify_status(error);
    };
    let message = format!("{code}: {}", error.message);
    if throttling.contains(&code) {
        AdapterError::RateLimited(message)
    } else if auth.contains(&code) {
        AdapterError::AuthFailed(message)
    } else if invalid.contains(&code) {
        AdapterError::InvalidArgument(message)
    } else if not_found.contains(&code) {
        AdapterError::NotFound(message)
    } else if unavailable.contains(&code) {
        AdapterError::Unavailable(message)
    } else {
        classify_status(error)
    }
}

/// Split `extensions` off a native object: every key not in `known`.
pub(crate) fn extensions_from(
    object: &serde_json::Map<String, Value>,
    known: &[&str],
) -> Extensions {
    object
        .iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Merge extensions into a native object without overwriting canonical fields.
pub(crate) fn merge_extensions(
    object: &mut serde_json::Map<String, Value>,
    extensions: &Extensions,
) {
    for (key, value) in extensions {
        object.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

pub(crate) fn as_object<'a>(
    value: &'a Value,
    what: &'static str,
) -> Result<&'a serde_json::Map<String, Value>, NormalizationError> {
    value.as_object().ok_or(NormalizationError::Missing(what))
}

pub(crate) fn str_field<'a>(
    object: &'a serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<&'a str, NormalizationError> {
    object.get(key).and_then(Value::as_str).ok_or(NormalizationError::Missing(key))
}

pub(crate) fn u32_field(
    object: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<u32, NormalizationError> {
    object
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or(NormalizationError::Missing(key))
}

pub(crate) fn f64_field(
    object: &serde_json::Map<String, Value>,
    key: &'static str,
) -> Result<f64, NormalizationError> {
    object.get(key).and_then(Value::as_f64).ok_or(NormalizationError::Missing(key))
}
