// In-process stand-in for a vendor monitoring SDK, with failure injection
use crate::domain::credential::ProviderCredential;
use crate::domain::metric_query::DataPoint;
use crate::domain::provider::Provider;
use crate::infrastructure::normalization::{self, NormalizationError};
use crate::infrastructure::sdk::{MonitoringSdk, SdkError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct Store {
    dashboards: Vec<(String, Value)>,
    alarms: Vec<(String, Value)>,
    points: HashMap<String, Vec<DataPoint>>,
    client_tokens: Vec<String>,
    scripted_failures: VecDeque<SdkError>,
    persistent_failure: Option<SdkError>,
    calls: Vec<Instant>,
}

/// Stores native bodies as the provider would, keyed by resource id, and
/// answers time-series requests from seeded points.
pub struct InMemoryMonitoringSdk {
    provider: Provider,
    latency: Option<Duration>,
    store: Mutex<Store>,
}

fn upsert(items: &mut Vec<(String, Value)>, id: &str, body: Value) {
    match items.iter_mut().find(|(existing, _)| existing == id) {
        Some((_, stored)) => *stored = body,
        None => items.push((id.to_string(), body)),
    }
}

impl InMemoryMonitoringSdk {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            latency: None,
            store: Mutex::new(Store::default()),
        }
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Fail the next calls with these errors, in order.
    pub fn fail_next(&self, errors: Vec<SdkError>) {
        self.lock().scripted_failures.extend(errors);
    }

    /// Fail every call with `error` until [`recover`](Self::recover).
    pub fn fail_always(&self, error: SdkError) {
        self.lock().persistent_failure = Some(error);
    }

    pub fn recover(&self) {
        let mut store = self.lock();
        store.persistent_failure = None;
        store.scripted_failures.clear();
    }

    /// Points served for `native_metric`, the provider's own metric id.
    pub fn seed_points(&self, native_metric: &str, points: Vec<DataPoint>) {
        self.lock()
            .points
            .entry(native_metric.to_string())
            .or_default()
            .extend(points);
    }

    /// Store a native alarm body directly, bypassing the call log.
    pub fn insert_alarm(&self, id: &str, body: Value) {
        upsert(&mut self.lock().alarms, id, body);
    }

    pub fn insert_dashboard(&self, id: &str, body: Value) {
        upsert(&mut self.lock().dashboards, id, body);
    }

    /// Edit a stored alarm in place, as the provider does when it evaluates one.
    pub fn update_alarm(&self, id: &str, update: impl FnOnce(&mut Value)) -> bool {
        let mut store = self.lock();
        match store.alarms.iter_mut().find(|(existing, _)| existing == id) {
            Some((_, body)) => {
                update(body);
                true
            }
            None => false,
        }
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// When each call arrived, on the tokio clock.
    pub fn call_instants(&self) -> Vec<Instant> {
        self.lock().calls.clone()
    }

    /// Client tokens received, in arrival order.
    pub fn client_tokens(&self) -> Vec<String> {
        self.lock().client_tokens.clone()
    }

    pub fn dashboard_count(&self) -> usize {
        self.lock().dashboards.len()
    }

    pub fn alarm_count(&self) -> usize {
        self.lock().alarms.len()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, wait out the latency, then apply any injected failure.
    async fn begin(&self, credential: &ProviderCredential) -> Result<(), SdkError> {
        self.lock().calls.push(Instant::now());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let injected = {
            let mut store = self.lock();
            store
                .scripted_failures
                .pop_front()
                .or_else(|| store.persistent_failure.clone())
        };
        if let Some(error) = injected {
            return Err(error);
        }
        if credential.expose().is_empty() {
            return Err(self.unauthenticated());
        }
        Ok(())
    }

    fn unauthenticated(&self) -> SdkError {
        let code = match self.provider {
            Provider::Aws => "UnrecognizedClientException",
            Provider::Gcp => "UNAUTHENTICATED",
            Provider::Azure => "AuthenticationFailed",
        };
        SdkError::new("missing credential").with_code(code).with_status(401)
    }

    fn not_found(&self, id: &str) -> SdkError {
        let code = match self.provider {
            Provider::Aws => "ResourceNotFound",
            Provider::Gcp => "NOT_FOUND",
            Provider::Azure => "ResourceNotFound",
        };
        SdkError::new(format!("resource '{id}' does not exist"))
            .with_code(code)
            .with_status(404)
    }

    fn bad_request(&self, error: NormalizationError) -> SdkError {
        let code = match self.provider {
            Provider::Aws => "InvalidParameterValue",
            Provider::Gcp => "INVALID_ARGUMENT",
            Provider::Azure => "BadRequest",
        };
        SdkError::new(error.to_string()).with_code(code).with_status(400)
    }

    fn put(&self, alarms: bool, id: &str, body: Value, client_token: Option<&str>) -> String {
        let mut store = self.lock();
        if let Some(token) = client_token {
            store.client_tokens.push(token.to_string());
        }
        let items = if alarms { &mut store.alarms } else { &mut store.dashboards };
        upsert(items, id, body);
        id.to_string()
    }

    fn remove(&self, alarms: bool, id: &str) -> Result<(), SdkError> {
        let mut store = self.lock();
        let items = if alarms { &mut store.alarms } else { &mut store.dashboards };
        let before = items.len();
        items.retain(|(existing, _)| existing != id);
        if items.len() == before {
            return Err(self.not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl MonitoringSdk for InMemoryMonitoringSdk {
    async fn put_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
        body: Value,
        client_token: Option<&str>,
    ) -> Result<String, SdkError> {
        self.begin(credential).await?;
        Ok(self.put(false, id, body, client_token))
    }

    async fn get_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<Value, SdkError> {
        self.begin(credential).await?;
        self.lock()
            .dashboards
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, body)| body.clone())
            .ok_or_else(|| self.not_found(id))
    }

    async fn list_dashboards(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Vec<Value>, SdkError> {
        self.begin(credential).await?;
        Ok(self.lock().dashboards.iter().map(|(_, body)| body.clone()).collect())
    }

    async fn delete_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), SdkError> {
        self.begin(credential).await?;
        self.remove(false, id)
    }

    async fn put_alarm(
        &self,
        credential: &ProviderCredential,
        id: &str,
        body: Value,
        client_token: Option<&str>,
    ) -> Result<String, SdkError> {
        self.begin(credential).await?;
        Ok(self.put(true, id, body, client_token))
    }

    async fn list_alarms(&self, credential: &ProviderCredential) -> Result<Vec<Value>, SdkError> {
        self.begin(credential).await?;
        Ok(self.lock().alarms.iter().map(|(_, body)| body.clone()).collect())
    }

    async fn delete_alarm(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), SdkError> {
        self.begin(credential).await?;
        self.remove(true, id)
    }

    /// Seeded points inside `[start, end)`, shaped as the provider returns them.
    async fn query_time_series(
        &self,
        credential: &ProviderCredential,
        request: Value,
    ) -> Result<Value, SdkError> {
        self.begin(credential).await?;
        let series = normalization::series_request(self.provider, &request)
            .map_err(|e| self.bad_request(e))?;
        let points: Vec<DataPoint> = self
            .lock()
            .points
            .get(&series.metric)
            .into_iter()
            .flatten()
            .filter(|point| point.timestamp >= series.start && point.timestamp < series.end)
            .copied()
            .collect();
        normalization::series_response(self.provider, &request, &points)
            .map_err(|e| self.bad_request(e))
    }

    /// Written points are appended; a repeated write stores them twice.
    async fn put_time_series(
        &self,
        credential: &ProviderCredential,
        body: Value,
    ) -> Result<(), SdkError> {
        self.begin(credential).await?;
        let written =
            normalization::series_write(self.provider, &body).map_err(|e| self.bad_request(e))?;
        self.seed_points(&written.metric, written.points);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credential() -> ProviderCredential {
        ProviderCredential::new("key")
    }

    #[tokio::test]
    async fn test_put_is_an_upsert() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Aws);
        sdk.put_alarm(&credential(), "a", json!({"v": 1}), Some("t1")).await.unwrap();
        sdk.put_alarm(&credential(), "a", json!({"v": 2}), None).await.unwrap();
        let alarms = sdk.list_alarms(&credential()).await.unwrap();
        assert_eq!(alarms, vec![json!({"v": 2})]);
        assert_eq!(sdk.client_tokens(), vec!["t1".to_string()]);
        assert_eq!(sdk.call_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_resource_is_404() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Gcp);
        let error = sdk.delete_dashboard(&credential(), "nope").await.unwrap_err();
        assert_eq!(error.code.as_deref(), Some("NOT_FOUND"));
        assert_eq!(error.status, Some(404));
    }

    #[tokio::test]
    async fn test_scripted_failures_run_out() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Azure);
        sdk.fail_next(vec![SdkError::new("a"), SdkError::new("b")]);
        assert!(sdk.list_alarms(&credential()).await.is_err());
        assert!(sdk.list_alarms(&credential()).await.is_err());
        assert!(sdk.list_alarms(&credential()).await.is_ok());
    }

    #[tokio::test]
    async fn test_persistent_failure_until_recover() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Aws);
        sdk.fail_always(SdkError::new("down").with_status(503));
        assert!(sdk.list_dashboards(&credential()).await.is_err());
        assert!(sdk.list_dashboards(&credential()).await.is_err());
        sdk.recover();
        assert!(sdk.list_dashboards(&credential()).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_credential_is_unauthenticated() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Azure);
        let error = sdk.list_alarms(&ProviderCredential::new("")).await.unwrap_err();
        assert_eq!(error.status, Some(401));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_answer() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Aws).with_latency(Duration::from_secs(2));
        let started = Instant::now();
        sdk.list_alarms(&credential()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_written_points_are_served_back() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Aws);
        let write = json!({"Namespace": "CustomApp", "MetricData": [
            {"MetricName": "ActiveUsers", "Timestamp": "1970-01-01T00:01:00Z", "Value": 7.0}
        ]});
        sdk.put_time_series(&credential(), write).await.unwrap();

        let request = json!({
            "MetricName": "ActiveUsers",
            "StartTime": "1970-01-01T00:00:00Z",
            "EndTime": "1970-01-01T00:05:00Z",
            "Statistics": ["Sum"],
        });
        let response = sdk.query_time_series(&credential(), request).await.unwrap();
        assert_eq!(response["Datapoints"][0]["Sum"], 7.0);

        let error = sdk.put_time_series(&credential(), json!({"MetricData": []})).await;
        assert_eq!(error.unwrap_err().status, Some(400));
    }

    #[test]
    fn test_update_alarm_in_place() {
        let sdk = InMemoryMonitoringSdk::new(Provider::Aws);
        sdk.insert_alarm("cpu", json!({"StateValue": "OK"}));
        assert!(sdk.update_alarm("cpu", |body| body["StateValue"] = json!("ALARM")));
        assert!(!sdk.update_alarm("missing", |_| {}));
        assert_eq!(sdk.alarm_count(), 1);
    }
}
