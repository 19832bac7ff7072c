// Provider adapters backed by a vendor SDK and a normalization codec
use crate::application::metric_catalog::MetricCatalog;
use crate::application::provider_adapter::{AdapterError, ProviderAdapter};
use crate::domain::alarm::{
    AlarmFilter, AlarmStateChange, CanonicalAlarmRule, ProviderAlarmHandle,
};
use crate::domain::credential::ProviderCredential;
use crate::domain::dashboard::{CanonicalDashboard, ProviderDashboardHandle};
use crate::domain::metric_query::{CanonicalMetricQuery, DataPoint};
use crate::domain::provider::Provider;
use crate::infrastructure::config::{AwsSettings, AzureSettings, GcpSettings};
use crate::infrastructure::normalization::aws::AwsCodec;
use crate::infrastructure::normalization::azure::AzureCodec;
use crate::infrastructure::normalization::gcp::GcpCodec;
use crate::infrastructure::normalization::{NativeCodec, NormalizationError};
use crate::infrastructure::sdk::{MonitoringSdk, SdkError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Encodes with `codec`, calls `sdk`, decodes the answer. No retries here.
pub struct SdkAdapter<C> {
    sdk: Arc<dyn MonitoringSdk>,
    codec: C,
    catalog: Arc<MetricCatalog>,
}

impl<C: NativeCodec> SdkAdapter<C> {
    pub fn new(sdk: Arc<dyn MonitoringSdk>, codec: C, catalog: Arc<MetricCatalog>) -> Self {
        Self { sdk, codec, catalog }
    }

    fn classify(&self, error: SdkError) -> AdapterError {
        let classified = self.codec.classify(&error);
        tracing::debug!(
            provider = %self.codec.provider(),
            code = ?error.code,
            status = ?error.status,
            classified = %classified,
            "SDK call failed"
        );
        classified
    }

    /// Decode each listed item, skipping the ones this catalog cannot express.
    fn decode_listed<T>(
        &self,
        items: Vec<Value>,
        kind: &str,
        decode: impl Fn(&Value) -> Result<T, NormalizationError>,
    ) -> Vec<T> {
        items
            .iter()
            .filter_map(|item| match decode(item) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    tracing::warn!(
                        provider = %self.codec.provider(),
                        kind,
                        error = %e,
                        "Skipping undecodable item"
                    );
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl<C: NativeCodec> ProviderAdapter for SdkAdapter<C> {
    fn provider(&self) -> Provider {
        self.codec.provider()
    }

    async fn create_dashboard(
        &self,
        credential: &ProviderCredential,
        dashboard: &CanonicalDashboard,
        idempotency_key: Option<&str>,
    ) -> Result<ProviderDashboardHandle, AdapterError> {
        let body = self.codec.encode_dashboard(dashboard, &self.catalog)?;
        let name = self.codec.dashboard_name(&dashboard.id);
        let id = self
            .sdk
            .put_dashboard(credential, &name, body, idempotency_key)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(ProviderDashboardHandle {
            provider: self.provider(),
            id,
        })
    }

    async fn get_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<CanonicalDashboard, AdapterError> {
        let native = self
            .sdk
            .get_dashboard(credential, &self.codec.dashboard_name(id))
            .await
            .map_err(|e| self.classify(e))?;
        Ok(self.codec.decode_dashboard(&native, &self.catalog)?)
    }

    async fn list_dashboards(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Vec<CanonicalDashboard>, AdapterError> {
        let items =
            self.sdk.list_dashboards(credential).await.map_err(|e| self.classify(e))?;
        Ok(self.decode_listed(items, "dashboard", |item| {
            self.codec.decode_dashboard(item, &self.catalog)
        }))
    }

    async fn delete_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), AdapterError> {
        self.sdk
            .delete_dashboard(credential, &self.codec.dashboard_name(id))
            .await
            .map_err(|e| self.classify(e))
    }

    async fn create_alarm(
        &self,
        credential: &ProviderCredential,
        alarm: &CanonicalAlarmRule,
        idempotency_key: Option<&str>,
    ) -> Result<ProviderAlarmHandle, AdapterError> {
        let body = self.codec.encode_alarm(alarm, &self.catalog)?;
        let name = self.codec.alarm_name(&alarm.id);
        let id = self
            .sdk
            .put_alarm(credential, &name, body, idempotency_key)
            .await
            .map_err(|e| self.classify(e))?;
        Ok(ProviderAlarmHandle {
            provider: self.provider(),
            id,
        })
    }

    /// State filtering happens here; none of the list APIs filter by state uniformly.
    async fn list_alarms(
        &self,
        credential: &ProviderCredential,
        filter: &AlarmFilter,
    ) -> Result<Vec<CanonicalAlarmRule>, AdapterError> {
        let items = self.sdk.list_alarms(credential).await.map_err(|e| self.classify(e))?;
        let mut alarms =
            self.decode_listed(items, "alarm", |item| self.codec.decode_alarm(item, &self.catalog));
        alarms.retain(|alarm| filter.matches(alarm));
        Ok(alarms)
    }

    async fn delete_alarm(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), AdapterError> {
        self.sdk
            .delete_alarm(credential, &self.codec.alarm_name(id))
            .await
            .map_err(|e| self.classify(e))
    }

    async fn query_metric(
        &self,
        credential: &ProviderCredential,
        query: &CanonicalMetricQuery,
    ) -> Result<Vec<DataPoint>, AdapterError> {
        let request = self.codec.encode_query(query, &self.catalog)?;
        let response = self
            .sdk
            .query_time_series(credential, request)
            .await
            .map_err(|e| self.classify(e))?;
        let mut points = self.codec.decode_series(&response)?;
        points.sort_by_key(|point| point.timestamp);
        Ok(points)
    }

    async fn write_metric(
        &self,
        credential: &ProviderCredential,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
    ) -> Result<(), AdapterError> {
        let body = self.codec.encode_write(series, points, &self.catalog)?;
        self.sdk
            .put_time_series(credential, body)
            .await
            .map_err(|e| self.classify(e))
    }

    fn parse_alarm_notification(&self, payload: &Value) -> Result<AlarmStateChange, AdapterError> {
        self.codec.decode_notification(payload).map_err(|e| {
            AdapterError::InvalidArgument(format!("unrecognized alarm notification: {e}"))
        })
    }
}

/// The three supported clouds behind one concrete type.
pub enum CloudAdapter {
    Aws(SdkAdapter<AwsCodec>),
    Gcp(SdkAdapter<GcpCodec>),
    Azure(SdkAdapter<AzureCodec>),
}

macro_rules! dispatch_adapter {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            CloudAdapter::Aws(adapter) => adapter.$method($($arg),*),
            CloudAdapter::Gcp(adapter) => adapter.$method($($arg),*),
            CloudAdapter::Azure(adapter) => adapter.$method($($arg),*),
        }
    };
}

impl CloudAdapter {
    pub fn aws(
        sdk: Arc<dyn MonitoringSdk>,
        settings: AwsSettings,
        catalog: Arc<MetricCatalog>,
    ) -> Self {
        CloudAdapter::Aws(SdkAdapter::new(sdk, AwsCodec::new(settings.region), catalog))
    }

    pub fn gcp(
        sdk: Arc<dyn MonitoringSdk>,
        settings: GcpSettings,
        catalog: Arc<MetricCatalog>,
    ) -> Self {
        CloudAdapter::Gcp(SdkAdapter::new(sdk, GcpCodec::new(settings.project_id), catalog))
    }

    pub fn azure(
        sdk: Arc<dyn MonitoringSdk>,
        settings: AzureSettings,
        catalog: Arc<MetricCatalog>,
    ) -> Self {
        CloudAdapter::Azure(SdkAdapter::new(
            sdk,
            AzureCodec::new(settings.subscription_id, settings.resource_group),
            catalog,
        ))
    }
}

#[async_trait]
impl ProviderAdapter for CloudAdapter {
    fn provider(&self) -> Provider {
        dispatch_adapter!(self, provider)
    }

    async fn create_dashboard(
        &self,
        credential: &ProviderCredential,
        dashboard: &CanonicalDashboard,
        idempotency_key: Option<&str>,
    ) -> Result<ProviderDashboardHandle, AdapterError> {
        dispatch_adapter!(self, create_dashboard, credential, dashboard, idempotency_key).await
    }

    async fn get_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<CanonicalDashboard, AdapterError> {
        dispatch_adapter!(self, get_dashboard, credential, id).await
    }

    async fn list_dashboards(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Vec<CanonicalDashboard>, AdapterError> {
        dispatch_adapter!(self, list_dashboards, credential).await
    }

    async fn delete_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), AdapterError> {
        dispatch_adapter!(self, delete_dashboard, credential, id).await
    }

    async fn create_alarm(
        &self,
        credential: &ProviderCredential,
        alarm: &CanonicalAlarmRule,
        idempotency_key: Option<&str>,
    ) -> Result<ProviderAlarmHandle, AdapterError> {
        dispatch_adapter!(self, create_alarm, credential, alarm, idempotency_key).await
    }

    async fn list_alarms(
        &self,
        credential: &ProviderCredential,
        filter: &AlarmFilter,
    ) -> Result<Vec<CanonicalAlarmRule>, AdapterError> {
        dispatch_adapter!(self, list_alarms, credential, filter).await
    }

    async fn delete_alarm(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), AdapterError> {
        dispatch_adapter!(self, delete_alarm, credential, id).await
    }

    async fn query_metric(
        &self,
        credential: &ProviderCredential,
        query: &CanonicalMetricQuery,
    ) -> Result<Vec<DataPoint>, AdapterError> {
        dispatch_adapter!(self, query_metric, credential, query).await
    }

    async fn write_metric(
        &self,
        credential: &ProviderCredential,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
    ) -> Result<(), AdapterError> {
        dispatch_adapter!(self, write_metric, credential, series, points).await
    }

    fn parse_alarm_notification(&self, payload: &Value) -> Result<AlarmStateChange, AdapterError> {
        dispatch_adapter!(self, parse_alarm_notification, payload)
    }
}
