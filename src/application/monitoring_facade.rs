// Monitoring facade - the single entry point for dashboards, alarms and metric queries
use crate::application::dispatcher::{CallOptions, Dispatcher, FanOutResult};
use crate::application::error::{MonitoringError, Operation, RequestContext};
use crate::domain::alarm::{
    AlarmFilter, AlarmStateChange, CanonicalAlarmRule, ProviderAlarmHandle,
};
use crate::domain::credential::CredentialSet;
use crate::domain::dashboard::{CanonicalDashboard, ProviderDashboardHandle};
use crate::domain::metric_query::{CanonicalMetricQuery, DataPoint};
use crate::domain::provider::{Provider, ProviderSelector};
use std::borrow::Cow;
use std::future::Future;

/// Result of a call addressed by a `ProviderSelector`.
///
/// A single-provider call yields `Single`; its failure is the `Err` of the
/// surrounding `Result`. An `All` call always yields `FanOut`, with each
/// provider's failure recorded next to the successes.
#[derive(Debug)]
pub enum Outcome<T> {
    Single(T),
    FanOut(FanOutResult<T>),
}

impl<T> Outcome<T> {
    pub fn single(self) -> Option<T> {
        match self {
            Outcome::Single(value) => Some(value),
            Outcome::FanOut(_) => None,
        }
    }

    pub fn fan_out(self) -> Option<FanOutResult<T>> {
        match self {
            Outcome::Single(_) => None,
            Outcome::FanOut(result) => Some(result),
        }
    }
}

/// Per-rule outcomes of a batch create, in input order.
pub type BatchOutcome = Vec<Result<ProviderAlarmHandle, MonitoringError>>;

/// Stateless router over the dispatcher. Credentials are borrowed per call.
pub struct MonitoringFacade {
    dispatcher: Dispatcher,
}

impl MonitoringFacade {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    async fn route<T, F, Fut>(
        &self,
        selector: ProviderSelector,
        call: F,
    ) -> Result<Outcome<T>, MonitoringError>
    where
        F: Fn(Provider) -> Fut,
        Fut: Future<Output = Result<T, MonitoringError>>,
    {
        match selector {
            ProviderSelector::One(provider) => call(provider).await.map(Outcome::Single),
            ProviderSelector::All => {
                let providers = self.dispatcher.providers(ProviderSelector::All);
                Ok(Outcome::FanOut(self.dispatcher.fan_out(providers, call).await))
            }
        }
    }

    pub async fn create_dashboard(
        &self,
        selector: ProviderSelector,
        credentials: &CredentialSet,
        dashboard: &CanonicalDashboard,
        options: &CallOptions,
    ) -> Result<Outcome<ProviderDashboardHandle>, MonitoringError> {
        tracing::info!(
            dashboard = %dashboard.id,
            widgets = dashboard.widgets.len(),
            ?selector,
            "creating dashboard"
        );
        let fan_out = selector == ProviderSelector::All;
        self.route(selector, |provider| {
            self.create_dashboard_on(provider, credentials, dashboard, options, fan_out)
        })
        .await
    }

    async fn create_dashboard_on(
        &self,
        provider: Provider,
        credentials: &CredentialSet,
        dashboard: &CanonicalDashboard,
        options: &CallOptions,
        fan_out: bool,
    ) -> Result<ProviderDashboardHandle, MonitoringError> {
        let dashboard = if fan_out {
            Cow::Owned(dashboard.retargeted(provider))
        } else {
            Cow::Borrowed(dashboard)
        };
        let dashboard = dashboard.as_ref();
        let context = RequestContext::new(provider, Operation::CreateDashboard, &dashboard.id);
        let queries: Vec<&CanonicalMetricQuery> = dashboard.queries().collect();
        let key = options.idempotency_key.as_deref();

        self.dispatcher
            .execute(context, &queries, credentials, options, |adapter, credential| {
                adapter.create_dashboard(credential, dashboard, key)
            })
            .await
    }

    pub async fn get_dashboard(
        &self,
        provider: Provider,
        credentials: &CredentialSet,
        id: &str,
        options: &CallOptions,
    ) -> Result<CanonicalDashboard, MonitoringError> {
        let context = RequestContext::new(provider, Operation::GetDashboard, id);
        self.dispatcher
            .execute(context, &[], credentials, options, |adapter, credential| {
                adapter.get_dashboard(credential, id)
            })
            .await
    }

    pub async fn list_dashboards(
        &self,
        selector: ProviderSelector,
        credentials: &CredentialSet,
        options: &CallOptions,
    ) -> Result<Outcome<Vec<CanonicalDashboard>>, MonitoringError> {
        self.route(selector, |provider| async move {
            let context = RequestContext::new(provider, Operation::ListDashboards, "*");
            self.dispatcher
                .execute(context, &[], credentials, options, |adapter, credential| {
                    adapter.list_dashboards(credential)
                })
                .await
        })
        .await
    }

    pub async fn delete_dashboard(
        &self,
        provider: Provider,
        credentials: &CredentialSet,
        id: &str,
        options: &CallOptions,
    ) -> Result<(), MonitoringError> {
        tracing::info!(%provider, dashboard = id, "deleting dashboard");
        let context = RequestContext::new(provider, Operation::DeleteDashboard, id);
        self.dispatcher
            .execute(context, &[], credentials, options, |adapter, credential| {
                adapter.delete_dashboard(credential, id)
            })
            .await
    }

    pub async fn create_alarm(
        &self,
        selector: ProviderSelector,
        credentials: &CredentialSet,
        alarm: &CanonicalAlarmRule,
        options: &CallOptions,
    ) -> Result<Outcome<ProviderAlarmHandle>, MonitoringError> {
        tracing::info!(alarm = %alarm.id, ?selector, "creating alarm");
        let fan_out = selector == ProviderSelector::All;
        self.route(selector, |provider| {
            self.create_alarm_on(provider, credentials, alarm, options, fan_out)
        })
        .await
    }

    /// Create several alarms, at most `concurrency_limit` at a time per provider.
    /// A batch idempotency key is suffixed with each alarm id.
    pub async fn create_alarms(
        &self,
        selector: ProviderSelector,
        credentials: &CredentialSet,
        alarms: &[CanonicalAlarmRule],
        options: &CallOptions,
    ) -> Result<Outcome<BatchOutcome>, MonitoringError> {
        tracing::info!(alarms = alarms.len(), ?selector, "creating alarm batch");
        let fan_out = selector == ProviderSelector::All;
        self.route(selector, |provider| async move {
            let outcomes = self
                .dispatcher
                .bounded(alarms, |alarm| {
                    let options = options.for_item(&alarm.id);
                    async move {
                        self.create_alarm_on(provider, credentials, alarm, &options, fan_out)
                            .await
                    }
                })
                .await;
            Ok(outcomes)
        })
        .await
    }

    async fn create_alarm_on(
        &self,
        provider: Provider,
        credentials: &CredentialSet,
        alarm: &CanonicalAlarmRule,
        options: &CallOptions,
        fan_out: bool,
    ) -> Result<ProviderAlarmHandle, MonitoringError> {
        let alarm = if fan_out {
            Cow::Owned(alarm.retargeted(provider))
        } else {
            Cow::Borrowed(alarm)
        };
        let alarm = alarm.as_ref();
        let context = RequestContext::new(provider, Operation::CreateAlarm, &alarm.id);
        if let Err(invalid) = alarm.validate() {
            return Err(self.dispatcher.reject(context, invalid.to_string()));
        }
        let key = options.idempotency_key.as_deref();

        self.dispatcher
            .execute(context, &[&alarm.metric], credentials, options, |adapter, credential| {
                adapter.create_alarm(credential, alarm, key)
            })
            .await
    }

    pub async fn list_alarms(
        &self,
        selector: ProviderSelector,
        credentials: &CredentialSet,
        filter: AlarmFilter,
        options: &CallOptions,
    ) -> Result<Outcome<Vec<CanonicalAlarmRule>>, MonitoringError> {
        let filter = &filter;
        self.route(selector, |provider| async move {
            let context = RequestContext::new(provider, Operation::ListAlarms, "*");
            self.dispatcher
                .execute(context, &[], credentials, options, |adapter, credential| {
                    adapter.list_alarms(credential, filter)
                })
                .await
        })
        .await
    }

    pub async fn delete_alarm(
        &self,
        provider: Provider,
        credentials: &CredentialSet,
        id: &str,
        options: &CallOptions,
    ) -> Result<(), MonitoringError> {
        tracing::info!(%provider, alarm = id, "deleting alarm");
        let context = RequestContext::new(provider, Operation::DeleteAlarm, id);
        self.dispatcher
            .execute(context, &[], credentials, options, |adapter, credential| {
                adapter.delete_alarm(credential, id)
            })
            .await
    }

    /// Delete several alarms on one provider, at most `concurrency_limit` at a
    /// time. Outcomes keep the order of `ids`; a missing alarm is `NotFound`.
    pub async fn delete_alarms(
        &self,
        provider: Provider,
        credentials: &CredentialSet,
        ids: &[String],
        options: &CallOptions,
    ) -> Vec<Result<(), MonitoringError>> {
        tracing::info!(%provider, alarms = ids.len(), "deleting alarm batch");
        self.dispatcher
            .bounded(ids, |id| self.delete_alarm(provider, credentials, id, options))
            .await
    }

    /// With `All`, the query is re-addressed to each provider; the metric must
    /// be mapped for every one of them or that provider reports UnsupportedMetric.
    pub async fn query_metric(
        &self,
        selector: ProviderSelector,
        credentials: &CredentialSet,
        query: &CanonicalMetricQuery,
        options: &CallOptions,
    ) -> Result<Outcome<Vec<DataPoint>>, MonitoringError> {
        let fan_out = selector == ProviderSelector::All;
        self.route(selector, |provider| async move {
            let query = if fan_out {
                Cow::Owned(query.retargeted(provider))
            } else {
                Cow::Borrowed(query)
            };
            let query = query.as_ref();
            let context =
                RequestContext::new(provider, Operation::QueryMetric, &query.metric_name);
            self.dispatcher
                .execute(context, &[query], credentials, options, |adapter, credential| {
                    adapter.query_metric(credential, query)
                })
                .await
        })
        .await
    }

    /// Publish `points` to the series named by `series`. The series window
    /// must contain every point; its aggregation is validated but unused.
    /// Writes are retried only under an idempotency key.
    pub async fn write_metric(
        &self,
        selector: ProviderSelector,
        credentials: &CredentialSet,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
        options: &CallOptions,
    ) -> Result<Outcome<()>, MonitoringError> {
        tracing::info!(
            metric = %series.metric_name,
            points = points.len(),
            ?selector,
            "writing metric points"
        );
        let fan_out = selector == ProviderSelector::All;
        self.route(selector, |provider| async move {
            let series = if fan_out {
                Cow::Owned(series.retargeted(provider))
            } else {
                Cow::Borrowed(series)
            };
            let series = series.as_ref();
            let context =
                RequestContext::new(provider, Operation::WriteMetric, &series.metric_name);
            if let Some(reason) = unwritable(series, points) {
                return Err(self.dispatcher.reject(context, reason));
            }
            self.dispatcher
                .execute(context, &[series], credentials, options, |adapter, credential| {
                    adapter.write_metric(credential, series, points)
                })
                .await
        })
        .await
    }

    /// Normalize an alarm state push received from `provider`. No remote call.
    pub fn apply_alarm_notification(
        &self,
        provider: Provider,
        payload: &serde_json::Value,
    ) -> Result<AlarmStateChange, MonitoringError> {
        let context = RequestContext::new(provider, Operation::ApplyNotification, "notification");
        let Some(adapter) = self.dispatcher.adapter(provider) else {
            let reason = format!("no adapter configured for {provider}");
            return Err(self.dispatcher.reject(context, reason));
        };
        let change = adapter
            .parse_alarm_notification(payload)
            .map_err(|error| MonitoringError::from_adapter(context, error))?;
        tracing::info!(
            %provider,
            alarm = %change.alarm_id,
            state = ?change.state,
            "alarm state changed"
        );
        Ok(change)
    }
}

/// Why `points` cannot be written to `series`, if they cannot.
fn unwritable(series: &CanonicalMetricQuery, points: &[DataPoint]) -> Option<String> {
    if points.is_empty() {
        return Some("no points to write".to_string());
    }
    if let Some(point) = points.iter().find(|point| !point.value.is_finite()) {
        return Some(format!("value at {} is not finite", point.timestamp));
    }
    points
        .iter()
        .find(|point| point.timestamp < series.start || point.timestamp >= series.end)
        .map(|point| {
            format!(
                "point at {} is outside [{}, {})",
                point.timestamp, series.start, series.end
            )
        })
}
