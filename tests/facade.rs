// End-to-end behavior of the monitoring facade against in-memory provider SDKs
use std::sync::Arc;
use std::time::Duration;

use multicloud_monitoring::application::dispatcher::{CallOptions, Dispatcher};
use multicloud_monitoring::application::error::MonitoringError;
use multicloud_monitoring::application::metric_catalog::MetricCatalog;
use multicloud_monitoring::application::monitoring_facade::{MonitoringFacade, Outcome};
use multicloud_monitoring::application::provider_adapter::{AdapterError, ProviderAdapter};
use multicloud_monitoring::application::retry::Jitter;
use multicloud_monitoring::domain::alarm::{
    AlarmFilter, AlarmState, CanonicalAlarmRule, Comparator,
};
use multicloud_monitoring::domain::credential::{CredentialSet, ProviderCredential};
use multicloud_monitoring::domain::dashboard::{CanonicalDashboard, Widget, WidgetType};
use multicloud_monitoring::domain::metric_query::{Aggregation, CanonicalMetricQuery, DataPoint};
use multicloud_monitoring::domain::provider::{Provider, ProviderSelector};
use multicloud_monitoring::infrastructure::cloud_adapter::CloudAdapter;
use multicloud_monitoring::infrastructure::config::{AwsSettings, AzureSettings, GcpSettings};
use multicloud_monitoring::infrastructure::in_memory_sdk::InMemoryMonitoringSdk;
use multicloud_monitoring::infrastructure::normalization::NativeCodec;
use multicloud_monitoring::infrastructure::normalization::aws::AwsCodec;
use multicloud_monitoring::infrastructure::normalization::azure::AzureCodec;
use multicloud_monitoring::infrastructure::normalization::gcp::GcpCodec;
use multicloud_monitoring::infrastructure::sdk::SdkError;
use serde_json::json;

/// Always the middle of the backoff window.
struct Midpoint;

impl Jitter for Midpoint {
    fn sample(&self, low: Duration, high: Duration) -> Duration {
        low + (high - low) / 2
    }
}

struct Clouds {
    facade: MonitoringFacade,
    aws: Arc<InMemoryMonitoringSdk>,
    gcp: Arc<InMemoryMonitoringSdk>,
    azure: Arc<InMemoryMonitoringSdk>,
}

impl Clouds {
    fn sdk(&self, provider: Provider) -> &InMemoryMonitoringSdk {
        match provider {
            Provider::Aws => &self.aws,
            Provider::Gcp => &self.gcp,
            Provider::Azure => &self.azure,
        }
    }

    fn total_calls(&self) -> usize {
        Provider::ALL.iter().map(|p| self.sdk(*p).call_count()).sum()
    }
}

fn clouds_with_latency(latency: Option<Duration>) -> Clouds {
    let catalog = Arc::new(MetricCatalog::builtin());
    let sdk = |provider| {
        let sdk = InMemoryMonitoringSdk::new(provider);
        Arc::new(match latency {
            Some(latency) => sdk.with_latency(latency),
            None => sdk,
        })
    };
    let (aws, gcp, azure) = (sdk(Provider::Aws), sdk(Provider::Gcp), sdk(Provider::Azure));

    let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
        Arc::new(CloudAdapter::aws(aws.clone(), AwsSettings::default(), catalog.clone())),
        Arc::new(CloudAdapter::gcp(gcp.clone(), GcpSettings::default(), catalog.clone())),
        Arc::new(CloudAdapter::azure(azure.clone(), AzureSettings::default(), catalog.clone())),
    ];
    let dispatcher = Dispatcher::new(adapters, catalog).with_jitter(Arc::new(Midpoint));
    Clouds {
        facade: MonitoringFacade::new(dispatcher),
        aws,
        gcp,
        azure,
    }
}

fn clouds() -> Clouds {
    clouds_with_latency(None)
}

fn credentials() -> CredentialSet {
    CredentialSet::new()
        .with(Provider::Aws, ProviderCredential::new("aws-secret"))
        .with(Provider::Gcp, ProviderCredential::new("gcp-secret"))
        .with(Provider::Azure, ProviderCredential::new("azure-secret"))
}

fn cpu(provider: Provider, start: i64, end: i64, period: u32) -> CanonicalMetricQuery {
    let aggregation = Aggregation::Avg;
    CanonicalMetricQuery::new(provider, "web-1", "cpu_utilization", aggregation, start, end, period)
}

fn cpu_alarm(id: &str, threshold: f64) -> CanonicalAlarmRule {
    let metric = CanonicalMetricQuery::relative(
        Provider::Aws,
        "i-1",
        "cpu_utilization",
        Aggregation::Avg,
        300,
        2,
    );
    CanonicalAlarmRule::new(id, metric, Comparator::Gt, threshold, 2)
}

fn throttled() -> SdkError {
    SdkError::new("Rate exceeded").with_code("Throttling").with_status(400)
}

#[test]
fn test_query_round_trip_on_every_provider() {
    let catalog = MetricCatalog::builtin();
    let codecs: Vec<(Box<dyn NativeCodec>, &str, &[&str])> = vec![
        (
            Box::new(AwsCodec::new("eu-west-1")),
            "i-0abc",
            &["cpu_utilization", "database_connections", "active_users"],
        ),
        (
            Box::new(GcpCodec::new("acme")),
            "1234",
            &["cpu_utilization", "database_connections", "container_cpu"],
        ),
        (
            Box::new(AzureCodec::new("sub", "rg")),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm",
            &["cpu_utilization"],
        ),
    ];

    for (codec, resource, metrics) in codecs {
        for metric in metrics {
            for aggregation in [Aggregation::Avg, Aggregation::Max, Aggregation::Count] {
                let query = CanonicalMetricQuery::new(
                    codec.provider(),
                    resource,
                    *metric,
                    aggregation,
                    1_700_000_000,
                    1_700_086_400,
                    3_600,
                );
                let native = codec.encode_query(&query, &catalog).unwrap();
                let decoded = codec.decode_query(&native, &catalog).unwrap();
                assert_eq!(decoded, query, "{} {metric} {aggregation}", codec.provider());
            }
        }
    }
}

#[tokio::test]
async fn test_query_returns_normalized_points() {
    let clouds = clouds();
    clouds.azure.seed_points(
        "Percentage CPU",
        vec![
            DataPoint::new(600, 30.0),
            DataPoint::new(0, 10.0),
            DataPoint::new(300, 20.0),
            DataPoint::new(900, 99.0),
        ],
    );

    let query = cpu(Provider::Azure, 0, 900, 300);
    let points = clouds
        .facade
        .query_metric(Provider::Azure.into(), &credentials(), &query, &CallOptions::new())
        .await
        .unwrap()
        .single()
        .unwrap();

    assert_eq!(
        points,
        vec![DataPoint::new(0, 10.0), DataPoint::new(300, 20.0), DataPoint::new(600, 30.0)]
    );
}

#[tokio::test]
async fn test_unsupported_metric_makes_no_calls() {
    let clouds = clouds();
    let mut query = cpu(Provider::Gcp, 0, 600, 60);
    query.metric_name = "disk_iops".into();

    let result = clouds
        .facade
        .query_metric(Provider::Gcp.into(), &credentials(), &query, &CallOptions::new())
        .await;

    assert!(matches!(
        result,
        Err(MonitoringError::UnsupportedMetric { provider: Provider::Gcp, ref metric })
            if metric == "disk_iops"
    ));
    assert_eq!(clouds.total_calls(), 0);
}

#[tokio::test]
async fn test_invalid_aggregation_makes_no_calls() {
    let clouds = clouds();
    let mut query = cpu(Provider::Azure, 0, 600, 60);
    query.metric_name = "request_count".into();
    query.aggregation = Aggregation::Avg;

    let result = clouds
        .facade
        .query_metric(Provider::Azure.into(), &credentials(), &query, &CallOptions::new())
        .await;

    assert!(matches!(result, Err(MonitoringError::InvalidAggregation { .. })));
    assert_eq!(clouds.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_twice_then_success() {
    let clouds = clouds();
    clouds.aws.seed_points("CPUUtilization", vec![DataPoint::new(0, 42.0)]);
    clouds.aws.fail_next(vec![throttled(), throttled()]);

    let query = cpu(Provider::Aws, 0, 300, 60);
    let points = clouds
        .facade
        .query_metric(Provider::Aws.into(), &credentials(), &query, &CallOptions::new())
        .await
        .unwrap()
        .single()
        .unwrap();

    assert_eq!(points, vec![DataPoint::new(0, 42.0)]);
    let calls = clouds.aws.call_instants();
    assert_eq!(calls.len(), 3);
    let first_delay = calls[1] - calls[0];
    let second_delay = calls[2] - calls[1];
    assert!(second_delay >= first_delay, "{second_delay:?} < {first_delay:?}");
    assert!(first_delay >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_persistent_throttling_exhausts_retries() {
    let clouds = clouds();
    let quota = SdkError::new("quota").with_code("RESOURCE_EXHAUSTED").with_status(429);
    clouds.gcp.fail_always(quota);

    let result = clouds
        .facade
        .list_dashboards(Provider::Gcp.into(), &credentials(), &CallOptions::new())
        .await;

    match result {
        Err(MonitoringError::ExhaustedRetries { attempts, last_error, .. }) => {
            assert_eq!(attempts, 3);
            assert!(matches!(last_error, AdapterError::RateLimited(_)));
        }
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
    assert_eq!(clouds.gcp.call_count(), 3);
}

#[tokio::test]
async fn test_fan_out_survives_one_auth_failure() {
    let clouds = clouds();
    clouds
        .gcp
        .fail_always(SdkError::new("token expired").with_code("UNAUTHENTICATED").with_status(401));

    let query = cpu(Provider::Aws, 0, 600, 300);
    let result = clouds
        .facade
        .query_metric(ProviderSelector::All, &credentials(), &query, &CallOptions::new())
        .await
        .unwrap()
        .fan_out()
        .unwrap();

    assert_eq!(result.successes.len(), 2);
    assert!(result.success(Provider::Aws).is_some());
    assert!(result.success(Provider::Azure).is_some());
    assert_eq!(result.failures.len(), 1);
    assert!(matches!(result.failure(Provider::Gcp), Some(MonitoringError::AuthFailed { .. })));
    // Authentication failures are not retried.
    assert_eq!(clouds.gcp.call_count(), 1);

    let strict = result.into_result();
    assert!(matches!(
        strict,
        Err(MonitoringError::PartialFailure { ref failures }) if failures.len() == 1
    ));
}

#[tokio::test]
async fn test_misaligned_range_is_rejected_before_dispatch() {
    let clouds = clouds();
    let query = cpu(Provider::Aws, 100, 200, 30);
    let result = clouds
        .facade
        .query_metric(Provider::Aws.into(), &credentials(), &query, &CallOptions::new())
        .await;

    assert!(matches!(result, Err(MonitoringError::Rejected { .. })));
    assert_eq!(clouds.total_calls(), 0);
}

#[tokio::test]
async fn test_fan_out_reject_is_per_provider() {
    let clouds = clouds();
    let query = cpu(Provider::Aws, 100, 200, 30);
    let result = clouds
        .facade
        .query_metric(ProviderSelector::All, &credentials(), &query, &CallOptions::new())
        .await
        .unwrap()
        .fan_out()
        .unwrap();

    assert!(result.successes.is_empty());
    assert_eq!(result.failures.len(), 3);
    assert!(result
        .failures
        .iter()
        .all(|failure| matches!(failure.error, MonitoringError::Rejected { .. })));
    assert_eq!(clouds.total_calls(), 0);
}

#[tokio::test]
async fn test_dashboard_widget_order_survives_every_provider() {
    let clouds = clouds();
    let widget = |kind, title: &str| {
        let mut query = cpu(Provider::Aws, 0, 300, 300);
        query.aggregation = Aggregation::Max;
        Widget::new(kind, vec![query]).with_extension("title", title)
    };
    let dashboard = CanonicalDashboard::new(
        "realtime",
        "Real-Time Monitoring",
        vec![
            widget(WidgetType::TimeSeries, "A"),
            widget(WidgetType::SingleValue, "B"),
            widget(WidgetType::TimeSeries, "C"),
        ],
    );
    let options = CallOptions::new().with_idempotency_key("dash-1");

    let created = clouds
        .facade
        .create_dashboard(ProviderSelector::All, &credentials(), &dashboard, &options)
        .await
        .unwrap()
        .fan_out()
        .unwrap();
    assert!(created.is_complete(), "{:?}", created.failures);

    let listed = clouds
        .facade
        .list_dashboards(ProviderSelector::All, &credentials(), &CallOptions::new())
        .await
        .unwrap()
        .fan_out()
        .unwrap();

    for provider in Provider::ALL {
        let dashboards = listed.success(provider).unwrap();
        assert_eq!(dashboards.len(), 1, "{provider}");
        let titles: Vec<_> = dashboards[0]
            .widgets
            .iter()
            .map(|w| w.extensions["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["A", "B", "C"], "{provider}");
        assert_eq!(dashboards[0], dashboard.retargeted(provider), "{provider}");

        let handle = created.success(provider).unwrap();
        let fetched = clouds
            .facade
            .get_dashboard(provider, &credentials(), &handle.id, &CallOptions::new())
            .await
            .unwrap();
        assert_eq!(fetched, dashboards[0]);
    }
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expiry_is_a_timeout() {
    let clouds = clouds_with_latency(Some(Duration::from_secs(10)));
    let options = CallOptions::new().with_timeout(Duration::from_secs(2));

    let result = clouds
        .facade
        .list_alarms(Provider::Azure.into(), &credentials(), AlarmFilter::default(), &options)
        .await;

    assert!(matches!(result, Err(MonitoringError::Timeout { attempts: 1, .. })));
}

#[tokio::test(start_paused = true)]
async fn test_create_without_key_is_not_retried() {
    let clouds = clouds();
    clouds.aws.fail_next(vec![throttled()]);

    let rule = cpu_alarm("cpu-high", 80.0);
    let result = clouds
        .facade
        .create_alarm(Provider::Aws.into(), &credentials(), &rule, &CallOptions::new())
        .await;

    assert!(matches!(result, Err(MonitoringError::ExhaustedRetries { attempts: 1, .. })));
    assert_eq!(clouds.aws.call_count(), 1);
    assert_eq!(clouds.aws.alarm_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_with_key_is_retried() {
    let clouds = clouds();
    clouds.aws.fail_next(vec![throttled()]);
    let options = CallOptions::new().with_idempotency_key("cpu-high-v1");

    let rule = cpu_alarm("cpu-high", 80.0);
    let handle = clouds
        .facade
        .create_alarm(Provider::Aws.into(), &credentials(), &rule, &options)
        .await
        .unwrap()
        .single()
        .unwrap();

    assert_eq!(handle.id, "cpu-high");
    assert_eq!(clouds.aws.call_count(), 2);
    assert_eq!(clouds.aws.client_tokens(), vec!["cpu-high-v1".to_string()]);
}

#[tokio::test]
async fn test_delete_missing_alarm_is_not_found() {
    let clouds = clouds();
    let result = clouds
        .facade
        .delete_alarm(Provider::Aws, &credentials(), "never-created", &CallOptions::new())
        .await;

    assert!(matches!(result, Err(MonitoringError::NotFound { .. })));
    assert_eq!(clouds.aws.call_count(), 1);
}

#[tokio::test]
async fn test_delete_dashboard_then_get_is_not_found() {
    let clouds = clouds();
    let dashboard = CanonicalDashboard::new(
        "ops",
        "Ops",
        vec![Widget::new(WidgetType::TimeSeries, vec![cpu(Provider::Gcp, 0, 300, 60)])],
    );
    let options = CallOptions::new();
    let handle = clouds
        .facade
        .create_dashboard(Provider::Gcp.into(), &credentials(), &dashboard, &options)
        .await
        .unwrap()
        .single()
        .unwrap();

    clouds
        .facade
        .delete_dashboard(Provider::Gcp, &credentials(), &handle.id, &CallOptions::new())
        .await
        .unwrap();
    let result = clouds
        .facade
        .get_dashboard(Provider::Gcp, &credentials(), "ops", &CallOptions::new())
        .await;
    assert!(matches!(result, Err(MonitoringError::NotFound { .. })));
}

#[tokio::test]
async fn test_list_alarms_filters_by_state() {
    let clouds = clouds();
    let alarms = vec![cpu_alarm("cpu-high", 80.0), cpu_alarm("cpu-critical", 95.0)];
    let options = CallOptions::new();
    let outcomes = clouds
        .facade
        .create_alarms(Provider::Aws.into(), &credentials(), &alarms, &options)
        .await
        .unwrap()
        .single()
        .unwrap();
    assert!(outcomes.iter().all(Result::is_ok));

    clouds.aws.update_alarm("cpu-high", |body| body["StateValue"] = json!("ALARM"));

    let alarming = clouds
        .facade
        .list_alarms(
            Provider::Aws.into(),
            &credentials(),
            AlarmFilter::in_state(AlarmState::Alarm),
            &CallOptions::new(),
        )
        .await
        .unwrap()
        .single()
        .unwrap();
    assert_eq!(alarming.len(), 1);
    assert_eq!(alarming[0].id, "cpu-high");

    let all = clouds
        .facade
        .list_alarms(Provider::Aws.into(), &credentials(), AlarmFilter::default(), &options)
        .await
        .unwrap()
        .single()
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_alarm_round_trip_on_every_provider() {
    let clouds = clouds();
    let rule = cpu_alarm("cpu-high", 80.0).notify("ops-channel");

    let created = clouds
        .facade
        .create_alarm(ProviderSelector::All, &credentials(), &rule, &CallOptions::new())
        .await
        .unwrap()
        .fan_out()
        .unwrap();
    assert!(created.is_complete(), "{:?}", created.failures);

    let options = CallOptions::new();
    for provider in Provider::ALL {
        let listed = clouds
            .facade
            .list_alarms(provider.into(), &credentials(), AlarmFilter::default(), &options)
            .await
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(listed, vec![rule.retargeted(provider)], "{provider}");
    }
}

#[tokio::test]
async fn test_missing_credential_is_rejected() {
    let clouds = clouds();
    let only_aws = CredentialSet::new().with(Provider::Aws, ProviderCredential::new("aws-secret"));

    let result = clouds
        .facade
        .list_dashboards(Provider::Azure.into(), &only_aws, &CallOptions::new())
        .await;

    match result {
        Err(error @ MonitoringError::Rejected { .. }) => {
            assert!(!format!("{error:?}").contains("aws-secret"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(clouds.total_calls(), 0);
}

#[test]
fn test_alarm_notifications_from_each_provider() {
    let clouds = clouds();
    let sns = json!({
        "Type": "Notification",
        "Message": concat!(
            "{\"AlarmName\":\"cpu-high\",",
            "\"NewStateValue\":\"ALARM\",\"OldStateValue\":\"OK\"}"
        )
    });
    let change = clouds.facade.apply_alarm_notification(Provider::Aws, &sns).unwrap();
    assert_eq!((change.alarm_id.as_str(), change.state), ("cpu-high", AlarmState::Alarm));

    let incident = json!({"incident": {"policy_name": "cpu-high", "state": "closed"}});
    let change = clouds.facade.apply_alarm_notification(Provider::Gcp, &incident).unwrap();
    assert_eq!(change.state, AlarmState::Ok);

    let garbage = json!({"hello": "world"});
    let result = clouds.facade.apply_alarm_notification(Provider::Azure, &garbage);
    assert!(matches!(result, Err(MonitoringError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_alarm_with_absolute_window_is_rejected() {
    let clouds = clouds();
    let mut rule = cpu_alarm("cpu-high", 80.0);
    rule.metric.start = 1_700_000_000;
    rule.metric.end = 1_700_000_600;

    let result = clouds
        .facade
        .create_alarm(Provider::Aws.into(), &credentials(), &rule, &CallOptions::new())
        .await;

    match result {
        Err(MonitoringError::Rejected { reason, .. }) => {
            assert!(reason.contains("(0, 600)"), "{reason}");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(clouds.total_calls(), 0);
}

#[tokio::test]
async fn test_alarm_metric_extensions_survive_every_provider() {
    let clouds = clouds();
    let mut rule = cpu_alarm("cpu-high", 80.0);
    rule.metric.extensions.insert("Unit".into(), json!("Percent"));
    let options = CallOptions::new();

    let created = clouds
        .facade
        .create_alarm(ProviderSelector::All, &credentials(), &rule, &options)
        .await
        .unwrap()
        .fan_out()
        .unwrap();
    assert!(created.is_complete(), "{:?}", created.failures);

    for provider in Provider::ALL {
        let listed = clouds
            .facade
            .list_alarms(provider.into(), &credentials(), AlarmFilter::default(), &options)
            .await
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(listed[0].metric.extensions["Unit"], "Percent", "{provider}");
        assert_eq!(listed, vec![rule.retargeted(provider)], "{provider}");
    }
}

#[tokio::test]
async fn test_overflowing_range_is_rejected() {
    let clouds = clouds();
    let query = cpu(Provider::Aws, i64::MIN, i64::MAX, 60);

    let result = clouds
        .facade
        .query_metric(Provider::Aws.into(), &credentials(), &query, &CallOptions::new())
        .await;

    assert!(matches!(result, Err(MonitoringError::Rejected { .. })));
    assert_eq!(clouds.total_calls(), 0);
}

#[tokio::test]
async fn test_gcp_chart_with_absolute_window_is_not_created() {
    let clouds = clouds();
    let dashboard = CanonicalDashboard::new(
        "history",
        "History",
        vec![Widget::new(
            WidgetType::TimeSeries,
            vec![cpu(Provider::Gcp, 1_700_000_000, 1_700_003_600, 300)],
        )],
    );

    let result = clouds
        .facade
        .create_dashboard(Provider::Gcp.into(), &credentials(), &dashboard, &CallOptions::new())
        .await;

    assert!(result.is_err(), "{result:?}");
    assert_eq!(clouds.gcp.dashboard_count(), 0);
}

#[tokio::test]
async fn test_written_points_are_queryable_on_every_provider() {
    let clouds = clouds();
    let options = CallOptions::new();
    let points = vec![DataPoint::new(0, 41.0), DataPoint::new(60, 43.5)];

    for provider in Provider::ALL {
        let series = cpu(provider, 0, 120, 60);
        clouds
            .facade
            .write_metric(provider.into(), &credentials(), &series, &points, &options)
            .await
            .unwrap();

        let read = clouds
            .facade
            .query_metric(provider.into(), &credentials(), &series, &options)
            .await
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(read, points, "{provider}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_throttled_write_is_not_retried_without_key() {
    let clouds = clouds();
    clouds.aws.fail_next(vec![throttled()]);
    let series = cpu(Provider::Aws, 0, 120, 60);

    let result = clouds
        .facade
        .write_metric(
            Provider::Aws.into(),
            &credentials(),
            &series,
            &[DataPoint::new(0, 1.0)],
            &CallOptions::new(),
        )
        .await;

    assert!(matches!(result, Err(MonitoringError::ExhaustedRetries { attempts: 1, .. })));
    assert_eq!(clouds.aws.call_count(), 1);
}

#[tokio::test]
async fn test_write_outside_the_series_window_makes_no_calls() {
    let clouds = clouds();
    let series = cpu(Provider::Gcp, 0, 120, 60);

    let result = clouds
        .facade
        .write_metric(
            ProviderSelector::All,
            &credentials(),
            &series,
            &[DataPoint::new(120, 1.0)],
            &CallOptions::new(),
        )
        .await
        .unwrap()
        .fan_out()
        .unwrap();

    assert_eq!(result.failures.len(), 3);
    assert_eq!(clouds.total_calls(), 0);
}

#[tokio::test]
async fn test_bulk_delete_keeps_input_order() {
    let clouds = clouds();
    let options = CallOptions::new();
    let alarms = vec![cpu_alarm("cpu-high", 80.0), cpu_alarm("cpu-critical", 95.0)];
    clouds
        .facade
        .create_alarms(Provider::Aws.into(), &credentials(), &alarms, &options)
        .await
        .unwrap();

    let ids = ["cpu-critical", "never-created", "cpu-high"].map(String::from);
    let outcomes = clouds
        .facade
        .delete_alarms(Provider::Aws, &credentials(), &ids, &options)
        .await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1], Err(MonitoringError::NotFound { .. })));
    assert!(outcomes[2].is_ok());
    assert_eq!(clouds.aws.alarm_count(), 0);
}
