// Main entry point - wires provider SDKs, adapters and the dispatcher behind the facade
use std::sync::Arc;

use multicloud_monitoring::application::dispatcher::CallOptions;
use multicloud_monitoring::application::monitoring_facade::{MonitoringFacade, Outcome};
use multicloud_monitoring::application::provider_adapter::ProviderAdapter;
use multicloud_monitoring::domain::alarm::{AlarmFilter, CanonicalAlarmRule, Comparator};
use multicloud_monitoring::domain::credential::{CredentialSet, ProviderCredential};
use multicloud_monitoring::domain::dashboard::{CanonicalDashboard, Widget, WidgetType};
use multicloud_monitoring::domain::metric_query::{Aggregation, CanonicalMetricQuery, DataPoint};
use multicloud_monitoring::domain::provider::{Provider, ProviderSelector};
use multicloud_monitoring::infrastructure::cloud_adapter::CloudAdapter;
use multicloud_monitoring::infrastructure::config::{
    build_catalog, build_dispatcher, load_monitoring_config,
};
use multicloud_monitoring::infrastructure::in_memory_sdk::InMemoryMonitoringSdk;
use tracing_subscriber::EnvFilter;

const WINDOW_SECS: i64 = 3_600;
const PERIOD_SECS: u32 = 300;

/// Credential material from the environment. Values are handed to the SDKs only.
fn credentials_from_env() -> CredentialSet {
    let read = |name: &str| {
        std::env::var(name).unwrap_or_else(|_| format!("local-{}", name.to_lowercase()))
    };
    CredentialSet::new()
        .with(Provider::Aws, ProviderCredential::new(read("AWS_ACCESS_KEY_ID")))
        .with(Provider::Gcp, ProviderCredential::new(read("GOOGLE_OAUTH_ACCESS_TOKEN")))
        .with(Provider::Azure, ProviderCredential::new(read("AZURE_ACCESS_TOKEN")))
}

fn cpu_series(scale: f64) -> Vec<DataPoint> {
    (0..WINDOW_SECS / i64::from(PERIOD_SECS))
        .map(|i| {
            let value = scale * (40.0 + (i % 4) as f64 * 5.0);
            DataPoint::new(i * i64::from(PERIOD_SECS), value)
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = load_monitoring_config()?;
    let catalog = Arc::new(build_catalog(&config)?);
    tracing::info!(entries = catalog.len(), "metric catalog ready");

    // Provider SDKs (infrastructure layer)
    let aws_sdk = Arc::new(InMemoryMonitoringSdk::new(Provider::Aws));
    let gcp_sdk = Arc::new(InMemoryMonitoringSdk::new(Provider::Gcp));
    let azure_sdk = Arc::new(InMemoryMonitoringSdk::new(Provider::Azure));
    aws_sdk.seed_points("CPUUtilization", cpu_series(1.0));
    gcp_sdk.seed_points("compute.googleapis.com/instance/cpu/utilization", cpu_series(0.01));
    azure_sdk.seed_points("Percentage CPU", cpu_series(1.2));

    let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
        Arc::new(CloudAdapter::aws(aws_sdk, config.aws.clone(), catalog.clone())),
        Arc::new(CloudAdapter::gcp(gcp_sdk, config.gcp.clone(), catalog.clone())),
        Arc::new(CloudAdapter::azure(azure_sdk, config.azure.clone(), catalog.clone())),
    ];

    // Dispatcher and facade (application layer)
    let dispatcher = build_dispatcher(&config.dispatcher, adapters, catalog);
    let facade = MonitoringFacade::new(dispatcher);
    let credentials = credentials_from_env();
    let options = CallOptions::new();

    let cpu = CanonicalMetricQuery::new(
        Provider::Aws,
        "i-0123456789abcdef0",
        "cpu_utilization",
        Aggregation::Avg,
        0,
        WINDOW_SECS,
        PERIOD_SECS,
    );

    let dashboard = CanonicalDashboard::new(
        "realtime-monitoring",
        "Real-Time Monitoring",
        vec![
            Widget::new(WidgetType::TimeSeries, vec![cpu.clone()])
                .with_extension("title", "CPU utilization"),
            Widget::new(WidgetType::SingleValue, vec![cpu.clone()])
                .with_extension("title", "Current CPU"),
        ],
    );
    let keyed = options.clone().with_idempotency_key("dashboard-v1");
    if let Outcome::FanOut(result) = facade
        .create_dashboard(ProviderSelector::All, &credentials, &dashboard, &keyed)
        .await?
    {
        for (provider, handle) in &result.successes {
            tracing::info!(%provider, id = %handle.id, "dashboard created");
        }
        for failure in &result.failures {
            tracing::warn!(
                provider = %failure.provider,
                error = %failure.error,
                "dashboard not created"
            );
        }
    }

    let cpu_over = |aggregation: Aggregation, periods: u32| {
        CanonicalMetricQuery::relative(
            Provider::Aws,
            "i-0123456789abcdef0",
            "cpu_utilization",
            aggregation,
            PERIOD_SECS,
            periods,
        )
    };
    let alarms = vec![
        CanonicalAlarmRule::new("cpu-high", cpu_over(Aggregation::Avg, 2), Comparator::Gt, 80.0, 2)
            .notify("arn:aws:sns:us-east-1:123456789012:ops"),
        CanonicalAlarmRule::new("cpu-idle", cpu_over(Aggregation::Min, 6), Comparator::Lt, 5.0, 6),
    ];
    let batch = facade
        .create_alarms(
            Provider::Aws.into(),
            &credentials,
            &alarms,
            &options.clone().with_idempotency_key("alarms-v1"),
        )
        .await?;
    if let Some(outcomes) = batch.single() {
        let created = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
        tracing::info!(created, requested = alarms.len(), "alarm batch finished");
    }

    if let Some(listed) = facade
        .list_alarms(Provider::Aws.into(), &credentials, AlarmFilter::default(), &options)
        .await?
        .single()
    {
        for alarm in &listed {
            tracing::info!(
                alarm = %alarm.id,
                state = ?alarm.state,
                threshold = alarm.threshold,
                "alarm"
            );
        }
    }

    let users = CanonicalMetricQuery::new(
        Provider::Aws,
        "storefront",
        "active_users",
        Aggregation::Sum,
        0,
        WINDOW_SECS,
        PERIOD_SECS,
    );
    facade
        .write_metric(Provider::Aws.into(), &credentials, &users, &cpu_series(3.0), &options)
        .await?;
    if let Some(points) = facade
        .query_metric(Provider::Aws.into(), &credentials, &users, &options)
        .await?
        .single()
    {
        let total: f64 = points.iter().map(|p| p.value).sum();
        tracing::info!(points = points.len(), total, "active_users");
    }

    if let Outcome::FanOut(result) = facade
        .query_metric(ProviderSelector::All, &credentials, &cpu, &options)
        .await?
    {
        for (provider, points) in &result.successes {
            let peak = points.iter().map(|p| p.value).fold(f64::MIN, f64::max);
            tracing::info!(%provider, points = points.len(), peak, "cpu_utilization");
        }
        for failure in &result.failures {
            tracing::warn!(provider = %failure.provider, error = %failure.error, "query failed");
        }
    }

    let ids: Vec<String> = alarms.iter().map(|alarm| alarm.id.clone()).collect();
    let deleted = facade
        .delete_alarms(Provider::Aws, &credentials, &ids, &options)
        .await
        .into_iter()
        .filter(Result::is_ok)
        .count();
    tracing::info!(deleted, requested = ids.len(), "alarm cleanup finished");

    Ok(())
}
