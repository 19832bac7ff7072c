// Azure Monitor shapes: metrics list, custom metrics, portal dashboards, metricAlerts, alert schema
use super::time::{from_iso8601_duration, from_rfc3339, to_iso8601_duration, to_rfc3339};
use super::{
    NativeCodec, NormalizationError, SeriesRequest, SeriesWrite, as_object, classify_with,
    extensions_from, f64_field, from_native, merge_extensions, str_field,
};
use crate::application::metric_catalog::MetricCatalog;
use crate::application::provider_adapter::AdapterError;
use crate::domain::alarm::{AlarmState, AlarmStateChange, CanonicalAlarmRule, Comparator};
use crate::domain::dashboard::{CanonicalDashboard, Widget, WidgetType};
use crate::domain::metric_query::{Aggregation, CanonicalMetricQuery, DataPoint};
use crate::domain::provider::Provider;
use crate::infrastructure::sdk::SdkError;
use serde_json::{Map, Value, json};

const CHART_PART: &str = "Extension/HubsExtension/PartType/MonitorChartPart";
const LOGS_PART: &str =
    "Extension/Microsoft_OperationsManagementSuite_Workspace/PartType/LogsDashboardPart";
const TITLE_TAG: &str = "hidden-title";
/// Set on alert rules whose severity was filled in on encode.
const DEFAULT_SEVERITY_TAG: &str = "default-severity";
const SINGLE_RESOURCE_CRITERIA: &str =
    "Microsoft.Azure.Monitor.SingleResourceMultipleMetricCriteria";
const DEFAULT_SEVERITY: i64 = 3;

const PART_HEIGHT: i64 = 4;
const PART_WIDTH: i64 = 12;

const THROTTLING_CODES: &[&str] = &["TooManyRequests", "SubscriptionRequestsThrottled"];
const AUTH_CODES: &[&str] = &[
    "AuthenticationFailed",
    "AuthorizationFailed",
    "InvalidAuthenticationToken",
    "ExpiredAuthenticationToken",
];
const INVALID_CODES: &[&str] = &[
    "BadRequest",
    "InvalidParameter",
    "InvalidRequestContent",
    "InvalidTemplate",
];
const NOT_FOUND_CODES: &[&str] = &["ResourceNotFound", "ResourceGroupNotFound", "NotFound"];
const UNAVAILABLE_CODES: &[&str] =
    &["ServiceUnavailable", "InternalServerError", "GatewayTimeout"];

const QUERY_KEYS: &[&str] = &[
    "resourceUri",
    "metricnames",
    "metricnamespace",
    "timespan",
    "interval",
    "aggregation",
];
const ALERT_PROPERTY_KEYS: &[&str] = &[
    "enabled",
    "scopes",
    "evaluationFrequency",
    "windowSize",
    "criteria",
    "actions",
];
const CRITERION_KEYS: &[&str] = &[
    "name",
    "metricName",
    "metricNamespace",
    "operator",
    "threshold",
    "timeAggregation",
    "criterionType",
];
const ENVELOPE_KEYS: &[&str] = &["id", "name", "type", "location", "tags", "properties"];
const CHART_METRIC_KEYS: &[&str] = &["resourceMetadata", "name", "namespace", "aggregationType"];
const CHART_KEYS: &[&str] = &["metrics", "visualization", "timespan"];

/// REST and alert rule spelling.
fn time_aggregation(aggregation: Aggregation) -> &'static str {
    match aggregation {
        Aggregation::Avg => "Average",
        Aggregation::Sum => "Total",
        Aggregation::Max => "Maximum",
        Aggregation::Min => "Minimum",
        Aggregation::Count => "Count",
    }
}

fn aggregation(value: &str) -> Result<Aggregation, NormalizationError> {
    from_native("aggregation", &Aggregation::ALL, time_aggregation, value)
}

/// Portal chart spelling.
fn aggregation_type(aggregation: Aggregation) -> i64 {
    match aggregation {
        Aggregation::Sum => 1,
        Aggregation::Min => 2,
        Aggregation::Max => 3,
        Aggregation::Avg => 4,
        Aggregation::Count => 7,
    }
}

fn from_aggregation_type(value: i64) -> Result<Aggregation, NormalizationError> {
    from_native("aggregationType", &Aggregation::ALL, aggregation_type, value)
}

fn operator(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Gt => "GreaterThan",
        Comparator::Ge => "GreaterThanOrEqual",
        Comparator::Lt => "LessThan",
        Comparator::Le => "LessThanOrEqual",
    }
}

fn comparator(value: &str) -> Result<Comparator, NormalizationError> {
    from_native("operator", &Comparator::ALL, operator, value)
}

fn timespan(start: i64, end: i64) -> Result<String, NormalizationError> {
    Ok(format!("{}/{}", to_rfc3339(start)?, to_rfc3339(end)?))
}

fn parse_timespan(value: &str) -> Result<(i64, i64), NormalizationError> {
    let (start, end) = value.split_once('/').ok_or_else(|| NormalizationError::Unrecognized {
        field: "timespan",
        value: value.to_string(),
    })?;
    Ok((from_rfc3339(start)?, from_rfc3339(end)?))
}

fn abstract_metric(
    catalog: &MetricCatalog,
    namespace: &str,
    metric: &str,
) -> Result<String, NormalizationError> {
    catalog
        .abstract_name(Provider::Azure, namespace, metric)
        .map(str::to_string)
        .ok_or_else(|| NormalizationError::Unrecognized {
            field: "metric",
            value: format!("{namespace}/{metric}"),
        })
}

/// A portal chart has one time range and one grain for all of its metrics.
fn shared_window(widget: &Widget) -> Result<Option<(i64, i64, u32)>, NormalizationError> {
    let mut queries = widget.queries.iter();
    let Some(first) = queries.next() else {
        return Ok(None);
    };
    let window = (first.start, first.end, first.period_seconds);
    if queries.any(|q| (q.start, q.end, q.period_seconds) != window) {
        return Err(NormalizationError::Unrepresentable(
            "metrics of one Azure chart must share a time range and grain".into(),
        ));
    }
    Ok(Some(window))
}

fn tags_of(envelope: &Map<String, Value>) -> Map<String, Value> {
    envelope.get("tags").and_then(Value::as_object).cloned().unwrap_or_default()
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Azure Monitor codec scoped to one resource group.
#[derive(Debug, Clone)]
pub struct AzureCodec {
    subscription_id: String,
    resource_group: String,
}

impl AzureCodec {
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }

    fn resource_id(&self, resource_type: &str, name: &str) -> String {
        if name.starts_with("/subscriptions/") {
            name.to_string()
        } else {
            format!(
                "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
                self.subscription_id, self.resource_group, resource_type, name
            )
        }
    }

    fn encode_part(
        &self,
        widget: &Widget,
        index: usize,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let position = json!({
            "x": 0,
            "y": PART_HEIGHT * index as i64,
            "colSpan": PART_WIDTH,
            "rowSpan": PART_HEIGHT,
        });

        let metadata = match widget.widget_type {
            WidgetType::LogTable => {
                if !widget.queries.is_empty() {
                    return Err(NormalizationError::Unrepresentable(
                        "an Azure logs part takes a KQL query, not metric queries".into(),
                    ));
                }
                let mut settings = widget.extensions.clone();
                let query = settings.remove("query").unwrap_or_else(|| "".into());
                json!({
                    "type": LOGS_PART,
                    "inputs": [{"name": "Query", "value": query}],
                    "settings": settings,
                })
            }
            WidgetType::TimeSeries | WidgetType::SingleValue => {
                let metrics = widget
                    .queries
                    .iter()
                    .map(|query| {
                        let entry = catalog.resolve(query)?;
                        let mut metric = Map::new();
                        let kind = aggregation_type(query.aggregation);
                        metric.insert("resourceMetadata".into(), json!({"id": query.resource_id}));
                        metric.insert("name".into(), entry.native_id.clone().into());
                        metric.insert("namespace".into(), entry.native_namespace.clone().into());
                        metric.insert("aggregationType".into(), kind.into());
                        merge_extensions(&mut metric, &query.extensions);
                        Ok(Value::Object(metric))
                    })
                    .collect::<Result<Vec<_>, NormalizationError>>()?;

                let chart_type = match widget.widget_type {
                    WidgetType::SingleValue => "Scalar",
                    _ => "Line",
                };
                let mut chart = Map::new();
                chart.insert("metrics".into(), Value::Array(metrics));
                chart.insert("visualization".into(), json!({"chartType": chart_type}));
                if let Some((start, end, period)) = shared_window(widget)? {
                    let absolute =
                        json!({"startTime": to_rfc3339(start)?, "endTime": to_rfc3339(end)?});
                    chart.insert(
                        "timespan".into(),
                        json!({"absolute": absolute, "grain": to_iso8601_duration(period)}),
                    );
                }
                merge_extensions(&mut chart, &widget.extensions);
                let options =
                    json!({"name": "options", "isOptional": true, "value": {"chart": chart}});
                json!({"type": CHART_PART, "inputs": [options]})
            }
        };

        Ok(json!({"position": position, "metadata": metadata}))
    }

    fn decode_part(
        &self,
        part: &Value,
        catalog: &MetricCatalog,
    ) -> Result<Widget, NormalizationError> {
        let metadata = part
            .get("metadata")
            .and_then(Value::as_object)
            .ok_or(NormalizationError::Missing("part metadata"))?;
        let input = |name: &str| {
            metadata
                .get("inputs")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .find(|input| input.get("name").and_then(Value::as_str) == Some(name))
                .and_then(|input| input.get("value"))
        };

        match str_field(metadata, "type")? {
            LOGS_PART => {
                let mut extensions = metadata
                    .get("settings")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                if let Some(query) = input("Query").filter(|q| q.as_str() != Some("")) {
                    extensions.insert("query".into(), query.clone());
                }
                let mut widget = Widget::new(WidgetType::LogTable, Vec::new());
                widget.extensions = extensions;
                Ok(widget)
            }
            CHART_PART => {
                let chart = input("options")
                    .and_then(|options| options.get("chart"))
                    .and_then(Value::as_object)
                    .ok_or(NormalizationError::Missing("chart options"))?;
                let chart_type = chart.get("visualization").and_then(|v| v.get("chartType"));
                let widget_type = match chart_type {
                    Some(Value::String(kind)) if kind == "Scalar" => WidgetType::SingleValue,
                    _ => WidgetType::TimeSeries,
                };

                let period = chart
                    .get("timespan")
                    .and_then(|t| t.get("grain"))
                    .and_then(Value::as_str)
                    .map(from_iso8601_duration)
                    .transpose()?
                    .unwrap_or(300);
                let absolute = chart.get("timespan").and_then(|t| t.get("absolute"));
                let window = match absolute {
                    Some(absolute) => {
                        let absolute = as_object(absolute, "timespan.absolute")?;
                        (
                            from_rfc3339(str_field(absolute, "startTime")?)?,
                            from_rfc3339(str_field(absolute, "endTime")?)?,
                        )
                    }
                    None => (0, i64::from(period)),
                };

                let queries = chart
                    .get("metrics")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .map(|metric| {
                        let metric = as_object(metric, "chart metric")?;
                        let name = abstract_metric(
                            catalog,
                            str_field(metric, "namespace")?,
                            str_field(metric, "name")?,
                        )?;
                        let resource_id = metric
                            .get("resourceMetadata")
                            .and_then(|r| r.get("id"))
                            .and_then(Value::as_str)
                            .ok_or(NormalizationError::Missing("resourceMetadata.id"))?;
                        let kind = metric
                            .get("aggregationType")
                            .and_then(Value::as_i64)
                            .ok_or(NormalizationError::Missing("aggregationType"))?;
                        let mut query = CanonicalMetricQuery::new(
                            Provider::Azure,
                            resource_id,
                            name,
                            from_aggregation_type(kind)?,
                            window.0,
                            window.1,
                            period,
                        );
                        query.extensions = extensions_from(metric, CHART_METRIC_KEYS);
                        Ok(query)
                    })
                    .collect::<Result<Vec<_>, NormalizationError>>()?;

                let mut widget = Widget::new(widget_type, queries);
                widget.extensions = extensions_from(chart, CHART_KEYS);
                Ok(widget)
            }
            other => Err(NormalizationError::Unrecognized {
                field: "part type",
                value: other.to_string(),
            }),
        }
    }
}

impl NativeCodec for AzureCodec {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn dashboard_name(&self, id: &str) -> String {
        self.resource_id("Microsoft.Portal/dashboards", id)
    }

    fn alarm_name(&self, id: &str) -> String {
        self.resource_id("Microsoft.Insights/metricAlerts", id)
    }

    fn encode_dashboard(
        &self,
        dashboard: &CanonicalDashboard,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let parts = dashboard
            .widgets
            .iter()
            .enumerate()
            .map(|(index, widget)| self.encode_part(widget, index, catalog))
            .collect::<Result<Vec<_>, NormalizationError>>()?;

        let mut extensions = dashboard.extensions.clone();
        let mut tags = match extensions.remove("tags") {
            Some(Value::Object(tags)) => tags,
            _ => Map::new(),
        };
        tags.insert(TITLE_TAG.into(), dashboard.title.clone().into());

        let mut native = Map::new();
        native.insert("id".into(), self.dashboard_name(&dashboard.id).into());
        native.insert("name".into(), last_segment(&dashboard.id).into());
        native.insert("type".into(), "Microsoft.Portal/dashboards".into());
        native.insert("location".into(), "global".into());
        native.insert("tags".into(), Value::Object(tags));
        native.insert(
            "properties".into(),
            json!({
                "lenses": [{"order": 0, "parts": parts}],
                "metadata": {"model": {}},
            }),
        );
        merge_extensions(&mut native, &extensions);
        Ok(Value::Object(native))
    }

    fn decode_dashboard(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalDashboard, NormalizationError> {
        let object = as_object(native, "dashboard")?;
        let name = str_field(object, "name")?;
        let lens = native
            .pointer("/properties/lenses/0/parts")
            .ok_or(NormalizationError::Missing("lenses"))?;
        // Older exports key parts by index instead of listing them.
        let mut parts: Vec<&Value> = match lens {
            Value::Array(parts) => parts.iter().collect(),
            Value::Object(parts) => parts.values().collect(),
            _ => return Err(NormalizationError::Missing("parts")),
        };
        let position = |part: &Value, key: &str| {
            part.get("position")
                .and_then(|p| p.get(key))
                .and_then(Value::as_i64)
                .unwrap_or(0)
        };
        parts.sort_by_key(|part| (position(part, "y"), position(part, "x")));

        let widgets = parts
            .into_iter()
            .map(|part| self.decode_part(part, catalog))
            .collect::<Result<Vec<_>, NormalizationError>>()?;

        let mut tags = tags_of(object);
        let title = match tags.remove(TITLE_TAG) {
            Some(Value::String(title)) => title,
            _ => name.to_string(),
        };

        let mut dashboard = CanonicalDashboard::new(name, title, widgets);
        dashboard.extensions = extensions_from(object, ENVELOPE_KEYS);
        if !tags.is_empty() {
            dashboard.extensions.insert("tags".into(), Value::Object(tags));
        }
        Ok(dashboard)
    }

    fn encode_alarm(
        &self,
        alarm: &CanonicalAlarmRule,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.resolve(&alarm.metric)?;
        let period = alarm.metric.period_seconds;
        let actions: Vec<Value> = alarm
            .notify_targets
            .iter()
            .map(|target| json!({"actionGroupId": target}))
            .collect();

        let mut criterion = Map::new();
        criterion.insert("name".into(), "Metric1".into());
        criterion.insert("metricName".into(), entry.native_id.clone().into());
        criterion.insert("metricNamespace".into(), entry.native_namespace.clone().into());
        criterion.insert("operator".into(), operator(alarm.comparator).into());
        criterion.insert("threshold".into(), alarm.threshold.into());
        criterion.insert(
            "timeAggregation".into(),
            time_aggregation(alarm.metric.aggregation).into(),
        );
        criterion.insert("criterionType".into(), "StaticThresholdCriterion".into());
        merge_extensions(&mut criterion, &alarm.metric.extensions);

        let window = period.saturating_mul(alarm.evaluation_periods);
        let mut properties = Map::new();
        properties.insert("enabled".into(), true.into());
        properties.insert("scopes".into(), json!([alarm.metric.resource_id]));
        properties.insert("evaluationFrequency".into(), to_iso8601_duration(period).into());
        properties.insert("windowSize".into(), to_iso8601_duration(window).into());
        properties.insert(
            "criteria".into(),
            json!({"odata.type": SINGLE_RESOURCE_CRITERIA, "allOf": [criterion]}),
        );
        properties.insert("actions".into(), Value::Array(actions));
        merge_extensions(&mut properties, &alarm.extensions);

        // Azure requires a severity; mark the ones filled in here.
        let mut tags = Map::new();
        if !properties.contains_key("severity") {
            properties.insert("severity".into(), DEFAULT_SEVERITY.into());
            tags.insert(DEFAULT_SEVERITY_TAG.into(), "true".into());
        }

        Ok(json!({
            "id": self.alarm_name(&alarm.id),
            "name": last_segment(&alarm.id),
            "type": "Microsoft.Insights/metricAlerts",
            "location": "global",
            "tags": tags,
            "properties": properties,
        }))
    }

    /// Metric alert definitions carry no evaluation state.
    fn decode_alarm(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalAlarmRule, NormalizationError> {
        let object = as_object(native, "metricAlert")?;
        let properties = object
            .get("properties")
            .and_then(Value::as_object)
            .ok_or(NormalizationError::Missing("properties"))?;
        let criterion = native
            .pointer("/properties/criteria/allOf/0")
            .and_then(Value::as_object)
            .ok_or(NormalizationError::Missing("criteria.allOf"))?;

        let metric = abstract_metric(
            catalog,
            str_field(criterion, "metricNamespace")?,
            str_field(criterion, "metricName")?,
        )?;
        let resource_id = properties
            .get("scopes")
            .and_then(Value::as_array)
            .and_then(|scopes| scopes.first())
            .and_then(Value::as_str)
            .ok_or(NormalizationError::Missing("scopes"))?;
        let period = from_iso8601_duration(str_field(properties, "evaluationFrequency")?)?;
        let window = from_iso8601_duration(str_field(properties, "windowSize")?)?;
        let evaluation_periods = (window / period.max(1)).max(1);

        let mut query = CanonicalMetricQuery::relative(
            Provider::Azure,
            resource_id,
            metric,
            aggregation(str_field(criterion, "timeAggregation")?)?,
            period,
            evaluation_periods,
        );
        query.extensions = extensions_from(criterion, CRITERION_KEYS);
        let mut alarm = CanonicalAlarmRule::new(
            str_field(object, "name")?,
            query,
            comparator(str_field(criterion, "operator")?)?,
            f64_field(criterion, "threshold")?,
            evaluation_periods,
        );
        alarm.notify_targets = properties
            .get("actions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|action| action.get("actionGroupId").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        alarm.extensions = extensions_from(properties, ALERT_PROPERTY_KEYS);
        if tags_of(object).contains_key(DEFAULT_SEVERITY_TAG) {
            alarm.extensions.remove("severity");
        }
        Ok(alarm)
    }

    fn encode_query(
        &self,
        query: &CanonicalMetricQuery,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.resolve(query)?;
        let mut native = Map::new();
        native.insert("resourceUri".into(), query.resource_id.clone().into());
        native.insert("metricnames".into(), entry.native_id.clone().into());
        native.insert("metricnamespace".into(), entry.native_namespace.clone().into());
        native.insert("timespan".into(), timespan(query.start, query.end)?.into());
        native.insert("interval".into(), to_iso8601_duration(query.period_seconds).into());
        native.insert("aggregation".into(), time_aggregation(query.aggregation).into());
        merge_extensions(&mut native, &query.extensions);
        Ok(Value::Object(native))
    }

    fn decode_query(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalMetricQuery, NormalizationError> {
        let object = as_object(native, "metrics request")?;
        let metric = abstract_metric(
            catalog,
            str_field(object, "metricnamespace")?,
            str_field(object, "metricnames")?,
        )?;
        let (start, end) = parse_timespan(str_field(object, "timespan")?)?;
        // The REST API accepts a comma list; the first one names the query.
        let aggregations = str_field(object, "aggregation")?;
        let first_aggregation = aggregations.split(',').next().unwrap_or_default().trim();

        let mut query = CanonicalMetricQuery::new(
            Provider::Azure,
            str_field(object, "resourceUri")?,
            metric,
            aggregation(first_aggregation)?,
            start,
            end,
            from_iso8601_duration(str_field(object, "interval")?)?,
        );
        query.extensions = extensions_from(object, QUERY_KEYS);
        Ok(query)
    }

    /// Empty buckets come back as a bare `timeStamp` and are skipped.
    fn decode_series(&self, response: &Value) -> Result<Vec<DataPoint>, NormalizationError> {
        let metrics = response
            .get("value")
            .and_then(Value::as_array)
            .ok_or(NormalizationError::Missing("value"))?;
        let mut points = Vec::new();
        for entry in metrics
            .iter()
            .flat_map(|m| m.get("timeseries").and_then(Value::as_array).into_iter().flatten())
            .flat_map(|s| s.get("data").and_then(Value::as_array).into_iter().flatten())
        {
            let object = as_object(entry, "metric value")?;
            let value = Aggregation::ALL.iter().find_map(|a| {
                let key = time_aggregation(*a).to_ascii_lowercase();
                object.get(&key).and_then(Value::as_f64)
            });
            if let Some(value) = value {
                let timestamp = from_rfc3339(str_field(object, "timeStamp")?)?;
                points.push(DataPoint::new(timestamp, value));
            }
        }
        Ok(points)
    }

    /// Custom metrics take one `time` per body; a single-sample series has
    /// min, max and sum equal to the value.
    fn encode_write(
        &self,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.lookup(Provider::Azure, &series.metric_name)?;
        let metrics = points
            .iter()
            .map(|point| {
                let mut base = Map::new();
                base.insert("metric".into(), entry.native_id.clone().into());
                base.insert("namespace".into(), entry.native_namespace.clone().into());
                let value = point.value;
                let sample = json!({"min": value, "max": value, "sum": value, "count": 1});
                base.insert("series".into(), json!([sample]));
                merge_extensions(&mut base, &series.extensions);
                Ok(json!({
                    "time": to_rfc3339(point.timestamp)?,
                    "data": {"baseData": base},
                }))
            })
            .collect::<Result<Vec<_>, NormalizationError>>()?;
        Ok(json!({"resourceUri": series.resource_id, "metrics": metrics}))
    }

    fn decode_notification(&self, payload: &Value) -> Result<AlarmStateChange, NormalizationError> {
        let essentials = payload
            .pointer("/data/essentials")
            .and_then(Value::as_object)
            .ok_or(NormalizationError::Missing("data.essentials"))?;
        let state = match str_field(essentials, "monitorCondition")? {
            "Fired" => AlarmState::Alarm,
            "Resolved" => AlarmState::Ok,
            other => {
                return Err(NormalizationError::Unrecognized {
                    field: "monitorCondition",
                    value: other.to_string(),
                });
            }
        };
        Ok(AlarmStateChange {
            provider: Provider::Azure,
            alarm_id: str_field(essentials, "alertRule")?.to_string(),
            state,
        })
    }

    fn classify(&self, error: &SdkError) -> AdapterError {
        classify_with(
            error,
            THROTTLING_CODES,
            AUTH_CODES,
            INVALID_CODES,
            NOT_FOUND_CODES,
            UNAVAILABLE_CODES,
        )
    }
}

pub(super) fn series_request(request: &Value) -> Result<SeriesRequest, NormalizationError> {
    let object = as_object(request, "metrics request")?;
    let (start, end) = parse_timespan(str_field(object, "timespan")?)?;
    Ok(SeriesRequest {
        metric: str_field(object, "metricnames")?.to_string(),
        start,
        end,
    })
}

pub(super) fn series_write(body: &Value) -> Result<SeriesWrite, NormalizationError> {
    let metrics = body
        .get("metrics")
        .and_then(Value::as_array)
        .ok_or(NormalizationError::Missing("metrics"))?;
    let metric = metrics
        .first()
        .and_then(|m| m.pointer("/data/baseData/metric"))
        .and_then(Value::as_str)
        .ok_or(NormalizationError::Missing("baseData.metric"))?;
    let points = metrics
        .iter()
        .map(|entry| {
            let time = entry.get("time").and_then(Value::as_str);
            let time = time.ok_or(NormalizationError::Missing("time"))?;
            let sample = entry
                .pointer("/data/baseData/series/0")
                .and_then(Value::as_object)
                .ok_or(NormalizationError::Missing("baseData.series"))?;
            let count = f64_field(sample, "count")?;
            if count <= 0.0 {
                return Err(NormalizationError::Missing("baseData.series.count"));
            }
            Ok(DataPoint::new(from_rfc3339(time)?, f64_field(sample, "sum")? / count))
        })
        .collect::<Result<Vec<_>, NormalizationError>>()?;
    Ok(SeriesWrite {
        metric: metric.to_string(),
        points,
    })
}

pub(super) fn series_response(
    request: &Value,
    points: &[DataPoint],
) -> Result<Value, NormalizationError> {
    let object = as_object(request, "metrics request")?;
    let key = str_field(object, "aggregation")?
        .split(',')
        .next()
        .unwrap_or("Average")
        .trim()
        .to_ascii_lowercase();
    let data = points
        .iter()
        .map(|point| {
            let mut value = Map::new();
            value.insert("timeStamp".into(), to_rfc3339(point.timestamp)?.into());
            value.insert(key.clone(), point.value.into());
            Ok(Value::Object(value))
        })
        .collect::<Result<Vec<_>, NormalizationError>>()?;
    let metric = str_field(object, "metricnames")?;
    let resource = str_field(object, "resourceUri")?;
    Ok(json!({
        "cost": 0,
        "timespan": str_field(object, "timespan")?,
        "interval": object.get("interval"),
        "value": [{
            "id": format!("{resource}/providers/Microsoft.Insights/metrics/{metric}"),
            "type": "Microsoft.Insights/metrics",
            "name": {"value": metric, "localizedValue": metric},
            "timeseries": [{"metadatavalues": [], "data": data}],
        }],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VM: &str = concat!(
        "/subscriptions/sub-1/resourceGroups/rg-prod/providers/",
        "Microsoft.Compute/virtualMachines/web-1"
    );
    const ONCALL: &str = concat!(
        "/subscriptions/sub-1/resourceGroups/rg-prod/providers/",
        "microsoft.insights/actionGroups/oncall"
    );

    fn codec() -> AzureCodec {
        AzureCodec::new("sub-1", "rg-prod")
    }

    fn cpu(start: i64, end: i64) -> CanonicalMetricQuery {
        CanonicalMetricQuery::new(
            Provider::Azure,
            VM,
            "cpu_utilization",
            Aggregation::Avg,
            start,
            end,
            300,
        )
    }

    fn cpu_alert() -> CanonicalAlarmRule {
        let metric = CanonicalMetricQuery::relative(
            Provider::Azure,
            VM,
            "cpu_utilization",
            Aggregation::Max,
            300,
            3,
        );
        CanonicalAlarmRule::new("vm-cpu", metric, Comparator::Gt, 90.0, 3)
    }

    #[test]
    fn test_query_shape() {
        let native = codec().encode_query(&cpu(0, 3600), &MetricCatalog::builtin()).unwrap();
        assert_eq!(native["resourceUri"], VM);
        assert_eq!(native["metricnames"], "Percentage CPU");
        assert_eq!(native["timespan"], "1970-01-01T00:00:00Z/1970-01-01T01:00:00Z");
        assert_eq!(native["interval"], "PT5M");
        assert_eq!(native["aggregation"], "Average");
    }

    #[test]
    fn test_query_round_trip_keeps_filter() {
        let catalog = MetricCatalog::builtin();
        let mut query = cpu(1_700_000_000, 1_700_003_600);
        query.extensions.insert("$filter".into(), "LUN eq '0'".into());
        let native = codec().encode_query(&query, &catalog).unwrap();
        assert_eq!(codec().decode_query(&native, &catalog).unwrap(), query);
    }

    #[test]
    fn test_dashboard_round_trip() {
        let catalog = MetricCatalog::builtin();
        let dashboard = CanonicalDashboard::new(
            "ops",
            "Operations",
            vec![
                Widget::new(WidgetType::TimeSeries, vec![cpu(0, 3600)])
                    .with_extension("title", "VM CPU"),
                Widget::new(WidgetType::SingleValue, vec![cpu(0, 3600)]),
                Widget::new(WidgetType::LogTable, vec![])
                    .with_extension("query", "AzureActivity | take 10"),
            ],
        );

        let native = codec().encode_dashboard(&dashboard, &catalog).unwrap();
        assert_eq!(
            native["id"],
            "/subscriptions/sub-1/resourceGroups/rg-prod/providers/Microsoft.Portal/dashboards/ops"
        );
        assert_eq!(native["tags"][TITLE_TAG], "Operations");
        assert_eq!(native["properties"]["lenses"][0]["parts"][0]["metadata"]["type"], CHART_PART);

        let mut shuffled = native.clone();
        shuffled["properties"]["lenses"][0]["parts"].as_array_mut().unwrap().swap(0, 2);
        assert_eq!(codec().decode_dashboard(&shuffled, &catalog).unwrap(), dashboard);
    }

    #[test]
    fn test_chart_metrics_share_grain() {
        let mut hourly = cpu(0, 3600);
        hourly.period_seconds = 3600;
        let dashboard = CanonicalDashboard::new(
            "ops",
            "Ops",
            vec![Widget::new(WidgetType::TimeSeries, vec![cpu(0, 3600), hourly])],
        );
        assert!(matches!(
            codec().encode_dashboard(&dashboard, &MetricCatalog::builtin()),
            Err(NormalizationError::Unrepresentable(_))
        ));
    }

    #[test]
    fn test_metric_alert_round_trip() {
        let catalog = MetricCatalog::builtin();
        let mut alarm = cpu_alert().notify(ONCALL);
        alarm.extensions.insert("description".into(), "VM CPU above 90%".into());

        let native = codec().encode_alarm(&alarm, &catalog).unwrap();
        let properties = &native["properties"];
        assert_eq!(properties["windowSize"], "PT15M");
        assert_eq!(properties["evaluationFrequency"], "PT5M");
        assert_eq!(properties["criteria"]["allOf"][0]["operator"], "GreaterThan");
        assert_eq!(properties["severity"], 3);
        assert_eq!(codec().decode_alarm(&native, &catalog).unwrap(), alarm);
    }

    #[test]
    fn test_explicit_default_severity_survives_decode() {
        let catalog = MetricCatalog::builtin();
        let mut alarm = cpu_alert();
        alarm.extensions.insert("severity".into(), 3.into());

        let native = codec().encode_alarm(&alarm, &catalog).unwrap();
        assert_eq!(native["properties"]["severity"], 3);
        assert!(native["tags"].get(DEFAULT_SEVERITY_TAG).is_none());
        let decoded = codec().decode_alarm(&native, &catalog).unwrap();
        assert_eq!(decoded.extensions.get("severity"), Some(&Value::from(3)));
        assert_eq!(decoded, alarm);

        // Rules created elsewhere carry no tag, so their severity is kept too.
        let mut foreign = codec().encode_alarm(&cpu_alert(), &catalog).unwrap();
        foreign.as_object_mut().unwrap().remove("tags");
        let decoded = codec().decode_alarm(&foreign, &catalog).unwrap();
        assert_eq!(decoded.extensions.get("severity"), Some(&Value::from(3)));
    }

    #[test]
    fn test_metric_alert_keeps_criterion_extensions() {
        let catalog = MetricCatalog::builtin();
        let mut alarm = cpu_alert();
        alarm.metric.extensions.insert("skipMetricValidation".into(), true.into());
        alarm.metric.extensions.insert(
            "dimensions".into(),
            json!([{"name": "LUN", "operator": "Include", "values": ["0"]}]),
        );

        let native = codec().encode_alarm(&alarm, &catalog).unwrap();
        let criterion = &native["properties"]["criteria"]["allOf"][0];
        assert_eq!(criterion["skipMetricValidation"], true);
        assert_eq!(criterion["dimensions"][0]["name"], "LUN");

        let decoded = codec().decode_alarm(&native, &catalog).unwrap();
        assert_eq!(decoded.metric.extensions, alarm.metric.extensions);
        assert_eq!(decoded, alarm);
    }

    #[test]
    fn test_custom_metric_shape() {
        let catalog = MetricCatalog::builtin();
        let mut series = cpu(0, 600);
        series.extensions.insert("dimNames".into(), json!(["Core"]));
        let points = [DataPoint::new(0, 40.0), DataPoint::new(300, 55.5)];

        let body = codec().encode_write(&series, &points, &catalog).unwrap();
        assert_eq!(body["resourceUri"], VM);
        assert_eq!(body["metrics"][1]["time"], "1970-01-01T00:05:00Z");
        let base = &body["metrics"][1]["data"]["baseData"];
        assert_eq!(base["metric"], "Percentage CPU");
        assert_eq!(base["namespace"], "Microsoft.Compute/virtualMachines");
        assert_eq!(base["series"][0]["sum"], 55.5);
        assert_eq!(base["series"][0]["count"], 1);
        assert_eq!(base["dimNames"], json!(["Core"]));

        let written = series_write(&body).unwrap();
        assert_eq!(written.metric, "Percentage CPU");
        assert_eq!(written.points, points.to_vec());
    }

    #[test]
    fn test_series_skips_empty_buckets() {
        let request = codec().encode_query(&cpu(0, 900), &MetricCatalog::builtin()).unwrap();
        let response = series_response(&request, &[DataPoint::new(0, 12.5)]).unwrap();
        assert_eq!(response["value"][0]["timeseries"][0]["data"][0]["average"], 12.5);

        let sparse = json!({"value": [{"timeseries": [{"data": [
            {"timeStamp": "1970-01-01T00:00:00Z", "average": 1.0},
            {"timeStamp": "1970-01-01T00:05:00Z"}
        ]}]}]});
        assert_eq!(codec().decode_series(&sparse).unwrap(), vec![DataPoint::new(0, 1.0)]);
    }

    #[test]
    fn test_common_alert_schema() {
        let payload = json!({
            "schemaId": "azureMonitorCommonAlertSchema",
            "data": {"essentials": {
                "alertRule": "vm-cpu",
                "monitorCondition": "Fired",
                "severity": "Sev3",
            }}
        });
        let change = codec().decode_notification(&payload).unwrap();
        assert_eq!(change.alarm_id, "vm-cpu");
        assert_eq!(change.state, AlarmState::Alarm);
    }

    #[test]
    fn test_arm_codes() {
        let throttled = SdkError::new("slow").with_code("TooManyRequests").with_status(429);
        assert!(matches!(codec().classify(&throttled), AdapterError::RateLimited(_)));
        let unknown = SdkError::new("gone").with_code("Conflict").with_status(503);
        assert!(matches!(codec().classify(&unknown), AdapterError::Unavailable(_)));
    }
}
