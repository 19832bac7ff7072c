// CloudWatch shapes: GetMetricStatistics, PutMetricData, PutDashboard, PutMetricAlarm and SNS
use super::time::{from_rfc3339, to_rfc3339};
use super::{
    NativeCodec, NormalizationError, SeriesRequest, SeriesWrite, as_object, classify_with,
    extensions_from, f64_field, from_native, merge_extensions, str_field, u32_field,
};
use crate::application::metric_catalog::{CatalogEntry, MetricCatalog};
use crate::application::provider_adapter::AdapterError;
use crate::domain::alarm::{AlarmState, AlarmStateChange, CanonicalAlarmRule, Comparator};
use crate::domain::dashboard::{CanonicalDashboard, Widget, WidgetType};
use crate::domain::metric_query::{Aggregation, CanonicalMetricQuery, DataPoint, Extensions};
use crate::domain::provider::Provider;
use crate::infrastructure::sdk::SdkError;
use serde_json::{Map, Value, json};

/// Dimensions beyond the resource dimension, kept as `[{"Name", "Value"}]`.
pub const ADDITIONAL_DIMENSIONS: &str = "AdditionalDimensions";

/// Metric-level extensions of an alarm, kept apart from the alarm-level ones.
pub const METRIC_OPTIONS: &str = "MetricOptions";

const WIDGET_HEIGHT: i64 = 6;
const DASHBOARD_WIDTH: i64 = 24;

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "LimitExceeded",
];
const AUTH_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "SignatureDoesNotMatch",
];
const INVALID_CODES: &[&str] = &[
    "InvalidParameterValue",
    "InvalidParameterCombination",
    "MissingParameter",
    "ValidationError",
    "InvalidFormat",
    "InvalidParameterInput",
];
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFound",
    "ResourceNotFoundException",
    "DashboardNotFoundError",
];
const UNAVAILABLE_CODES: &[&str] = &[
    "ServiceUnavailable",
    "InternalServiceError",
    "InternalFailure",
];

const QUERY_KEYS: &[&str] = &[
    "Namespace",
    "MetricName",
    "Dimensions",
    "StartTime",
    "EndTime",
    "Period",
    "Statistics",
];
const ALARM_KEYS: &[&str] = &[
    "AlarmName",
    "ComparisonOperator",
    "EvaluationPeriods",
    "MetricName",
    "Namespace",
    "Period",
    "Statistic",
    "Threshold",
    "ActionsEnabled",
    "AlarmActions",
    "Dimensions",
    "StateValue",
    "StateReason",
    "StateReasonData",
    "StateUpdatedTimestamp",
    "AlarmArn",
    "AlarmConfigurationUpdatedTimestamp",
    METRIC_OPTIONS,
];
const WIDGET_PROPERTY_KEYS: &[&str] =
    &["view", "region", "metrics", "start", "end", "period", "stat"];

fn statistic(aggregation: Aggregation) -> &'static str {
    match aggregation {
        Aggregation::Avg => "Average",
        Aggregation::Sum => "Sum",
        Aggregation::Max => "Maximum",
        Aggregation::Min => "Minimum",
        Aggregation::Count => "SampleCount",
    }
}

fn aggregation(value: &str) -> Result<Aggregation, NormalizationError> {
    from_native("statistic", &Aggregation::ALL, statistic, value)
}

fn operator(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Gt => "GreaterThanThreshold",
        Comparator::Ge => "GreaterThanOrEqualToThreshold",
        Comparator::Lt => "LessThanThreshold",
        Comparator::Le => "LessThanOrEqualToThreshold",
    }
}

fn comparator(value: &str) -> Result<Comparator, NormalizationError> {
    from_native("comparison operator", &Comparator::ALL, operator, value)
}

fn state_value(state: AlarmState) -> &'static str {
    match state {
        AlarmState::Ok => "OK",
        AlarmState::Alarm => "ALARM",
        AlarmState::InsufficientData => "INSUFFICIENT_DATA",
    }
}

fn alarm_state(value: &str) -> Result<AlarmState, NormalizationError> {
    from_native("alarm state", &AlarmState::ALL, state_value, value)
}

/// `[{"Name", "Value"}]` for the resource dimension plus any additional ones.
fn dimensions(entry: &CatalogEntry, resource_id: &str, extensions: &Extensions) -> Vec<Value> {
    let mut dims = Vec::new();
    if !entry.resource_label.is_empty() {
        dims.push(json!({"Name": entry.resource_label, "Value": resource_id}));
    }
    if let Some(Value::Array(extra)) = extensions.get(ADDITIONAL_DIMENSIONS) {
        dims.extend(extra.iter().cloned());
    }
    dims
}

/// Resource id and the remaining dimensions.
fn split_dimensions(
    label: &str,
    dims: &[Value],
) -> Result<(String, Vec<Value>), NormalizationError> {
    let mut resource = None;
    let mut extra = Vec::new();
    for dim in dims {
        let name = dim.get("Name").and_then(Value::as_str);
        match (name, dim.get("Value").and_then(Value::as_str)) {
            (Some(name), Some(value)) if name == label && resource.is_none() => {
                resource = Some(value.to_string())
            }
            _ => extra.push(dim.clone()),
        }
    }
    match resource {
        Some(resource) => Ok((resource, extra)),
        None if label.is_empty() => Ok((String::new(), extra)),
        None => Err(NormalizationError::Missing("resource dimension")),
    }
}

/// Query extensions minus the dimension bag, which has its own native slot.
fn passthrough(extensions: &Extensions) -> Extensions {
    let mut extensions = extensions.clone();
    extensions.remove(ADDITIONAL_DIMENSIONS);
    extensions
}

fn with_dimensions(mut extensions: Extensions, extra: Vec<Value>) -> Extensions {
    if !extra.is_empty() {
        extensions.insert(ADDITIONAL_DIMENSIONS.to_string(), Value::Array(extra));
    }
    extensions
}

fn abstract_metric(
    catalog: &MetricCatalog,
    namespace: &str,
    metric: &str,
) -> Result<String, NormalizationError> {
    catalog
        .abstract_name(Provider::Aws, namespace, metric)
        .map(str::to_string)
        .ok_or_else(|| NormalizationError::Unrecognized {
            field: "metric",
            value: format!("{namespace}/{metric}"),
        })
}

/// Window shared by all queries of a widget; CloudWatch stores one per widget.
fn shared_window(widget: &Widget) -> Result<Option<(i64, i64)>, NormalizationError> {
    let mut queries = widget.queries.iter();
    let Some(first) = queries.next() else {
        return Ok(None);
    };
    if queries.any(|q| (q.start, q.end) != (first.start, first.end)) {
        return Err(NormalizationError::Unrepresentable(
            "queries of one CloudWatch widget must share a time window".into(),
        ));
    }
    Ok(Some((first.start, first.end)))
}

/// CloudWatch codec. `region` is written into every dashboard widget.
#[derive(Debug, Clone)]
pub struct AwsCodec {
    region: String,
}

impl AwsCodec {
    pub fn new(region: impl Into<String>) -> Self {
        Self { region: region.into() }
    }

    fn encode_widget(
        &self,
        widget: &Widget,
        index: usize,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let (kind, view) = match widget.widget_type {
            WidgetType::TimeSeries => ("metric", "timeSeries"),
            WidgetType::SingleValue => ("metric", "singleValue"),
            WidgetType::LogTable => ("log", "table"),
        };
        if widget.widget_type == WidgetType::LogTable && !widget.queries.is_empty() {
            return Err(NormalizationError::Unrepresentable(
                "CloudWatch log widgets take a log query, not metric queries".into(),
            ));
        }

        let mut properties = Map::new();
        properties.insert("view".into(), view.into());
        properties.insert("region".into(), self.region.clone().into());
        if let Some((start, end)) = shared_window(widget)? {
            properties.insert("start".into(), to_rfc3339(start)?.into());
            properties.insert("end".into(), to_rfc3339(end)?.into());
        }
        if !widget.queries.is_empty() {
            let metrics = widget
                .queries
                .iter()
                .map(|query| {
                    let entry = catalog.resolve(query)?;
                    let mut line = vec![json!(entry.native_namespace), json!(entry.native_id)];
                    for dim in dimensions(entry, &query.resource_id, &query.extensions) {
                        line.push(dim.get("Name").cloned().unwrap_or(Value::Null));
                        line.push(dim.get("Value").cloned().unwrap_or(Value::Null));
                    }
                    let mut options = Map::new();
                    options.insert("stat".into(), statistic(query.aggregation).into());
                    options.insert("period".into(), query.period_seconds.into());
                    merge_extensions(&mut options, &passthrough(&query.extensions));
                    line.push(Value::Object(options));
                    Ok(Value::Array(line))
                })
                .collect::<Result<Vec<_>, NormalizationError>>()?;
            properties.insert("metrics".into(), Value::Array(metrics));
        }
        merge_extensions(&mut properties, &widget.extensions);

        // Row 0 holds the title text widget.
        let y = 1 + WIDGET_HEIGHT * index as i64;
        Ok(json!({
            "type": kind,
            "x": 0,
            "y": y,
            "width": DASHBOARD_WIDTH,
            "height": WIDGET_HEIGHT,
            "properties": properties,
        }))
    }

    fn decode_widget(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<Widget, NormalizationError> {
        let object = as_object(native, "widget")?;
        let empty = Map::new();
        let properties = object.get("properties").and_then(Value::as_object).unwrap_or(&empty);
        let view = properties.get("view").and_then(Value::as_str);
        let widget_type = match (str_field(object, "type")?, view) {
            ("log", _) => WidgetType::LogTable,
            ("metric", Some("singleValue")) => WidgetType::SingleValue,
            ("metric", _) => WidgetType::TimeSeries,
            (other, _) => {
                return Err(NormalizationError::Unrecognized {
                    field: "widget type",
                    value: other.to_string(),
                });
            }
        };

        let window = match (
            properties.get("start").and_then(Value::as_str),
            properties.get("end").and_then(Value::as_str),
        ) {
            (Some(start), Some(end)) => Some((from_rfc3339(start)?, from_rfc3339(end)?)),
            _ => None,
        };
        let default_stat =
            properties.get("stat").and_then(Value::as_str).unwrap_or("Average");
        let default_period = properties
            .get("period")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok())
            .unwrap_or(300);

        let mut queries = Vec::new();
        let mut previous: Vec<String> = Vec::new();
        let lines = properties.get("metrics").and_then(Value::as_array);
        for line in lines.into_iter().flatten() {
            let items = line.as_array().ok_or(NormalizationError::Missing("metric line"))?;
            let mut names: Vec<String> = Vec::new();
            let mut options = &empty;
            for (position, item) in items.iter().enumerate() {
                match item {
                    // "." repeats the value at the same position on the previous line.
                    Value::String(s) if s == "." => names.push(
                        previous
                            .get(position)
                            .cloned()
                            .ok_or(NormalizationError::Missing("metric line"))?,
                    ),
                    Value::String(s) => names.push(s.clone()),
                    Value::Object(o) => options = o,
                    _ => return Err(NormalizationError::Missing("metric line")),
                }
            }
            if names.len() < 2 || names.len() % 2 != 0 {
                return Err(NormalizationError::Missing("metric line"));
            }
            let metric = abstract_metric(catalog, &names[0], &names[1])?;
            let entry = catalog.lookup(Provider::Aws, &metric)?;
            let dims: Vec<Value> = names[2..]
                .chunks(2)
                .map(|pair| json!({"Name": pair[0], "Value": pair[1]}))
                .collect();
            let (resource_id, extra) = split_dimensions(&entry.resource_label, &dims)?;

            let stat = options.get("stat").and_then(Value::as_str).unwrap_or(default_stat);
            let period = options
                .get("period")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok())
                .unwrap_or(default_period);
            let (start, end) = window.unwrap_or((0, i64::from(period)));

            let mut query = CanonicalMetricQuery::new(
                Provider::Aws,
                resource_id,
                metric,
                aggregation(stat)?,
                start,
                end,
                period,
            );
            let passthrough = extensions_from(options, &["stat", "period"]);
            query.extensions = with_dimensions(passthrough, extra);
            queries.push(query);
            previous = names;
        }

        let mut widget = Widget::new(widget_type, queries);
        widget.extensions = extensions_from(properties, WIDGET_PROPERTY_KEYS);
        Ok(widget)
    }
}

impl NativeCodec for AwsCodec {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    fn dashboard_name(&self, id: &str) -> String {
        id.to_string()
    }

    fn alarm_name(&self, id: &str) -> String {
        id.to_string()
    }

    fn encode_dashboard(
        &self,
        dashboard: &CanonicalDashboard,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let mut widgets = vec![json!({
            "type": "text",
            "x": 0,
            "y": 0,
            "width": DASHBOARD_WIDTH,
            "height": 1,
            "properties": {"markdown": format!("# {}", dashboard.title)},
        })];
        for (index, widget) in dashboard.widgets.iter().enumerate() {
            widgets.push(self.encode_widget(widget, index, catalog)?);
        }

        let mut body = Map::new();
        body.insert("widgets".into(), Value::Array(widgets));
        merge_extensions(&mut body, &dashboard.extensions);

        // PutDashboard takes the body as a JSON string.
        Ok(json!({
            "DashboardName": dashboard.id,
            "DashboardBody": serde_json::to_string(&body)?,
        }))
    }

    fn decode_dashboard(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalDashboard, NormalizationError> {
        let object = as_object(native, "dashboard")?;
        let id = str_field(object, "DashboardName")?;
        let body: Value = serde_json::from_str(str_field(object, "DashboardBody")?)?;
        let body = as_object(&body, "DashboardBody")?;

        let mut natives: Vec<&Value> = body
            .get("widgets")
            .and_then(Value::as_array)
            .ok_or(NormalizationError::Missing("widgets"))?
            .iter()
            .collect();
        let position = |w: &Value, key: &str| w.get(key).and_then(Value::as_i64).unwrap_or(0);
        natives.sort_by_key(|w| (position(w, "y"), position(w, "x")));

        let mut title = None;
        let mut widgets = Vec::new();
        for native in natives {
            let is_text = native.get("type").and_then(Value::as_str) == Some("text");
            if is_text && title.is_none() {
                let markdown = native
                    .pointer("/properties/markdown")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                title = Some(markdown.trim_start_matches('#').trim().to_string());
                continue;
            }
            widgets.push(self.decode_widget(native, catalog)?);
        }

        let title = title.unwrap_or_else(|| id.to_string());
        let mut dashboard = CanonicalDashboard::new(id, title, widgets);
        dashboard.extensions = extensions_from(body, &["widgets"]);
        Ok(dashboard)
    }

    fn encode_alarm(
        &self,
        alarm: &CanonicalAlarmRule,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.resolve(&alarm.metric)?;
        let mut native = Map::new();
        native.insert("AlarmName".into(), alarm.id.clone().into());
        native.insert("ComparisonOperator".into(), operator(alarm.comparator).into());
        native.insert("EvaluationPeriods".into(), alarm.evaluation_periods.into());
        native.insert("MetricName".into(), entry.native_id.clone().into());
        native.insert("Namespace".into(), entry.native_namespace.clone().into());
        native.insert("Period".into(), alarm.metric.period_seconds.into());
        native.insert("Statistic".into(), statistic(alarm.metric.aggregation).into());
        native.insert("Threshold".into(), alarm.threshold.into());
        native.insert("ActionsEnabled".into(), (!alarm.notify_targets.is_empty()).into());
        native.insert("AlarmActions".into(), json!(alarm.notify_targets));
        native.insert(
            "Dimensions".into(),
            Value::Array(dimensions(entry, &alarm.metric.resource_id, &alarm.metric.extensions)),
        );
        let options = passthrough(&alarm.metric.extensions);
        if !options.is_empty() {
            native.insert(METRIC_OPTIONS.into(), Value::Object(options));
        }
        merge_extensions(&mut native, &alarm.extensions);
        Ok(Value::Object(native))
    }

    fn decode_alarm(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalAlarmRule, NormalizationError> {
        let object = as_object(native, "alarm")?;
        let metric = abstract_metric(
            catalog,
            str_field(object, "Namespace")?,
            str_field(object, "MetricName")?,
        )?;
        let entry = catalog.lookup(Provider::Aws, &metric)?;
        let dims = object.get("Dimensions").and_then(Value::as_array).cloned().unwrap_or_default();
        let (resource_id, extra) = split_dimensions(&entry.resource_label, &dims)?;
        let evaluation_periods = u32_field(object, "EvaluationPeriods")?;

        let mut query = CanonicalMetricQuery::relative(
            Provider::Aws,
            resource_id,
            metric,
            aggregation(str_field(object, "Statistic")?)?,
            u32_field(object, "Period")?,
            evaluation_periods,
        );
        let options = object.get(METRIC_OPTIONS).and_then(Value::as_object).cloned();
        query.extensions = with_dimensions(options.unwrap_or_default(), extra);

        let mut alarm = CanonicalAlarmRule::new(
            str_field(object, "AlarmName")?,
            query,
            comparator(str_field(object, "ComparisonOperator")?)?,
            f64_field(object, "Threshold")?,
            evaluation_periods,
        );
        if let Some(state) = object.get("StateValue").and_then(Value::as_str) {
            alarm.state = alarm_state(state)?;
        }
        alarm.notify_targets = object
            .get("AlarmActions")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        alarm.extensions = extensions_from(object, ALARM_KEYS);
        Ok(alarm)
    }

    fn encode_query(
        &self,
        query: &CanonicalMetricQuery,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.resolve(query)?;
        let mut native = Map::new();
        native.insert("Namespace".into(), entry.native_namespace.clone().into());
        native.insert("MetricName".into(), entry.native_id.clone().into());
        native.insert(
            "Dimensions".into(),
            Value::Array(dimensions(entry, &query.resource_id, &query.extensions)),
        );
        native.insert("StartTime".into(), to_rfc3339(query.start)?.into());
        native.insert("EndTime".into(), to_rfc3339(query.end)?.into());
        native.insert("Period".into(), query.period_seconds.into());
        native.insert("Statistics".into(), json!([statistic(query.aggregation)]));
        merge_extensions(&mut native, &passthrough(&query.extensions));
        Ok(Value::Object(native))
    }

    fn decode_query(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalMetricQuery, NormalizationError> {
        let object = as_object(native, "query")?;
        let metric = abstract_metric(
            catalog,
            str_field(object, "Namespace")?,
            str_field(object, "MetricName")?,
        )?;
        let entry = catalog.lookup(Provider::Aws, &metric)?;
        let dims = object.get("Dimensions").and_then(Value::as_array).cloned().unwrap_or_default();
        let (resource_id, extra) = split_dimensions(&entry.resource_label, &dims)?;
        let stat = object
            .get("Statistics")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(Value::as_str)
            .ok_or(NormalizationError::Missing("Statistics"))?;

        let mut query = CanonicalMetricQuery::new(
            Provider::Aws,
            resource_id,
            metric,
            aggregation(stat)?,
            from_rfc3339(str_field(object, "StartTime")?)?,
            from_rfc3339(str_field(object, "EndTime")?)?,
            u32_field(object, "Period")?,
        );
        query.extensions = with_dimensions(extensions_from(object, QUERY_KEYS), extra);
        Ok(query)
    }

    fn decode_series(&self, response: &Value) -> Result<Vec<DataPoint>, NormalizationError> {
        let datapoints = response
            .get("Datapoints")
            .and_then(Value::as_array)
            .ok_or(NormalizationError::Missing("Datapoints"))?;
        datapoints
            .iter()
            .map(|point| {
                let object = as_object(point, "datapoint")?;
                let timestamp = from_rfc3339(str_field(object, "Timestamp")?)?;
                let value = Aggregation::ALL
                    .iter()
                    .find_map(|a| object.get(statistic(*a)).and_then(Value::as_f64))
                    .ok_or(NormalizationError::Missing("datapoint value"))?;
                Ok(DataPoint::new(timestamp, value))
            })
            .collect()
    }

    /// One `MetricData` datum per point; the unit comes from the catalog.
    fn encode_write(
        &self,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.lookup(Provider::Aws, &series.metric_name)?;
        let dims = dimensions(entry, &series.resource_id, &series.extensions);
        let options = passthrough(&series.extensions);
        let data = points
            .iter()
            .map(|point| {
                let mut datum = Map::new();
                datum.insert("MetricName".into(), entry.native_id.clone().into());
                datum.insert("Dimensions".into(), Value::Array(dims.clone()));
                datum.insert("Timestamp".into(), to_rfc3339(point.timestamp)?.into());
                datum.insert("Value".into(), point.value.into());
                if !entry.native_unit.is_empty() {
                    datum.insert("Unit".into(), entry.native_unit.clone().into());
                }
                merge_extensions(&mut datum, &options);
                Ok(Value::Object(datum))
            })
            .collect::<Result<Vec<_>, NormalizationError>>()?;
        Ok(json!({"Namespace": entry.native_namespace, "MetricData": data}))
    }

    /// Accepts the SNS envelope or the bare CloudWatch alarm message.
    fn decode_notification(&self, payload: &Value) -> Result<AlarmStateChange, NormalizationError> {
        let inner;
        let message = match payload.get("Message").and_then(Value::as_str) {
            Some(raw) => {
                inner = serde_json::from_str::<Value>(raw)?;
                &inner
            }
            None => payload,
        };
        let object = as_object(message, "alarm message")?;
        Ok(AlarmStateChange {
            provider: Provider::Aws,
            alarm_id: str_field(object, "AlarmName")?.to_string(),
            state: alarm_state(str_field(object, "NewStateValue")?)?,
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
    let object = as_object(request, "GetMetricStatistics request")?;
    Ok(SeriesRequest {
        metric: str_field(object, "MetricName")?.to_string(),
        start: from_rfc3339(str_field(object, "StartTime")?)?,
        end: from_rfc3339(str_field(object, "EndTime")?)?,
    })
}

pub(super) fn series_response(
    request: &Value,
    points: &[DataPoint],
) -> Result<Value, NormalizationError> {
    let object = as_object(request, "GetMetricStatistics request")?;
    let stat = object
        .get("Statistics")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(Value::as_str)
        .unwrap_or("Average");
    let datapoints = points
        .iter()
        .map(|point| {
            let mut datapoint = Map::new();
            datapoint.insert("Timestamp".into(), to_rfc3339(point.timestamp)?.into());
            datapoint.insert(stat.to_string(), point.value.into());
            datapoint.insert("Unit".into(), "None".into());
            Ok(Value::Object(datapoint))
        })
        .collect::<Result<Vec<_>, NormalizationError>>()?;
    Ok(json!({"Label": str_field(object, "MetricName")?, "Datapoints": datapoints}))
}

pub(super) fn series_write(body: &Value) -> Result<SeriesWrite, NormalizationError> {
    let object = as_object(body, "PutMetricData request")?;
    let data = object
        .get("MetricData")
        .and_then(Value::as_array)
        .ok_or(NormalizationError::Missing("MetricData"))?;
    let first = data.first().ok_or(NormalizationError::Missing("MetricData"))?;
    let metric = str_field(as_object(first, "datum")?, "MetricName")?.to_string();
    let points = data
        .iter()
        .map(|datum| {
            let datum = as_object(datum, "datum")?;
            let timestamp = from_rfc3339(str_field(datum, "Timestamp")?)?;
            Ok(DataPoint::new(timestamp, f64_field(datum, "Value")?))
        })
        .collect::<Result<Vec<_>, NormalizationError>>()?;
    Ok(SeriesWrite { metric, points })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> AwsCodec {
        AwsCodec::new("us-east-1")
    }

    fn cpu(start: i64, end: i64) -> CanonicalMetricQuery {
        CanonicalMetricQuery::new(
            Provider::Aws,
            "i-0abc",
            "cpu_utilization",
            Aggregation::Avg,
            start,
            end,
            300,
        )
    }

    fn cpu_alarm() -> CanonicalAlarmRule {
        let metric = CanonicalMetricQuery::relative(
            Provider::Aws,
            "i-0abc",
            "cpu_utilization",
            Aggregation::Avg,
            300,
            2,
        );
        CanonicalAlarmRule::new("EC2-HighCPU-i-0abc", metric, Comparator::Gt, 80.0, 2)
    }

    #[test]
    fn test_query_shape() {
        let catalog = MetricCatalog::builtin();
        let native = codec().encode_query(&cpu(0, 3600), &catalog).unwrap();
        assert_eq!(native["Namespace"], "AWS/EC2");
        assert_eq!(native["MetricName"], "CPUUtilization");
        assert_eq!(native["Dimensions"][0]["Name"], "InstanceId");
        assert_eq!(native["Dimensions"][0]["Value"], "i-0abc");
        assert_eq!(native["StartTime"], "1970-01-01T00:00:00Z");
        assert_eq!(native["Statistics"][0], "Average");
    }

    #[test]
    fn test_query_round_trip_keeps_extensions() {
        let catalog = MetricCatalog::builtin();
        let mut query = cpu(1_700_000_000, 1_700_003_600);
        query.extensions.insert("Unit".into(), "Percent".into());
        query.extensions.insert(
            ADDITIONAL_DIMENSIONS.into(),
            json!([{"Name": "AutoScalingGroupName", "Value": "web"}]),
        );

        let native = codec().encode_query(&query, &catalog).unwrap();
        assert_eq!(native["Dimensions"].as_array().unwrap().len(), 2);
        assert_eq!(codec().decode_query(&native, &catalog).unwrap(), query);
    }

    #[test]
    fn test_dashboard_body_is_a_string_with_title_widget() {
        let catalog = MetricCatalog::builtin();
        let dashboard = CanonicalDashboard::new(
            "RealTimeMonitoringDashboard",
            "Real-Time Monitoring",
            vec![
                Widget::new(WidgetType::TimeSeries, vec![cpu(0, 3600)])
                    .with_extension("title", "EC2 CPU Utilization"),
            ],
        );
        let native = codec().encode_dashboard(&dashboard, &catalog).unwrap();
        let body: Value = serde_json::from_str(native["DashboardBody"].as_str().unwrap()).unwrap();
        assert_eq!(body["widgets"][0]["properties"]["markdown"], "# Real-Time Monitoring");
        assert_eq!(body["widgets"][1]["properties"]["title"], "EC2 CPU Utilization");
        assert_eq!(body["widgets"][1]["properties"]["region"], "us-east-1");

        assert_eq!(codec().decode_dashboard(&native, &catalog).unwrap(), dashboard);
    }

    #[test]
    fn test_decode_handles_dot_shorthand() {
        let catalog = MetricCatalog::builtin();
        let body = json!({"widgets": [{
            "type": "metric", "x": 0, "y": 6, "width": 12, "height": 6,
            "properties": {
                "metrics": [
                    ["AWS/Lambda", "Invocations", "FunctionName", "checkout", {"stat": "Sum"}],
                    [".", "Errors", ".", ".", {"stat": "Sum", "color": "#d62728"}]
                ],
                "period": 300,
                "title": "Lambda Invocations and Errors"
            }
        }]});
        let native = json!({"DashboardName": "ops", "DashboardBody": body.to_string()});
        let dashboard = codec().decode_dashboard(&native, &catalog).unwrap();

        let queries = &dashboard.widgets[0].queries;
        assert_eq!(queries[0].metric_name, "function_invocations");
        assert_eq!(queries[1].metric_name, "function_errors");
        assert_eq!(queries[1].resource_id, "checkout");
        assert_eq!(queries[1].extensions["color"], "#d62728");
        assert_eq!(dashboard.title, "ops");
    }

    #[test]
    fn test_mixed_windows_in_one_widget_are_rejected() {
        let catalog = MetricCatalog::builtin();
        let dashboard = CanonicalDashboard::new(
            "ops",
            "Ops",
            vec![Widget::new(WidgetType::TimeSeries, vec![cpu(0, 600), cpu(0, 1200)])],
        );
        assert!(matches!(
            codec().encode_dashboard(&dashboard, &catalog),
            Err(NormalizationError::Unrepresentable(_))
        ));
    }

    #[test]
    fn test_alarm_shape_and_state() {
        let catalog = MetricCatalog::builtin();
        let mut alarm = cpu_alarm().notify("arn:aws:sns:us-east-1:123456789012:alerts");
        alarm
            .extensions
            .insert("AlarmDescription".into(), "Alarm when EC2 CPU exceeds 80%".into());

        let mut native = codec().encode_alarm(&alarm, &catalog).unwrap();
        assert_eq!(native["ComparisonOperator"], "GreaterThanThreshold");
        assert_eq!(native["Statistic"], "Average");
        assert_eq!(native["ActionsEnabled"], true);
        assert_eq!(codec().decode_alarm(&native, &catalog).unwrap(), alarm);

        native["StateValue"] = "ALARM".into();
        assert_eq!(codec().decode_alarm(&native, &catalog).unwrap().state, AlarmState::Alarm);
    }

    #[test]
    fn test_alarm_metric_extensions_stay_on_the_metric() {
        let catalog = MetricCatalog::builtin();
        let mut alarm = cpu_alarm();
        alarm.metric.extensions.insert("Unit".into(), "Percent".into());
        alarm.metric.extensions.insert(
            ADDITIONAL_DIMENSIONS.into(),
            json!([{"Name": "AutoScalingGroupName", "Value": "web"}]),
        );
        alarm.extensions.insert("TreatMissingData".into(), "breaching".into());

        let native = codec().encode_alarm(&alarm, &catalog).unwrap();
        assert_eq!(native[METRIC_OPTIONS], json!({"Unit": "Percent"}));
        assert_eq!(native["TreatMissingData"], "breaching");
        assert_eq!(native["Dimensions"].as_array().unwrap().len(), 2);

        let decoded = codec().decode_alarm(&native, &catalog).unwrap();
        assert_eq!(decoded.metric.extensions, alarm.metric.extensions);
        assert_eq!(decoded, alarm);
    }

    #[test]
    fn test_put_metric_data_shape() {
        let catalog = MetricCatalog::builtin();
        let mut series = CanonicalMetricQuery::new(
            Provider::Aws,
            "checkout",
            "active_users",
            Aggregation::Sum,
            0,
            120,
            60,
        );
        series.extensions.insert("StorageResolution".into(), 1.into());
        let points = [DataPoint::new(0, 150.0), DataPoint::new(60, 175.0)];

        let body = codec().encode_write(&series, &points, &catalog).unwrap();
        assert_eq!(body["Namespace"], "CustomApp");
        assert_eq!(body["MetricData"][1]["MetricName"], "ActiveUsers");
        assert_eq!(body["MetricData"][1]["Dimensions"][0]["Name"], "Application");
        assert_eq!(body["MetricData"][1]["Timestamp"], "1970-01-01T00:01:00Z");
        assert_eq!(body["MetricData"][1]["Unit"], "Count");
        assert_eq!(body["MetricData"][1]["StorageResolution"], 1);

        let written = series_write(&body).unwrap();
        assert_eq!(written.metric, "ActiveUsers");
        assert_eq!(written.points, points.to_vec());
    }

    #[test]
    fn test_series_decoding() {
        let request = codec().encode_query(&cpu(0, 900), &MetricCatalog::builtin()).unwrap();
        let points = [DataPoint::new(300, 12.5), DataPoint::new(0, 10.0)];
        let response = series_response(&request, &points).unwrap();
        assert_eq!(response["Datapoints"][0]["Average"], 12.5);
        let points = codec().decode_series(&response).unwrap();
        assert_eq!(points, vec![DataPoint::new(300, 12.5), DataPoint::new(0, 10.0)]);
    }

    #[test]
    fn test_sns_notification() {
        let message = json!({
            "AlarmName": "EC2-HighCPU-i-0abc",
            "NewStateValue": "ALARM",
            "OldStateValue": "OK",
        });
        let envelope = json!({"Type": "Notification", "Message": message.to_string()});
        let change = codec().decode_notification(&envelope).unwrap();
        assert_eq!(change.alarm_id, "EC2-HighCPU-i-0abc");
        assert_eq!(change.state, AlarmState::Alarm);
        assert_eq!(codec().decode_notification(&message).unwrap(), change);
    }

    #[test]
    fn test_error_codes() {
        let throttled = SdkError::new("Rate exceeded").with_code("Throttling").with_status(400);
        assert!(matches!(codec().classify(&throttled), AdapterError::RateLimited(_)));
        let expired = SdkError::new("token expired").with_code("ExpiredToken");
        assert!(matches!(codec().classify(&expired), AdapterError::AuthFailed(_)));
        let missing = SdkError::new("no such dashboard").with_code("ResourceNotFound");
        assert!(matches!(codec().classify(&missing), AdapterError::NotFound(_)));
    }
}
