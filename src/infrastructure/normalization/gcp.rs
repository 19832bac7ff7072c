// Cloud Monitoring shapes: timeSeries list and create, mosaic dashboards, alert policies, incidents
use super::time::{from_rfc3339, from_seconds_duration, to_rfc3339, to_seconds_duration};
use super::{
    NativeCodec, NormalizationError, SeriesRequest, SeriesWrite, as_object, classify_with,
    extensions_from, f64_field, from_native, merge_extensions, str_field,
};
use crate::application::metric_catalog::{CatalogEntry, MetricCatalog};
use crate::application::provider_adapter::AdapterError;
use crate::domain::alarm::{AlarmState, AlarmStateChange, CanonicalAlarmRule, Comparator};
use crate::domain::dashboard::{CanonicalDashboard, Widget, WidgetType};
use crate::domain::metric_query::{Aggregation, CanonicalMetricQuery, DataPoint, Extensions};
use crate::domain::provider::Provider;
use crate::infrastructure::sdk::SdkError;
use serde_json::{Map, Value, json};

/// Filter terms beyond metric, resource type and resource label.
pub const ADDITIONAL_FILTER: &str = "additionalFilter";

const TILE_HEIGHT: i64 = 4;
const COLUMNS: i64 = 12;

const THROTTLING_CODES: &[&str] = &["RESOURCE_EXHAUSTED"];
const AUTH_CODES: &[&str] = &["UNAUTHENTICATED", "PERMISSION_DENIED"];
const INVALID_CODES: &[&str] = &["INVALID_ARGUMENT", "FAILED_PRECONDITION", "OUT_OF_RANGE"];
const NOT_FOUND_CODES: &[&str] = &["NOT_FOUND"];
const UNAVAILABLE_CODES: &[&str] = &["UNAVAILABLE", "INTERNAL", "DEADLINE_EXCEEDED"];

const QUERY_KEYS: &[&str] = &["name", "filter", "interval", "aggregation"];
const POLICY_KEYS: &[&str] = &[
    "name",
    "displayName",
    "combiner",
    "enabled",
    "conditions",
    "notificationChannels",
];
const THRESHOLD_KEYS: &[&str] =
    &["filter", "comparison", "thresholdValue", "duration", "aggregations"];
const WIDGET_KINDS: &[&str] = &["xyChart", "scorecard", "logsPanel"];

fn aligner(aggregation: Aggregation) -> &'static str {
    match aggregation {
        Aggregation::Avg => "ALIGN_MEAN",
        Aggregation::Sum => "ALIGN_SUM",
        Aggregation::Max => "ALIGN_MAX",
        Aggregation::Min => "ALIGN_MIN",
        Aggregation::Count => "ALIGN_COUNT",
    }
}

fn aggregation(value: &str) -> Result<Aggregation, NormalizationError> {
    from_native("aligner", &Aggregation::ALL, aligner, value)
}

fn comparison(comparator: Comparator) -> &'static str {
    match comparator {
        Comparator::Gt => "COMPARISON_GT",
        Comparator::Ge => "COMPARISON_GE",
        Comparator::Lt => "COMPARISON_LT",
        Comparator::Le => "COMPARISON_LE",
    }
}

fn comparator(value: &str) -> Result<Comparator, NormalizationError> {
    from_native("comparison", &Comparator::ALL, comparison, value)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `metric.type="…" resource.type="…" resource.labels.<label>="…"`
pub fn build_filter(entry: &CatalogEntry, resource_id: &str, extensions: &Extensions) -> String {
    let mut filter = format!(
        "metric.type={} resource.type={}",
        quote(&entry.native_id),
        quote(&entry.native_namespace)
    );
    if !entry.resource_label.is_empty() {
        let label = format!(" resource.labels.{}={}", entry.resource_label, quote(resource_id));
        filter.push_str(&label);
    }
    if let Some(extra) = extensions.get(ADDITIONAL_FILTER).and_then(Value::as_str) {
        filter.push(' ');
        filter.push_str(extra);
    }
    filter
}

/// `key="value"` terms of a monitoring filter, in order. Bare words such as `AND`
/// are skipped.
pub fn parse_filter(filter: &str) -> Result<Vec<(String, String)>, NormalizationError> {
    let malformed = || NormalizationError::Unrecognized {
        field: "filter",
        value: filter.to_string(),
    };
    let mut terms = Vec::new();
    let mut chars = filter.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }
        if chars.next_if_eq(&'"').is_none() {
            return Err(malformed());
        }
        let mut value = String::new();
        loop {
            match chars.next() {
                Some('\\') => value.push(chars.next().ok_or_else(malformed)?),
                Some('"') => break,
                Some(c) => value.push(c),
                None => return Err(malformed()),
            }
        }
        terms.push((key, value));
    }
    Ok(terms)
}

/// Catalog entry, resource id and leftover filter terms of a filter.
fn resolve_filter(
    filter: &str,
    catalog: &MetricCatalog,
) -> Result<(String, String, Extensions), NormalizationError> {
    let terms = parse_filter(filter)?;
    let find = |key: &str| terms.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());
    let metric_type = find("metric.type").ok_or(NormalizationError::Missing("metric.type"))?;
    let resource_type =
        find("resource.type").ok_or(NormalizationError::Missing("resource.type"))?;
    let metric = catalog
        .abstract_name(Provider::Gcp, resource_type, metric_type)
        .ok_or_else(|| NormalizationError::Unrecognized {
            field: "metric",
            value: metric_type.to_string(),
        })?
        .to_string();
    let entry = catalog.lookup(Provider::Gcp, &metric)?;

    let label_key = format!("resource.labels.{}", entry.resource_label);
    let resource_id = if entry.resource_label.is_empty() {
        String::new()
    } else {
        find(&label_key).ok_or(NormalizationError::Missing("resource label"))?.to_string()
    };

    let leftover: Vec<String> = terms
        .iter()
        .filter(|(key, _)| key != "metric.type" && key != "resource.type" && *key != label_key)
        .map(|(key, value)| format!("{key}={}", quote(value)))
        .collect();
    let mut extensions = Extensions::new();
    if !leftover.is_empty() {
        extensions.insert(ADDITIONAL_FILTER.to_string(), leftover.join(" ").into());
    }
    Ok((metric, resource_id, extensions))
}

fn passthrough(extensions: &Extensions) -> Extensions {
    let mut extensions = extensions.clone();
    extensions.remove(ADDITIONAL_FILTER);
    extensions
}

/// Dashboard charts follow the dashboard's time picker, so a query can only
/// carry its period: the window must be `(0, period)`.
fn time_series_filter(
    query: &CanonicalMetricQuery,
    catalog: &MetricCatalog,
) -> Result<Value, NormalizationError> {
    if (query.start, query.end) != (0, i64::from(query.period_seconds)) {
        return Err(NormalizationError::Unrepresentable(format!(
            "Cloud Monitoring charts have no time window of their own, got ({}, {})",
            query.start, query.end
        )));
    }
    let entry = catalog.resolve(query)?;
    Ok(json!({
        "timeSeriesFilter": {
            "filter": build_filter(entry, &query.resource_id, &query.extensions),
            "aggregation": {
                "alignmentPeriod": to_seconds_duration(query.period_seconds),
                "perSeriesAligner": aligner(query.aggregation),
            }
        }
    }))
}

/// Query from a dashboard `timeSeriesQuery`. Dashboards have no window of their
/// own, so the query covers one period.
fn decode_time_series_query(
    native: &Value,
    own: &Map<String, Value>,
    own_keys: &[&str],
    catalog: &MetricCatalog,
) -> Result<CanonicalMetricQuery, NormalizationError> {
    let filter = native
        .pointer("/timeSeriesFilter/filter")
        .and_then(Value::as_str)
        .ok_or(NormalizationError::Missing("timeSeriesFilter"))?;
    let (metric, resource_id, mut extensions) = resolve_filter(filter, catalog)?;
    let period = native
        .pointer("/timeSeriesFilter/aggregation/alignmentPeriod")
        .and_then(Value::as_str)
        .map(from_seconds_duration)
        .transpose()?
        .unwrap_or(60);
    let aligner = native
        .pointer("/timeSeriesFilter/aggregation/perSeriesAligner")
        .and_then(Value::as_str)
        .unwrap_or("ALIGN_MEAN");

    let mut query = CanonicalMetricQuery::relative(
        Provider::Gcp,
        resource_id,
        metric,
        aggregation(aligner)?,
        period,
        1,
    );
    extensions.extend(extensions_from(own, own_keys));
    query.extensions = extensions;
    Ok(query)
}

/// Points of every series in a `timeSeries` body, stamped with their interval
/// end. int64 values arrive as strings.
fn series_points(body: &Value) -> Result<Vec<DataPoint>, NormalizationError> {
    let mut points = Vec::new();
    let series = body.get("timeSeries").and_then(Value::as_array);
    for point in series
        .into_iter()
        .flatten()
        .flat_map(|s| s.get("points").and_then(Value::as_array).into_iter().flatten())
    {
        let end = point
            .pointer("/interval/endTime")
            .and_then(Value::as_str)
            .ok_or(NormalizationError::Missing("interval.endTime"))?;
        let value = point.get("value").ok_or(NormalizationError::Missing("value"))?;
        let number = value
            .get("doubleValue")
            .and_then(Value::as_f64)
            .or_else(|| match value.get("int64Value") {
                Some(Value::String(s)) => s.parse::<i64>().ok().map(|n| n as f64),
                Some(other) => other.as_f64(),
                None => None,
            })
            .ok_or(NormalizationError::Missing("doubleValue"))?;
        points.push(DataPoint::new(from_rfc3339(end)?, number));
    }
    Ok(points)
}

/// Metric and resource labels for a write; other filter terms cannot be written.
fn write_labels(
    entry: &CatalogEntry,
    resource_id: &str,
    extensions: &Extensions,
) -> Result<(Map<String, Value>, Map<String, Value>), NormalizationError> {
    let mut metric_labels = Map::new();
    let mut resource_labels = Map::new();
    if !entry.resource_label.is_empty() {
        resource_labels.insert(entry.resource_label.clone(), resource_id.into());
    }
    let extra = extensions.get(ADDITIONAL_FILTER).and_then(Value::as_str).unwrap_or_default();
    for (key, value) in parse_filter(extra)? {
        if let Some(label) = key.strip_prefix("metric.labels.") {
            metric_labels.insert(label.to_string(), value.into());
        } else if let Some(label) = key.strip_prefix("resource.labels.") {
            resource_labels.insert(label.to_string(), value.into());
        } else {
            return Err(NormalizationError::Unrepresentable(format!(
                "filter term {key} does not name a label to write"
            )));
        }
    }
    Ok((metric_labels, resource_labels))
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Cloud Monitoring codec for one project.
#[derive(Debug, Clone)]
pub struct GcpCodec {
    project_id: String,
}

impl GcpCodec {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }

    fn resource_name(&self, collection: &str, id: &str) -> String {
        if id.starts_with("projects/") {
            id.to_string()
        } else {
            format!("projects/{}/{}/{}", self.project_id, collection, id)
        }
    }

    fn encode_widget(
        &self,
        widget: &Widget,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let mut extensions = widget.extensions.clone();
        let mut native = Map::new();
        match widget.widget_type {
            WidgetType::TimeSeries => {
                let data_sets = widget
                    .queries
                    .iter()
                    .map(|query| {
                        let mut data_set = Map::new();
                        let filter = time_series_filter(query, catalog)?;
                        data_set.insert("timeSeriesQuery".into(), filter);
                        merge_extensions(&mut data_set, &passthrough(&query.extensions));
                        data_set.entry("plotType").or_insert_with(|| "LINE".into());
                        data_set.entry("targetAxis").or_insert_with(|| "Y1".into());
                        Ok(Value::Object(data_set))
                    })
                    .collect::<Result<Vec<_>, NormalizationError>>()?;
                native.insert("xyChart".into(), json!({"dataSets": data_sets}));
            }
            WidgetType::SingleValue => {
                let [query] = widget.queries.as_slice() else {
                    return Err(NormalizationError::Unrepresentable(
                        "a Cloud Monitoring scorecard shows exactly one query".into(),
                    ));
                };
                let mut scorecard = Map::new();
                scorecard.insert("timeSeriesQuery".into(), time_series_filter(query, catalog)?);
                merge_extensions(&mut scorecard, &passthrough(&query.extensions));
                native.insert("scorecard".into(), Value::Object(scorecard));
            }
            WidgetType::LogTable => {
                if !widget.queries.is_empty() {
                    return Err(NormalizationError::Unrepresentable(
                        "a Cloud Monitoring logs panel takes a log filter, not metric queries"
                            .into(),
                    ));
                }
                let filter = extensions.remove("query").unwrap_or_else(|| "".into());
                let panel = json!({"filter": filter, "resourceNames": []});
                native.insert("logsPanel".into(), panel);
            }
        }
        merge_extensions(&mut native, &extensions);
        Ok(Value::Object(native))
    }

    fn decode_widget(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<Widget, NormalizationError> {
        let object = as_object(native, "widget")?;
        let mut extensions = extensions_from(object, WIDGET_KINDS);

        let widget = if let Some(chart) = object.get("xyChart") {
            let queries = chart
                .get("dataSets")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .map(|data_set| {
                    let own = as_object(data_set, "dataSet")?;
                    let query = own
                        .get("timeSeriesQuery")
                        .ok_or(NormalizationError::Missing("timeSeriesQuery"))?;
                    let mut query =
                        decode_time_series_query(query, own, &["timeSeriesQuery"], catalog)?;
                    // Defaults written on encode.
                    if query.extensions.get("plotType") == Some(&Value::from("LINE")) {
                        query.extensions.remove("plotType");
                    }
                    if query.extensions.get("targetAxis") == Some(&Value::from("Y1")) {
                        query.extensions.remove("targetAxis");
                    }
                    Ok(query)
                })
                .collect::<Result<Vec<_>, NormalizationError>>()?;
            Widget::new(WidgetType::TimeSeries, queries)
        } else if let Some(scorecard) = object.get("scorecard") {
            let own = as_object(scorecard, "scorecard")?;
            let query = own
                .get("timeSeriesQuery")
                .ok_or(NormalizationError::Missing("timeSeriesQuery"))?;
            let query = decode_time_series_query(query, own, &["timeSeriesQuery"], catalog)?;
            Widget::new(WidgetType::SingleValue, vec![query])
        } else if let Some(panel) = object.get("logsPanel") {
            let filter = panel.get("filter").and_then(Value::as_str);
            if let Some(filter) = filter.filter(|f| !f.is_empty()) {
                extensions.insert("query".into(), filter.into());
            }
            Widget::new(WidgetType::LogTable, Vec::new())
        } else {
            return Err(NormalizationError::Unrecognized {
                field: "widget",
                value: object.keys().cloned().collect::<Vec<_>>().join(","),
            });
        };

        Ok(Widget { extensions, ..widget })
    }
}

impl NativeCodec for GcpCodec {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    fn dashboard_name(&self, id: &str) -> String {
        self.resource_name("dashboards", id)
    }

    fn alarm_name(&self, id: &str) -> String {
        self.resource_name("alertPolicies", id)
    }

    fn encode_dashboard(
        &self,
        dashboard: &CanonicalDashboard,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let tiles = dashboard
            .widgets
            .iter()
            .enumerate()
            .map(|(index, widget)| {
                Ok(json!({
                    "xPos": 0,
                    "yPos": TILE_HEIGHT * index as i64,
                    "width": COLUMNS,
                    "height": TILE_HEIGHT,
                    "widget": self.encode_widget(widget, catalog)?,
                }))
            })
            .collect::<Result<Vec<_>, NormalizationError>>()?;

        let mut native = Map::new();
        native.insert("name".into(), self.dashboard_name(&dashboard.id).into());
        native.insert("displayName".into(), dashboard.title.clone().into());
        native.insert("mosaicLayout".into(), json!({"columns": COLUMNS, "tiles": tiles}));
        merge_extensions(&mut native, &dashboard.extensions);
        Ok(Value::Object(native))
    }

    fn decode_dashboard(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalDashboard, NormalizationError> {
        let object = as_object(native, "dashboard")?;
        let name = str_field(object, "name")?;
        let mut tiles: Vec<&Value> = native
            .pointer("/mosaicLayout/tiles")
            .and_then(Value::as_array)
            .ok_or(NormalizationError::Missing("mosaicLayout.tiles"))?
            .iter()
            .collect();
        // Zero positions are omitted from the JSON form.
        let position =
            |tile: &Value, key: &str| tile.get(key).and_then(Value::as_i64).unwrap_or(0);
        tiles.sort_by_key(|tile| (position(tile, "yPos"), position(tile, "xPos")));

        let widgets = tiles
            .into_iter()
            .map(|tile| {
                let widget = tile.get("widget").ok_or(NormalizationError::Missing("widget"))?;
                self.decode_widget(widget, catalog)
            })
            .collect::<Result<Vec<_>, NormalizationError>>()?;

        let title = object.get("displayName").and_then(Value::as_str).unwrap_or(name);
        let mut dashboard = CanonicalDashboard::new(last_segment(name), title, widgets);
        dashboard.extensions = extensions_from(object, &["name", "displayName", "mosaicLayout"]);
        Ok(dashboard)
    }

    fn encode_alarm(
        &self,
        alarm: &CanonicalAlarmRule,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.resolve(&alarm.metric)?;
        let period = alarm.metric.period_seconds;
        let duration = period.saturating_mul(alarm.evaluation_periods);
        let mut threshold = Map::new();
        threshold.insert(
            "filter".into(),
            build_filter(entry, &alarm.metric.resource_id, &alarm.metric.extensions).into(),
        );
        threshold.insert("comparison".into(), comparison(alarm.comparator).into());
        threshold.insert("thresholdValue".into(), alarm.threshold.into());
        threshold.insert("duration".into(), to_seconds_duration(duration).into());
        threshold.insert(
            "aggregations".into(),
            json!([{
                "alignmentPeriod": to_seconds_duration(period),
                "perSeriesAligner": aligner(alarm.metric.aggregation),
            }]),
        );
        merge_extensions(&mut threshold, &passthrough(&alarm.metric.extensions));
        let condition = json!({
            "displayName": format!("{} threshold", alarm.id),
            "conditionThreshold": threshold,
        });

        let mut native = Map::new();
        native.insert("name".into(), self.alarm_name(&alarm.id).into());
        native.insert("displayName".into(), alarm.id.clone().into());
        native.insert("combiner".into(), "OR".into());
        native.insert("enabled".into(), true.into());
        native.insert("conditions".into(), json!([condition]));
        native.insert("notificationChannels".into(), json!(alarm.notify_targets));
        merge_extensions(&mut native, &alarm.extensions);
        Ok(Value::Object(native))
    }

    /// Alert policies carry no evaluation state; it arrives through incidents.
    fn decode_alarm(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalAlarmRule, NormalizationError> {
        let object = as_object(native, "alertPolicy")?;
        let threshold = native
            .pointer("/conditions/0/conditionThreshold")
            .and_then(Value::as_object)
            .ok_or(NormalizationError::Missing("conditionThreshold"))?;
        let (metric, resource_id, mut extensions) =
            resolve_filter(str_field(threshold, "filter")?, catalog)?;
        extensions.extend(extensions_from(threshold, THRESHOLD_KEYS));

        let aggregation_block = native
            .pointer("/conditions/0/conditionThreshold/aggregations/0")
            .ok_or(NormalizationError::Missing("aggregations"))?;
        let period = aggregation_block
            .get("alignmentPeriod")
            .and_then(Value::as_str)
            .map(from_seconds_duration)
            .transpose()?
            .ok_or(NormalizationError::Missing("alignmentPeriod"))?;
        let aligner = aggregation_block
            .get("perSeriesAligner")
            .and_then(Value::as_str)
            .ok_or(NormalizationError::Missing("perSeriesAligner"))?;
        let duration = threshold
            .get("duration")
            .and_then(Value::as_str)
            .map(from_seconds_duration)
            .transpose()?
            .unwrap_or(period);
        let evaluation_periods = (duration / period.max(1)).max(1);

        let mut query = CanonicalMetricQuery::relative(
            Provider::Gcp,
            resource_id,
            metric,
            aggregation(aligner)?,
            period,
            evaluation_periods,
        );
        query.extensions = extensions;

        let mut alarm = CanonicalAlarmRule::new(
            last_segment(str_field(object, "name")?),
            query,
            comparator(str_field(threshold, "comparison")?)?,
            f64_field(threshold, "thresholdValue")?,
            evaluation_periods,
        );
        alarm.notify_targets = object
            .get("notificationChannels")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        alarm.extensions = extensions_from(object, POLICY_KEYS);
        Ok(alarm)
    }

    fn encode_query(
        &self,
        query: &CanonicalMetricQuery,
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.resolve(query)?;
        let mut native = Map::new();
        native.insert("name".into(), format!("projects/{}", self.project_id).into());
        native.insert(
            "filter".into(),
            build_filter(entry, &query.resource_id, &query.extensions).into(),
        );
        native.insert(
            "interval".into(),
            json!({"startTime": to_rfc3339(query.start)?, "endTime": to_rfc3339(query.end)?}),
        );
        native.insert(
            "aggregation".into(),
            json!({
                "alignmentPeriod": to_seconds_duration(query.period_seconds),
                "perSeriesAligner": aligner(query.aggregation),
            }),
        );
        merge_extensions(&mut native, &passthrough(&query.extensions));
        Ok(Value::Object(native))
    }

    fn decode_query(
        &self,
        native: &Value,
        catalog: &MetricCatalog,
    ) -> Result<CanonicalMetricQuery, NormalizationError> {
        let object = as_object(native, "timeSeries.list request")?;
        let (metric, resource_id, mut extensions) =
            resolve_filter(str_field(object, "filter")?, catalog)?;
        let time = |pointer: &str, what: &'static str| {
            native
                .pointer(pointer)
                .and_then(Value::as_str)
                .ok_or(NormalizationError::Missing(what))
                .and_then(from_rfc3339)
        };
        let period = native
            .pointer("/aggregation/alignmentPeriod")
            .and_then(Value::as_str)
            .ok_or(NormalizationError::Missing("alignmentPeriod"))?;
        let aligner = native
            .pointer("/aggregation/perSeriesAligner")
            .and_then(Value::as_str)
            .ok_or(NormalizationError::Missing("perSeriesAligner"))?;

        let mut query = CanonicalMetricQuery::new(
            Provider::Gcp,
            resource_id,
            metric,
            aggregation(aligner)?,
            time("/interval/startTime", "interval.startTime")?,
            time("/interval/endTime", "interval.endTime")?,
            from_seconds_duration(period)?,
        );
        extensions.extend(extensions_from(object, QUERY_KEYS));
        query.extensions = extensions;
        Ok(query)
    }

    fn decode_series(&self, response: &Value) -> Result<Vec<DataPoint>, NormalizationError> {
        series_points(response)
    }

    /// `timeSeries.create` accepts one point per series, so each point is its own series.
    fn encode_write(
        &self,
        series: &CanonicalMetricQuery,
        points: &[DataPoint],
        catalog: &MetricCatalog,
    ) -> Result<Value, NormalizationError> {
        let entry = catalog.lookup(Provider::Gcp, &series.metric_name)?;
        let (metric_labels, resource_labels) =
            write_labels(entry, &series.resource_id, &series.extensions)?;
        let options = passthrough(&series.extensions);
        let time_series = points
            .iter()
            .map(|point| {
                let stamp = to_rfc3339(point.timestamp)?;
                let mut native = Map::new();
                native.insert(
                    "metric".into(),
                    json!({"type": entry.native_id, "labels": metric_labels}),
                );
                native.insert(
                    "resource".into(),
                    json!({"type": entry.native_namespace, "labels": resource_labels}),
                );
                let sample = json!({
                    "interval": {"endTime": stamp},
                    "value": {"doubleValue": point.value},
                });
                native.insert("points".into(), json!([sample]));
                merge_extensions(&mut native, &options);
                Ok(Value::Object(native))
            })
            .collect::<Result<Vec<_>, NormalizationError>>()?;
        Ok(json!({"name": format!("projects/{}", self.project_id), "timeSeries": time_series}))
    }

    fn decode_notification(&self, payload: &Value) -> Result<AlarmStateChange, NormalizationError> {
        let incident = payload
            .get("incident")
            .and_then(Value::as_object)
            .ok_or(NormalizationError::Missing("incident"))?;
        let state = match str_field(incident, "state")? {
            "open" => AlarmState::Alarm,
            "closed" => AlarmState::Ok,
            other => {
                return Err(NormalizationError::Unrecognized {
                    field: "incident state",
                    value: other.to_string(),
                });
            }
        };
        Ok(AlarmStateChange {
            provider: Provider::Gcp,
            alarm_id: str_field(incident, "policy_name")?.to_string(),
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
    let object = as_object(request, "timeSeries.list request")?;
    let terms = parse_filter(str_field(object, "filter")?)?;
    let metric = terms
        .into_iter()
        .find(|(key, _)| key == "metric.type")
        .map(|(_, value)| value)
        .ok_or(NormalizationError::Missing("metric.type"))?;
    let time = |pointer: &str, what: &'static str| {
        request
            .pointer(pointer)
            .and_then(Value::as_str)
            .ok_or(NormalizationError::Missing(what))
            .and_then(from_rfc3339)
    };
    Ok(SeriesRequest {
        metric,
        start: time("/interval/startTime", "interval.startTime")?,
        end: time("/interval/endTime", "interval.endTime")?,
    })
}

pub(super) fn series_write(body: &Value) -> Result<SeriesWrite, NormalizationError> {
    let metric = body
        .pointer("/timeSeries/0/metric/type")
        .and_then(Value::as_str)
        .ok_or(NormalizationError::Missing("metric.type"))?;
    Ok(SeriesWrite {
        metric: metric.to_string(),
        points: series_points(body)?,
    })
}

/// One series, newest point first, the way Cloud Monitoring returns it.
pub(super) fn series_response(
    request: &Value,
    points: &[DataPoint],
) -> Result<Value, NormalizationError> {
    let object = as_object(request, "timeSeries.list request")?;
    let terms = parse_filter(str_field(object, "filter")?)?;
    let find = |key: &str| terms.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());

    let mut ordered = points.to_vec();
    ordered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let points = ordered
        .iter()
        .map(|point| {
            let stamp = to_rfc3339(point.timestamp)?;
            Ok(json!({
                "interval": {"startTime": stamp, "endTime": stamp},
                "value": {"doubleValue": point.value},
            }))
        })
        .collect::<Result<Vec<_>, NormalizationError>>()?;

    Ok(json!({
        "timeSeries": [{
            "metric": {"type": find("metric.type")},
            "resource": {"type": find("resource.type")},
            "metricKind": "GAUGE",
            "valueType": "DOUBLE",
            "points": points,
        }]
    }))
}
