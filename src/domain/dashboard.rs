// Dashboard domain model
use super::metric_query::{CanonicalMetricQuery, Extensions, InvalidQuery};
use super::provider::Provider;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetType {
    TimeSeries,
    SingleValue,
    LogTable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub widget_type: WidgetType,
    pub queries: Vec<CanonicalMetricQuery>,
    #[serde(default)]
    pub extensions: Extensions,
}

impl Widget {
    pub fn new(widget_type: WidgetType, queries: Vec<CanonicalMetricQuery>) -> Self {
        Self {
            widget_type,
            queries,
            extensions: Extensions::new(),
        }
    }

    /// Attach a provider-specific field, e.g. a widget title or log query.
    pub fn with_extension(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extensions.insert(key.to_string(), value.into());
        self
    }
}

/// Widgets render top-to-bottom in vector order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDashboard {
    pub id: String,
    pub title: String,
    pub widgets: Vec<Widget>,
    #[serde(default)]
    pub extensions: Extensions,
}

impl CanonicalDashboard {
    pub fn new(id: impl Into<String>, title: impl Into<String>, widgets: Vec<Widget>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            widgets,
            extensions: Extensions::new(),
        }
    }

    pub fn queries(&self) -> impl Iterator<Item = &CanonicalMetricQuery> {
        self.widgets.iter().flat_map(|w| w.queries.iter())
    }

    pub fn validate(&self) -> Result<(), InvalidQuery> {
        self.queries().try_for_each(CanonicalMetricQuery::validate)
    }

    pub fn retargeted(&self, provider: Provider) -> Self {
        let mut dashboard = self.clone();
        for widget in &mut dashboard.widgets {
            for query in &mut widget.queries {
                query.provider = provider;
            }
        }
        dashboard
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDashboardHandle {
    pub provider: Provider,
    pub id: String,
}
