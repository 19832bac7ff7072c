// Domain layer - Provider-neutral monitoring model
pub mod alarm;
pub mod credential;
pub mod dashboard;
pub mod metric_query;
pub mod provider;
