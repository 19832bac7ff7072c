// Application layer - Catalog, dispatch and the monitoring facade
pub mod dispatcher;
pub mod error;
pub mod metric_catalog;
pub mod monitoring_facade;
pub mod provider_adapter;
pub mod retry;
