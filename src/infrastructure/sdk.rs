// Vendor SDK collaborator - the narrow surface each cloud client must expose
use crate::domain::credential::ProviderCredential;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Error as reported by a vendor SDK. `code` is the service error code
/// (`Throttling`, `RESOURCE_EXHAUSTED`, `TooManyRequests`), `status` the HTTP status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SdkError {
    pub code: Option<String>,
    pub status: Option<u16>,
    pub message: String,
}

impl SdkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Provider-native operations. Bodies are the provider's own JSON shapes.
#[async_trait]
pub trait MonitoringSdk: Send + Sync {
    /// Create or replace. Returns the stored resource id.
    async fn put_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
        body: Value,
        client_token: Option<&str>,
    ) -> Result<String, SdkError>;

    async fn get_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<Value, SdkError>;

    async fn list_dashboards(
        &self,
        credential: &ProviderCredential,
    ) -> Result<Vec<Value>, SdkError>;

    async fn delete_dashboard(
        &self,
        credential: &ProviderCredential,
        id: &str,
    ) -> Result<(), SdkError>;

    async fn put_alarm(
        &self,
        credential: &ProviderCredential,
        id: &str,
        body: Value,
        client_token: Option<&str>,
    ) -> Result<String, SdkError>;

    async fn list_alarms(&self, credential: &ProviderCredential) -> Result<Vec<Value>, SdkError>;

    async fn delete_alarm(&self, credential: &ProviderCredential, id: &str) -> Result<(), SdkError>;

    async fn query_time_series(
        &self,
        credential: &ProviderCredential,
        request: Value,
    ) -> Result<Value, SdkError>;

    /// Publish custom-metric points. None of the write APIs take a client token.
    async fn put_time_series(
        &self,
        credential: &ProviderCredential,
        body: Value,
    ) -> Result<(), SdkError>;
}
