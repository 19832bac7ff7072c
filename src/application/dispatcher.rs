// Dispatcher - pre-dispatch validation, retries, deadlines and provider fan-out
use crate::application::error::{MonitoringError, Operation, ProviderFailure, RequestContext};
use crate::application::metric_catalog::{CatalogError, MetricCatalog};
use crate::application::provider_adapter::{AdapterError, ProviderAdapter};
use crate::application::retry::{Jitter, RandomJitter, RetryDecision, RetryPolicy};
use crate::domain::credential::{CredentialSet, ProviderCredential};
use crate::domain::metric_query::CanonicalMetricQuery;
use crate::domain::provider::{Provider, ProviderSelector};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Sent { attempt: u32 },
    Succeeded,
    Failed,
    Rejected,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Succeeded | RequestState::Failed | RequestState::Rejected
        )
    }

    /// Pending may also fail outright when the deadline has already passed.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (Pending, Sent { attempt }) => attempt == 1,
            (Pending, Rejected) | (Pending, Failed) => true,
            (Sent { attempt }, Sent { attempt: next }) => next == attempt + 1,
            (Sent { .. }, Succeeded) | (Sent { .. }, Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
struct RequestLifecycle {
    provider: Provider,
    operation: Operation,
    state: RequestState,
}

impl RequestLifecycle {
    fn new(context: &RequestContext) -> Self {
        Self {
            provider: context.provider,
            operation: context.operation,
            state: RequestState::Pending,
        }
    }

    fn advance(&mut self, next: RequestState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal request transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            provider = %self.provider,
            operation = %self.operation,
            from = ?self.state,
            to = ?next,
            "request state"
        );
        self.state = next;
    }
}

/// Per-call knobs supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub deadline: Option<Instant>,
    pub idempotency_key: Option<String>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Opts create calls into retries; the key is passed to the provider as a client token.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Options for one item of a batch: same deadline, key suffixed with the item id.
    pub fn for_item(&self, item: &str) -> Self {
        Self {
            deadline: self.deadline,
            idempotency_key: self.idempotency_key.as_ref().map(|key| format!("{key}:{item}")),
        }
    }
}

/// Outcome of one logical operation issued to several providers.
#[derive(Debug)]
pub struct FanOutResult<T> {
    pub successes: Vec<(Provider, T)>,
    pub failures: Vec<ProviderFailure>,
}

impl<T> FanOutResult<T> {
    pub fn new() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn success(&self, provider: Provider) -> Option<&T> {
        self.successes.iter().find(|(p, _)| *p == provider).map(|(_, value)| value)
    }

    pub fn failure(&self, provider: Provider) -> Option<&MonitoringError> {
        self.failures.iter().find(|f| f.provider == provider).map(|f| &f.error)
    }

    /// Strict view: any provider failure becomes `PartialFailure`.
    pub fn into_result(self) -> Result<Vec<(Provider, T)>, MonitoringError> {
        if self.failures.is_empty() {
            Ok(self.successes)
        } else {
            Err(MonitoringError::PartialFailure {
                failures: self.failures,
            })
        }
    }
}

impl<T> Default for FanOutResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Dispatcher {
    adapters: BTreeMap<Provider, Arc<dyn ProviderAdapter>>,
    catalog: Arc<MetricCatalog>,
    policy: RetryPolicy,
    jitter: Arc<dyn Jitter>,
    concurrency_limit: usize,
    default_timeout: Duration,
}

impl Dispatcher {
    pub fn new(adapters: Vec<Arc<dyn ProviderAdapter>>, catalog: Arc<MetricCatalog>) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.provider(), a)).collect(),
            catalog,
            policy: RetryPolicy::default(),
            jitter: Arc::new(RandomJitter),
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_jitter(mut self, jitter: Arc<dyn Jitter>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &MetricCatalog {
        &self.catalog
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    pub fn adapter(&self, provider: Provider) -> Option<&dyn ProviderAdapter> {
        self.adapters.get(&provider).map(|adapter| adapter.as_ref())
    }

    /// `All` means every provider with a configured adapter.
    pub fn providers(&self, selector: ProviderSelector) -> Vec<Provider> {
        match selector {
            ProviderSelector::One(provider) => vec![provider],
            ProviderSelector::All => self.adapters.keys().copied().collect(),
        }
    }

    /// Record a pre-dispatch validation failure.
    pub fn reject(&self, context: RequestContext, reason: impl Into<String>) -> MonitoringError {
        let reason = reason.into();
        RequestLifecycle::new(&context).advance(RequestState::Rejected);
        tracing::warn!(request = %context, %reason, "request rejected before dispatch");
        MonitoringError::Rejected { context, reason }
    }

    /// Time range, provider and catalog checks for one query.
    pub fn validate_query(
        &self,
        context: &RequestContext,
        query: &CanonicalMetricQuery,
    ) -> Result<(), MonitoringError> {
        if let Err(invalid) = query.validate() {
            return Err(self.reject(context.clone(), invalid.to_string()));
        }
        if query.provider != context.provider {
            return Err(self.reject(
                context.clone(),
                format!(
                    "query targets {} but the request is for {}",
                    query.provider, context.provider
                ),
            ));
        }
        match self.catalog.resolve(query) {
            Ok(_) => Ok(()),
            Err(error) => {
                RequestLifecycle::new(context).advance(RequestState::Rejected);
                tracing::warn!(request = %context, %error, "request rejected before dispatch");
                Err(match error {
                    CatalogError::UnsupportedMetric { provider, metric } => {
                        MonitoringError::UnsupportedMetric { provider, metric }
                    }
                    CatalogError::InvalidAggregation {
                        provider,
                        metric,
                        aggregation,
                    } => MonitoringError::InvalidAggregation {
                        provider,
                        metric,
                        aggregation,
                    },
                })
            }
        }
    }

    /// Validate `queries`, then run `call` against the provider's adapter with
    /// retries and the caller's deadline. Nothing is sent if validation fails.
    pub async fn execute<'a, T, F, Fut>(
        &'a self,
        context: RequestContext,
        queries: &[&CanonicalMetricQuery],
        credentials: &'a CredentialSet,
        options: &CallOptions,
        call: F,
    ) -> Result<T, MonitoringError>
    where
        F: Fn(&'a dyn ProviderAdapter, &'a ProviderCredential) -> Fut,
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        for query in queries {
            self.validate_query(&context, query)?;
        }
        let Some(adapter) = self.adapter(context.provider) else {
            let reason = format!("no adapter configured for {}", context.provider);
            return Err(self.reject(context, reason));
        };
        let Some(credential) = credentials.get(context.provider) else {
            let reason = format!("no credential supplied for {}", context.provider);
            return Err(self.reject(context, reason));
        };

        let idempotent =
            !context.operation.duplicates_on_retry() || options.idempotency_key.is_some();
        let deadline = options
            .deadline
            .unwrap_or_else(|| Instant::now() + self.default_timeout);

        let mut lifecycle = RequestLifecycle::new(&context);
        let mut attempts = 0;
        loop {
            if Instant::now() >= deadline {
                lifecycle.advance(RequestState::Failed);
                tracing::warn!(request = %context, attempts, "deadline expired before attempt");
                return Err(MonitoringError::Timeout { context, attempts });
            }

            attempts += 1;
            lifecycle.advance(RequestState::Sent { attempt: attempts });

            // Expiry abandons the in-flight call; the provider may still complete it.
            let outcome = match tokio::time::timeout_at(deadline, call(adapter, credential)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    lifecycle.advance(RequestState::Failed);
                    tracing::warn!(request = %context, attempts, "deadline expired in flight");
                    return Err(MonitoringError::Timeout { context, attempts });
                }
            };

            let error = match outcome {
                Ok(value) => {
                    lifecycle.advance(RequestState::Succeeded);
                    if attempts > 1 {
                        tracing::info!(request = %context, attempts, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.policy.decide(attempts, &error, idempotent, self.jitter.as_ref()) {
                RetryDecision::Retry { delay } => {
                    if Instant::now() + delay >= deadline {
                        lifecycle.advance(RequestState::Failed);
                        tracing::warn!(
                            request = %context,
                            attempts,
                            %error,
                            "no time left to retry"
                        );
                        return Err(MonitoringError::Timeout { context, attempts });
                    }
                    tracing::warn!(
                        request = %context,
                        attempt = attempts,
                        %error,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Exhausted => {
                    lifecycle.advance(RequestState::Failed);
                    tracing::error!(request = %context, attempts, %error, "retries exhausted");
                    return Err(MonitoringError::ExhaustedRetries {
                        context,
                        attempts,
                        last_error: error,
                    });
                }
                RetryDecision::NotRetryable => {
                    lifecycle.advance(RequestState::Failed);
                    tracing::error!(request = %context, %error, "request failed");
                    return Err(MonitoringError::from_adapter(context, error));
                }
            }
        }
    }

    /// Run `call` for every provider concurrently. One provider failing never
    /// aborts the others.
    pub async fn fan_out<T, F, Fut>(&self, providers: Vec<Provider>, call: F) -> FanOutResult<T>
    where
        F: Fn(Provider) -> Fut,
        Fut: Future<Output = Result<T, MonitoringError>>,
    {
        let outcomes = join_all(providers.into_iter().map(|provider| {
            let pending = call(provider);
            async move { (provider, pending.await) }
        }))
        .await;

        let mut result = FanOutResult::new();
        for (provider, outcome) in outcomes {
            match outcome {
                Ok(value) => result.successes.push((provider, value)),
                Err(error) => result.failures.push(ProviderFailure { provider, error }),
            }
        }

        tracing::info!(
            succeeded = result.successes.len(),
            failed = result.failures.len(),
            "fan-out complete"
        );
        result
    }

    /// Run `call` over `items` with at most `concurrency_limit` in flight.
    /// Results keep the order of `items`.
    pub async fn bounded<I, T, F, Fut>(&self, items: I, call: F) -> Vec<T>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = T>,
    {
        stream::iter(items)
            .map(call)
            .buffered(self.concurrency_limit)
            .collect()
            .await
    }
}
