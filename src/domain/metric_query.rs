// Metric query domain model
use super::provider::Provider;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider-specific fields with no canonical counterpart, carried through untouched.
pub type Extensions = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Avg,
    Sum,
    Max,
    Min,
    Count,
}

impl Aggregation {
    pub const ALL: [Aggregation; 5] = [
        Aggregation::Avg,
        Aggregation::Sum,
        Aggregation::Max,
        Aggregation::Min,
        Aggregation::Count,
    ];
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Aggregation::Avg => "avg",
            Aggregation::Sum => "sum",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
            Aggregation::Count => "count",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuery {
    #[error("start {start} is not before end {end}")]
    EmptyRange { start: i64, end: i64 },
    #[error("period_seconds must be greater than zero")]
    ZeroPeriod,
    #[error("range of {span}s is not a multiple of period {period}s")]
    Misaligned { span: i64, period: u32 },
    #[error("range from {start} to {end} is too wide to measure")]
    RangeOverflow { start: i64, end: i64 },
}

/// A metric query in provider-neutral terms. Timestamps are UTC epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetricQuery {
    pub provider: Provider,
    pub resource_id: String,
    pub metric_name: String,
    pub aggregation: Aggregation,
    pub start: i64,
    pub end: i64,
    pub period_seconds: u32,
    #[serde(default)]
    pub extensions: Extensions,
}

impl CanonicalMetricQuery {
    pub fn new(
        provider: Provider,
        resource_id: impl Into<String>,
        metric_name: impl Into<String>,
        aggregation: Aggregation,
        start: i64,
        end: i64,
        period_seconds: u32,
    ) -> Self {
        Self {
            provider,
            resource_id: resource_id.into(),
            metric_name: metric_name.into(),
            aggregation,
            start,
            end,
            period_seconds,
            extensions: Extensions::new(),
        }
    }

    /// Window of `periods` periods anchored at epoch zero, used where the
    /// provider only stores a period length (alarm evaluation windows).
    pub fn relative(
        provider: Provider,
        resource_id: impl Into<String>,
        metric_name: impl Into<String>,
        aggregation: Aggregation,
        period_seconds: u32,
        periods: u32,
    ) -> Self {
        let end = i64::from(period_seconds) * i64::from(periods.max(1));
        Self::new(provider, resource_id, metric_name, aggregation, 0, end, period_seconds)
    }

    pub fn validate(&self) -> Result<(), InvalidQuery> {
        if self.start >= self.end {
            return Err(InvalidQuery::EmptyRange {
                start: self.start,
                end: self.end,
            });
        }
        if self.period_seconds == 0 {
            return Err(InvalidQuery::ZeroPeriod);
        }
        let span = self.end.checked_sub(self.start).ok_or(InvalidQuery::RangeOverflow {
            start: self.start,
            end: self.end,
        })?;
        if span % i64::from(self.period_seconds) != 0 {
            return Err(InvalidQuery::Misaligned {
                span,
                period: self.period_seconds,
            });
        }
        Ok(())
    }

    pub fn retargeted(&self, provider: Provider) -> Self {
        Self {
            provider,
            ..self.clone()
        }
    }
}

/// One normalized sample: epoch seconds and a 64-bit float value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: f64,
}

impl DataPoint {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(start: i64, end: i64, period: u32) -> CanonicalMetricQuery {
        CanonicalMetricQuery::new(
            Provider::Aws,
            "i-1",
            "cpu_utilization",
            Aggregation::Avg,
            start,
            end,
            period,
        )
    }

    #[test]
    fn test_validate_accepts_aligned_range() {
        assert_eq!(query(0, 3600, 300).validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_misaligned_range() {
        assert_eq!(
            query(100, 200, 30).validate(),
            Err(InvalidQuery::Misaligned { span: 100, period: 30 })
        );
    }

    #[test]
    fn test_validate_rejects_empty_range_and_zero_period() {
        assert!(matches!(
            query(200, 200, 10).validate(),
            Err(InvalidQuery::EmptyRange { .. })
        ));
        assert!(matches!(
            query(300, 200, 10).validate(),
            Err(InvalidQuery::EmptyRange { .. })
        ));
        assert_eq!(query(0, 100, 0).validate(), Err(InvalidQuery::ZeroPeriod));
    }

    #[test]
    fn test_validate_rejects_range_wider_than_i64() {
        assert_eq!(
            query(i64::MIN, i64::MAX, 60).validate(),
            Err(InvalidQuery::RangeOverflow {
                start: i64::MIN,
                end: i64::MAX,
            })
        );
        assert!(query(i64::MIN + 1, 0, 1).validate().is_ok());
    }

    #[test]
    fn test_relative_window() {
        let q = CanonicalMetricQuery::relative(
            Provider::Gcp,
            "vm",
            "cpu_utilization",
            Aggregation::Max,
            60,
            3,
        );
        assert_eq!((q.start, q.end), (0, 180));
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_retargeted_keeps_everything_else() {
        let q = query(0, 600, 60);
        let moved = q.retargeted(Provider::Azure);
        assert_eq!(moved.provider, Provider::Azure);
        assert_eq!(moved.metric_name, q.metric_name);
        assert_eq!((moved.start, moved.end), (q.start, q.end));
    }
}
