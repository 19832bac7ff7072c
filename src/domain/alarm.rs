// Alarm rule domain model
use super::metric_query::{CanonicalMetricQuery, Extensions, InvalidQuery};
use super::provider::Provider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub const ALL: [Comparator; 4] =
        [Comparator::Gt, Comparator::Ge, Comparator::Lt, Comparator::Le];

    pub fn breaches(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Lt => value < threshold,
            Comparator::Le => value <= threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    Ok,
    Alarm,
    InsufficientData,
}

impl AlarmState {
    pub const ALL: [AlarmState; 3] =
        [AlarmState::Ok, AlarmState::Alarm, AlarmState::InsufficientData];
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAlarm {
    #[error("alarm id must not be empty")]
    EmptyId,
    #[error("evaluation_periods must be at least 1")]
    NoEvaluationPeriods,
    #[error("threshold must be a finite number")]
    NonFiniteThreshold,
    /// Providers only store a period length and a period count for alarms.
    #[error("alarm window must be (0, {expected_end}), got ({start}, {end})")]
    AbsoluteWindow { start: i64, end: i64, expected_end: i64 },
    #[error(transparent)]
    Query(#[from] InvalidQuery),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAlarmRule {
    pub id: String,
    pub metric: CanonicalMetricQuery,
    pub comparator: Comparator,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub state: AlarmState,
    pub notify_targets: BTreeSet<String>,
    #[serde(default)]
    pub extensions: Extensions,
}

impl CanonicalAlarmRule {
    /// New rules start in `InsufficientData` until the provider evaluates them.
    pub fn new(
        id: impl Into<String>,
        metric: CanonicalMetricQuery,
        comparator: Comparator,
        threshold: f64,
        evaluation_periods: u32,
    ) -> Self {
        Self {
            id: id.into(),
            metric,
            comparator,
            threshold,
            evaluation_periods,
            state: AlarmState::InsufficientData,
            notify_targets: BTreeSet::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn notify(mut self, target: impl Into<String>) -> Self {
        self.notify_targets.insert(target.into());
        self
    }

    pub fn validate(&self) -> Result<(), InvalidAlarm> {
        if self.id.trim().is_empty() {
            return Err(InvalidAlarm::EmptyId);
        }
        if self.evaluation_periods == 0 {
            return Err(InvalidAlarm::NoEvaluationPeriods);
        }
        if !self.threshold.is_finite() {
            return Err(InvalidAlarm::NonFiniteThreshold);
        }
        self.metric.validate()?;
        let expected_end =
            i64::from(self.metric.period_seconds) * i64::from(self.evaluation_periods);
        if self.metric.start != 0 || self.metric.end != expected_end {
            return Err(InvalidAlarm::AbsoluteWindow {
                start: self.metric.start,
                end: self.metric.end,
                expected_end,
            });
        }
        Ok(())
    }

    pub fn retargeted(&self, provider: Provider) -> Self {
        Self {
            metric: self.metric.retargeted(provider),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmFilter {
    pub state: Option<AlarmState>,
}

impl AlarmFilter {
    pub fn in_state(state: AlarmState) -> Self {
        Self { state: Some(state) }
    }

    pub fn matches(&self, alarm: &CanonicalAlarmRule) -> bool {
        self.state.is_none_or(|state| alarm.state == state)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAlarmHandle {
    pub provider: Provider,
    pub id: String,
}

/// A state transition reported by a provider push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmStateChange {
    pub provider: Provider,
    pub alarm_id: String,
    pub state: AlarmState,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric_query::Aggregation;

    fn rule() -> CanonicalAlarmRule {
        let metric = CanonicalMetricQuery::relative(
            Provider::Aws,
            "i-1",
            "cpu_utilization",
            Aggregation::Avg,
            300,
            2,
        );
        CanonicalAlarmRule::new("EC2-HighCPU-i-1", metric, Comparator::Gt, 80.0, 2)
    }

    #[test]
    fn test_comparators() {
        assert!(Comparator::Gt.breaches(81.0, 80.0));
        assert!(!Comparator::Gt.breaches(80.0, 80.0));
        assert!(Comparator::Ge.breaches(80.0, 80.0));
        assert!(Comparator::Lt.breaches(1.0, 2.0));
        assert!(Comparator::Le.breaches(2.0, 2.0));
    }

    #[test]
    fn test_validate() {
        assert_eq!(rule().validate(), Ok(()));

        let mut no_periods = rule();
        no_periods.evaluation_periods = 0;
        assert_eq!(no_periods.validate(), Err(InvalidAlarm::NoEvaluationPeriods));

        let mut blank = rule();
        blank.id = "  ".to_string();
        assert_eq!(blank.validate(), Err(InvalidAlarm::EmptyId));

        let mut nan = rule();
        nan.threshold = f64::NAN;
        assert_eq!(nan.validate(), Err(InvalidAlarm::NonFiniteThreshold));
    }

    #[test]
    fn test_validate_rejects_absolute_window() {
        let mut pinned = rule();
        pinned.metric.start = 1_700_000_000;
        pinned.metric.end = 1_700_000_600;
        assert_eq!(
            pinned.validate(),
            Err(InvalidAlarm::AbsoluteWindow {
                start: 1_700_000_000,
                end: 1_700_000_600,
                expected_end: 600,
            })
        );

        let mut longer = rule();
        longer.metric.end = 900;
        assert!(matches!(longer.validate(), Err(InvalidAlarm::AbsoluteWindow { .. })));
    }

    #[test]
    fn test_filter() {
        let mut firing = rule();
        firing.state = AlarmState::Alarm;
        assert!(AlarmFilter::default().matches(&firing));
        assert!(AlarmFilter::in_state(AlarmState::Alarm).matches(&firing));
        assert!(!AlarmFilter::in_state(AlarmState::Ok).matches(&firing));
    }

    #[test]
    fn test_notify_targets_are_a_set() {
        let r = rule().notify("arn:sns:a").notify("arn:sns:a").notify("arn:sns:b");
        assert_eq!(r.notify_targets.len(), 2);
    }
}
