//! Edge-triggered risk state tracking.
//!
//! Incidents fire once per newly-entered danger state, not on every poll
//! while the condition persists. The last observed statuses live here, keyed
//! per model, as an explicit session object handed around through app state.

use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::evaluator::{MetricReading, MetricStatus, RiskMetric};

/// Last observed per-metric statuses per model.
#[derive(Debug, Default)]
pub struct RiskStateTracker {
    last: DashMap<Uuid, HashMap<RiskMetric, MetricStatus>>,
}

impl RiskStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest readings and return the metrics that just entered
    /// danger (edge trigger).
    pub fn observe(&self, model_id: Uuid, readings: &[MetricReading]) -> Vec<MetricReading> {
        let mut entry = self.last.entry(model_id).or_default();

        let newly_dangerous: Vec<MetricReading> = readings
            .iter()
            .filter(|r| {
                r.status == MetricStatus::Danger
                    && entry.get(&r.metric) != Some(&MetricStatus::Danger)
            })
            .cloned()
            .collect();

        for reading in readings {
            entry.insert(reading.metric, reading.status);
        }

        if !newly_dangerous.is_empty() {
            debug!(
                model_id = %model_id,
                metrics = ?newly_dangerous.iter().map(|r| r.metric).collect::<Vec<_>>(),
                "Risk metrics entered danger"
            );
        }
        newly_dangerous
    }

    /// Drop tracked state for a model (e.g. after deletion).
    pub fn forget(&self, model_id: Uuid) {
        self.last.remove(&model_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn reading(metric: RiskMetric, status: MetricStatus) -> MetricReading {
        MetricReading {
            metric,
            status,
            usage: Decimal::ONE,
            current: Decimal::ONE,
            limit: Decimal::ONE,
            hard: metric.is_hard(),
        }
    }

    #[test]
    fn danger_fires_once_while_persisting() {
        let tracker = RiskStateTracker::new();
        let model_id = Uuid::new_v4();
        let readings = vec![reading(RiskMetric::DailyLoss, MetricStatus::Danger)];

        let first = tracker.observe(model_id, &readings);
        assert_eq!(first.len(), 1);

        // Same danger on the next poll: no new edge.
        let second = tracker.observe(model_id, &readings);
        assert!(second.is_empty());
    }

    #[test]
    fn danger_fires_again_after_recovery() {
        let tracker = RiskStateTracker::new();
        let model_id = Uuid::new_v4();

        let danger = vec![reading(RiskMetric::CashReserve, MetricStatus::Danger)];
        let ok = vec![reading(RiskMetric::CashReserve, MetricStatus::Ok)];

        assert_eq!(tracker.observe(model_id, &danger).len(), 1);
        assert!(tracker.observe(model_id, &ok).is_empty());
        // Re-entering danger is a fresh edge.
        assert_eq!(tracker.observe(model_id, &danger).len(), 1);
    }

    #[test]
    fn models_are_tracked_independently() {
        let tracker = RiskStateTracker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let danger = vec![reading(RiskMetric::DailyTrades, MetricStatus::Danger)];

        assert_eq!(tracker.observe(a, &danger).len(), 1);
        assert_eq!(tracker.observe(b, &danger).len(), 1);
    }

    #[test]
    fn warning_is_not_an_edge() {
        let tracker = RiskStateTracker::new();
        let model_id = Uuid::new_v4();
        let warning = vec![reading(RiskMetric::PositionSize, MetricStatus::Warning)];
        assert!(tracker.observe(model_id, &warning).is_empty());
    }
}
