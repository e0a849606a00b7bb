//! Risk Manager
//!
//! Threshold-based risk evaluation for proposed trades and edge-triggered
//! tracking of danger states for incident emission.

pub mod evaluator;
pub mod session;

pub use evaluator::{
    MetricReading, MetricStatus, ProposedOrder, RiskEvaluator, RiskMetric, RiskThresholds,
    RiskVerdict,
};
pub use session::RiskStateTracker;
