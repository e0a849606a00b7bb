//! Trading Engine
//!
//! Turns accepted AI decisions into simulated or exchange-routed trades:
//! ledger accounting, order routing by environment and automation level,
//! the pending-approval lifecycle, and readiness scoring.

pub mod ledger;
pub mod pending;
pub mod provider;
pub mod readiness;
pub mod router;

pub use ledger::LedgerWriter;
pub use pending::ApprovalService;
pub use provider::{DecisionProvider, FixedDecisionProvider};
pub use readiness::{ReadinessCriteria, ReadinessReport};
pub use router::{ExecutionOutcome, OrderRouter, RoutePlan};
