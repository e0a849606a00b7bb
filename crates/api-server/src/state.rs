//! Application state shared across handlers.

use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use risk_manager::{RiskEvaluator, RiskStateTracker, RiskThresholds};
use tradepilot_core::config::TradingConfig;
use tradepilot_core::db::{
    CredentialsManager, IncidentRepository, ModelRepository, PendingDecisionRepository,
    PlaintextEncoder, TradeRepository,
};
use trading_engine::readiness::ReadinessCriteria;
use trading_engine::{ApprovalService, DecisionProvider, FixedDecisionProvider, LedgerWriter, OrderRouter};

/// Shared application state.
pub struct AppState {
    /// Database connection pool; the single source of truth.
    pub pool: PgPool,
    pub models: ModelRepository,
    pub trades: TradeRepository,
    pub pending: PendingDecisionRepository,
    pub incidents: IncidentRepository,
    /// Exchange credential storage + client construction.
    pub credentials: CredentialsManager,
    /// Pure risk evaluation.
    pub evaluator: RiskEvaluator,
    /// Edge-triggered danger tracking for incident emission.
    pub risk_tracker: RiskStateTracker,
    /// Routes accepted decisions per model policy.
    pub router: OrderRouter,
    /// Pending-decision approve/reject lifecycle.
    pub approvals: ApprovalService,
    /// AI decision collaborator.
    pub provider: Arc<dyn DecisionProvider>,
    /// Per-model execution locks: evaluate -> execute -> persist runs under
    /// one lock so concurrent approvals can't race on stale balances.
    model_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    pub trading: TradingConfig,
    pub readiness_criteria: ReadinessCriteria,
}

impl AppState {
    /// Build state from a pool and trading config with the default
    /// (hold-only) decision provider.
    pub fn new(pool: PgPool, trading: TradingConfig) -> Self {
        Self::with_provider(pool, trading, Arc::new(FixedDecisionProvider::holding()))
    }

    /// Build state with an explicit decision provider (the wiring point for
    /// a real AI-backed collaborator).
    pub fn with_provider(
        pool: PgPool,
        trading: TradingConfig,
        provider: Arc<dyn DecisionProvider>,
    ) -> Self {
        let ledger = LedgerWriter::new(pool.clone(), trading.sim_fee_rate);
        let router = OrderRouter::new(
            ledger,
            PendingDecisionRepository::new(pool.clone()),
            IncidentRepository::new(pool.clone()),
            trading.quote_asset.clone(),
        );
        let approvals = ApprovalService::new(
            PendingDecisionRepository::new(pool.clone()),
            trading.pending_decision_ttl_minutes,
        );

        Self {
            models: ModelRepository::new(pool.clone()),
            trades: TradeRepository::new(pool.clone()),
            pending: PendingDecisionRepository::new(pool.clone()),
            incidents: IncidentRepository::new(pool.clone()),
            credentials: CredentialsManager::new(pool.clone(), Box::new(PlaintextEncoder)),
            evaluator: RiskEvaluator::new(RiskThresholds::default()),
            risk_tracker: RiskStateTracker::new(),
            router,
            approvals,
            provider,
            model_locks: DashMap::new(),
            trading,
            readiness_criteria: ReadinessCriteria::default(),
            pool,
        }
    }

    /// The execution lock for a model.
    pub fn lock_for(&self, model_id: Uuid) -> Arc<Mutex<()>> {
        self.model_locks
            .entry(model_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}
