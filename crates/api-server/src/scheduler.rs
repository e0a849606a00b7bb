//! Background trading-cycle scheduler.
//!
//! Ticks on a short interval and runs a decision cycle for each active model
//! whose own trading interval has elapsed. One model's bad cycle is logged
//! and isolated; the loop never dies with it.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::cycle::run_cycle;
use crate::state::AppState;

/// Spawn the scheduler as a background task.
pub fn spawn_trading_scheduler(state: Arc<AppState>) {
    let tick_secs = state.trading.scheduler_tick_secs;
    tokio::spawn(async move {
        run_scheduler(state, tick_secs).await;
    });
    info!(tick_secs, "Trading scheduler spawned as background task");
}

async fn run_scheduler(state: Arc<AppState>, tick_secs: u64) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
    // Skip the immediate first tick so startup isn't a trading burst.
    ticker.tick().await;

    let last_run: DashMap<Uuid, DateTime<Utc>> = DashMap::new();

    loop {
        ticker.tick().await;

        let models = match state.models.list_active().await {
            Ok(models) => models,
            Err(e) => {
                error!(error = %e, "Scheduler failed to list active models");
                continue;
            }
        };

        for model in models {
            let interval_minutes = match state.models.get_settings(model.id).await {
                Ok(Some(settings)) => settings.trading_interval_minutes as i64,
                Ok(None) => {
                    debug!(model_id = %model.id, "No risk settings; skipping cycle");
                    continue;
                }
                Err(e) => {
                    error!(model_id = %model.id, error = %e, "Failed to load settings");
                    continue;
                }
            };

            let now = Utc::now();
            let due = last_run
                .get(&model.id)
                .map(|at| now.signed_duration_since(*at) >= Duration::minutes(interval_minutes))
                .unwrap_or(true);
            if !due {
                continue;
            }

            last_run.insert(model.id, now);
            match run_cycle(&state, model.id).await {
                Ok(outcome) => {
                    debug!(
                        model_id = %model.id,
                        rejected = outcome.rejected_by_risk,
                        "Scheduled cycle complete"
                    );
                }
                Err(e) => {
                    // Isolated: one model's failure never stops the loop.
                    error!(model_id = %model.id, error = %e, "Scheduled cycle failed");
                }
            }
        }
    }
}
