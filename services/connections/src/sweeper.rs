//! Periodic expiry of pending requests whose OTP window has closed.
//!
//! Reads also expire lapsed requests lazily; the sweep makes the state visible
//! without waiting for someone to look.

use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use crate::domain::repository::ConnectionRequestRepository;
use crate::usecase::expiry::ExpireLapsedRequestsUseCase;

/// Run one pass and log the outcome. Returns how many requests were expired.
pub async fn sweep_once<C: ConnectionRequestRepository>(
    usecase: &ExpireLapsedRequestsUseCase<C>,
) -> usize {
    match usecase.execute(Utc::now()).await {
        Ok(expired) => {
            tracing::debug!(expired, "expiry sweep finished");
            expired
        }
        Err(e) => {
            tracing::warn!(error = %e, "expiry sweep failed");
            0
        }
    }
}

/// Sweep every `period` forever. Errors are logged and the loop carries on.
pub async fn run_expiry_sweeper<C: ConnectionRequestRepository>(requests: C, period: Duration) {
    let usecase = ExpireLapsedRequestsUseCase { requests };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // Skip first immediate tick

    tracing::info!(period_secs = period.as_secs(), "expiry sweeper started");
    loop {
        interval.tick().await;
        sweep_once(&usecase).await;
    }
}
