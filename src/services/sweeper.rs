//! Sweeper — periodic housekeeping.
//!
//! DESIGN
//! ======
//! A background task wakes every `SWEEP_INTERVAL_SECS`, cancels `placed`
//! orders whose payment window has lapsed, deletes expired sessions, and
//! drops anonymous carts whose cookie can no longer exist.
//! Failures are logged and retried on the next tick.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::{cart, order, session};
use crate::state::AppState;

/// Rows touched by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_orders: u64,
    pub purged_sessions: u64,
    pub purged_carts: u64,
}

/// Spawn the background sweeper. Returns a handle for shutdown.
pub fn spawn_sweeper(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(state.config.sweep_interval_secs.max(1)));
        loop {
            interval.tick().await;
            sweep_once(&state).await;
        }
    })
}

pub async fn sweep_once(state: &AppState) -> SweepReport {
    let mut report = SweepReport::default();

    match order::expire_stale_orders(&state.pool, state.config.pending_order_ttl_mins).await {
        Ok(n) => report.expired_orders = n,
        Err(e) => error!(error = %e, "expiring stale orders failed"),
    }
    match session::purge_expired(&state.pool).await {
        Ok(n) => report.purged_sessions = n,
        Err(e) => error!(error = %e, "purging expired sessions failed"),
    }
    match cart::purge_idle_session_carts(&state.pool, cart::SESSION_CART_MAX_AGE_DAYS).await {
        Ok(n) => report.purged_carts = n,
        Err(e) => error!(error = %e, "purging idle session carts failed"),
    }

    if report != SweepReport::default() {
        info!(
            expired_orders = report.expired_orders,
            purged_sessions = report.purged_sessions,
            purged_carts = report.purged_carts,
            "sweep complete"
        );
    }
    report
}
