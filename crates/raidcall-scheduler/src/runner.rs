//! The scheduling loop. Uses `tokio::time::interval`, sleeping between passes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use raidcall_core::Clock;
use tokio::time::MissedTickBehavior;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::engine::ReminderEngine;

/// One full pass: tick, publish due announcements, dispatch everything.
pub async fn run_once(
    engine: &ReminderEngine,
    dispatcher: &Dispatcher,
    now: DateTime<Utc>,
) -> DispatchReport {
    let outcome = engine.tick(now);
    let mut report = dispatcher.dispatch(&outcome).await;

    let due = engine.due_publications(now);
    if !due.is_empty() {
        let published = dispatcher.publish(&due).await;
        report.delivered += published.delivered;
        report.failed += published.failed;
    }

    if report.failed > 0 {
        tracing::warn!(
            "⚠️ Pass at {now}: {} delivered, {} failed (retrying next tick)",
            report.delivered,
            report.failed
        );
    }
    report
}

/// Run the scheduler forever. Passes never overlap: a slow pass delays the
/// next one instead of queueing a burst.
pub async fn spawn_scheduler(
    engine: Arc<ReminderEngine>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    check_interval_secs: u64,
) {
    tracing::info!(
        "⏰ Scheduler started (check every {}s, sink: {})",
        check_interval_secs,
        dispatcher.sink_name()
    );

    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(check_interval_secs.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        run_once(&engine, &dispatcher, clock.now()).await;
    }
}
