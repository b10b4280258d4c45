//! Poll driver
//!
//! Spawns the periodic task that runs one lifecycle cycle per interval. The
//! task owns the ledger for its whole life and hands it back on exit, so a
//! caller can inspect (or persist) what the guard still holds offline.
//!
//! Shutdown is only observed between cycles: a cycle that has started always
//! runs to completion, which keeps a backup and its matching delete together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::ledger::DisabledLedger;
use crate::lifecycle::{CycleReport, Lifecycle};

/// Spawn the poll loop.
///
/// The first cycle runs immediately, then one per `interval`. A slow cycle
/// delays the next one instead of triggering a burst. The loop ends when
/// `shutdown` turns `true` or its sender is dropped.
///
/// Returns the task handle, which resolves to the final ledger, and a
/// receiver that always holds the most recent `CycleReport`.
pub fn spawn_poll_task(
    lifecycle: Arc<Lifecycle>,
    mut ledger: DisabledLedger,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> (JoinHandle<DisabledLedger>, watch::Receiver<Option<CycleReport>>) {
    let (report_tx, report_rx) = watch::channel(None);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = interval.as_secs(),
            strategy = lifecycle.strategy().kind().label(),
            detection = lifecycle.settings().detection.label(),
            dry_run = lifecycle.settings().dry_run,
            owned = ledger.len(),
            "poll loop started"
        );

        loop {
            tokio::select! {
                biased;
                _ = stopped(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            let report = lifecycle.run_cycle(&mut ledger).await;
            report_tx.send_replace(Some(report));
        }

        info!(owned = ledger.len(), "poll loop stopped");
        ledger
    });

    (handle, report_rx)
}

/// Resolves once a stop has been requested.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
