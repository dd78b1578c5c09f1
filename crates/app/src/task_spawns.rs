use crate::telemetry::{format_error_chain, log_drop_counts};
use mintwatch_signals::SignalService;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

fn periodic(period: Duration) -> time::Interval {
    let mut interval = time::interval(period.max(Duration::from_secs(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) -> bool {
    match shutdown.changed().await {
        Ok(()) => *shutdown.borrow(),
        Err(_) => true,
    }
}

pub(crate) fn spawn_volume_trigger_task(
    service: Arc<SignalService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = periodic(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match service.run_volume_cycle().await {
                        Ok(summary) if summary.processed > 0 => info!(
                            processed = summary.processed,
                            notified = summary.notified,
                            dropped = summary.dropped,
                            "volume trigger cycle complete"
                        ),
                        Ok(_) => {}
                        Err(error) => warn!(
                            error = %format_error_chain(&error),
                            "volume trigger cycle failed"
                        ),
                    }
                }
                stop = stopped(&mut shutdown) => {
                    if stop {
                        debug!("volume trigger stopping");
                        return;
                    }
                }
            }
        }
    })
}

pub(crate) fn spawn_dedup_prune_task(
    service: Arc<SignalService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = periodic(period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let pruned = service.dedup().prune(Instant::now());
                    if pruned > 0 {
                        info!(pruned, remaining = service.dedup().len(), "pruned dedup claims");
                    }
                }
                stop = stopped(&mut shutdown) => {
                    if stop {
                        debug!("dedup pruner stopping");
                        return;
                    }
                }
            }
        }
    })
}

pub(crate) fn spawn_drop_report_task(
    service: Arc<SignalService>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let window_seconds = period.as_secs();
        let mut interval = periodic(period);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    log_drop_counts(&service.drain_drop_counts(), window_seconds);
                }
                stop = stopped(&mut shutdown) => {
                    if stop {
                        log_drop_counts(&service.drain_drop_counts(), window_seconds);
                        return;
                    }
                }
            }
        }
    })
}
