use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct VolumeEntry {
    observed_values: Vec<f64>,
    last_updated: Instant,
}

impl VolumeEntry {
    fn total_usd(&self) -> f64 {
        self.observed_values.iter().sum()
    }

    fn is_stale(&self, now: Instant, retention: Duration) -> bool {
        now.saturating_duration_since(self.last_updated) >= retention
    }
}

/// Accumulated per-token USD trade volume. An entry lives until it is
/// validated or goes a full retention period without a new trade.
#[derive(Debug)]
pub struct VolumeCache {
    entries: RwLock<HashMap<String, VolumeEntry>>,
    retention: Duration,
}

impl VolumeCache {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            retention,
        }
    }

    pub fn record_trade(&self, token: &str, usd: f64) {
        self.record_trade_at(token, usd, Instant::now());
    }

    pub fn record_trade_at(&self, token: &str, usd: f64, now: Instant) {
        if !usd.is_finite() || usd <= 0.0 {
            return;
        }
        let mut entries = self.write();
        let entry = entries
            .entry(token.to_string())
            .or_insert_with(|| VolumeEntry {
                observed_values: Vec::new(),
                last_updated: now,
            });
        entry.observed_values.push(usd);
        entry.last_updated = entry.last_updated.max(now);
    }

    /// Copy of every token whose accumulated total is at or above `threshold`.
    pub fn snapshot_above_threshold(&self, threshold: f64) -> HashMap<String, f64> {
        self.read()
            .iter()
            .filter_map(|(token, entry)| {
                let total = entry.total_usd();
                (total >= threshold).then(|| (token.clone(), total))
            })
            .collect()
    }

    pub fn total_for(&self, token: &str) -> Option<f64> {
        self.read().get(token).map(VolumeEntry::total_usd)
    }

    pub fn remove(&self, token: &str) -> bool {
        self.write().remove(token).is_some()
    }

    pub fn stale_candidates(&self, now: Instant) -> Vec<String> {
        let retention = self.retention;
        self.read()
            .iter()
            .filter(|(_, entry)| entry.is_stale(now, retention))
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// Removes `token` only if it is still stale under the write lock; a
    /// trade recorded after the candidate scan keeps it alive.
    pub fn remove_if_stale(&self, token: &str, now: Instant) -> bool {
        let retention = self.retention;
        let mut entries = self.write();
        match entries.get(token) {
            Some(entry) if entry.is_stale(now, retention) => {
                entries.remove(token);
                true
            }
            _ => false,
        }
    }

    pub fn sweep(&self, now: Instant) -> usize {
        self.stale_candidates(now)
            .into_iter()
            .filter(|token| self.remove_if_stale(token, now))
            .count()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; nothing can be stale yet.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep(Instant::now());
                    if removed > 0 {
                        info!(removed, remaining = self.len(), "swept stale volume entries");
                    } else {
                        debug!(remaining = self.len(), "volume sweep found nothing stale");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("volume sweeper stopping");
                        return;
                    }
                }
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, VolumeEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, VolumeEntry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
