use crate::messages::{milestone_text, MilestoneUpdate};
use crate::notifier::Notifier;
use chrono::{DateTime, Utc};
use mintwatch_config::TrackerConfig;
use mintwatch_core_types::TrackedToken;
use mintwatch_market_data::TokenValidator;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

const MAX_AGE_HOURS: u64 = 100 * 365 * 24;

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub interval: Duration,
    pub inter_token_delay: Duration,
    pub min_milestone_level: u32,
    pub max_tracked_tokens: Option<usize>,
    pub max_tracked_age: Option<chrono::Duration>,
}

impl From<&TrackerConfig> for TrackerSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_seconds.max(1)),
            inter_token_delay: Duration::from_millis(config.inter_token_delay_ms),
            min_milestone_level: config.min_milestone_level.max(1),
            max_tracked_tokens: (config.max_tracked_tokens > 0)
                .then_some(config.max_tracked_tokens),
            max_tracked_age: (config.max_tracked_age_hours > 0).then(|| {
                chrono::Duration::hours(config.max_tracked_age_hours.min(MAX_AGE_HOURS) as i64)
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub checked: usize,
    pub skipped: usize,
    pub milestones: usize,
    pub evicted: usize,
}

/// Watches notified tokens and reports each new whole multiple of the
/// market cap they had when first signalled.
pub struct ProgressTracker {
    tokens: Mutex<HashMap<String, TrackedToken>>,
    validator: Arc<dyn TokenValidator>,
    notifier: Arc<dyn Notifier>,
    settings: TrackerSettings,
}

impl ProgressTracker {
    pub fn new(
        settings: TrackerSettings,
        validator: Arc<dyn TokenValidator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            validator,
            notifier,
            settings,
        }
    }

    /// Starts watching `token`. Returns false when it is already tracked or
    /// the baseline is unusable.
    pub fn register(&self, token: &str, baseline_market_cap: f64, now: DateTime<Utc>) -> bool {
        if !baseline_market_cap.is_finite() || baseline_market_cap <= 0.0 {
            return false;
        }
        let mut tokens = self.lock();
        if tokens.contains_key(token) {
            return false;
        }
        if let Some(capacity) = self.settings.max_tracked_tokens {
            while tokens.len() >= capacity {
                let Some(oldest) = tokens
                    .iter()
                    .min_by_key(|(_, tracked)| tracked.added_at)
                    .map(|(token, _)| token.clone())
                else {
                    break;
                };
                tokens.remove(&oldest);
                info!(token = %oldest, capacity, "tracker full, evicted oldest token");
            }
        }
        tokens.insert(
            token.to_string(),
            TrackedToken::new(baseline_market_cap, now),
        );
        info!(
            token = %token,
            baseline_market_cap,
            tracked = tokens.len(),
            "tracking token"
        );
        true
    }

    pub fn remove(&self, token: &str) -> Option<TrackedToken> {
        self.lock().remove(token)
    }

    pub fn get(&self, token: &str) -> Option<TrackedToken> {
        self.lock().get(token).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn run_cycle(&self) -> CycleSummary {
        let snapshot: Vec<(String, TrackedToken)> = self
            .lock()
            .iter()
            .map(|(token, tracked)| (token.clone(), tracked.clone()))
            .collect();
        let mut summary = CycleSummary::default();
        let mut updates = Vec::with_capacity(snapshot.len());

        for (index, (token, mut tracked)) in snapshot.into_iter().enumerate() {
            if index > 0 && !self.settings.inter_token_delay.is_zero() {
                time::sleep(self.settings.inter_token_delay).await;
            }
            summary.checked += 1;
            let result = match self.validator.validate(&token).await {
                Ok(result) => result,
                Err(error) => {
                    warn!(token = %token, error = %error, "tracker revalidation failed");
                    summary.skipped += 1;
                    continue;
                }
            };
            if !result.market_cap.is_finite() || result.market_cap <= 0.0 {
                debug!(token = %token, "tracker got no market cap, skipping");
                summary.skipped += 1;
                continue;
            }

            tracked.highest_market_cap_seen =
                tracked.highest_market_cap_seen.max(result.market_cap);
            let level = tracked.ath_multiplier().floor() as u32;
            if level > tracked.last_notified_level && level >= self.settings.min_milestone_level {
                let update = MilestoneUpdate {
                    token: token.clone(),
                    display_name: result.display_name().to_string(),
                    level,
                    multiplier: tracked.ath_multiplier(),
                    baseline_market_cap: tracked.baseline_market_cap,
                    highest_market_cap: tracked.highest_market_cap_seen,
                };
                info!(
                    token = %token,
                    level,
                    highest_market_cap = tracked.highest_market_cap_seen,
                    "milestone reached"
                );
                let message = milestone_text(&update);
                if let Err(error) = self.notifier.send_milestone_update(&message).await {
                    warn!(token = %token, error = %error, "milestone notification failed");
                }
                tracked.last_notified_level = level;
                summary.milestones += 1;
            }
            updates.push((token, tracked));
        }

        summary.evicted = self.commit(updates, Utc::now());
        summary
    }

    /// Applies cycle results to tokens that are still tracked under the same
    /// registration, then drops tokens past the age limit.
    fn commit(&self, updates: Vec<(String, TrackedToken)>, now: DateTime<Utc>) -> usize {
        let mut tokens = self.lock();
        for (token, updated) in updates {
            let Some(current) = tokens.get_mut(&token) else {
                continue;
            };
            if current.added_at != updated.added_at {
                debug!(token = %token, "token re-registered during cycle, dropping stale update");
                continue;
            }
            current.highest_market_cap_seen = current
                .highest_market_cap_seen
                .max(updated.highest_market_cap_seen);
            current.last_notified_level = current
                .last_notified_level
                .max(updated.last_notified_level);
        }
        let Some(max_age) = self.settings.max_tracked_age else {
            return 0;
        };
        let before = tokens.len();
        tokens.retain(|token, tracked| {
            let keep = now - tracked.added_at <= max_age;
            if !keep {
                info!(token = %token, "tracker evicted token past age limit");
            }
            keep
        });
        before - tokens.len()
    }

    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.is_empty() {
                        continue;
                    }
                    let summary = self.run_cycle().await;
                    info!(
                        checked = summary.checked,
                        skipped = summary.skipped,
                        milestones = summary.milestones,
                        evicted = summary.evicted,
                        tracked = self.len(),
                        "tracker cycle complete"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("tracker stopping");
                        return;
                    }
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TrackedToken>> {
        self.tokens
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
