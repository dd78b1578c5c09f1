mod dedup;
pub mod messages;
mod notifier;
mod telegram;
mod tracker;
mod volume_cache;

#[cfg(test)]
mod test_support;

pub use dedup::DedupCache;
pub use messages::MilestoneUpdate;
pub use notifier::{Notifier, NotifyError, TracingNotifier};
pub use telegram::{escape_markdown_v2, TelegramNotifier};
pub use tracker::{CycleSummary, ProgressTracker, TrackerSettings};
pub use volume_cache::VolumeCache;

use anyhow::{anyhow, Context, Result};
use messages::signal_text;
use chrono::Utc;
use mintwatch_config::AppConfig;
use mintwatch_core_types::ValidationResult;
use mintwatch_ingestion::{summarize_event, MintExtractor};
use mintwatch_market_data::http_utils::is_http_url;
use mintwatch_market_data::{ImageResolver, TokenValidator};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Validate a token the first time any event references it.
    FirstSeen,
    /// Aggregate trade value and validate once a token crosses the volume
    /// threshold.
    Volume,
}

impl TriggerMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "first_seen" => Some(Self::FirstSeen),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstSeen => "first_seen",
            Self::Volume => "volume",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SignalDropReason {
    NoToken,
    NoTrade,
    Duplicate,
    NotFound,
    Rejected,
}

impl SignalDropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoToken => "no_token",
            Self::NoTrade => "no_trade",
            Self::Duplicate => "duplicate",
            Self::NotFound => "not_found",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Notified { token: String, tracked: bool },
    VolumeRecorded { token: String, usd: f64 },
    Dropped(SignalDropReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub notified: usize,
    pub recorded: usize,
    pub dropped: usize,
    pub failed: usize,
}

impl BatchSummary {
    fn absorb(&mut self, outcome: &Result<SignalOutcome>) {
        self.processed += 1;
        match outcome {
            Ok(SignalOutcome::Notified { .. }) => self.notified += 1,
            Ok(SignalOutcome::VolumeRecorded { .. }) => self.recorded += 1,
            Ok(SignalOutcome::Dropped(_)) => self.dropped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub tracked_tokens: usize,
    pub volume_entries: usize,
    pub dedup_entries: usize,
}

pub struct SignalDeps {
    pub validator: Arc<dyn TokenValidator>,
    pub notifier: Arc<dyn Notifier>,
    pub images: Arc<dyn ImageResolver>,
}

/// Turns webhook events into validated signals: extract, deduplicate,
/// validate, notify, then hand passing tokens to the progress tracker.
pub struct SignalService {
    extractor: MintExtractor,
    trigger_mode: TriggerMode,
    volume_threshold_usd: f64,
    native_usd_price: f64,
    dedup: Arc<DedupCache>,
    volume: Arc<VolumeCache>,
    tracker: Arc<ProgressTracker>,
    validator: Arc<dyn TokenValidator>,
    notifier: Arc<dyn Notifier>,
    images: Arc<dyn ImageResolver>,
    drop_counts: Mutex<BTreeMap<&'static str, u64>>,
}

impl SignalService {
    pub fn from_config(config: &AppConfig, deps: SignalDeps) -> Result<Self> {
        let trigger_mode = TriggerMode::parse(&config.signals.trigger_mode).ok_or_else(|| {
            anyhow!(
                "unknown signals.trigger_mode {:?}",
                config.signals.trigger_mode
            )
        })?;
        let dedup_retention = (config.dedup.retention_seconds > 0)
            .then(|| Duration::from_secs(config.dedup.retention_seconds));
        let tracker = ProgressTracker::new(
            TrackerSettings::from(&config.tracker),
            Arc::clone(&deps.validator),
            Arc::clone(&deps.notifier),
        );
        Ok(Self {
            extractor: MintExtractor::new(config.signals.native_mint.trim()),
            trigger_mode,
            volume_threshold_usd: config.volume.threshold_usd,
            native_usd_price: config.volume.native_usd_price,
            dedup: Arc::new(DedupCache::new(dedup_retention)),
            volume: Arc::new(VolumeCache::new(Duration::from_secs(
                config.volume.retention_seconds.max(1),
            ))),
            tracker: Arc::new(tracker),
            validator: deps.validator,
            notifier: deps.notifier,
            images: deps.images,
            drop_counts: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.trigger_mode
    }

    pub fn dedup(&self) -> &Arc<DedupCache> {
        &self.dedup
    }

    pub fn volume(&self) -> &Arc<VolumeCache> {
        &self.volume
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn validator(&self) -> &Arc<dyn TokenValidator> {
        &self.validator
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            tracked_tokens: self.tracker.len(),
            volume_entries: self.volume.len(),
            dedup_entries: self.dedup.len(),
        }
    }

    pub async fn handle_event(&self, event: &Value) -> Result<SignalOutcome> {
        let outcome = match self.trigger_mode {
            TriggerMode::FirstSeen => self.handle_first_seen(event).await,
            TriggerMode::Volume => Ok(self.record_volume(event)),
        };
        if let Ok(SignalOutcome::Dropped(reason)) = &outcome {
            self.count_drop(*reason);
            debug!(
                signature = summarize_event(event),
                reason = reason.as_str(),
                "event dropped"
            );
        }
        outcome
    }

    /// Processes every event even when some fail; the first failure is
    /// returned once the whole batch has been seen.
    pub async fn handle_batch(&self, events: &[Value]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut first_error = None;
        for event in events {
            let outcome = self.handle_event(event).await;
            summary.absorb(&outcome);
            if let Err(error) = outcome {
                warn!(
                    signature = summarize_event(event),
                    error = %error,
                    "event processing failed"
                );
                first_error.get_or_insert(error);
            }
        }
        info!(
            processed = summary.processed,
            notified = summary.notified,
            recorded = summary.recorded,
            dropped = summary.dropped,
            failed = summary.failed,
            "webhook batch processed"
        );
        match first_error {
            Some(error) => Err(error),
            None => Ok(summary),
        }
    }

    /// Validates every token whose aggregated volume crossed the threshold.
    /// A token leaves the volume cache once validation reached a decision;
    /// on error it stays for the next cycle.
    pub async fn run_volume_cycle(&self) -> Result<BatchSummary> {
        let candidates = self.volume.snapshot_above_threshold(self.volume_threshold_usd);
        let mut summary = BatchSummary::default();
        let mut first_error = None;
        for (token, total_usd) in candidates {
            debug!(token = %token, total_usd, "volume threshold crossed");
            let outcome = if self.dedup.try_claim(&token) {
                self.validate_claimed(&token).await
            } else {
                Ok(SignalOutcome::Dropped(SignalDropReason::Duplicate))
            };
            summary.absorb(&outcome);
            match outcome {
                Ok(SignalOutcome::Dropped(reason)) => {
                    self.count_drop(reason);
                    self.volume.remove(&token);
                }
                Ok(_) => {
                    self.volume.remove(&token);
                }
                Err(error) => {
                    warn!(token = %token, error = %error, "volume candidate validation failed");
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(summary),
        }
    }

    pub fn drain_drop_counts(&self) -> BTreeMap<&'static str, u64> {
        let mut counts = self
            .drop_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *counts)
    }

    async fn handle_first_seen(&self, event: &Value) -> Result<SignalOutcome> {
        let Some(token) = self.extractor.extract_token(event) else {
            return Ok(SignalOutcome::Dropped(SignalDropReason::NoToken));
        };
        if !self.dedup.try_claim(&token) {
            return Ok(SignalOutcome::Dropped(SignalDropReason::Duplicate));
        }
        self.validate_claimed(&token).await
    }

    fn record_volume(&self, event: &Value) -> SignalOutcome {
        let Some(trade) = self.extractor.extract_trade(event) else {
            let reason = if self.extractor.extract_token(event).is_some() {
                SignalDropReason::NoTrade
            } else {
                SignalDropReason::NoToken
            };
            return SignalOutcome::Dropped(reason);
        };
        let usd = trade.native_amount * self.native_usd_price;
        self.volume.record_trade(&trade.token, usd);
        debug!(token = %trade.token, usd, "trade recorded");
        SignalOutcome::VolumeRecorded {
            token: trade.token,
            usd,
        }
    }

    /// Caller holds the dedup claim for `token`. The claim is given back
    /// when validation itself fails.
    async fn validate_claimed(&self, token: &str) -> Result<SignalOutcome> {
        let result = match self.validator.validate(token).await {
            Ok(result) => result,
            Err(error) => {
                self.dedup.release(token);
                return Err(anyhow::Error::new(error))
                    .with_context(|| format!("failed validating token {token}"));
            }
        };

        if !result.is_valid {
            let reason = if result.is_absent() {
                SignalDropReason::NotFound
            } else {
                SignalDropReason::Rejected
            };
            info!(
                token = %token,
                reasons = ?result.fail_reasons,
                "token failed validation"
            );
            return Ok(SignalOutcome::Dropped(reason));
        }

        self.notify(token, &result).await;
        let tracked = result.market_cap > 0.0
            && self.tracker.register(token, result.market_cap, Utc::now());
        Ok(SignalOutcome::Notified {
            token: token.to_string(),
            tracked,
        })
    }

    async fn notify(&self, token: &str, result: &ValidationResult) {
        let image_url = self
            .images
            .resolve_image_url(token)
            .await
            .filter(|url| is_http_url(url))
            .or_else(|| {
                let fallback = result.image_url.trim();
                is_http_url(fallback).then(|| fallback.to_string())
            });
        let message = signal_text(token, result, Utc::now());
        let sent = match image_url.as_deref() {
            Some(url) => self.notifier.send_photo_signal(url, &message).await,
            None => self.notifier.send_text_signal(&message).await,
        };
        match sent {
            Ok(()) => info!(
                token = %token,
                name = result.display_name(),
                market_cap = result.market_cap,
                "signal sent"
            ),
            Err(error) => warn!(token = %token, error = %error, "signal notification failed"),
        }
    }

    fn count_drop(&self, reason: SignalDropReason) {
        let mut counts = self
            .drop_counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *counts.entry(reason.as_str()).or_insert(0) += 1;
    }
}
