use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time;
use tracing::{debug, warn};

/// Upper bound on a single cooldown so the deadline never overflows `Instant`.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Process-wide pause on outbound market-data calls, armed after the upstream
/// keeps answering 429. The deadline only ever moves forward.
#[derive(Debug, Default)]
pub struct CooldownGate {
    until: Mutex<Option<Instant>>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extends the deadline to `now + duration` unless an equal or later
    /// deadline is already set. `duration` is clamped to [`MAX_COOLDOWN`].
    /// Returns the effective deadline.
    pub fn arm(&self, duration: Duration) -> Instant {
        let duration = duration.min(MAX_COOLDOWN);
        let now = Instant::now();
        let candidate = now.checked_add(duration).unwrap_or(now);
        let mut guard = self.until.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let effective = match *guard {
            Some(current) if current >= candidate => current,
            _ => candidate,
        };
        *guard = Some(effective);
        warn!(
            cooldown_ms = duration.as_millis() as u64,
            effective_remaining_ms = effective.saturating_duration_since(Instant::now()).as_millis()
                as u64,
            "market data cooldown armed"
        );
        effective
    }

    pub fn remaining(&self) -> Duration {
        let guard = self.until.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_active(&self) -> bool {
        !self.remaining().is_zero()
    }

    /// Sleeps until no cooldown is active, re-reading the deadline after each
    /// sleep in case another caller extended it meanwhile.
    pub async fn wait(&self) {
        loop {
            let remaining = self.remaining();
            if remaining.is_zero() {
                return;
            }
            debug!(
                remaining_ms = remaining.as_millis() as u64,
                "waiting out market data cooldown"
            );
            time::sleep(remaining).await;
        }
    }
}
