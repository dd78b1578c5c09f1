use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time;

#[derive(Debug, Error)]
#[error("rate limiter did not admit the request within {waited_ms}ms")]
pub struct LimiterTimeout {
    pub waited_ms: u64,
}

#[derive(Debug)]
struct TokenBucketState {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct TokenBucketLimiter {
    tokens_per_second: f64,
    burst: f64,
    state: AsyncMutex<TokenBucketState>,
}

impl TokenBucketLimiter {
    pub fn new(tokens_per_second: f64, burst: f64) -> Option<Self> {
        if !(tokens_per_second.is_finite() && tokens_per_second > 0.0) {
            return None;
        }
        let burst = if burst.is_finite() { burst.max(1.0) } else { 1.0 };
        Some(Self {
            tokens_per_second,
            burst,
            state: AsyncMutex::new(TokenBucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        })
    }

    pub async fn acquire(&self) {
        loop {
            let wait_duration = {
                let mut guard = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(guard.last_refill).as_secs_f64();
                if elapsed > 0.0 {
                    guard.tokens =
                        (guard.tokens + elapsed * self.tokens_per_second).min(self.burst);
                    guard.last_refill = now;
                }
                if guard.tokens >= 1.0 {
                    guard.tokens -= 1.0;
                    None
                } else {
                    let deficit = (1.0 - guard.tokens).max(0.0);
                    let wait_seconds = (deficit / self.tokens_per_second).max(0.001);
                    Some(Duration::from_secs_f64(wait_seconds))
                }
            };
            if let Some(wait) = wait_duration {
                time::sleep(wait).await;
                continue;
            }
            return;
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`. A
    /// timed-out caller consumes no token.
    pub async fn acquire_within(&self, timeout: Duration) -> Result<(), LimiterTimeout> {
        time::timeout(timeout, self.acquire())
            .await
            .map_err(|_| LimiterTimeout {
                waited_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
            })
    }
}
