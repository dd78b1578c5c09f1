use crate::cooldown::CooldownGate;
use crate::criteria::CriteriaEngine;
use crate::http_utils::{backoff_delay, classify_request_error, parse_retry_after};
use crate::pair::PairRecord;
use crate::rate_limit::{LimiterTimeout, TokenBucketLimiter};
use crate::TokenValidator;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mintwatch_config::MarketDataConfig;
use mintwatch_core_types::{ValidationResult, REASON_NOT_FOUND, REASON_NO_PAIRS};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("market data request failed ({kind}): {message}")]
    Transport { kind: &'static str, message: String },
    #[error("market data returned unexpected status {status}")]
    Status { status: u16 },
    #[error("market data rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error(transparent)]
    LimiterTimeout(#[from] LimiterTimeout),
    #[error("market data response could not be decoded: {0}")]
    Decode(String),
}

impl ValidationError {
    /// Whether the same token may succeed if validated again later.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::RateLimited { .. } => "rate_limited",
            Self::LimiterTimeout(_) => "limiter_timeout",
            Self::Decode(_) => "decode",
        }
    }
}

enum AttemptError {
    Retryable {
        error: ValidationError,
        delay: Duration,
    },
    Terminal(ValidationError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PairsPayload {
    List(Vec<PairRecord>),
    Wrapped {
        #[serde(default)]
        pairs: Option<Vec<PairRecord>>,
    },
}

impl PairsPayload {
    fn into_pairs(self) -> Vec<PairRecord> {
        match self {
            Self::List(pairs) => pairs,
            Self::Wrapped { pairs } => pairs.unwrap_or_default(),
        }
    }
}

pub struct MarketDataClient {
    http: reqwest::Client,
    base_url: String,
    criteria: CriteriaEngine,
    limiter: TokenBucketLimiter,
    cooldown: Arc<CooldownGate>,
    max_attempts: u32,
    retry_base: Duration,
    retry_after_cap: Duration,
    limiter_wait_timeout: Duration,
    cooldown_duration: Duration,
}

impl MarketDataClient {
    pub fn new(
        config: &MarketDataConfig,
        criteria: CriteriaEngine,
        cooldown: Arc<CooldownGate>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed building market data http client")?;
        let limiter =
            TokenBucketLimiter::new(config.rate_limit_per_second, config.rate_limit_burst)
                .ok_or_else(|| {
                    anyhow!(
                        "market_data.rate_limit_per_second must be > 0 (got {})",
                        config.rate_limit_per_second
                    )
                })?;
        Ok(Self {
            http,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            criteria,
            limiter,
            cooldown,
            max_attempts: config.max_attempts.max(1),
            retry_base: Duration::from_millis(config.retry_base_ms),
            retry_after_cap: Duration::from_millis(config.retry_after_cap_ms),
            limiter_wait_timeout: Duration::from_millis(config.limiter_wait_timeout_ms),
            cooldown_duration: Duration::from_secs(config.cooldown_seconds),
        })
    }

    pub fn cooldown(&self) -> &Arc<CooldownGate> {
        &self.cooldown
    }

    fn pair_url(&self, token: &str) -> String {
        format!("{}/{}", self.base_url, token.trim())
    }

    pub async fn fetch_validation(&self, token: &str) -> Result<ValidationResult, ValidationError> {
        let url = self.pair_url(token);
        let mut attempt: u32 = 0;
        loop {
            self.cooldown.wait().await;
            self.limiter.acquire_within(self.limiter_wait_timeout).await?;

            match self.attempt_once(&url, attempt).await {
                Ok(result) => return Ok(result),
                Err(AttemptError::Terminal(error)) => return Err(error),
                Err(AttemptError::Retryable { error, delay }) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        if matches!(error, ValidationError::RateLimited { .. }) {
                            self.cooldown.arm(self.cooldown_duration);
                        }
                        warn!(
                            token,
                            attempts = attempt,
                            error = %error,
                            "market data retries exhausted"
                        );
                        return Err(error);
                    }
                    debug!(
                        token,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying market data request"
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        url: &str,
        attempt: u32,
    ) -> std::result::Result<ValidationResult, AttemptError> {
        let backoff = backoff_delay(self.retry_base, attempt);
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(error) => {
                return Err(AttemptError::Retryable {
                    error: ValidationError::Transport {
                        kind: classify_request_error(&error),
                        message: error.to_string(),
                    },
                    delay: backoff,
                })
            }
        };

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(ValidationResult::rejected(REASON_NOT_FOUND));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let delay = parse_retry_after(&response)
                .map(|retry_after| retry_after.min(self.retry_after_cap))
                .unwrap_or(backoff);
            return Err(AttemptError::Retryable {
                error: ValidationError::RateLimited {
                    attempts: attempt + 1,
                },
                delay,
            });
        }
        if !status.is_success() {
            return Err(AttemptError::Retryable {
                error: ValidationError::Status {
                    status: status.as_u16(),
                },
                delay: backoff,
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(error) => {
                return Err(AttemptError::Retryable {
                    error: ValidationError::Transport {
                        kind: classify_request_error(&error),
                        message: error.to_string(),
                    },
                    delay: backoff,
                })
            }
        };
        let pairs = serde_json::from_slice::<PairsPayload>(&body)
            .map_err(|error| AttemptError::Terminal(ValidationError::Decode(error.to_string())))?
            .into_pairs();
        match pairs.first() {
            Some(pair) => Ok(self.criteria.evaluate(pair)),
            None => Ok(ValidationResult::rejected(REASON_NO_PAIRS)),
        }
    }
}

#[async_trait]
impl TokenValidator for MarketDataClient {
    async fn validate(&self, token: &str) -> Result<ValidationResult, ValidationError> {
        self.fetch_validation(token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mintwatch_config::CriteriaConfig;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    struct StubResponse {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    }

    impl StubResponse {
        fn json(status: u16, body: serde_json::Value) -> Self {
            Self {
                status,
                headers: Vec::new(),
                body: body.to_string(),
            }
        }

        fn rate_limited(retry_after: &str) -> Self {
            Self {
                status: 429,
                headers: vec![("Retry-After", retry_after.to_string())],
                body: String::new(),
            }
        }
    }

    /// Serves the given responses in order, one connection each, and returns
    /// the arrival time of every request.
    fn spawn_stub_server(
        responses: Vec<StubResponse>,
    ) -> Option<(String, thread::JoinHandle<Vec<Instant>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let addr = listener.local_addr().ok()?;
        let handle = thread::spawn(move || {
            let mut arrivals = Vec::new();
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                arrivals.push(Instant::now());
                let mut request_buf = [0u8; 8192];
                let _ = stream.read(&mut request_buf);
                let reason = match response.status {
                    200 => "OK",
                    404 => "Not Found",
                    429 => "Too Many Requests",
                    500 => "Internal Server Error",
                    _ => "Unknown",
                };
                let extra_headers: String = response
                    .headers
                    .iter()
                    .map(|(name, value)| format!("{name}: {value}\r\n"))
                    .collect();
                let raw = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.status,
                    reason,
                    extra_headers,
                    response.body.len(),
                    response.body
                );
                let _ = stream.write_all(raw.as_bytes());
                let _ = stream.flush();
            }
            arrivals
        });
        Some((format!("http://{addr}/token-pairs/v1/solana"), handle))
    }

    fn test_config(base_url: String) -> MarketDataConfig {
        MarketDataConfig {
            base_url,
            request_timeout_ms: 2_000,
            max_attempts: 3,
            retry_base_ms: 10,
            retry_after_cap_ms: 60_000,
            rate_limit_per_second: 100.0,
            rate_limit_burst: 10.0,
            limiter_wait_timeout_ms: 1_000,
            cooldown_seconds: 1,
        }
    }

    fn client_for(config: &MarketDataConfig) -> MarketDataClient {
        MarketDataClient::new(
            config,
            CriteriaEngine::new(CriteriaConfig::default()),
            Arc::new(CooldownGate::new()),
        )
        .expect("client")
    }

    fn healthy_pair() -> serde_json::Value {
        json!({
            "chainId": "solana",
            "pairAddress": "PairAddr",
            "baseToken": {"address": "Mint", "name": "Dog Coin", "symbol": "DOG"},
            "liquidity": {"usd": 40000.0},
            "marketCap": 250000.0,
            "volume": {"m5": 9000.0, "h1": 60000.0},
            "txns": {"m5": {"buys": 40, "sells": 30}, "h1": {"buys": 300, "sells": 220}},
            "info": {"imageUrl": "https://cdn.example/dog.png", "socials": [{"type": "twitter", "url": "https://x.com/dog"}]}
        })
    }

    #[tokio::test]
    async fn not_found_is_terminal_rejection() {
        let Some((url, handle)) =
            spawn_stub_server(vec![StubResponse::json(404, json!({"error": "nope"}))])
        else {
            return;
        };
        let client = client_for(&test_config(url));
        let result = client.validate("Mint").await.expect("404 is not an error");
        assert!(!result.is_valid);
        assert_eq!(result.fail_reasons, vec![REASON_NOT_FOUND.to_string()]);
        assert_eq!(handle.join().expect("stub").len(), 1);
    }

    #[tokio::test]
    async fn empty_pair_list_is_rejected_as_no_pairs() {
        let Some((url, handle)) = spawn_stub_server(vec![StubResponse::json(200, json!([]))])
        else {
            return;
        };
        let client = client_for(&test_config(url));
        let result = client.validate("Mint").await.expect("empty list");
        assert_eq!(result.fail_reasons, vec![REASON_NO_PAIRS.to_string()]);
        assert!(result.is_absent());
        handle.join().expect("stub");
    }

    #[tokio::test]
    async fn first_pair_is_evaluated() {
        let Some((url, handle)) = spawn_stub_server(vec![StubResponse::json(
            200,
            json!([healthy_pair(), {"pairAddress": "Second"}]),
        )]) else {
            return;
        };
        let client = client_for(&test_config(url));
        let result = client.validate("Mint").await.expect("valid pair");
        assert!(result.is_valid, "reasons: {:?}", result.fail_reasons);
        assert_eq!(result.pair_address, "PairAddr");
        assert_eq!(result.twitter_url, "https://x.com/dog");
        handle.join().expect("stub");
    }

    #[tokio::test]
    async fn wrapped_pairs_payload_is_accepted() {
        let Some((url, handle)) = spawn_stub_server(vec![StubResponse::json(
            200,
            json!({"schemaVersion": "1.0.0", "pairs": null}),
        )]) else {
            return;
        };
        let client = client_for(&test_config(url));
        let result = client.validate("Mint").await.expect("null pairs");
        assert_eq!(result.fail_reasons, vec![REASON_NO_PAIRS.to_string()]);
        handle.join().expect("stub");
    }

    #[tokio::test]
    async fn server_error_is_retried_then_succeeds() {
        let Some((url, handle)) = spawn_stub_server(vec![
            StubResponse::json(500, json!({})),
            StubResponse::json(200, json!([healthy_pair()])),
        ]) else {
            return;
        };
        let client = client_for(&test_config(url));
        let result = client.validate("Mint").await.expect("second attempt");
        assert!(result.is_valid);
        assert_eq!(handle.join().expect("stub").len(), 2);
        assert!(!client.cooldown().is_active());
    }

    #[tokio::test]
    async fn undecodable_body_is_terminal() {
        let Some((url, handle)) = spawn_stub_server(vec![StubResponse {
            status: 200,
            headers: Vec::new(),
            body: "<html>".to_string(),
        }]) else {
            return;
        };
        let client = client_for(&test_config(url));
        let error = client.validate("Mint").await.expect_err("decode error");
        assert!(matches!(error, ValidationError::Decode(_)));
        assert!(!error.is_retryable());
        assert_eq!(handle.join().expect("stub").len(), 1);
    }

    #[tokio::test]
    async fn exhausted_rate_limit_arms_cooldown_for_next_call() {
        let Some((url, handle)) = spawn_stub_server(vec![
            StubResponse::rate_limited("0"),
            StubResponse::rate_limited("0"),
            StubResponse::rate_limited("0"),
            StubResponse::json(404, json!({})),
        ]) else {
            return;
        };
        let client = client_for(&test_config(url));

        let error = client.validate("Mint").await.expect_err("rate limited");
        assert!(matches!(error, ValidationError::RateLimited { attempts: 3 }));
        assert!(error.is_retryable());
        assert!(client.cooldown().is_active());
        let cooldown_armed_at = Instant::now();

        let result = client.validate("Mint").await.expect("after cooldown");
        assert_eq!(result.fail_reasons, vec![REASON_NOT_FOUND.to_string()]);

        let arrivals = handle.join().expect("stub");
        assert_eq!(arrivals.len(), 4);
        let waited = arrivals[3].duration_since(cooldown_armed_at);
        assert!(
            waited >= Duration::from_millis(900),
            "request went out after {waited:?}, before the cooldown ended"
        );
    }

    #[tokio::test]
    async fn retry_after_is_honoured_up_to_the_cap() {
        let Some((url, handle)) = spawn_stub_server(vec![
            StubResponse::rate_limited("5"),
            StubResponse::json(404, json!({})),
        ]) else {
            return;
        };
        let mut config = test_config(url);
        config.retry_base_ms = 1;
        config.retry_after_cap_ms = 50;
        let client = client_for(&config);
        let result = client.validate("Mint").await.expect("second attempt");
        assert_eq!(result.fail_reasons, vec![REASON_NOT_FOUND.to_string()]);

        let arrivals = handle.join().expect("stub");
        assert_eq!(arrivals.len(), 2);
        let gap = arrivals[1].duration_since(arrivals[0]);
        assert!(gap >= Duration::from_millis(45), "retried after {gap:?}");
        assert!(gap < Duration::from_secs(2), "Retry-After not capped: {gap:?}");
        assert!(!client.cooldown().is_active());
    }

    #[tokio::test]
    async fn rate_limit_without_retry_after_uses_backoff() {
        let Some((url, handle)) = spawn_stub_server(vec![
            StubResponse::json(429, json!({})),
            StubResponse::json(404, json!({})),
        ]) else {
            return;
        };
        let mut config = test_config(url);
        config.retry_base_ms = 300;
        let client = client_for(&config);
        client.validate("Mint").await.expect("second attempt");

        let arrivals = handle.join().expect("stub");
        assert_eq!(arrivals.len(), 2);
        let gap = arrivals[1].duration_since(arrivals[0]);
        assert!(gap >= Duration::from_millis(290), "retried after {gap:?}");
        assert!(gap < Duration::from_secs(3), "retried after {gap:?}");
    }

    #[tokio::test]
    async fn transport_failure_exhausts_attempts() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let mut config = test_config(format!("http://{addr}"));
        config.max_attempts = 2;
        let client = client_for(&config);
        let error = client.validate("Mint").await.expect_err("connection refused");
        assert!(matches!(error, ValidationError::Transport { .. }));
        assert!(error.is_retryable());
        assert!(!client.cooldown().is_active());
    }
}
