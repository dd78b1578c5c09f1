use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

pub const REASON_NOT_FOUND: &str = "not found";
pub const REASON_NO_PAIRS: &str = "no trading pairs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub correlation_id: Uuid,
    pub source_component: String,
    pub ts_utc: DateTime<Utc>,
    pub payload: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(source_component: impl Into<String>, payload: T) -> Self {
        let correlation_id = Uuid::new_v4();
        Self {
            event_id: Uuid::new_v4(),
            correlation_id,
            source_component: source_component.into(),
            ts_utc: Utc::now(),
            payload,
        }
    }
}

/// Point-in-time market check for a single token. Built once per validation
/// call and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub fail_reasons: Vec<String>,
    pub pair_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub liquidity_usd: f64,
    pub market_cap: f64,
    pub volume_5m: f64,
    pub volume_1h: f64,
    pub txns_5m: u64,
    pub txns_1h: u64,
    pub txns_5m_buys: u64,
    pub txns_5m_sells: u64,
    pub txns_1h_buys: u64,
    pub txns_1h_sells: u64,
    pub website_url: String,
    pub twitter_url: String,
    pub telegram_url: String,
    pub other_socials: BTreeMap<String, String>,
    pub image_url: String,
    pub pair_created_at: Option<DateTime<Utc>>,
}

impl ValidationResult {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            fail_reasons: vec![reason.into()],
            ..Self::default()
        }
    }

    /// True for terminal "nothing to look at" outcomes such as an unknown
    /// mint or a mint without any pool.
    pub fn is_absent(&self) -> bool {
        !self.is_valid
            && self.fail_reasons.len() == 1
            && matches!(
                self.fail_reasons[0].as_str(),
                REASON_NOT_FOUND | REASON_NO_PAIRS
            )
    }

    pub fn display_name(&self) -> &str {
        if !self.token_name.is_empty() {
            &self.token_name
        } else if !self.token_symbol.is_empty() {
            &self.token_symbol
        } else {
            "unknown"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedToken {
    pub baseline_market_cap: f64,
    pub highest_market_cap_seen: f64,
    pub added_at: DateTime<Utc>,
    pub last_notified_level: u32,
}

impl TrackedToken {
    pub fn new(baseline_market_cap: f64, added_at: DateTime<Utc>) -> Self {
        Self {
            baseline_market_cap,
            highest_market_cap_seen: baseline_market_cap,
            added_at,
            last_notified_level: 0,
        }
    }

    pub fn ath_multiplier(&self) -> f64 {
        if self.baseline_market_cap <= 0.0 {
            return 0.0;
        }
        self.highest_market_cap_seen / self.baseline_market_cap
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeObservation {
    pub token: String,
    pub native_amount: f64,
}
