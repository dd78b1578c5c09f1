use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub system: SystemConfig,
    pub webhook: WebhookConfig,
    pub market_data: MarketDataConfig,
    pub criteria: CriteriaConfig,
    pub signals: SignalsConfig,
    pub tracker: TrackerConfig,
    pub volume: VolumeConfig,
    pub dedup: DedupConfig,
    pub notifier: NotifierConfig,
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub env: String,
    pub log_level: String,
    pub log_json: bool,
    pub drop_report_seconds: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            log_level: "info".to_string(),
            log_json: false,
            drop_report_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub host: String,
    pub port: u16,
    /// Expected value of the `Authorization` header sent by the webhook
    /// provider. Empty disables the check.
    pub auth_header: String,
    pub max_body_bytes: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            auth_header: String::new(),
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// Pair lookup endpoint; the mint address is appended as the last path
    /// segment.
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_after_cap_ms: u64,
    pub rate_limit_per_second: f64,
    pub rate_limit_burst: f64,
    pub limiter_wait_timeout_ms: u64,
    pub cooldown_seconds: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.dexscreener.com/token-pairs/v1/solana".to_string(),
            request_timeout_ms: 10_000,
            max_attempts: 3,
            retry_base_ms: 1_000,
            retry_after_cap_ms: 60_000,
            rate_limit_per_second: 4.7,
            rate_limit_burst: 5.0,
            limiter_wait_timeout_ms: 15_000,
            cooldown_seconds: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CriteriaConfig {
    pub min_liquidity_usd: f64,
    pub min_market_cap_usd: f64,
    pub max_market_cap_usd: f64,
    pub min_volume_5m_usd: f64,
    pub min_volume_1h_usd: f64,
    pub min_txns_5m: u64,
    pub min_txns_1h: u64,
    /// Minimum transactions in a window before the buy/sell imbalance check
    /// applies to it.
    pub imbalance_min_txns: u64,
    /// Share of one side above which a window counts as one-sided.
    pub imbalance_max_ratio: f64,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            min_liquidity_usd: 10_000.0,
            min_market_cap_usd: 50_000.0,
            max_market_cap_usd: 5_000_000.0,
            min_volume_5m_usd: 5_000.0,
            min_volume_1h_usd: 20_000.0,
            min_txns_5m: 50,
            min_txns_1h: 200,
            imbalance_min_txns: 20,
            imbalance_max_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SignalsConfig {
    /// `first_seen` validates a mint the first time an event references it;
    /// `volume` aggregates trade values and validates once a mint crosses
    /// `volume.threshold_usd`.
    pub trigger_mode: String,
    pub native_mint: String,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            trigger_mode: "first_seen".to_string(),
            native_mint: "So11111111111111111111111111111111111111112".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub inter_token_delay_ms: u64,
    pub min_milestone_level: u32,
    /// 0 keeps every tracked token.
    pub max_tracked_tokens: usize,
    /// 0 watches tokens indefinitely.
    pub max_tracked_age_hours: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 120,
            inter_token_delay_ms: 200,
            min_milestone_level: 2,
            max_tracked_tokens: 0,
            max_tracked_age_hours: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub threshold_usd: f64,
    pub check_interval_seconds: u64,
    pub sweep_interval_seconds: u64,
    pub retention_seconds: u64,
    /// Reference price used to convert native-asset trade legs to USD.
    pub native_usd_price: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            threshold_usd: 25_000.0,
            check_interval_seconds: 30,
            sweep_interval_seconds: 300,
            retention_seconds: 30 * 60,
            native_usd_price: 150.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// 0 keeps claims for the lifetime of the process.
    pub retention_seconds: u64,
    pub prune_interval_seconds: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            retention_seconds: 0,
            prune_interval_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    /// `log` or `telegram`.
    pub mode: String,
    pub telegram_api_url: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub send_attempts: u32,
    pub retry_base_ms: u64,
    /// Upper bound on a `retry_after` hint from the Bot API.
    pub retry_after_cap_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            mode: "log".to_string(),
            telegram_api_url: "https://api.telegram.org".to_string(),
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            send_attempts: 3,
            retry_base_ms: 500,
            retry_after_cap_ms: 30_000,
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Helius RPC endpoint used for DAS `getAsset`. Empty or placeholder
    /// disables the lookup.
    pub helius_http_url: String,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            helius_http_url: "https://mainnet.helius-rpc.com/?api-key=REPLACE_ME".to_string(),
            request_timeout_ms: 10_000,
            max_attempts: 2,
            retry_base_ms: 500,
        }
    }
}
