use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::env_parsing::{normalize_mode, parse_env_bool, parse_env_number, validate_config};
use super::AppConfig;

pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&raw)
        .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
    Ok(cfg)
}

pub fn load_from_env_or_default(default_path: &Path) -> Result<(AppConfig, PathBuf)> {
    let configured = env::var("MINTWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_path.to_path_buf());
    let mut config = load_from_path(&configured)?;
    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok((config, configured))
}

fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Ok(log_level) = env::var("MINTWATCH_LOG_LEVEL") {
        let trimmed = log_level.trim();
        if !trimmed.is_empty() {
            config.system.log_level = trimmed.to_string();
        }
    }
    if let Some(log_json) = env::var("MINTWATCH_LOG_JSON").ok().and_then(parse_env_bool) {
        config.system.log_json = log_json;
    }

    if let Ok(host) = env::var("MINTWATCH_WEBHOOK_HOST") {
        config.webhook.host = host;
    }
    if let Some(port) = parse_env_number::<u16>("MINTWATCH_WEBHOOK_PORT")? {
        config.webhook.port = port;
    }
    if let Ok(auth_header) = env::var("MINTWATCH_WEBHOOK_AUTH_HEADER") {
        config.webhook.auth_header = auth_header;
    }

    if let Ok(base_url) = env::var("MINTWATCH_MARKET_DATA_BASE_URL") {
        config.market_data.base_url = base_url.trim().trim_end_matches('/').to_string();
    }
    if let Some(timeout_ms) = parse_env_number::<u64>("MINTWATCH_MARKET_DATA_REQUEST_TIMEOUT_MS")? {
        config.market_data.request_timeout_ms = timeout_ms;
    }
    if let Some(max_attempts) = parse_env_number::<u32>("MINTWATCH_MARKET_DATA_MAX_ATTEMPTS")? {
        config.market_data.max_attempts = max_attempts;
    }
    if let Some(rps) = parse_env_number::<f64>("MINTWATCH_MARKET_DATA_RATE_LIMIT_PER_SECOND")? {
        config.market_data.rate_limit_per_second = rps;
    }
    if let Some(burst) = parse_env_number::<f64>("MINTWATCH_MARKET_DATA_RATE_LIMIT_BURST")? {
        config.market_data.rate_limit_burst = burst;
    }
    if let Some(cooldown) = parse_env_number::<u64>("MINTWATCH_MARKET_DATA_COOLDOWN_SECONDS")? {
        config.market_data.cooldown_seconds = cooldown;
    }

    if let Some(value) = parse_env_number::<f64>("MINTWATCH_CRITERIA_MIN_LIQUIDITY_USD")? {
        config.criteria.min_liquidity_usd = value;
    }
    if let Some(value) = parse_env_number::<f64>("MINTWATCH_CRITERIA_MIN_MARKET_CAP_USD")? {
        config.criteria.min_market_cap_usd = value;
    }
    if let Some(value) = parse_env_number::<f64>("MINTWATCH_CRITERIA_MAX_MARKET_CAP_USD")? {
        config.criteria.max_market_cap_usd = value;
    }
    if let Some(value) = parse_env_number::<f64>("MINTWATCH_CRITERIA_MIN_VOLUME_5M_USD")? {
        config.criteria.min_volume_5m_usd = value;
    }
    if let Some(value) = parse_env_number::<f64>("MINTWATCH_CRITERIA_MIN_VOLUME_1H_USD")? {
        config.criteria.min_volume_1h_usd = value;
    }
    if let Some(value) = parse_env_number::<u64>("MINTWATCH_CRITERIA_MIN_TXNS_5M")? {
        config.criteria.min_txns_5m = value;
    }
    if let Some(value) = parse_env_number::<u64>("MINTWATCH_CRITERIA_MIN_TXNS_1H")? {
        config.criteria.min_txns_1h = value;
    }

    if let Ok(mode) = env::var("MINTWATCH_SIGNALS_TRIGGER_MODE") {
        let normalized = normalize_mode(&mode);
        if !normalized.is_empty() {
            config.signals.trigger_mode = normalized;
        }
    }
    if let Some(enabled) = env::var("MINTWATCH_TRACKER_ENABLED")
        .ok()
        .and_then(parse_env_bool)
    {
        config.tracker.enabled = enabled;
    }
    if let Some(interval) = parse_env_number::<u64>("MINTWATCH_TRACKER_INTERVAL_SECONDS")? {
        config.tracker.interval_seconds = interval;
    }
    if let Some(max_tokens) = parse_env_number::<usize>("MINTWATCH_TRACKER_MAX_TRACKED_TOKENS")? {
        config.tracker.max_tracked_tokens = max_tokens;
    }
    if let Some(threshold) = parse_env_number::<f64>("MINTWATCH_VOLUME_THRESHOLD_USD")? {
        config.volume.threshold_usd = threshold;
    }
    if let Some(price) = parse_env_number::<f64>("MINTWATCH_VOLUME_NATIVE_USD_PRICE")? {
        config.volume.native_usd_price = price;
    }

    if let Ok(mode) = env::var("MINTWATCH_NOTIFIER_MODE") {
        let normalized = normalize_mode(&mode);
        if !normalized.is_empty() {
            config.notifier.mode = normalized;
        }
    }
    if let Ok(token) = env::var("MINTWATCH_TELEGRAM_BOT_TOKEN") {
        config.notifier.telegram_bot_token = token.trim().to_string();
    }
    if let Ok(chat_id) = env::var("MINTWATCH_TELEGRAM_CHAT_ID") {
        config.notifier.telegram_chat_id = chat_id.trim().to_string();
    }
    if let Ok(http_url) = env::var("MINTWATCH_HELIUS_HTTP_URL") {
        config.assets.helius_http_url = http_url;
    }

    Ok(())
}
