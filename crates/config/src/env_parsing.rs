use anyhow::{anyhow, Result};
use std::env;
use std::str::FromStr;

use super::AppConfig;

pub(crate) const TRIGGER_MODES: &[&str] = &["first_seen", "volume"];
pub(crate) const NOTIFIER_MODES: &[&str] = &["log", "telegram"];
pub(crate) const MAX_COOLDOWN_SECONDS: u64 = 24 * 60 * 60;

pub(crate) fn parse_env_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Reads `key` and parses it. Unset means `Ok(None)`; a value that does not
/// parse is an error naming the variable rather than a silent fallback.
pub(crate) fn parse_env_number<T: FromStr>(key: &str) -> Result<Option<T>> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|_| anyhow!("{key} contains invalid numeric value: {trimmed}"))
}

pub(crate) fn normalize_mode(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

pub(crate) fn validate_config(config: &AppConfig) -> Result<()> {
    let criteria = &config.criteria;
    if criteria.min_market_cap_usd > criteria.max_market_cap_usd {
        return Err(anyhow!(
            "criteria.min_market_cap_usd ({}) exceeds criteria.max_market_cap_usd ({})",
            criteria.min_market_cap_usd,
            criteria.max_market_cap_usd
        ));
    }
    if !(criteria.imbalance_max_ratio > 0.5 && criteria.imbalance_max_ratio <= 1.0) {
        return Err(anyhow!(
            "criteria.imbalance_max_ratio must be in (0.5, 1.0], got {}",
            criteria.imbalance_max_ratio
        ));
    }
    for (name, value) in [
        ("criteria.min_liquidity_usd", criteria.min_liquidity_usd),
        ("criteria.min_volume_5m_usd", criteria.min_volume_5m_usd),
        ("criteria.min_volume_1h_usd", criteria.min_volume_1h_usd),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(anyhow!("{name} must be a non-negative number, got {value}"));
        }
    }

    let market_data = &config.market_data;
    if !(market_data.rate_limit_per_second.is_finite() && market_data.rate_limit_per_second > 0.0)
    {
        return Err(anyhow!(
            "market_data.rate_limit_per_second must be positive, got {}",
            market_data.rate_limit_per_second
        ));
    }
    if market_data.max_attempts == 0 {
        return Err(anyhow!("market_data.max_attempts must be at least 1"));
    }
    if market_data.cooldown_seconds > MAX_COOLDOWN_SECONDS {
        return Err(anyhow!(
            "market_data.cooldown_seconds must be at most {MAX_COOLDOWN_SECONDS}, got {}",
            market_data.cooldown_seconds
        ));
    }
    if market_data.base_url.trim().is_empty() {
        return Err(anyhow!("market_data.base_url must not be empty"));
    }

    let trigger_mode = normalize_mode(&config.signals.trigger_mode);
    if !TRIGGER_MODES.contains(&trigger_mode.as_str()) {
        return Err(anyhow!(
            "signals.trigger_mode={} is not supported (expected one of {})",
            config.signals.trigger_mode,
            TRIGGER_MODES.join(", ")
        ));
    }
    if trigger_mode == "volume" && config.volume.native_usd_price <= 0.0 {
        return Err(anyhow!(
            "volume.native_usd_price must be positive when signals.trigger_mode=volume"
        ));
    }

    let notifier_mode = normalize_mode(&config.notifier.mode);
    if !NOTIFIER_MODES.contains(&notifier_mode.as_str()) {
        return Err(anyhow!(
            "notifier.mode={} is not supported (expected one of {})",
            config.notifier.mode,
            NOTIFIER_MODES.join(", ")
        ));
    }
    if notifier_mode == "telegram"
        && (config.notifier.telegram_bot_token.trim().is_empty()
            || config.notifier.telegram_chat_id.trim().is_empty())
    {
        return Err(anyhow!(
            "notifier.mode=telegram requires telegram_bot_token and telegram_chat_id (check MINTWATCH_TELEGRAM_BOT_TOKEN / MINTWATCH_TELEGRAM_CHAT_ID)"
        ));
    }

    Ok(())
}
