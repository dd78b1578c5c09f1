use chrono::{DateTime, Utc};
use mintwatch_core_types::ValidationResult;

#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneUpdate {
    pub token: String,
    pub display_name: String,
    pub level: u32,
    pub multiplier: f64,
    pub baseline_market_cap: f64,
    pub highest_market_cap: f64,
}

pub fn format_usd(value: f64) -> String {
    let value = if value.is_finite() { value.max(0.0) } else { 0.0 };
    if value >= 1_000_000_000.0 {
        format!("${:.2}B", value / 1_000_000_000.0)
    } else if value >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${value:.0}")
    }
}

pub fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - created_at).num_minutes().max(0);
    let (days, hours, minutes) = (minutes / 1_440, (minutes % 1_440) / 60, minutes % 60);
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Unescaped signal body; transports apply their own markup escaping.
pub fn signal_text(token: &str, result: &ValidationResult, now: DateTime<Utc>) -> String {
    let mut lines = Vec::new();
    if result.token_symbol.is_empty() {
        lines.push(format!("New signal: {}", result.display_name()));
    } else {
        lines.push(format!(
            "New signal: {} ({})",
            result.display_name(),
            result.token_symbol
        ));
    }
    lines.push(format!("Mint: {token}"));
    lines.push(format!("Market cap: {}", format_usd(result.market_cap)));
    lines.push(format!("Liquidity: {}", format_usd(result.liquidity_usd)));
    lines.push(format!(
        "Volume 5m / 1h: {} / {}",
        format_usd(result.volume_5m),
        format_usd(result.volume_1h)
    ));
    lines.push(format!(
        "Txns 5m: {} ({} buys / {} sells)",
        result.txns_5m, result.txns_5m_buys, result.txns_5m_sells
    ));
    lines.push(format!(
        "Txns 1h: {} ({} buys / {} sells)",
        result.txns_1h, result.txns_1h_buys, result.txns_1h_sells
    ));
    if let Some(created_at) = result.pair_created_at {
        lines.push(format!("Pair age: {}", format_age(created_at, now)));
    }
    for (label, url) in [
        ("Website", &result.website_url),
        ("Twitter", &result.twitter_url),
        ("Telegram", &result.telegram_url),
    ] {
        if !url.is_empty() {
            lines.push(format!("{label}: {url}"));
        }
    }
    for (kind, url) in &result.other_socials {
        lines.push(format!("{}: {url}", capitalize(kind)));
    }
    if !result.pair_address.is_empty() {
        lines.push(format!(
            "Chart: https://dexscreener.com/solana/{}",
            result.pair_address
        ));
    }
    lines.join("\n")
}

pub fn milestone_text(update: &MilestoneUpdate) -> String {
    format!(
        "{} hit {}x\nMint: {}\nBaseline market cap: {}\nNew high: {} ({:.2}x)",
        update.display_name,
        update.level,
        update.token,
        format_usd(update.baseline_market_cap),
        format_usd(update.highest_market_cap),
        update.multiplier
    )
}

fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
