use crate::pair::{PairRecord, TxnWindow};
use mintwatch_config::CriteriaConfig;
use mintwatch_core_types::ValidationResult;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct CriteriaEngine {
    config: CriteriaConfig,
}

impl CriteriaEngine {
    pub fn new(config: CriteriaConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(&self, pair: &PairRecord) -> ValidationResult {
        let mut result = snapshot_from_pair(pair);
        result.fail_reasons = self.fail_reasons(&result);
        result.is_valid = result.fail_reasons.is_empty();
        result
    }

    fn fail_reasons(&self, snapshot: &ValidationResult) -> Vec<String> {
        let cfg = &self.config;

        // Hard disqualifiers short-circuit the range filters.
        if snapshot.liquidity_usd <= 0.0 {
            return vec!["no liquidity".to_string()];
        }
        let imbalance: Vec<String> = [
            (
                "5m",
                TxnWindow {
                    buys: snapshot.txns_5m_buys,
                    sells: snapshot.txns_5m_sells,
                },
            ),
            (
                "1h",
                TxnWindow {
                    buys: snapshot.txns_1h_buys,
                    sells: snapshot.txns_1h_sells,
                },
            ),
        ]
        .into_iter()
        .filter_map(|(label, window)| self.imbalance_reason(label, window))
        .collect();
        if !imbalance.is_empty() {
            return imbalance;
        }

        let mut reasons = Vec::new();
        if snapshot.liquidity_usd < cfg.min_liquidity_usd {
            reasons.push(format!(
                "liquidity ${:.0} below minimum ${:.0}",
                snapshot.liquidity_usd, cfg.min_liquidity_usd
            ));
        }
        if snapshot.market_cap < cfg.min_market_cap_usd {
            reasons.push(format!(
                "market cap ${:.0} below minimum ${:.0}",
                snapshot.market_cap, cfg.min_market_cap_usd
            ));
        } else if snapshot.market_cap > cfg.max_market_cap_usd {
            reasons.push(format!(
                "market cap ${:.0} above maximum ${:.0}",
                snapshot.market_cap, cfg.max_market_cap_usd
            ));
        }
        if snapshot.volume_5m < cfg.min_volume_5m_usd {
            reasons.push(format!(
                "5m volume ${:.0} below minimum ${:.0}",
                snapshot.volume_5m, cfg.min_volume_5m_usd
            ));
        }
        if snapshot.volume_1h < cfg.min_volume_1h_usd {
            reasons.push(format!(
                "1h volume ${:.0} below minimum ${:.0}",
                snapshot.volume_1h, cfg.min_volume_1h_usd
            ));
        }
        if snapshot.txns_5m < cfg.min_txns_5m {
            reasons.push(format!(
                "5m transactions {} below minimum {}",
                snapshot.txns_5m, cfg.min_txns_5m
            ));
        }
        if snapshot.txns_1h < cfg.min_txns_1h {
            reasons.push(format!(
                "1h transactions {} below minimum {}",
                snapshot.txns_1h, cfg.min_txns_1h
            ));
        }
        reasons
    }

    fn imbalance_reason(&self, label: &str, window: TxnWindow) -> Option<String> {
        let total = window.total();
        if total == 0 || total < self.config.imbalance_min_txns {
            return None;
        }
        let buy_share = window.buys as f64 / total as f64;
        let sell_share = window.sells as f64 / total as f64;
        let threshold = self.config.imbalance_max_ratio;
        if buy_share > threshold {
            return Some(format!(
                "{label} buy/sell imbalance: {:.0}% buys over {} transactions",
                buy_share * 100.0,
                total
            ));
        }
        if sell_share > threshold {
            return Some(format!(
                "{label} buy/sell imbalance: {:.0}% sells over {} transactions",
                sell_share * 100.0,
                total
            ));
        }
        None
    }
}

fn snapshot_from_pair(pair: &PairRecord) -> ValidationResult {
    let mut result = ValidationResult {
        pair_address: pair.pair_address.clone(),
        token_name: pair.base_token.name.trim().to_string(),
        token_symbol: pair.base_token.symbol.trim().to_string(),
        liquidity_usd: pair.liquidity_usd(),
        market_cap: pair.effective_market_cap(),
        volume_5m: pair.volume_5m(),
        volume_1h: pair.volume_1h(),
        txns_5m: pair.txns.m5.total(),
        txns_1h: pair.txns.h1.total(),
        txns_5m_buys: pair.txns.m5.buys,
        txns_5m_sells: pair.txns.m5.sells,
        txns_1h_buys: pair.txns.h1.buys,
        txns_1h_sells: pair.txns.h1.sells,
        pair_created_at: pair.created_at(),
        ..ValidationResult::default()
    };

    let Some(info) = pair.info.as_ref() else {
        return result;
    };
    result.image_url = info.image_url.clone().unwrap_or_default();
    if let Some(website) = info.websites.iter().find(|site| !site.url.trim().is_empty()) {
        result.website_url = website.url.trim().to_string();
    }
    let mut other_socials = BTreeMap::new();
    for social in &info.socials {
        let url = social.url.trim();
        if url.is_empty() {
            continue;
        }
        match social.kind.trim().to_ascii_lowercase().as_str() {
            "twitter" | "x" if result.twitter_url.is_empty() => {
                result.twitter_url = url.to_string();
            }
            "telegram" if result.telegram_url.is_empty() => {
                result.telegram_url = url.to_string();
            }
            kind => {
                let key = if kind.is_empty() { "other" } else { kind };
                other_socials
                    .entry(key.to_string())
                    .or_insert_with(|| url.to_string());
            }
        }
    }
    result.other_socials = other_socials;
    result
}
