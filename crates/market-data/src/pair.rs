use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PairRecord {
    pub chain_id: String,
    pub dex_id: String,
    pub pair_address: String,
    pub base_token: PairToken,
    pub liquidity: Option<PairLiquidity>,
    pub market_cap: Option<f64>,
    pub fdv: Option<f64>,
    pub volume: PairVolume,
    pub txns: PairTxns,
    pub pair_created_at: Option<i64>,
    pub info: Option<PairInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairToken {
    pub address: String,
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairLiquidity {
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairVolume {
    pub m5: Option<f64>,
    pub h1: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct TxnWindow {
    pub buys: u64,
    pub sells: u64,
}

impl TxnWindow {
    pub fn total(&self) -> u64 {
        self.buys.saturating_add(self.sells)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairTxns {
    pub m5: TxnWindow,
    pub h1: TxnWindow,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PairInfo {
    pub image_url: Option<String>,
    pub websites: Vec<PairLink>,
    pub socials: Vec<PairSocial>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairSocial {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl PairRecord {
    pub fn liquidity_usd(&self) -> f64 {
        non_negative(self.liquidity.as_ref().and_then(|liquidity| liquidity.usd))
    }

    /// Market cap when reported, otherwise fully-diluted valuation.
    pub fn effective_market_cap(&self) -> f64 {
        let market_cap = non_negative(self.market_cap);
        if market_cap > 0.0 {
            return market_cap;
        }
        non_negative(self.fdv)
    }

    pub fn volume_5m(&self) -> f64 {
        non_negative(self.volume.m5)
    }

    pub fn volume_1h(&self) -> f64 {
        non_negative(self.volume.h1)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.pair_created_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

fn non_negative(value: Option<f64>) -> f64 {
    value
        .filter(|value| value.is_finite() && *value > 0.0)
        .unwrap_or(0.0)
}
