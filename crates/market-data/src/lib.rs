mod assets;
mod client;
mod cooldown;
mod criteria;
pub mod http_utils;
mod pair;
mod rate_limit;

pub use assets::{image_from_asset, HeliusAssetResolver, ImageResolver, NoopImageResolver};
pub use client::{MarketDataClient, ValidationError};
pub use cooldown::CooldownGate;
pub use criteria::CriteriaEngine;
pub use pair::{
    PairInfo, PairLink, PairLiquidity, PairRecord, PairSocial, PairToken, PairTxns, PairVolume,
    TxnWindow,
};
pub use rate_limit::{LimiterTimeout, TokenBucketLimiter};

use async_trait::async_trait;
use mintwatch_core_types::ValidationResult;

/// Market check for a single token. Not-found and no-pairs outcomes are
/// `Ok` with `is_valid == false`; `Err` means the check itself failed.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<ValidationResult, ValidationError>;
}
