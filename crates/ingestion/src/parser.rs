use crate::json::{array_field, number_field, path, str_field, Lookup};
use mintwatch_core_types::TradeObservation;
use serde_json::Value;
use tracing::debug;

const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

pub struct MintExtractor {
    native_mint: String,
}

impl MintExtractor {
    pub fn new(native_mint: impl Into<String>) -> Self {
        Self {
            native_mint: native_mint.into(),
        }
    }

    /// First non-native mint referenced by the event, looking at token
    /// transfers, then swap outputs, then swap inputs.
    pub fn extract_token(&self, event: &Value) -> Option<String> {
        if let Some(mint) =
            self.first_mint_in(array_field(event, "tokenTransfers"), "tokenTransfers")
        {
            return Some(mint);
        }

        let swap = match path(event, &["events", "swap"]) {
            Lookup::Present(swap) => swap,
            Lookup::WrongType => {
                debug!("webhook event has non-object events.swap");
                return None;
            }
            Lookup::Missing => return None,
        };
        if let Some(mint) =
            self.first_mint_in(array_field(swap, "tokenOutputs"), "events.swap.tokenOutputs")
        {
            return Some(mint);
        }
        self.first_mint_in(array_field(swap, "tokenInputs"), "events.swap.tokenInputs")
    }

    /// Token plus the native-asset size of the trade that referenced it.
    pub fn extract_trade(&self, event: &Value) -> Option<TradeObservation> {
        let token = self.extract_token(event)?;
        let native_amount = self
            .swap_native_amount(event)
            .or_else(|| self.wrapped_native_transfer_amount(event))?;
        if !native_amount.is_finite() || native_amount <= 0.0 {
            return None;
        }
        Some(TradeObservation {
            token,
            native_amount,
        })
    }

    fn first_mint_in(&self, entries: Lookup<&Vec<Value>>, source: &str) -> Option<String> {
        let entries = match entries {
            Lookup::Present(entries) => entries,
            Lookup::WrongType => {
                debug!(source, "webhook event field is not a list");
                return None;
            }
            Lookup::Missing => return None,
        };
        entries.iter().find_map(|entry| {
            let mint = str_field(entry, "mint").present()?.trim();
            if mint.is_empty() || mint == self.native_mint {
                return None;
            }
            Some(mint.to_string())
        })
    }

    fn swap_native_amount(&self, event: &Value) -> Option<f64> {
        let swap = path(event, &["events", "swap"]).present()?;
        ["nativeInput", "nativeOutput"].into_iter().find_map(|leg| {
            let leg_value = path(swap, &[leg]).present()?;
            let lamports = number_field(leg_value, "amount").present()?;
            (lamports > 0.0).then_some(lamports / LAMPORTS_PER_SOL)
        })
    }

    fn wrapped_native_transfer_amount(&self, event: &Value) -> Option<f64> {
        array_field(event, "tokenTransfers")
            .present()?
            .iter()
            .filter(|entry| str_field(entry, "mint").present() == Some(self.native_mint.as_str()))
            .filter_map(|entry| number_field(entry, "tokenAmount").present())
            .filter(|amount| amount.is_finite() && *amount > 0.0)
            .fold(None, |largest: Option<f64>, amount| {
                Some(largest.map_or(amount, |current| current.max(amount)))
            })
    }
}
