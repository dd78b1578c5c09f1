pub mod json;
mod parser;
mod payload;

pub use parser::MintExtractor;
pub use payload::{decode_webhook_payload, PayloadError};

use serde_json::Value;

/// Short identifier for log lines; Helius events carry a transaction
/// signature, other providers may not.
pub fn summarize_event(event: &Value) -> &str {
    json::str_field(event, "signature")
        .present()
        .unwrap_or("unknown")
}
