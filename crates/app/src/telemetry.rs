use std::collections::BTreeMap;
use tracing::info;

pub(crate) fn format_error_chain(error: &anyhow::Error) -> String {
    let mut chain = String::new();
    for (idx, cause) in error.chain().enumerate() {
        if idx > 0 {
            chain.push_str(" | ");
        }
        chain.push_str(&cause.to_string());
    }
    chain
}

pub(crate) fn log_drop_counts(drop_counts: &BTreeMap<&'static str, u64>, window_seconds: u64) {
    if drop_counts.is_empty() {
        return;
    }
    let total: u64 = drop_counts.values().sum();
    info!(
        total,
        window_seconds,
        drop_counts = ?drop_counts,
        "signal drop report"
    );
}
