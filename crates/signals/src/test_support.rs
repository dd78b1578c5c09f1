use crate::notifier::{Notifier, NotifyError};
use async_trait::async_trait;
use mintwatch_core_types::{ValidationResult, REASON_NOT_FOUND};
use mintwatch_market_data::{ImageResolver, TokenValidator, ValidationError};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub(crate) fn passing_result(market_cap: f64) -> ValidationResult {
    ValidationResult {
        is_valid: true,
        token_name: "Dog Coin".to_string(),
        token_symbol: "DOG".to_string(),
        pair_address: "PairAddr".to_string(),
        liquidity_usd: 40_000.0,
        market_cap,
        ..ValidationResult::default()
    }
}

pub(crate) fn market_cap_only(market_cap: f64) -> ValidationResult {
    ValidationResult {
        is_valid: false,
        fail_reasons: vec!["market cap above maximum".to_string()],
        token_name: "Dog Coin".to_string(),
        market_cap,
        ..ValidationResult::default()
    }
}

/// Pops a queued answer per token; unknown tokens are "not found".
#[derive(Default)]
pub(crate) struct ScriptedValidator {
    answers: Mutex<HashMap<String, VecDeque<Result<ValidationResult, ValidationError>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedValidator {
    pub(crate) fn push(&self, token: &str, answer: Result<ValidationResult, ValidationError>) {
        self.answers
            .lock()
            .expect("answers lock")
            .entry(token.to_string())
            .or_default()
            .push_back(answer);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl TokenValidator for ScriptedValidator {
    async fn validate(&self, token: &str) -> Result<ValidationResult, ValidationError> {
        self.calls.lock().expect("calls lock").push(token.to_string());
        self.answers
            .lock()
            .expect("answers lock")
            .get_mut(token)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(ValidationResult::rejected(REASON_NOT_FOUND)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sent {
    Text(String),
    Photo { image_url: String, message: String },
    Milestone(String),
}

impl Sent {
    pub(crate) fn message(&self) -> &str {
        match self {
            Self::Text(message) | Self::Milestone(message) => message,
            Self::Photo { message, .. } => message,
        }
    }

    /// Mint named on the message's `Mint:` line.
    pub(crate) fn mint(&self) -> Option<&str> {
        self.message()
            .lines()
            .find_map(|line| line.strip_prefix("Mint: "))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
    fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent lock").clone()
    }

    fn record(&self, sent: Sent) -> Result<(), NotifyError> {
        self.sent.lock().expect("sent lock").push(sent);
        if self.fail {
            return Err(NotifyError::Rejected("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_text_signal(&self, message: &str) -> Result<(), NotifyError> {
        self.record(Sent::Text(message.to_string()))
    }

    async fn send_photo_signal(&self, image_url: &str, message: &str) -> Result<(), NotifyError> {
        self.record(Sent::Photo {
            image_url: image_url.to_string(),
            message: message.to_string(),
        })
    }

    async fn send_milestone_update(&self, message: &str) -> Result<(), NotifyError> {
        self.record(Sent::Milestone(message.to_string()))
    }
}

pub(crate) struct StaticImageResolver(pub Option<String>);

#[async_trait]
impl ImageResolver for StaticImageResolver {
    async fn resolve_image_url(&self, _token: &str) -> Option<String> {
        self.0.clone()
    }
}
