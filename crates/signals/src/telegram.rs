use crate::notifier::{Notifier, NotifyError};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use mintwatch_config::NotifierConfig;
use mintwatch_market_data::http_utils::{backoff_delay, classify_request_error};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

const CAPTION_LIMIT: usize = 1024;
const MESSAGE_LIMIT: usize = 4096;
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

pub fn escape_markdown_v2(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len() + raw.len() / 4);
    for ch in raw.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escapes `raw` and cuts it so the result stays within `limit` characters
/// without splitting an escape sequence.
pub fn escape_within(raw: &str, limit: usize) -> String {
    let escaped = escape_markdown_v2(raw);
    if escaped.chars().count() <= limit {
        return escaped;
    }
    let ellipsis = "\\.\\.\\.";
    let budget = limit.saturating_sub(ellipsis.chars().count());
    let mut out = String::new();
    let mut used = 0;
    for ch in raw.chars() {
        let width = if MARKDOWN_V2_SPECIAL.contains(&ch) { 2 } else { 1 };
        if used + width > budget {
            break;
        }
        if width == 2 {
            out.push('\\');
        }
        out.push(ch);
        used += width;
    }
    out.push_str(ellipsis);
    out
}

enum SendError {
    Retryable { error: NotifyError, delay: Option<Duration> },
    Terminal(NotifyError),
}

pub struct TelegramNotifier {
    http: reqwest::Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
    send_attempts: u32,
    retry_base: Duration,
    retry_after_cap: Duration,
}

impl TelegramNotifier {
    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let bot_token = config.telegram_bot_token.trim();
        let chat_id = config.telegram_chat_id.trim();
        if bot_token.is_empty() || chat_id.is_empty() {
            return Err(anyhow!(
                "notifier.telegram_bot_token and notifier.telegram_chat_id are required in telegram mode"
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed building telegram http client")?;
        Ok(Self {
            http,
            api_url: config.telegram_api_url.trim().trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            send_attempts: config.send_attempts.max(1),
            retry_base: Duration::from_millis(config.retry_base_ms),
            retry_after_cap: Duration::from_millis(config.retry_after_cap_ms),
        })
    }

    async fn call(&self, method: &'static str, body: Value) -> Result<(), NotifyError> {
        let mut attempt = 0;
        loop {
            match self.call_once(method, &body).await {
                Ok(()) => return Ok(()),
                Err(SendError::Terminal(error)) => return Err(error),
                Err(SendError::Retryable { error, delay }) => {
                    attempt += 1;
                    if attempt >= self.send_attempts {
                        return Err(error);
                    }
                    let delay =
                        delay.unwrap_or_else(|| backoff_delay(self.retry_base, attempt - 1));
                    debug!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying telegram request"
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }

    async fn call_once(&self, method: &'static str, body: &Value) -> Result<(), SendError> {
        let url = format!("{}/bot{}/{}", self.api_url, self.bot_token, method);
        let response = self.http.post(&url).json(body).send().await.map_err(|error| {
            SendError::Retryable {
                error: NotifyError::Transport {
                    kind: classify_request_error(&error),
                    // reqwest errors embed the URL, which carries the bot token.
                    message: error.without_url().to_string(),
                },
                delay: None,
            }
        })?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);
        let description = payload
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let ok = payload.get("ok").and_then(Value::as_bool).unwrap_or(false);

        if status.is_success() && ok {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = payload
                .pointer("/parameters/retry_after")
                .and_then(Value::as_u64)
                .map(|seconds| Duration::from_secs(seconds).min(self.retry_after_cap));
            return Err(SendError::Retryable {
                error: NotifyError::Status {
                    status: status.as_u16(),
                    description,
                },
                delay: retry_after,
            });
        }
        if status.is_server_error() {
            return Err(SendError::Retryable {
                error: NotifyError::Status {
                    status: status.as_u16(),
                    description,
                },
                delay: None,
            });
        }
        if status.is_success() {
            return Err(SendError::Terminal(NotifyError::Rejected(description)));
        }
        Err(SendError::Terminal(NotifyError::Status {
            status: status.as_u16(),
            description,
        }))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text_signal(&self, message: &str) -> Result<(), NotifyError> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": self.chat_id,
                "text": escape_within(message, MESSAGE_LIMIT),
                "parse_mode": "MarkdownV2",
                "disable_web_page_preview": true,
            }),
        )
        .await
    }

    async fn send_photo_signal(&self, image_url: &str, message: &str) -> Result<(), NotifyError> {
        let sent = self
            .call(
                "sendPhoto",
                json!({
                    "chat_id": self.chat_id,
                    "photo": image_url,
                    "caption": escape_within(message, CAPTION_LIMIT),
                    "parse_mode": "MarkdownV2",
                }),
            )
            .await;
        match sent {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(
                    image_url = %image_url,
                    error = %error,
                    "telegram photo signal failed, falling back to text"
                );
                self.send_text_signal(message).await
            }
        }
    }

    async fn send_milestone_update(&self, message: &str) -> Result<(), NotifyError> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": self.chat_id,
                "text": escape_within(message, MESSAGE_LIMIT),
                "parse_mode": "MarkdownV2",
            }),
        )
        .await
    }
}
