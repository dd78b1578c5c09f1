use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier request failed ({kind}): {message}")]
    Transport { kind: &'static str, message: String },
    #[error("notifier returned status {status}: {description}")]
    Status { status: u16, description: String },
    #[error("notifier rejected message: {0}")]
    Rejected(String),
}

/// Outbound delivery of signals and milestone updates. Messages arrive as
/// plain unescaped text; each transport applies its own markup.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text_signal(&self, message: &str) -> Result<(), NotifyError>;

    async fn send_photo_signal(&self, image_url: &str, message: &str) -> Result<(), NotifyError>;

    async fn send_milestone_update(&self, message: &str) -> Result<(), NotifyError>;
}

/// Writes every notification to the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send_text_signal(&self, message: &str) -> Result<(), NotifyError> {
        info!(message = %message, "signal");
        Ok(())
    }

    async fn send_photo_signal(&self, image_url: &str, message: &str) -> Result<(), NotifyError> {
        info!(image_url = %image_url, message = %message, "signal");
        Ok(())
    }

    async fn send_milestone_update(&self, message: &str) -> Result<(), NotifyError> {
        info!(message = %message, "milestone");
        Ok(())
    }
}
