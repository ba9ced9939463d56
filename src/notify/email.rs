use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("recipient address is required")]
    MissingRecipient,
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected the message with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

/// Posts plain-text mail as JSON to an HTTP mail relay.
pub struct RelayMailer {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

impl RelayMailer {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl EmailSender for RelayMailer {
    #[tracing::instrument(name = "relay_mail", skip(self, body), fields(relay = %self.endpoint))]
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        if to.trim().is_empty() {
            return Err(EmailError::MissingRecipient);
        }

        tracing::info!("Sending email");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Mail relay rejected message");
            return Err(EmailError::Rejected(status.as_u16()));
        }

        tracing::info!("Email sent");
        Ok(())
    }
}

/// Used when no relay is configured: the message only reaches the log.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl EmailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        if to.trim().is_empty() {
            return Err(EmailError::MissingRecipient);
        }
        tracing::info!(from = %self.from, to, subject, body, "Email (no relay configured)");
        Ok(())
    }
}
