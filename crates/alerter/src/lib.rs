use crate::error::AlerterError;
use configuration::TelegramConfig;
use reqwest::Client;
use serde::Serialize;
pub mod error;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// A client for sending operational alerts to a Telegram chat.
#[derive(Debug, Clone)]
pub struct TelegramAlerter {
    client: Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the configuration,
    /// which disables alerting.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.trim().is_empty() || config.chat_id.trim().is_empty() {
            tracing::info!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            base_url: TELEGRAM_API.to_string(),
            token: config.token.trim().to_string(),
            chat_id: config.chat_id.trim().to_string(),
        })
    }

    /// Points the alerter at another Bot API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sends a MarkdownV2 message to the configured chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::ApiError(error_text));
        }

        Ok(())
    }

    /// Fire-and-forget: sends `message` from a background task and only logs
    /// the outcome.
    pub fn notify(&self, message: String) {
        let alerter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = alerter.send_message(&message).await {
                tracing::error!(error = %e, "Failed to send Telegram alert.");
            }
        });
    }
}

/// Formats the alert for a fetch that stopped on an error.
pub fn fetch_failure_message(dataset: &str, account: &str, cause: &str, partial_records: usize) -> String {
    format!(
        "⚠️ *Fetch failed*\nDataset: `{}`\nAccount: `{}`\nKept records: `{}`\nCause: {}",
        escape_markdown(dataset),
        escape_markdown(account),
        partial_records,
        escape_markdown(cause)
    )
}

/// Escapes characters that have special meaning in Telegram's MarkdownV2.
pub fn escape_markdown(text: &str) -> String {
    const SPECIAL: &str = r"\_*[]()~`>#+-=|{}.!";
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
