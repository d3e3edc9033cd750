use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::domain::errors::NotifyError;
use crate::domain::ports::Notifier;

pub const DEFAULT_CHAT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Posts approval messages to a chat bot's `sendMessage` endpoint.
///
/// Without credentials the message is only logged.
pub struct ChatNotifier {
    client: Client,
    api_url: String,
    credentials: Option<ChatCredentials>,
}

impl ChatNotifier {
    pub fn new(api_url: &str, credentials: Option<ChatCredentials>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn disabled() -> Self {
        Self::new(DEFAULT_CHAT_API_URL, None)
    }

    fn send_url(&self, credentials: &ChatCredentials) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, credentials.bot_token)
    }
}

impl Notifier for ChatNotifier {
    async fn send_message(&self, text: String) -> Result<(), NotifyError> {
        let Some(credentials) = &self.credentials else {
            log::info!("Chat bot not configured, message not sent: {}", text);
            return Ok(());
        };

        let resp = self
            .client
            .post(self.send_url(credentials))
            .json(&json!({ "chat_id": credentials.chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = resp.status();
        let body: SendMessageResponse = resp
            .json()
            .await
            .map_err(|e| NotifyError::Transport(format!("{status}: {e}")))?;
        if !status.is_success() || !body.ok {
            return Err(NotifyError::Rejected(
                body.description.unwrap_or_else(|| status.to_string()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_url_embeds_the_bot_token() {
        let credentials = ChatCredentials {
            bot_token: "123:abc".to_string(),
            chat_id: "-100".to_string(),
        };
        let notifier = ChatNotifier::new("https://chat.example/", Some(credentials.clone()));
        assert_eq!(
            notifier.send_url(&credentials),
            "https://chat.example/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn disabled_notifier_succeeds_without_network() {
        assert!(ChatNotifier::disabled()
            .send_message("Phiếu PX1 đã được duyệt".to_string())
            .await
            .is_ok());
    }
}
