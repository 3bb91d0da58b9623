use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

use crate::commands::ChatSender;
use crate::config::Credentials;

use super::error::{BotError, Result};

const CHAT_MESSAGES_URL: &str = "https://api.twitch.tv/helix/chat/messages";
const CHATTERS_URL: &str = "https://api.twitch.tv/helix/chat/chatters";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Deserialize)]
struct SendMessageResponse {
    data: Vec<SendMessageData>,
}

#[derive(Debug, Clone, Deserialize)]
struct SendMessageData {
    is_sent: bool,
    drop_reason: Option<DropReason>,
}

#[derive(Debug, Clone, Deserialize)]
struct DropReason {
    code: String,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChattersResponse {
    #[serde(default)]
    data: Vec<Chatter>,
}

#[derive(Debug, Clone, Deserialize)]
struct Chatter {
    user_login: String,
}

/// Helix REST client. The bot runs under the broadcaster account, so the
/// broadcaster id doubles as sender and moderator id.
#[derive(Clone)]
pub struct HelixClient {
    http: reqwest::Client,
    credentials: Credentials,
}

impl HelixClient {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self { http, credentials })
    }

    pub async fn send_chat_message(&self, text: &str) -> Result<()> {
        let access_token = self.credentials.access_token.read().await.clone();
        let body = json!({
            "broadcaster_id": self.credentials.broadcaster_id,
            "sender_id": self.credentials.broadcaster_id,
            "message": text,
        });

        let response = self
            .http
            .post(CHAT_MESSAGES_URL)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Client-Id", &self.credentials.client_id)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BotError::Transport(format!(
                "send message failed: HTTP {} - {}",
                status, body
            )));
        }

        let parsed = response.json::<SendMessageResponse>().await?;
        if let Some(data) = parsed.data.first() {
            if !data.is_sent {
                if let Some(reason) = &data.drop_reason {
                    return Err(BotError::Transport(format!(
                        "message dropped: {} - {}",
                        reason.code, reason.message
                    )));
                }
            }
        }

        Ok(())
    }

    /// Current chat participants, lowercased. Failures surface to the caller
    /// so the points loop can skip the tick.
    pub async fn get_chatters(&self) -> Result<HashSet<String>> {
        let access_token = self.credentials.access_token.read().await.clone();
        let url = format!(
            "{}?broadcaster_id={}&moderator_id={}",
            CHATTERS_URL, self.credentials.broadcaster_id, self.credentials.broadcaster_id
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Client-Id", &self.credentials.client_id)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BotError::Transport(format!(
                "chatters fetch failed: HTTP {} - {}",
                status, body
            )));
        }

        let parsed = response.json::<ChattersResponse>().await?;
        Ok(parsed
            .data
            .into_iter()
            .map(|c| c.user_login.to_lowercase())
            .collect())
    }
}

impl ChatSender for HelixClient {
    /// Chat replies are best-effort; a failed send never aborts command
    /// handling.
    async fn send(&self, text: String) {
        if let Err(e) = self.send_chat_message(&text).await {
            log::error!("Failed to send chat message: {}", e);
        }
    }
}
