use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use crate::config::Credentials;

use super::auth;
use super::error::{BotError, Result};
use super::messages::{SUB_CHAT_MESSAGE, SUB_REDEMPTION};

const EVENTSUB_API_URL: &str = "https://api.twitch.tv/helix/eventsub/subscriptions";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub subscription_type: String,
    pub version: String,
    pub condition: serde_json::Value,
    pub transport: Transport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Transport {
    pub method: String,
    pub session_id: String,
}

/// Registers EventSub subscriptions for a socket session. Subscriptions are
/// not portable across sessions, so this runs once per welcome frame.
pub struct SubscriptionRegistrar {
    client: reqwest::Client,
    credentials: Credentials,
}

impl SubscriptionRegistrar {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Register the redemption and chat-message subscriptions for `session_id`
    pub async fn register_session(&self, session_id: &str) -> Result<()> {
        let broadcaster = &self.credentials.broadcaster_id;

        let redemption = SubscriptionRequest {
            subscription_type: SUB_REDEMPTION.to_string(),
            version: "1".to_string(),
            condition: json!({ "broadcaster_user_id": broadcaster }),
            transport: Transport {
                method: "websocket".to_string(),
                session_id: session_id.to_string(),
            },
        };
        self.create_subscription(&redemption, true).await?;

        let chat = SubscriptionRequest {
            subscription_type: SUB_CHAT_MESSAGE.to_string(),
            version: "1".to_string(),
            condition: json!({
                "broadcaster_user_id": broadcaster,
                "user_id": broadcaster,
            }),
            transport: Transport {
                method: "websocket".to_string(),
                session_id: session_id.to_string(),
            },
        };
        self.create_subscription(&chat, true).await?;

        log::info!("EventSub subscriptions registered for session {}", session_id);
        Ok(())
    }

    /// HTTP 200 and 202 both count as accepted (the two endpoint versions in
    /// the wild answer differently). A 401 gets one token refresh and retry.
    async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
        allow_refresh: bool,
    ) -> Result<()> {
        let access_token = self.credentials.access_token.read().await.clone();

        let response = self
            .client
            .post(EVENTSUB_API_URL)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Client-Id", &self.credentials.client_id)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 200 || status == 202 {
            return Ok(());
        }

        if status == 401 && allow_refresh {
            log::warn!("Subscription request got 401, refreshing token and retrying");
            auth::refresh_access_token(&self.credentials).await?;
            return Box::pin(self.create_subscription(request, false)).await;
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(BotError::Subscription(format!(
            "{} rejected: HTTP {}: {}",
            request.subscription_type, status, body
        )))
    }
}
