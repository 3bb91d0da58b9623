use serde::Deserialize;

/// `metadata.message_type` values the connection cares about
pub const MSG_WELCOME: &str = "session_welcome";
pub const MSG_KEEPALIVE: &str = "session_keepalive";
pub const MSG_NOTIFICATION: &str = "notification";
pub const MSG_RECONNECT: &str = "session_reconnect";
pub const MSG_REVOCATION: &str = "revocation";

pub const SUB_REDEMPTION: &str = "channel.channel_points_custom_reward_redemption.add";
pub const SUB_CHAT_MESSAGE: &str = "channel.chat.message";

/// Envelope for every frame received from the EventSub socket. The payload
/// shape depends on `metadata.message_type`, so it stays untyped here and is
/// decoded once the type is known.
#[derive(Debug, Clone, Deserialize)]
pub struct EventSubMessage {
    pub metadata: Metadata,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    #[allow(dead_code)] // Part of the EventSub envelope
    pub message_id: String,
    pub message_type: String,
    #[allow(dead_code)] // Part of the EventSub envelope
    pub message_timestamp: String,
}

/// Payload of a `session_welcome` frame
#[derive(Debug, Clone, Deserialize)]
pub struct WelcomePayload {
    pub session: Session,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: String,
    #[allow(dead_code)] // Part of the welcome payload
    pub status: String,
    #[allow(dead_code)] // Part of the welcome payload
    pub keepalive_timeout_seconds: Option<u64>,
    #[allow(dead_code)] // Part of the welcome payload
    pub reconnect_url: Option<String>,
}

/// Payload of a `notification` frame
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationPayload {
    pub subscription: Subscription,
    pub event: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    #[allow(dead_code)] // Part of the notification payload
    pub id: String,
    #[serde(rename = "type")]
    pub subscription_type: String,
    #[allow(dead_code)] // Part of the notification payload
    pub version: String,
}

/// Channel-points redemption event
#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionEvent {
    pub user_name: Option<String>,
    pub reward: Reward,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reward {
    pub title: String,
}

/// Chat message event from the `channel.chat.message` subscription
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessageEvent {
    #[allow(dead_code)] // Part of the chat event payload
    pub chatter_user_id: String,
    pub chatter_user_login: String,
    pub chatter_user_name: String,
    pub message: ChatText,
    #[serde(default)]
    pub badges: Vec<Badge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatText {
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Badge {
    pub set_id: String,
    #[allow(dead_code)] // Part of the chat event payload
    pub id: String,
    #[allow(dead_code)] // Part of the chat event payload
    pub info: String,
}

impl ChatMessageEvent {
    /// Broadcaster and moderator badges gate the management commands
    pub fn is_moderator(&self) -> bool {
        self.badges
            .iter()
            .any(|b| b.set_id == "broadcaster" || b.set_id == "moderator")
    }
}

/// Decoded events handed to the main loop
#[derive(Debug, Clone)]
pub enum BotEvent {
    RewardRedeemed(RedemptionEvent),
    ChatMessage(ChatMessageEvent),
}
