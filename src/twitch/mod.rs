/// Twitch EventSub WebSocket integration.
///
/// One persistent socket carries the channel-points redemption feed and the
/// chat-message feed; Helix REST calls cover outbound chat, the chatter list,
/// and subscription registration.
pub mod api;
pub mod auth;
pub mod connection;
pub mod error;
pub mod eventsub;
pub mod messages;

pub use api::HelixClient;
pub use connection::EventSubConnection;
