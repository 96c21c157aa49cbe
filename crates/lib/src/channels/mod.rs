//! Communication channels (e.g. Discord).
//!
//! Adapters translate platform events into [`InboundMessage`]s for the relay and
//! deliver replies through [`ChannelHandle`].

pub mod discord;
mod inbound;

use async_trait::async_trait;

pub use discord::DiscordChannel;
pub use inbound::InboundMessage;

/// Handle to a connected channel used for outbound delivery.
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "discord").
    fn id(&self) -> &str;
    /// Send a text message to a conversation (e.g. Discord channel id).
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String>;
}
