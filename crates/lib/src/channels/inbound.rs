//! Inbound message from a channel: delivered to the relay for trigger check and reply.

/// A chat message as seen by the reply pipeline.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Adapter id (e.g. "discord").
    pub channel_id: String,
    /// Conversation the reply goes back to (e.g. Discord channel id).
    pub conversation_id: String,
    pub author_id: String,
    /// True when the bot itself wrote the message.
    pub from_self: bool,
    pub text: String,
}
