//! Discord channel: gateway events in via serenity, replies out via the REST API.

use crate::channels::inbound::InboundMessage;
use crate::channels::ChannelHandle;
use async_trait::async_trait;
use serenity::gateway::ShardManager;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::id::ChannelId;
use serenity::prelude::*;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DISCORD_CHANNEL_ID: &str = "discord";

/// Discord rejects messages longer than this many characters.
pub const MESSAGE_LIMIT: usize = 2000;

/// Forwards every text message to the relay; filtering happens in the pipeline.
struct Handler {
    inbound_tx: mpsc::Sender<InboundMessage>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        log::info!("discord: bot is live as {}", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.content.is_empty() {
            return;
        }
        let from_self = msg.author.id == ctx.cache.current_user().id;
        let inbound = InboundMessage {
            channel_id: DISCORD_CHANNEL_ID.to_string(),
            conversation_id: msg.channel_id.get().to_string(),
            author_id: msg.author.id.get().to_string(),
            from_self,
            text: msg.content,
        };
        if self.inbound_tx.send(inbound).await.is_err() {
            log::debug!("discord: inbound channel closed, dropping message");
        }
    }
}

/// Connected Discord bot: REST handle for replies plus the shard manager for shutdown.
pub struct DiscordChannel {
    id: String,
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
}

impl DiscordChannel {
    /// Build the serenity client and start the gateway connection in a background task.
    /// Messages are forwarded to `inbound_tx`. The task ends when the shards shut down.
    pub async fn start(
        token: &str,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> Result<(Arc<Self>, JoinHandle<()>), String> {
        let intents = GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;
        let mut client = Client::builder(token, intents)
            .event_handler(Handler { inbound_tx })
            .await
            .map_err(|e| format!("creating discord client: {}", e))?;
        let channel = Arc::new(Self {
            id: DISCORD_CHANNEL_ID.to_string(),
            http: client.http.clone(),
            shard_manager: client.shard_manager.clone(),
        });
        log::info!("discord channel: starting gateway connection");
        let handle = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                log::error!("discord client error: {}", e);
            }
            log::info!("discord channel: gateway connection closed");
        });
        Ok((channel, handle))
    }

    /// Close all shards; the task returned by `start` then finishes.
    pub async fn stop(&self) {
        self.shard_manager.shutdown_all().await;
    }
}

#[async_trait]
impl ChannelHandle for DiscordChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String> {
        let channel = parse_channel_id(conversation_id)
            .ok_or_else(|| format!("invalid discord channel id: {}", conversation_id))?;
        channel
            .say(&*self.http, fit_message_limit(text))
            .await
            .map(|_| ())
            .map_err(|e| format!("discord send failed: {}", e))
    }
}

fn parse_channel_id(conversation_id: &str) -> Option<ChannelId> {
    conversation_id
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}

/// Truncate to [`MESSAGE_LIMIT`] characters, ending with an ellipsis, so a long
/// reply still goes out as one message.
pub fn fit_message_limit(text: &str) -> Cow<'_, str> {
    if text.chars().count() <= MESSAGE_LIMIT {
        return Cow::Borrowed(text);
    }
    let mut out: String = text.chars().take(MESSAGE_LIMIT - 1).collect();
    out.push('…');
    Cow::Owned(out)
}
