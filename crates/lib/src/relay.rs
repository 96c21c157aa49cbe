//! Relay runtime: keep-alive server, Discord connection, and the inbound processing loop.

use crate::channels::{ChannelHandle, DiscordChannel, InboundMessage};
use crate::config::{self, Config};
use crate::keepalive;
use crate::llm::GeminiClient;
use crate::pipeline::{ReplyPipeline, ReplySource};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

const INBOUND_QUEUE: usize = 64;

/// Handle one inbound message: run the pipeline and send the reply, if any.
pub async fn process_inbound_message(
    pipeline: &ReplyPipeline,
    channel: &dyn ChannelHandle,
    msg: InboundMessage,
) {
    let Some(out) = pipeline.handle(&msg).await else {
        return;
    };
    if let ReplySource::Fallback(ref e) = out.source {
        log::info!(
            "inbound: sending fallback reply to {} ({})",
            out.conversation_id,
            e
        );
    }
    if let Err(e) = channel.send_message(&out.conversation_id, &out.text).await {
        log::warn!("inbound: send_message on {} failed: {}", channel.id(), e);
    }
}

/// Receive inbound messages in arrival order and handle each in its own task so a
/// slow generation call never holds up the next message. Returns once the queue is
/// closed and every in-flight message is done.
pub async fn run_processor(
    pipeline: Arc<ReplyPipeline>,
    channel: Arc<dyn ChannelHandle>,
    mut inbound_rx: mpsc::Receiver<InboundMessage>,
) {
    let mut tasks = JoinSet::new();
    loop {
        tokio::select! {
            msg = inbound_rx.recv() => {
                let Some(msg) = msg else { break };
                let pipeline = pipeline.clone();
                let channel = channel.clone();
                tasks.spawn(async move {
                    process_inbound_message(&pipeline, channel.as_ref(), msg).await;
                });
            }
            Some(res) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = res {
                    log::warn!("inbound: message task failed: {}", e);
                }
            }
        }
    }
    while let Some(res) = tasks.join_next().await {
        if let Err(e) = res {
            log::warn!("inbound: message task failed: {}", e);
        }
    }
    log::debug!("inbound: processor stopped");
}

/// Run the bot until Ctrl+C / SIGTERM or until the Discord connection ends.
/// The keep-alive server starts first; a bind failure or a missing Discord token is fatal.
/// `port` overrides the keep-alive port from PORT and config.
pub async fn run_relay(config: Config, port: Option<u16>) -> Result<()> {
    let discord_token = config::resolve_discord_token(&config);
    if discord_token.is_none() {
        log::error!("discord token not configured (set DISCORD_TOKEN or discord.token)");
    }
    let gemini = GeminiClient::from_config(&config);
    if !gemini.has_api_key() {
        log::warn!(
            "gemini api key not configured (set GEMINI_API_KEY or gemini.apiKey); replies will use fallbacks"
        );
    }

    let port = port.unwrap_or_else(|| config::resolve_keep_alive_port(&config));
    let (_, keepalive_task) = keepalive::spawn(&config.keep_alive.bind, port).await?;

    let token = discord_token
        .ok_or_else(|| anyhow!("refusing to start discord connection without a token"))?;
    let pipeline = Arc::new(ReplyPipeline::with_generator(&config, Arc::new(gemini))?);
    log::info!(
        "listening for messages starting with {:?}",
        pipeline.trigger().prefix()
    );

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);
    let (discord, mut discord_task) = DiscordChannel::start(&token, inbound_tx)
        .await
        .map_err(|e| anyhow!(e))?;
    let mut processor = tokio::spawn(run_processor(pipeline, discord.clone(), inbound_rx));

    let discord_ended = tokio::select! {
        _ = shutdown_signal() => None,
        res = &mut discord_task => Some(res),
    };
    let discord_result = match discord_ended {
        Some(res) => {
            log::warn!("discord connection ended");
            res
        }
        None => {
            log::info!("shutdown signal received, closing discord connection");
            discord.stop().await;
            discord_task.await
        }
    };
    if let Err(e) = discord_result {
        log::warn!("discord task failed: {}", e);
    }

    // Give in-flight replies up to one generation timeout to finish.
    let drain = config.gemini.timeout() + Duration::from_secs(1);
    match tokio::time::timeout(drain, &mut processor).await {
        Ok(Err(e)) => log::warn!("inbound processor failed: {}", e),
        Ok(Ok(())) => {}
        Err(_) => {
            log::debug!("inbound processor still busy after {:?}, aborting", drain);
            processor.abort();
        }
    }
    keepalive_task.abort();
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackSet;
    use crate::llm::{GenerationError, TextGenerator};
    use crate::trigger::Trigger;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChannelHandle for RecordingChannel {
        fn id(&self) -> &str {
            "test"
        }

        async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String> {
            self.sent
                .lock()
                .unwrap()
                .push((conversation_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct Echo;

    #[async_trait]
    impl TextGenerator for Echo {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            if prompt == "fail" {
                return Err(GenerationError::Network("down".to_string()));
            }
            Ok(format!("echo: {}", prompt))
        }
    }

    /// Sleeps on the prompt "slow", answers everything else at once.
    struct SlowOnDemand {
        delay: Duration,
    }

    #[async_trait]
    impl TextGenerator for SlowOnDemand {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            if prompt == "slow" {
                tokio::time::sleep(self.delay).await;
            }
            Ok(prompt.to_string())
        }
    }

    fn slow_pipeline() -> Arc<ReplyPipeline> {
        Arc::new(ReplyPipeline::new(
            Trigger::default(),
            Arc::new(SlowOnDemand {
                delay: Duration::from_secs(2),
            }),
            FallbackSet::new(vec!["fallback".to_string()]).unwrap(),
            Duration::from_secs(10),
        ))
    }

    fn sent(channel: &RecordingChannel) -> Vec<(String, String)> {
        channel.sent.lock().unwrap().clone()
    }

    fn inbound(conv: &str, text: &str) -> InboundMessage {
        InboundMessage {
            channel_id: "test".to_string(),
            conversation_id: conv.to_string(),
            author_id: "u".to_string(),
            from_self: false,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn processor_replies_once_per_triggered_message() {
        let pipeline = Arc::new(ReplyPipeline::new(
            Trigger::default(),
            Arc::new(Echo),
            FallbackSet::new(vec!["fallback".to_string()]).unwrap(),
            Duration::from_secs(1),
        ));
        let channel = Arc::new(RecordingChannel::default());
        let (tx, rx) = mpsc::channel(8);
        let processor = tokio::spawn(run_processor(pipeline, channel.clone(), rx));

        tx.send(inbound("1", "!bot hello")).await.unwrap();
        tx.send(inbound("2", "just chatting")).await.unwrap();
        tx.send(inbound("3", "!bot fail")).await.unwrap();
        let mut own = inbound("4", "!bot me");
        own.from_self = true;
        tx.send(own).await.unwrap();
        drop(tx);
        processor.await.unwrap();

        let mut sent = channel.sent.lock().unwrap().clone();
        sent.sort();
        assert_eq!(
            sent,
            vec![
                ("1".to_string(), "echo: hello".to_string()),
                ("3".to_string(), "fallback".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn slow_generation_does_not_hold_up_later_messages() {
        let channel = Arc::new(RecordingChannel::default());
        let (tx, rx) = mpsc::channel(8);
        let processor = tokio::spawn(run_processor(slow_pipeline(), channel.clone(), rx));

        tx.send(inbound("1", "!bot slow")).await.unwrap();
        tx.send(inbound("2", "!BOT fast")).await.unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        while sent(&channel).is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(sent(&channel), vec![("2".to_string(), "fast".to_string())]);

        drop(tx);
        processor.await.unwrap();
        assert_eq!(
            sent(&channel),
            vec![
                ("2".to_string(), "fast".to_string()),
                ("1".to_string(), "slow".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn keepalive_answers_while_generation_is_outstanding() {
        let (addr, server) = keepalive::spawn("127.0.0.1", 0).await.unwrap();
        let channel = Arc::new(RecordingChannel::default());
        let (tx, rx) = mpsc::channel(8);
        let processor = tokio::spawn(run_processor(slow_pipeline(), channel.clone(), rx));
        tx.send(inbound("1", "!bot slow")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let res = tokio::time::timeout(
            Duration::from_secs(1),
            reqwest::get(format!("http://{}/", addr)),
        )
        .await
        .expect("keep-alive answered in time")
        .unwrap();
        assert_eq!(res.status(), 200);
        assert!(!res.text().await.unwrap().is_empty());
        assert!(sent(&channel).is_empty());

        drop(tx);
        processor.await.unwrap();
        assert_eq!(sent(&channel), vec![("1".to_string(), "slow".to_string())]);
        server.abort();
    }
}
