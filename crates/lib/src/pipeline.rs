//! Reply pipeline: trigger check, prompt extraction, bounded generation call, fallback.
//!
//! [`ReplyPipeline::handle`] takes one inbound message and returns zero or one outbound
//! message. It holds no mutable state, so one instance is shared by every in-flight event.

use crate::channels::InboundMessage;
use crate::config::{self, Config};
use crate::fallback::FallbackSet;
use crate::llm::{GeminiClient, GenerationError, TextGenerator};
use crate::trigger::Trigger;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Where the reply text came from. Only used for diagnostics; users see the text alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplySource {
    Generated,
    Fallback(GenerationError),
}

/// Reply text and its source.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

impl Reply {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ReplySource::Fallback(_))
    }
}

/// A reply addressed to the conversation the inbound message came from.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub channel_id: String,
    pub conversation_id: String,
    pub text: String,
    pub source: ReplySource,
}

pub struct ReplyPipeline {
    trigger: Trigger,
    generator: Arc<dyn TextGenerator>,
    fallback: FallbackSet,
    timeout: Duration,
}

impl ReplyPipeline {
    pub fn new(
        trigger: Trigger,
        generator: Arc<dyn TextGenerator>,
        fallback: FallbackSet,
        timeout: Duration,
    ) -> Self {
        Self {
            trigger,
            generator,
            fallback,
            timeout,
        }
    }

    /// Pipeline backed by the Gemini client, with credentials resolved from env and config.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_generator(config, Arc::new(GeminiClient::from_config(config)))
    }

    /// Trigger, fallbacks and timeout from config around the given generator.
    pub fn with_generator(config: &Config, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        let fallback = FallbackSet::new(config::resolve_fallback_replies(config))?;
        Ok(Self::new(
            Trigger::from_config(&config.trigger),
            generator,
            fallback,
            config.gemini.timeout(),
        ))
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn fallback(&self) -> &FallbackSet {
        &self.fallback
    }

    /// Handle one inbound message. None when it is self-authored or not triggered;
    /// otherwise exactly one outbound message, generated or fallback.
    pub async fn handle(&self, msg: &InboundMessage) -> Option<OutboundMessage> {
        if msg.from_self {
            return None;
        }
        let prompt = self.trigger.extract(&msg.text)?;
        log::debug!(
            "pipeline: triggered by {} in {}:{}",
            msg.author_id,
            msg.channel_id,
            msg.conversation_id
        );
        let reply = self.reply(&prompt).await;
        Some(OutboundMessage {
            channel_id: msg.channel_id.clone(),
            conversation_id: msg.conversation_id.clone(),
            text: reply.text,
            source: reply.source,
        })
    }

    /// Generate a reply for `prompt`, bounded by the timeout; any failure yields a stock reply.
    pub async fn reply(&self, prompt: &str) -> Reply {
        let result = match tokio::time::timeout(self.timeout, self.generator.generate(prompt)).await
        {
            Ok(r) => r,
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        };
        match result {
            Ok(text) => Reply {
                text,
                source: ReplySource::Generated,
            },
            Err(e) => {
                log::warn!("pipeline: generation failed, using fallback reply: {}", e);
                Reply {
                    text: self.fallback.pick().to_string(),
                    source: ReplySource::Fallback(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GeminiSettings;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    struct StaticGenerator {
        result: Result<String, GenerationError>,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl StaticGenerator {
        fn new(result: Result<String, GenerationError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for StaticGenerator {
        async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            self.result.clone()
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    fn fallback() -> FallbackSet {
        FallbackSet::new(vec!["chai break ☕".to_string(), "server gaya".to_string()]).unwrap()
    }

    fn pipeline(generator: Arc<dyn TextGenerator>) -> ReplyPipeline {
        ReplyPipeline::new(
            Trigger::default(),
            generator,
            fallback(),
            Duration::from_millis(200),
        )
    }

    fn msg(text: &str) -> InboundMessage {
        InboundMessage {
            channel_id: "discord".to_string(),
            conversation_id: "42".to_string(),
            author_id: "7".to_string(),
            from_self: false,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn untriggered_text_produces_nothing() {
        let g = StaticGenerator::new(Ok("hi".to_string()));
        let p = pipeline(g.clone());
        for text in ["hello", "bot hi", " !bot hi", "?bot", ""] {
            assert!(p.handle(&msg(text)).await.is_none(), "{:?}", text);
        }
        assert_eq!(g.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn self_authored_message_is_ignored() {
        let g = StaticGenerator::new(Ok("hi".to_string()));
        let p = pipeline(g.clone());
        let mut m = msg("!bot hello");
        m.from_self = true;
        assert!(p.handle(&m).await.is_none());
        assert_eq!(g.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn generated_text_is_relayed_verbatim() {
        let g = StaticGenerator::new(Ok("Namaste!".to_string()));
        let p = pipeline(g.clone());
        let out = p.handle(&msg("!bot say hi")).await.unwrap();
        assert_eq!(out.text, "Namaste!");
        assert_eq!(out.source, ReplySource::Generated);
        assert_eq!(out.conversation_id, "42");
        assert_eq!(out.channel_id, "discord");
        assert_eq!(g.last_prompt.lock().unwrap().as_deref(), Some("say hi"));
    }

    #[tokio::test]
    async fn empty_prompt_sends_default() {
        let g = StaticGenerator::new(Ok("Main ek bot hoon".to_string()));
        let p = pipeline(g.clone());
        p.handle(&msg("!bot   ")).await.unwrap();
        assert_eq!(g.last_prompt.lock().unwrap().as_deref(), Some("Tu kaun hai?"));
    }

    #[tokio::test]
    async fn every_failure_class_yields_one_fallback() {
        let failures = [
            GenerationError::CredentialMissing,
            GenerationError::Network("dns".to_string()),
            GenerationError::Timeout(Duration::from_secs(1)),
            GenerationError::HttpStatus {
                status: 500,
                body: "oops".to_string(),
            },
            GenerationError::MalformedResponse("no candidates".to_string()),
            GenerationError::ContentBlocked("SAFETY".to_string()),
        ];
        for failure in failures {
            let g = StaticGenerator::new(Err(failure.clone()));
            let p = pipeline(g.clone());
            let out = p.handle(&msg("!bot hi")).await.unwrap();
            assert!(p.fallback().contains(&out.text));
            assert_eq!(out.source, ReplySource::Fallback(failure));
            assert_eq!(g.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn timeout_falls_back_promptly() {
        let p = pipeline(Arc::new(SlowGenerator));
        let start = Instant::now();
        let out = p.handle(&msg("!bot are you there")).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(p.fallback().contains(&out.text));
        assert_eq!(
            out.source,
            ReplySource::Fallback(GenerationError::Timeout(Duration::from_millis(200)))
        );
    }

    #[tokio::test]
    async fn configured_pipeline_without_key_falls_back() {
        let mut config = Config::default();
        config.gemini.api_key = None;
        config.gemini.base_url = "http://127.0.0.1:1".to_string();
        config.fallback_replies = vec!["offline hai".to_string()];
        let gemini = GeminiClient::new(GeminiSettings::from_config(&config.gemini, None));
        let p = ReplyPipeline::with_generator(&config, Arc::new(gemini)).unwrap();
        let reply = p.reply("hi").await;
        assert_eq!(reply.text, "offline hai");
        assert_eq!(reply.source, ReplySource::Fallback(GenerationError::CredentialMissing));
        assert_eq!(p.trigger().prefix(), "!bot");
    }
}
