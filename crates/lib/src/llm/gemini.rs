//! Gemini API client (`models/{model}:generateContent`).
//! One non-streaming request per prompt; the API key travels as the `key` query parameter.

use crate::config::{self, Config, GeminiConfig};
use crate::llm::{GenerationError, TextGenerator};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Scripted instruction turn that sets the reply persona.
pub const PRIMING_INSTRUCTION: &str = "Tu ek friendly Discord bot hai jo Hinglish mein baat karta hai. \
Funny, chill aur thoda witty tone mein reply karta hai. Jawab chhote rakhna.";

/// Scripted acknowledgement turn that follows the instruction.
pub(crate) const PRIMING_ACK: &str = "Haan bhai, samajh gaya! Chill Hinglish mein baat karenge 😎";

/// Settings resolved from config and environment.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub persona: bool,
}

impl GeminiSettings {
    /// Build settings from the `gemini` config section and an already-resolved key.
    pub fn from_config(config: &GeminiConfig, api_key: Option<String>) -> Self {
        Self {
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            persona: config.persona,
        }
    }
}

/// Client for the Gemini generateContent endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Self {
        let settings = GeminiSettings {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            ..settings
        };
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    /// Client for the `gemini` config section, with the key resolved from env and config.
    pub fn from_config(config: &Config) -> Self {
        let api_key = config::resolve_gemini_api_key(config);
        Self::new(GeminiSettings::from_config(&config.gemini, api_key))
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Request body: optional priming pair, then the prompt as a single user turn.
    fn request_body(&self, prompt: &str) -> GenerateContentRequest {
        let mut contents = Vec::with_capacity(3);
        if self.settings.persona {
            contents.push(Content::text("user", PRIMING_INSTRUCTION));
            contents.push(Content::text("model", PRIMING_ACK));
        }
        contents.push(Content::text("user", prompt));
        GenerateContentRequest { contents }
    }

    /// POST /models/{model}:generateContent — returns the first candidate's text.
    pub async fn generate_content(&self, prompt: &str) -> Result<String, GenerationError> {
        let key = self.api_key().ok_or(GenerationError::CredentialMissing)?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        );
        let body = self.request_body(prompt);
        let res = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.without_url().to_string()))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| GenerationError::Network(e.without_url().to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }
        let data: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| GenerationError::MalformedResponse(format!("decoding body: {}", e)))?;
        data.into_text()
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_content(prompt).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: &str, text: &str) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text` when non-blank; otherwise the failure reason.
    fn into_text(self) -> Result<String, GenerationError> {
        let first = self.candidates.and_then(|c| c.into_iter().next());
        let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
        let text = first
            .and_then(|c| c.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .filter(|t| !t.trim().is_empty());
        if let Some(text) = text {
            return Ok(text);
        }
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(GenerationError::ContentBlocked(reason));
        }
        match finish_reason {
            Some(reason) if reason == "SAFETY" => Err(GenerationError::ContentBlocked(reason)),
            Some(reason) => Err(GenerationError::MalformedResponse(format!(
                "no text in first candidate (finishReason {})",
                reason
            ))),
            None => Err(GenerationError::MalformedResponse(
                "missing candidates[0].content.parts[0].text".to_string(),
            )),
        }
    }
}
