//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.masala/config.json`) and environment.
//! Credentials are normally supplied through the environment (`DISCORD_TOKEN`,
//! `GEMINI_API_KEY`); `PORT` overrides the keep-alive port.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Keep-alive HTTP server settings.
    #[serde(default)]
    pub keep_alive: KeepAliveConfig,

    /// Discord connection settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Gemini generation provider settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Trigger prefix and prompt extraction.
    #[serde(default)]
    pub trigger: TriggerConfig,

    /// Stock replies used when generation fails. Empty => built-in list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_replies: Vec<String>,
}

/// Keep-alive bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepAliveConfig {
    /// Port for the health-check server (default 8080). Overridden by PORT env.
    #[serde(default = "default_keep_alive_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0" so the hosting platform can reach it).
    #[serde(default = "default_keep_alive_bind")]
    pub bind: String,
}

fn default_keep_alive_port() -> u16 {
    8080
}

fn default_keep_alive_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            port: default_keep_alive_port(),
            bind: default_keep_alive_bind(),
        }
    }
}

/// Discord bot settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    /// Bot token from the Discord developer portal. Overridden by DISCORD_TOKEN env.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Gemini API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    /// API key. Overridden by GEMINI_API_KEY env.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model id used in `models/{model}:generateContent`.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API root, without trailing slash. Tests point this at a local server.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Upper bound for one generation call, in seconds.
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,

    /// When true, every request starts with the fixed persona priming exchange.
    #[serde(default = "default_true")]
    pub persona: bool,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout_secs(),
            persona: true,
        }
    }
}

impl GeminiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Trigger settings: which messages the bot answers and what it asks when the prompt is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// Prefix that marks a message for the bot (default "!bot").
    #[serde(default = "default_trigger_prefix")]
    pub prefix: String,

    /// Match the prefix case-sensitively (default false: "!BOT" also triggers).
    #[serde(default)]
    pub case_sensitive: bool,

    /// Prompt used when nothing follows the prefix.
    #[serde(default = "default_prompt")]
    pub default_prompt: String,
}

pub(crate) fn default_trigger_prefix() -> String {
    "!bot".to_string()
}

pub(crate) fn default_prompt() -> String {
    "Tu kaun hai?".to_string()
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            prefix: default_trigger_prefix(),
            case_sensitive: false,
            default_prompt: default_prompt(),
        }
    }
}

/// Built-in Hinglish stock replies.
pub const DEFAULT_FALLBACK_REPLIES: &[&str] = &[
    "Arey bhai, thoda ruk ja... server gaya lol..",
    "API ne resign de diya yaar 😭",
    "Internet slow chal raha hai, jaise school ki WiFi 😅",
    "Gemini abhi chai peene gaya hai ☕",
    "Mujhe mat bol, Google ka server hi off hai 😂",
    "Bhai, thoda ruk ja... sochta hoon 🤔",
    "Tu mast banda hai, sachi!",
    "Kya baat hai! Ye to badiya bola tune!",
    "Mujhe thoda aur bol, fir mai reply deta hoon 😉",
    "Arey wah, tu to intelligent nikla! 🧠",
];

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn env_non_blank(key: &str) -> Option<String> {
    non_blank(std::env::var(key).ok())
}

/// Resolve the Discord token: env DISCORD_TOKEN (or legacy `discord_token`) overrides config.
pub fn resolve_discord_token(config: &Config) -> Option<String> {
    env_non_blank("DISCORD_TOKEN")
        .or_else(|| env_non_blank("discord_token"))
        .or_else(|| non_blank(config.discord.token.clone()))
}

/// Resolve the Gemini API key: env GEMINI_API_KEY overrides config.
pub fn resolve_gemini_api_key(config: &Config) -> Option<String> {
    env_non_blank("GEMINI_API_KEY").or_else(|| non_blank(config.gemini.api_key.clone()))
}

/// Resolve the keep-alive port: env PORT overrides config. Unparseable PORT is ignored.
pub fn resolve_keep_alive_port(config: &Config) -> u16 {
    match env_non_blank("PORT") {
        Some(raw) => parse_port(&raw).unwrap_or_else(|| {
            log::warn!(
                "ignoring invalid PORT value {:?}, using {}",
                raw,
                config.keep_alive.port
            );
            config.keep_alive.port
        }),
        None => config.keep_alive.port,
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok()
}

/// Stock replies from config, or the built-in list when none are usable.
pub fn resolve_fallback_replies(config: &Config) -> Vec<String> {
    let configured: Vec<String> = config
        .fallback_replies
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if !configured.is_empty() {
        return configured;
    }
    if !config.fallback_replies.is_empty() {
        log::warn!("fallbackReplies contains only blank entries, using built-in replies");
    }
    DEFAULT_FALLBACK_REPLIES.iter().map(|s| s.to_string()).collect()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("MASALA_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".masala").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default path). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
