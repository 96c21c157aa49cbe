//! Trigger check and prompt extraction for inbound chat text.

use crate::config::{default_prompt, default_trigger_prefix, TriggerConfig};

/// Decides whether a message is addressed to the bot and extracts the prompt.
#[derive(Debug, Clone)]
pub struct Trigger {
    prefix: String,
    case_sensitive: bool,
    default_prompt: String,
}

impl Default for Trigger {
    fn default() -> Self {
        Self::from_config(&TriggerConfig::default())
    }
}

impl Trigger {
    /// Empty prefix or default prompt fall back to the built-in values so a
    /// bare message can never trigger and the generator never sees "".
    pub fn new(
        prefix: impl Into<String>,
        case_sensitive: bool,
        default_prompt_text: impl Into<String>,
    ) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.trim().is_empty() {
            default_trigger_prefix()
        } else {
            prefix.trim().to_string()
        };
        let default_prompt_text = default_prompt_text.into();
        let default_prompt_text = if default_prompt_text.trim().is_empty() {
            default_prompt()
        } else {
            default_prompt_text.trim().to_string()
        };
        Self {
            prefix,
            case_sensitive,
            default_prompt: default_prompt_text,
        }
    }

    pub fn from_config(config: &TriggerConfig) -> Self {
        Self::new(
            config.prefix.clone(),
            config.case_sensitive,
            config.default_prompt.clone(),
        )
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn default_prompt(&self) -> &str {
        &self.default_prompt
    }

    /// Returns the prompt when `text` starts with the prefix, otherwise None.
    /// The prefix is removed once from the start; the rest is trimmed.
    pub fn extract(&self, text: &str) -> Option<String> {
        let rest = self.strip_prefix(text)?;
        let prompt = rest.trim();
        if prompt.is_empty() {
            Some(self.default_prompt.clone())
        } else {
            Some(prompt.to_string())
        }
    }

    fn strip_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.case_sensitive {
            return text.strip_prefix(self.prefix.as_str());
        }
        // Compare char-wise so a multi-byte character straddling the prefix
        // length never produces an invalid slice.
        let mut chars = text.char_indices();
        for p in self.prefix.chars() {
            let (_, c) = chars.next()?;
            if !c.to_lowercase().eq(p.to_lowercase()) {
                return None;
            }
        }
        match chars.next() {
            Some((idx, _)) => Some(&text[idx..]),
            None => Some(""),
        }
    }
}
