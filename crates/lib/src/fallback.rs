//! Stock replies used when generation fails.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("fallback set must contain at least one reply")]
    Empty,
}

/// Non-empty, immutable list of stock phrases.
#[derive(Debug, Clone)]
pub struct FallbackSet {
    replies: Vec<String>,
}

impl FallbackSet {
    pub fn new(replies: Vec<String>) -> Result<Self, FallbackError> {
        if replies.is_empty() {
            return Err(FallbackError::Empty);
        }
        Ok(Self { replies })
    }

    pub fn replies(&self) -> &[String] {
        &self.replies
    }

    pub fn contains(&self, text: &str) -> bool {
        self.replies.iter().any(|r| r == text)
    }

    /// Uniform pick using the thread-local RNG.
    pub fn pick(&self) -> &str {
        self.pick_with(&mut rand::thread_rng())
    }

    /// Uniform pick using the given RNG.
    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        // `new` rejects empty sets, so `choose` always yields.
        self.replies
            .choose(rng)
            .map(String::as_str)
            .unwrap_or_default()
    }
}
