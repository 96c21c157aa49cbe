//! Masala core library: Discord relay bot that answers `!bot` messages through Gemini,
//! plus the keep-alive HTTP server used by hosting platforms.

pub mod channels;
pub mod config;
pub mod fallback;
pub mod init;
pub mod keepalive;
pub mod llm;
pub mod pipeline;
pub mod relay;
pub mod trigger;
