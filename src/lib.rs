//! Telegram relay between chat users and a Shapes AI persona
//!
//! The [`loop_guard`] keeps the bot from talking to other bots, the
//! [`formatter`] turns AI replies into text plus image embeds, and [`bot`]
//! wires both into a teloxide dispatcher.

/// Telegram binding and message flow
pub mod bot;
/// Settings and tuning constants
pub mod config;
/// Reply formatting and media extraction
pub mod formatter;
/// Concurrency limits for external resources
pub mod limits;
/// Shapes API client
pub mod llm;
/// Bot-to-bot loop prevention
pub mod loop_guard;
/// Platform-neutral inbound message
pub mod message;
/// Text splitting and retry helpers
pub mod utils;
