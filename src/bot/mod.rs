//! Telegram side of the relay
//!
//! [`handler`] is the dispatcher endpoint: it converts the update, runs the
//! [`relay::Relay`] and delivers the outcome through [`transport`].

/// Activated-channel persistence
pub mod channels;
/// Slash-command table and parser
pub mod commands;
/// Telegram message conversion
pub mod inbound;
/// User-facing notice templates
pub mod messages;
/// Platform-neutral message flow
pub mod relay;
/// Reply delivery with retries
pub mod transport;

pub use channels::ActiveChannels;
pub use relay::{Outcome, Relay};

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use transport::{ReplyOnce, ReplyTarget};

/// Handle one Telegram message end to end.
///
/// # Errors
///
/// Returns an error if the reply could not be delivered.
pub async fn handler(bot: Bot, msg: Message, relay: Arc<Relay>) -> Result<()> {
    let inbound = inbound::from_telegram(&msg);
    if !relay.admit(&inbound) || !relay.expects_reply(&inbound).await {
        return Ok(());
    }

    let stop_typing = CancellationToken::new();
    let typing = transport::spawn_typing(
        bot.clone(),
        msg.chat.id,
        relay.limits().clone(),
        stop_typing.clone(),
    );
    let outcome = relay.respond(&inbound).await;
    stop_typing.cancel();
    if let Err(e) = typing.await {
        tracing::debug!("Typing task ended abnormally: {e}");
    }

    let target = ReplyTarget {
        chat_id: msg.chat.id,
        reply_to: msg.id,
    };
    transport::deliver(&bot, relay.limits(), target, outcome, &ReplyOnce::default()).await
}
