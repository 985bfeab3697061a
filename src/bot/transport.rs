//! Sending relay outcomes to Telegram.
//!
//! Every API call goes through the platform admission gate and
//! [`retry_telegram_operation`]. A reply answers the triggering message;
//! follow-up parts of a split reply are sent as plain messages.

use crate::bot::relay::Outcome;
use crate::formatter::{Embed, ReplyPayload};
use crate::limits::{AdmissionLimits, Gate};
use crate::utils::{retry_telegram_operation, split_long_message, truncate_str};
use anyhow::Result;
use reqwest::Url;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{
    ChatAction, InputFile, InputMedia, InputMediaPhoto, MessageId, ParseMode, ReplyParameters,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Maximum text length per message, below Telegram's 4096 limit
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;
/// Maximum photo caption length
pub const TELEGRAM_CAPTION_LIMIT: usize = 1024;
/// Maximum photos per media group
pub const TELEGRAM_MEDIA_GROUP_LIMIT: usize = 10;

/// Telegram clears a chat action after about five seconds
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// Allows a single reply per inbound message
#[derive(Debug, Default)]
pub struct ReplyOnce(AtomicBool);

impl ReplyOnce {
    /// Returns `true` for the first caller only
    pub fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

/// Where a reply goes
#[derive(Debug, Clone, Copy)]
pub struct ReplyTarget {
    /// Chat of the triggering message
    pub chat_id: ChatId,
    /// Message being answered
    pub reply_to: MessageId,
}

/// Keep a "typing..." indicator up until `stop` is cancelled.
pub fn spawn_typing(
    bot: Bot,
    chat_id: ChatId,
    limits: AdmissionLimits,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TYPING_REFRESH);
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let action = async { bot.send_chat_action(chat_id, ChatAction::Typing).await };
                    if let Err(e) = limits.run(Gate::Platform, action).await {
                        warn!("Typing indicator failed: {e}");
                    }
                }
            }
        }
    })
}

/// Send `outcome` to `target`, at most once per `once`.
///
/// # Errors
///
/// Returns the last Telegram error once retries are exhausted.
pub async fn deliver(
    bot: &Bot,
    limits: &AdmissionLimits,
    target: ReplyTarget,
    outcome: Outcome,
    once: &ReplyOnce,
) -> Result<()> {
    if matches!(outcome, Outcome::Ignore) {
        return Ok(());
    }
    if !once.claim() {
        warn!(chat = %target.chat_id, "Reply already sent for this message, dropping another");
        return Ok(());
    }

    let sender = Sender { bot, limits, target };
    match outcome {
        Outcome::Ignore => Ok(()),
        Outcome::Notice(html) => sender.text(&html, Some(ParseMode::Html), true).await,
        Outcome::Reply(payload) => sender.payload(payload).await,
    }
}

struct Sender<'a> {
    bot: &'a Bot,
    limits: &'a AdmissionLimits,
    target: ReplyTarget,
}

impl Sender<'_> {
    async fn payload(&self, payload: ReplyPayload) -> Result<()> {
        let ReplyPayload { text, embeds } = payload;
        let text = text.filter(|t| !t.trim().is_empty());

        if let [embed] = embeds.as_slice() {
            let fits = text
                .as_deref()
                .is_none_or(|t| t.chars().count() <= TELEGRAM_CAPTION_LIMIT);
            if fits {
                return self.photo(embed, text.as_deref(), true).await;
            }
        }

        // Text rides as the caption of the first album when it fits
        let mut caption = text
            .as_deref()
            .filter(|t| t.chars().count() <= TELEGRAM_CAPTION_LIMIT);
        let mut first = true;
        if caption.is_none() {
            if let Some(text) = text.as_deref() {
                self.text(text, None, true).await?;
                first = false;
            }
        }
        for chunk in embeds.chunks(TELEGRAM_MEDIA_GROUP_LIMIT) {
            match chunk {
                [embed] => self.photo(embed, caption.take(), first).await?,
                _ => self.album(chunk, caption.take(), first).await?,
            }
            first = false;
        }
        if let Some(text) = caption {
            // No embeds at all
            self.text(text, None, true).await?;
        }
        Ok(())
    }

    async fn text(&self, text: &str, parse_mode: Option<ParseMode>, reply: bool) -> Result<()> {
        let chat_id = self.target.chat_id;
        for (i, part) in split_long_message(text, TELEGRAM_MESSAGE_LIMIT)
            .into_iter()
            .enumerate()
        {
            let reply_to = (reply && i == 0).then_some(self.target.reply_to);
            self.call(|| async {
                let mut req = self.bot.send_message(chat_id, part.clone());
                if let Some(pm) = parse_mode {
                    req = req.parse_mode(pm);
                }
                if let Some(id) = reply_to {
                    req = req.reply_parameters(ReplyParameters::new(id));
                }
                req.await
                    .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
            })
            .await?;
        }
        Ok(())
    }

    /// Send one image; falls back to a text link when Telegram rejects it.
    async fn photo(&self, embed: &Embed, caption: Option<&str>, reply: bool) -> Result<()> {
        let Ok(url) = Url::parse(&embed.image_url) else {
            return self.link_fallback(&[embed.image_url.as_str()], caption, reply).await;
        };
        let chat_id = self.target.chat_id;
        let reply_to = reply.then_some(self.target.reply_to);
        let caption = caption.map(|c| truncate_str(c, TELEGRAM_CAPTION_LIMIT));

        let sent = self
            .call(|| async {
                let mut req = self.bot.send_photo(chat_id, InputFile::url(url.clone()));
                if let Some(c) = caption.as_ref() {
                    req = req.caption(c.clone());
                }
                if let Some(id) = reply_to {
                    req = req.reply_parameters(ReplyParameters::new(id));
                }
                req.await
                    .map_err(|e| anyhow::anyhow!("Telegram photo error: {e}"))
            })
            .await;

        if let Err(e) = sent {
            warn!(url = %embed.image_url, "Failed to send photo, falling back to link: {e}");
            return self
                .link_fallback(&[embed.image_url.as_str()], caption.as_deref(), reply)
                .await;
        }
        Ok(())
    }

    /// Send 2..=10 images as one album
    async fn album(&self, embeds: &[Embed], caption: Option<&str>, reply: bool) -> Result<()> {
        let urls: Vec<Url> = embeds
            .iter()
            .filter_map(|e| Url::parse(&e.image_url).ok())
            .collect();
        let chat_id = self.target.chat_id;
        let reply_to = reply.then_some(self.target.reply_to);

        let sent = self
            .call(|| async {
                let media = urls.iter().enumerate().map(|(i, u)| {
                    let photo = InputMediaPhoto::new(InputFile::url(u.clone()));
                    match caption {
                        Some(c) if i == 0 => InputMedia::Photo(photo.caption(c)),
                        _ => InputMedia::Photo(photo),
                    }
                });
                let mut req = self.bot.send_media_group(chat_id, media);
                if let Some(id) = reply_to {
                    req = req.reply_parameters(ReplyParameters::new(id));
                }
                req.await
                    .map_err(|e| anyhow::anyhow!("Telegram media group error: {e}"))
            })
            .await;

        if let Err(e) = sent {
            warn!(count = embeds.len(), "Failed to send album, falling back to links: {e}");
            let links: Vec<&str> = embeds.iter().map(|e| e.image_url.as_str()).collect();
            return self.link_fallback(&links, caption, reply).await;
        }
        Ok(())
    }

    async fn link_fallback(&self, urls: &[&str], caption: Option<&str>, reply: bool) -> Result<()> {
        let mut text = caption.map(str::to_string).unwrap_or_default();
        for url in urls {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(url);
        }
        self.text(&text, None, reply).await
    }

    async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.limits
            .run(Gate::Platform, retry_telegram_operation(op))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_once_claims_once() {
        let once = ReplyOnce::default();
        assert!(once.claim());
        assert!(!once.claim());
        assert!(!once.claim());
    }

    #[tokio::test]
    async fn test_ignore_does_not_claim() -> Result<()> {
        let bot = Bot::new("0:test");
        let once = ReplyOnce::default();
        let target = ReplyTarget {
            chat_id: ChatId(1),
            reply_to: MessageId(1),
        };
        deliver(&bot, &AdmissionLimits::default(), target, Outcome::Ignore, &once).await?;
        assert!(once.claim());
        Ok(())
    }
}
