//! Telegram message to [`InboundMessage`] conversion.

use crate::message::InboundMessage;
use teloxide::types::{Message, User, UserId};

/// `@GroupAnonymousBot`, the sender Telegram shows for anonymous group admins
const ANONYMOUS_ADMIN_ID: UserId = UserId(1_087_968_824);
/// `@Channel_Bot`, the sender Telegram shows for posts made on behalf of a channel
const CHANNEL_BOT_ID: UserId = UserId(136_817_688);

/// Snapshot of a Telegram message for the relay core.
///
/// Text messages use their text, media messages their caption. Messages
/// without a personal sender (channel posts, anonymous admins, posts on
/// behalf of a chat) keep every author field at its default.
#[must_use]
pub fn from_telegram(msg: &Message) -> InboundMessage {
    let content = msg.text().or_else(|| msg.caption()).unwrap_or_default();
    let mut inbound = InboundMessage {
        content: content.to_string(),
        channel_id: msg.chat.id.to_string(),
        ..InboundMessage::default()
    };
    if let Some(user) = personal_sender(msg) {
        fill_author(&mut inbound, user);
    }
    inbound
}

/// The human or bot account behind `msg`, if Telegram exposes one.
///
/// Chat-signed messages carry a shared placeholder account in `from`; it
/// must not be treated as the author.
fn personal_sender(msg: &Message) -> Option<&User> {
    if msg.sender_chat.is_some() {
        return None;
    }
    msg.from
        .as_ref()
        .filter(|user| user.id != ANONYMOUS_ADMIN_ID && user.id != CHANNEL_BOT_ID)
}

fn fill_author(inbound: &mut InboundMessage, user: &User) {
    inbound.author_id = Some(user.id.to_string());
    inbound.author_name = user.username.clone().unwrap_or_default();
    inbound.author_display_name = user.full_name();
    inbound.author_is_bot = user.is_bot;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn user(is_bot: bool, username: Option<&str>) -> Result<User, serde_json::Error> {
        serde_json::from_value(json!({
            "id": 42,
            "is_bot": is_bot,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "username": username,
        }))
    }

    #[test]
    fn test_author_fields() -> Result<(), serde_json::Error> {
        let mut inbound = InboundMessage::default();
        fill_author(&mut inbound, &user(true, Some("ada_bot"))?);
        assert_eq!(inbound.author_id.as_deref(), Some("42"));
        assert_eq!(inbound.author_name, "ada_bot");
        assert_eq!(inbound.author_display_name, "Ada Lovelace");
        assert!(inbound.author_is_bot);
        Ok(())
    }

    fn group_message(
        from: &Value,
        sender_chat: Option<&Value>,
    ) -> Result<Message, serde_json::Error> {
        let mut raw = json!({
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": {"id": -1_001_234_567_890_i64, "type": "supergroup", "title": "Group"},
            "from": from,
            "text": "hello everyone",
        });
        if let (Some(chat), Some(obj)) = (sender_chat, raw.as_object_mut()) {
            obj.insert("sender_chat".to_string(), chat.clone());
        }
        serde_json::from_value(raw)
    }

    #[test]
    fn test_anonymous_admin_has_no_author() -> Result<(), serde_json::Error> {
        let from = json!({
            "id": 1_087_968_824,
            "is_bot": true,
            "first_name": "Group",
            "username": "GroupAnonymousBot",
        });
        let chat = json!({"id": -1_001_234_567_890_i64, "type": "supergroup", "title": "Group"});
        let msg = group_message(&from, Some(&chat))?;

        let inbound = from_telegram(&msg);
        assert_eq!(inbound.author_id, None);
        assert!(!inbound.author_is_bot);
        assert_eq!(inbound.author_name, "");
        assert_eq!(inbound.content, "hello everyone");
        assert_eq!(inbound.channel_id, "-1001234567890");
        Ok(())
    }

    #[test]
    fn test_placeholder_account_ignored_without_sender_chat() -> Result<(), serde_json::Error> {
        let from = json!({
            "id": 136_817_688,
            "is_bot": true,
            "first_name": "Channel",
            "username": "Channel_Bot",
        });
        let inbound = from_telegram(&group_message(&from, None)?);
        assert_eq!(inbound.author_id, None);
        assert!(!inbound.author_is_bot);
        Ok(())
    }

    #[test]
    fn test_regular_sender_is_kept() -> Result<(), serde_json::Error> {
        let from = json!({"id": 42, "is_bot": false, "first_name": "Ada", "username": "ada"});
        let inbound = from_telegram(&group_message(&from, None)?);
        assert_eq!(inbound.author_id.as_deref(), Some("42"));
        assert_eq!(inbound.author_name, "ada");
        Ok(())
    }

    #[test]
    fn test_missing_username_falls_back_to_display_name() -> Result<(), serde_json::Error> {
        let mut inbound = InboundMessage::default();
        fill_author(&mut inbound, &user(false, None)?);
        assert_eq!(inbound.author_name, "");
        assert_eq!(inbound.speaker_name(), "Ada Lovelace");
        Ok(())
    }
}
