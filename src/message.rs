//! Platform-neutral snapshot of an inbound chat message.

use serde::{Deserialize, Serialize};

/// A received message, as seen by the relay core.
///
/// Every field may be missing on the platform side; absent values default
/// to empty strings, `false`, or `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Opaque author id, absent for anonymous senders
    pub author_id: Option<String>,
    /// Account handle
    pub author_name: String,
    /// Human-readable name
    pub author_display_name: String,
    /// Platform marks the account as a bot
    pub author_is_bot: bool,
    /// Message text
    pub content: String,
    /// Channel (chat) the message was posted in
    pub channel_id: String,
}

impl InboundMessage {
    /// Name used when addressing the author, never empty
    #[must_use]
    pub fn speaker_name(&self) -> &str {
        [self.author_name.as_str(), self.author_display_name.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .unwrap_or("Unknown User")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_name_fallbacks() {
        let mut msg = InboundMessage {
            author_name: "alice".to_string(),
            author_display_name: "Alice A".to_string(),
            ..InboundMessage::default()
        };
        assert_eq!(msg.speaker_name(), "alice");

        msg.author_name = "  ".to_string();
        assert_eq!(msg.speaker_name(), "Alice A");

        msg.author_display_name.clear();
        assert_eq!(msg.speaker_name(), "Unknown User");
    }
}
