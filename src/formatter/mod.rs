//! Response formatting
//!
//! Turns raw backend text into a [`FormattedReply`]: clean text plus image
//! embeds. Two strategies exist, selected by [`ReplyFormat`]:
//! [`multi::format_reply`] extracts every image URL and is the default,
//! [`single::format_reply_single`] reproduces the older one-URL behavior.
//!
//! Formatting never fails. Unparsable URLs are not media, and inputs that are
//! not strings pass through as text.

pub mod media;
pub mod multi;
pub mod single;

pub use media::{MediaClassifier, MediaKind, MediaReference};
pub use multi::format_reply;
pub use single::format_reply_single;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text and media split out of a backend response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedReply {
    /// Cleaned text, absent when only media remained
    pub text: Option<String>,
    /// Image embeds in order of first appearance
    pub media_embeds: Vec<MediaReference>,
}

impl FormattedReply {
    /// Reply carrying `text` unchanged and no media
    #[must_use]
    pub fn passthrough(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            media_embeds: Vec::new(),
        }
    }

    /// True when there is nothing worth sending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.media_embeds.is_empty() && self.text.as_deref().is_none_or(|t| t.trim().is_empty())
    }

    /// Convert into the platform-neutral reply payload
    #[must_use]
    pub fn into_payload(self) -> ReplyPayload {
        ReplyPayload {
            text: self.text,
            embeds: self
                .media_embeds
                .into_iter()
                .filter(|m| m.kind == MediaKind::Image)
                .map(|m| Embed { image_url: m.url })
                .collect(),
        }
    }
}

/// One image embed in a reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Embed {
    /// Absolute image URL
    pub image_url: String,
}

/// Reply handed to the chat platform: `{ text?, embeds?: [{ imageUrl }] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPayload {
    /// Message text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image embeds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

impl ReplyPayload {
    /// Text-only payload
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            embeds: Vec::new(),
        }
    }
}

/// Which extraction strategy to apply
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyFormat {
    /// Every image URL becomes an embed
    #[default]
    Multi,
    /// Only the last whole-line media URL is handled
    Single,
}

impl ReplyFormat {
    /// Parse a configured value, falling back to [`ReplyFormat::Multi`].
    #[must_use]
    pub fn from_setting(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("single") => Self::Single,
            _ => Self::Multi,
        }
    }
}

/// Formats backend responses with a fixed strategy and classifier
#[derive(Debug, Clone, Default)]
pub struct ResponseFormatter {
    classifier: MediaClassifier,
    format: ReplyFormat,
}

impl ResponseFormatter {
    /// Create a formatter
    #[must_use]
    pub const fn new(classifier: MediaClassifier, format: ReplyFormat) -> Self {
        Self { classifier, format }
    }

    /// Format raw response text
    #[must_use]
    pub fn format(&self, raw: &str) -> FormattedReply {
        match self.format {
            ReplyFormat::Multi => format_reply(raw, &self.classifier),
            ReplyFormat::Single => format_reply_single(raw, &self.classifier),
        }
    }

    /// Format a raw JSON content value from the backend.
    ///
    /// Strings are formatted; `null` becomes empty text; any other value is
    /// passed through as its JSON rendering.
    #[must_use]
    pub fn format_content(&self, content: &Value) -> FormattedReply {
        match content {
            Value::String(s) => self.format(s),
            Value::Null => FormattedReply::passthrough(""),
            other => FormattedReply::passthrough(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_string_content_passthrough() {
        let formatter = ResponseFormatter::default();
        assert_eq!(
            formatter.format_content(&json!(123)),
            FormattedReply::passthrough("123")
        );
        assert!(formatter.format_content(&Value::Null).is_empty());
    }

    #[test]
    fn test_payload_shape() -> Result<(), serde_json::Error> {
        let reply = ResponseFormatter::default().format("Look <https://x.com/a.png>");
        let payload = serde_json::to_value(reply.into_payload())?;
        assert_eq!(
            payload,
            json!({"text": "Look", "embeds": [{"imageUrl": "https://x.com/a.png"}]})
        );

        let payload = serde_json::to_value(ReplyPayload::text("hi"))?;
        assert_eq!(payload, json!({"text": "hi"}));
        Ok(())
    }

    #[test]
    fn test_reply_format_setting() {
        assert_eq!(ReplyFormat::from_setting(Some(" Single ")), ReplyFormat::Single);
        assert_eq!(ReplyFormat::from_setting(Some("multi")), ReplyFormat::Multi);
        assert_eq!(ReplyFormat::from_setting(Some("bogus")), ReplyFormat::Multi);
        assert_eq!(ReplyFormat::from_setting(None), ReplyFormat::Multi);
    }

    #[test]
    fn test_single_strategy_selected() {
        let formatter = ResponseFormatter::new(MediaClassifier::default(), ReplyFormat::Single);
        let reply = formatter.format("a <https://x.com/a.png>\nhttps://x.com/b.png");
        assert_eq!(reply.text.as_deref(), Some("a <https://x.com/a.png>"));
        assert_eq!(reply.media_embeds.len(), 1);
    }
}
