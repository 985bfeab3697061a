//! Media URL detection and classification.

// lazy_regex! statics are validated at compile time
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// File extensions rendered as image embeds
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
/// File extensions recognized as video
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv"];
/// File extensions recognized as audio
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac"];

/// Characters that end a sentence rather than a URL
pub(crate) const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"'];

/// Match a URL wrapped in angle brackets, or a bare URL
static RE_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"<(?P<wrapped>https?://[^<>\s]+)>|(?P<bare>https?://[^<>\s]+)");

/// Kind of media a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image, embeddable
    Image,
    /// Video clip, kept as a plain link
    Video,
    /// Audio clip, kept as a plain link
    Audio,
    /// Not media, or not parseable
    None,
}

impl MediaKind {
    /// Whether this kind is treated as media at all
    #[must_use]
    pub const fn is_media(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A URL found in a response together with its classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    /// URL exactly as it appeared in the text
    pub url: String,
    /// Classified media kind
    pub kind: MediaKind,
}

/// Classifies URLs by file extension and, optionally, by hosting domain.
#[derive(Debug, Clone, Default)]
pub struct MediaClassifier {
    image_hosts: Vec<String>,
}

impl MediaClassifier {
    /// Create a classifier that also treats extensionless paths on the given
    /// hosts as images.
    #[must_use]
    pub fn new(image_hosts: Vec<String>) -> Self {
        Self {
            image_hosts: image_hosts
                .into_iter()
                .map(|h| h.trim().to_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Classify a URL. Anything unparsable is `MediaKind::None`.
    #[must_use]
    pub fn classify(&self, raw: &str) -> MediaKind {
        let Ok(url) = Url::parse(raw) else {
            return MediaKind::None;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return MediaKind::None;
        }

        // Url::path() already excludes query and fragment
        let last_segment = url.path().rsplit('/').next().unwrap_or_default();
        if let Some(kind) = kind_for_segment(last_segment) {
            return kind;
        }

        let has_path = !url.path().trim_matches('/').is_empty();
        match url.host_str() {
            Some(host) if has_path && self.is_image_host(host) => MediaKind::Image,
            _ => MediaKind::None,
        }
    }

    fn is_image_host(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        self.image_hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    }
}

fn kind_for_segment(segment: &str) -> Option<MediaKind> {
    let (_, ext) = segment.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Audio)
    } else {
        None
    }
}

/// Find every URL candidate in `text`, in order of appearance.
///
/// Bracketed URLs are returned without their brackets. Bare URLs lose any
/// trailing sentence punctuation.
#[must_use]
pub fn find_urls(text: &str) -> Vec<&str> {
    RE_URL
        .captures_iter(text)
        .filter_map(|caps| {
            if let Some(m) = caps.name("wrapped") {
                Some(m.as_str())
            } else {
                caps.name("bare")
                    .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
            }
        })
        .filter(|url| !url.is_empty())
        .collect()
}

/// Unwrap a single `<url>` token, returning the inner URL.
#[must_use]
pub fn unwrap_angle_brackets(token: &str) -> &str {
    token
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> MediaClassifier {
        MediaClassifier::new(vec!["files.shapes.inc".to_string()])
    }

    #[test]
    fn test_classify_by_extension() {
        let c = classifier();
        assert_eq!(c.classify("https://x.com/a.png"), MediaKind::Image);
        assert_eq!(c.classify("https://x.com/a.JPEG"), MediaKind::Image);
        assert_eq!(c.classify("https://x.com/clip.mp4"), MediaKind::Video);
        assert_eq!(c.classify("https://x.com/song.mp3"), MediaKind::Audio);
        assert_eq!(c.classify("https://x.com/page.html"), MediaKind::None);
        assert_eq!(c.classify("https://x.com/"), MediaKind::None);
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        let c = classifier();
        assert_eq!(c.classify("https://x.com/a.png?size=large"), MediaKind::Image);
        assert_eq!(c.classify("https://x.com/a.gif#frame"), MediaKind::Image);
        assert_eq!(c.classify("https://x.com/page?file=a.png"), MediaKind::None);
    }

    #[test]
    fn test_malformed_url_is_not_media() {
        let c = classifier();
        assert_eq!(c.classify("https://"), MediaKind::None);
        assert_eq!(c.classify("not a url.png"), MediaKind::None);
        assert_eq!(c.classify("ftp://x.com/a.png"), MediaKind::None);
    }

    #[test]
    fn test_image_host_without_extension() {
        let c = classifier();
        assert_eq!(
            c.classify("https://files.shapes.inc/api/files/abc123"),
            MediaKind::Image
        );
        assert_eq!(c.classify("https://files.shapes.inc/"), MediaKind::None);
        assert_eq!(
            MediaClassifier::default().classify("https://files.shapes.inc/abc"),
            MediaKind::None
        );
    }

    #[test]
    fn test_find_urls_order_and_brackets() {
        let text = "first <https://a.com/1.png> then https://b.com/2.jpg.";
        assert_eq!(
            find_urls(text),
            vec!["https://a.com/1.png", "https://b.com/2.jpg"]
        );
    }

    #[test]
    fn test_unwrap_angle_brackets() {
        assert_eq!(unwrap_angle_brackets("<https://x.com>"), "https://x.com");
        assert_eq!(unwrap_angle_brackets("https://x.com"), "https://x.com");
        assert_eq!(unwrap_angle_brackets("<https://x.com"), "<https://x.com");
    }
}
