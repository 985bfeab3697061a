//! Multi-URL formatter: every image URL in the response becomes an embed.

use super::media::{find_urls, MediaClassifier, MediaKind, MediaReference, TRAILING_PUNCTUATION};
use super::FormattedReply;
use regex::{Captures, Regex};
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Extract all image URLs from `raw` and strip them from the text.
///
/// Text without any image URL is returned unchanged. Video and audio URLs
/// stay in the text as plain links.
#[must_use]
pub fn format_reply(raw: &str, classifier: &MediaClassifier) -> FormattedReply {
    if raw.is_empty() {
        return FormattedReply::passthrough(raw);
    }

    let images = collect_images(raw, classifier);
    if images.is_empty() {
        return FormattedReply::passthrough(raw);
    }

    debug!(count = images.len(), "formatter: extracted image embeds");

    // Longest first so a URL never eats the head of a longer one
    let mut removal_order: Vec<&str> = images.iter().map(|m| m.url.as_str()).collect();
    removal_order.sort_by_key(|url| Reverse(url.len()));

    let mut stripped = raw.to_string();
    for url in removal_order {
        stripped = remove_url(&stripped, url);
    }

    let cleaned = stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    FormattedReply {
        text: (!cleaned.is_empty()).then_some(cleaned),
        media_embeds: images,
    }
}

fn collect_images(raw: &str, classifier: &MediaClassifier) -> Vec<MediaReference> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for line in raw.lines() {
        for url in find_urls(line) {
            if classifier.classify(url) == MediaKind::Image && seen.insert(url) {
                images.push(MediaReference {
                    url: url.to_string(),
                    kind: MediaKind::Image,
                });
            }
        }
    }

    images
}

/// Remove every `<url>` token and every bare occurrence of `url` from `text`.
fn remove_url(text: &str, url: &str) -> String {
    let escaped = regex::escape(url);
    let pattern = match Regex::new(&format!("<{escaped}>|{escaped}")) {
        Ok(re) => re,
        Err(e) => {
            warn!("formatter: could not build removal pattern for {url}: {e}");
            return text.to_string();
        }
    };

    pattern
        .replace_all(text, |caps: &Captures| {
            let Some(m) = caps.get(0) else {
                return String::new();
            };
            if m.as_str().starts_with('<') {
                return String::new();
            }
            // A bare match glued to more URL characters belongs to a longer URL
            if continues_url(&text[m.end()..]) || inside_url(&text[..m.start()]) {
                m.as_str().to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

fn continues_url(rest: &str) -> bool {
    let tail = rest
        .split(|c: char| c.is_whitespace() || c == '<' || c == '>')
        .next()
        .unwrap_or_default();
    !tail.trim_end_matches(TRAILING_PUNCTUATION).is_empty()
}

fn inside_url(head: &str) -> bool {
    let token = head
        .rsplit(|c: char| c.is_whitespace() || c == '<' || c == '>')
        .next()
        .unwrap_or_default();
    token.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(raw: &str) -> FormattedReply {
        format_reply(raw, &MediaClassifier::default())
    }

    fn image(url: &str) -> MediaReference {
        MediaReference {
            url: url.to_string(),
            kind: MediaKind::Image,
        }
    }

    #[test]
    fn test_empty_passthrough() {
        let reply = format("");
        assert_eq!(reply.text.as_deref(), Some(""));
        assert!(reply.media_embeds.is_empty());
    }

    #[test]
    fn test_bracketed_image_mid_line() {
        let reply = format("Here is your image: <https://x.com/a.png>");
        assert_eq!(reply.text.as_deref(), Some("Here is your image:"));
        assert_eq!(reply.media_embeds, vec![image("https://x.com/a.png")]);
    }

    #[test]
    fn test_whole_line_bare_image() {
        let reply = format("https://x.com/a.png");
        assert_eq!(reply.text, None);
        assert_eq!(reply.media_embeds, vec![image("https://x.com/a.png")]);
    }

    #[test]
    fn test_duplicate_images_deduplicated() {
        let reply = format("https://x.com/a.png\n<https://x.com/a.png>\nhttps://x.com/a.png");
        assert_eq!(reply.text, None);
        assert_eq!(reply.media_embeds, vec![image("https://x.com/a.png")]);
    }

    #[test]
    fn test_multiple_images_keep_order() {
        let reply = format("one https://x.com/b.jpg\ntwo\n<https://x.com/a.png>");
        assert_eq!(reply.text.as_deref(), Some("one\ntwo"));
        assert_eq!(
            reply.media_embeds,
            vec![image("https://x.com/b.jpg"), image("https://x.com/a.png")]
        );
    }

    #[test]
    fn test_video_stays_as_link() {
        let raw = "check this https://x.com/clip.mp4";
        let reply = format(raw);
        assert_eq!(reply.text.as_deref(), Some(raw));
        assert!(reply.media_embeds.is_empty());
    }

    #[test]
    fn test_mixed_media_only_strips_images() {
        let reply = format("song https://x.com/s.mp3\n\n   https://x.com/a.png   \n  bye  ");
        assert_eq!(reply.text.as_deref(), Some("song https://x.com/s.mp3\nbye"));
        assert_eq!(reply.media_embeds, vec![image("https://x.com/a.png")]);
    }

    #[test]
    fn test_regex_characters_in_url_are_escaped() {
        let url = "https://x.com/a+b(1).png?x=[2]&y=$3";
        let reply = format(&format!("look\n{url}"));
        assert_eq!(reply.text.as_deref(), Some("look"));
        assert_eq!(reply.media_embeds, vec![image(url)]);
    }

    #[test]
    fn test_longer_url_not_truncated() {
        let raw = "https://x.com/a.png\nsee https://x.com/a.png.html for details";
        let reply = format(raw);
        assert_eq!(
            reply.text.as_deref(),
            Some("see https://x.com/a.png.html for details")
        );
        assert_eq!(reply.media_embeds, vec![image("https://x.com/a.png")]);
    }

    #[test]
    fn test_url_at_tail_of_other_link_not_cut() {
        let raw = "see https://proxy.com/?u=https://x.com/a.png\nhttps://x.com/a.png";
        let reply = format(raw);
        assert_eq!(
            reply.text.as_deref(),
            Some("see https://proxy.com/?u=https://x.com/a.png")
        );
        assert_eq!(reply.media_embeds, vec![image("https://x.com/a.png")]);
    }

    #[test]
    fn test_trailing_punctuation_kept_in_text() {
        let reply = format("Done: https://x.com/a.png.");
        assert_eq!(reply.text.as_deref(), Some("Done: ."));
        assert_eq!(reply.media_embeds, vec![image("https://x.com/a.png")]);
    }
}
