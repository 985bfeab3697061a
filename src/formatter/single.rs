//! Single-URL formatter kept for replies shaped like the earlier deployment.
//!
//! Only the last line that is nothing but a media URL is considered. Images
//! become an embed; audio and video links go back into the text as a
//! trailing line since the platform cannot embed them.

use super::media::{unwrap_angle_brackets, MediaClassifier, MediaKind, MediaReference};
use super::FormattedReply;

/// Extract at most one media URL (the last whole-line one) from `raw`.
#[must_use]
pub fn format_reply_single(raw: &str, classifier: &MediaClassifier) -> FormattedReply {
    if raw.is_empty() {
        return FormattedReply::passthrough(raw);
    }

    let lines: Vec<&str> = raw.lines().collect();
    let found = lines.iter().enumerate().rev().find_map(|(index, line)| {
        let candidate = unwrap_angle_brackets(line.trim());
        if candidate.is_empty() || candidate.contains(char::is_whitespace) {
            return None;
        }
        let kind = classifier.classify(candidate);
        kind.is_media().then_some((index, candidate, kind))
    });

    let Some((media_index, url, kind)) = found else {
        return FormattedReply::passthrough(raw);
    };

    let remainder = lines
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != media_index)
        .map(|(_, line)| *line)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    if kind == MediaKind::Image {
        return FormattedReply {
            text: (!remainder.is_empty()).then_some(remainder),
            media_embeds: vec![MediaReference {
                url: url.to_string(),
                kind,
            }],
        };
    }

    let text = if remainder.is_empty() {
        url.to_string()
    } else {
        format!("{remainder}\n{url}")
    };
    FormattedReply::passthrough(&text)
}
