//! Text splitting and Telegram retry helpers.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Split `message` into parts of at most `max_length` bytes.
///
/// Lines are kept whole where possible. A single line longer than the limit
/// is cut at grapheme boundaries.
///
/// # Examples
///
/// ```
/// use shape_relay::utils::split_long_message;
/// let long_msg = "A very long message...\n".repeat(300);
/// let parts = split_long_message(&long_msg, 4000);
/// assert!(parts.len() > 1);
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }
    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();

    for line in message.lines() {
        if line.len() > max_length {
            flush(&mut parts, &mut current);
            for grapheme in line.graphemes(true) {
                if current.len() + grapheme.len() > max_length {
                    flush(&mut parts, &mut current);
                }
                current.push_str(grapheme);
            }
            current.push('\n');
            continue;
        }

        if current.len() + line.len() + 1 > max_length {
            flush(&mut parts, &mut current);
        }
        current.push_str(line);
        current.push('\n');
    }
    flush(&mut parts, &mut current);

    parts
}

fn flush(parts: &mut Vec<String>, current: &mut String) {
    let part = current.trim_end();
    if !part.is_empty() {
        parts.push(part.to_string());
    }
    current.clear();
}

/// Truncate to at most `max_chars` characters (not bytes).
///
/// # Examples
///
/// ```
/// use shape_relay::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a Telegram API operation with exponential backoff and jitter.
///
/// Delays start at `TELEGRAM_API_INITIAL_BACKOFF_MS`, are capped at
/// `TELEGRAM_API_MAX_BACKOFF_MS`, and at most `TELEGRAM_API_MAX_RETRIES`
/// retries are made. The last error is returned.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!("Telegram API operation failed after {TELEGRAM_API_MAX_RETRIES} retries: {e}");
        e
    })
}
