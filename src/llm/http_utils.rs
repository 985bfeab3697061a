//! HTTP utilities for the backend client
//!
//! Common request/response handling: status checks, rate-limit detection,
//! and JSON path navigation.

use crate::config::get_llm_http_timeout_secs;
use crate::llm::LlmError;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Longest error body echoed back in an error message
const MAX_ERROR_BODY: usize = 500;

/// Creates an HTTP client configured with the standard backend timeout.
///
/// Uses `LLM_HTTP_TIMEOUT_SECS` environment variable or 60s default.
#[must_use]
pub fn create_http_client() -> HttpClient {
    let timeout = Duration::from_secs(get_llm_http_timeout_secs());
    HttpClient::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Sends an HTTP POST request with JSON body and returns parsed JSON response.
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues,
/// `LlmError::RateLimit` on 429, `LlmError::ApiError` on other non-success
/// status codes, or `LlmError::JsonError` if parsing fails.
pub async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    auth_header: Option<&str>,
    extra_headers: &[(&str, &str)],
) -> Result<Value, LlmError> {
    let mut request = client.post(url).json(body);

    if let Some(auth) = auth_header {
        request = request.header("Authorization", auth);
    }

    for (key, value) in extra_headers {
        request = request.header(*key, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let wait_secs = retry_after_secs(response.headers());
        let error_text = response.text().await.unwrap_or_default();
        return Err(status_error(status, &error_text, wait_secs));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Map a failed response to an error without leaking HTML pages or huge bodies.
fn status_error(status: StatusCode, body: &str, wait_secs: Option<u64>) -> LlmError {
    let trimmed = body.trim_start();
    let is_html = trimmed.starts_with("<!DOCTYPE")
        || trimmed.starts_with("<html")
        || trimmed.starts_with("<HTML");

    let detail = if is_html {
        "(Server returned HTML error page)".to_string()
    } else if body.chars().count() > MAX_ERROR_BODY {
        let truncated: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{truncated}... (truncated)")
    } else {
        body.to_string()
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return LlmError::RateLimit {
            wait_secs,
            message: detail,
        };
    }

    LlmError::ApiError(format!("{status} - {detail}"))
}

/// Navigates a JSON value by path segments (object keys or array indices).
///
/// # Example
/// ```ignore
/// let content = extract_value(&response, &["choices", "0", "message", "content"]);
/// ```
#[must_use]
pub fn extract_value<'a>(response: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(response, |current, segment| {
        segment
            .parse::<usize>()
            .map_or_else(|_| current.get(*segment), |index| current.get(index))
    })
}
