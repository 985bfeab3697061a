use super::http_utils::{create_http_client, extract_value, send_json_request};
use super::{BackendReply, ChatBackend, LlmError};
use crate::config::Settings;
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Shapes API client (OpenAI-compatible chat completions)
pub struct ShapesClient {
    http_client: HttpClient,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ShapesClient {
    /// Create a client for the shape named in `settings`
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            http_client: create_http_client(),
            endpoint: format!(
                "{}/chat/completions",
                settings.shapes_api_url.trim_end_matches('/')
            ),
            api_key: settings.shapesinc_api_key.clone(),
            model: settings.shape_model(),
        }
    }

    fn request_body(&self, content: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": content }
            ]
        })
    }

    fn parse_reply(response: &Value) -> Result<BackendReply, LlmError> {
        let has_choice = response
            .get("choices")
            .and_then(Value::as_array)
            .is_some_and(|choices| !choices.is_empty());
        if !has_choice {
            return Err(LlmError::ApiError("Empty response".to_string()));
        }

        let content = extract_value(response, &["choices", "0", "message", "content"])
            .cloned()
            .unwrap_or(Value::Null);

        let is_bot = [
            extract_value(response, &["isBot"]),
            extract_value(response, &["choices", "0", "message", "isBot"]),
        ]
        .into_iter()
        .flatten()
        .any(|flag| flag.as_bool() == Some(true));

        Ok(BackendReply { content, is_bot })
    }
}

#[async_trait]
impl ChatBackend for ShapesClient {
    #[instrument(skip(self, content), fields(model = %self.model))]
    async fn send(
        &self,
        user_id: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<BackendReply, LlmError> {
        let body = self.request_body(content);
        let auth = format!("Bearer {}", self.api_key);
        let response = send_json_request(
            &self.http_client,
            &self.endpoint,
            &body,
            Some(&auth),
            &[("X-User-Id", user_id), ("X-Channel-Id", channel_id)],
        )
        .await?;

        let reply = Self::parse_reply(&response)?;
        debug!(is_bot = reply.is_bot, "shapes: reply received");
        Ok(reply)
    }
}
