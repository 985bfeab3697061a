//! End-to-end relay flow against a scripted backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use shape_relay::bot::{messages, ActiveChannels, Outcome, Relay};
use shape_relay::formatter::{MediaClassifier, ReplyFormat, ReplyPayload, ResponseFormatter};
use shape_relay::limits::AdmissionLimits;
use shape_relay::llm::{BackendReply, ChatBackend, LlmError};
use shape_relay::loop_guard::{BotLoopGuard, DetectionRules, KnownBotRegistry};
use shape_relay::message::InboundMessage;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Backend that answers from a queue and records every prompt
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<BackendReply, LlmError>>>,
    prompts: Mutex<Vec<(String, String, String)>>,
}

impl ScriptedBackend {
    fn with(replies: Vec<Result<BackendReply, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::default(),
        })
    }

    fn prompts(&self) -> Vec<(String, String, String)> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn send(
        &self,
        user_id: &str,
        channel_id: &str,
        content: &str,
    ) -> Result<BackendReply, LlmError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push((user_id.into(), channel_id.into(), content.into()));
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Err(LlmError::ApiError("script exhausted".to_string())))
    }
}

fn temp_path() -> PathBuf {
    std::env::temp_dir().join(format!("relay_flow_{}.json", uuid::Uuid::new_v4()))
}

async fn relay(backend: Arc<ScriptedBackend>, path: &PathBuf, format: ReplyFormat) -> Relay {
    let limits = AdmissionLimits::default();
    let rules = DetectionRules::new(
        "🤖",
        &["bot".to_string(), "shapes".to_string()],
        &messages::own_reply_phrases(),
    );
    Relay::new(
        BotLoopGuard::new(rules, KnownBotRegistry::new(5, 10)),
        Arc::new(ActiveChannels::load(path, limits.clone()).await),
        backend,
        ResponseFormatter::new(
            MediaClassifier::new(vec!["files.shapes.inc".to_string()]),
            format,
        ),
        limits,
        "Nova".to_string(),
    )
}

fn from(author: &str, content: &str) -> InboundMessage {
    InboundMessage {
        author_id: Some(format!("id-{author}")),
        author_name: author.to_string(),
        author_display_name: author.to_uppercase(),
        author_is_bot: false,
        content: content.to_string(),
        channel_id: "-100".to_string(),
    }
}

#[tokio::test]
async fn conversation_with_images_and_bots() {
    let path = temp_path();
    let backend = ScriptedBackend::with(vec![
        Ok(BackendReply::text(
            "Two cats:\n<https://x.com/a.png>\nhttps://files.shapes.inc/abc123\nEnjoy!",
        )),
        Ok(BackendReply {
            content: json!("whatever"),
            is_bot: true,
        }),
    ]);
    let relay = relay(backend.clone(), &path, ReplyFormat::Multi).await;

    assert_eq!(
        relay.handle(&from("alice", "/activate")).await,
        Outcome::Notice(messages::activated("Nova"))
    );

    let Outcome::Reply(payload) = relay.handle(&from("alice", "show me cats")).await else {
        panic!("expected a reply");
    };
    assert_eq!(payload.text.as_deref(), Some("Two cats:\nEnjoy!"));
    let urls: Vec<&str> = payload.embeds.iter().map(|e| e.image_url.as_str()).collect();
    assert_eq!(urls, ["https://x.com/a.png", "https://files.shapes.inc/abc123"]);

    // Name pattern, never reaches the backend
    assert_eq!(relay.handle(&from("helperbot", "hi")).await, Outcome::Ignore);

    // Backend flags the author, later messages short-circuit on the registry
    assert_eq!(relay.handle(&from("mallory", "hello")).await, Outcome::Ignore);
    assert!(relay.guard().is_known_bot("id-mallory"));
    assert_eq!(relay.handle(&from("mallory", "hello?")).await, Outcome::Ignore);

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(
        prompts[0],
        ("id-alice".into(), "-100".into(), "alice: show me cats".into())
    );

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn activation_survives_restart() {
    let path = temp_path();
    {
        let relay = relay(ScriptedBackend::with(vec![]), &path, ReplyFormat::Multi).await;
        relay.handle(&from("alice", "/activate")).await;
    }

    let backend = ScriptedBackend::with(vec![Ok(BackendReply::text("welcome back"))]);
    let relay = relay(backend, &path, ReplyFormat::Multi).await;
    assert_eq!(
        relay.handle(&from("alice", "hi again")).await,
        Outcome::Reply(ReplyPayload::text("welcome back"))
    );

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn single_format_and_non_string_content() {
    let path = temp_path();
    let backend = ScriptedBackend::with(vec![
        Ok(BackendReply::text("Here:\nhttps://x.com/clip.mp4")),
        Ok(BackendReply {
            content: Value::Array(vec![json!(1), json!(2)]),
            is_bot: false,
        }),
    ]);
    let relay = relay(backend, &path, ReplyFormat::Single).await;
    relay.handle(&from("alice", "/activate")).await;

    assert_eq!(
        relay.handle(&from("alice", "video please")).await,
        Outcome::Reply(ReplyPayload::text("Here:\nhttps://x.com/clip.mp4"))
    );
    assert_eq!(
        relay.handle(&from("alice", "numbers")).await,
        Outcome::Reply(ReplyPayload::text("[1,2]"))
    );

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn sentinel_and_own_notices_are_ignored() {
    let path = temp_path();
    let relay = relay(ScriptedBackend::with(vec![]), &path, ReplyFormat::Multi).await;
    relay.handle(&from("alice", "/activate")).await;

    assert_eq!(
        relay.handle(&from("carol", "  🤖 beep boop")).await,
        Outcome::Ignore
    );
    let echoed = "Oops, something went wrong while trying to talk to Other.";
    assert_eq!(relay.handle(&from("dave", echoed)).await, Outcome::Ignore);
    assert_eq!(relay.guard().known_bots(), 2);

    let _ = tokio::fs::remove_file(&path).await;
}
