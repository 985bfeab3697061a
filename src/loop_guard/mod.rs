//! Bot-to-bot loop prevention
//!
//! [`BotLoopGuard`] decides whether an inbound message was written by a human
//! or by another AI-backed bot. Bot authors are remembered in a bounded
//! [`KnownBotRegistry`] so that later messages short-circuit on a cache hit.

pub mod registry;

pub use registry::KnownBotRegistry;

use crate::message::InboundMessage;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which heuristic identified a bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotSignal {
    /// Author already in the registry
    KnownBot,
    /// Platform flags the account as a bot
    AccountFlag,
    /// Content starts with the sentinel glyph
    Sentinel,
    /// Username or display name contains a bot pattern
    NamePattern,
    /// Content contains one of our own reply phrases
    ReplyPhrase,
    /// Backend reported the author as a bot
    Backend,
}

/// Outcome of [`BotLoopGuard::classify`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Process the message
    Human,
    /// Drop the message
    Bot(BotSignal),
}

impl Verdict {
    /// Whether the message should be discarded
    #[must_use]
    pub const fn is_bot(self) -> bool {
        matches!(self, Self::Bot(_))
    }
}

/// Heuristic inputs for bot detection
#[derive(Debug, Clone, Default)]
pub struct DetectionRules {
    sentinel: String,
    name_patterns: Vec<String>,
    reply_phrases: Vec<String>,
}

impl DetectionRules {
    /// Build rules, normalizing patterns and phrases to lower case.
    ///
    /// Empty name patterns would match every author and are dropped.
    #[must_use]
    pub fn new(sentinel: &str, name_patterns: &[String], reply_phrases: &[String]) -> Self {
        let name_patterns: Vec<String> = name_patterns
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| {
                if p.is_empty() {
                    warn!("loop_guard: ignoring empty bot name pattern (it would match everyone)");
                }
                !p.is_empty()
            })
            .collect();

        let reply_phrases = reply_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self {
            sentinel: sentinel.trim().to_string(),
            name_patterns,
            reply_phrases,
        }
    }

    fn starts_with_sentinel(&self, content: &str) -> bool {
        !self.sentinel.is_empty() && content.trim().starts_with(&self.sentinel)
    }

    fn matches_name(&self, msg: &InboundMessage) -> bool {
        let name = msg.author_name.to_lowercase();
        let display = msg.author_display_name.to_lowercase();
        self.name_patterns
            .iter()
            .any(|p| name.contains(p.as_str()) || display.contains(p.as_str()))
    }

    fn matches_reply_phrase(&self, content: &str) -> bool {
        let content = content.to_lowercase();
        self.reply_phrases.iter().any(|p| content.contains(p.as_str()))
    }
}

/// Classifies inbound messages and remembers bot authors.
///
/// Cloning is cheap and clones share one registry.
#[derive(Debug, Clone)]
pub struct BotLoopGuard {
    rules: Arc<DetectionRules>,
    registry: Arc<Mutex<KnownBotRegistry>>,
}

impl BotLoopGuard {
    /// Create a guard around an existing registry
    #[must_use]
    pub fn new(rules: DetectionRules, registry: KnownBotRegistry) -> Self {
        Self {
            rules: Arc::new(rules),
            registry: Arc::new(Mutex::new(registry)),
        }
    }

    /// Classify a message; first matching heuristic wins.
    ///
    /// A bot verdict inserts or refreshes the author in the registry. A human
    /// verdict leaves the registry untouched.
    pub fn classify(&self, msg: &InboundMessage) -> Verdict {
        let author_id = msg.author_id.as_deref().filter(|id| !id.is_empty());

        if let Some(id) = author_id {
            if self.registry().touch(id) {
                return Verdict::Bot(BotSignal::KnownBot);
            }
        }

        let signal = if msg.author_is_bot {
            Some(BotSignal::AccountFlag)
        } else if self.rules.starts_with_sentinel(&msg.content) {
            Some(BotSignal::Sentinel)
        } else if self.rules.matches_name(msg) {
            Some(BotSignal::NamePattern)
        } else if self.rules.matches_reply_phrase(&msg.content) {
            Some(BotSignal::ReplyPhrase)
        } else {
            None
        };

        let Some(signal) = signal else {
            return Verdict::Human;
        };

        debug!(
            author = author_id.unwrap_or("-"),
            name = %msg.author_name,
            ?signal,
            "loop_guard: bot message detected"
        );
        if let Some(id) = author_id {
            self.registry().record(id);
        }
        Verdict::Bot(signal)
    }

    /// Remember an author reported as a bot by another source.
    pub fn record_bot(&self, author_id: &str) {
        if author_id.is_empty() {
            return;
        }
        debug!(author = author_id, "loop_guard: bot reported by backend");
        self.registry().record(author_id);
    }

    /// Run one cleanup pass, returning how many entries were evicted
    pub fn sweep(&self) -> usize {
        self.registry().cleanup()
    }

    /// Number of remembered bot authors
    #[must_use]
    pub fn known_bots(&self) -> usize {
        self.registry().len()
    }

    /// Whether an author is currently remembered
    #[must_use]
    pub fn is_known_bot(&self, author_id: &str) -> bool {
        self.registry().contains(author_id)
    }

    /// Spawn the periodic cleanup task; it stops when `shutdown` is cancelled.
    pub fn spawn_sweeper(&self, every: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let guard = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        info!("loop_guard: sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = guard.sweep();
                        if evicted > 0 {
                            debug!(evicted, remaining = guard.known_bots(), "loop_guard: sweep");
                        }
                    }
                }
            }
        })
    }

    fn registry(&self) -> MutexGuard<'_, KnownBotRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
