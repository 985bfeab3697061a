//! Per-message relay flow: loop guard, commands, backend call, formatting.
//!
//! Nothing here touches Telegram. [`Relay::respond`] returns an [`Outcome`]
//! that the transport turns into at most one reply.

use crate::bot::channels::ActiveChannels;
use crate::bot::commands::{parse_command, CommandKind, ParsedCommand, RelayCommand};
use crate::bot::messages;
use crate::formatter::{ReplyPayload, ResponseFormatter};
use crate::limits::{AdmissionLimits, Gate};
use crate::llm::{BackendReply, ChatBackend, LlmError};
use crate::loop_guard::BotLoopGuard;
use crate::message::InboundMessage;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What to send back for one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send nothing
    Ignore,
    /// Bot notice, HTML formatted
    Notice(String),
    /// Backend reply, plain text plus image embeds
    Reply(ReplyPayload),
}

/// Shared relay state, one per process
pub struct Relay {
    guard: BotLoopGuard,
    channels: Arc<ActiveChannels>,
    backend: Arc<dyn ChatBackend>,
    formatter: ResponseFormatter,
    limits: AdmissionLimits,
    shape_name: String,
}

impl Relay {
    /// Wire the relay together
    #[must_use]
    pub fn new(
        guard: BotLoopGuard,
        channels: Arc<ActiveChannels>,
        backend: Arc<dyn ChatBackend>,
        formatter: ResponseFormatter,
        limits: AdmissionLimits,
        shape_name: String,
    ) -> Self {
        Self {
            guard,
            channels,
            backend,
            formatter,
            limits,
            shape_name,
        }
    }

    /// The loop guard, for callers that need to sweep or inspect it
    #[must_use]
    pub const fn guard(&self) -> &BotLoopGuard {
        &self.guard
    }

    /// Admission limits shared with the transport
    #[must_use]
    pub const fn limits(&self) -> &AdmissionLimits {
        &self.limits
    }

    /// Whether `msg` should be processed at all.
    ///
    /// Bot-authored and empty messages are dropped here.
    pub fn admit(&self, msg: &InboundMessage) -> bool {
        let verdict = self.guard.classify(msg);
        if verdict.is_bot() {
            debug!(channel = %msg.channel_id, ?verdict, "Ignoring bot message");
            return false;
        }
        !msg.content.trim().is_empty()
    }

    /// Compute the reply for an admitted message
    pub async fn respond(&self, msg: &InboundMessage) -> Outcome {
        match parse_command(&msg.content) {
            Some(cmd) => self.handle_command(msg, &cmd).await,
            None => self.handle_chat(msg).await,
        }
    }

    /// Whether an admitted message will be answered: commands always are,
    /// chat only in active channels.
    pub async fn expects_reply(&self, msg: &InboundMessage) -> bool {
        parse_command(&msg.content).is_some() || self.channels.is_active(&msg.channel_id).await
    }

    /// [`admit`](Self::admit) followed by [`respond`](Self::respond)
    pub async fn handle(&self, msg: &InboundMessage) -> Outcome {
        if !self.admit(msg) {
            return Outcome::Ignore;
        }
        self.respond(msg).await
    }

    async fn handle_command(&self, msg: &InboundMessage, cmd: &ParsedCommand<'_>) -> Outcome {
        let channel = msg.channel_id.as_str();
        let shape = self.shape_name.as_str();

        match cmd.kind() {
            CommandKind::Activate => {
                if self.channels.activate(channel).await {
                    Outcome::Notice(messages::activated(shape))
                } else {
                    Outcome::Notice(messages::already_active(shape))
                }
            }
            CommandKind::Deactivate => {
                if self.channels.deactivate(channel).await {
                    Outcome::Notice(messages::deactivated(shape))
                } else {
                    Outcome::Notice(messages::not_active(shape))
                }
            }
            CommandKind::Relay(command) => self.relay_command(msg, cmd, command).await,
            CommandKind::Unknown => {
                if self.channels.is_active(channel).await {
                    Outcome::Notice(messages::unknown_command_active(cmd.raw_name, shape))
                } else {
                    Outcome::Notice(messages::unknown_command_inactive(cmd.raw_name, shape))
                }
            }
        }
    }

    async fn relay_command(
        &self,
        msg: &InboundMessage,
        cmd: &ParsedCommand<'_>,
        command: &RelayCommand,
    ) -> Outcome {
        let shape = self.shape_name.as_str();
        if !self.channels.is_active(&msg.channel_id).await {
            return Outcome::Notice(messages::not_active(shape));
        }

        let backend_text = if command.requires_args {
            let args = cmd.arg_string();
            if args.is_empty() {
                return Outcome::Notice(messages::missing_args(command.name));
            }
            format!("{} {args}", command.backend_command)
        } else {
            command.backend_command.to_string()
        };

        info!(
            command = command.name,
            channel = %msg.channel_id,
            "Sending command to backend: {backend_text}"
        );

        match self.ask(msg, &backend_text).await {
            Ok(reply) if reply.is_bot => self.reported_bot(msg),
            Ok(reply) if !reply.is_blank() => self.rich_reply(&reply),
            Ok(_) if command.name == "reset" => Outcome::Notice(messages::reset(shape)),
            Ok(_) if command.silent_ok => Outcome::Notice(messages::silent_success(command.name, shape)),
            Ok(_) => Outcome::Notice(messages::no_textual_response(command.name, shape)),
            Err(LlmError::RateLimit { wait_secs, .. }) => {
                warn!(command = command.name, ?wait_secs, "Backend rate limit hit");
                Outcome::Notice(messages::rate_limited(shape))
            }
            Err(e) => {
                error!(command = command.name, "Backend error during command: {e}");
                Outcome::Notice(messages::command_error(command.name, shape))
            }
        }
    }

    async fn handle_chat(&self, msg: &InboundMessage) -> Outcome {
        if !self.channels.is_active(&msg.channel_id).await {
            return Outcome::Ignore;
        }

        let content = format!("{}: {}", msg.speaker_name(), msg.content);
        info!(
            channel = %msg.channel_id,
            author = msg.author_id.as_deref().unwrap_or("-"),
            "Relaying message to backend"
        );

        match self.ask(msg, &content).await {
            Ok(reply) if reply.is_bot => self.reported_bot(msg),
            Ok(reply) if reply.is_blank() => {
                debug!("Backend returned an empty reply, staying silent");
                Outcome::Ignore
            }
            Ok(reply) => self.rich_reply(&reply),
            Err(LlmError::RateLimit { wait_secs, .. }) => {
                warn!(?wait_secs, "Backend rate limit hit");
                Outcome::Notice(messages::rate_limited(&self.shape_name))
            }
            Err(e) => {
                error!("Error sending message to backend: {e}");
                Outcome::Notice(messages::relay_error(&self.shape_name))
            }
        }
    }

    async fn ask(&self, msg: &InboundMessage, content: &str) -> Result<BackendReply, LlmError> {
        let user_id = msg.author_id.as_deref().unwrap_or_default();
        self.limits
            .run(
                Gate::Api,
                self.backend.send(user_id, &msg.channel_id, content),
            )
            .await
    }

    fn reported_bot(&self, msg: &InboundMessage) -> Outcome {
        if let Some(id) = msg.author_id.as_deref() {
            self.guard.record_bot(id);
        }
        info!(channel = %msg.channel_id, "Backend flagged the author as a bot, not replying");
        Outcome::Ignore
    }

    fn rich_reply(&self, reply: &BackendReply) -> Outcome {
        let formatted = self.formatter.format_content(&reply.content);
        if formatted.is_empty() {
            return Outcome::Ignore;
        }
        Outcome::Reply(formatted.into_payload())
    }
}
