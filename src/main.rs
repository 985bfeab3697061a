use dotenvy::dotenv;
use regex::Regex;
use shape_relay::bot::{self, commands::bot_commands, messages, ActiveChannels, Relay};
use shape_relay::config::{
    get_known_bot_hard_cap, get_known_bot_soft_cap, get_known_bot_sweep_secs, Settings,
};
use shape_relay::formatter::{MediaClassifier, ResponseFormatter};
use shape_relay::limits::AdmissionLimits;
use shape_relay::llm::ShapesClient;
use shape_relay::loop_guard::{BotLoopGuard, DetectionRules, KnownBotRegistry};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting secrets from log output
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    bearer: Regex,
    shapes_key: Regex,
}

impl RedactionPatterns {
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            bearer: Regex::new(r"(Bearer\s+)[A-Za-z0-9._~+/=-]+")?,
            shapes_key: Regex::new(r"SHAPESINC_API_KEY=[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token_url.replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self.token_bare.replace_all(&output, "[TELEGRAM_TOKEN]");
        let output = self.bearer.replace_all(&output, "$1[MASKED]");
        self.shapes_key
            .replace_all(&output, "SHAPESINC_API_KEY=[MASKED]")
            .into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        self.inner.write_all(self.patterns.redact(&s).as_bytes())?;
        // Report the original length even though the redacted text may differ
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: self.patterns.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting shape relay...");

    let settings = init_settings();
    let limits = AdmissionLimits::from_env();
    let guard = init_loop_guard(&settings);

    let shutdown = CancellationToken::new();
    let sweeper = guard.spawn_sweeper(
        Duration::from_secs(get_known_bot_sweep_secs()),
        shutdown.clone(),
    );

    let channels =
        Arc::new(ActiveChannels::load(&settings.active_channels_file, limits.clone()).await);

    let backend = Arc::new(ShapesClient::new(&settings));
    info!(model = %settings.shape_model(), "Shapes client initialized.");

    let formatter = ResponseFormatter::new(
        MediaClassifier::new(settings.image_hosts()),
        settings.reply_format(),
    );

    let relay = Arc::new(Relay::new(
        guard,
        channels,
        backend,
        formatter,
        limits,
        settings.shapesinc_shape_username.clone(),
    ));

    let bot = Bot::new(settings.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    info!("Bot is running...");

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![relay])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        error!("Known-bot sweeper ended abnormally: {e}");
    }
    info!("Shut down.");

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    }
}

fn init_loop_guard(settings: &Settings) -> BotLoopGuard {
    let phrases = settings
        .bot_reply_phrases()
        .unwrap_or_else(messages::own_reply_phrases);
    let rules = DetectionRules::new(
        &settings.bot_sentinel(),
        &settings.bot_name_patterns(),
        &phrases,
    );
    let registry = KnownBotRegistry::new(get_known_bot_soft_cap(), get_known_bot_hard_cap());

    info!(
        "Initializing loop guard (soft cap: {}, hard cap: {}, reply phrases: {})",
        registry.soft_cap(),
        registry.hard_cap(),
        phrases.len()
    );

    BotLoopGuard::new(rules, registry)
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry().branch(Update::filter_message().endpoint(handle_message))
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    relay: Arc<Relay>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handler(bot, msg, relay).await {
        error!("Message handler error: {e}");
    }
    respond(())
}
