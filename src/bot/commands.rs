//! Slash-command parsing and the command table.

use teloxide::types::BotCommand;

/// Command forwarded to the backend as `!<name>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    /// Name as typed after `/`, lower case
    pub name: &'static str,
    /// Backend command the slash command maps to
    pub backend_command: &'static str,
    /// Whether arguments must follow
    pub requires_args: bool,
    /// An empty backend answer is normal for this command
    pub silent_ok: bool,
    /// Description registered with Telegram
    pub description: &'static str,
}

/// Commands relayed to the backend
pub const RELAY_COMMANDS: &[RelayCommand] = &[
    RelayCommand {
        name: "reset",
        backend_command: "!reset",
        requires_args: false,
        silent_ok: false,
        description: "Reset the shape's memory of this conversation",
    },
    RelayCommand {
        name: "sleep",
        backend_command: "!sleep",
        requires_args: false,
        silent_ok: true,
        description: "Make the shape save its long-term memory",
    },
    RelayCommand {
        name: "dashboard",
        backend_command: "!dashboard",
        requires_args: false,
        silent_ok: false,
        description: "Link to the shape's dashboard",
    },
    RelayCommand {
        name: "info",
        backend_command: "!info",
        requires_args: false,
        silent_ok: false,
        description: "Show information about the shape",
    },
    RelayCommand {
        name: "web",
        backend_command: "!web",
        requires_args: true,
        silent_ok: false,
        description: "Search the web: /web <query>",
    },
    RelayCommand {
        name: "help",
        backend_command: "!help",
        requires_args: false,
        silent_ok: false,
        description: "List the shape's commands",
    },
    RelayCommand {
        name: "imagine",
        backend_command: "!imagine",
        requires_args: true,
        silent_ok: false,
        description: "Generate an image: /imagine <prompt>",
    },
    RelayCommand {
        name: "wack",
        backend_command: "!wack",
        requires_args: false,
        silent_ok: true,
        description: "Clear the shape's short-term memory",
    },
];

/// What a parsed command resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Turn the bot on in this channel
    Activate,
    /// Turn the bot off in this channel
    Deactivate,
    /// Forward to the backend
    Relay(&'static RelayCommand),
    /// Anything else
    Unknown,
}

/// A `/command arg ...` message split into parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand<'a> {
    /// Command word as typed, without `/` and `@bot` suffix
    pub raw_name: &'a str,
    /// Lower-cased command word
    pub name: String,
    /// Whitespace-separated arguments
    pub args: Vec<&'a str>,
}

impl ParsedCommand<'_> {
    /// Arguments joined with single spaces
    #[must_use]
    pub fn arg_string(&self) -> String {
        self.args.join(" ")
    }

    /// Resolve against the command table
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self.name.as_str() {
            "activate" => CommandKind::Activate,
            "deactivate" => CommandKind::Deactivate,
            name => RELAY_COMMANDS
                .iter()
                .find(|c| c.name == name)
                .map_or(CommandKind::Unknown, CommandKind::Relay),
        }
    }
}

/// Parse `content` as a command; `None` unless it starts with `/`.
#[must_use]
pub fn parse_command(content: &str) -> Option<ParsedCommand<'_>> {
    let rest = content.trim().strip_prefix('/')?;
    let mut words = rest.split_whitespace();
    let first = words.next().unwrap_or_default();
    // Group chats address commands as /name@bot_username
    let raw_name = first.split_once('@').map_or(first, |(name, _)| name);

    Some(ParsedCommand {
        raw_name,
        name: raw_name.to_lowercase(),
        args: words.collect(),
    })
}

/// Command list registered with Telegram
#[must_use]
pub fn bot_commands() -> Vec<BotCommand> {
    let mut commands = vec![
        BotCommand::new("activate", "Activate the bot in this chat"),
        BotCommand::new("deactivate", "Deactivate the bot in this chat"),
    ];
    commands.extend(
        RELAY_COMMANDS
            .iter()
            .map(|c| BotCommand::new(c.name, c.description)),
    );
    commands
}
