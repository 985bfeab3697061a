//! User-facing notice templates (Telegram HTML).
//!
//! The fixed fragments in [`OWN_REPLY_PHRASES`] appear verbatim in the
//! templates below. The loop guard uses them to recognize these notices
//! when another instance of the bot posts them.

use html_escape::encode_text;

/// Lower-case fragments of every notice this bot sends
pub const OWN_REPLY_PHRASES: &[&str] = &[
    "is now active in this channel",
    "is already active in this channel",
    "has been deactivated in this channel",
    "is not active in this channel",
    "memory has been reset",
    "please provide the necessary arguments for",
    "may have been processed silently",
    "didn't provide a specific textual response",
    "there was an error processing your",
    "unknown command:",
    "something went wrong while trying to talk to",
    "too many requests to",
];

/// Default reply-phrase set for the loop guard
#[must_use]
pub fn own_reply_phrases() -> Vec<String> {
    OWN_REPLY_PHRASES.iter().map(|p| (*p).to_string()).collect()
}

fn bold(name: &str) -> String {
    format!("<b>{}</b>", encode_text(name))
}

fn command(name: &str) -> String {
    format!("<code>/{}</code>", encode_text(name))
}

/// Channel just activated
#[must_use]
pub fn activated(shape: &str) -> String {
    format!(
        "{} is now active in this channel! Just talk, or try {} to see what I can do.",
        bold(shape),
        command("help")
    )
}

/// Activation requested twice
#[must_use]
pub fn already_active(shape: &str) -> String {
    format!("{} is already active in this channel.", bold(shape))
}

/// Channel just deactivated
#[must_use]
pub fn deactivated(shape: &str) -> String {
    format!(
        "{} has been deactivated in this channel. Use {} to bring me back.",
        bold(shape),
        command("activate")
    )
}

/// Command used in a channel that is not active
#[must_use]
pub fn not_active(shape: &str) -> String {
    format!(
        "{} is not active in this channel. Use {} first.",
        bold(shape),
        command("activate")
    )
}

/// `/reset` succeeded without a backend message
#[must_use]
pub fn reset(shape: &str) -> String {
    format!("{}'s memory has been reset. Let's start fresh!", bold(shape))
}

/// Command needs arguments
#[must_use]
pub fn missing_args(cmd: &str) -> String {
    format!(
        "Please provide the necessary arguments for {}. Example: <code>/{} your arguments</code>",
        command(cmd),
        encode_text(cmd)
    )
}

/// Command forwarded, backend stayed silent (expected for some commands)
#[must_use]
pub fn silent_success(cmd: &str, shape: &str) -> String {
    format!(
        "The command {} has been sent to {}. It may have been processed silently.",
        command(cmd),
        bold(shape)
    )
}

/// Command forwarded, backend stayed silent
#[must_use]
pub fn no_textual_response(cmd: &str, shape: &str) -> String {
    format!(
        "{} didn't provide a specific textual response for {}. The action might have been completed, or it may require a different interaction.",
        bold(shape),
        command(cmd)
    )
}

/// Backend failed while handling a command
#[must_use]
pub fn command_error(cmd: &str, shape: &str) -> String {
    format!(
        "Sorry, there was an error processing your {} command with {}.",
        command(cmd),
        bold(shape)
    )
}

/// Unknown command in an active channel
#[must_use]
pub fn unknown_command_active(cmd: &str, shape: &str) -> String {
    format!(
        "Unknown command: {}. Try {} for assistance with {}'s commands.",
        command(cmd),
        command("help"),
        bold(shape)
    )
}

/// Unknown command in an inactive channel
#[must_use]
pub fn unknown_command_inactive(cmd: &str, shape: &str) -> String {
    format!(
        "Unknown command: {}. Please activate the bot with {} to use commands with {}.",
        command(cmd),
        command("activate"),
        bold(shape)
    )
}

/// Backend failed on a regular message
#[must_use]
pub fn relay_error(shape: &str) -> String {
    format!(
        "Oops, something went wrong while trying to talk to {}.",
        bold(shape)
    )
}

/// Backend rate limit hit
#[must_use]
pub fn rate_limited(shape: &str) -> String {
    format!(
        "Too many requests to {} right now. Please wait a moment and try again.",
        bold(shape)
    )
}
