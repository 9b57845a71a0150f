//! The `??translate` command layer.
//!
//! Commands are ordinary messages starting with the command prefix; they
//! are picked off before relay classification and handled off the router
//! loop like any other slow work.

use crate::error::RelayError;
use crate::gateway::{ChatGateway, InboundMessage};
use crate::language::LanguageKey;
use crate::lifecycle::PairLifecycle;
use crate::provision::GuildLanguages;
use crate::translator::{TranslationClient, TranslationKind};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `??translate create <lang>`: create (or fetch) the pair for a
    /// language.
    CreatePair { lang: String },
    /// `??translate <to> <text>`: one-shot translation replied in place.
    Translate { to: String, text: String },
}

/// Parse a message as a command. Returns `None` for anything that isn't
/// one, including the bare prefix.
pub fn parse(content: &str) -> Option<Command> {
    let rest = content
        .trim()
        .strip_prefix(crate::constants::COMMAND_PREFIX)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim();

    let mut parts = rest.splitn(2, char::is_whitespace);
    let first = parts.next().filter(|p| !p.is_empty())?;
    let remainder = parts.next().map(str::trim).unwrap_or("");

    if first == "create" {
        if remainder.is_empty() || remainder.contains(char::is_whitespace) {
            return None;
        }
        return Some(Command::CreatePair {
            lang: remainder.to_string(),
        });
    }

    if remainder.is_empty() {
        return None;
    }
    Some(Command::Translate {
        to: first.to_string(),
        text: remainder.to_string(),
    })
}

/// Execute a command and reply in the channel it came from.
pub async fn handle(
    command: Command,
    message: &InboundMessage,
    gateway: &Arc<dyn ChatGateway>,
    lifecycle: &PairLifecycle,
    translator: &TranslationClient,
    languages: &GuildLanguages,
) {
    let reply = match command {
        Command::CreatePair { lang } => {
            match lifecycle.get_or_create(message.guild, &lang).await {
                Ok(pair) => format!(
                    "Translation channels have been created at {} and {}",
                    pair.standard.mention(),
                    pair.foreign.mention()
                ),
                Err(err @ (RelayError::LanguageNotSupported(_) | RelayError::HomeLanguage(_))) => {
                    err.to_string()
                }
                Err(err) => {
                    error!("Pair creation failed: {err:#}");
                    "Unable to create channel pair".to_string()
                }
            }
        }
        Command::Translate { to, text } => {
            let to_key = LanguageKey::new(&to);
            let kind = if to_key == languages.home_language(message.guild) {
                TranslationKind::ForeignToHome
            } else {
                TranslationKind::HomeToForeign
            };
            translator
                .get_translation(None, &to_key.lang_code(), &text, kind)
                .await
                .translated
                .text
        }
    };

    if let Err(err) = gateway.send_message(message.channel, &reply).await {
        warn!("Failed to send command reply: {err:#}");
    }
}
