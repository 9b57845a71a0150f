//! Typed errors surfaced to the command layer.
//!
//! Translation failures never appear here: the translation client degrades
//! to the original text internally (see `translator`). Only failures the
//! invoking command must discriminate get a variant.

use thiserror::Error;

/// Errors produced while creating or resolving a channel pair.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The requested language is not in the translation backend's
    /// supported set. Surfaced verbatim as the user-facing rejection.
    #[error("{0} is not supported at this time")]
    LanguageNotSupported(String),

    /// The requested language already is the guild's home language, so
    /// there is nothing to mirror.
    #[error("{0} is already the home language of this guild")]
    HomeLanguage(String),

    /// The guild has no designated translation category to create
    /// channels under.
    #[error("the channel category '{0}' does not exist")]
    MissingCategory(String),

    /// Channel creation or topic assignment failed against the platform.
    #[error("unable to create channel pair")]
    PairCreation(#[source] anyhow::Error),
}
