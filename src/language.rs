//! Language keys and the pair channel naming contract.
//!
//! A `LanguageKey` is the normalized form of a language tag, used both as
//! the registry key and inside channel names. Two tags normalize equal iff
//! they denote the same locale for routing purposes: `ZH-Hans`, `zh-hans`
//! and `zh_hans` all collapse to the key `zh_hans`.
//!
//! Pair channel names encode the home and foreign keys joined by a fixed
//! separator: the home-side channel is `<home>-to-<foreign>` and the
//! foreign-side channel is `<foreign>-to-<home>`. Anything else is not a
//! pair member.

use crate::constants::PAIR_NAME_SEPARATOR;
use std::fmt;

/// Normalized language tag: lowercased, with `-` canonicalized to `_` so
/// the key is safe to embed in channel names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageKey(String);

impl LanguageKey {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase().replace('-', "_"))
    }

    /// The form embedded in channel names (`zh_hans`).
    pub fn channel_token(&self) -> &str {
        &self.0
    }

    /// The form sent to the translation backend (`zh-hans`). The backend
    /// matches language codes case-insensitively.
    pub fn lang_code(&self) -> String {
        self.0.replace('_', "-")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LanguageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of a pair a channel represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSide {
    /// The channel whose prose is in the guild's home language.
    Home,
    /// The channel whose prose is in the mirrored foreign language.
    Foreign,
}

/// Channel names for a new pair: `(home_side, foreign_side)`.
pub fn pair_channel_names(home: &LanguageKey, foreign: &LanguageKey) -> (String, String) {
    (
        format!(
            "{}{}{}",
            home.channel_token(),
            PAIR_NAME_SEPARATOR,
            foreign.channel_token()
        ),
        format!(
            "{}{}{}",
            foreign.channel_token(),
            PAIR_NAME_SEPARATOR,
            home.channel_token()
        ),
    )
}

/// Derive the foreign language key and the side flag from a channel name.
///
/// Returns `None` for anything that doesn't match the two-part naming
/// contract exactly: permanent channels, hand-made channels, or names
/// where neither part is the guild's home key.
pub fn parse_pair_channel(name: &str, home: &LanguageKey) -> Option<(LanguageKey, PairSide)> {
    let parts: Vec<&str> = name.split(PAIR_NAME_SEPARATOR).collect();
    if parts.len() != 2 {
        return None;
    }

    let left = LanguageKey::new(parts[0]);
    let right = LanguageKey::new(parts[1]);
    if left.is_empty() || right.is_empty() || left == right {
        return None;
    }

    if &left == home {
        Some((right, PairSide::Home))
    } else if &right == home {
        Some((left, PairSide::Foreign))
    } else {
        None
    }
}
