//! Concurrent registry mapping language keys to channel pairs.
//!
//! Routing reads and pair creation write the same map concurrently, so the
//! registry sits on a lock-free concurrent map. `try_insert` is the race
//! point: when two creators build a pair for the same key at once, exactly
//! one wins and the loser is handed the winner's pair so it can delete its
//! own freshly created channels.

use crate::constants::PERMANENT_CHANNELS;
use crate::gateway::{ChannelId, ChannelInfo};
use crate::language::{parse_pair_channel, LanguageKey, PairSide};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

/// One mirror channel, as much of it as routing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairChannel {
    pub id: ChannelId,
    pub name: String,
}

impl PairChannel {
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

impl From<&ChannelInfo> for PairChannel {
    fn from(info: &ChannelInfo) -> Self {
        Self {
            id: info.id,
            name: info.name.clone(),
        }
    }
}

/// The two linked channels mirroring one language's conversation. Complete
/// by construction: a pair missing a side never leaves the rebuild scratch
/// space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPair {
    /// The side written in the guild's home language.
    pub standard: PairChannel,
    /// The side written in the mirrored foreign language.
    pub foreign: PairChannel,
}

impl ChannelPair {
    /// The side of the pair a channel id belongs to, if either.
    pub fn side_of(&self, channel: ChannelId) -> Option<PairSide> {
        if self.standard.id == channel {
            Some(PairSide::Home)
        } else if self.foreign.id == channel {
            Some(PairSide::Foreign)
        } else {
            None
        }
    }
}

/// Outcome of [`PairRegistry::try_insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The offered pair was registered.
    Inserted,
    /// Another creator won the race; the caller must tear down its own
    /// channels and use this pair instead.
    Lost(ChannelPair),
}

#[derive(Debug, Default)]
pub struct PairRegistry {
    pairs: DashMap<LanguageKey, ChannelPair>,
}

impl PairRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &LanguageKey) -> Option<ChannelPair> {
        self.pairs.get(key).map(|entry| entry.value().clone())
    }

    /// Register a pair for `key` unless one already exists. Linearizable
    /// per key: under concurrent calls exactly one caller sees
    /// `Inserted`.
    pub fn try_insert(&self, key: LanguageKey, pair: ChannelPair) -> InsertOutcome {
        match self.pairs.entry(key) {
            Entry::Occupied(existing) => InsertOutcome::Lost(existing.get().clone()),
            Entry::Vacant(slot) => {
                slot.insert(pair);
                InsertOutcome::Inserted
            }
        }
    }

    /// Drop the pair containing `channel`, if any, returning what was
    /// removed. Invoked from the channel-deleted event path.
    pub fn remove_channel(&self, channel: ChannelId) -> Option<(LanguageKey, ChannelPair)> {
        let key = self.pairs.iter().find_map(|entry| {
            entry
                .value()
                .side_of(channel)
                .map(|_| entry.key().clone())
        })?;
        self.pairs.remove(&key)
    }

    /// Rebuild pairs from a category's channel enumeration.
    ///
    /// Permanent channels are excluded, names that don't match the pair
    /// naming contract are skipped, and only keys where both sides were
    /// found are published. Existing entries for rediscovered keys are
    /// replaced; other entries are left alone.
    pub fn rebuild(&self, channels: &[ChannelInfo], home: &LanguageKey) {
        let mut scratch: HashMap<LanguageKey, PartialPair> = HashMap::new();

        for channel in channels {
            if PERMANENT_CHANNELS.contains(&channel.name.as_str()) {
                continue;
            }
            let Some((foreign_key, side)) = parse_pair_channel(&channel.name, home) else {
                debug!(channel = %channel.name, "Not a translation channel, skipping");
                continue;
            };

            let slot = scratch.entry(foreign_key).or_default();
            match side {
                PairSide::Home => slot.standard = Some(PairChannel::from(channel)),
                PairSide::Foreign => slot.foreign = Some(PairChannel::from(channel)),
            }
        }

        for (key, partial) in scratch {
            let (Some(standard), Some(foreign)) = (partial.standard, partial.foreign) else {
                debug!(%key, "Pair is missing one side, skipping");
                continue;
            };
            debug!(%key, "Registering rebuilt pair");
            self.pairs.insert(key, ChannelPair { standard, foreign });
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Rebuild scratch space; never exposed to routing.
#[derive(Debug, Default)]
struct PartialPair {
    standard: Option<PairChannel>,
    foreign: Option<PairChannel>,
}
