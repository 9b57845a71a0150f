//! Idle mirror-channel reaper.
//!
//! Mirror channels are throwaway: once a conversation dies down the pair
//! is deleted and can be recreated on demand. The reaper keeps a
//! last-activity map fed opportunistically from observed message events,
//! and a periodic sweep deletes any non-permanent channel in the
//! translation category whose last activity is older than the idle
//! threshold. Deleting a channel raises a channel-deleted event, which is
//! what actually unregisters the pair.

use crate::constants::{CATEGORY_NAME, PERMANENT_CHANNELS};
use crate::gateway::{ChannelId, ChatGateway};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct IdleReaper {
    gateway: Arc<dyn ChatGateway>,
    activity: DashMap<ChannelId, DateTime<Utc>>,
    idle_after: Duration,
}

impl IdleReaper {
    pub fn new(gateway: Arc<dyn ChatGateway>, idle_timeout_minutes: i64) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            activity: DashMap::new(),
            idle_after: Duration::minutes(idle_timeout_minutes),
        })
    }

    /// Record activity for a channel: a message timestamp, or the creation
    /// time when a channel first appears.
    pub fn note_activity(&self, channel: ChannelId, at: DateTime<Utc>) {
        self.activity.insert(channel, at);
    }

    /// Drop tracking for a deleted channel.
    pub fn forget(&self, channel: ChannelId) {
        self.activity.remove(&channel);
    }

    /// Whether a channel last active at `last` is past the idle threshold
    /// at `now`. Exactly-at-threshold survives.
    fn is_idle(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - last > self.idle_after
    }

    /// Sweep every guild's translation category and delete idle channels.
    pub async fn sweep(&self) -> Result<()> {
        debug!("Begin cleanup of idle mirror channels");
        let now = Utc::now();

        for guild in self.gateway.guild_ids().await {
            let channels = match self.gateway.category_channels(guild, CATEGORY_NAME).await {
                Ok(channels) => channels,
                Err(err) => {
                    warn!(%guild, "Unable to enumerate category channels: {err:#}");
                    continue;
                }
            };

            for channel in channels {
                if PERMANENT_CHANNELS.contains(&channel.name.as_str()) {
                    continue;
                }

                let last_activity = match self.activity.get(&channel.id) {
                    Some(entry) => *entry.value(),
                    None => self.probe_last_activity(&channel).await,
                };

                if self.is_idle(last_activity, now) {
                    info!(channel = %channel.name, "Channel is idle, deleting");
                    if let Err(err) = self.gateway.delete_channel(channel.id).await {
                        warn!(channel = %channel.name, "Failed to delete idle channel: {err:#}");
                    }
                } else {
                    debug!(channel = %channel.name, "Channel is not idle");
                }
            }
        }

        debug!("Completed cleanup of idle mirror channels");
        Ok(())
    }

    /// No tracked activity: ask the platform for the newest message, and
    /// fall back to the channel's creation time when there is none.
    async fn probe_last_activity(&self, channel: &crate::gateway::ChannelInfo) -> DateTime<Utc> {
        match self.gateway.recent_messages(channel.id, 1).await {
            Ok(messages) => messages
                .first()
                .map(|m| m.created_at)
                .unwrap_or(channel.created_at),
            Err(err) => {
                warn!(channel = %channel.name, "Unable to probe last message: {err:#}");
                channel.created_at
            }
        }
    }
}
