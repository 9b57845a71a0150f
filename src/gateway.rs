//! Chat gateway collaborator: the interface the relay needs from whatever
//! platform transport hosts it.
//!
//! The gateway owns connection, authentication and rate limiting; the relay
//! only requires the operations below plus a stream of typed events pushed
//! into a single intake channel. Event delivery is serialized by the
//! platform's own gateway session, so the relay never sees two events from
//! the same session concurrently.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_type!(GuildId);
id_type!(ChannelId);
id_type!(UserId);

/// A text channel as the platform reports it.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub guild: GuildId,
    pub name: String,
    /// Name of the category the channel sits under, if any.
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ChannelInfo {
    /// Platform mention syntax for the channel.
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// Whoever posted an inbound message.
#[derive(Debug, Clone)]
pub struct MessageAuthor {
    pub id: UserId,
    /// Nickname if set, falling back to the account name.
    pub display_name: String,
    pub avatar_url: Option<String>,
}

/// A message observed on the gateway.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub guild: GuildId,
    pub channel: ChannelId,
    pub channel_name: String,
    pub category: Option<String>,
    pub author: MessageAuthor,
    pub content: String,
    /// Attachment URLs, relayed verbatim.
    pub attachments: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// A bare message record, enough for idle probing and stock-message checks.
#[derive(Debug, Clone)]
pub struct MessageStub {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// An embed posted to the history archive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageEmbed {
    pub author_name: String,
    pub author_icon_url: Option<String>,
    pub fields: Vec<EmbedField>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Typed events the gateway pushes into the relay's intake channel.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A guild became visible (startup or join); triggers provisioning
    /// and a registry rebuild.
    GuildAvailable(GuildId),
    MessageCreated(InboundMessage),
    ChannelCreated(ChannelInfo),
    ChannelDeleted { guild: GuildId, channel: ChannelId },
    /// Connection state change. A non-resumable disconnect is fatal to
    /// the process; resumable ones are the platform's own business.
    Disconnected { resumable: bool },
}

/// Sender half handed to the gateway driver at startup.
pub type EventSink = mpsc::UnboundedSender<GatewayEvent>;

/// Receiver half consumed by the router loop.
pub type EventStream = mpsc::UnboundedReceiver<GatewayEvent>;

/// Operations the relay performs against the platform.
///
/// Implementations must be cheap to clone behind an `Arc` and safe to call
/// from spawned tasks; every call is a network suspension point and holds
/// no relay lock.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// The bot's own user id, used to drop self-authored events.
    fn current_user(&self) -> UserId;

    /// Guilds currently visible to the connection.
    async fn guild_ids(&self) -> Vec<GuildId>;

    /// The guild's preferred locale tag (`en-US` style), if the platform
    /// exposes one.
    async fn preferred_locale(&self, guild: GuildId) -> Result<Option<String>>;

    async fn has_category(&self, guild: GuildId, category: &str) -> Result<bool>;

    async fn create_category(&self, guild: GuildId, category: &str) -> Result<()>;

    /// All text channels under the named category.
    async fn category_channels(&self, guild: GuildId, category: &str) -> Result<Vec<ChannelInfo>>;

    async fn create_channel(
        &self,
        guild: GuildId,
        category: &str,
        name: &str,
        topic: Option<&str>,
    ) -> Result<ChannelInfo>;

    async fn set_topic(&self, channel: ChannelId, topic: &str) -> Result<()>;

    async fn delete_channel(&self, channel: ChannelId) -> Result<()>;

    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<()>;

    async fn send_embed(&self, channel: ChannelId, embed: &MessageEmbed) -> Result<()>;

    /// Most recent messages in a channel, newest first.
    async fn recent_messages(&self, channel: ChannelId, limit: usize) -> Result<Vec<MessageStub>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_mention_format() {
        let info = ChannelInfo {
            id: ChannelId(42),
            guild: GuildId(1),
            name: "es-to-en".to_string(),
            category: Some("localized".to_string()),
            created_at: Utc::now(),
        };
        assert_eq!(info.mention(), "<#42>");
    }

    #[test]
    fn test_id_display() {
        assert_eq!(GuildId(7).to_string(), "7");
        assert_eq!(ChannelId(123456789012345678).to_string(), "123456789012345678");
    }
}
