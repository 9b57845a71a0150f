//! Message router: the single event loop at the heart of the relay.
//!
//! The gateway pushes typed events into one intake channel; this loop
//! consumes them one at a time. Slow work (translation calls, channel
//! creation, command handling) is spawned as a detached task so a slow
//! network call never blocks new inbound events. Relay tasks deliver their
//! archive records back over a second channel consumed by the same loop,
//! which posts them to the history channel.
//!
//! Relay order between a pair is eventual, not strict FIFO: each message
//! is an independent task. Registry mutation stays linearizable per key
//! regardless.

use crate::archive::ArchiveRecord;
use crate::commands;
use crate::constants::{CATEGORY_NAME, HISTORY_CHANNEL_NAME, PERMANENT_CHANNELS};
use crate::gateway::{
    ChatGateway, EventStream, GatewayEvent, InboundMessage,
};
use crate::language::{parse_pair_channel, LanguageKey, PairSide};
use crate::lifecycle::PairLifecycle;
use crate::provision::{GuildLanguages, GuildProvisioner};
use crate::reaper::IdleReaper;
use crate::registry::{ChannelPair, PairRegistry};
use crate::translator::{LocalText, TranslationClient, TranslationKind};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub struct Router {
    gateway: Arc<dyn ChatGateway>,
    translator: TranslationClient,
    registry: Arc<PairRegistry>,
    lifecycle: Arc<PairLifecycle>,
    languages: Arc<GuildLanguages>,
    provisioner: Arc<GuildProvisioner>,
    reaper: Arc<IdleReaper>,
    events: Option<EventStream>,
    archive_tx: mpsc::UnboundedSender<ArchiveRecord>,
    archive_rx: Option<mpsc::UnboundedReceiver<ArchiveRecord>>,
}

impl Router {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        translator: TranslationClient,
        registry: Arc<PairRegistry>,
        lifecycle: Arc<PairLifecycle>,
        languages: Arc<GuildLanguages>,
        provisioner: Arc<GuildProvisioner>,
        reaper: Arc<IdleReaper>,
        events: EventStream,
    ) -> Self {
        let (archive_tx, archive_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            translator,
            registry,
            lifecycle,
            languages,
            provisioner,
            reaper,
            events: Some(events),
            archive_tx,
            archive_rx: Some(archive_rx),
        }
    }

    /// Run until the event stream closes or the gateway reports a
    /// non-resumable disconnect (fatal to the process).
    pub async fn run(mut self) -> Result<()> {
        let mut events = self
            .events
            .take()
            .ok_or_else(|| anyhow::anyhow!("router already running"))?;
        let mut archive_rx = self
            .archive_rx
            .take()
            .ok_or_else(|| anyhow::anyhow!("router already running"))?;

        info!("Router started");
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        None => {
                            info!("Gateway event stream closed, router stopping");
                            return Ok(());
                        }
                        Some(GatewayEvent::Disconnected { resumable: false }) => {
                            error!("Gateway disconnected with a non-resumable error");
                            anyhow::bail!("gateway disconnected with a non-resumable error");
                        }
                        Some(event) => self.handle_event(event),
                    }
                }
                Some(record) = archive_rx.recv() => {
                    self.post_archive(record).await;
                }
            }
        }
    }

    fn handle_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::GuildAvailable(guild) => {
                debug!(%guild, "Guild available, provisioning");
                let provisioner = Arc::clone(&self.provisioner);
                tokio::spawn(async move {
                    if let Err(err) = provisioner.configure(guild).await {
                        error!(%guild, "Guild provisioning failed: {err:#}");
                    }
                });
            }
            GatewayEvent::MessageCreated(message) => self.handle_message(message),
            GatewayEvent::ChannelCreated(info) => {
                if info.category.as_deref() == Some(CATEGORY_NAME) {
                    self.reaper.note_activity(info.id, info.created_at);
                }
            }
            GatewayEvent::ChannelDeleted { channel, .. } => {
                if let Some((key, _)) = self.registry.remove_channel(channel) {
                    debug!(%key, "A pair channel was deleted, removing pair from map");
                }
                self.reaper.forget(channel);
            }
            GatewayEvent::Disconnected { .. } => {
                debug!("Gateway reconnecting");
            }
        }
    }

    fn handle_message(&self, message: InboundMessage) {
        let in_category = message.category.as_deref() == Some(CATEGORY_NAME);
        if in_category {
            self.reaper.note_activity(message.channel, message.timestamp);
        }

        if message.author.id == self.gateway.current_user() {
            return;
        }

        if let Some(command) = commands::parse(&message.content) {
            let gateway = Arc::clone(&self.gateway);
            let lifecycle = Arc::clone(&self.lifecycle);
            let translator = self.translator.clone();
            let languages = Arc::clone(&self.languages);
            tokio::spawn(async move {
                commands::handle(command, &message, &gateway, &lifecycle, &translator, &languages)
                    .await;
            });
            return;
        }

        if !in_category || PERMANENT_CHANNELS.contains(&message.channel_name.as_str()) {
            return;
        }

        let home = self.languages.home_language(message.guild);
        let Some((foreign_key, _)) = parse_pair_channel(&message.channel_name, &home) else {
            debug!(channel = %message.channel_name, "Not a translation channel, ignoring");
            return;
        };

        let Some(pair) = self.registry.get(&foreign_key) else {
            warn!(
                channel = %message.channel_name,
                "Message received from a mirror channel without a valid pair"
            );
            return;
        };

        debug!("Starting translation of message");
        let gateway = Arc::clone(&self.gateway);
        let translator = self.translator.clone();
        let archive_tx = self.archive_tx.clone();
        tokio::spawn(async move {
            relay_message(gateway, translator, archive_tx, message, pair, home, foreign_key).await;
        });
    }

    /// Post a finished archive record to the guild's history channel.
    async fn post_archive(&self, record: ArchiveRecord) {
        if !record.is_postable() {
            return;
        }

        let channels = match self
            .gateway
            .category_channels(record.guild, CATEGORY_NAME)
            .await
        {
            Ok(channels) => channels,
            Err(err) => {
                warn!("Unable to locate the history channel: {err:#}");
                return;
            }
        };
        let Some(history) = channels.iter().find(|c| c.name == HISTORY_CHANNEL_NAME) else {
            debug!("No history channel in the category, skipping archive");
            return;
        };

        debug!("Sending record to the history channel");
        if let Err(err) = self.gateway.send_embed(history.id, &record.render()).await {
            warn!("Failed to post to the history channel: {err:#}");
        }
    }
}

/// Translate one inbound message and post it to its partner channel,
/// then hand the combined record back for archiving. Runs as a detached
/// task off the router loop.
async fn relay_message(
    gateway: Arc<dyn ChatGateway>,
    translator: TranslationClient,
    archive_tx: mpsc::UnboundedSender<ArchiveRecord>,
    message: InboundMessage,
    pair: ChannelPair,
    home: LanguageKey,
    foreign_key: LanguageKey,
) {
    let Some(side) = pair.side_of(message.channel) else {
        return;
    };
    let (from, to, kind, partner) = match side {
        PairSide::Home => (
            home.lang_code(),
            foreign_key.lang_code(),
            TranslationKind::HomeToForeign,
            pair.foreign.clone(),
        ),
        PairSide::Foreign => (
            foreign_key.lang_code(),
            home.lang_code(),
            TranslationKind::ForeignToHome,
            pair.standard.clone(),
        ),
    };

    debug!(
        from = %message.channel_name,
        to = %partner.name,
        "Relaying message to partner channel"
    );

    // An empty-content message never calls the translation backend;
    // attachments are still relayed.
    let translation = if message.content.trim().is_empty() {
        None
    } else {
        Some(
            translator
                .get_translation(Some(&from), &to, &message.content, kind)
                .await,
        )
    };

    let mut relay_text = translation
        .as_ref()
        .map(|t| t.translated.text.clone())
        .unwrap_or_default();
    if !message.attachments.is_empty() {
        if !relay_text.is_empty() {
            relay_text.push(' ');
        }
        relay_text.push_str(&message.attachments.join(" "));
    }
    if relay_text.trim().is_empty() {
        return;
    }

    let post = format!("**{}**: {}", message.author.display_name, relay_text);
    if let Err(err) = gateway.send_message(partner.id, &post).await {
        warn!(channel = %partner.name, "Failed to relay message: {err:#}");
        return;
    }

    let Some(translation) = translation else {
        return;
    };

    let (home_text, foreign_text) = match kind {
        TranslationKind::HomeToForeign => (
            LocalText {
                language: translation.original.language,
                text: message.content.clone(),
            },
            LocalText {
                language: translation.translated.language,
                text: relay_text,
            },
        ),
        TranslationKind::ForeignToHome => (
            LocalText {
                language: translation.translated.language,
                text: relay_text,
            },
            LocalText {
                language: translation.original.language,
                text: message.content.clone(),
            },
        ),
    };

    let record = ArchiveRecord {
        guild: message.guild,
        author_name: message.author.display_name.clone(),
        author_avatar_url: message.author.avatar_url.clone(),
        home: home_text,
        foreign: foreign_text,
        code_blocks: translation.code_blocks,
        attachment_preview: message.attachments.first().cloned(),
    };
    // the loop may already be gone during shutdown; nothing to do then
    let _ = archive_tx.send(record);
}
