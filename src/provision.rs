//! Guild provisioning: home-language detection and the fixed furniture of
//! the translation category.
//!
//! Runs whenever a guild becomes available. Detects the guild's home
//! language from the platform's preferred-locale metadata, makes sure the
//! designated category and the two permanent channels exist, posts the
//! stock how-to messages, and rebuilds the pair registry from whatever
//! channels already exist.

use crate::constants::{
    CATEGORY_NAME, COMMAND_PREFIX, HISTORY_CHANNEL_NAME, HOW_TO_CHANNEL_NAME, STANDARD_LANGUAGE,
};
use crate::gateway::{ChannelInfo, ChatGateway, GuildId};
use crate::language::LanguageKey;
use crate::registry::PairRegistry;
use crate::translator::TranslationClient;
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-guild home language cache: written once during provisioning, read
/// by the lifecycle manager and router on every message.
#[derive(Debug, Default)]
pub struct GuildLanguages {
    map: DashMap<GuildId, LanguageKey>,
}

impl GuildLanguages {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The guild's home language, defaulting before provisioning has run.
    pub fn home_language(&self, guild: GuildId) -> LanguageKey {
        self.map
            .get(&guild)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| LanguageKey::new(STANDARD_LANGUAGE))
    }

    pub fn set(&self, guild: GuildId, language: LanguageKey) {
        self.map.insert(guild, language);
    }
}

/// Reduce a platform locale tag to its parent language (`en-US` → `en`).
pub(crate) fn parent_locale(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or(tag)
        .to_lowercase()
}

pub struct GuildProvisioner {
    gateway: Arc<dyn ChatGateway>,
    translator: TranslationClient,
    languages: Arc<GuildLanguages>,
    registry: Arc<PairRegistry>,
}

impl GuildProvisioner {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        translator: TranslationClient,
        languages: Arc<GuildLanguages>,
        registry: Arc<PairRegistry>,
    ) -> Self {
        Self {
            gateway,
            translator,
            languages,
            registry,
        }
    }

    pub async fn configure(&self, guild: GuildId) -> Result<()> {
        debug!(%guild, "Configuring guild");

        let home = self.detect_home_language(guild).await?;
        info!(%guild, language = %home, "Guild home language set");
        self.languages.set(guild, home.clone());

        if !self.gateway.has_category(guild, CATEGORY_NAME).await? {
            debug!("'{CATEGORY_NAME}' category not found, creating");
            self.gateway.create_category(guild, CATEGORY_NAME).await?;
        }

        let how_to = self
            .ensure_channel(
                guild,
                HOW_TO_CHANNEL_NAME,
                &format!(
                    "Use the {COMMAND_PREFIX} create <your-language> command to start a session"
                ),
            )
            .await?;
        self.ensure_channel(
            guild,
            HISTORY_CHANNEL_NAME,
            "Use this channel to search past localized conversations",
        )
        .await?;

        self.post_stock_messages(&how_to).await?;

        let channels = self
            .gateway
            .category_channels(guild, CATEGORY_NAME)
            .await
            .context("Failed to enumerate category channels for rebuild")?;
        self.registry.rebuild(&channels, &home);

        debug!(%guild, "Done configuring guild");
        Ok(())
    }

    /// Resolve the guild's home language from its preferred locale,
    /// falling back to the standard language when the locale is missing
    /// or unsupported by the translation backend.
    async fn detect_home_language(&self, guild: GuildId) -> Result<LanguageKey> {
        let locale = self.gateway.preferred_locale(guild).await?;
        let candidate = locale
            .as_deref()
            .map(parent_locale)
            .filter(|tag| !tag.is_empty())
            .unwrap_or_else(|| STANDARD_LANGUAGE.to_string());

        let key = LanguageKey::new(&candidate);
        if self.translator.is_supported(&key.lang_code()).await {
            Ok(key)
        } else {
            debug!(
                locale = candidate,
                "Couldn't resolve guild language, defaulting to {STANDARD_LANGUAGE}"
            );
            Ok(LanguageKey::new(STANDARD_LANGUAGE))
        }
    }

    async fn ensure_channel(
        &self,
        guild: GuildId,
        name: &str,
        topic: &str,
    ) -> Result<ChannelInfo> {
        let channels = self
            .gateway
            .category_channels(guild, CATEGORY_NAME)
            .await?;
        if let Some(existing) = channels.into_iter().find(|c| c.name == name) {
            return Ok(existing);
        }

        debug!("'#{name}' channel not found, creating");
        self.gateway
            .create_channel(guild, CATEGORY_NAME, name, Some(topic))
            .await
            .with_context(|| format!("Failed to create the '{name}' channel"))
    }

    /// Post the stock how-to messages unless they are already present.
    async fn post_stock_messages(&self, how_to: &ChannelInfo) -> Result<()> {
        let recent = self.gateway.recent_messages(how_to.id, 20).await?;

        if !recent.iter().any(|m| m.content.contains("Supported Languages:")) {
            let languages = self.translator.supported_languages().await;
            let mut message = String::from("**Supported Languages:**\n```\n");
            message.push_str(&format!("{:<9}Name\n", "Language"));
            for (code, details) in &languages {
                let native = details.native_name.as_deref().unwrap_or("");
                message.push_str(&format!("{code:<9}{native}\n"));
            }
            message.push_str("```");
            self.gateway.send_message(how_to.id, &message).await?;
        }

        if !recent.iter().any(|m| m.content.contains("Usage:")) {
            self.gateway
                .send_message(
                    how_to.id,
                    &format!("**Usage:** `{COMMAND_PREFIX} create <lang>`"),
                )
                .await?;
        }

        if !recent.iter().any(|m| m.content.contains("Example:")) {
            self.gateway
                .send_message(how_to.id, &format!("**Example:** `{COMMAND_PREFIX} create es`"))
                .await?;
        }

        Ok(())
    }
}
