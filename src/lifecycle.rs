//! Channel-pair lifecycle: idempotent creation of mirror channel pairs.
//!
//! Channel creation against the platform is irreversible mid-algorithm,
//! so the order matters: every validation that can fail without side
//! effects runs first, and the only compensated failure is losing the
//! registration race, where the loser deletes its own fresh channels and
//! adopts the winner's pair.

use crate::constants::CATEGORY_NAME;
use crate::error::RelayError;
use crate::gateway::{ChatGateway, GuildId};
use crate::language::{pair_channel_names, LanguageKey};
use crate::provision::GuildLanguages;
use crate::registry::{ChannelPair, InsertOutcome, PairChannel, PairRegistry};
use crate::translator::{TranslationClient, TranslationKind};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PairLifecycle {
    gateway: Arc<dyn ChatGateway>,
    translator: TranslationClient,
    registry: Arc<PairRegistry>,
    languages: Arc<GuildLanguages>,
}

impl PairLifecycle {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        translator: TranslationClient,
        registry: Arc<PairRegistry>,
        languages: Arc<GuildLanguages>,
    ) -> Self {
        Self {
            gateway,
            translator,
            registry,
            languages,
        }
    }

    /// Return the pair for `lang`, creating both channels when none exists.
    ///
    /// Validations run before any channel is created, so an unsupported
    /// language or missing category leaves the platform untouched.
    pub async fn get_or_create(
        &self,
        guild: GuildId,
        lang: &str,
    ) -> Result<ChannelPair, RelayError> {
        let key = LanguageKey::new(lang);
        let home = self.languages.home_language(guild);

        if key == home {
            return Err(RelayError::HomeLanguage(key.lang_code()));
        }

        if let Some(existing) = self.registry.get(&key) {
            debug!(%key, "Pair already registered");
            return Ok(existing);
        }

        if !self.translator.is_supported(&key.lang_code()).await {
            return Err(RelayError::LanguageNotSupported(lang.to_string()));
        }

        if !self
            .gateway
            .has_category(guild, CATEGORY_NAME)
            .await
            .map_err(RelayError::PairCreation)?
        {
            return Err(RelayError::MissingCategory(CATEGORY_NAME.to_string()));
        }

        let (standard_name, foreign_name) = pair_channel_names(&home, &key);
        debug!(%standard_name, %foreign_name, "Creating channel pair");

        let foreign = self
            .gateway
            .create_channel(guild, CATEGORY_NAME, &foreign_name, None)
            .await
            .map_err(RelayError::PairCreation)?;
        let standard = self
            .gateway
            .create_channel(guild, CATEGORY_NAME, &standard_name, None)
            .await
            .map_err(RelayError::PairCreation)?;

        // The foreign side's topic is localized through the full
        // mask-translate-unmask path so the embedded channel mention
        // survives translation.
        let foreign_topic = self
            .translator
            .get_translation(
                Some(&home.lang_code()),
                &key.lang_code(),
                &format!(
                    "Responses will be translated to {} and posted in this channel's pair {}",
                    home.lang_code(),
                    standard.mention()
                ),
                TranslationKind::HomeToForeign,
            )
            .await
            .translated
            .text;
        self.gateway
            .set_topic(foreign.id, &foreign_topic)
            .await
            .map_err(RelayError::PairCreation)?;

        let standard_topic = format!(
            "Responses will be translated to {} and posted in this channel's pair {}",
            key.lang_code(),
            foreign.mention()
        );
        self.gateway
            .set_topic(standard.id, &standard_topic)
            .await
            .map_err(RelayError::PairCreation)?;

        let pair = ChannelPair {
            standard: PairChannel::from(&standard),
            foreign: PairChannel::from(&foreign),
        };

        match self.registry.try_insert(key.clone(), pair.clone()) {
            InsertOutcome::Inserted => Ok(pair),
            InsertOutcome::Lost(winner) => {
                warn!(
                    %key,
                    "The channel pair {{{foreign_name}, {standard_name}}} is already tracked, cleaning up"
                );
                if let Err(err) = self.gateway.delete_channel(foreign.id).await {
                    warn!("Failed to delete duplicate foreign channel: {err:#}");
                }
                if let Err(err) = self.gateway.delete_channel(standard.id).await {
                    warn!("Failed to delete duplicate home channel: {err:#}");
                }
                Ok(winner)
            }
        }
    }
}
