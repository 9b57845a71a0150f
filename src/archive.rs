//! History archive records and their embed rendering.
//!
//! Every relayed message produces one combined record carrying both
//! language variants, the author identity, any lifted code blocks and at
//! most one attachment preview. A record is only worth posting when both
//! variants have text; half-records are dropped to keep the archive
//! searchable. Sides longer than the archive field limit are split into
//! multiple same-language fields rather than one oversized field.

use crate::constants::ARCHIVE_FIELD_LIMIT;
use crate::gateway::{EmbedField, GuildId, MessageEmbed};
use crate::translator::LocalText;

/// One relayed message, both variants, ready for the history channel.
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    pub guild: GuildId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    /// The variant in the guild's home language.
    pub home: LocalText,
    /// The variant in the mirrored foreign language.
    pub foreign: LocalText,
    pub code_blocks: Vec<String>,
    /// First attachment URL, if the message carried any.
    pub attachment_preview: Option<String>,
}

impl ArchiveRecord {
    /// Whether the record is complete enough to archive. Either side being
    /// blank means the translation produced nothing useful and the record
    /// would be noise.
    pub fn is_postable(&self) -> bool {
        !self.home.text.trim().is_empty() && !self.foreign.text.trim().is_empty()
    }

    /// Render the record as an archive embed, chunking oversized sides.
    pub fn render(&self) -> MessageEmbed {
        let mut fields = Vec::new();
        push_chunked(&mut fields, &self.home.language, &self.home.text, true);
        push_chunked(&mut fields, &self.foreign.language, &self.foreign.text, true);

        if !self.code_blocks.is_empty() {
            let artifact = self.code_blocks.join("\n");
            push_chunked(&mut fields, "code", &artifact, false);
        }

        MessageEmbed {
            author_name: self.author_name.clone(),
            author_icon_url: self.author_avatar_url.clone(),
            fields,
            image_url: self.attachment_preview.clone(),
        }
    }
}

fn push_chunked(fields: &mut Vec<EmbedField>, name: &str, value: &str, inline: bool) {
    for chunk in chunk_up_to(value, ARCHIVE_FIELD_LIMIT) {
        fields.push(EmbedField {
            name: name.to_string(),
            value: chunk,
            inline,
        });
    }
}

/// Split `text` into chunks of at most `max_chars` characters. Boundaries
/// are character-based, never inside a code point.
pub fn chunk_up_to(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
