//! Reversible masking of spans the translation backend must not touch.
//!
//! Masking runs in two passes. Pass 1 lifts fenced code blocks out of the
//! text entirely; they travel beside the translation as a separate "code"
//! artifact and are rendered side-by-side in the archive rather than being
//! reinserted into translated prose. Pass 2 replaces inline code spans and
//! platform tokens (user/role/channel mentions, custom and animated emoji)
//! with placeholder tokens of the form `{<digits>}` that survive a round
//! trip through the translator unchanged.
//!
//! Masking is a pure string transform and never fails. When the downstream
//! translation call fails, `restore_original` reproduces the exact input so
//! no span is ever lost.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use uuid::Uuid;

fn code_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)```.*?```").expect("code block pattern is valid"))
}

fn inline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // matches `inline code` or <mention/emoji> platform tokens
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)`.*?`|<(@[!&]?|#|a?:.+?:)[0-9]{17,19}>")
            .expect("inline pattern is valid")
    })
}

/// One masked inline span: the placeholder that went to the translator and
/// the literal text it stands for.
#[derive(Debug, Clone)]
pub struct MaskedSpan {
    pub token: String,
    pub literal: String,
}

/// A source string together with everything that was stripped out of it.
#[derive(Debug, Clone)]
pub struct MaskedText {
    source: String,
    text: String,
    code_blocks: Vec<CodeBlock>,
    inline: Vec<MaskedSpan>,
}

/// A lifted code block and the offset it was removed from, recorded in the
/// coordinates of the pass-1 output so the original can be rebuilt.
#[derive(Debug, Clone)]
struct CodeBlock {
    offset: usize,
    literal: String,
}

impl MaskedText {
    pub fn mask(source: &str) -> Self {
        // Pass 1: lift fenced code blocks out entirely, remembering where
        // each one sat so the untranslated text can be reassembled.
        let mut stripped = String::with_capacity(source.len());
        let mut code_blocks = Vec::new();
        let mut last = 0;
        for found in code_block_pattern().find_iter(source) {
            stripped.push_str(&source[last..found.start()]);
            code_blocks.push(CodeBlock {
                offset: stripped.len(),
                literal: found.as_str().to_string(),
            });
            last = found.end();
        }
        stripped.push_str(&source[last..]);

        // Pass 2: swap inline spans for unique placeholders. Repeated
        // identical spans each get their own placeholder so restoration
        // stays exact-match safe.
        let mut inline = Vec::new();
        let mut seen = HashSet::new();
        let text = inline_pattern()
            .replace_all(&stripped, |caps: &regex::Captures<'_>| {
                let token = next_placeholder(&mut seen);
                inline.push(MaskedSpan {
                    token: token.clone(),
                    literal: caps[0].to_string(),
                });
                token
            })
            .into_owned();

        Self {
            source: source.to_string(),
            text,
            code_blocks,
            inline,
        }
    }

    /// The placeholder-substituted text to hand to the translation backend.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The lifted code blocks, fences included, in document order.
    pub fn code_blocks(&self) -> Vec<String> {
        self.code_blocks
            .iter()
            .map(|block| block.literal.clone())
            .collect()
    }

    /// Restore inline placeholders in translated text by exact token match.
    ///
    /// Code blocks are deliberately not substituted back: their recorded
    /// offsets are meaningless inside translated prose, so they are exposed
    /// through [`Self::code_blocks`] instead.
    pub fn unmask(&self, translated: &str) -> String {
        let mut restored = translated.to_string();
        for span in &self.inline {
            restored = restored.replace(&span.token, &span.literal);
        }
        restored
    }

    /// Rebuild the exact original input: restore inline placeholders, then
    /// reinsert code blocks at their recorded offsets. Used when the
    /// translation call fails and the untranslated text must be relayed.
    pub fn restore_original(&self) -> String {
        let mut restored = self.unmask(&self.text);
        for block in self.code_blocks.iter().rev() {
            restored.insert_str(block.offset, &block.literal);
        }
        restored
    }
}

/// Generate a placeholder from the digit characters of a fresh UUID,
/// regenerating on the rare collision or digit-free draw. Digits wrapped
/// in braces survive translation unchanged, and since braces never occur
/// inside a token body, no placeholder can be a substring of another.
fn next_placeholder(seen: &mut HashSet<String>) -> String {
    loop {
        let digits: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() || !seen.insert(digits.clone()) {
            continue;
        }
        return format!("{{{digits}}}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ==================== Inline Masking Tests ====================

    #[test]
    fn test_inline_code_is_masked() {
        let masked = MaskedText::mask("run `cargo check` before pushing");
        assert!(!masked.text().contains("`cargo check`"));
        assert_eq!(masked.inline.len(), 1);
        assert_eq!(masked.inline[0].literal, "`cargo check`");
    }

    #[test]
    fn test_user_mention_is_masked() {
        let masked = MaskedText::mask("ping <@123456789012345678> please");
        assert!(!masked.text().contains('<'));
        assert_eq!(masked.inline.len(), 1);
    }

    #[test]
    fn test_nickname_role_and_channel_mentions_are_masked() {
        let masked = MaskedText::mask(
            "<@!123456789012345678> <@&123456789012345678> <#123456789012345678>",
        );
        assert_eq!(masked.inline.len(), 3);
    }

    #[test]
    fn test_custom_and_animated_emoji_are_masked() {
        let masked =
            MaskedText::mask("nice <:thumbsup:123456789012345678> <a:clap:987654321098765432>");
        assert_eq!(masked.inline.len(), 2);
    }

    #[test]
    fn test_plain_text_is_untouched() {
        let masked = MaskedText::mask("nothing special here");
        assert_eq!(masked.text(), "nothing special here");
        assert!(masked.inline.is_empty());
        assert!(masked.code_blocks().is_empty());
    }

    #[test]
    fn test_short_ids_are_not_mention_tokens() {
        // platform ids are 17-19 digits; anything shorter is prose
        let masked = MaskedText::mask("tuple <@123> stays");
        assert!(masked.inline.is_empty());
    }

    // ==================== Code Block Tests ====================

    #[test]
    fn test_code_block_is_removed_entirely() {
        let masked = MaskedText::mask("before ```let x = 1;``` after");
        assert_eq!(masked.text(), "before  after");
        assert_eq!(masked.code_blocks(), vec!["```let x = 1;```".to_string()]);
    }

    #[test]
    fn test_multiline_code_block() {
        let masked = MaskedText::mask("see:\n```\nfn main() {}\n```\ndone");
        assert!(!masked.text().contains("fn main"));
        assert_eq!(masked.code_blocks().len(), 1);
    }

    #[test]
    fn test_multiple_code_blocks_keep_order() {
        let masked = MaskedText::mask("```one``` mid ```two```");
        let blocks = masked.code_blocks();
        assert_eq!(blocks, vec!["```one```".to_string(), "```two```".to_string()]);
    }

    // ==================== Placeholder Invariant Tests ====================

    #[test]
    fn test_repeated_spans_get_distinct_placeholders() {
        let masked = MaskedText::mask("<@123456789012345678> and <@123456789012345678>");
        assert_eq!(masked.inline.len(), 2);
        assert_ne!(masked.inline[0].token, masked.inline[1].token);
    }

    #[test]
    fn test_no_placeholder_is_substring_of_another() {
        let masked = MaskedText::mask(
            "`a` `b` `c` <@123456789012345678> <#123456789012345678> `d` `e`",
        );
        let tokens: Vec<&str> = masked.inline.iter().map(|s| s.token.as_str()).collect();
        for (i, a) in tokens.iter().copied().enumerate() {
            for (j, b) in tokens.iter().copied().enumerate() {
                if i != j {
                    assert!(!a.contains(b), "{b} is a substring of {a}");
                }
            }
        }
    }

    #[test]
    fn test_placeholders_contain_no_translation_sensitive_chars() {
        let masked = MaskedText::mask("`x` <@123456789012345678>");
        for span in &masked.inline {
            let body = span.token.trim_start_matches('{').trim_end_matches('}');
            assert!(body.chars().all(|c| c.is_ascii_digit()), "{}", span.token);
            assert!(!span.token.contains(char::is_whitespace));
        }
    }

    // ==================== Round Trip Tests ====================

    #[test]
    fn test_unmask_restores_inline_spans() {
        let original = "Check `x=1` <@123456789012345678> done";
        let masked = MaskedText::mask(original);
        assert_eq!(masked.unmask(masked.text()), original);
    }

    #[test]
    fn test_unmask_survives_translated_surroundings() {
        let masked = MaskedText::mask("Check `x=1` please");
        let token = &masked.inline[0].token;
        let translated = format!("Veuillez vérifier {token} merci");
        assert_eq!(
            masked.unmask(&translated),
            "Veuillez vérifier `x=1` merci"
        );
    }

    #[test]
    fn test_restore_original_with_code_blocks() {
        let original = "intro ```code``` middle `x` <@123456789012345678> outro";
        let masked = MaskedText::mask(original);
        assert_eq!(masked.restore_original(), original);
    }

    #[test]
    fn test_restore_original_code_only() {
        let original = "```a```\ntext\n```b```";
        let masked = MaskedText::mask(original);
        assert_eq!(masked.restore_original(), original);
    }

    #[test]
    fn test_mask_never_fails_on_unbalanced_fences() {
        // an unclosed fence is just prose to the codec
        let masked = MaskedText::mask("broken ```fence");
        assert!(masked.code_blocks().is_empty());
        assert_eq!(masked.restore_original(), "broken ```fence");
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_round_trip_is_exact(
            words in proptest::collection::vec("[a-zA-Z ]{0,12}", 0..8),
            specials in proptest::collection::vec(0usize..4, 0..8),
        ) {
            // interleave plain prose with maskable spans of every kind
            let mut text = String::new();
            for (i, word) in words.iter().enumerate() {
                text.push_str(word);
                if let Some(kind) = specials.get(i) {
                    text.push_str(match *kind {
                        0 => "`inline`",
                        1 => "<@123456789012345678>",
                        2 => "```block\ncontents```",
                        _ => "<:emoji:123456789012345678>",
                    });
                }
            }

            let masked = MaskedText::mask(&text);
            prop_assert_eq!(masked.restore_original(), text);
        }

        #[test]
        fn prop_each_occurrence_gets_distinct_token(count in 1usize..10) {
            let text = "<@123456789012345678> ".repeat(count);
            let masked = MaskedText::mask(&text);
            prop_assert_eq!(masked.inline.len(), count);
            let unique: std::collections::HashSet<_> =
                masked.inline.iter().map(|s| s.token.clone()).collect();
            prop_assert_eq!(unique.len(), count);
        }
    }
}
