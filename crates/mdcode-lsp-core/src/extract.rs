//! Fenced code block extraction.
//!
//! [`BlockExtractor::parse`] scans a prose document once, line by line, and
//! returns the fenced blocks tagged with an enabled [`Language`]. Each block
//! carries its span in the owner document and can produce its shadow: a copy
//! of the owner text, byte-for-byte the same length, where everything outside
//! the span is a blank and every newline is kept. Offsets and positions on
//! block lines are therefore valid unchanged in both texts.

use std::sync::Arc;

use crate::language::Language;
use crate::line_index::utf16_len;

const FENCE: &str = "```";

/// Location of a block body in its owner document.
///
/// Lines are zero-based, columns are UTF-16 code units and offsets are UTF-8
/// byte offsets. The end is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start_line: u32,
    pub start_column: u32,
    pub start_offset: usize,
    pub end_line: u32,
    pub end_column: u32,
    pub end_offset: usize,
}

impl Span {
    /// Whether `line` falls on the block, boundary lines included.
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// Whether the byte range `start..end` lies within the span.
    pub fn contains_offsets(&self, start: usize, end: usize) -> bool {
        self.start_offset <= start && end <= self.end_offset
    }

    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

/// One fenced block from a single parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Position in the parse output. Not stable across parses.
    pub index: usize,
    pub language: Language,
    pub span: Span,
    /// The block body, verbatim.
    pub content: String,
    /// The whole owner text blanked, shared by every block of one parse.
    filler: Arc<str>,
}

impl CodeBlock {
    /// Length of the owner text, which is also the shadow length.
    pub fn source_len(&self) -> usize {
        self.filler.len()
    }

    /// Build the shadow source for this block.
    pub fn shadow(&self) -> String {
        let mut shadow = String::with_capacity(self.filler.len());
        shadow.push_str(&self.filler[..self.span.start_offset]);
        shadow.push_str(&self.content);
        shadow.push_str(&self.filler[self.span.end_offset..]);
        shadow
    }

    /// Whether `other` produces the same shadow as this block.
    pub fn same_shadow(&self, other: &CodeBlock) -> bool {
        self.span == other.span
            && self.content == other.content
            && (Arc::ptr_eq(&self.filler, &other.filler) || self.filler == other.filler)
    }

    /// Compare this block's shadow with `text` without building the shadow.
    ///
    /// Lengths are compared first, so most edits are rejected in O(1).
    pub fn shadow_matches(&self, text: &str) -> bool {
        if text.len() != self.filler.len() {
            return false;
        }
        let Span {
            start_offset: start,
            end_offset: end,
            ..
        } = self.span;
        let bytes = text.as_bytes();
        bytes[start..end] == *self.content.as_bytes()
            && bytes[..start] == *self.filler[..start].as_bytes()
            && bytes[end..] == *self.filler[end..].as_bytes()
    }
}

/// Extracts blocks for a fixed set of languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExtractor {
    languages: Vec<Language>,
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self::new(Language::ALL)
    }
}

impl BlockExtractor {
    pub fn new(languages: impl IntoIterator<Item = Language>) -> Self {
        let mut languages: Vec<Language> = languages.into_iter().collect();
        languages.sort();
        languages.dedup();
        Self { languages }
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    /// Parse `text` into its ordered blocks.
    ///
    /// An opening fence is three backticks directly followed by an enabled
    /// tag; it may appear anywhere on its line, and the rest of that line is
    /// not part of the block. The block is closed by the first later line that
    /// starts with three backticks. A fence that is never closed yields no block.
    pub fn parse(&self, text: &str) -> Vec<CodeBlock> {
        let mut open: Option<Opening> = None;
        let mut found: Vec<(Language, Span)> = Vec::new();
        let mut last_line_start = 0;

        for (line_no, (line_start, line)) in lines(text).enumerate() {
            let line_no = line_no as u32;
            match open {
                None => {
                    if let Some(language) = self.opening_fence(line) {
                        open = Some(Opening {
                            language,
                            body_line: line_no + 1,
                            body_start: line_start + line.len(),
                        });
                    }
                }
                Some(opening) => {
                    if line.starts_with(FENCE) {
                        let span = if line_no == opening.body_line {
                            Span {
                                start_line: line_no,
                                start_column: 0,
                                start_offset: line_start,
                                end_line: line_no,
                                end_column: 0,
                                end_offset: line_start,
                            }
                        } else {
                            let end_offset = line_start - 1;
                            Span {
                                start_line: opening.body_line,
                                start_column: 0,
                                start_offset: opening.body_start,
                                end_line: line_no - 1,
                                end_column: utf16_len(&text[last_line_start..end_offset]),
                                end_offset,
                            }
                        };
                        found.push((opening.language, span));
                        open = None;
                    }
                }
            }
            last_line_start = line_start;
        }

        if let Some(opening) = open {
            tracing::debug!(
                line = opening.body_line.saturating_sub(1),
                language = opening.language.tag(),
                "discarding unterminated code block"
            );
        }

        if found.is_empty() {
            return Vec::new();
        }

        let filler: Arc<str> = text
            .bytes()
            .map(|b| if b == b'\n' { '\n' } else { ' ' })
            .collect::<String>()
            .into();

        found
            .into_iter()
            .enumerate()
            .map(|(index, (language, span))| CodeBlock {
                index,
                language,
                span,
                content: text[span.start_offset..span.end_offset].to_string(),
                filler: Arc::clone(&filler),
            })
            .collect()
    }

    fn opening_fence(&self, line: &str) -> Option<Language> {
        // A fence line without a trailing newline cannot have a body.
        if !line.ends_with('\n') {
            return None;
        }
        // Every backtick may start a fence, so runs longer than three match.
        line.match_indices('`').find_map(|(at, _)| {
            let rest = line[at..].strip_prefix(FENCE)?;
            self.languages
                .iter()
                .copied()
                .find(|lang| lang.matches_prefix(rest))
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Opening {
    language: Language,
    body_line: u32,
    body_start: usize,
}

/// Lines of `text` with their start offsets, each including its newline.
fn lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split_inclusive('\n').scan(0usize, |offset, line| {
        let start = *offset;
        *offset += line.len();
        Some((start, line))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<CodeBlock> {
        BlockExtractor::default().parse(text)
    }

    fn visible(shadow: &str) -> String {
        shadow.replace(' ', ".")
    }

    const GUIDE: &str = "# Guide\n\n```tsx live=true\nconst a = 1;\n```\n\nText.\n\n```ts\nlet b = a;\n```\n";

    #[test]
    fn finds_tagged_blocks_in_order() {
        let blocks = parse(GUIDE);
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].index, 0);
        assert_eq!(blocks[0].language, Language::Tsx);
        assert_eq!(blocks[0].content, "const a = 1;");
        assert_eq!(
            blocks[0].span,
            Span {
                start_line: 3,
                start_column: 0,
                start_offset: 26,
                end_line: 3,
                end_column: 12,
                end_offset: 38,
            }
        );

        assert_eq!(blocks[1].index, 1);
        assert_eq!(blocks[1].language, Language::Ts);
        assert_eq!(blocks[1].content, "let b = a;");
        assert_eq!(blocks[1].span.start_line, 9);
    }

    #[test]
    fn shadow_blanks_everything_but_the_block() {
        let blocks = parse(GUIDE);
        insta::assert_snapshot!(visible(&blocks[0].shadow()), @r"
        .......

        ................
        const.a.=.1;
        ...

        .....

        .....
        ..........
        ...
        ");
    }

    #[test]
    fn shadow_preserves_offsets() {
        let text = "Intro · ünïcode 😀\n```js\nlet s = \"é\";\nlet t = s;\n```\ntail ✓\n";
        for block in parse(text) {
            let shadow = block.shadow();
            assert_eq!(shadow.len(), text.len());
            assert_eq!(
                &shadow[block.span.start_offset..block.span.end_offset],
                &text[block.span.start_offset..block.span.end_offset]
            );
            for (i, b) in shadow.bytes().enumerate() {
                if !block.span.contains_offsets(i, i + 1) {
                    let expected = if text.as_bytes()[i] == b'\n' { b'\n' } else { b' ' };
                    assert_eq!(b, expected, "byte {i}");
                }
            }
            assert!(block.shadow_matches(&shadow));
        }
    }

    #[test]
    fn shadow_matches_detects_changes() {
        let block = &parse(GUIDE)[0];
        let mut shadow = block.shadow();
        assert!(block.shadow_matches(&shadow));

        shadow.replace_range(26..27, "k");
        assert!(!block.shadow_matches(&shadow));
        assert!(!block.shadow_matches(&shadow[1..]));
    }

    #[test]
    fn parsing_is_idempotent() {
        assert_eq!(parse(GUIDE), parse(GUIDE));
    }

    #[test]
    fn ignores_other_and_untagged_fences() {
        let text = "```python\nprint(1)\n```\n```\nplain\n```\n```json\n{}\n```\n";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn unterminated_block_is_discarded() {
        let text = "```ts\nlet a = 1;\n```\n\n```tsx\nconst open = true;\n";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "let a = 1;");
    }

    #[test]
    fn closing_fence_must_start_the_line() {
        let text = "```ts\nconst s = `a ``` b`;\n  ```\nlet c = 1;\n```\n";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "const s = `a ``` b`;\n  ```\nlet c = 1;");
    }

    #[test]
    fn any_fence_closes_an_open_block() {
        let text = "```ts\nlet a = 1;\n```tsx\nlet b = 2;\n```\n";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "let a = 1;");
        assert_eq!(blocks[0].span.end_line, 1);
    }

    #[test]
    fn opening_fence_may_follow_other_text() {
        let text = "> ```js\nlet a = 1;\n```\n";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, Language::Js);
        assert_eq!(blocks[0].span.start_line, 1);
    }

    #[test]
    fn longer_backtick_runs_open_blocks() {
        let text = "````ts\nlet a = 1;\n````\n";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, Language::Ts);
        assert_eq!(blocks[0].content, "let a = 1;");
    }

    #[test]
    fn empty_block_has_empty_span_on_closing_line() {
        let text = "```ts\n```\n";
        let blocks = parse(text);
        assert_eq!(blocks.len(), 1);
        let span = blocks[0].span;
        assert!(span.is_empty());
        assert_eq!(span.start_line, 1);
        assert_eq!(span.start_offset, 6);
        assert_eq!(blocks[0].shadow(), "     \n   \n");
    }

    #[test]
    fn respects_enabled_languages() {
        let extractor = BlockExtractor::new([Language::Ts]);
        let blocks = extractor.parse(GUIDE);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, Language::Ts);
        assert_eq!(blocks[0].index, 0);
    }

    #[test]
    fn end_column_counts_utf16_units() {
        let text = "```ts\nconst s = \"😀\";\n```\n";
        let blocks = parse(text);
        assert_eq!(blocks[0].span.end_column, 15);
    }
}
