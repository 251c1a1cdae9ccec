//! Embedded languages recognized after an opening fence.

use serde::{Deserialize, Serialize};

/// A supported fence tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Tsx,
    Ts,
    Jsx,
    Js,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::Tsx, Language::Ts, Language::Jsx, Language::Js];

    /// The tag written after the fence.
    pub fn tag(self) -> &'static str {
        match self {
            Language::Tsx => "tsx",
            Language::Ts => "ts",
            Language::Jsx => "jsx",
            Language::Js => "js",
        }
    }

    /// Extension of the virtual file; the engine picks its script kind from it.
    pub fn extension(self) -> &'static str {
        self.tag()
    }

    /// Editor language id.
    pub fn language_id(self) -> &'static str {
        match self {
            Language::Tsx => "typescriptreact",
            Language::Ts => "typescript",
            Language::Jsx => "javascriptreact",
            Language::Js => "javascript",
        }
    }

    /// Language used for code fences in hover markup.
    pub fn markup_language(self) -> &'static str {
        match self {
            Language::Tsx | Language::Ts => "typescript",
            Language::Jsx | Language::Js => "javascript",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.tag() == tag)
    }

    /// Match a tag at the start of `rest`, requiring a word boundary after it.
    pub(crate) fn matches_prefix(self, rest: &str) -> bool {
        match rest.strip_prefix(self.tag()) {
            Some(after) => after
                .chars()
                .next()
                .is_none_or(|c| !(c.is_alphanumeric() || c == '_' || c == '$' || c == '-')),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_tag(lang.tag()), Some(lang));
        }
        assert_eq!(Language::from_tag("python"), None);
    }

    #[test]
    fn prefix_requires_word_boundary() {
        assert!(Language::Ts.matches_prefix("ts"));
        assert!(Language::Ts.matches_prefix("ts live=true"));
        assert!(Language::Ts.matches_prefix("ts{.class}"));
        assert!(!Language::Ts.matches_prefix("tsx"));
        assert!(!Language::Js.matches_prefix("json"));
        assert!(Language::Tsx.matches_prefix("tsx\r"));
    }

    #[test]
    fn deserializes_lowercase() {
        let langs: Vec<Language> = serde_json::from_str(r#"["tsx", "js"]"#).unwrap();
        assert_eq!(langs, vec![Language::Tsx, Language::Js]);
    }
}
