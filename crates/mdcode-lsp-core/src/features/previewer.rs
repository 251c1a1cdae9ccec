//! Markdown rendering of engine documentation and doc-comment tags.

use std::sync::LazyLock;

use regex::Regex;

use crate::engine::{JsDocTagInfo, SymbolDisplayPart};

/// `{@link https://… text}` style inline links.
static INLINE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{@(link|linkplain|linkcode) (https?://[^ |}]+?)(?:[| ]([^{}\n]+?))?\}")
        .expect("Invalid regex pattern for inline links")
});

static PARAM_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s*-?\s*").expect("Invalid regex pattern for tag heads"));

static CODE_FENCE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[~`]{3}").expect("Invalid regex pattern for code fences"));

static EXAMPLE_CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<caption>(.*?)</caption>\s*(\r\n|\n)")
        .expect("Invalid regex pattern for example captions")
});

static AUTHOR_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(.+)\s<([-.\w]+@[-.\w]+)>").expect("Invalid regex pattern for author e-mails")
});

fn replace_links(text: &str) -> String {
    INLINE_LINK
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let link = &caps[2];
            let label = caps.get(3).map_or(link, |m| m.as_str().trim());
            if caps[1].eq_ignore_ascii_case("linkcode") {
                format!("[`{label}`]({link})")
            } else {
                format!("[{label}]({link})")
            }
        })
        .into_owned()
}

/// Join display parts, rendering `link`/`linkName`/`linkText` runs.
fn convert_link_tags(parts: &[SymbolDisplayPart]) -> String {
    let mut out = String::new();
    let mut link: Option<(Option<&str>, Option<&str>)> = None;
    for part in parts {
        match part.kind.as_str() {
            "link" => match link.take() {
                Some((name, text)) => {
                    if let Some(label) = text.or(name) {
                        out.push_str(label);
                    }
                }
                None => link = Some((None, None)),
            },
            "linkName" => {
                if let Some((name, _)) = link.as_mut() {
                    *name = Some(part.text.as_str());
                }
            }
            "linkText" => {
                if let Some((_, text)) = link.as_mut() {
                    *text = Some(part.text.as_str());
                }
            }
            _ => out.push_str(&part.text),
        }
    }
    replace_links(&out)
}

fn make_codeblock(text: &str) -> String {
    if CODE_FENCE_START.is_match(text) {
        text.to_string()
    } else {
        format!("```\n{text}\n```")
    }
}

fn tag_body(tag: &JsDocTagInfo) -> Option<String> {
    if tag.text.is_empty() {
        return None;
    }
    let text = convert_link_tags(&tag.text);
    let body = match tag.name.as_str() {
        "example" => match EXAMPLE_CAPTION.captures(&text) {
            Some(caps) => {
                let rest = &text[caps[0].len()..];
                format!("{}\n\n{}", &caps[1], make_codeblock(rest))
            }
            None => make_codeblock(&text),
        },
        "author" => match AUTHOR_EMAIL.captures(&text) {
            Some(caps) => format!("{} {}", &caps[1], &caps[2]),
            None => text,
        },
        "default" => make_codeblock(&text),
        _ => text,
    };
    Some(body)
}

fn with_label(label: String, text: &str) -> String {
    if text.contains('\n') {
        format!("{label}  \n{text}")
    } else {
        format!("{label} — {text}")
    }
}

fn tag_documentation(tag: &JsDocTagInfo) -> String {
    if matches!(
        tag.name.as_str(),
        "augments" | "extends" | "param" | "template"
    ) {
        let text = convert_link_tags(&tag.text);
        if let Some(caps) = PARAM_HEAD.captures(&text) {
            let label = format!("*@{}* `{}`", tag.name, &caps[1]);
            let doc = &text[caps[0].len()..];
            if doc.is_empty() {
                return label;
            }
            return with_label(label, &replace_links(doc));
        }
    }

    let label = format!("*@{}*", tag.name);
    match tag_body(tag) {
        Some(text) if !text.is_empty() => with_label(label, &text),
        _ => label,
    }
}

/// Render documentation parts and tags as markdown.
pub fn markdown_documentation(documentation: &[SymbolDisplayPart], tags: &[JsDocTagInfo]) -> String {
    let mut out = convert_link_tags(documentation);
    let tags = tags
        .iter()
        .map(tag_documentation)
        .collect::<Vec<_>>()
        .join("  \n\n");
    if !tags.is_empty() {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&tags);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(name: &str, text: &str) -> JsDocTagInfo {
        JsDocTagInfo {
            name: name.to_string(),
            text: vec![SymbolDisplayPart::text(text)],
        }
    }

    #[test]
    fn renders_inline_links() {
        let docs = [SymbolDisplayPart::text(
            "See {@link https://example.com the docs} and {@linkcode https://x.dev}.",
        )];
        assert_eq!(
            markdown_documentation(&docs, &[]),
            "See [the docs](https://example.com) and [`https://x.dev`](https://x.dev)."
        );
    }

    #[test]
    fn renders_link_parts() {
        let docs = [
            SymbolDisplayPart::text("Use "),
            SymbolDisplayPart::new("link", "{@link "),
            SymbolDisplayPart::new("linkName", "helper"),
            SymbolDisplayPart::new("link", "}"),
            SymbolDisplayPart::text(" instead."),
        ];
        assert_eq!(markdown_documentation(&docs, &[]), "Use helper instead.");
    }

    #[test]
    fn renders_tags() {
        let docs = [SymbolDisplayPart::text("Adds numbers.")];
        let tags = [
            tag("param", "a - the first"),
            tag("param", "b"),
            tag("author", "Jane Doe <jane@example.com>"),
            tag("example", "<caption>Sum</caption>\nadd(1, 2)"),
            tag("deprecated", ""),
        ];
        assert_eq!(
            markdown_documentation(&docs, &tags),
            "Adds numbers.\n\n\
             *@param* `a` — the first  \n\n\
             *@param* `b`  \n\n\
             *@author* — Jane Doe jane@example.com  \n\n\
             *@example*  \nSum\n\n```\nadd(1, 2)\n```  \n\n\
             *@deprecated*"
        );
    }
}
