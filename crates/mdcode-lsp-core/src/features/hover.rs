use crate::engine::display_parts_to_string;
use crate::error::Result;
use crate::features::degrade;
use crate::features::previewer::markdown_documentation;
use crate::language::Language;
use crate::session::Session;
use crate::types::{Hover, MarkupContent, Position};

/// Signature and documentation of the symbol at `position`.
pub fn hover(session: &mut Session, uri: &str, position: Position) -> Option<Hover> {
    degrade("hover", uri, try_hover(session, uri, position))
}

fn try_hover(session: &mut Session, uri: &str, position: Position) -> Result<Option<Hover>> {
    let target = session.resolve_position(uri, position)?;
    let info = session
        .with_engine(|engine, host| engine.quick_info(host, &target.file, target.offset))?;
    let Some(info) = info else {
        return Ok(None);
    };

    let language = target
        .language
        .or_else(|| target.file.extension().and_then(Language::from_tag))
        .map_or("typescript", Language::markup_language);

    let mut parts = Vec::new();
    let signature = display_parts_to_string(&info.display_parts);
    if !signature.is_empty() {
        parts.push(format!("```{language}\n{signature}\n```"));
    }
    let documentation = markdown_documentation(&info.documentation, &info.tags);
    if !documentation.is_empty() {
        parts.push(documentation);
    }
    if parts.is_empty() {
        return Ok(None);
    }

    let range = session.file_range(&target.file, info.text_span);
    Ok(Some(Hover {
        contents: MarkupContent::markdown(parts.join("\n\n")),
        range,
    }))
}
