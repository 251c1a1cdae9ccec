use std::sync::LazyLock;

use regex::Regex;

use crate::engine::{
    display_parts_to_string, CompletionEntry, CompletionOptions, ScriptElementKind,
};
use crate::error::Result;
use crate::features::degrade;
use crate::features::previewer::markdown_documentation;
use crate::session::Session;
use crate::types::{
    CompletionContext, CompletionData, CompletionItem, CompletionItemKind, CompletionItemTag,
    MarkupContent, Position, TextEdit,
};

static IMPORT_QUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(from|import)\s*["']$|\b(import|require)\(['"]$"#)
        .expect("Invalid regex pattern for import quotes")
});

static IMPORT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(from|import)\s*["'][^'"]*$|\b(import|require)\(['"][^'"]*$"#)
        .expect("Invalid regex pattern for import paths")
});

const FILE_EXTENSION_MODIFIERS: [&str; 6] = [".d.ts", ".ts", ".tsx", ".js", ".jsx", ".json"];

/// Completion items at `position`.
pub fn completion(
    session: &mut Session,
    uri: &str,
    position: Position,
    context: Option<&CompletionContext>,
) -> Vec<CompletionItem> {
    degrade(
        "completion",
        uri,
        try_completion(session, uri, position, context),
    )
}

/// Fill in detail and documentation for an item produced by [`completion`].
pub fn completion_resolve(session: &mut Session, item: CompletionItem) -> CompletionItem {
    let Some(data) = item.data.clone() else {
        return item;
    };
    let uri = data.file.clone();
    match try_resolve(session, &data) {
        Ok(Some((detail, documentation))) => CompletionItem {
            detail: Some(detail),
            documentation,
            ..item
        },
        Ok(None) => item,
        Err(error) => {
            degrade::<()>("completion_resolve", &uri, Err(error));
            item
        }
    }
}

/// Trigger characters that only make sense in import specifiers.
fn should_trigger(prefix: &str, context: &CompletionContext) -> bool {
    match context.trigger_character.as_deref() {
        Some("\"" | "'") => IMPORT_QUOTE.is_match(prefix),
        Some("/") => IMPORT_PATH.is_match(prefix),
        Some("<") => false,
        _ => true,
    }
}

fn try_completion(
    session: &mut Session,
    uri: &str,
    position: Position,
    context: Option<&CompletionContext>,
) -> Result<Vec<CompletionItem>> {
    let target = session.resolve_position(uri, position)?;

    if let Some(context) = context {
        let prefix = session
            .snapshot(&target.file)
            .and_then(|text| {
                let before = text.get(..target.offset)?;
                let line_start = before.rfind('\n').map_or(0, |i| i + 1);
                Some(before[line_start..].to_string())
            })
            .unwrap_or_default();
        if !should_trigger(&prefix, context) {
            return Ok(Vec::new());
        }
    }

    let options = CompletionOptions {
        trigger_character: context.and_then(|c| c.trigger_character.clone()),
        include_completions_with_insert_text: true,
    };
    let info = session.with_engine(|engine, host| {
        engine.completions(host, &target.file, target.offset, &options)
    })?;
    let Some(info) = info else {
        return Ok(Vec::new());
    };

    let mut items = Vec::with_capacity(info.entries.len());
    for entry in info.entries {
        let mut item = convert_entry(&entry, info.is_new_identifier_location);
        if info.is_new_identifier_location {
            if let Some(span) = entry.replacement_span {
                if let Some(range) = session.file_range(&target.file, span) {
                    let new_text = item.insert_text.clone().unwrap_or_else(|| item.label.clone());
                    item.text_edit = Some(TextEdit { range, new_text });
                }
            }
        }
        item.data = Some(CompletionData {
            file: target.file.as_str().to_string(),
            offset: target.offset,
            name: entry.name,
            source: entry.source,
        });
        items.push(item);
    }
    Ok(items)
}

fn convert_entry(entry: &CompletionEntry, new_identifier_location: bool) -> CompletionItem {
    let mut item = CompletionItem::new(entry.name.clone());
    item.kind = Some(convert_kind(entry.kind));
    item.sort_text = Some(entry.sort_text.clone());
    item.insert_text = entry.insert_text.clone();
    item.preselect = entry.is_recommended;
    if !new_identifier_location {
        item.commit_characters = commit_characters(entry.kind)
            .iter()
            .map(|c| c.to_string())
            .collect();
    }

    let modifiers: Vec<&str> = entry
        .kind_modifiers
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .collect();
    if modifiers.contains(&"optional") {
        item.filter_text.get_or_insert_with(|| entry.name.clone());
        item.insert_text.get_or_insert_with(|| entry.name.clone());
        item.label.push('?');
    }
    if modifiers.contains(&"deprecated") {
        item.tags = vec![CompletionItemTag::Deprecated];
    }
    if modifiers.contains(&"color") {
        item.kind = Some(CompletionItemKind::Color);
    }
    if entry.kind == ScriptElementKind::Script {
        if let Some(ext) = FILE_EXTENSION_MODIFIERS
            .iter()
            .find(|ext| modifiers.contains(ext))
        {
            item.detail = Some(if entry.name.to_lowercase().ends_with(ext) {
                entry.name.clone()
            } else {
                format!("{}{ext}", entry.name)
            });
        }
    }
    item
}

fn convert_kind(kind: ScriptElementKind) -> CompletionItemKind {
    use ScriptElementKind as K;
    match kind {
        K::PrimitiveType | K::Keyword => CompletionItemKind::Keyword,
        K::Const | K::Let | K::Variable | K::LocalVariable | K::Alias | K::Parameter => {
            CompletionItemKind::Variable
        }
        K::MemberVariable | K::MemberGetAccessor | K::MemberSetAccessor => CompletionItemKind::Field,
        K::Function | K::LocalFunction => CompletionItemKind::Function,
        K::Method | K::ConstructSignature | K::CallSignature | K::IndexSignature => {
            CompletionItemKind::Method
        }
        K::Enum => CompletionItemKind::Enum,
        K::EnumMember => CompletionItemKind::EnumMember,
        K::Module | K::ExternalModuleName => CompletionItemKind::Module,
        K::Class | K::Type => CompletionItemKind::Class,
        K::Interface => CompletionItemKind::Interface,
        K::Warning => CompletionItemKind::Text,
        K::Script => CompletionItemKind::File,
        K::Directory => CompletionItemKind::Folder,
        K::String => CompletionItemKind::Constant,
        _ => CompletionItemKind::Property,
    }
}

fn commit_characters(kind: ScriptElementKind) -> &'static [char] {
    use ScriptElementKind as K;
    match kind {
        K::MemberGetAccessor
        | K::MemberSetAccessor
        | K::ConstructSignature
        | K::CallSignature
        | K::IndexSignature
        | K::Enum
        | K::Interface => &['.', ';'],
        K::Module
        | K::Alias
        | K::Const
        | K::Let
        | K::Variable
        | K::LocalVariable
        | K::MemberVariable
        | K::Class
        | K::Function
        | K::Method
        | K::Keyword
        | K::Parameter => &['.', ',', ';', '('],
        _ => &[],
    }
}

fn try_resolve(
    session: &mut Session,
    data: &CompletionData,
) -> Result<Option<(String, Option<MarkupContent>)>> {
    let Some(file) = session.live_file(&data.file)? else {
        return Ok(None);
    };
    let details = session.with_engine(|engine, host| {
        engine.completion_details(host, &file, data.offset, &data.name, data.source.as_deref())
    })?;
    Ok(details.map(|details| {
        let detail = display_parts_to_string(&details.display_parts);
        let documentation = markdown_documentation(&details.documentation, &details.tags);
        let documentation = (!documentation.is_empty()).then(|| MarkupContent::markdown(documentation));
        (detail, documentation)
    }))
}
