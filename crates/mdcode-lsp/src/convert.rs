//! Conversion between mdcode-lsp-core types and tower_lsp::lsp_types.

use std::collections::HashMap;

use tower_lsp::lsp_types::{
    CompletionContext as LspCompletionContext, CompletionItem as LspCompletionItem,
    CompletionItemKind as LspCompletionItemKind, CompletionItemTag as LspCompletionItemTag,
    CompletionTextEdit, CompletionTriggerKind as LspTriggerKind, Diagnostic as LspDiagnostic,
    DiagnosticSeverity as LspSeverity, DiagnosticTag as LspDiagnosticTag, Documentation,
    FoldingRange as LspFoldingRange, FoldingRangeKind as LspFoldingRangeKind,
    FormattingOptions as LspFormattingOptions, Hover as LspHover, HoverContents,
    Location as LspLocation, LocationLink as LspLocationLink, MarkupContent as LspMarkupContent,
    MarkupKind as LspMarkupKind, NumberOrString, Position as LspPosition, Range as LspRange,
    TextEdit as LspTextEdit, Url, WorkspaceEdit as LspWorkspaceEdit,
};

use mdcode_lsp_core::types::{
    CompletionContext, CompletionData, CompletionItem, CompletionItemKind, CompletionItemTag,
    CompletionTriggerKind, Diagnostic, DiagnosticCode, DiagnosticSeverity, DiagnosticTag,
    FoldingRange, FoldingRangeKind, FormattingOptions, Hover, Location, LocationLink,
    MarkupContent, MarkupKind, Position, Range, TextEdit, WorkspaceEdit,
};

/// Convert an mdcode-lsp-core Position to an lsp-types Position.
pub fn position_to_lsp(pos: &Position) -> LspPosition {
    LspPosition {
        line: pos.line,
        character: pos.character,
    }
}

/// Convert an lsp-types Position to an mdcode-lsp-core Position.
pub fn position_from_lsp(pos: &LspPosition) -> Position {
    Position::new(pos.line, pos.character)
}

/// Convert an mdcode-lsp-core Range to an lsp-types Range.
pub fn range_to_lsp(range: &Range) -> LspRange {
    LspRange {
        start: position_to_lsp(&range.start),
        end: position_to_lsp(&range.end),
    }
}

/// Convert an mdcode-lsp-core DiagnosticSeverity to an lsp-types DiagnosticSeverity.
pub fn severity_to_lsp(severity: &DiagnosticSeverity) -> LspSeverity {
    match severity {
        DiagnosticSeverity::Error => LspSeverity::ERROR,
        DiagnosticSeverity::Warning => LspSeverity::WARNING,
        DiagnosticSeverity::Information => LspSeverity::INFORMATION,
        DiagnosticSeverity::Hint => LspSeverity::HINT,
    }
}

fn diagnostic_tag_to_lsp(tag: &DiagnosticTag) -> LspDiagnosticTag {
    match tag {
        DiagnosticTag::Unnecessary => LspDiagnosticTag::UNNECESSARY,
        DiagnosticTag::Deprecated => LspDiagnosticTag::DEPRECATED,
    }
}

/// Convert an mdcode-lsp-core Diagnostic to an lsp-types Diagnostic.
pub fn diagnostic_to_lsp(diag: &Diagnostic) -> LspDiagnostic {
    LspDiagnostic {
        range: range_to_lsp(&diag.range),
        severity: Some(severity_to_lsp(&diag.severity)),
        code: diag.code.clone().map(|code| match code {
            DiagnosticCode::Number(number) => NumberOrString::Number(number),
            DiagnosticCode::String(string) => NumberOrString::String(string),
        }),
        code_description: None,
        source: diag.source.clone(),
        message: diag.message.clone(),
        related_information: None,
        tags: if diag.tags.is_empty() {
            None
        } else {
            Some(diag.tags.iter().map(diagnostic_tag_to_lsp).collect())
        },
        data: None,
    }
}

fn markup_to_lsp(markup: &MarkupContent) -> LspMarkupContent {
    LspMarkupContent {
        kind: match markup.kind {
            MarkupKind::PlainText => LspMarkupKind::PlainText,
            MarkupKind::Markdown => LspMarkupKind::Markdown,
        },
        value: markup.value.clone(),
    }
}

pub fn hover_to_lsp(hover: &Hover) -> LspHover {
    LspHover {
        contents: HoverContents::Markup(markup_to_lsp(&hover.contents)),
        range: hover.range.as_ref().map(range_to_lsp),
    }
}

pub fn completion_kind_to_lsp(kind: &CompletionItemKind) -> LspCompletionItemKind {
    match kind {
        CompletionItemKind::Text => LspCompletionItemKind::TEXT,
        CompletionItemKind::Method => LspCompletionItemKind::METHOD,
        CompletionItemKind::Function => LspCompletionItemKind::FUNCTION,
        CompletionItemKind::Constructor => LspCompletionItemKind::CONSTRUCTOR,
        CompletionItemKind::Field => LspCompletionItemKind::FIELD,
        CompletionItemKind::Variable => LspCompletionItemKind::VARIABLE,
        CompletionItemKind::Class => LspCompletionItemKind::CLASS,
        CompletionItemKind::Interface => LspCompletionItemKind::INTERFACE,
        CompletionItemKind::Module => LspCompletionItemKind::MODULE,
        CompletionItemKind::Property => LspCompletionItemKind::PROPERTY,
        CompletionItemKind::Enum => LspCompletionItemKind::ENUM,
        CompletionItemKind::Keyword => LspCompletionItemKind::KEYWORD,
        CompletionItemKind::File => LspCompletionItemKind::FILE,
        CompletionItemKind::Folder => LspCompletionItemKind::FOLDER,
        CompletionItemKind::EnumMember => LspCompletionItemKind::ENUM_MEMBER,
        CompletionItemKind::Constant => LspCompletionItemKind::CONSTANT,
        CompletionItemKind::Struct => LspCompletionItemKind::STRUCT,
        CompletionItemKind::TypeParameter => LspCompletionItemKind::TYPE_PARAMETER,
        CompletionItemKind::Color => LspCompletionItemKind::COLOR,
    }
}

pub fn text_edit_to_lsp(edit: &TextEdit) -> LspTextEdit {
    LspTextEdit {
        range: range_to_lsp(&edit.range),
        new_text: edit.new_text.clone(),
    }
}

/// Convert an mdcode-lsp-core CompletionItem to an lsp-types CompletionItem.
///
/// Resolve data travels as JSON so it survives the round trip through the client.
pub fn completion_item_to_lsp(item: &CompletionItem) -> LspCompletionItem {
    LspCompletionItem {
        label: item.label.clone(),
        kind: item.kind.as_ref().map(completion_kind_to_lsp),
        detail: item.detail.clone(),
        documentation: item
            .documentation
            .as_ref()
            .map(|doc| Documentation::MarkupContent(markup_to_lsp(doc))),
        sort_text: item.sort_text.clone(),
        filter_text: item.filter_text.clone(),
        insert_text: item.insert_text.clone(),
        preselect: item.preselect.then_some(true),
        tags: if item.tags.is_empty() {
            None
        } else {
            Some(
                item.tags
                    .iter()
                    .map(|tag| match tag {
                        CompletionItemTag::Deprecated => LspCompletionItemTag::DEPRECATED,
                    })
                    .collect(),
            )
        },
        commit_characters: if item.commit_characters.is_empty() {
            None
        } else {
            Some(item.commit_characters.clone())
        },
        text_edit: item
            .text_edit
            .as_ref()
            .map(|edit| CompletionTextEdit::Edit(text_edit_to_lsp(edit))),
        data: item
            .data
            .as_ref()
            .and_then(|data| serde_json::to_value(data).ok()),
        ..Default::default()
    }
}

/// Rebuild the parts of a client-held completion item that resolving needs.
pub fn completion_item_from_lsp(item: &LspCompletionItem) -> CompletionItem {
    let mut core = CompletionItem::new(item.label.clone());
    core.data = item
        .data
        .clone()
        .and_then(|data| serde_json::from_value::<CompletionData>(data).ok());
    core
}

pub fn completion_context_from_lsp(context: &LspCompletionContext) -> CompletionContext {
    let trigger_kind = if context.trigger_kind == LspTriggerKind::TRIGGER_CHARACTER {
        CompletionTriggerKind::TriggerCharacter
    } else if context.trigger_kind == LspTriggerKind::TRIGGER_FOR_INCOMPLETE_COMPLETIONS {
        CompletionTriggerKind::TriggerForIncompleteCompletions
    } else {
        CompletionTriggerKind::Invoked
    };
    CompletionContext {
        trigger_kind,
        trigger_character: context.trigger_character.clone(),
    }
}

pub fn formatting_options_from_lsp(options: &LspFormattingOptions) -> FormattingOptions {
    FormattingOptions {
        tab_size: options.tab_size,
        insert_spaces: options.insert_spaces,
    }
}

/// Convert a core Location; `None` when its URI does not parse.
pub fn location_to_lsp(location: &Location) -> Option<LspLocation> {
    let uri = Url::parse(&location.uri).ok()?;
    Some(LspLocation {
        uri,
        range: range_to_lsp(&location.range),
    })
}

pub fn location_link_to_lsp(link: &LocationLink) -> Option<LspLocationLink> {
    let target_uri = Url::parse(&link.target_uri).ok()?;
    Some(LspLocationLink {
        origin_selection_range: link.origin_range.as_ref().map(range_to_lsp),
        target_uri,
        target_range: range_to_lsp(&link.target_range),
        target_selection_range: range_to_lsp(&link.target_selection_range),
    })
}

pub fn workspace_edit_to_lsp(edit: &WorkspaceEdit) -> LspWorkspaceEdit {
    let changes: HashMap<Url, Vec<LspTextEdit>> = edit
        .changes
        .iter()
        .filter_map(|(uri, edits)| {
            let uri = Url::parse(uri).ok()?;
            Some((uri, edits.iter().map(text_edit_to_lsp).collect()))
        })
        .collect();
    LspWorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    }
}

pub fn folding_range_to_lsp(range: &FoldingRange) -> LspFoldingRange {
    LspFoldingRange {
        start_line: range.start_line,
        start_character: Some(range.start_character),
        end_line: range.end_line,
        end_character: Some(range.end_character),
        kind: range.kind.map(|kind| match kind {
            FoldingRangeKind::Comment => LspFoldingRangeKind::Comment,
            FoldingRangeKind::Imports => LspFoldingRangeKind::Imports,
            FoldingRangeKind::Region => LspFoldingRangeKind::Region,
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_conversion() {
        let core_pos = Position::new(10, 5);
        let lsp_pos = position_to_lsp(&core_pos);
        assert_eq!(lsp_pos.line, 10);
        assert_eq!(lsp_pos.character, 5);
        assert_eq!(position_from_lsp(&lsp_pos), core_pos);
    }

    #[test]
    fn test_range_conversion() {
        let core_range = Range::new(Position::new(0, 0), Position::new(0, 10));
        let lsp_range = range_to_lsp(&core_range);
        assert_eq!(lsp_range.start.line, 0);
        assert_eq!(lsp_range.start.character, 0);
        assert_eq!(lsp_range.end.line, 0);
        assert_eq!(lsp_range.end.character, 10);
    }

    #[test]
    fn test_severity_conversion() {
        assert_eq!(
            severity_to_lsp(&DiagnosticSeverity::Error),
            LspSeverity::ERROR
        );
        assert_eq!(
            severity_to_lsp(&DiagnosticSeverity::Warning),
            LspSeverity::WARNING
        );
        assert_eq!(
            severity_to_lsp(&DiagnosticSeverity::Information),
            LspSeverity::INFORMATION
        );
        assert_eq!(
            severity_to_lsp(&DiagnosticSeverity::Hint),
            LspSeverity::HINT
        );
    }

    #[test]
    fn test_diagnostic_conversion() {
        let core_diag = Diagnostic::new(
            Range::new(Position::new(0, 0), Position::new(0, 10)),
            DiagnosticSeverity::Error,
            "Cannot find name 'foo'.",
        )
        .with_code(DiagnosticCode::Number(2304))
        .with_tag(DiagnosticTag::Deprecated);

        let lsp_diag = diagnostic_to_lsp(&core_diag);
        assert_eq!(lsp_diag.message, "Cannot find name 'foo'.");
        assert_eq!(lsp_diag.severity, Some(LspSeverity::ERROR));
        assert_eq!(lsp_diag.code, Some(NumberOrString::Number(2304)));
        assert_eq!(lsp_diag.source.as_deref(), Some("ts"));
        assert_eq!(lsp_diag.tags, Some(vec![LspDiagnosticTag::DEPRECATED]));
    }

    #[test]
    fn test_completion_data_survives_round_trip() {
        let mut item = CompletionItem::new("total");
        item.kind = Some(CompletionItemKind::Variable);
        item.data = Some(CompletionData {
            file: "/repo/notes.md.__block0.ts".to_string(),
            offset: 42,
            name: "total".to_string(),
            source: None,
        });

        let lsp_item = completion_item_to_lsp(&item);
        assert_eq!(lsp_item.kind, Some(LspCompletionItemKind::VARIABLE));
        assert!(lsp_item.commit_characters.is_none());

        let back = completion_item_from_lsp(&lsp_item);
        assert_eq!(back.label, "total");
        assert_eq!(back.data, item.data);
    }

    #[test]
    fn test_trigger_kind_conversion() {
        let context = LspCompletionContext {
            trigger_kind: LspTriggerKind::TRIGGER_CHARACTER,
            trigger_character: Some("\"".to_string()),
        };
        let core = completion_context_from_lsp(&context);
        assert_eq!(core.trigger_kind, CompletionTriggerKind::TriggerCharacter);
        assert_eq!(core.trigger_character.as_deref(), Some("\""));
    }

    #[test]
    fn test_workspace_edit_skips_unparseable_uris() {
        let mut edit = WorkspaceEdit::default();
        edit.changes.insert(
            "file:///repo/notes.md".to_string(),
            vec![TextEdit {
                range: Range::new(Position::new(2, 6), Position::new(2, 11)),
                new_text: "sum".to_string(),
            }],
        );
        edit.changes.insert("not a uri".to_string(), Vec::new());

        let changes = workspace_edit_to_lsp(&edit).changes.unwrap();
        assert_eq!(changes.len(), 1);
        let uri = Url::parse("file:///repo/notes.md").unwrap();
        assert_eq!(changes[&uri][0].new_text, "sum");
    }

    #[test]
    fn test_folding_range_conversion() {
        let range = FoldingRange {
            start_line: 3,
            start_character: 13,
            end_line: 5,
            end_character: 1,
            kind: Some(FoldingRangeKind::Comment),
        };
        let lsp_range = folding_range_to_lsp(&range);
        assert_eq!(lsp_range.start_line, 3);
        assert_eq!(lsp_range.start_character, Some(13));
        assert_eq!(lsp_range.kind, Some(LspFoldingRangeKind::Comment));
    }
}
