//! End-to-end behavior of a session driven through the feature adapters.

use std::sync::Arc;

use crate::config::SessionConfig;
use crate::features;
use crate::fs::MemoryFileSystem;
use crate::path::FileName;
use crate::session::Session;
use crate::testing::LexicalEngine;
use crate::types::{
    CompletionContext, CompletionItemKind, CompletionTriggerKind, DiagnosticCode, FormattingOptions,
    Location, Position, Range, TextEdit,
};

const NOTES_URI: &str = "file:///repo/notes.md";
const NOTES_PATH: &str = "/repo/notes.md";

fn session_with(files: &[(&str, &str)], engine: LexicalEngine) -> Session {
    let fs = Arc::new(MemoryFileSystem::with_files(files.iter().copied()));
    let config = SessionConfig {
        case_sensitive_paths: Some(true),
        ..SessionConfig::default()
    };
    let mut session = Session::new(config, fs, Box::new(engine));
    let root = session.normalizer().file_name("/repo").unwrap();
    session.set_roots([root]);
    session.reindex();
    session
}

/// A session with a manifest and `notes` open.
fn open_notes(notes: &str) -> Session {
    open_notes_with(notes, LexicalEngine::new())
}

fn open_notes_with(notes: &str, engine: LexicalEngine) -> Session {
    let mut session = session_with(
        &[("/repo/tsconfig.json", "{}"), (NOTES_PATH, notes)],
        engine,
    );
    session.open_document(NOTES_URI, notes, 1).unwrap();
    session
}

fn block(session: &Session, index: usize) -> FileName {
    session
        .normalizer()
        .file_name(format!("{NOTES_PATH}.__block{index}.ts"))
        .unwrap()
}

fn range(start: (u32, u32), end: (u32, u32)) -> Range {
    Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
}

fn blocks(bodies: &[&str]) -> String {
    bodies
        .iter()
        .map(|body| format!("Some prose.\n\n```ts\n{body}\n```\n\n"))
        .collect()
}

#[test]
fn hover_inside_a_block_and_above_its_fence() {
    let notes = "# Notes\n\nSee below.\n\n```ts\nconst x = foo;\n```\n";
    let mut session = open_notes(notes);

    let hover = features::hover(&mut session, NOTES_URI, Position::new(5, 11)).unwrap();
    assert_eq!(hover.contents.value, "```typescript\nvar foo: any\n```");
    assert_eq!(hover.range, Some(range((5, 10), (5, 13))));

    assert!(features::hover(&mut session, NOTES_URI, Position::new(3, 0)).is_none());
    assert!(features::hover(&mut session, NOTES_URI, Position::new(4, 2)).is_none());
}

#[test]
fn hover_includes_documentation() {
    let notes = "```ts\n/**\n * Sums things.\n * @param n - how many\n */\nfunction sum(n) {}\nsum(1);\n```\n";
    let mut session = open_notes(notes);

    let hover = features::hover(&mut session, NOTES_URI, Position::new(6, 1)).unwrap();
    assert_eq!(
        hover.contents.value,
        "```typescript\nfunction sum\n```\n\nSums things.\n\n*@param* `n` — how many"
    );
}

#[test]
fn editing_one_block_recomputes_only_its_snapshot() {
    let before = blocks(&["let a = 1;", "let b = 2;", "let c = a + b;"]);
    let mut session = open_notes(&before);
    features::diagnostics(&mut session, NOTES_URI);

    let names: Vec<FileName> = (0..3).map(|i| block(&session, i)).collect();
    let builds = |session: &Session| -> Vec<u64> {
        names
            .iter()
            .map(|name| session.snapshots().build_count(name))
            .collect()
    };
    assert_eq!(builds(&session), vec![1, 1, 1]);

    let after = blocks(&["let a = 1;", "let b = 9;", "let c = a + b;"]);
    session.change_document(NOTES_URI, &after, 2).unwrap();
    let versions: Vec<Option<u64>> = names.iter().map(|n| session.registry().version(n)).collect();
    assert_eq!(versions, vec![Some(0), Some(1), Some(0)]);

    features::diagnostics(&mut session, NOTES_URI);
    assert_eq!(builds(&session), vec![1, 2, 1]);
}

#[test]
fn references_across_blocks_map_to_the_owner() {
    let notes = "```ts\nconst total = 1;\n```\n\nProse.\n\n```ts\nconsole.log(total);\n```\n";
    let mut session = open_notes(notes);

    let locations = features::references(&mut session, NOTES_URI, Position::new(7, 13));
    assert_eq!(
        locations,
        vec![
            Location {
                uri: NOTES_URI.to_string(),
                range: range((1, 6), (1, 11)),
            },
            Location {
                uri: NOTES_URI.to_string(),
                range: range((7, 12), (7, 17)),
            },
        ]
    );
}

#[test]
fn definition_links_back_into_the_document() {
    let notes = "```ts\nconst total = 1;\n```\n\nProse.\n\n```ts\nconsole.log(total);\n```\n";
    let mut session = open_notes(notes);

    let links = features::definition(&mut session, NOTES_URI, Position::new(7, 14));
    assert_eq!(links.len(), 1);
    let link = &links[0];
    assert_eq!(link.target_uri, NOTES_URI);
    assert_eq!(link.origin_range, Some(range((7, 12), (7, 17))));
    assert_eq!(link.target_selection_range, range((1, 6), (1, 11)));
    assert_eq!(link.target_range, range((1, 0), (1, 16)));
}

#[test]
fn type_definition_follows_annotations() {
    let notes = "```ts\ninterface Point {}\nconst p: Point = make();\np;\n```\n";
    let mut session = open_notes(notes);

    let links = features::type_definition(&mut session, NOTES_URI, Position::new(3, 0));
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].target_selection_range, range((1, 10), (1, 15)));
}

#[test]
fn references_reach_real_project_files() {
    let notes = "```ts\nconsole.log(helper);\n```\n";
    let util = "export const helper = 1;\n";
    let mut session = session_with(
        &[
            ("/repo/tsconfig.json", "{}"),
            ("/repo/src/util.ts", util),
            (NOTES_PATH, notes),
        ],
        LexicalEngine::new(),
    );
    session.open_document(NOTES_URI, notes, 1).unwrap();

    let locations = features::references(&mut session, NOTES_URI, Position::new(1, 13));
    assert!(locations.contains(&Location {
        uri: "file:///repo/src/util.ts".to_string(),
        range: range((0, 13), (0, 19)),
    }));
    assert!(locations.iter().all(|l| !l.uri.contains(".__block")));
}

#[test]
fn removing_a_block_purges_its_identity() {
    let mut session = open_notes(&blocks(&["let a = 1;", "let b = 2;", "let c = 3;"]));
    features::diagnostics(&mut session, NOTES_URI);
    let third = block(&session, 2);
    assert!(session.snapshots().contains(&third));

    let after = blocks(&["let a = 1;", "let c = 3;"]);
    session.change_document(NOTES_URI, &after, 2).unwrap();

    assert_eq!(session.registry().len(), 2);
    assert!(!session.registry().contains(&third));
    assert!(!session.snapshots().contains(&third));
    let enumerated = session.with_engine(|_, host| host.script_file_names());
    assert!(!enumerated.contains(&third));
}

#[test]
fn unterminated_fence_yields_no_block() {
    let notes = "```ts\nlet a = 1;\n```\n\n```ts\nlet open = true;\n";
    let mut session = open_notes(notes);

    assert_eq!(session.registry().len(), 1);
    assert!(features::hover(&mut session, NOTES_URI, Position::new(1, 4)).is_some());
    assert!(features::hover(&mut session, NOTES_URI, Position::new(5, 4)).is_none());
}

#[test]
fn block_boundary_lines_are_inside() {
    let notes = "```ts\nlet a = 1;\nlet b = a;\n```\n";
    let mut session = open_notes(notes);

    assert!(features::hover(&mut session, NOTES_URI, Position::new(1, 4)).is_some());
    assert!(features::hover(&mut session, NOTES_URI, Position::new(2, 8)).is_some());
    assert!(features::hover(&mut session, NOTES_URI, Position::new(0, 3)).is_none());
    assert!(features::hover(&mut session, NOTES_URI, Position::new(3, 0)).is_none());
}

#[test]
fn diagnostics_outside_the_block_are_dropped() {
    let notes = "# T\n\n```ts\nlet a = 1;\nconsole.log(a @@);\n```\n";
    let mut session = open_notes_with(notes, LexicalEngine::new().with_stray_diagnostic());

    let diagnostics = features::diagnostics(&mut session, NOTES_URI);
    assert!(
        diagnostics
            .iter()
            .all(|d| d.code != Some(DiagnosticCode::Number(9999)))
    );
    let syntax = diagnostics
        .iter()
        .find(|d| d.code == Some(DiagnosticCode::Number(1109)))
        .unwrap();
    assert_eq!(syntax.range, range((4, 14), (4, 16)));
    assert_eq!(syntax.source.as_deref(), Some("ts"));
}

#[test]
fn a_failing_block_does_not_hide_its_siblings() {
    let notes = blocks(&["console.log(missing1);", "console.log(missing2);"]);
    let mut session = open_notes_with(&notes, LexicalEngine::new().failing(".__block0.ts"));

    let messages: Vec<String> = features::diagnostics(&mut session, NOTES_URI)
        .into_iter()
        .map(|d| d.message)
        .collect();
    assert_eq!(messages, vec!["Cannot find name 'missing2'.".to_string()]);
}

#[test]
fn without_a_manifest_everything_is_empty() {
    let notes = "```ts\nconst x = foo;\n```\n";
    let mut session = session_with(&[(NOTES_PATH, notes)], LexicalEngine::new());
    session.open_document(NOTES_URI, notes, 1).unwrap();

    assert!(features::hover(&mut session, NOTES_URI, Position::new(1, 11)).is_none());
    assert!(features::diagnostics(&mut session, NOTES_URI).is_empty());
    assert!(features::completion(&mut session, NOTES_URI, Position::new(1, 11), None).is_empty());
    assert!(features::folding_ranges(&mut session, NOTES_URI).is_empty());
}

#[test]
fn completion_and_resolve() {
    let notes = "```ts\n/** Running sum. */\nconst total = 1;\ntot\n```\n";
    let mut session = open_notes(notes);
    let invoked = CompletionContext {
        trigger_kind: CompletionTriggerKind::Invoked,
        trigger_character: None,
    };

    let items = features::completion(&mut session, NOTES_URI, Position::new(3, 3), Some(&invoked));
    let total = items.iter().find(|item| item.label == "total").unwrap().clone();
    assert_eq!(total.kind, Some(CompletionItemKind::Variable));
    assert_eq!(total.sort_text.as_deref(), Some("11"));
    assert!(total.text_edit.is_none());
    assert_eq!(
        total.data.as_ref().map(|d| d.file.as_str()),
        Some("/repo/notes.md.__block0.ts")
    );

    let resolved = features::completion_resolve(&mut session, total);
    assert_eq!(resolved.detail.as_deref(), Some("const total"));
    assert_eq!(
        resolved.documentation.map(|d| d.value).as_deref(),
        Some("Running sum.")
    );
}

#[test]
fn resolve_leaves_items_of_dead_files_alone() {
    let notes = "```ts\nconst total = 1;\ntot\n```\n";
    let mut session = open_notes(notes);
    let items = features::completion(&mut session, NOTES_URI, Position::new(2, 3), None);
    let total = items.into_iter().find(|item| item.label == "total").unwrap();

    session.change_document(NOTES_URI, "No code any more.\n", 2).unwrap();
    let resolved = features::completion_resolve(&mut session, total.clone());
    assert_eq!(resolved, total);
}

#[test]
fn quote_triggers_outside_imports_are_ignored() {
    let notes = "```ts\nconst s = '\n```\n";
    let mut session = open_notes(notes);
    let quote = CompletionContext {
        trigger_kind: CompletionTriggerKind::TriggerCharacter,
        trigger_character: Some("'".to_string()),
    };
    assert!(features::completion(&mut session, NOTES_URI, Position::new(1, 11), Some(&quote)).is_empty());
}

#[test]
fn rename_edits_every_block() {
    let notes = "```ts\nconst total = 1;\n```\n\nProse.\n\n```ts\nconsole.log(total);\n```\n";
    let mut session = open_notes(notes);

    let prepared = features::prepare_rename(&mut session, NOTES_URI, Position::new(7, 13));
    assert_eq!(prepared, Some(range((7, 12), (7, 17))));
    assert!(features::prepare_rename(&mut session, NOTES_URI, Position::new(7, 2)).is_none());

    let edit = features::rename(&mut session, NOTES_URI, Position::new(7, 13), "sum");
    let edits = &edit.changes[NOTES_URI];
    assert_eq!(
        edits,
        &vec![
            TextEdit {
                range: range((1, 6), (1, 11)),
                new_text: "sum".to_string(),
            },
            TextEdit {
                range: range((7, 12), (7, 17)),
                new_text: "sum".to_string(),
            },
        ]
    );
}

#[test]
fn formatting_is_clipped_to_blocks() {
    let notes = "# T   \n\n```ts\nlet a = 1;   \n\tlet b = a;\n```\n";
    let mut session = open_notes(notes);

    let edits = features::formatting(&mut session, NOTES_URI, &FormattingOptions::default());
    assert_eq!(
        edits,
        vec![
            TextEdit {
                range: range((3, 10), (3, 13)),
                new_text: String::new(),
            },
            TextEdit {
                range: range((4, 0), (4, 1)),
                new_text: "    ".to_string(),
            },
        ]
    );
}

#[test]
fn folding_ranges_come_from_blocks() {
    let notes = "Intro.\n\n```ts\nfunction f() {\n  return 1;\n}\n```\n";
    let mut session = open_notes(notes);

    let ranges = features::folding_ranges(&mut session, NOTES_URI);
    assert_eq!(ranges.len(), 1);
    assert_eq!((ranges[0].start_line, ranges[0].end_line), (3, 5));
    assert_eq!(ranges[0].start_character, 13);
    assert_eq!(ranges[0].kind, None);
}
