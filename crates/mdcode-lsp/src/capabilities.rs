//! LSP capability negotiation.

use tower_lsp::lsp_types::{
    CompletionOptions, FoldingRangeProviderCapability, HoverProviderCapability, OneOf,
    RenameOptions, ServerCapabilities, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TypeDefinitionProviderCapability, WorkDoneProgressOptions,
    WorkspaceFoldersServerCapabilities, WorkspaceServerCapabilities,
};

/// Characters that may open a completion list inside a block.
///
/// Quotes and `/` only produce results inside import specifiers; the
/// completion adapter filters the rest.
pub const TRIGGER_CHARACTERS: [&str; 7] = [".", "\"", "'", "`", "/", "@", "<"];

/// Get the server capabilities to report to the client.
pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                // Full document sync: every change re-parses the whole document anyway
                change: Some(TextDocumentSyncKind::FULL),
                will_save: None,
                will_save_wait_until: None,
                save: None,
            },
        )),

        hover_provider: Some(HoverProviderCapability::Simple(true)),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(true),
            trigger_characters: Some(TRIGGER_CHARACTERS.iter().map(|c| c.to_string()).collect()),
            ..Default::default()
        }),
        definition_provider: Some(OneOf::Left(true)),
        type_definition_provider: Some(TypeDefinitionProviderCapability::Simple(true)),
        references_provider: Some(OneOf::Left(true)),
        document_formatting_provider: Some(OneOf::Left(true)),
        folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
        rename_provider: Some(OneOf::Right(RenameOptions {
            prepare_provider: Some(true),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        })),

        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_include_document_sync() {
        let caps = server_capabilities();
        assert!(caps.text_document_sync.is_some());
    }

    #[test]
    fn capabilities_resolve_completions() {
        let caps = server_capabilities();
        let completion = caps.completion_provider.unwrap();
        assert_eq!(completion.resolve_provider, Some(true));
        let triggers = completion.trigger_characters.unwrap();
        assert!(triggers.contains(&".".to_string()));
        assert!(triggers.contains(&"/".to_string()));
    }

    #[test]
    fn capabilities_prepare_rename() {
        let caps = server_capabilities();
        match caps.rename_provider {
            Some(OneOf::Right(options)) => assert_eq!(options.prepare_provider, Some(true)),
            other => panic!("unexpected rename provider: {other:?}"),
        }
    }

    #[test]
    fn capabilities_follow_workspace_folders() {
        let caps = server_capabilities();
        let folders = caps.workspace.unwrap().workspace_folders.unwrap();
        assert_eq!(folders.supported, Some(true));
    }
}
