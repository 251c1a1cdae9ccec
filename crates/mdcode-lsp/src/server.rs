//! LSP server implementation using tower-lsp.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::request::{GotoTypeDefinitionParams, GotoTypeDefinitionResponse};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, info, warn};

use mdcode_lsp_core::{AnalysisEngine, FileName, NativeFileSystem, Session, SessionConfig, features};

use crate::capabilities::server_capabilities;
use crate::convert;
use crate::watch::FolderWatcher;

/// The language server.
///
/// Every request and notification locks the one session, so handlers run as
/// sequential tasks against a single state.
pub struct Backend {
    /// The LSP client for sending notifications.
    client: Client,
    /// Documents, virtual files and the analysis engine.
    session: Arc<Mutex<Session>>,
    /// Task draining the folder watcher, replaced when the roots change.
    watcher: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Backend {
    /// Create a new language server instance around `session`.
    pub fn new(client: Client, session: Session) -> Self {
        Self {
            client,
            session: Arc::new(Mutex::new(session)),
            watcher: std::sync::Mutex::new(None),
        }
    }

    /// Publish diagnostics for every open prose document.
    async fn publish_diagnostics(&self) {
        publish_all(&self.client, &self.session).await;
    }

    /// (Re)start watching the current workspace roots.
    async fn watch_roots(&self) {
        let (roots, debounce_ms, excluded) = {
            let session = self.session.lock().await;
            let roots: Vec<PathBuf> = session
                .index()
                .roots()
                .iter()
                .map(|root| root.as_path().to_path_buf())
                .collect();
            (
                roots,
                session.config().watch_debounce_ms,
                session.config().excluded_directories.clone(),
            )
        };

        let Ok(mut slot) = self.watcher.lock() else {
            warn!("watcher slot poisoned, folder changes will not be seen");
            return;
        };
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        if roots.is_empty() {
            return;
        }

        let mut watcher = match FolderWatcher::new(&roots, debounce_ms, excluded) {
            Ok(watcher) => watcher,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "folder watching disabled");
                return;
            }
        };
        let client = self.client.clone();
        let session = Arc::clone(&self.session);
        *slot = Some(tokio::spawn(async move {
            while let Some(batch) = watcher.recv().await {
                debug!(count = batch.len(), "re-indexing after folder change");
                reindex_and_publish(&client, &session).await;
            }
        }));
    }
}

async fn publish_all(client: &Client, session: &Mutex<Session>) {
    let mut batches = Vec::new();
    {
        let mut session = session.lock().await;
        for uri in session.open_prose_documents() {
            let Ok(url) = Url::parse(&uri) else {
                warn!(uri, "cannot publish diagnostics for unparseable uri");
                continue;
            };
            let diagnostics: Vec<Diagnostic> = features::diagnostics(&mut session, &uri)
                .iter()
                .map(convert::diagnostic_to_lsp)
                .collect();
            batches.push((url, diagnostics));
        }
    }

    for (uri, diagnostics) in batches {
        client.publish_diagnostics(uri, diagnostics, None).await;
    }
}

async fn reindex_and_publish(client: &Client, session: &Mutex<Session>) {
    {
        let mut session = session.lock().await;
        let delta = session.reindex();
        info!(
            added = delta.added.len(),
            removed = delta.removed.len(),
            manifest_changed = delta.manifest_changed,
            "workspace re-indexed"
        );
    }
    publish_all(client, session).await;
}

/// Workspace roots of the `file` scheme; other schemes are ignored.
fn workspace_roots(
    session: &Session,
    folders: Option<Vec<WorkspaceFolder>>,
    root_uri: Option<Url>,
) -> Vec<FileName> {
    let uris: Vec<Url> = match folders {
        Some(folders) => folders.into_iter().map(|folder| folder.uri).collect(),
        None => root_uri.into_iter().collect(),
    };
    uris.iter()
        .filter_map(|uri| match session.name_from_uri(uri.as_str()) {
            Ok(name) => Some(name),
            Err(error) => {
                debug!(%uri, %error, "ignoring workspace folder");
                None
            }
        })
        .collect()
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let root_uri = params.root_uri;
        {
            let mut session = self.session.lock().await;
            session.configure(SessionConfig::from_json(params.initialization_options));
            let roots = workspace_roots(&session, params.workspace_folders, root_uri);
            session.set_roots(roots);
            let delta = session.reindex();
            info!(
                documents = delta.added.len(),
                engine = session.engine_available(),
                "workspace indexed"
            );
        }

        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: "mdcode-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.watch_roots().await;
        self.client
            .log_message(MessageType::INFO, "mdcode LSP server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(task) = self.watcher.lock().ok().and_then(|mut slot| slot.take()) {
            task.abort();
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        {
            let mut session = self.session.lock().await;
            if let Err(error) =
                session.open_document(document.uri.as_str(), &document.text, document.version)
            {
                warn!(uri = %document.uri, %error, "cannot open document");
            }
        }

        self.publish_diagnostics().await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        // We're using full document sync, so take the last change
        if let Some(change) = params.content_changes.into_iter().last() {
            {
                let mut session = self.session.lock().await;
                if let Err(error) = session.change_document(uri.as_str(), &change.text, version) {
                    warn!(%uri, %error, "cannot apply document change");
                }
            }

            self.publish_diagnostics().await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        {
            let mut session = self.session.lock().await;
            if let Err(error) = session.close_document(uri.as_str()) {
                debug!(%uri, %error, "close of unknown document");
            }
        }

        // Clear diagnostics for closed document
        self.client
            .publish_diagnostics(uri, Vec::new(), None)
            .await;
        self.publish_diagnostics().await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        {
            let mut session = self.session.lock().await;
            for folder in params.event.removed {
                if let Ok(root) = session.name_from_uri(folder.uri.as_str()) {
                    session.remove_root(&root);
                }
            }
            for folder in params.event.added {
                match session.name_from_uri(folder.uri.as_str()) {
                    Ok(root) => session.add_root(root),
                    Err(error) => debug!(uri = %folder.uri, %error, "ignoring workspace folder"),
                }
            }
        }

        self.watch_roots().await;
        reindex_and_publish(&self.client, &self.session).await;
    }

    async fn did_change_watched_files(&self, _params: DidChangeWatchedFilesParams) {
        reindex_and_publish(&self.client, &self.session).await;
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        let mut session = self.session.lock().await;
        let hover = features::hover(
            &mut session,
            position.text_document.uri.as_str(),
            convert::position_from_lsp(&position.position),
        );
        Ok(hover.as_ref().map(convert::hover_to_lsp))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let context = params
            .context
            .as_ref()
            .map(convert::completion_context_from_lsp);

        let mut session = self.session.lock().await;
        let items = features::completion(
            &mut session,
            position.text_document.uri.as_str(),
            convert::position_from_lsp(&position.position),
            context.as_ref(),
        );
        if items.is_empty() {
            return Ok(None);
        }
        Ok(Some(CompletionResponse::Array(
            items.iter().map(convert::completion_item_to_lsp).collect(),
        )))
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        let resolved = {
            let mut session = self.session.lock().await;
            features::completion_resolve(&mut session, convert::completion_item_from_lsp(&item))
        };
        let resolved = convert::completion_item_to_lsp(&resolved);

        let mut item = item;
        if resolved.detail.is_some() {
            item.detail = resolved.detail;
        }
        if resolved.documentation.is_some() {
            item.documentation = resolved.documentation;
        }
        Ok(item)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let mut session = self.session.lock().await;
        let links: Vec<LocationLink> = features::definition(
            &mut session,
            position.text_document.uri.as_str(),
            convert::position_from_lsp(&position.position),
        )
        .iter()
        .filter_map(convert::location_link_to_lsp)
        .collect();
        Ok((!links.is_empty()).then_some(GotoDefinitionResponse::Link(links)))
    }

    async fn goto_type_definition(
        &self,
        params: GotoTypeDefinitionParams,
    ) -> Result<Option<GotoTypeDefinitionResponse>> {
        let position = params.text_document_position_params;
        let mut session = self.session.lock().await;
        let links: Vec<LocationLink> = features::type_definition(
            &mut session,
            position.text_document.uri.as_str(),
            convert::position_from_lsp(&position.position),
        )
        .iter()
        .filter_map(convert::location_link_to_lsp)
        .collect();
        Ok((!links.is_empty()).then_some(GotoTypeDefinitionResponse::Link(links)))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        let mut session = self.session.lock().await;
        let locations = features::references(
            &mut session,
            position.text_document.uri.as_str(),
            convert::position_from_lsp(&position.position),
        )
        .iter()
        .filter_map(convert::location_to_lsp)
        .collect();
        Ok(Some(locations))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let mut session = self.session.lock().await;
        let edits = features::formatting(
            &mut session,
            params.text_document.uri.as_str(),
            &convert::formatting_options_from_lsp(&params.options),
        )
        .iter()
        .map(convert::text_edit_to_lsp)
        .collect();
        Ok(Some(edits))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let mut session = self.session.lock().await;
        let ranges = features::folding_ranges(&mut session, params.text_document.uri.as_str())
            .iter()
            .map(convert::folding_range_to_lsp)
            .collect();
        Ok(Some(ranges))
    }

    async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Option<PrepareRenameResponse>> {
        let mut session = self.session.lock().await;
        let range = features::prepare_rename(
            &mut session,
            params.text_document.uri.as_str(),
            convert::position_from_lsp(&params.position),
        );
        Ok(range.map(|range| PrepareRenameResponse::Range(convert::range_to_lsp(&range))))
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let position = params.text_document_position;
        let mut session = self.session.lock().await;
        let edit = features::rename(
            &mut session,
            position.text_document.uri.as_str(),
            convert::position_from_lsp(&position.position),
            &params.new_name,
        );
        if edit.is_empty() {
            return Ok(None);
        }
        Ok(Some(convert::workspace_edit_to_lsp(&edit)))
    }
}

/// Run the LSP server over stdio with the given analysis engine.
pub async fn run_server(engine: Box<dyn AnalysisEngine>) {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let session = Session::new(SessionConfig::default(), Arc::new(NativeFileSystem), engine);
    let (service, socket) = LspService::new(move |client| Backend::new(client, session));
    Server::new(stdin, stdout, socket).serve(service).await;
}
