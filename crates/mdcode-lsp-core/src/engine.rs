//! Contract with the external analysis engine.
//!
//! The engine is consumed, not built: it answers queries keyed by
//! (file, byte offset) and pulls everything it knows about the project
//! through a [`ScriptHost`]. The records below are the engine's native
//! result shapes; `features` converts them into the editor-facing
//! records in [`crate::types`].

use serde::{Deserialize, Serialize};

use crate::manifest::CompilerOptions;
use crate::path::FileName;
use crate::snapshot::Snapshot;

/// What the engine needs from the project to build and update its model.
///
/// Implementations must report a new [`project_version`](Self::project_version)
/// whenever the file set or any file version changes; engines skip their
/// own invalidation while it is unchanged.
pub trait ScriptHost {
    fn project_version(&self) -> u64;

    /// Real project sources followed by every live virtual file.
    fn script_file_names(&self) -> Vec<FileName>;

    /// Version of `file`; unknown files are at version 0.
    fn script_version(&self, file: &FileName) -> u64;

    /// Text of `file` at its current version.
    fn script_snapshot(&mut self, file: &FileName) -> Option<Snapshot>;

    fn compiler_options(&self) -> &CompilerOptions;

    /// Directory relative names in the options resolve against.
    fn current_directory(&self) -> Option<&str>;

    /// Library declaration file implied by the compiler options.
    fn default_lib_file_name(&self) -> String;

    fn file_exists(&self, file: &FileName) -> bool;

    fn read_file(&self, file: &FileName) -> Option<String>;
}

/// Failure reported by an engine call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine has no source file for {0}")]
    NoSourceFile(String),

    #[error("offset {offset} is outside {file}")]
    OffsetOutOfRange { file: String, offset: usize },

    #[error("engine failure: {0}")]
    Internal(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// A byte range in an engine file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub length: usize,
}

impl TextSpan {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDisplayPart {
    pub text: String,
    /// Part kind such as `keyword`, `text`, `link`, `linkName` or `linkText`.
    pub kind: String,
}

impl SymbolDisplayPart {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: kind.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new("text", text)
    }
}

/// Concatenate the text of display parts.
pub fn display_parts_to_string(parts: &[SymbolDisplayPart]) -> String {
    parts.iter().map(|part| part.text.as_str()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsDocTagInfo {
    pub name: String,
    pub text: Vec<SymbolDisplayPart>,
}

/// Kind of a symbol as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScriptElementKind {
    Unknown,
    Warning,
    Keyword,
    PrimitiveType,
    Script,
    Directory,
    Module,
    ExternalModuleName,
    Class,
    Interface,
    Type,
    Enum,
    EnumMember,
    Variable,
    LocalVariable,
    Const,
    Let,
    Alias,
    Parameter,
    TypeParameter,
    Function,
    LocalFunction,
    Method,
    ConstructSignature,
    CallSignature,
    IndexSignature,
    Constructor,
    MemberVariable,
    MemberGetAccessor,
    MemberSetAccessor,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickInfo {
    pub kind: ScriptElementKind,
    pub kind_modifiers: String,
    pub text_span: TextSpan,
    pub display_parts: Vec<SymbolDisplayPart>,
    pub documentation: Vec<SymbolDisplayPart>,
    pub tags: Vec<JsDocTagInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionOptions {
    pub trigger_character: Option<String>,
    pub include_completions_with_insert_text: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionInfo {
    pub is_incomplete: bool,
    pub is_new_identifier_location: bool,
    pub entries: Vec<CompletionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub name: String,
    pub kind: ScriptElementKind,
    /// Comma-separated modifiers such as `optional`, `deprecated` or `.d.ts`.
    pub kind_modifiers: String,
    pub sort_text: String,
    pub insert_text: Option<String>,
    pub replacement_span: Option<TextSpan>,
    pub is_recommended: bool,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntryDetails {
    pub name: String,
    pub kind: ScriptElementKind,
    pub kind_modifiers: String,
    pub display_parts: Vec<SymbolDisplayPart>,
    pub documentation: Vec<SymbolDisplayPart>,
    pub tags: Vec<JsDocTagInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionInfo {
    pub file_name: String,
    pub text_span: TextSpan,
    /// Extent of the whole declaration, when known.
    pub context_span: Option<TextSpan>,
    pub kind: ScriptElementKind,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionAndBoundSpan {
    pub definitions: Vec<DefinitionInfo>,
    /// The span at the queried position the definitions are bound to.
    pub text_span: TextSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub file_name: String,
    pub text_span: TextSpan,
    pub is_write_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutliningSpanKind {
    Comment,
    Region,
    Code,
    Imports,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutliningSpan {
    pub text_span: TextSpan,
    pub hint_span: TextSpan,
    pub banner_text: String,
    pub auto_collapse: bool,
    pub kind: OutliningSpanKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatCodeSettings {
    pub tab_size: u32,
    pub indent_size: u32,
    pub convert_tabs_to_spaces: bool,
    pub new_line_character: String,
}

impl Default for FormatCodeSettings {
    fn default() -> Self {
        Self {
            tab_size: 4,
            indent_size: 4,
            convert_tabs_to_spaces: true,
            new_line_character: "\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub span: TextSpan,
    pub new_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDiagnostic {
    pub file_name: Option<String>,
    pub start: Option<usize>,
    pub length: Option<usize>,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: i32,
    pub reports_unnecessary: bool,
    pub reports_deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenameInfo {
    Allowed {
        display_name: String,
        full_display_name: String,
        kind: ScriptElementKind,
        trigger_span: TextSpan,
    },
    Denied {
        localized_error_message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameLocation {
    pub file_name: String,
    pub text_span: TextSpan,
    pub prefix_text: Option<String>,
    pub suffix_text: Option<String>,
}

/// The external language-analysis engine.
///
/// Every call receives the host so the engine can synchronize its model
/// first. Files are named by the identities the host enumerates; offsets
/// are byte offsets into the host's snapshots.
pub trait AnalysisEngine: Send {
    fn quick_info(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Option<QuickInfo>>;

    fn completions(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
        options: &CompletionOptions,
    ) -> EngineResult<Option<CompletionInfo>>;

    fn completion_details(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
        name: &str,
        source: Option<&str>,
    ) -> EngineResult<Option<CompletionEntryDetails>>;

    fn definition(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Option<DefinitionAndBoundSpan>>;

    fn type_definition(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Vec<DefinitionInfo>>;

    fn references(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Vec<ReferenceEntry>>;

    fn outlining_spans(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<OutliningSpan>>;

    fn formatting_edits(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        settings: &FormatCodeSettings,
    ) -> EngineResult<Vec<TextChange>>;

    fn syntactic_diagnostics(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<EngineDiagnostic>>;

    fn semantic_diagnostics(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<EngineDiagnostic>>;

    fn suggestion_diagnostics(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<EngineDiagnostic>>;

    fn rename_info(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<RenameInfo>;

    fn rename_locations(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Vec<RenameLocation>>;
}
