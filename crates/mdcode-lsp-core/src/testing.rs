//! A small lexical analysis engine for tests.
//!
//! [`LexicalEngine`] implements [`AnalysisEngine`] with nothing more than a
//! tokenizer and one global scope shared by every file of the project, the
//! way script files without imports share their declarations. It reads the
//! project exclusively through the [`ScriptHost`], re-fetching a snapshot only
//! when the host reports a new version, so tests observe the same version and
//! snapshot discipline a real engine relies on.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::engine::{
    AnalysisEngine, CompletionEntry, CompletionEntryDetails, CompletionInfo, CompletionOptions,
    DefinitionAndBoundSpan, DefinitionInfo, DiagnosticCategory, EngineDiagnostic, EngineError,
    EngineResult, FormatCodeSettings, JsDocTagInfo, OutliningSpan, OutliningSpanKind, QuickInfo,
    ReferenceEntry, RenameInfo, RenameLocation, ScriptElementKind, ScriptHost, SymbolDisplayPart,
    TextChange, TextSpan,
};
use crate::path::FileName;
use crate::snapshot::Snapshot;

const DECLARATION_KEYWORDS: &[&str] = &[
    "const", "let", "var", "function", "class", "interface", "type", "enum",
];

const KEYWORDS: &[&str] = &[
    "any", "as", "async", "await", "boolean", "break", "case", "catch", "class", "const",
    "continue", "declare", "default", "delete", "do", "else", "enum", "export", "extends",
    "false", "finally", "for", "from", "function", "if", "implements", "import", "in",
    "instanceof", "interface", "let", "never", "new", "null", "number", "object", "of",
    "private", "protected", "public", "readonly", "return", "static", "string", "super",
    "switch", "this", "throw", "true", "try", "type", "typeof", "undefined", "unknown", "var",
    "void", "while", "yield",
];

const GLOBALS: &[&str] = &[
    "Array", "Boolean", "Date", "Error", "JSON", "Map", "Math", "NaN", "Infinity", "Number",
    "Object", "Promise", "RegExp", "Set", "String", "Symbol", "console", "document", "exports",
    "fetch", "module", "parseFloat", "parseInt", "process", "require", "setTimeout", "window",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Punct,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    start: usize,
    end: usize,
}

impl Token {
    fn span(&self) -> TextSpan {
        TextSpan::new(self.start, self.end - self.start)
    }
}

#[derive(Debug, Clone, Copy)]
struct Comment {
    start: usize,
    end: usize,
    line: bool,
    doc: bool,
}

#[derive(Debug, Clone, Default)]
struct DocComment {
    text: String,
    tags: Vec<(String, String)>,
}

impl DocComment {
    fn parse(raw: &str) -> Self {
        let body = raw.trim_start_matches("/**").trim_end_matches("*/");
        let mut doc = DocComment::default();
        let mut text = Vec::new();
        for line in body.lines() {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line).trim();
            if let Some(tag) = line.strip_prefix('@') {
                let (name, rest) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
                doc.tags.push((name.to_string(), rest.trim().to_string()));
            } else if let Some((_, tag_text)) = doc.tags.last_mut() {
                if !line.is_empty() {
                    if !tag_text.is_empty() {
                        tag_text.push('\n');
                    }
                    tag_text.push_str(line);
                }
            } else {
                text.push(line);
            }
        }
        doc.text = text.join("\n").trim().to_string();
        doc
    }

    fn is_deprecated(&self) -> bool {
        self.tags.iter().any(|(name, _)| name == "deprecated")
    }

    fn documentation(&self) -> Vec<SymbolDisplayPart> {
        if self.text.is_empty() {
            Vec::new()
        } else {
            vec![SymbolDisplayPart::text(self.text.clone())]
        }
    }

    fn tag_infos(&self) -> Vec<JsDocTagInfo> {
        self.tags
            .iter()
            .map(|(name, text)| JsDocTagInfo {
                name: name.clone(),
                text: if text.is_empty() {
                    Vec::new()
                } else {
                    vec![SymbolDisplayPart::text(text.clone())]
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Declaration {
    name: String,
    keyword: &'static str,
    span: TextSpan,
    context: TextSpan,
    type_name: Option<String>,
    doc: Option<DocComment>,
}

impl Declaration {
    fn kind(&self) -> ScriptElementKind {
        match self.keyword {
            "const" => ScriptElementKind::Const,
            "let" => ScriptElementKind::Let,
            "var" => ScriptElementKind::Variable,
            "function" => ScriptElementKind::Function,
            "class" => ScriptElementKind::Class,
            "interface" => ScriptElementKind::Interface,
            "type" => ScriptElementKind::Type,
            "enum" => ScriptElementKind::Enum,
            "parameter" => ScriptElementKind::Parameter,
            _ => ScriptElementKind::Unknown,
        }
    }

    fn is_deprecated(&self) -> bool {
        self.doc.as_ref().is_some_and(DocComment::is_deprecated)
    }

    fn kind_modifiers(&self) -> String {
        if self.is_deprecated() {
            "deprecated".to_string()
        } else {
            String::new()
        }
    }

    fn display_parts(&self) -> Vec<SymbolDisplayPart> {
        let mut parts = if self.keyword == "parameter" {
            vec![
                SymbolDisplayPart::new("punctuation", "("),
                SymbolDisplayPart::text("parameter"),
                SymbolDisplayPart::new("punctuation", ")"),
            ]
        } else {
            vec![SymbolDisplayPart::new("keyword", self.keyword)]
        };
        parts.push(SymbolDisplayPart::new("space", " "));
        parts.push(SymbolDisplayPart::new("localName", self.name.clone()));
        if let Some(type_name) = &self.type_name {
            parts.push(SymbolDisplayPart::new("punctuation", ":"));
            parts.push(SymbolDisplayPart::new("space", " "));
            parts.push(SymbolDisplayPart::new("typeName", type_name.clone()));
        }
        parts
    }
}

#[derive(Debug, Clone)]
struct Usage {
    name: String,
    span: TextSpan,
}

/// One analyzed file.
#[derive(Debug, Clone)]
struct SourceFile {
    version: u64,
    text: Snapshot,
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    declarations: Vec<Declaration>,
    usages: Vec<Usage>,
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || byte >= 0x80
}

fn lex(text: &str) -> (Vec<Token>, Vec<Comment>) {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut comments = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = text[i..].find('\n').map_or(bytes.len(), |n| i + n);
                comments.push(Comment {
                    start: i,
                    end,
                    line: true,
                    doc: false,
                });
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = text[i + 2..].find("*/").map_or(bytes.len(), |n| i + 2 + n + 2);
                let raw = &text[i..end];
                comments.push(Comment {
                    start: i,
                    end,
                    line: false,
                    doc: raw.starts_with("/**") && !raw.starts_with("/**/"),
                });
                i = end;
            }
            b'"' | b'\'' | b'`' => {
                let mut j = i + 1;
                while j < bytes.len() && bytes[j] != byte {
                    if bytes[j] == b'\\' {
                        j += 1;
                    } else if bytes[j] == b'\n' && byte != b'`' {
                        break;
                    }
                    j += 1;
                }
                i = (j + 1).min(bytes.len());
            }
            b'0'..=b'9' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                    i += 1;
                }
            }
            _ if is_ident_byte(byte) => {
                let start = i;
                while i < bytes.len() && is_ident_byte(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token {
                    kind: TokenKind::Ident,
                    start,
                    end: i,
                });
            }
            _ => {
                tokens.push(Token {
                    kind: TokenKind::Punct,
                    start: i,
                    end: i + 1,
                });
                i += 1;
            }
        }
    }
    (tokens, comments)
}

impl SourceFile {
    fn analyze(version: u64, text: Snapshot) -> Self {
        let (tokens, comments) = lex(&text);
        let mut file = SourceFile {
            version,
            text,
            tokens,
            comments,
            declarations: Vec::new(),
            usages: Vec::new(),
        };
        file.collect_symbols();
        file
    }

    fn word(&self, token: &Token) -> &str {
        &self.text[token.start..token.end]
    }

    fn is_punct(&self, index: usize, ch: char) -> bool {
        self.tokens.get(index).is_some_and(|token| {
            token.kind == TokenKind::Punct && self.text[token.start..token.end].starts_with(ch)
        })
    }

    fn ident_at(&self, index: usize) -> Option<&str> {
        self.tokens
            .get(index)
            .filter(|token| token.kind == TokenKind::Ident)
            .map(|token| self.word(token))
    }

    fn doc_before(&self, start: usize) -> Option<DocComment> {
        self.comments
            .iter()
            .filter(|comment| comment.doc && comment.end <= start)
            .next_back()
            .filter(|comment| self.text[comment.end..start].trim().is_empty())
            .map(|comment| DocComment::parse(&self.text[comment.start..comment.end]))
    }

    /// End of the statement starting with the token at `from`.
    fn statement_end(&self, from: usize) -> usize {
        let start = self.tokens[from].start;
        let line_end = self.text[start..]
            .find('\n')
            .map_or(self.text.len(), |n| start + n);
        let mut depth = 0i32;
        let mut braced = false;
        let mut last = line_end;
        for token in &self.tokens[from..] {
            if depth == 0 && !braced && token.start >= line_end {
                return line_end;
            }
            last = token.end;
            if token.kind != TokenKind::Punct {
                continue;
            }
            match self.word(token) {
                "{" => {
                    depth += 1;
                    braced = true;
                }
                "(" | "[" => depth += 1,
                "}" | ")" | "]" => {
                    depth -= 1;
                    if depth <= 0 && braced && self.word(token) == "}" {
                        return token.end;
                    }
                    if depth < 0 {
                        return token.start;
                    }
                }
                ";" if depth == 0 => return token.end,
                _ => {}
            }
        }
        last.max(line_end.min(self.text.len()))
    }

    fn collect_symbols(&mut self) {
        let mut declared = HashSet::new();
        let mut declarations = Vec::new();

        for j in 0..self.tokens.len() {
            let Some(keyword) = self
                .ident_at(j)
                .and_then(|word| DECLARATION_KEYWORDS.iter().copied().find(|k| *k == word))
            else {
                continue;
            };
            if j > 0 && self.is_punct(j - 1, '.') {
                continue;
            }
            let Some(name) = self.ident_at(j + 1) else {
                continue;
            };
            if KEYWORDS.contains(&name) {
                continue;
            }

            let type_name = if self.is_punct(j + 2, ':') {
                self.ident_at(j + 3).map(str::to_string)
            } else if self.is_punct(j + 2, '=') && self.ident_at(j + 3) == Some("new") {
                self.ident_at(j + 4).map(str::to_string)
            } else {
                None
            };

            let start = self.tokens[j].start;
            let end = self.statement_end(j);
            declared.insert(j + 1);
            declarations.push(Declaration {
                name: name.to_string(),
                keyword,
                span: self.tokens[j + 1].span(),
                context: TextSpan::new(start, end - start),
                type_name,
                doc: self.doc_before(start),
            });

            if keyword == "function" && self.is_punct(j + 2, '(') {
                let mut depth = 1;
                let mut k = j + 3;
                while k < self.tokens.len() && depth > 0 {
                    if self.is_punct(k, '(') {
                        depth += 1;
                    } else if self.is_punct(k, ')') {
                        depth -= 1;
                    } else if depth == 1
                        && (self.is_punct(k - 1, '(') || self.is_punct(k - 1, ','))
                    {
                        if let Some(param) = self.ident_at(k) {
                            let type_name = if self.is_punct(k + 1, ':') {
                                self.ident_at(k + 2).map(str::to_string)
                            } else {
                                None
                            };
                            declared.insert(k);
                            declarations.push(Declaration {
                                name: param.to_string(),
                                keyword: "parameter",
                                span: self.tokens[k].span(),
                                context: self.tokens[k].span(),
                                type_name,
                                doc: None,
                            });
                        }
                    }
                    k += 1;
                }
            }
        }

        let mut usages = Vec::new();
        for (j, token) in self.tokens.iter().enumerate() {
            if token.kind != TokenKind::Ident || declared.contains(&j) {
                continue;
            }
            let word = self.word(token);
            if KEYWORDS.contains(&word) {
                continue;
            }
            if j > 0 && self.is_punct(j - 1, '.') {
                continue;
            }
            let property_key =
                self.is_punct(j + 1, ':') && j > 0 && (self.is_punct(j - 1, '{') || self.is_punct(j - 1, ','));
            if property_key {
                continue;
            }
            usages.push(Usage {
                name: word.to_string(),
                span: token.span(),
            });
        }

        self.declarations = declarations;
        self.usages = usages;
    }

    /// The identifier under `offset`, including one ending right before it.
    fn ident_token_at(&self, offset: usize) -> Option<&Token> {
        let mut touching = None;
        for token in &self.tokens {
            if token.kind != TokenKind::Ident || token.start > offset {
                continue;
            }
            if offset < token.end {
                return Some(token);
            }
            if offset == token.end {
                touching = Some(token);
            }
        }
        touching
    }
}

/// Lexical [`AnalysisEngine`] with one global scope.
#[derive(Debug, Default)]
pub struct LexicalEngine {
    project_version: Option<u64>,
    files: BTreeMap<FileName, SourceFile>,
    failing: Vec<String>,
    stray: bool,
    fetches: usize,
}

impl LexicalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail semantic diagnostics for files whose name ends with `suffix`.
    pub fn failing(mut self, suffix: impl Into<String>) -> Self {
        self.failing.push(suffix.into());
        self
    }

    /// Report an extra diagnostic at offset 0 of every file.
    pub fn with_stray_diagnostic(mut self) -> Self {
        self.stray = true;
        self
    }

    /// Number of snapshots fetched from the host so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    fn sync(&mut self, host: &mut dyn ScriptHost) {
        let project_version = host.project_version();
        if self.project_version == Some(project_version) {
            return;
        }
        let names: BTreeSet<FileName> = host.script_file_names().into_iter().collect();
        self.files.retain(|name, _| names.contains(name));
        for name in names {
            let version = host.script_version(&name);
            if self.files.get(&name).is_some_and(|file| file.version == version) {
                continue;
            }
            match host.script_snapshot(&name) {
                Some(text) => {
                    self.fetches += 1;
                    self.files
                        .insert(name, SourceFile::analyze(version, text));
                }
                None => {
                    self.files.remove(&name);
                }
            }
        }
        self.project_version = Some(project_version);
    }

    fn source(&mut self, host: &mut dyn ScriptHost, file: &FileName) -> EngineResult<&SourceFile> {
        self.sync(host);
        self.files
            .get(file)
            .ok_or_else(|| EngineError::NoSourceFile(file.to_string()))
    }

    /// The identifier at `offset` in `file`.
    fn word_at(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Option<(String, TextSpan)>> {
        let source = self.source(host, file)?;
        if offset > source.text.len() {
            return Err(EngineError::OffsetOutOfRange {
                file: file.to_string(),
                offset,
            });
        }
        Ok(source.ident_token_at(offset).and_then(|token| {
            let word = source.word(token);
            (!KEYWORDS.contains(&word)).then(|| (word.to_string(), token.span()))
        }))
    }

    fn declarations_of(&self, name: &str) -> Vec<(&FileName, &Declaration)> {
        self.files
            .iter()
            .flat_map(|(file_name, file)| {
                file.declarations
                    .iter()
                    .filter(move |decl| decl.name == name)
                    .map(move |decl| (file_name, decl))
            })
            .collect()
    }

    fn is_declared(&self, name: &str) -> bool {
        self.files
            .values()
            .any(|file| file.declarations.iter().any(|decl| decl.name == name))
    }

    fn is_used(&self, name: &str) -> bool {
        self.files
            .values()
            .any(|file| file.usages.iter().any(|usage| usage.name == name))
    }

    fn definition_info(file: &FileName, decl: &Declaration) -> DefinitionInfo {
        DefinitionInfo {
            file_name: file.as_str().to_string(),
            text_span: decl.span,
            context_span: Some(decl.context),
            kind: decl.kind(),
            name: decl.name.clone(),
        }
    }

    fn occurrences(&self, name: &str) -> Vec<ReferenceEntry> {
        let mut entries = Vec::new();
        for (file_name, file) in &self.files {
            for decl in file.declarations.iter().filter(|decl| decl.name == name) {
                entries.push(ReferenceEntry {
                    file_name: file_name.as_str().to_string(),
                    text_span: decl.span,
                    is_write_access: true,
                });
            }
            for usage in file.usages.iter().filter(|usage| usage.name == name) {
                entries.push(ReferenceEntry {
                    file_name: file_name.as_str().to_string(),
                    text_span: usage.span,
                    is_write_access: false,
                });
            }
        }
        entries.sort_by(|a, b| {
            (a.file_name.as_str(), a.text_span.start).cmp(&(b.file_name.as_str(), b.text_span.start))
        });
        entries
    }
}

fn diagnostic(
    file: &FileName,
    span: TextSpan,
    category: DiagnosticCategory,
    code: i32,
    message: String,
) -> EngineDiagnostic {
    EngineDiagnostic {
        file_name: Some(file.as_str().to_string()),
        start: Some(span.start),
        length: Some(span.length),
        message_text: message,
        category,
        code,
        reports_unnecessary: false,
        reports_deprecated: false,
    }
}

impl AnalysisEngine for LexicalEngine {
    fn quick_info(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Option<QuickInfo>> {
        let Some((word, span)) = self.word_at(host, file, offset)? else {
            return Ok(None);
        };
        let info = match self.declarations_of(&word).first() {
            Some((_, decl)) => QuickInfo {
                kind: decl.kind(),
                kind_modifiers: decl.kind_modifiers(),
                text_span: span,
                display_parts: decl.display_parts(),
                documentation: decl.doc.as_ref().map(DocComment::documentation).unwrap_or_default(),
                tags: decl.doc.as_ref().map(DocComment::tag_infos).unwrap_or_default(),
            },
            None => QuickInfo {
                kind: ScriptElementKind::Variable,
                kind_modifiers: String::new(),
                text_span: span,
                display_parts: vec![
                    SymbolDisplayPart::new("keyword", "var"),
                    SymbolDisplayPart::new("space", " "),
                    SymbolDisplayPart::new("localName", word),
                    SymbolDisplayPart::new("punctuation", ":"),
                    SymbolDisplayPart::new("space", " "),
                    SymbolDisplayPart::new("keyword", "any"),
                ],
                documentation: Vec::new(),
                tags: Vec::new(),
            },
        };
        Ok(Some(info))
    }

    fn completions(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
        _options: &CompletionOptions,
    ) -> EngineResult<Option<CompletionInfo>> {
        let source = self.source(host, file)?;
        let Some(before) = source.text.get(..offset) else {
            return Err(EngineError::OffsetOutOfRange {
                file: file.to_string(),
                offset,
            });
        };
        let prefix_start = before
            .bytes()
            .rposition(|b| !is_ident_byte(b))
            .map_or(0, |i| i + 1);
        let prefix = &before[prefix_start..];
        if before[..prefix_start].ends_with('.') {
            return Ok(None);
        }
        let is_new_identifier_location = source
            .tokens
            .iter()
            .filter(|token| token.end <= prefix_start)
            .next_back()
            .is_some_and(|token| DECLARATION_KEYWORDS.contains(&source.word(token)));
        let replacement_span = TextSpan::new(prefix_start, prefix.len());
        let prefix = prefix.to_string();

        let mut names = BTreeMap::new();
        for file in self.files.values() {
            for decl in &file.declarations {
                if decl.name.starts_with(&prefix) {
                    names.entry(decl.name.clone()).or_insert(decl);
                }
            }
        }
        let mut entries: Vec<CompletionEntry> = names
            .into_values()
            .map(|decl| CompletionEntry {
                name: decl.name.clone(),
                kind: decl.kind(),
                kind_modifiers: decl.kind_modifiers(),
                sort_text: "11".to_string(),
                insert_text: None,
                replacement_span: Some(replacement_span),
                is_recommended: false,
                source: None,
            })
            .collect();
        entries.extend(
            KEYWORDS
                .iter()
                .filter(|keyword| keyword.starts_with(prefix.as_str()))
                .map(|keyword| CompletionEntry {
                    name: keyword.to_string(),
                    kind: ScriptElementKind::Keyword,
                    kind_modifiers: String::new(),
                    sort_text: "15".to_string(),
                    insert_text: None,
                    replacement_span: Some(replacement_span),
                    is_recommended: false,
                    source: None,
                }),
        );

        Ok(Some(CompletionInfo {
            is_incomplete: false,
            is_new_identifier_location,
            entries,
        }))
    }

    fn completion_details(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        _offset: usize,
        name: &str,
        _source: Option<&str>,
    ) -> EngineResult<Option<CompletionEntryDetails>> {
        self.source(host, file)?;
        if let Some((_, decl)) = self.declarations_of(name).first() {
            return Ok(Some(CompletionEntryDetails {
                name: decl.name.clone(),
                kind: decl.kind(),
                kind_modifiers: decl.kind_modifiers(),
                display_parts: decl.display_parts(),
                documentation: decl.doc.as_ref().map(DocComment::documentation).unwrap_or_default(),
                tags: decl.doc.as_ref().map(DocComment::tag_infos).unwrap_or_default(),
            }));
        }
        if KEYWORDS.contains(&name) {
            return Ok(Some(CompletionEntryDetails {
                name: name.to_string(),
                kind: ScriptElementKind::Keyword,
                kind_modifiers: String::new(),
                display_parts: vec![SymbolDisplayPart::new("keyword", name)],
                documentation: Vec::new(),
                tags: Vec::new(),
            }));
        }
        Ok(None)
    }

    fn definition(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Option<DefinitionAndBoundSpan>> {
        let Some((word, span)) = self.word_at(host, file, offset)? else {
            return Ok(None);
        };
        let definitions: Vec<DefinitionInfo> = self
            .declarations_of(&word)
            .into_iter()
            .map(|(file, decl)| Self::definition_info(file, decl))
            .collect();
        if definitions.is_empty() {
            return Ok(None);
        }
        Ok(Some(DefinitionAndBoundSpan {
            definitions,
            text_span: span,
        }))
    }

    fn type_definition(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Vec<DefinitionInfo>> {
        let Some((word, _)) = self.word_at(host, file, offset)? else {
            return Ok(Vec::new());
        };
        let type_names: BTreeSet<String> = self
            .declarations_of(&word)
            .into_iter()
            .filter_map(|(_, decl)| decl.type_name.clone())
            .collect();
        Ok(type_names
            .iter()
            .flat_map(|type_name| self.declarations_of(type_name))
            .map(|(file, decl)| Self::definition_info(file, decl))
            .collect())
    }

    fn references(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Vec<ReferenceEntry>> {
        let Some((word, _)) = self.word_at(host, file, offset)? else {
            return Ok(Vec::new());
        };
        Ok(self.occurrences(&word))
    }

    fn outlining_spans(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<OutliningSpan>> {
        let source = self.source(host, file)?;
        let text = source.text.as_str();
        let line_start = |offset: usize| text[..offset].rfind('\n').map_or(0, |i| i + 1);
        let mut spans = Vec::new();

        let mut open = Vec::new();
        for token in source.tokens.iter().filter(|t| t.kind == TokenKind::Punct) {
            match source.word(token) {
                "{" => open.push(token.start),
                "}" => {
                    if let Some(start) = open.pop() {
                        if text[start..token.end].contains('\n') {
                            let hint = line_start(start);
                            spans.push(OutliningSpan {
                                text_span: TextSpan::new(start, token.end - start),
                                hint_span: TextSpan::new(hint, token.end - hint),
                                banner_text: "...".to_string(),
                                auto_collapse: false,
                                kind: OutliningSpanKind::Code,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        let mut regions = Vec::new();
        for comment in &source.comments {
            let raw = &text[comment.start..comment.end];
            if !comment.line {
                if raw.contains('\n') {
                    spans.push(OutliningSpan {
                        text_span: TextSpan::new(comment.start, comment.end - comment.start),
                        hint_span: TextSpan::new(comment.start, comment.end - comment.start),
                        banner_text: "/* ...".to_string(),
                        auto_collapse: false,
                        kind: OutliningSpanKind::Comment,
                    });
                }
                continue;
            }
            let body = raw.trim_start_matches('/').trim();
            if let Some(label) = body.strip_prefix("#region") {
                regions.push((comment.start, label.trim().to_string()));
            } else if body.starts_with("#endregion") {
                if let Some((start, label)) = regions.pop() {
                    spans.push(OutliningSpan {
                        text_span: TextSpan::new(start, comment.end - start),
                        hint_span: TextSpan::new(start, comment.end - start),
                        banner_text: if label.is_empty() { "#region".to_string() } else { label },
                        auto_collapse: false,
                        kind: OutliningSpanKind::Region,
                    });
                }
            }
        }

        spans.sort_by_key(|span| span.text_span.start);
        Ok(spans)
    }

    fn formatting_edits(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        settings: &FormatCodeSettings,
    ) -> EngineResult<Vec<TextChange>> {
        let source = self.source(host, file)?;
        let mut changes = Vec::new();
        let mut line_start = 0;
        for line in source.text.split_inclusive('\n') {
            let content = line.strip_suffix('\n').unwrap_or(line);
            let content = content.strip_suffix('\r').unwrap_or(content);
            let trimmed = content.trim_end_matches([' ', '\t']);
            if settings.convert_tabs_to_spaces {
                let tabs = trimmed.len() - trimmed.trim_start_matches('\t').len();
                if tabs > 0 {
                    changes.push(TextChange {
                        span: TextSpan::new(line_start, tabs),
                        new_text: " ".repeat(tabs * settings.indent_size as usize),
                    });
                }
            }
            if trimmed.len() < content.len() {
                changes.push(TextChange {
                    span: TextSpan::new(line_start + trimmed.len(), content.len() - trimmed.len()),
                    new_text: String::new(),
                });
            }
            line_start += line.len();
        }
        Ok(changes)
    }

    fn syntactic_diagnostics(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<EngineDiagnostic>> {
        let source = self.source(host, file)?;
        let mut diagnostics = Vec::new();
        for pair in source.tokens.windows(2) {
            let [first, second] = pair else { continue };
            if source.word(first) == "@" && source.word(second) == "@" && first.end == second.start {
                diagnostics.push(diagnostic(
                    file,
                    TextSpan::new(first.start, 2),
                    DiagnosticCategory::Error,
                    1109,
                    "Expression expected.".to_string(),
                ));
            }
        }
        Ok(diagnostics)
    }

    fn semantic_diagnostics(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<EngineDiagnostic>> {
        if self.failing.iter().any(|suffix| file.as_str().ends_with(suffix.as_str())) {
            return Err(EngineError::Internal(format!("checker crashed on {file}")));
        }
        self.source(host, file)?;
        let source = &self.files[file];
        let mut diagnostics: Vec<EngineDiagnostic> = source
            .usages
            .iter()
            .filter(|usage| !GLOBALS.contains(&usage.name.as_str()) && !self.is_declared(&usage.name))
            .map(|usage| {
                diagnostic(
                    file,
                    usage.span,
                    DiagnosticCategory::Error,
                    2304,
                    format!("Cannot find name '{}'.", usage.name),
                )
            })
            .collect();
        if self.stray {
            diagnostics.push(diagnostic(
                file,
                TextSpan::new(0, 1),
                DiagnosticCategory::Error,
                9999,
                "Stray diagnostic.".to_string(),
            ));
        }
        Ok(diagnostics)
    }

    fn suggestion_diagnostics(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
    ) -> EngineResult<Vec<EngineDiagnostic>> {
        self.source(host, file)?;
        let source = &self.files[file];
        let mut diagnostics = Vec::new();
        for decl in &source.declarations {
            if matches!(decl.keyword, "const" | "let" | "var") && !self.is_used(&decl.name) {
                let mut unused = diagnostic(
                    file,
                    decl.span,
                    DiagnosticCategory::Suggestion,
                    6133,
                    format!("'{}' is declared but its value is never read.", decl.name),
                );
                unused.reports_unnecessary = true;
                diagnostics.push(unused);
            }
        }
        for usage in &source.usages {
            let deprecated = self
                .declarations_of(&usage.name)
                .iter()
                .any(|(_, decl)| decl.is_deprecated());
            if deprecated {
                let mut found = diagnostic(
                    file,
                    usage.span,
                    DiagnosticCategory::Suggestion,
                    6385,
                    format!("'{}' is deprecated.", usage.name),
                );
                found.reports_deprecated = true;
                diagnostics.push(found);
            }
        }
        Ok(diagnostics)
    }

    fn rename_info(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<RenameInfo> {
        let word = self.word_at(host, file, offset)?;
        let Some((word, span)) = word else {
            return Ok(RenameInfo::Denied {
                localized_error_message: "You cannot rename this element.".to_string(),
            });
        };
        match self.declarations_of(&word).first() {
            Some((_, decl)) => Ok(RenameInfo::Allowed {
                display_name: decl.name.clone(),
                full_display_name: decl.name.clone(),
                kind: decl.kind(),
                trigger_span: span,
            }),
            None => Ok(RenameInfo::Denied {
                localized_error_message: "You cannot rename this element.".to_string(),
            }),
        }
    }

    fn rename_locations(
        &mut self,
        host: &mut dyn ScriptHost,
        file: &FileName,
        offset: usize,
    ) -> EngineResult<Vec<RenameLocation>> {
        let Some((word, _)) = self.word_at(host, file, offset)? else {
            return Ok(Vec::new());
        };
        if !self.is_declared(&word) {
            return Ok(Vec::new());
        }
        Ok(self
            .occurrences(&word)
            .into_iter()
            .map(|entry| RenameLocation {
                file_name: entry.file_name,
                text_span: entry.text_span,
                prefix_text: None,
                suffix_text: None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(text: &str) -> SourceFile {
        SourceFile::analyze(0, Snapshot::from(text))
    }

    #[test]
    fn strings_and_comments_hide_identifiers() {
        let file = analyze("let a = 'b c'; // d\n/* e */ a;\n");
        let names: Vec<&str> = file.usages.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);
        assert_eq!(file.declarations.len(), 1);
    }

    #[test]
    fn declarations_carry_context_and_docs() {
        let text = "/**\n * Adds.\n * @deprecated\n */\nfunction add(x: number, y) {\n  return x + y;\n}\nconst p: Point = q;\n";
        let file = analyze(text);
        let names: Vec<&str> = file.declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["add", "x", "y", "p"]);

        let add = &file.declarations[0];
        assert!(add.is_deprecated());
        assert_eq!(&text[add.context.start..add.context.end()], "function add(x: number, y) {\n  return x + y;\n}");
        assert_eq!(file.declarations[3].type_name.as_deref(), Some("Point"));
    }

    #[test]
    fn members_and_keys_are_not_usages() {
        let file = analyze("console.log({ key: value });\n");
        let names: Vec<&str> = file.usages.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["console", "value"]);
    }
}
