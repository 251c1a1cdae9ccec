use crate::engine::{
    AnalysisEngine, DiagnosticCategory, EngineDiagnostic, EngineResult, ScriptHost, TextSpan,
};
use crate::error::Result;
use crate::features::degrade;
use crate::path::FileName;
use crate::session::{DocumentFile, Session};
use crate::types::{Diagnostic, DiagnosticCode, DiagnosticSeverity, DiagnosticTag};

type Query =
    fn(&mut dyn AnalysisEngine, &mut dyn ScriptHost, &FileName) -> EngineResult<Vec<EngineDiagnostic>>;

/// Diagnostics of every block of a document, or of a plain document.
///
/// Each block and each diagnostic kind is queried separately; a failing query
/// is logged and skipped, so one broken block never hides the others.
pub fn diagnostics(session: &mut Session, uri: &str) -> Vec<Diagnostic> {
    degrade("diagnostics", uri, try_diagnostics(session, uri))
}

fn severity(category: DiagnosticCategory) -> DiagnosticSeverity {
    match category {
        DiagnosticCategory::Warning => DiagnosticSeverity::Warning,
        DiagnosticCategory::Error => DiagnosticSeverity::Error,
        DiagnosticCategory::Suggestion => DiagnosticSeverity::Hint,
        DiagnosticCategory::Message => DiagnosticSeverity::Information,
    }
}

fn semantic(
    engine: &mut dyn AnalysisEngine,
    host: &mut dyn ScriptHost,
    file: &FileName,
) -> EngineResult<Vec<EngineDiagnostic>> {
    engine.semantic_diagnostics(host, file)
}

fn syntactic(
    engine: &mut dyn AnalysisEngine,
    host: &mut dyn ScriptHost,
    file: &FileName,
) -> EngineResult<Vec<EngineDiagnostic>> {
    engine.syntactic_diagnostics(host, file)
}

fn suggestion(
    engine: &mut dyn AnalysisEngine,
    host: &mut dyn ScriptHost,
    file: &FileName,
) -> EngineResult<Vec<EngineDiagnostic>> {
    engine.suggestion_diagnostics(host, file)
}

fn queries(session: &Session) -> Vec<(&'static str, Query)> {
    let enabled = &session.config().diagnostics;
    let mut queries: Vec<(&'static str, Query)> = Vec::new();
    if enabled.semantic {
        queries.push(("semantic", semantic));
    }
    if enabled.syntactic {
        queries.push(("syntactic", syntactic));
    }
    if enabled.suggestion {
        queries.push(("suggestion", suggestion));
    }
    queries
}

fn try_diagnostics(session: &mut Session, uri: &str) -> Result<Vec<Diagnostic>> {
    let queries = queries(session);
    let mut diagnostics = Vec::new();
    for doc_file in session.document_files(uri)? {
        for &(kind, query) in &queries {
            match session.with_engine(|engine, host| query(engine, host, &doc_file.file)) {
                Ok(found) => {
                    for diagnostic in found {
                        if let Some(converted) = convert(session, &doc_file, diagnostic) {
                            diagnostics.push(converted);
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(file = %doc_file.file, kind, %error, "diagnostics query failed");
                }
            }
        }
    }
    Ok(diagnostics)
}

fn convert(
    session: &mut Session,
    doc_file: &DocumentFile,
    diagnostic: EngineDiagnostic,
) -> Option<Diagnostic> {
    let (Some(start), Some(length)) = (diagnostic.start, diagnostic.length) else {
        return None;
    };
    if let Some(span) = doc_file.span {
        if !span.contains_offsets(start, start + length) {
            tracing::debug!(file = %doc_file.file, start, "dropping diagnostic outside its block");
            return None;
        }
    }
    let range = session.file_range(&doc_file.file, TextSpan::new(start, length))?;

    let mut converted = Diagnostic::new(range, severity(diagnostic.category), diagnostic.message_text)
        .with_code(DiagnosticCode::Number(diagnostic.code));
    if diagnostic.reports_deprecated {
        converted = converted.with_tag(DiagnosticTag::Deprecated);
    }
    if diagnostic.reports_unnecessary {
        converted = converted.with_tag(DiagnosticTag::Unnecessary);
    }
    Some(converted)
}
