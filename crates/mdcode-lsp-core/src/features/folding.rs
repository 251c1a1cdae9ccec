use crate::engine::OutliningSpanKind;
use crate::error::Result;
use crate::features::degrade;
use crate::session::Session;
use crate::types::{FoldingRange, FoldingRangeKind};

/// Folding ranges of every block of a document, or of a plain document.
pub fn folding_ranges(session: &mut Session, uri: &str) -> Vec<FoldingRange> {
    degrade("folding_ranges", uri, try_folding_ranges(session, uri))
}

fn folding_kind(kind: OutliningSpanKind) -> Option<FoldingRangeKind> {
    match kind {
        OutliningSpanKind::Comment => Some(FoldingRangeKind::Comment),
        OutliningSpanKind::Region => Some(FoldingRangeKind::Region),
        OutliningSpanKind::Imports => Some(FoldingRangeKind::Imports),
        OutliningSpanKind::Code => None,
    }
}

fn try_folding_ranges(session: &mut Session, uri: &str) -> Result<Vec<FoldingRange>> {
    let mut ranges = Vec::new();
    for doc_file in session.document_files(uri)? {
        let spans =
            match session.with_engine(|engine, host| engine.outlining_spans(host, &doc_file.file)) {
                Ok(spans) => spans,
                Err(error) => {
                    tracing::warn!(file = %doc_file.file, %error, "outlining failed");
                    continue;
                }
            };
        for span in spans {
            if let Some(block) = doc_file.span {
                if !block.contains_offsets(span.text_span.start, span.text_span.end()) {
                    continue;
                }
            }
            let Some(range) = session.file_range(&doc_file.file, span.text_span) else {
                continue;
            };
            ranges.push(FoldingRange {
                start_line: range.start.line,
                start_character: range.start.character,
                end_line: range.end.line,
                end_character: range.end.character,
                kind: folding_kind(span.kind),
            });
        }
    }
    Ok(ranges)
}
