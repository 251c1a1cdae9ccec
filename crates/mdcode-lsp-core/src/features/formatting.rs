use crate::engine::FormatCodeSettings;
use crate::error::Result;
use crate::features::degrade;
use crate::session::Session;
use crate::types::{FormattingOptions, TextEdit};

/// Formatting edits for every block of a document, or for a plain document.
pub fn formatting(session: &mut Session, uri: &str, options: &FormattingOptions) -> Vec<TextEdit> {
    degrade("formatting", uri, try_formatting(session, uri, options))
}

fn try_formatting(
    session: &mut Session,
    uri: &str,
    options: &FormattingOptions,
) -> Result<Vec<TextEdit>> {
    let settings = FormatCodeSettings {
        tab_size: options.tab_size,
        indent_size: options.tab_size,
        convert_tabs_to_spaces: options.insert_spaces,
        ..FormatCodeSettings::default()
    };

    let mut edits = Vec::new();
    for doc_file in session.document_files(uri)? {
        let changes = match session
            .with_engine(|engine, host| engine.formatting_edits(host, &doc_file.file, &settings))
        {
            Ok(changes) => changes,
            Err(error) => {
                tracing::warn!(file = %doc_file.file, %error, "formatting failed");
                continue;
            }
        };
        for change in changes {
            if let Some(span) = doc_file.span {
                if !span.contains_offsets(change.span.start, change.span.end()) {
                    continue;
                }
            }
            if let Some(range) = session.file_range(&doc_file.file, change.span) {
                edits.push(TextEdit {
                    range,
                    new_text: change.new_text,
                });
            }
        }
    }
    Ok(edits)
}
