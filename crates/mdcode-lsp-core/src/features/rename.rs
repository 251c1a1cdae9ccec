use crate::engine::RenameInfo;
use crate::error::Result;
use crate::features::degrade;
use crate::session::Session;
use crate::types::{Position, Range, TextEdit, WorkspaceEdit};

/// Range of the symbol at `position` if it can be renamed.
pub fn prepare_rename(session: &mut Session, uri: &str, position: Position) -> Option<Range> {
    degrade("prepare_rename", uri, try_prepare_rename(session, uri, position))
}

/// Edits renaming the symbol at `position` to `new_name`, grouped by document.
pub fn rename(session: &mut Session, uri: &str, position: Position, new_name: &str) -> WorkspaceEdit {
    degrade("rename", uri, try_rename(session, uri, position, new_name))
}

fn try_prepare_rename(session: &mut Session, uri: &str, position: Position) -> Result<Option<Range>> {
    let target = session.resolve_position(uri, position)?;
    let info = session
        .with_engine(|engine, host| engine.rename_info(host, &target.file, target.offset))?;
    match info {
        RenameInfo::Allowed { trigger_span, .. } => Ok(session.file_range(&target.file, trigger_span)),
        RenameInfo::Denied {
            localized_error_message,
        } => {
            tracing::debug!(uri, reason = %localized_error_message, "rename denied");
            Ok(None)
        }
    }
}

fn try_rename(
    session: &mut Session,
    uri: &str,
    position: Position,
    new_name: &str,
) -> Result<WorkspaceEdit> {
    let target = session.resolve_position(uri, position)?;
    let locations = session
        .with_engine(|engine, host| engine.rename_locations(host, &target.file, target.offset))?;

    let mut edit = WorkspaceEdit::default();
    for location in locations {
        let Some(mapped) = session.locate(&location.file_name, location.text_span) else {
            continue;
        };
        let new_text = format!(
            "{}{new_name}{}",
            location.prefix_text.as_deref().unwrap_or_default(),
            location.suffix_text.as_deref().unwrap_or_default(),
        );
        let edits = edit.changes.entry(mapped.uri).or_default();
        if !edits.iter().any(|e: &TextEdit| e.range == mapped.range) {
            edits.push(TextEdit {
                range: mapped.range,
                new_text,
            });
        }
    }
    Ok(edit)
}
