use crate::engine::{DefinitionInfo, TextSpan};
use crate::error::Result;
use crate::features::degrade;
use crate::session::Session;
use crate::types::{LocationLink, Position, Range};

/// Declarations of the symbol at `position`.
pub fn definition(session: &mut Session, uri: &str, position: Position) -> Vec<LocationLink> {
    degrade("definition", uri, try_definition(session, uri, position))
}

/// Declarations of the type of the symbol at `position`.
pub fn type_definition(session: &mut Session, uri: &str, position: Position) -> Vec<LocationLink> {
    degrade(
        "type_definition",
        uri,
        try_type_definition(session, uri, position),
    )
}

fn try_definition(session: &mut Session, uri: &str, position: Position) -> Result<Vec<LocationLink>> {
    let target = session.resolve_position(uri, position)?;
    let bound = session
        .with_engine(|engine, host| engine.definition(host, &target.file, target.offset))?;
    let Some(bound) = bound else {
        return Ok(Vec::new());
    };

    let origin = session.file_range(&target.file, bound.text_span);
    Ok(bound
        .definitions
        .iter()
        .filter_map(|def| link(session, def, origin))
        .collect())
}

fn try_type_definition(
    session: &mut Session,
    uri: &str,
    position: Position,
) -> Result<Vec<LocationLink>> {
    let target = session.resolve_position(uri, position)?;
    let definitions = session
        .with_engine(|engine, host| engine.type_definition(host, &target.file, target.offset))?;
    Ok(definitions
        .iter()
        .filter_map(|def| link(session, def, None))
        .collect())
}

fn link(session: &mut Session, def: &DefinitionInfo, origin: Option<Range>) -> Option<LocationLink> {
    let selection = session.locate(&def.file_name, def.text_span)?;
    let target_range = def
        .context_span
        .and_then(|span: TextSpan| session.locate(&def.file_name, span))
        .map_or(selection.range, |context| context.range);
    Some(LocationLink {
        origin_range: origin,
        target_uri: selection.uri,
        target_range,
        target_selection_range: selection.range,
    })
}
