use std::collections::HashSet;

use crate::error::Result;
use crate::features::degrade;
use crate::session::Session;
use crate::types::{Location, Position};

/// Every reference to the symbol at `position`, across documents.
pub fn references(session: &mut Session, uri: &str, position: Position) -> Vec<Location> {
    degrade("references", uri, try_references(session, uri, position))
}

fn try_references(session: &mut Session, uri: &str, position: Position) -> Result<Vec<Location>> {
    let target = session.resolve_position(uri, position)?;
    let entries = session
        .with_engine(|engine, host| engine.references(host, &target.file, target.offset))?;

    let mut seen = HashSet::new();
    Ok(entries
        .iter()
        .filter_map(|entry| session.locate(&entry.file_name, entry.text_span))
        .filter(|location| seen.insert(location.clone()))
        .collect())
}
