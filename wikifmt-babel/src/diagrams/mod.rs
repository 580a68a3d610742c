//! Diagram registry
//!
//!     Every diagram macro in a document (nested ones included) gets a record with a stable id,
//!     its live code and the code it had when registered. Surfaces carry only the id; the record
//!     is how an edited diagram finds its way back to the right macro.
//!
//!     Ids are positional (`diagram-<n>` in depth-first document order) and are reassigned each
//!     time a document is registered. Records address their macro by segment path, never by
//!     source text, so two diagrams with identical source stay independent.
//!
//!     Applying a record:
//!         - body at the recorded path equals the live code: already applied, nothing to do
//!         - body equals the registered code: replace it
//!         - body is anything else: the diagram was edited elsewhere, fail with
//!           [`FormatError::DiagramMismatch`]
//!         - no diagram at the path: the path is stale; re-derive only if exactly one diagram
//!           still carries the registered code, else fail with a mismatch

pub mod render;

pub use render::{DiagramRenderer, RenderCache, RenderJob, RenderOutcome, RenderQueue, RenderReport};

use crate::codec::{segment_at, segment_at_mut, visit_macros, MacroType, Segment, SegmentPath};
use crate::error::FormatError;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagramKind {
    Diagram,
    CodeDiagram,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramRecord {
    pub id: String,
    /// Live code, updated by edits
    pub code: String,
    /// Code at registration time
    pub original_code: String,
    pub macro_type: DiagramKind,
    pub owner_segment_index: SegmentPath,
}

impl DiagramRecord {
    pub fn is_modified(&self) -> bool {
        self.code != self.original_code
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagramRegistry {
    records: Vec<DiagramRecord>,
}

impl DiagramRegistry {
    pub fn register(segments: &[Segment]) -> Self {
        let mut records: Vec<DiagramRecord> = Vec::new();
        visit_macros(segments, &mut |path, m| {
            let macro_type = match m.macro_type {
                MacroType::Diagram => DiagramKind::Diagram,
                MacroType::CodeDiagram => DiagramKind::CodeDiagram,
                _ => return,
            };
            let code = m.body_text().unwrap_or_default().to_string();
            records.push(DiagramRecord {
                id: format!("diagram-{}", records.len()),
                original_code: code.clone(),
                code,
                macro_type,
                owner_segment_index: path.to_vec(),
            });
        });
        debug!(count = records.len(), "registered diagrams");
        DiagramRegistry { records }
    }

    pub fn get(&self, id: &str) -> Option<&DiagramRecord> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn by_path(&self, path: &[usize]) -> Option<&DiagramRecord> {
        self.records
            .iter()
            .find(|record| record.owner_segment_index == path)
    }

    pub fn set_code(&mut self, id: &str, code: &str) -> Result<(), FormatError> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.id == id)
            .ok_or_else(|| FormatError::DiagramMismatch {
                id: id.to_string(),
                reason: "no diagram is registered under this id".to_string(),
            })?;
        record.code = code.to_string();
        Ok(())
    }

    /// All records in document order
    pub fn diagrams(&self) -> &[DiagramRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

enum Target {
    Unchanged,
    At(SegmentPath),
}

/// Write a record's live code into the segment list, returning the updated list.
pub fn apply(segments: &[Segment], record: &DiagramRecord) -> Result<Vec<Segment>, FormatError> {
    let mut updated = segments.to_vec();
    match locate(segments, record)? {
        Target::Unchanged => {}
        Target::At(path) => {
            if let Some(Segment::Macro(m)) = segment_at_mut(&mut updated, &path) {
                m.set_text_body(&record.code);
            }
        }
    }
    Ok(updated)
}

/// Apply every modified record, collecting mismatches instead of stopping at the first one.
pub fn apply_all(segments: &[Segment], registry: &DiagramRegistry) -> (Vec<Segment>, Vec<FormatError>) {
    let mut current = segments.to_vec();
    let mut errors = Vec::new();
    for record in registry.diagrams().iter().filter(|r| r.is_modified()) {
        match apply(&current, record) {
            Ok(updated) => current = updated,
            Err(err) => errors.push(err),
        }
    }
    (current, errors)
}

fn locate(segments: &[Segment], record: &DiagramRecord) -> Result<Target, FormatError> {
    let owner = segment_at(segments, &record.owner_segment_index)
        .and_then(Segment::as_macro)
        .filter(|m| m.macro_type.is_diagram());
    if let Some(m) = owner {
        let body = m.body_text().unwrap_or_default();
        if body == record.code {
            return Ok(Target::Unchanged);
        }
        if body == record.original_code {
            return Ok(Target::At(record.owner_segment_index.clone()));
        }
        // an edited owner is never traded for a duplicate that still has the registered code
        let reason = "diagram was changed since it was registered".to_string();
        warn!(id = %record.id, %reason, "diagram mismatch");
        return Err(FormatError::DiagramMismatch {
            id: record.id.clone(),
            reason,
        });
    }

    let mut candidates = Vec::new();
    visit_macros(segments, &mut |path, m| {
        if m.macro_type.is_diagram() && m.body_text().unwrap_or_default() == record.original_code {
            candidates.push(path.to_vec());
        }
    });

    match candidates.len() {
        1 => {
            debug!(id = %record.id, "re-derived diagram location from its registered code");
            Ok(Target::At(candidates.remove(0)))
        }
        count => {
            let reason = if count == 0 {
                "no diagram carries the registered code".to_string()
            } else {
                format!("{count} diagrams carry the registered code")
            };
            warn!(id = %record.id, %reason, "diagram mismatch");
            Err(FormatError::DiagramMismatch {
                id: record.id.clone(),
                reason,
            })
        }
    }
}
