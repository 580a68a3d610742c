//! Segments to rich-text HTML
//!
//! Markup segments are passed through, with non-void self-closing tags expanded so the HTML
//! parser keeps their siblings where they belong. Each macro becomes a placeholder (see
//! ../common/placeholder.rs). Callout bodies are written recursively inside their placeholder so
//! their content stays editable.

use crate::codec::{MacroSegment, MacroType, Segment};
use crate::diagrams::RenderOutcome;
use crate::surface::SurfaceContext;
use crate::surfaces::common::normalize::expand_self_closing;
use crate::surfaces::common::placeholder::{self, DiagramPlaceholder, DiagramView};
use tracing::debug;

/// How macros are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderMode {
    /// Diagram source visible and editable through the registry
    Rich,
    /// Rendered diagrams, everything locked
    Preview,
}

pub fn segments_to_html(segments: &[Segment], ctx: &SurfaceContext, mode: PlaceholderMode) -> String {
    let mut out = String::new();
    let mut path = Vec::new();
    write_segments(segments, &mut path, ctx, mode, &mut out);
    out
}

fn write_segments(
    segments: &[Segment],
    path: &mut Vec<usize>,
    ctx: &SurfaceContext,
    mode: PlaceholderMode,
    out: &mut String,
) {
    for (index, segment) in segments.iter().enumerate() {
        path.push(index);
        match segment {
            Segment::Markup { text } => out.push_str(&expand_self_closing(text)),
            Segment::Macro(m) => write_macro(m, path, ctx, mode, out),
        }
        path.pop();
    }
}

fn write_macro(
    m: &MacroSegment,
    path: &mut Vec<usize>,
    ctx: &SurfaceContext,
    mode: PlaceholderMode,
    out: &mut String,
) {
    let editable = mode == PlaceholderMode::Rich;
    match m.macro_type {
        MacroType::Diagram | MacroType::CodeDiagram => {
            let Some(record) = ctx.registry.by_path(path) else {
                debug!(name = %m.name, ?path, "diagram has no registry entry, shown as opaque macro");
                placeholder::opaque(&m.name, m.raw(), out);
                return;
            };
            let outcome = match mode {
                PlaceholderMode::Rich => None,
                PlaceholderMode::Preview => Some(
                    ctx.renders
                        .map(|cache| cache.outcome(&record.id, &record.code))
                        .unwrap_or(RenderOutcome::Pending),
                ),
            };
            let view = match &outcome {
                None => DiagramView::Source,
                Some(RenderOutcome::Pending) => DiagramView::Pending,
                Some(RenderOutcome::Rendered(markup)) => DiagramView::Rendered(markup),
                Some(RenderOutcome::Failed(message)) => DiagramView::Failed(message),
            };
            DiagramPlaceholder {
                id: &record.id,
                language: &diagram_language(m, ctx),
                original_code: &record.original_code,
                code: &record.code,
                view,
            }
            .write(out);
        }
        MacroType::Code => {
            let language = m
                .parameters
                .get(&ctx.catalog.language_parameter)
                .map(String::as_str)
                .unwrap_or_default();
            placeholder::code_block(
                language,
                m.raw(),
                m.body_text().unwrap_or_default(),
                editable,
                out,
            );
        }
        MacroType::Callout => {
            placeholder::callout_open(&m.name, m.raw(), editable, out);
            if let Some(children) = m.children() {
                write_segments(children, path, ctx, mode, out);
            }
            placeholder::callout_close(out);
        }
        MacroType::Opaque => placeholder::opaque(&m.name, m.raw(), out),
    }
}

/// Language label of a diagram: the code macro's language, or the diagram macro's name.
pub(crate) fn diagram_language(m: &MacroSegment, ctx: &SurfaceContext) -> String {
    m.parameters
        .get(&ctx.catalog.language_parameter)
        .cloned()
        .filter(|lang| !lang.trim().is_empty())
        .unwrap_or_else(|| {
            ctx.catalog
                .diagram_languages
                .first()
                .cloned()
                .unwrap_or_else(|| m.name.clone())
        })
}
