//! Rich-text surface
//!
//!     HTML for a contenteditable host. Storage markup is passed through as HTML; macros are
//!     replaced by placeholders that carry enough to rebuild them exactly.
//!
//! Library Choice
//!
//!     We use the `html5ever` + `markup5ever_rcdom` pair for the return path: the host hands back
//!     whatever its editor produced, and a browser-grade parser is the only sane way to read that.
//!     Going out, placeholders are written as strings (see ../common/placeholder.rs); markup
//!     segments are already HTML.
//!
//! Mapping Table
//!
//!     Storage                      | Rich text
//!     -----------------------------|------------------------------------------------
//!     markup                       | markup (self-closing non-void tags expanded)
//!     diagram / code-diagram macro | <span class="wf-diagram"> with the live code
//!     code macro                   | <pre class="wf-code"> with the code as text
//!     callout macro                | <div class="wf-callout"> wrapping its body
//!     other macros                 | <span class="wf-macro"> locked label
//!
//! Lossy Conversions
//!
//!     Markup comes back the way html5ever serializes it: entities may be spelled differently,
//!     attribute quoting is normalized, implied elements (e.g. `<tbody>`) appear. Macro bytes are
//!     never affected; an unchanged macro is written back exactly as it was read.

pub mod parser;
pub mod serializer;

use crate::codec::Segment;
use crate::error::FormatError;
use crate::surface::{Surface, SurfaceContext};
use serializer::PlaceholderMode;

#[derive(Debug, Clone, Copy, Default)]
pub struct RichTextSurface;

impl Surface for RichTextSurface {
    fn name(&self) -> &str {
        "rich-text"
    }

    fn description(&self) -> &str {
        "HTML with macro placeholders for contenteditable hosts"
    }

    fn file_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }

    fn is_live(&self) -> bool {
        true
    }

    fn to_surface(&self, segments: &[Segment], ctx: &SurfaceContext) -> Result<String, FormatError> {
        Ok(serializer::segments_to_html(segments, ctx, PlaceholderMode::Rich))
    }

    fn from_surface(&self, content: &str, ctx: &SurfaceContext) -> Result<Vec<Segment>, FormatError> {
        parser::html_to_segments(content, ctx)
    }
}
