//! Plain-text surface
//!
//!     CommonMark for a plain text editor, produced and read with comrak.
//!
//! Library Choice
//!
//!     Markdown is written by building a Comrak AST and letting `format_commonmark` do the
//!     escaping; it is read back with comrak's parser and re-rendered as HTML, which then goes
//!     through the rich-text parser. Both directions stay inside one well-tested CommonMark
//!     implementation.
//!
//! Macro Layout
//!
//!     Macros become blocks whose text is the part a writer edits:
//!
//!         diagram   ```{language} wf-diagram {id} {encoded original source}
//!                   live source
//!                   ```
//!         code      ```{language} wf-code {encoded macro}
//!                   code
//!                   ```
//!         opaque    ```xml wf-macro {name}
//!                   the macro's storage text
//!                   ```
//!         callout   <!-- wf-callout {name} {encoded macro} -->
//!                   body as Markdown
//!                   <!-- /wf-callout -->
//!
//!     A new fence in a diagram language (e.g. ```` ```mermaid ````) becomes a new diagram, any
//!     other fence with a language a new code macro. Storage elements with namespaced tags (links,
//!     images, task lists…) are carried in `wf-markup` HTML spans.
//!
//! Lossy Conversions
//!
//!     Inline diagrams and opaque macros split their paragraph. Markup not expressible in
//!     Markdown (attributes on paragraphs, table cell spans, ragged rows) is normalized.

pub mod parser;
pub mod serializer;

use crate::codec::Segment;
use crate::error::FormatError;
use crate::surface::{Surface, SurfaceContext};
use comrak::ComrakOptions;

pub(crate) const DIAGRAM_MARKER: &str = "wf-diagram";
pub(crate) const CODE_MARKER: &str = "wf-code";
pub(crate) const OPAQUE_MARKER: &str = "wf-macro";
pub(crate) const CALLOUT_MARKER: &str = "wf-callout";
pub(crate) const CALLOUT_CLOSE: &str = "<!-- /wf-callout -->";

fn default_comrak_options() -> ComrakOptions<'static> {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    // Placeholders and storage markup travel as raw HTML
    options.render.unsafe_ = true;
    options
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSurface;

impl Surface for PlainTextSurface {
    fn name(&self) -> &str {
        "plain-text"
    }

    fn description(&self) -> &str {
        "CommonMark with macros as fenced blocks"
    }

    fn file_extensions(&self) -> &[&str] {
        &["md", "markdown"]
    }

    fn to_surface(&self, segments: &[Segment], ctx: &SurfaceContext) -> Result<String, FormatError> {
        serializer::segments_to_markdown(segments, ctx)
    }

    fn from_surface(&self, content: &str, ctx: &SurfaceContext) -> Result<Vec<Segment>, FormatError> {
        parser::markdown_to_segments(content, ctx)
    }
}
