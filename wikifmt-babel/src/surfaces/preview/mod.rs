//! Preview surface
//!
//! Same layout as the rich-text surface, with every placeholder locked and each diagram showing
//! its render (or the renderer's error, or a pending notice) above its source. Rendering itself
//! happens elsewhere; this surface only reads the [`crate::diagrams::RenderCache`] passed in the
//! context.
//!
//! The preview is not typed into, but selection replacement may still rewrite its text, so the
//! return path is the rich-text one.

use crate::codec::Segment;
use crate::error::FormatError;
use crate::surface::{Surface, SurfaceContext};
use crate::surfaces::rich::parser;
use crate::surfaces::rich::serializer::{segments_to_html, PlaceholderMode};

#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewSurface;

impl Surface for PreviewSurface {
    fn name(&self) -> &str {
        "preview"
    }

    fn description(&self) -> &str {
        "Read-only HTML with rendered diagrams"
    }

    fn is_editable(&self) -> bool {
        false
    }

    fn is_live(&self) -> bool {
        true
    }

    fn to_surface(&self, segments: &[Segment], ctx: &SurfaceContext) -> Result<String, FormatError> {
        Ok(segments_to_html(segments, ctx, PlaceholderMode::Preview))
    }

    fn from_surface(&self, content: &str, ctx: &SurfaceContext) -> Result<Vec<Segment>, FormatError> {
        parser::html_to_segments(content, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{self, MacroCatalog};
    use crate::diagrams::{DiagramRegistry, RenderCache, RenderOutcome};

    const STORAGE: &str = concat!(
        r#"<p>Intro</p>"#,
        r#"<ac:structured-macro ac:name="mermaid"><ac:parameter ac:name="code">graph TD;A</ac:parameter></ac:structured-macro>"#,
        r#"<ac:structured-macro ac:name="mermaid"><ac:parameter ac:name="code">oops</ac:parameter></ac:structured-macro>"#,
        r#"<ac:structured-macro ac:name="mermaid"><ac:parameter ac:name="code">graph TD;C</ac:parameter></ac:structured-macro>"#,
    );

    #[test]
    fn test_preview_shows_render_error_and_pending() {
        let catalog = MacroCatalog::default();
        let segments = codec::parse(STORAGE);
        let registry = DiagramRegistry::register(&segments);
        let mut cache = RenderCache::new();
        cache.store("diagram-0", "graph TD;A", RenderOutcome::Rendered("<svg id=\"a\"></svg>".into()));
        cache.store("diagram-1", "oops", RenderOutcome::Failed("Parse error on line 1".into()));
        let ctx = SurfaceContext::new(&segments, &registry, &catalog).with_renders(&cache);

        let html = PreviewSurface.to_surface(&segments, &ctx).unwrap();
        assert!(html.contains("<span class=\"wf-diagram-render\"><svg id=\"a\"></svg></span>"));
        assert!(html.contains("<span class=\"wf-diagram-error\">Parse error on line 1</span>"));
        assert!(html.contains("wf-diagram-pending"));
        assert!(html.contains("graph TD;C"));
    }

    #[test]
    fn test_preview_reads_back_without_render_markup() {
        let catalog = MacroCatalog::default();
        let segments = codec::parse(STORAGE);
        let registry = DiagramRegistry::register(&segments);
        let mut cache = RenderCache::new();
        cache.store("diagram-0", "graph TD;A", RenderOutcome::Rendered("<svg></svg>".into()));
        let ctx = SurfaceContext::new(&segments, &registry, &catalog).with_renders(&cache);

        let html = PreviewSurface.to_surface(&segments, &ctx).unwrap();
        let back = PreviewSurface.from_surface(&html, &ctx).unwrap();
        assert_eq!(codec::serialize(&back), STORAGE);
        assert!(!PreviewSurface.is_editable());
    }
}
