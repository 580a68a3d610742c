//! Surface trait definition
//!
//! A surface is one editable (or read-only) projection of a segment list: rich-text HTML,
//! Markdown-like plain text, a rendered preview, or the raw storage text. Every surface converts
//! segments to its textual form and, when it accepts edits, back again.

use crate::codec::{MacroCatalog, Segment};
use crate::diagrams::{DiagramRegistry, RenderCache};
use crate::error::FormatError;

/// Document state a surface needs besides the segments it converts
///
/// `segments` and `registry` describe the document the surface text was generated from. The
/// return path uses them to reunite placeholders with the macros they stand for.
#[derive(Clone, Copy)]
pub struct SurfaceContext<'a> {
    pub segments: &'a [Segment],
    pub registry: &'a DiagramRegistry,
    pub catalog: &'a MacroCatalog,
    pub renders: Option<&'a RenderCache>,
}

impl<'a> SurfaceContext<'a> {
    pub fn new(
        segments: &'a [Segment],
        registry: &'a DiagramRegistry,
        catalog: &'a MacroCatalog,
    ) -> Self {
        SurfaceContext {
            segments,
            registry,
            catalog,
            renders: None,
        }
    }

    pub fn with_renders(mut self, renders: &'a RenderCache) -> Self {
        self.renders = Some(renders);
        self
    }
}

/// Trait for editing surfaces
///
/// # Examples
///
/// ```ignore
/// struct UpperSurface;
///
/// impl Surface for UpperSurface {
///     fn name(&self) -> &str {
///         "upper"
///     }
///
///     fn to_surface(&self, segments: &[Segment], _ctx: &SurfaceContext) -> Result<String, FormatError> {
///         Ok(codec::serialize(segments).to_uppercase())
///     }
/// }
/// ```
pub trait Surface: Send + Sync {
    /// The name of this surface (e.g., "rich-text", "plain-text")
    fn name(&self) -> &str;

    /// Optional description of this surface
    fn description(&self) -> &str {
        ""
    }

    /// File extensions associated with this surface, without the leading dot
    fn file_extensions(&self) -> &[&str] {
        &[]
    }

    /// Whether users may edit the surface text directly
    fn is_editable(&self) -> bool {
        true
    }

    /// Whether the surface text is an HTML tree that selection replacement can operate on
    fn is_live(&self) -> bool {
        false
    }

    /// Convert segments into surface text
    fn to_surface(&self, segments: &[Segment], ctx: &SurfaceContext) -> Result<String, FormatError>;

    /// Convert surface text back into segments
    ///
    /// Default implementation returns NotSupported error.
    fn from_surface(&self, _content: &str, _ctx: &SurfaceContext) -> Result<Vec<Segment>, FormatError> {
        Err(FormatError::NotSupported(format!(
            "Surface '{}' does not accept edits",
            self.name()
        )))
    }
}
