//! Raw storage text surface
//!
//! Shows the storage text exactly as stored. This is the only surface offered for documents the
//! codec could not split into segments.

use crate::codec::{self, Segment};
use crate::error::FormatError;
use crate::surface::{Surface, SurfaceContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct SourceSurface;

impl Surface for SourceSurface {
    fn name(&self) -> &str {
        "source"
    }

    fn description(&self) -> &str {
        "Storage-format XHTML, byte for byte"
    }

    fn file_extensions(&self) -> &[&str] {
        &["xml", "storage"]
    }

    fn to_surface(&self, segments: &[Segment], _ctx: &SurfaceContext) -> Result<String, FormatError> {
        Ok(codec::serialize(segments))
    }

    fn from_surface(&self, content: &str, ctx: &SurfaceContext) -> Result<Vec<Segment>, FormatError> {
        Ok(codec::parse_with(content, ctx.catalog))
    }
}
