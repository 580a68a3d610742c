//! Surface registry for surface discovery and selection
//!
//! This module provides a centralized registry for all available surfaces.
//! Surfaces can be registered and retrieved by name.

use crate::codec::Segment;
use crate::error::FormatError;
use crate::surface::{Surface, SurfaceContext};
use std::collections::HashMap;

/// Registry of editing surfaces
///
/// # Examples
///
/// ```ignore
/// let registry = SurfaceRegistry::default();
/// let html = registry.to_surface(&segments, "rich-text", &ctx)?;
/// let segments = registry.from_surface(&html, "rich-text", &ctx)?;
/// ```
pub struct SurfaceRegistry {
    surfaces: HashMap<String, Box<dyn Surface>>,
}

impl SurfaceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        SurfaceRegistry {
            surfaces: HashMap::new(),
        }
    }

    /// Register a surface
    ///
    /// If a surface with the same name already exists, it will be replaced.
    pub fn register<S: Surface + 'static>(&mut self, surface: S) {
        self.surfaces
            .insert(surface.name().to_string(), Box::new(surface));
    }

    /// Get a surface by name
    pub fn get(&self, name: &str) -> Result<&dyn Surface, FormatError> {
        self.surfaces
            .get(name)
            .map(|s| s.as_ref())
            .ok_or_else(|| FormatError::SurfaceNotFound(name.to_string()))
    }

    /// Check if a surface exists
    pub fn has(&self, name: &str) -> bool {
        self.surfaces.contains_key(name)
    }

    /// List all available surface names (sorted)
    pub fn list_surfaces(&self) -> Vec<String> {
        let mut names: Vec<_> = self.surfaces.keys().cloned().collect();
        names.sort();
        names
    }

    /// Detect surface from filename based on file extension
    ///
    /// ```ignore
    /// let registry = SurfaceRegistry::default();
    /// assert_eq!(registry.detect_surface_from_filename("page.md"), Some("plain-text".to_string()));
    /// assert_eq!(registry.detect_surface_from_filename("page.unknown"), None);
    /// ```
    pub fn detect_surface_from_filename(&self, filename: &str) -> Option<String> {
        let extension = std::path::Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())?;

        for surface in self.surfaces.values() {
            if surface.file_extensions().contains(&extension) {
                return Some(surface.name().to_string());
            }
        }

        None
    }

    /// Convert segments using the specified surface
    pub fn to_surface(
        &self,
        segments: &[Segment],
        surface: &str,
        ctx: &SurfaceContext,
    ) -> Result<String, FormatError> {
        self.get(surface)?.to_surface(segments, ctx)
    }

    /// Convert surface text back into segments using the specified surface
    pub fn from_surface(
        &self,
        content: &str,
        surface: &str,
        ctx: &SurfaceContext,
    ) -> Result<Vec<Segment>, FormatError> {
        self.get(surface)?.from_surface(content, ctx)
    }

    /// Create a registry with default surfaces
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        // Register built-in surfaces
        registry.register(crate::surfaces::source::SourceSurface);
        registry.register(crate::surfaces::rich::RichTextSurface);
        registry.register(crate::surfaces::plain::PlainTextSurface);
        registry.register(crate::surfaces::preview::PreviewSurface);

        registry
    }
}

impl Default for SurfaceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
