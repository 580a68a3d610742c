//! Shared configuration loader for the wikifmt toolchain.
//!
//! `defaults/wikifmt.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`WikifmtConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;
use wikifmt_babel::{MacroCatalog, SanitizePolicy, SelectionRules, SessionOptions};

const DEFAULT_TOML: &str = include_str!("../defaults/wikifmt.default.toml");

/// Top-level configuration consumed by wikifmt applications.
#[derive(Debug, Clone, Deserialize)]
pub struct WikifmtConfig {
    pub macros: MacrosConfig,
    pub selection: SelectionConfig,
    pub sanitize: SanitizeConfig,
    pub surface: SurfaceConfig,
}

/// Mirrors the classification tables of the macro codec.
#[derive(Debug, Clone, Deserialize)]
pub struct MacrosConfig {
    pub diagram_macros: Vec<String>,
    pub diagram_parameter: String,
    pub code_macros: Vec<String>,
    pub language_parameter: String,
    pub diagram_languages: Vec<String>,
    pub callout_macros: Vec<String>,
}

impl From<MacrosConfig> for MacroCatalog {
    fn from(config: MacrosConfig) -> Self {
        MacroCatalog {
            diagram_macros: config.diagram_macros,
            diagram_parameter: config.diagram_parameter,
            code_macros: config.code_macros,
            language_parameter: config.language_parameter,
            diagram_languages: config.diagram_languages,
            callout_macros: config.callout_macros,
        }
    }
}

impl From<&MacrosConfig> for MacroCatalog {
    fn from(config: &MacrosConfig) -> Self {
        config.clone().into()
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SelectionConfig {
    pub min_selection_chars: usize,
    pub context_chars: usize,
}

impl From<SelectionConfig> for SelectionRules {
    fn from(config: SelectionConfig) -> Self {
        SelectionRules {
            min_selection_chars: config.min_selection_chars,
            context_chars: config.context_chars,
        }
    }
}

/// Tag lists for sanitizing fragments returned by the edit service.
#[derive(Debug, Clone, Deserialize)]
pub struct SanitizeConfig {
    pub allowed_tags: Vec<String>,
    pub dropped_tags: Vec<String>,
}

impl From<SanitizeConfig> for SanitizePolicy {
    fn from(config: SanitizeConfig) -> Self {
        SanitizePolicy {
            allowed_tags: config.allowed_tags,
            dropped_tags: config.dropped_tags,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceConfig {
    pub default: String,
}

impl WikifmtConfig {
    pub fn catalog(&self) -> MacroCatalog {
        (&self.macros).into()
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            catalog: self.catalog(),
            rules: self.selection.into(),
            policy: self.sanitize.clone().into(),
            surface: self.surface.default.clone(),
        }
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<WikifmtConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<WikifmtConfig, ConfigError> {
    Loader::new().build()
}
