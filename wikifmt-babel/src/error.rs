//! Error types for codec, surface and selection operations

use std::fmt;

/// Errors that can occur while transcoding or editing a document
#[derive(Debug, Clone, PartialEq)]
pub enum FormatError {
    /// Surface not found in registry
    SurfaceNotFound(String),
    /// Error during parsing
    ParseError(String),
    /// Error during serialization
    SerializationError(String),
    /// Operation not supported by the surface or session state
    NotSupported(String),
    /// A registered diagram could not be located in the segment list
    DiagramMismatch { id: String, reason: String },
    /// The external renderer rejected a diagram source
    RenderFailure { id: String, message: String },
    /// Neither the anchor nor the text fallback located the selected text
    ReplacementNotFound(String),
    /// The selection range or replacer state does not allow the operation
    InvalidSelection(String),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::SurfaceNotFound(name) => write!(f, "Surface '{name}' not found"),
            FormatError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            FormatError::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            FormatError::NotSupported(msg) => write!(f, "Operation not supported: {msg}"),
            FormatError::DiagramMismatch { id, reason } => {
                write!(f, "Diagram '{id}' could not be applied: {reason}")
            }
            FormatError::RenderFailure { id, message } => {
                write!(f, "Diagram '{id}' failed to render: {message}")
            }
            FormatError::ReplacementNotFound(text) => {
                write!(f, "Selected text not found in document: {text:?}")
            }
            FormatError::InvalidSelection(msg) => write!(f, "Invalid selection: {msg}"),
        }
    }
}

impl std::error::Error for FormatError {}
