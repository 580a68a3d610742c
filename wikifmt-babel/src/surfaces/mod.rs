//! Surface implementations
//!
//! Each surface lives in its own module and implements the [`crate::surface::Surface`] trait.
//!
//!     source/     raw storage text, the fallback for documents the codec cannot split
//!     rich/       rich-text HTML with macro placeholders (editable)
//!     plain/      Markdown with fenced placeholders (editable, lossy for layout)
//!     preview/    rich-text HTML with rendered diagrams (read-only)
//!     common/     rcdom helpers, placeholder markup, HTML normalization

pub mod common;
pub mod plain;
pub mod preview;
pub mod rich;
pub mod source;
