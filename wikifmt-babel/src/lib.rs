//! Storage-format transcoding and diagram synchronization for wiki pages
//!
//!     This crate keeps one wiki page in its storage format (XHTML with `ac:structured-macro`
//!     blocks) while it is shown and edited through several surfaces: rich-text HTML,
//!     Markdown-like plain text, a rendered preview, and the raw source.
//!
//!     TLDR: For surface authors:
//!         - Surfaces never see storage text, they see segments (./codec/segment.rs)
//!         - Macros travel through a surface as placeholders and come back byte for byte unless
//!           their body was edited
//!         - Diagrams are addressed by registry id and segment path, never by their source text
//!         - Each surface has unit tests for its layout and round trip, plus the kitchensink
//!           fixture under tests/
//!
//! Architecture
//!
//!     The codec (./codec/mod.rs) is the only module that knows how macros are spelled. It turns
//!     storage text into a flat list of markup runs and macro segments, nesting only where a
//!     macro has a rich-text body. Everything else (the diagram registry, the surfaces, the edit
//!     session) operates on that list and hands it back to the codec to serialize.
//!
//!     This is a pure lib: it powers wikifmt-cli but is shell agnostic. No code here prints,
//!     reads env vars or touches the filesystem. Notifications go through ./events.rs.
//!
//!     The file structure :
//!     .
//!     ├── error.rs
//!     ├── codec                   # Storage text <-> segments
//!     ├── diagrams                # Diagram registry, render queue and cache
//!     ├── surface.rs              # Surface trait definition
//!     ├── registry.rs             # SurfaceRegistry for discovery and selection
//!     ├── surfaces
//!     │   ├── <surface>
//!     │   │   ├── parser.rs       # Surface text -> segments
//!     │   │   ├── serializer.rs   # Segments -> surface text
//!     │   │   └── mod.rs
//!     │   └── common              # Placeholders, DOM helpers, normalization
//!     ├── selection               # Selection replacement state machine
//!     ├── events.rs
//!     ├── snapshot.rs
//!     └── session.rs              # Ties it together for one open document
//!
//! Testing
//!     tests
//!     └── <area>
//!         ├── <testname>.rs
//!         └── fixtures
//!
//!     Note that rust does not by default discover tests in subdirectories, so we need to include
//!     these in the mod (see tests/lib.rs).
//!
//! Library Choices
//!
//!     HTML is parsed with html5ever into an rcdom tree; Markdown is parsed and written by comrak.
//!     We never write a serializer for either, we build their trees and let them print.
//!     Attribute payloads are encoded with url's form_urlencoded. Literal XML values are decoded
//!     with roxmltree.
//!
pub mod codec;
pub mod diagrams;
pub mod error;
pub mod events;
pub mod registry;
pub mod selection;
pub mod session;
pub mod snapshot;
pub mod surface;
pub mod surfaces;

pub use codec::{MacroCatalog, MacroCodec, MacroSegment, MacroType, Segment};
pub use diagrams::{DiagramRecord, DiagramRegistry, DiagramRenderer, RenderCache, RenderQueue};
pub use error::FormatError;
pub use events::{EditorEvent, EventLog, EventSink, NullSink};
pub use registry::SurfaceRegistry;
pub use selection::sanitize::SanitizePolicy;
pub use selection::{EditRequest, EditResponse, SelectionReplacer, SelectionRules};
pub use session::{EditSession, SessionOptions};
pub use snapshot::VersionSnapshot;
pub use surface::{Surface, SurfaceContext};

/// Parse storage text and return it to its exact bytes, the law every document must satisfy.
pub fn roundtrip_holds(text: &str, catalog: &MacroCatalog) -> bool {
    codec::serialize(&codec::parse_with(text, catalog)) == text
}
