//! Storage-format macro codec
//!
//!     Splits storage text into an ordered list of [`Segment`]s (markup runs and macro blocks) and
//!     joins them back. The codec is the only place that knows how macros are spelled in the
//!     storage format; surfaces and the diagram registry work on segments.
//!
//! Library Choice
//!
//!     Element boundaries are found with a small tag scanner (./scanner.rs) rather than a full XML
//!     parser: storage text uses undeclared namespace prefixes and HTML entities, and the codec must
//!     reproduce every byte it does not understand. Literal (non-CDATA) parameter and body values
//!     are decoded with roxmltree, wrapped in an element that declares the `ac`/`ri` prefixes.
//!
//! Macro Layout
//!
//!     <ac:structured-macro ac:name="mermaid" ac:macro-id="...">
//!       <ac:parameter ac:name="code">graph TD;A--&gt;B</ac:parameter>
//!       <ac:plain-text-body><![CDATA[...]]></ac:plain-text-body>
//!       <ac:rich-text-body>...nested content...</ac:rich-text-body>
//!     </ac:structured-macro>
//!
//!     Only direct children of the macro element are inspected. A rich-text body is parsed
//!     recursively, so macros nested in callouts become addressable segments of their own.
//!
//! Round Trip
//!
//!     serialize(parse(text)) == text for every input, well-formed or not. Malformed input (an
//!     unterminated CDATA section, a dangling macro tag) degrades to a single markup segment
//!     holding the whole text; [`MacroCodec::try_parse`] reports the failure instead.
//!
//!     Mutated bodies are re-emitted as CDATA inside the original raw text. New macros are
//!     written in canonical form (see [`MacroSegment::canonical_diagram`]).

pub mod catalog;
pub mod scanner;
pub mod segment;

pub use catalog::MacroCatalog;
pub use segment::{
    segment_at, segment_at_mut, visit_macros, MacroBody, MacroSegment, MacroType, Segment,
    SegmentPath,
};

use crate::error::FormatError;
use scanner::{attribute, attributes, ScanError, Scanner, TokenKind};
use segment::SlotKind;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::warn;

const MACRO_TAG: &str = "ac:structured-macro";
const PARAMETER_TAG: &str = "ac:parameter";
const PLAIN_BODY_TAG: &str = "ac:plain-text-body";
const RICH_BODY_TAG: &str = "ac:rich-text-body";

const NAMESPACES: &str = concat!(
    r#"xmlns:ac="http://www.atlassian.com/schema/confluence/4/ac/" "#,
    r#"xmlns:ri="http://www.atlassian.com/schema/confluence/4/ri/""#
);

/// Parses and serializes storage text against a [`MacroCatalog`]
#[derive(Debug, Clone, Default)]
pub struct MacroCodec {
    catalog: MacroCatalog,
}

impl MacroCodec {
    pub fn new(catalog: MacroCatalog) -> Self {
        MacroCodec { catalog }
    }

    pub fn catalog(&self) -> &MacroCatalog {
        &self.catalog
    }

    /// Parse storage text, degrading to a single markup segment on malformed input.
    pub fn parse(&self, text: &str) -> Vec<Segment> {
        parse_with(text, &self.catalog)
    }

    pub fn try_parse(&self, text: &str) -> Result<Vec<Segment>, FormatError> {
        try_parse_with(text, &self.catalog)
    }

    pub fn serialize(&self, segments: &[Segment]) -> String {
        serialize(segments)
    }
}

/// Parse with the default catalog.
pub fn parse(text: &str) -> Vec<Segment> {
    parse_with(text, &MacroCatalog::default())
}

pub fn parse_with(text: &str, catalog: &MacroCatalog) -> Vec<Segment> {
    match try_parse_with(text, catalog) {
        Ok(segments) => segments,
        Err(err) => {
            warn!(error = %err, "storage text is malformed, keeping it as one markup segment");
            vec![Segment::markup(text)]
        }
    }
}

pub fn try_parse_with(text: &str, catalog: &MacroCatalog) -> Result<Vec<Segment>, FormatError> {
    parse_segments(text, catalog).map_err(|err| FormatError::ParseError(err.to_string()))
}

pub fn serialize(segments: &[Segment]) -> String {
    let mut out = String::with_capacity(segments.len() * 64);
    segment::write_segments(segments, &mut out);
    out
}

/// Parse text that should hold exactly one macro block (surrounding whitespace allowed).
pub fn parse_macro_block(raw: &str, catalog: &MacroCatalog) -> Option<MacroSegment> {
    let segments = parse_segments(raw, catalog).ok()?;
    let mut found = None;
    for segment in segments {
        match segment {
            Segment::Macro(m) if found.is_none() => found = Some(m),
            Segment::Markup { text } if text.trim().is_empty() => {}
            _ => return None,
        }
    }
    found
}

fn parse_segments(src: &str, catalog: &MacroCatalog) -> Result<Vec<Segment>, ScanError> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    let mut depth = 0usize;
    let mut block_start = 0;

    for token in Scanner::new(src) {
        let token = token?;
        if token.is_open(MACRO_TAG) {
            if depth == 0 {
                push_markup(&mut segments, &src[cursor..token.range.start]);
                if token.is_self_closing() {
                    segments.push(Segment::Macro(build_macro(&src[token.range.clone()], catalog)?));
                    cursor = token.range.end;
                } else {
                    block_start = token.range.start;
                    depth = 1;
                }
            } else if !token.is_self_closing() {
                depth += 1;
            }
        } else if token.is_close(MACRO_TAG) {
            if depth == 0 {
                return Err(ScanError::Unbalanced {
                    offset: token.range.start,
                });
            }
            depth -= 1;
            if depth == 0 {
                let raw = &src[block_start..token.range.end];
                segments.push(Segment::Macro(build_macro(raw, catalog)?));
                cursor = token.range.end;
            }
        }
    }

    if depth > 0 {
        return Err(ScanError::Unbalanced {
            offset: block_start,
        });
    }
    push_markup(&mut segments, &src[cursor..]);
    Ok(segments)
}

fn push_markup(segments: &mut Vec<Segment>, text: &str) {
    if !text.is_empty() {
        segments.push(Segment::markup(text));
    }
}

/// Direct children of a macro element that the codec cares about
#[derive(Default)]
struct MacroChildren {
    parameters: BTreeMap<String, String>,
    parameter_ranges: BTreeMap<String, Option<Range<usize>>>,
    plain_body: Option<Option<Range<usize>>>,
    rich_body: Option<Option<Range<usize>>>,
}

fn build_macro(raw: &str, catalog: &MacroCatalog) -> Result<MacroSegment, ScanError> {
    let mut scanner = Scanner::new(raw);
    let open = match scanner.next() {
        Some(token) => token?,
        None => return Err(ScanError::Unbalanced { offset: 0 }),
    };
    let attrs = attributes(&raw[open.range.clone()]);
    let name = attribute(&attrs, "ac:name").unwrap_or_default().to_string();
    let id = attribute(&attrs, "ac:macro-id").map(str::to_string);

    let children = if open.is_self_closing() {
        MacroChildren::default()
    } else {
        let inner_end = raw.rfind("</").unwrap_or(raw.len());
        scan_children(&raw[..inner_end], open.range.end)?
    };

    let macro_type = catalog.classify(&name, &children.parameters);
    let (body, slot_kind, body_range) = match macro_type {
        MacroType::Diagram => {
            let parameter = &catalog.diagram_parameter;
            match (children.parameter_ranges.get(parameter), &children.plain_body) {
                (Some(range), _) => (
                    MacroBody::Text(children.parameters.get(parameter).cloned().unwrap_or_default()),
                    Some(SlotKind::Parameter(parameter.clone())),
                    range.clone(),
                ),
                (None, Some(range)) => (
                    MacroBody::Text(text_in(raw, range)),
                    Some(SlotKind::PlainText),
                    range.clone(),
                ),
                (None, None) => (
                    MacroBody::Text(String::new()),
                    Some(SlotKind::Parameter(parameter.clone())),
                    None,
                ),
            }
        }
        MacroType::Code | MacroType::CodeDiagram => {
            let range = children.plain_body.clone().flatten();
            (
                MacroBody::Text(text_in(raw, &range)),
                Some(SlotKind::PlainText),
                range,
            )
        }
        MacroType::Callout => match &children.rich_body {
            Some(Some(range)) => (
                MacroBody::Rich(parse_segments(&raw[range.clone()], catalog)?),
                Some(SlotKind::RichText),
                Some(range.clone()),
            ),
            _ => (MacroBody::Rich(Vec::new()), Some(SlotKind::RichText), None),
        },
        MacroType::Opaque => (MacroBody::None, None, None),
    };

    Ok(MacroSegment::from_parts(
        macro_type,
        name,
        id,
        children.parameters,
        body,
        raw.to_string(),
        slot_kind,
        body_range,
    ))
}

fn scan_children(inner: &str, start: usize) -> Result<MacroChildren, ScanError> {
    let mut children = MacroChildren::default();
    let mut scanner = Scanner::starting_at(inner, start);

    while let Some(token) = scanner.next() {
        let token = token?;
        if !matches!(token.kind, TokenKind::OpenTag { .. }) {
            continue;
        }
        let content = if token.is_self_closing() {
            None
        } else {
            Some(find_close(&mut scanner, token.name, token.range.end)?)
        };

        if token.name.eq_ignore_ascii_case(PARAMETER_TAG) {
            let attrs = attributes(&inner[token.range.clone()]);
            let name = attribute(&attrs, "ac:name").unwrap_or_default().to_string();
            let value = content
                .as_ref()
                .map(|range| decode_text(&inner[range.clone()]))
                .unwrap_or_default();
            children.parameters.insert(name.clone(), value);
            children.parameter_ranges.insert(name, content);
        } else if token.name.eq_ignore_ascii_case(PLAIN_BODY_TAG) {
            children.plain_body = Some(content);
        } else if token.name.eq_ignore_ascii_case(RICH_BODY_TAG) {
            children.rich_body = Some(content);
        }
    }
    Ok(children)
}

/// Advance past the close tag matching an already-consumed open tag named `name`.
fn find_close(scanner: &mut Scanner<'_>, name: &str, content_start: usize) -> Result<Range<usize>, ScanError> {
    let mut depth = 1usize;
    for token in scanner.by_ref() {
        let token = token?;
        if token.is_open(name) && !token.is_self_closing() {
            depth += 1;
        } else if token.is_close(name) {
            depth -= 1;
            if depth == 0 {
                return Ok(content_start..token.range.start);
            }
        }
    }
    Err(ScanError::Unbalanced {
        offset: content_start,
    })
}

fn text_in(raw: &str, range: &Option<Range<usize>>) -> String {
    range
        .as_ref()
        .map(|range| decode_text(&raw[range.clone()]))
        .unwrap_or_default()
}

/// Decode element content to text: CDATA is taken verbatim, entities are resolved.
///
/// Content holding elements (e.g. a user link inside a parameter) is returned as-is.
pub(crate) fn decode_text(content: &str) -> String {
    if !content.contains('<') && !content.contains('&') {
        return content.to_string();
    }
    let wrapped = format!("<v {NAMESPACES}>{content}</v>");
    match roxmltree::Document::parse(&wrapped) {
        Ok(doc) => {
            let root = doc.root_element();
            if root.children().any(|node| node.is_element()) {
                return content.to_string();
            }
            root.children().filter_map(|node| node.text()).collect()
        }
        Err(_) => content.to_string(),
    }
}
