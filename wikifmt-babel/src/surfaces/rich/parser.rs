//! Rich-text HTML back to segments
//!
//! Placeholders are pulled out of the tree before any normalization runs, so nothing that cleans
//! up editor markup can touch their payloads:
//!
//!     1. parse the HTML
//!     2. replace every placeholder element with a sentinel text node, rebuilding its macro
//!        (callouts recurse: their children are extracted, cleaned and split first)
//!     3. clean the tree (contenteditable, empty paragraphs)
//!     4. serialize, back to XHTML
//!     5. split on sentinels: text runs become markup, sentinels their macro segments

use crate::codec::{self, parse_macro_block, segment_at, MacroSegment, Segment};
use crate::error::FormatError;
use crate::surface::SurfaceContext;
use crate::surfaces::common::dom::{
    attr, body, create_text, has_class, parse_html, serialize_children, text_content,
};
use crate::surfaces::common::normalize::{clean_tree, to_xhtml};
use crate::surfaces::common::placeholder::{
    self, SentinelPiece, CALLOUT_CLASS, CODE_CLASS, DIAGRAM_CLASS, DIAGRAM_CODE, DIAGRAM_EDIT,
    DIAGRAM_ID, LANGUAGE, MACRO_CLASS, MACRO_RAW, MARKUP, MARKUP_CLASS,
};
use markup5ever_rcdom::Handle;
use tracing::{debug, warn};

pub fn html_to_segments(html: &str, ctx: &SurfaceContext) -> Result<Vec<Segment>, FormatError> {
    // Step 1: HTML string → DOM
    let dom = parse_html(html);
    let body = body(&dom)
        .ok_or_else(|| FormatError::ParseError("HTML document has no body".to_string()))?;

    // Step 2: placeholders → sentinels
    let mut slots = Vec::new();
    extract_placeholders(&body, ctx, &mut slots)?;

    // Steps 3-5
    content_to_segments(&body, &mut slots)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Diagram,
    Code,
    Callout,
    Opaque,
    Markup,
}

fn classify(node: &Handle) -> Option<Placeholder> {
    if has_class(node, DIAGRAM_CLASS) {
        Some(Placeholder::Diagram)
    } else if has_class(node, CODE_CLASS) {
        Some(Placeholder::Code)
    } else if has_class(node, CALLOUT_CLASS) {
        Some(Placeholder::Callout)
    } else if has_class(node, MACRO_CLASS) {
        Some(Placeholder::Opaque)
    } else if has_class(node, MARKUP_CLASS) {
        Some(Placeholder::Markup)
    } else {
        None
    }
}

fn extract_placeholders(
    node: &Handle,
    ctx: &SurfaceContext,
    slots: &mut Vec<Option<Segment>>,
) -> Result<(), FormatError> {
    let children: Vec<Handle> = node.children.borrow().clone();
    for (index, child) in children.iter().enumerate() {
        let Some(kind) = classify(child) else {
            extract_placeholders(child, ctx, slots)?;
            continue;
        };
        let segment = match kind {
            Placeholder::Diagram => diagram_segment(child, ctx),
            Placeholder::Code => code_segment(child, ctx),
            Placeholder::Opaque => raw_segment(child, ctx),
            Placeholder::Markup => Segment::markup(
                attr(child, MARKUP)
                    .map(|value| placeholder::decode(&value))
                    .unwrap_or_default(),
            ),
            Placeholder::Callout => {
                extract_placeholders(child, ctx, slots)?;
                let body = content_to_segments(child, slots)?;
                callout_segment(child, body, ctx)
            }
        };
        slots.push(Some(segment));
        let marker = create_text(&placeholder::sentinel(slots.len() - 1));
        node.children.borrow_mut()[index] = marker;
    }
    Ok(())
}

fn content_to_segments(
    node: &Handle,
    slots: &mut [Option<Segment>],
) -> Result<Vec<Segment>, FormatError> {
    clean_tree(node);
    let html = serialize_children(node)?;
    let html = to_xhtml(&html);

    let mut segments = Vec::new();
    let mut markup = String::new();
    for piece in placeholder::split_sentinels(&html) {
        match piece {
            SentinelPiece::Text(text) => markup.push_str(text),
            SentinelPiece::Slot(index) => match slots.get_mut(index).and_then(Option::take) {
                Some(Segment::Markup { text }) => markup.push_str(&text),
                Some(segment) => {
                    if !markup.is_empty() {
                        segments.push(Segment::markup(std::mem::take(&mut markup)));
                    }
                    segments.push(segment);
                }
                None => warn!(index, "sentinel without a placeholder, dropped"),
            },
        }
    }
    if !markup.is_empty() {
        segments.push(Segment::markup(markup));
    }
    Ok(segments)
}

fn diagram_segment(node: &Handle, ctx: &SurfaceContext) -> Segment {
    let id = attr(node, DIAGRAM_ID).unwrap_or_default();
    let edited = attr(node, DIAGRAM_EDIT).map(|value| placeholder::decode(&value));

    if let Some(record) = ctx.registry.get(&id) {
        let owner = segment_at(ctx.segments, &record.owner_segment_index)
            .and_then(Segment::as_macro)
            .filter(|m| m.macro_type.is_diagram());
        if let Some(m) = owner {
            let mut m = m.clone();
            m.set_text_body(edited.as_deref().unwrap_or(&record.code));
            return Segment::Macro(m);
        }
        warn!(%id, "registry entry does not point at a diagram, rebuilding it");
    }

    debug!(%id, "diagram placeholder without registry entry, creating canonical macro");
    let code = edited
        .or_else(|| attr(node, DIAGRAM_CODE).map(|value| placeholder::decode(&value)))
        .unwrap_or_default();
    let language = attr(node, LANGUAGE).unwrap_or_default();
    new_diagram(&language, &code, ctx)
}

pub(crate) fn new_diagram(language: &str, code: &str, ctx: &SurfaceContext) -> Segment {
    let catalog = ctx.catalog;
    if catalog.diagram_macros.is_empty() {
        return Segment::Macro(MacroSegment::canonical_code(
            catalog.default_code_macro(),
            &catalog.language_parameter,
            language,
            code,
        ));
    }
    Segment::Macro(MacroSegment::canonical_diagram(
        catalog.default_diagram_macro(),
        &catalog.diagram_parameter,
        code,
    ))
}

fn code_segment(node: &Handle, ctx: &SurfaceContext) -> Segment {
    let code = text_content(node);
    match macro_from_raw(node, ctx) {
        Some(mut m) => {
            m.set_text_body(&code);
            Segment::Macro(m)
        }
        None => {
            let language = attr(node, LANGUAGE).unwrap_or_default();
            Segment::Macro(MacroSegment::canonical_code(
                ctx.catalog.default_code_macro(),
                &ctx.catalog.language_parameter,
                &language,
                &code,
            ))
        }
    }
}

fn callout_segment(node: &Handle, body: Vec<Segment>, ctx: &SurfaceContext) -> Segment {
    match macro_from_raw(node, ctx) {
        Some(mut m) => {
            m.set_rich_body(body);
            Segment::Macro(m)
        }
        None => {
            warn!("callout placeholder lost its macro, keeping its content only");
            Segment::markup(codec::serialize(&body))
        }
    }
}

fn raw_segment(node: &Handle, ctx: &SurfaceContext) -> Segment {
    let raw = attr(node, MACRO_RAW)
        .map(|value| placeholder::decode(&value))
        .unwrap_or_default();
    match parse_macro_block(&raw, ctx.catalog) {
        Some(m) => Segment::Macro(m),
        None => Segment::markup(raw),
    }
}

fn macro_from_raw(node: &Handle, ctx: &SurfaceContext) -> Option<MacroSegment> {
    let raw = placeholder::decode(&attr(node, MACRO_RAW)?);
    parse_macro_block(&raw, ctx.catalog)
}
