//! Placeholder markup for macros on HTML surfaces
//!
//! | Macro        | Placeholder                                                   |
//! |--------------|---------------------------------------------------------------|
//! | diagram      | `<span class="wf-diagram" data-diagram-id data-diagram-code>` |
//! | code         | `<pre class="wf-code" data-language data-macro-raw>`          |
//! | callout      | `<div class="wf-callout" data-macro-name data-macro-raw>`     |
//! | anything else| `<span class="wf-macro" data-macro-name data-macro-raw>`      |
//!
//! The plain-text surface adds one more, `<span|div class="wf-markup" data-markup>`, for storage
//! elements Markdown cannot spell (namespaced tags). It holds markup, not a macro.
//!
//! Payload attributes are form-urlencoded so they survive any HTML normalization. Diagrams carry
//! only their id and original code; the live code is shown inside the placeholder and the full
//! macro is recovered through the diagram registry.

use super::dom::{attr, escape_attr, escape_text, has_class};
use markup5ever_rcdom::Handle;
use url::form_urlencoded;

pub const DIAGRAM_CLASS: &str = "wf-diagram";
pub const CODE_CLASS: &str = "wf-code";
pub const CALLOUT_CLASS: &str = "wf-callout";
pub const MACRO_CLASS: &str = "wf-macro";
pub const MARKUP_CLASS: &str = "wf-markup";

pub const DIAGRAM_ID: &str = "data-diagram-id";
pub const DIAGRAM_CODE: &str = "data-diagram-code";
/// Inline code edited on a surface that cannot show the live code in the element body
pub const DIAGRAM_EDIT: &str = "data-diagram-edit";
pub const LANGUAGE: &str = "data-language";
pub const MACRO_NAME: &str = "data-macro-name";
pub const MACRO_RAW: &str = "data-macro-raw";
pub const MARKUP: &str = "data-markup";

pub const RENDER_CLASS: &str = "wf-diagram-render";
pub const ERROR_CLASS: &str = "wf-diagram-error";
pub const PENDING_CLASS: &str = "wf-diagram-pending";
pub const SOURCE_CLASS: &str = "wf-diagram-source";

/// Element standing in for a macro (or carried markup) on an HTML surface
pub fn is_placeholder(node: &Handle) -> bool {
    [DIAGRAM_CLASS, CODE_CLASS, CALLOUT_CLASS, MACRO_CLASS, MARKUP_CLASS]
        .iter()
        .any(|class| has_class(node, class))
}

/// Element the host must not edit inside
pub fn is_locked(node: &Handle) -> bool {
    attr(node, "contenteditable").as_deref() == Some("false")
}

pub fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn decode(value: &str) -> String {
    form_urlencoded::parse(value.as_bytes())
        .map(|(key, _)| key.into_owned())
        .next()
        .unwrap_or_default()
}

/// What a diagram placeholder shows above its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramView<'a> {
    Source,
    Pending,
    Rendered(&'a str),
    Failed(&'a str),
}

pub struct DiagramPlaceholder<'a> {
    pub id: &'a str,
    pub language: &'a str,
    pub original_code: &'a str,
    pub code: &'a str,
    pub view: DiagramView<'a>,
}

impl DiagramPlaceholder<'_> {
    pub fn write(&self, out: &mut String) {
        out.push_str(&format!(
            "<span class=\"{DIAGRAM_CLASS}\" {DIAGRAM_ID}=\"{}\" {LANGUAGE}=\"{}\" {DIAGRAM_CODE}=\"{}\" contenteditable=\"false\">",
            escape_attr(self.id),
            escape_attr(self.language),
            encode(self.original_code)
        ));
        out.push_str(&view_markup(self.view));
        out.push_str(&format!(
            "<code class=\"{SOURCE_CLASS}\">{}</code></span>",
            escape_text(self.code)
        ));
    }
}

/// Inner markup for a diagram view; empty for the plain source view.
pub fn view_markup(view: DiagramView<'_>) -> String {
    match view {
        DiagramView::Source => String::new(),
        DiagramView::Pending => {
            format!("<span class=\"{PENDING_CLASS}\">Rendering diagram</span>")
        }
        DiagramView::Rendered(markup) => format!("<span class=\"{RENDER_CLASS}\">{markup}</span>"),
        DiagramView::Failed(message) => format!(
            "<span class=\"{ERROR_CLASS}\">{}</span>",
            escape_text(message)
        ),
    }
}

/// Diagram placeholder coming back from the plain-text surface, edited code inline.
pub fn diagram_edit(id: &str, encoded_original: &str, language: &str, code: &str) -> String {
    format!(
        "<span class=\"{DIAGRAM_CLASS}\" {DIAGRAM_ID}=\"{}\" {LANGUAGE}=\"{}\" {DIAGRAM_CODE}=\"{}\" {DIAGRAM_EDIT}=\"{}\"></span>",
        escape_attr(id),
        escape_attr(language),
        escape_attr(encoded_original),
        encode(code)
    )
}

pub fn code_block(language: &str, raw: &str, code: &str, editable: bool, out: &mut String) {
    out.push_str(&format!(
        "<pre class=\"{CODE_CLASS}\" {LANGUAGE}=\"{}\" {MACRO_RAW}=\"{}\"{}>",
        escape_attr(language),
        encode(raw),
        lock(editable)
    ));
    // The HTML parser drops one newline directly after <pre>.
    if code.starts_with('\n') {
        out.push('\n');
    }
    out.push_str(&escape_text(code));
    out.push_str("</pre>");
}

pub fn callout_open(name: &str, raw: &str, editable: bool, out: &mut String) {
    out.push_str(&format!(
        "<div class=\"{CALLOUT_CLASS}\" {MACRO_NAME}=\"{}\" {MACRO_RAW}=\"{}\"{}>",
        escape_attr(name),
        encode(raw),
        lock(editable)
    ));
}

pub fn callout_close(out: &mut String) {
    out.push_str("</div>");
}

pub fn opaque(name: &str, raw: &str, out: &mut String) {
    out.push_str(&format!(
        "<span class=\"{MACRO_CLASS}\" {MACRO_NAME}=\"{}\" {MACRO_RAW}=\"{}\" contenteditable=\"false\">[{}]</span>",
        escape_attr(name),
        encode(raw),
        escape_text(name)
    ));
}

/// Carrier for raw storage markup; `block` picks a `div` so Markdown keeps it out of paragraphs.
pub fn markup(raw: &str, block: bool) -> String {
    let tag = if block { "div" } else { "span" };
    format!(
        "<{tag} class=\"{MARKUP_CLASS}\" {MARKUP}=\"{}\"></{tag}>",
        encode(raw)
    )
}

fn lock(editable: bool) -> &'static str {
    if editable {
        ""
    } else {
        " contenteditable=\"false\""
    }
}

/// Marker standing in for an extracted placeholder while the tree is normalized
pub fn sentinel(index: usize) -> String {
    format!("{SENTINEL_OPEN}{index}{SENTINEL_CLOSE}")
}

const SENTINEL_OPEN: char = '\u{E000}';
const SENTINEL_CLOSE: char = '\u{E001}';

/// Split text on sentinels, yielding text runs and slot indices in order.
pub fn split_sentinels(text: &str) -> Vec<SentinelPiece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find(SENTINEL_OPEN) {
        let after = &rest[open + SENTINEL_OPEN.len_utf8()..];
        let Some(close) = after.find(SENTINEL_CLOSE) else {
            break;
        };
        let end = open + SENTINEL_OPEN.len_utf8() + close + SENTINEL_CLOSE.len_utf8();
        match after[..close].parse::<usize>() {
            Ok(index) => {
                if open > 0 {
                    pieces.push(SentinelPiece::Text(&rest[..open]));
                }
                pieces.push(SentinelPiece::Slot(index));
            }
            Err(_) => pieces.push(SentinelPiece::Text(&rest[..end])),
        }
        rest = &rest[end..];
    }
    if !rest.is_empty() {
        pieces.push(SentinelPiece::Text(rest));
    }
    pieces
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelPiece<'a> {
    Text(&'a str),
    Slot(usize),
}
