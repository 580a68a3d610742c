//! Markdown back to segments
//!
//! Pipeline: Markdown string → Comrak AST → marker blocks rewritten as rich-text placeholders →
//! HTML → rich-text parser
//!
//! Fences and comments carrying a marker are turned back into the placeholder they came from.
//! A new fence in a diagram language becomes a new diagram; any other fence with a language
//! becomes a new code macro.

use super::{
    default_comrak_options, CALLOUT_CLOSE, CALLOUT_MARKER, CODE_MARKER, DIAGRAM_MARKER,
    OPAQUE_MARKER,
};
use crate::codec::Segment;
use crate::error::FormatError;
use crate::surface::SurfaceContext;
use crate::surfaces::common::dom::escape_text;
use crate::surfaces::common::placeholder;
use crate::surfaces::rich::parser::html_to_segments;
use comrak::nodes::{AstNode, NodeCodeBlock, NodeHtmlBlock, NodeValue};
use comrak::{format_html, parse_document, Arena};
use tracing::debug;

/// Comment comrak writes between two adjacent lists
const END_LIST: &str = "<!-- end list -->";

pub fn markdown_to_segments(source: &str, ctx: &SurfaceContext) -> Result<Vec<Segment>, FormatError> {
    // Step 1: Markdown string → Comrak AST
    let arena = Arena::new();
    let options = default_comrak_options();
    let root = parse_document(&arena, source, &options);

    // Step 2: marker blocks → placeholders
    rewrite_markers(root, ctx);

    // Step 3: Comrak AST → HTML
    let mut output = Vec::new();
    format_html(root, &options, &mut output)
        .map_err(|e| FormatError::ParseError(format!("Comrak HTML rendering failed: {e}")))?;
    let html = String::from_utf8(output)
        .map_err(|e| FormatError::ParseError(format!("UTF-8 conversion failed: {e}")))?;

    // Step 4: HTML → segments
    html_to_segments(&html, ctx)
}

enum Rewrite {
    Keep,
    Replace(String),
    Drop,
}

fn rewrite_markers<'a>(root: &'a AstNode<'a>, ctx: &SurfaceContext) {
    let nodes: Vec<&'a AstNode<'a>> = root.descendants().collect();
    for node in nodes {
        let rewrite = match &node.data.borrow().value {
            NodeValue::CodeBlock(block) => Rewrite::Replace(code_block_html(block, ctx)),
            NodeValue::HtmlBlock(html) => {
                let literal = html.literal.trim();
                if literal == END_LIST {
                    Rewrite::Drop
                } else if literal == CALLOUT_CLOSE {
                    let mut out = String::new();
                    placeholder::callout_close(&mut out);
                    Rewrite::Replace(out)
                } else {
                    callout_open_html(literal).map_or(Rewrite::Keep, Rewrite::Replace)
                }
            }
            _ => Rewrite::Keep,
        };
        match rewrite {
            Rewrite::Keep => {}
            Rewrite::Replace(literal) => {
                node.data.borrow_mut().value = NodeValue::HtmlBlock(NodeHtmlBlock {
                    block_type: 6,
                    literal: literal + "\n",
                });
            }
            Rewrite::Drop => node.detach(),
        }
    }
}

struct MarkerInfo<'i> {
    language: &'i str,
    marker: &'i str,
    fields: Vec<&'i str>,
}

/// Split a fence info string; the marker is the first or second word.
fn marker_info(info: &str) -> Option<MarkerInfo<'_>> {
    let words: Vec<&str> = info.split_whitespace().collect();
    let is_marker = |w: &&str| [DIAGRAM_MARKER, CODE_MARKER, OPAQUE_MARKER].contains(w);
    let at = words.iter().take(2).position(|w| is_marker(w))?;
    Some(MarkerInfo {
        language: if at == 1 { words[0] } else { "" },
        marker: words[at],
        fields: words[at + 1..].to_vec(),
    })
}

impl<'i> MarkerInfo<'i> {
    fn field(&self, at: usize) -> &'i str {
        self.fields.get(at).copied().unwrap_or_default()
    }
}

fn code_block_html(block: &NodeCodeBlock, ctx: &SurfaceContext) -> String {
    let code = block.literal.strip_suffix('\n').unwrap_or(&block.literal);
    let mut out = String::new();

    match marker_info(&block.info) {
        Some(info) if info.marker == DIAGRAM_MARKER => {
            out = placeholder::diagram_edit(info.field(0), info.field(1), info.language, code);
        }
        Some(info) if info.marker == CODE_MARKER => {
            let raw = placeholder::decode(info.field(0));
            placeholder::code_block(info.language, &raw, code, true, &mut out);
        }
        Some(info) => placeholder::opaque(info.field(0), code, &mut out),
        None => {
            let language = block.info.split_whitespace().next().unwrap_or_default();
            if language.is_empty() {
                out.push_str("<pre>");
                if code.starts_with('\n') {
                    out.push('\n');
                }
                out.push_str(&escape_text(code));
                out.push_str("</pre>");
            } else if ctx.catalog.is_diagram_language(language) {
                debug!(%language, "new fence in a diagram language, creating a diagram");
                out = placeholder::diagram_edit("", "", language, code);
            } else {
                debug!(%language, "new fence, creating a code macro");
                placeholder::code_block(language, "", code, true, &mut out);
            }
        }
    }
    out
}

/// `<!-- wf-callout {name} {raw} -->`; the encoded raw macro is always the last word.
fn callout_open_html(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix("<!--")?.strip_suffix("-->")?;
    let words: Vec<&str> = inner.split_whitespace().collect();
    if words.first() != Some(&CALLOUT_MARKER) || words.len() < 2 {
        return None;
    }
    let raw = placeholder::decode(words[words.len() - 1]);
    let name = if words.len() > 2 { words[1] } else { "" };
    let mut out = String::new();
    placeholder::callout_open(name, &raw, true, &mut out);
    Some(out)
}
