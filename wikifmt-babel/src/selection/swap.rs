//! Replacing a range of the live tree
//!
//! Three strategies, tried in this order:
//!
//!     SingleNode    the range lies inside one text node: the replacement's plain text is
//!                   written into that node, nothing else changes
//!     Subtree       the range spans nodes: below their deepest common ancestor, the content
//!                   between the two ends is cut out and the parsed fragment inserted there
//!     TextFallback  the range no longer resolves (or its text changed): the captured text is
//!                   replaced in the serialized surface, once, if it is still there
//!
//! Every strategy returns an [`UndoRecord`] that restores the exact prior state.

use super::range::{DocumentRange, LiveSurface, NodePath, SelectionAnchor};
use crate::error::FormatError;
use crate::surfaces::common::dom::{
    attr, body, deep_clone, element_name, escape_text, parse_html, set_text, text_content,
    text_of,
};
use crate::surfaces::common::placeholder::is_placeholder;
use markup5ever_rcdom::{Handle, NodeData};
use serde::Serialize;
use std::rc::Rc;
use tracing::{debug, warn};

/// Ancestors whose content is inline: a fragment's paragraphs are unwrapped inside them.
const INLINE_CONTEXTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "span", "strong", "b", "em", "i", "u", "s", "a",
    "code", "sub", "sup",
];

/// Wrappers dropped once a cut leaves them without content
const PRUNABLE: &[&str] = &[
    "span", "strong", "b", "em", "i", "u", "s", "a", "code", "sub", "sup",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapStrategy {
    SingleNode,
    Subtree,
    TextFallback,
}

/// State captured before a swap
#[derive(Debug, Clone)]
pub enum UndoRecord {
    /// Prior text of one text node
    Text { path: NodePath, before: String },
    /// Prior children of the common ancestor
    Subtree { path: NodePath, children: Vec<Handle> },
    /// Prior serialization of the whole surface
    Document { html: String },
}

/// Replace the anchored range with a sanitized fragment.
pub fn swap(
    live: &mut LiveSurface,
    anchor: &SelectionAnchor,
    fragment: &str,
) -> Result<(SwapStrategy, UndoRecord), FormatError> {
    let range = &anchor.document_range;
    let resolves = live.text_in(range).as_deref() == Some(anchor.captured_text.as_str());

    if resolves {
        let attempt = if anchor.is_multi_node {
            subtree(live, range, fragment).map(|undo| (SwapStrategy::Subtree, undo))
        } else {
            single_node(live, range, &fragment_text(fragment))
                .map(|undo| (SwapStrategy::SingleNode, undo))
        };
        match attempt {
            Ok(result) => return Ok(result),
            Err(e) => warn!(error = %e, "range swap failed, falling back to text replace"),
        }
    } else {
        debug!("selection range no longer matches its text, falling back to text replace");
    }

    text_fallback(live, anchor, fragment).map(|undo| (SwapStrategy::TextFallback, undo))
}

/// Restore the state an [`UndoRecord`] captured.
pub fn undo(live: &mut LiveSurface, record: &UndoRecord) -> Result<(), FormatError> {
    match record {
        UndoRecord::Text { path, before } => {
            let node = live.node_at(path).ok_or_else(stale_undo)?;
            if !set_text(&node, before) {
                return Err(stale_undo());
            }
        }
        UndoRecord::Subtree { path, children } => {
            let node = live.node_at(path).ok_or_else(stale_undo)?;
            let restored: Vec<Handle> = children.iter().map(deep_clone).collect();
            adopt(&node, &restored);
            *node.children.borrow_mut() = restored;
        }
        UndoRecord::Document { html } => live.replace_html(html)?,
    }
    Ok(())
}

fn stale_undo() -> FormatError {
    FormatError::InvalidSelection("undo target is no longer in the surface".to_string())
}

fn invalid(what: &str) -> FormatError {
    FormatError::InvalidSelection(format!("range {what}"))
}

fn single_node(
    live: &LiveSurface,
    range: &DocumentRange,
    replacement: &str,
) -> Result<UndoRecord, FormatError> {
    let node = live
        .node_at(&range.start.path)
        .ok_or_else(|| invalid("start node is gone"))?;
    let before = text_of(&node).ok_or_else(|| invalid("start is not a text node"))?;
    let chars: Vec<char> = before.chars().collect();
    let (start, end) = (range.start.offset, range.end.offset);
    if start > end || end > chars.len() {
        return Err(invalid("offsets are outside the text node"));
    }

    let mut after: String = chars[..start].iter().collect();
    after.push_str(replacement);
    after.extend(&chars[end..]);
    set_text(&node, &after);

    Ok(UndoRecord::Text {
        path: range.start.path.clone(),
        before,
    })
}

fn subtree(
    live: &LiveSurface,
    range: &DocumentRange,
    fragment: &str,
) -> Result<UndoRecord, FormatError> {
    let (start, end) = (&range.start.path, &range.end.path);
    let depth = start
        .iter()
        .zip(end.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if depth >= start.len() || depth >= end.len() {
        return Err(invalid("ends are not distinct text nodes"));
    }
    let (first, last) = (start[depth], end[depth]);
    if first >= last {
        return Err(invalid("ends are out of order"));
    }

    let ancestor_path = start[..depth].to_vec();
    let ancestor = live
        .node_at(&ancestor_path)
        .ok_or_else(|| invalid("common ancestor is gone"))?;
    let snapshot: Vec<Handle> = ancestor.children.borrow().iter().map(deep_clone).collect();

    let (first_child, last_child) = {
        let children = ancestor.children.borrow();
        match (children.get(first), children.get(last)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => return Err(invalid("ends are gone")),
        }
    };
    let cut = keep_before(&first_child, &start[depth + 1..], range.start.offset)
        .and_then(|_| keep_after(&last_child, &end[depth + 1..], range.end.offset))
        .and_then(|_| fragment_nodes(fragment, &ancestor));
    let inserted = match cut {
        Ok(nodes) => nodes,
        Err(e) => {
            let restored: Vec<Handle> = snapshot.iter().map(deep_clone).collect();
            adopt(&ancestor, &restored);
            *ancestor.children.borrow_mut() = restored;
            return Err(e);
        }
    };
    adopt(&ancestor, &inserted);
    ancestor
        .children
        .borrow_mut()
        .splice(first + 1..last, inserted);
    prune_edge(&ancestor, &first_child, true);
    prune_edge(&ancestor, &last_child, false);

    Ok(UndoRecord::Subtree {
        path: ancestor_path,
        children: snapshot,
    })
}

/// Cut everything in `node` after the boundary at `path`/`offset` below it.
fn keep_before(node: &Handle, path: &[usize], offset: usize) -> Result<(), FormatError> {
    let Some((&index, rest)) = path.split_first() else {
        let text = text_of(node).ok_or_else(|| invalid("start is not a text node"))?;
        let kept: String = text.chars().take(offset).collect();
        set_text(node, &kept);
        return Ok(());
    };
    let child = node
        .children
        .borrow()
        .get(index)
        .cloned()
        .ok_or_else(|| invalid("start path is gone"))?;
    node.children.borrow_mut().truncate(index + 1);
    keep_before(&child, rest, offset)
}

/// Cut everything in `node` before the boundary at `path`/`offset` below it.
fn keep_after(node: &Handle, path: &[usize], offset: usize) -> Result<(), FormatError> {
    let Some((&index, rest)) = path.split_first() else {
        let text = text_of(node).ok_or_else(|| invalid("end is not a text node"))?;
        let kept: String = text.chars().skip(offset).collect();
        set_text(node, &kept);
        return Ok(());
    };
    let child = node
        .children
        .borrow()
        .get(index)
        .cloned()
        .ok_or_else(|| invalid("end path is gone"))?;
    node.children.borrow_mut().drain(..index);
    keep_after(&child, rest, offset)
}

/// Parsed fragment, ready to live in `ancestor`'s tree.
fn fragment_nodes(fragment: &str, ancestor: &Handle) -> Result<Vec<Handle>, FormatError> {
    let dom = parse_html(fragment);
    let body = body(&dom).ok_or_else(|| FormatError::ParseError("fragment has no body".to_string()))?;
    let inline = element_name(ancestor).is_some_and(|name| INLINE_CONTEXTS.contains(&name.as_str()));

    // Copies: the fragment's own document empties its subtrees when dropped.
    let mut nodes = Vec::new();
    for child in body.children.borrow().iter() {
        if inline && element_name(child).as_deref() == Some("p") {
            nodes.extend(child.children.borrow().iter().map(deep_clone));
        } else {
            nodes.push(deep_clone(child));
        }
    }
    Ok(nodes)
}

/// Remove what a cut emptied along one edge of `node`: its last-child chain for the start
/// side of a range (`from_end`), its first-child chain for the end side.
fn prune_edge(parent: &Handle, node: &Handle, from_end: bool) {
    let edge = {
        let children = node.children.borrow();
        if from_end {
            children.last().cloned()
        } else {
            children.first().cloned()
        }
    };
    if let Some(edge) = edge {
        prune_edge(node, &edge, from_end);
    }
    if is_emptied(node) {
        parent.children.borrow_mut().retain(|child| !Rc::ptr_eq(child, node));
    }
}

fn is_emptied(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().is_empty(),
        NodeData::Element { .. } => {
            element_name(node).is_some_and(|name| PRUNABLE.contains(&name.as_str()))
                && !is_placeholder(node)
                && attr(node, "id").is_none()
                && node.children.borrow().is_empty()
        }
        _ => false,
    }
}

fn adopt(parent: &Handle, children: &[Handle]) {
    for child in children {
        child.parent.set(Some(Rc::downgrade(parent)));
    }
}

fn text_fallback(
    live: &mut LiveSurface,
    anchor: &SelectionAnchor,
    fragment: &str,
) -> Result<UndoRecord, FormatError> {
    let html = live.html()?;
    let needle = escape_text(&anchor.captured_text);
    if needle.is_empty() || !html.contains(&needle) {
        return Err(FormatError::ReplacementNotFound(anchor.captured_text.clone()));
    }

    let replacement = if anchor.is_multi_node {
        fragment.to_string()
    } else {
        escape_text(&fragment_text(fragment))
    };
    let updated = html.replacen(&needle, &replacement, 1);
    live.replace_html(&updated)?;
    Ok(UndoRecord::Document { html })
}

/// Plain text of a sanitized fragment
pub fn fragment_text(fragment: &str) -> String {
    let dom = parse_html(fragment);
    body(&dom).map(|b| text_content(&b)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor_for(live: &LiveSurface, needle: &str) -> SelectionAnchor {
        let range = live.find_text(needle).unwrap();
        SelectionAnchor::capture(live, range).unwrap()
    }

    const DOC: &str = "<p>Hello brave world.</p><table><tbody><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></tbody></table>";

    #[test]
    fn test_single_node_swap_keeps_siblings() {
        let mut live = LiveSurface::parse(DOC).unwrap();
        let anchor = anchor_for(&live, "brave world");
        let (strategy, record) = swap(&mut live, &anchor, "<p>bold new world</p>").unwrap();
        assert_eq!(strategy, SwapStrategy::SingleNode);

        let html = live.html().unwrap();
        assert!(html.starts_with("<p>Hello bold new world.</p>"));
        assert_eq!(html.matches("<tr>").count(), 2);
        assert_eq!(html.matches("<td>").count(), 4);

        undo(&mut live, &record).unwrap();
        assert_eq!(live.html().unwrap(), DOC);
    }

    #[test]
    fn test_subtree_swap_across_elements() {
        let doc = "<p>One <strong>two</strong> three</p><p>Four</p>";
        let mut live = LiveSurface::parse(doc).unwrap();
        let anchor = anchor_for(&live, "two three");
        assert!(anchor.is_multi_node);

        let (strategy, record) = swap(&mut live, &anchor, "<p><em>2</em> 3</p>").unwrap();
        assert_eq!(strategy, SwapStrategy::Subtree);
        assert_eq!(
            live.html().unwrap(),
            "<p>One <em>2</em> 3</p><p>Four</p>"
        );

        undo(&mut live, &record).unwrap();
        assert_eq!(live.html().unwrap(), doc);
    }

    #[test]
    fn test_subtree_swap_prunes_emptied_wrappers_only() {
        let doc = "<p>Say <em>very <strong>loud</strong></em> words<span id=\"mark\"></span></p>";
        let mut live = LiveSurface::parse(doc).unwrap();
        let anchor = anchor_for(&live, "loud words");

        let (_, record) = swap(&mut live, &anchor, "quiet ones").unwrap();
        assert_eq!(
            live.html().unwrap(),
            "<p>Say <em>very </em>quiet ones<span id=\"mark\"></span></p>"
        );

        undo(&mut live, &record).unwrap();
        assert_eq!(live.html().unwrap(), doc);
    }

    #[test]
    fn test_subtree_swap_across_paragraphs() {
        let doc = "<p>Alpha beta</p><p>gamma delta</p><p>tail</p>";
        let mut live = LiveSurface::parse(doc).unwrap();
        let anchor = anchor_for(&live, "betagamma");

        let (strategy, record) = swap(&mut live, &anchor, "<p>B</p><p>G</p>").unwrap();
        assert_eq!(strategy, SwapStrategy::Subtree);
        assert_eq!(
            live.html().unwrap(),
            "<p>Alpha </p><p>B</p><p>G</p><p> delta</p><p>tail</p>"
        );

        undo(&mut live, &record).unwrap();
        assert_eq!(live.html().unwrap(), doc);
    }

    #[test]
    fn test_fallback_when_range_is_stale() {
        let mut live = LiveSurface::parse("<p>Keep this sentence.</p>").unwrap();
        let anchor = anchor_for(&live, "this sentence");
        live.replace_html("<h1>Title</h1><p>Keep this sentence.</p>").unwrap();

        let (strategy, record) = swap(&mut live, &anchor, "that line").unwrap();
        assert_eq!(strategy, SwapStrategy::TextFallback);
        assert_eq!(live.html().unwrap(), "<h1>Title</h1><p>Keep that line.</p>");

        undo(&mut live, &record).unwrap();
        assert_eq!(live.html().unwrap(), "<h1>Title</h1><p>Keep this sentence.</p>");
    }

    #[test]
    fn test_not_found_leaves_document_unchanged() {
        let mut live = LiveSurface::parse("<p>Keep this sentence.</p>").unwrap();
        let anchor = anchor_for(&live, "this sentence");
        live.replace_html("<p>Rewritten already.</p>").unwrap();

        let err = swap(&mut live, &anchor, "x").unwrap_err();
        assert!(matches!(err, FormatError::ReplacementNotFound(_)));
        assert_eq!(live.html().unwrap(), "<p>Rewritten already.</p>");
    }
}
