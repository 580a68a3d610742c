//! The live surface tree and ranges within it
//!
//! A [`LiveSurface`] is the parsed HTML a host is showing (rich-text or preview). Positions are
//! addressed the way a DOM range addresses them: a text node, identified by its child-index path
//! from `<body>`, and a character offset inside it.

use crate::diagrams::{DiagramRegistry, RenderCache, RenderOutcome};
use crate::error::FormatError;
use crate::surfaces::common::dom::{
    attr, body, deep_clone, has_class, parse_html, serialize_children, set_attr, text_of,
};
use crate::surfaces::common::placeholder::{
    self, is_locked, is_placeholder, DiagramView, DIAGRAM_CLASS, DIAGRAM_CODE, DIAGRAM_ID, ERROR_CLASS, PENDING_CLASS,
    RENDER_CLASS,
};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub type NodePath = Vec<usize>;

/// One end of a range: a text node and a character offset in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundary {
    pub path: NodePath,
    pub offset: usize,
}

impl Boundary {
    pub fn new(path: NodePath, offset: usize) -> Self {
        Boundary { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl DocumentRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        DocumentRange { start, end }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn is_single_node(&self) -> bool {
        self.start.path == self.end.path
    }
}

/// A text node of the live tree with its position in the concatenated text
#[derive(Debug, Clone)]
pub struct TextNode {
    pub path: NodePath,
    pub handle: Handle,
    /// Character offset of the node's first character in [`LiveSurface::text`]
    pub start: usize,
    pub len: usize,
}

pub struct LiveSurface {
    // Owns the document the body belongs to.
    _dom: RcDom,
    root: Handle,
}

impl LiveSurface {
    pub fn parse(html: &str) -> Result<Self, FormatError> {
        let dom = parse_html(html);
        let root = body(&dom)
            .ok_or_else(|| FormatError::ParseError("HTML document has no body".to_string()))?;
        Ok(LiveSurface { _dom: dom, root })
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    /// The current tree as HTML (the body's content)
    pub fn html(&self) -> Result<String, FormatError> {
        serialize_children(&self.root)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<Handle> {
        let mut node = self.root.clone();
        for &index in path {
            let child = node.children.borrow().get(index).cloned()?;
            node = child;
        }
        Some(node)
    }

    /// Every text node in document order
    pub fn text_nodes(&self) -> Vec<TextNode> {
        let mut nodes = Vec::new();
        let mut path = Vec::new();
        let mut offset = 0;
        collect_text_nodes(&self.root, &mut path, &mut offset, &mut nodes);
        nodes
    }

    /// Concatenated text of the tree, the coordinate space of [`Self::range_between`]
    pub fn text(&self) -> String {
        self.text_nodes()
            .iter()
            .filter_map(|node| text_of(&node.handle))
            .collect()
    }

    /// Range covering the characters `start..end` of [`Self::text`]
    pub fn range_between(&self, start: usize, end: usize) -> Option<DocumentRange> {
        if start > end {
            return None;
        }
        let nodes = self.text_nodes();
        // A start on a node boundary belongs to the following node, an end to the preceding one.
        let first = nodes
            .iter()
            .find(|n| start >= n.start && start < n.start + n.len)
            .or_else(|| nodes.iter().rev().find(|n| start == n.start + n.len))?;
        let last = nodes
            .iter()
            .find(|n| end > n.start && end <= n.start + n.len)
            .or_else(|| nodes.iter().find(|n| end == n.start))?;
        Some(DocumentRange::new(
            Boundary::new(first.path.clone(), start - first.start),
            Boundary::new(last.path.clone(), end - last.start),
        ))
    }

    /// Range of the first occurrence of `needle` in [`Self::text`]
    pub fn find_text(&self, needle: &str) -> Option<DocumentRange> {
        let text = self.text();
        let byte = text.find(needle)?;
        let start = text[..byte].chars().count();
        self.range_between(start, start + needle.chars().count())
    }

    /// Character offset of a boundary in [`Self::text`], if it still resolves.
    pub fn offset_of(&self, boundary: &Boundary) -> Option<usize> {
        self.text_nodes()
            .into_iter()
            .find(|n| n.path == boundary.path)
            .filter(|n| boundary.offset <= n.len)
            .map(|n| n.start + boundary.offset)
    }

    /// Text covered by a range; `None` once any end no longer resolves to a text node.
    pub fn text_in(&self, range: &DocumentRange) -> Option<String> {
        let start = self.offset_of(&range.start)?;
        let end = self.offset_of(&range.end)?;
        if start > end {
            return None;
        }
        Some(self.text().chars().skip(start).take(end - start).collect())
    }

    /// Whether a range reaches into a macro placeholder: an end inside a locked one, or a
    /// placeholder the range only partly covers or contains whole. Replacing such a range would
    /// rewrite or drop the macro.
    pub fn crosses_placeholder(&self, range: &DocumentRange) -> bool {
        let (start, end) = (&range.start.path, &range.end.path);
        let ancestors = |path: &NodePath, from: usize| -> Vec<Handle> {
            (from.max(1)..path.len())
                .filter_map(|depth| self.node_at(&path[..depth]))
                .collect()
        };
        if [start, end]
            .into_iter()
            .any(|path| ancestors(path, 1).iter().any(is_locked))
        {
            return true;
        }

        let shared = start.iter().zip(end.iter()).take_while(|(a, b)| a == b).count();
        if [start, end]
            .into_iter()
            .any(|path| ancestors(path, shared + 1).iter().any(is_placeholder))
        {
            return true;
        }
        if start == end {
            return false;
        }

        let Some(common) = self.node_at(&start[..shared]) else {
            return true;
        };
        let mut walk = RangeWalk {
            start,
            end,
            inside: false,
        };
        let mut path = start[..shared].to_vec();
        walk.finds_placeholder(&common, &mut path).unwrap_or(false)
    }

    /// Replace the whole tree with new HTML
    pub fn replace_html(&mut self, html: &str) -> Result<(), FormatError> {
        *self = LiveSurface::parse(html)?;
        Ok(())
    }

    /// Point diagram placeholders at the ids of a freshly registered document.
    ///
    /// Ids are positional: after a commit that removed a diagram, every later placeholder
    /// still carries its old ordinal. Placeholders are renumbered in document order, which is
    /// the order the registry assigned.
    pub fn resync_diagram_ids(&self, registry: &DiagramRegistry) {
        let placeholders = self.diagram_placeholders();
        if placeholders.len() != registry.len() {
            debug!(
                placeholders = placeholders.len(),
                diagrams = registry.len(),
                "placeholder count differs from registry, ids left as they are"
            );
            return;
        }
        for (node, record) in placeholders.iter().zip(registry.diagrams()) {
            if attr(node, DIAGRAM_ID).as_deref() != Some(record.id.as_str()) {
                set_attr(node, DIAGRAM_ID, &record.id);
            }
            set_attr(node, DIAGRAM_CODE, &placeholder::encode(&record.original_code));
        }
    }

    /// Swap the render view of one diagram placeholder for the current outcome.
    pub fn patch_diagram_render(&self, id: &str, renders: &RenderCache, source: &str) -> bool {
        let Some(node) = self
            .diagram_placeholders()
            .into_iter()
            .find(|n| attr(n, DIAGRAM_ID).as_deref() == Some(id))
        else {
            return false;
        };
        let outcome = renders.outcome(id, source);
        let view = match &outcome {
            RenderOutcome::Pending => DiagramView::Pending,
            RenderOutcome::Rendered(markup) => DiagramView::Rendered(markup),
            RenderOutcome::Failed(message) => DiagramView::Failed(message),
        };
        let markup = placeholder::view_markup(view);
        let fresh = LiveSurface::parse(&markup).ok();
        let mut children = node.children.borrow_mut();
        children.retain(|child| {
            !(has_class(child, RENDER_CLASS)
                || has_class(child, ERROR_CLASS)
                || has_class(child, PENDING_CLASS))
        });
        if let Some(fresh) = fresh {
            // Copies: dropping `fresh` empties the subtrees of its own nodes.
            let new_nodes: Vec<Handle> = fresh.root.children.borrow().iter().map(deep_clone).collect();
            for (index, new_node) in new_nodes.into_iter().enumerate() {
                children.insert(index, new_node);
            }
        }
        true
    }

    fn diagram_placeholders(&self) -> Vec<Handle> {
        let mut found = Vec::new();
        collect_class(&self.root, DIAGRAM_CLASS, &mut found);
        found
    }
}

fn collect_text_nodes(
    node: &Handle,
    path: &mut NodePath,
    offset: &mut usize,
    out: &mut Vec<TextNode>,
) {
    let children: Vec<Handle> = node.children.borrow().clone();
    for (index, child) in children.into_iter().enumerate() {
        path.push(index);
        match &child.data {
            NodeData::Text { contents } => {
                let len = contents.borrow().chars().count();
                out.push(TextNode {
                    path: path.clone(),
                    handle: child.clone(),
                    start: *offset,
                    len,
                });
                *offset += len;
            }
            NodeData::Element { .. } => collect_text_nodes(&child, path, offset, out),
            _ => {}
        }
        path.pop();
    }
}

/// Document-order walk between the two ends of a range
struct RangeWalk<'a> {
    start: &'a [usize],
    end: &'a [usize],
    inside: bool,
}

impl RangeWalk<'_> {
    /// `Some(found)` once the walk has decided, `None` while the end is not reached yet.
    fn finds_placeholder(&mut self, node: &Handle, path: &mut NodePath) -> Option<bool> {
        let children: Vec<Handle> = node.children.borrow().clone();
        for (index, child) in children.iter().enumerate() {
            path.push(index);
            if path.as_slice() == self.start {
                self.inside = true;
            }
            let verdict = if self.inside && is_placeholder(child) {
                Some(true)
            } else if path.as_slice() == self.end {
                Some(false)
            } else if matches!(child.data, NodeData::Element { .. }) {
                self.finds_placeholder(child, path)
            } else {
                None
            };
            path.pop();
            if verdict.is_some() {
                return verdict;
            }
        }
        None
    }
}

fn collect_class(node: &Handle, class: &str, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if has_class(child, class) {
            out.push(child.clone());
        } else {
            collect_class(child, class, out);
        }
    }
}

/// What a selection captured when it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionAnchor {
    pub document_range: DocumentRange,
    pub captured_text: String,
    pub is_multi_node: bool,
}

impl SelectionAnchor {
    pub fn capture(live: &LiveSurface, range: DocumentRange) -> Result<Self, FormatError> {
        let captured_text = live.text_in(&range).ok_or_else(|| {
            FormatError::InvalidSelection("range does not resolve to text in the surface".to_string())
        })?;
        Ok(SelectionAnchor {
            is_multi_node: !range.is_single_node(),
            document_range: range,
            captured_text,
        })
    }
}
