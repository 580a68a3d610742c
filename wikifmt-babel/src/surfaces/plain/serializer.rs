//! Segments to Markdown
//!
//! Pipeline: segments → rich-text HTML → rcdom → Comrak AST → Markdown string
//!
//! Going through the rich-text dialect keeps a single definition of what a placeholder carries;
//! this module only decides how each placeholder is spelled in Markdown (see ../plain/mod.rs).

use super::{
    default_comrak_options, CALLOUT_CLOSE, CALLOUT_MARKER, CODE_MARKER, DIAGRAM_MARKER,
    OPAQUE_MARKER,
};
use crate::codec::Segment;
use crate::error::FormatError;
use crate::surface::SurfaceContext;
use crate::surfaces::common::dom::{
    attr, attrs, body, element_name, escape_attr, has_class, parse_html, serialize_node,
    text_content,
};
use crate::surfaces::common::normalize::{to_xhtml, is_void};
use crate::surfaces::common::placeholder::{
    self, CALLOUT_CLASS, CODE_CLASS, DIAGRAM_CLASS, DIAGRAM_CODE, DIAGRAM_ID, LANGUAGE,
    MACRO_CLASS, MACRO_NAME, MACRO_RAW,
};
use crate::surfaces::rich::serializer::{segments_to_html, PlaceholderMode};
use comrak::nodes::{
    Ast, AstNode, ListDelimType, ListType, NodeCode, NodeCodeBlock, NodeHeading, NodeHtmlBlock,
    NodeLink, NodeList, NodeTable, NodeValue, TableAlignment,
};
use comrak::{format_commonmark, Arena};
use markup5ever_rcdom::{Handle, NodeData};
use std::cell::RefCell;

/// Elements laid out as blocks; everything else is inline content of a paragraph.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "center", "dd", "details", "div", "dl", "dt",
    "fieldset", "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "summary", "table", "ul",
];

pub fn segments_to_markdown(segments: &[Segment], ctx: &SurfaceContext) -> Result<String, FormatError> {
    // Step 1: segments → rich-text HTML → DOM
    let html = segments_to_html(segments, ctx, PlaceholderMode::Rich);
    let dom = parse_html(&html);
    let body = body(&dom)
        .ok_or_else(|| FormatError::SerializationError("HTML document has no body".to_string()))?;

    // Step 2: DOM → Comrak AST
    let arena = Arena::new();
    let root = alloc(&arena, NodeValue::Document);
    let builder = AstBuilder { arena: &arena };
    builder.blocks(root, &body)?;

    // Step 3: Comrak AST → Markdown string
    let mut output = Vec::new();
    let options = default_comrak_options();
    format_commonmark(root, &options, &mut output).map_err(|e| {
        FormatError::SerializationError(format!("Comrak serialization failed: {e}"))
    })?;

    String::from_utf8(output)
        .map_err(|e| FormatError::SerializationError(format!("UTF-8 conversion failed: {e}")))
}

fn alloc<'a>(arena: &'a Arena<AstNode<'a>>, value: NodeValue) -> &'a AstNode<'a> {
    arena.alloc(AstNode::new(RefCell::new(Ast::new(value, (0, 0).into()))))
}

struct AstBuilder<'a> {
    arena: &'a Arena<AstNode<'a>>,
}

impl<'a> AstBuilder<'a> {
    fn node(&self, parent: &'a AstNode<'a>, value: NodeValue) -> &'a AstNode<'a> {
        let node = alloc(self.arena, value);
        parent.append(node);
        node
    }

    fn html_block(&self, parent: &'a AstNode<'a>, literal: String) {
        self.node(
            parent,
            NodeValue::HtmlBlock(NodeHtmlBlock {
                block_type: 6,
                literal,
            }),
        );
    }

    fn fence(&self, parent: &'a AstNode<'a>, info: String, code: &str) {
        let mut literal = code.to_string();
        literal.push('\n');
        self.node(
            parent,
            NodeValue::CodeBlock(NodeCodeBlock {
                fenced: true,
                fence_char: b'`',
                fence_length: 3,
                fence_offset: 0,
                info,
                literal,
            }),
        );
    }

    /// Block content of `container`: runs of inline nodes are gathered into paragraphs.
    fn blocks(&self, parent: &'a AstNode<'a>, container: &Handle) -> Result<(), FormatError> {
        let children: Vec<Handle> = container.children.borrow().clone();
        let mut run = Vec::new();
        for child in children {
            if is_block(&child) {
                self.flush(parent, &mut run)?;
                self.block(parent, &child)?;
            } else {
                run.push(child);
            }
        }
        self.flush(parent, &mut run)
    }

    fn flush(&self, parent: &'a AstNode<'a>, run: &mut Vec<Handle>) -> Result<(), FormatError> {
        let nodes = std::mem::take(run);
        let content: Vec<&Handle> = nodes.iter().filter(|n| !is_blank(n)).collect();
        if content.is_empty() {
            return Ok(());
        }
        // Storage-only elements standing alone stay out of any paragraph.
        if content.iter().all(|n| is_foreign_element(n)) {
            for node in content {
                self.html_block(parent, placeholder::markup(&storage_markup(node)?, true) + "\n");
            }
            return Ok(());
        }
        self.paragraph(parent, &nodes)
    }

    /// A paragraph of inline nodes, split around diagram and opaque placeholders, which become
    /// fenced blocks of their own.
    fn paragraph(&self, parent: &'a AstNode<'a>, nodes: &[Handle]) -> Result<(), FormatError> {
        let mut current: Option<&'a AstNode<'a>> = None;
        for node in nodes {
            if has_class(node, DIAGRAM_CLASS) || has_class(node, MACRO_CLASS) {
                current = None;
                self.macro_fence(parent, node);
                continue;
            }
            if current.is_none() && is_blank(node) {
                continue;
            }
            let para = match current {
                Some(para) => para,
                None => {
                    let para = self.node(parent, NodeValue::Paragraph);
                    current = Some(para);
                    para
                }
            };
            self.inline(para, node)?;
        }
        Ok(())
    }

    fn macro_fence(&self, parent: &'a AstNode<'a>, node: &Handle) {
        if has_class(node, DIAGRAM_CLASS) {
            let info = marker_info(
                &attr(node, LANGUAGE).unwrap_or_default(),
                DIAGRAM_MARKER,
                &[
                    &attr(node, DIAGRAM_ID).unwrap_or_default(),
                    &attr(node, DIAGRAM_CODE).unwrap_or_default(),
                ],
            );
            self.fence(parent, info, &text_content(node));
        } else {
            let name = attr(node, MACRO_NAME).unwrap_or_default();
            let raw = attr(node, MACRO_RAW)
                .map(|value| placeholder::decode(&value))
                .unwrap_or_default();
            self.fence(parent, marker_info("xml", OPAQUE_MARKER, &[&name]), &raw);
        }
    }

    fn block(&self, parent: &'a AstNode<'a>, node: &Handle) -> Result<(), FormatError> {
        let name = element_name(node).unwrap_or_default();
        match name.as_str() {
            "p" => {
                let children: Vec<Handle> = node.children.borrow().clone();
                self.paragraph(parent, &children)?;
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<u8>().unwrap_or(1);
                let heading = self.node(
                    parent,
                    NodeValue::Heading(NodeHeading {
                        level,
                        setext: false,
                    }),
                );
                self.inline_children(heading, node)?;
            }
            "ul" | "ol" => self.list(parent, node, name == "ol")?,
            "table" => self.table(parent, node)?,
            "blockquote" => {
                let quote = self.node(parent, NodeValue::BlockQuote);
                self.blocks(quote, node)?;
            }
            "hr" => {
                self.node(parent, NodeValue::ThematicBreak);
            }
            "pre" if has_class(node, CODE_CLASS) => {
                let info = marker_info(
                    &attr(node, LANGUAGE).unwrap_or_default(),
                    CODE_MARKER,
                    &[&attr(node, MACRO_RAW).unwrap_or_default()],
                );
                self.fence(parent, info, &text_content(node));
            }
            "pre" => {
                let code = text_content(node);
                self.fence(parent, String::new(), code.strip_suffix('\n').unwrap_or(&code));
            }
            "div" if has_class(node, CALLOUT_CLASS) => {
                let name = attr(node, MACRO_NAME).unwrap_or_default();
                let raw = attr(node, MACRO_RAW).unwrap_or_default();
                self.html_block(parent, format!("<!-- {CALLOUT_MARKER} {name} {raw} -->\n"));
                self.blocks(parent, node)?;
                self.html_block(parent, format!("{CALLOUT_CLOSE}\n"));
            }
            "li" => self.blocks(parent, node)?,
            _ => {
                self.html_block(parent, format!("{}\n", open_tag(node, &name)));
                self.blocks(parent, node)?;
                self.html_block(parent, format!("</{name}>\n"));
            }
        }
        Ok(())
    }

    fn list(&self, parent: &'a AstNode<'a>, node: &Handle, ordered: bool) -> Result<(), FormatError> {
        let shape = NodeList {
            list_type: if ordered {
                ListType::Ordered
            } else {
                ListType::Bullet
            },
            marker_offset: 0,
            padding: 0,
            start: attr(node, "start")
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
            delimiter: ListDelimType::Period,
            bullet_char: b'-',
            tight: true,
        };
        let list = self.node(parent, NodeValue::List(shape));
        let items: Vec<Handle> = node.children.borrow().clone();
        for item in items.iter().filter(|n| element_name(n).as_deref() == Some("li")) {
            let item_node = self.node(list, NodeValue::Item(shape));
            self.blocks(item_node, item)?;
        }
        Ok(())
    }

    /// The first row is the header row; rows are padded to the widest one.
    fn table(&self, parent: &'a AstNode<'a>, node: &Handle) -> Result<(), FormatError> {
        let rows = table_rows(node);
        let num_columns = rows.iter().map(|row| table_cells(row).len()).max().unwrap_or(0);
        if num_columns == 0 {
            return Ok(());
        }

        let table = self.node(
            parent,
            NodeValue::Table(NodeTable {
                alignments: vec![TableAlignment::None; num_columns],
                num_columns,
                num_rows: rows.len(),
                num_nonempty_cells: 0,
            }),
        );
        for (index, row) in rows.iter().enumerate() {
            let row_node = self.node(table, NodeValue::TableRow(index == 0));
            let cells = table_cells(row);
            for column in 0..num_columns {
                let cell_node = self.node(row_node, NodeValue::TableCell);
                if let Some(cell) = cells.get(column) {
                    self.flattened(cell_node, cell)?;
                }
            }
        }
        Ok(())
    }

    /// Inline content of a table cell: paragraphs inside it are flattened.
    fn flattened(&self, parent: &'a AstNode<'a>, node: &Handle) -> Result<(), FormatError> {
        let children: Vec<Handle> = node.children.borrow().clone();
        for child in children {
            if matches!(element_name(&child).as_deref(), Some("p") | Some("div"))
                && classify_placeholder(&child).is_none()
            {
                self.flattened(parent, &child)?;
            } else {
                self.inline(parent, &child)?;
            }
        }
        Ok(())
    }

    fn inline_children(&self, parent: &'a AstNode<'a>, node: &Handle) -> Result<(), FormatError> {
        let children: Vec<Handle> = node.children.borrow().clone();
        for child in children {
            self.inline(parent, &child)?;
        }
        Ok(())
    }

    fn inline(&self, parent: &'a AstNode<'a>, node: &Handle) -> Result<(), FormatError> {
        let name = match &node.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().replace('\n', " ");
                if !text.is_empty() {
                    self.node(parent, NodeValue::Text(text));
                }
                return Ok(());
            }
            NodeData::Comment { contents } => {
                self.node(parent, NodeValue::HtmlInline(format!("<!--{contents}-->")));
                return Ok(());
            }
            NodeData::Element { .. } => element_name(node).unwrap_or_default(),
            _ => return Ok(()),
        };

        // Placeholders below paragraph level travel as their rich-text HTML.
        if classify_placeholder(node).is_some() {
            self.node(parent, NodeValue::HtmlInline(serialize_node(node)?));
            return Ok(());
        }
        if !is_commonmark_tag(&name) {
            self.node(
                parent,
                NodeValue::HtmlInline(placeholder::markup(&storage_markup(node)?, false)),
            );
            return Ok(());
        }

        match name.as_str() {
            "strong" | "b" => {
                let strong = self.node(parent, NodeValue::Strong);
                self.inline_children(strong, node)?;
            }
            "em" | "i" => {
                let emph = self.node(parent, NodeValue::Emph);
                self.inline_children(emph, node)?;
            }
            "s" | "del" | "strike" => {
                let strike = self.node(parent, NodeValue::Strikethrough);
                self.inline_children(strike, node)?;
            }
            "code" => {
                self.node(
                    parent,
                    NodeValue::Code(NodeCode {
                        num_backticks: 1,
                        literal: text_content(node),
                    }),
                );
            }
            "a" if attr(node, "href").is_some() => {
                let link = self.node(
                    parent,
                    NodeValue::Link(NodeLink {
                        url: attr(node, "href").unwrap_or_default(),
                        title: attr(node, "title").unwrap_or_default(),
                    }),
                );
                self.inline_children(link, node)?;
            }
            "img" => {
                let image = self.node(
                    parent,
                    NodeValue::Image(NodeLink {
                        url: attr(node, "src").unwrap_or_default(),
                        title: attr(node, "title").unwrap_or_default(),
                    }),
                );
                let alt = attr(node, "alt").unwrap_or_default();
                if !alt.is_empty() {
                    self.node(image, NodeValue::Text(alt));
                }
            }
            "br" => {
                self.node(parent, NodeValue::LineBreak);
            }
            _ => {
                self.node(parent, NodeValue::HtmlInline(open_tag(node, &name)));
                if !is_void(&name) {
                    self.inline_children(parent, node)?;
                    self.node(parent, NodeValue::HtmlInline(format!("</{name}>")));
                }
            }
        }
        Ok(())
    }
}

fn classify_placeholder(node: &Handle) -> Option<&'static str> {
    [DIAGRAM_CLASS, CODE_CLASS, CALLOUT_CLASS, MACRO_CLASS]
        .into_iter()
        .find(|class| has_class(node, class))
}

fn is_block(node: &Handle) -> bool {
    match element_name(node) {
        Some(name) => BLOCK_ELEMENTS.contains(&name.as_str()),
        None => false,
    }
}

fn is_blank(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().trim().is_empty(),
        _ => false,
    }
}

/// An element whose tag CommonMark cannot carry as raw HTML
fn is_foreign_element(node: &Handle) -> bool {
    element_name(node).is_some_and(|name| !is_commonmark_tag(&name))
        && classify_placeholder(node).is_none()
}

/// CommonMark raw HTML tag names: `[A-Za-z][A-Za-z0-9-]*`
fn is_commonmark_tag(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn storage_markup(node: &Handle) -> Result<String, FormatError> {
    Ok(to_xhtml(&serialize_node(node)?).into_owned())
}

fn open_tag(node: &Handle, name: &str) -> String {
    let mut tag = format!("<{name}");
    for (key, value) in attrs(node) {
        tag.push_str(&format!(" {key}=\"{}\"", escape_attr(&value)));
    }
    tag.push('>');
    tag
}

/// `{language} {marker} {fields…}`, with the language left out when empty.
fn marker_info(language: &str, marker: &str, fields: &[&str]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !language.trim().is_empty() {
        parts.push(language.trim());
    }
    parts.push(marker);
    parts.extend(fields.iter().copied().filter(|f| !f.is_empty()));
    parts.join(" ")
}

fn table_rows(table: &Handle) -> Vec<Handle> {
    let mut rows = Vec::new();
    for child in table.children.borrow().iter() {
        match element_name(child).as_deref() {
            Some("tr") => rows.push(child.clone()),
            Some("thead") | Some("tbody") | Some("tfoot") => rows.extend(
                child
                    .children
                    .borrow()
                    .iter()
                    .filter(|n| element_name(n).as_deref() == Some("tr"))
                    .cloned(),
            ),
            _ => {}
        }
    }
    rows
}

fn table_cells(row: &Handle) -> Vec<Handle> {
    row.children
        .borrow()
        .iter()
        .filter(|n| matches!(element_name(n).as_deref(), Some("td") | Some("th")))
        .cloned()
        .collect()
}
