//! Markup fix-ups between storage XHTML and browser HTML
//!
//! The HTML parser treats `<ri:page ... />` as an open tag and swallows the following content
//! into it, so non-void self-closing tags are expanded before markup reaches a surface. On the
//! way back the serialized HTML is made XHTML again (see [`to_xhtml`]), and editor debris
//! (`contenteditable`, empty paragraphs) is removed from the tree.

use super::dom::{element_name, is_element, remove_attr, text_of};
use crate::codec::scanner::{Scanner, TokenKind};
use markup5ever_rcdom::{Handle, NodeData};
use std::borrow::Cow;

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Rewrite `<x ... />` as `<x ...></x>` for every non-void element.
pub fn expand_self_closing(markup: &str) -> Cow<'_, str> {
    rewrite_tags(markup, |name, tag, self_closing| {
        if !self_closing || is_void(name) {
            return None;
        }
        let head = tag.strip_suffix("/>")?.trim_end();
        Some(format!("{head}></{name}>"))
    })
}

/// Bring serialized HTML back to storage XHTML: void elements closed as `<br />`, empty
/// namespaced elements (`<ri:page ...></ri:page>`) self-closing again, and `<`/`>` escaped inside
/// attribute values.
pub fn to_xhtml(html: &str) -> Cow<'_, str> {
    let Ok(tokens) = Scanner::new(html).collect::<Result<Vec<_>, _>>() else {
        return Cow::Borrowed(html);
    };
    let mut out = String::new();
    let mut cursor = 0;
    let mut changed = false;
    let mut index = 0;
    while index < tokens.len() {
        let token = &tokens[index];
        index += 1;
        let TokenKind::OpenTag { self_closing } = token.kind else {
            continue;
        };
        let escaped = escape_attribute_brackets(&html[token.range.clone()]);
        let closes_at_once = !self_closing
            && token.name.contains(':')
            && tokens.get(index).is_some_and(|next| next.is_close(token.name));
        let replacement = if closes_at_once || (!self_closing && is_void(token.name)) {
            let head = escaped.strip_suffix('>').unwrap_or(escaped.as_ref());
            Some(format!("{head} />"))
        } else if let Cow::Owned(escaped) = escaped {
            Some(escaped)
        } else {
            None
        };
        let Some(replacement) = replacement else {
            continue;
        };

        out.push_str(&html[cursor..token.range.start]);
        out.push_str(&replacement);
        cursor = token.range.end;
        if closes_at_once {
            cursor = tokens[index].range.end;
            index += 1;
        }
        changed = true;
    }
    if !changed {
        return Cow::Borrowed(html);
    }
    out.push_str(&html[cursor..]);
    Cow::Owned(out)
}

fn escape_attribute_brackets(tag: &str) -> Cow<'_, str> {
    let mut out = String::with_capacity(tag.len());
    let mut quote = None;
    let mut changed = false;
    for c in tag.chars() {
        match (quote, c) {
            (None, '"' | '\'') => {
                quote = Some(c);
                out.push(c);
            }
            (Some(open), _) if c == open => {
                quote = None;
                out.push(c);
            }
            (Some(_), '<') => {
                out.push_str("&lt;");
                changed = true;
            }
            (Some(_), '>') => {
                out.push_str("&gt;");
                changed = true;
            }
            _ => out.push(c),
        }
    }
    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(tag)
    }
}

fn rewrite_tags<'a, F>(markup: &'a str, mut rewrite: F) -> Cow<'a, str>
where
    F: FnMut(&str, &str, bool) -> Option<String>,
{
    let mut out = String::new();
    let mut cursor = 0;
    for token in Scanner::new(markup) {
        let Ok(token) = token else {
            // Leave markup the scanner cannot follow untouched.
            return Cow::Borrowed(markup);
        };
        let TokenKind::OpenTag { self_closing } = token.kind else {
            continue;
        };
        let tag = &markup[token.range.clone()];
        if let Some(replacement) = rewrite(token.name, tag, self_closing) {
            out.push_str(&markup[cursor..token.range.start]);
            out.push_str(&replacement);
            cursor = token.range.end;
        }
    }
    if cursor == 0 {
        return Cow::Borrowed(markup);
    }
    out.push_str(&markup[cursor..]);
    Cow::Owned(out)
}

/// Strip editor-only attributes and empty paragraphs from a subtree.
pub fn clean_tree(node: &Handle) {
    remove_attr(node, "contenteditable");
    let children: Vec<Handle> = node.children.borrow().clone();
    for child in &children {
        clean_tree(child);
    }
    node.children
        .borrow_mut()
        .retain(|child| !is_empty_paragraph(child));
}

fn is_empty_paragraph(node: &Handle) -> bool {
    if !is_element(node, "p") {
        return false;
    }
    let children = node.children.borrow();
    match children.as_slice() {
        [] => true,
        [only] => is_element(only, "br"),
        _ => false,
    }
}

/// Whether a node carries nothing worth keeping (blank text, `<br>`, empty wrappers).
pub fn is_disposable(node: &Handle) -> bool {
    match &node.data {
        NodeData::Text { .. } => text_of(node).is_some_and(|t| t.trim().is_empty()),
        NodeData::Comment { .. } => true,
        NodeData::Element { .. } => {
            let name = element_name(node).unwrap_or_default();
            if matches!(name.as_str(), "img" | "hr" | "table" | "iframe" | "input") {
                return false;
            }
            node.children.borrow().iter().all(is_disposable)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surfaces::common::dom::{body, parse_html, serialize_children};

    #[test]
    fn test_expand_self_closing() {
        let markup = r#"<p><ac:link><ri:page ri:content-title="Home" /></ac:link><br /></p>"#;
        assert_eq!(
            expand_self_closing(markup),
            r#"<p><ac:link><ri:page ri:content-title="Home"></ri:page></ac:link><br /></p>"#
        );
        assert!(matches!(expand_self_closing("<p>x</p>"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_to_xhtml() {
        assert_eq!(
            to_xhtml(r#"<p>a<br>b<img src="x.png"></p><hr />"#),
            r#"<p>a<br />b<img src="x.png" /></p><hr />"#
        );
        assert_eq!(
            to_xhtml(r#"<ac:link><ri:page ri:content-title="Home"></ri:page></ac:link><span></span>"#),
            r#"<ac:link><ri:page ri:content-title="Home" /></ac:link><span></span>"#
        );
        assert_eq!(
            to_xhtml(r#"<p title="a < b > c">x</p>"#),
            r#"<p title="a &lt; b &gt; c">x</p>"#
        );
        assert!(matches!(to_xhtml("<p>x &lt; y</p>"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_clean_tree() {
        let dom = parse_html(r#"<p contenteditable="true">keep</p><p></p><p><br></p><p> </p>"#);
        let body = body(&dom).unwrap();
        clean_tree(&body);
        assert_eq!(serialize_children(&body).unwrap(), "<p>keep</p><p> </p>");
    }
}
