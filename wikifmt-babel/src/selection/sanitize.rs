//! Allow-list sanitizer for replacement fragments
//!
//! Allowed tags pass with only their permitted attributes, dropped tags disappear with their
//! content, and every other tag is unwrapped (its children are kept). A `<tbody>` the HTML parser
//! inserted into a table that had none is unwrapped too, so allowed markup comes out as it went in.

use crate::codec::scanner::Scanner;
use crate::error::FormatError;
use crate::surfaces::common::dom::{attrs, body, element_name, escape_attr, escape_text, parse_html};
use crate::surfaces::common::normalize::is_void;
use markup5ever_rcdom::{Handle, NodeData};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizePolicy {
    pub allowed_tags: Vec<String>,
    pub dropped_tags: Vec<String>,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        let allowed = [
            "h1", "h2", "h3", "h4", "h5", "h6", "p", "br", "hr", "ul", "ol", "li", "table",
            "thead", "tbody", "tfoot", "tr", "th", "td", "strong", "b", "em", "i", "u", "s",
            "code", "pre", "blockquote", "a", "sub", "sup",
        ];
        let dropped = ["script", "style", "iframe", "object", "embed", "noscript", "template"];
        SanitizePolicy {
            allowed_tags: allowed.iter().map(|t| t.to_string()).collect(),
            dropped_tags: dropped.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl SanitizePolicy {
    fn allows(&self, tag: &str) -> bool {
        self.allowed_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    fn drops(&self, tag: &str) -> bool {
        self.dropped_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Sanitize an HTML fragment returned by the external edit service.
pub fn sanitize_fragment(html: &str, policy: &SanitizePolicy) -> Result<String, FormatError> {
    let dom = parse_html(html);
    let body = body(&dom)
        .ok_or_else(|| FormatError::ParseError("fragment has no body".to_string()))?;
    let writer = Writer {
        policy,
        implied_tbody: !Scanner::new(html)
            .filter_map(Result::ok)
            .any(|token| token.is_open("tbody")),
    };
    let mut out = String::new();
    writer.children(&body, &mut out);
    Ok(out)
}

struct Writer<'a> {
    policy: &'a SanitizePolicy,
    /// The fragment had no `<tbody>`; any in the tree came from the parser
    implied_tbody: bool,
}

impl Writer<'_> {
    fn children(&self, node: &Handle, out: &mut String) {
        for child in node.children.borrow().iter() {
            self.node(child, out);
        }
    }

    fn node(&self, node: &Handle, out: &mut String) {
        match &node.data {
            NodeData::Text { contents } => out.push_str(&escape_text(&contents.borrow())),
            NodeData::Element { .. } => {
                let tag = element_name(node).unwrap_or_default();
                if self.policy.drops(&tag) {
                    return;
                }
                let implied = self.implied_tbody && tag == "tbody";
                if implied || !self.policy.allows(&tag) {
                    self.children(node, out);
                    return;
                }
                out.push('<');
                out.push_str(&tag);
                for (name, value) in kept_attributes(node, &tag) {
                    out.push_str(&format!(" {name}=\"{}\"", escape_attr(&value)));
                }
                out.push('>');
                if is_void(&tag) {
                    return;
                }
                self.children(node, out);
                out.push_str(&format!("</{tag}>"));
            }
            _ => {}
        }
    }
}

fn kept_attributes(node: &Handle, tag: &str) -> Vec<(String, String)> {
    attrs(node)
        .into_iter()
        .filter(|(name, value)| match (tag, name.as_str()) {
            ("a", "href") => !is_script_url(value),
            ("td", "colspan") | ("td", "rowspan") | ("th", "colspan") | ("th", "rowspan") => {
                value.chars().all(|c| c.is_ascii_digit())
            }
            _ => false,
        })
        .collect()
}

fn is_script_url(url: &str) -> bool {
    let compact: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    compact.starts_with("javascript:") || compact.starts_with("vbscript:") || compact.starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(html: &str) -> String {
        sanitize_fragment(html, &SanitizePolicy::default()).unwrap()
    }

    #[test]
    fn test_allowed_tags_pass_unchanged() {
        let html = "<h2>Title</h2><p>Some <strong>bold</strong> and <em>soft</em> text</p><ul><li>one</li></ul>";
        assert_eq!(clean(html), html);

        let table = "<table><tbody><tr><td colspan=\"2\">wide</td></tr></tbody></table>";
        assert_eq!(clean(table), table);

        let bare = "<table><tr><th>k</th><th>v</th></tr><tr><td>a</td><td>b</td></tr></table>";
        assert_eq!(clean(bare), bare);
    }

    #[test]
    fn test_scripts_and_styles_removed_with_content() {
        assert_eq!(clean("<p>ok</p><script>alert(1)</script>"), "<p>ok</p>");
        assert_eq!(clean("<p>a<iframe src=\"x\">inner</iframe>b</p>"), "<p>ab</p>");
    }

    #[test]
    fn test_attributes_stripped() {
        assert_eq!(
            clean("<p style=\"color:red\" onclick=\"evil()\">x</p>"),
            "<p>x</p>"
        );
        assert_eq!(
            clean("<a href=\"https://example.com\" target=\"_blank\">l</a>"),
            "<a href=\"https://example.com\">l</a>"
        );
        assert_eq!(clean("<a href=\" javascript:evil()\">l</a>"), "<a>l</a>");
    }

    #[test]
    fn test_unknown_tags_unwrapped() {
        assert_eq!(clean("<div><span class=\"x\">kept</span></div>"), "kept");
        assert_eq!(clean("plain &amp; simple"), "plain &amp; simple");
    }
}
