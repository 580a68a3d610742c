//! Segment model produced by the codec
//!
//! A document is an ordered list of segments: runs of markup and macro blocks. Every macro keeps
//! the exact bytes it was parsed from. Serialization writes those bytes back unchanged unless
//! the body was mutated, in which case only the body slot is rewritten and everything around it
//! (attributes, ids, other parameters, whitespace) survives.

use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

/// Address of a segment: index at the top level, then indices into nested rich bodies.
pub type SegmentPath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Segment {
    Markup { text: String },
    Macro(MacroSegment),
}

impl Segment {
    pub fn markup(text: impl Into<String>) -> Self {
        Segment::Markup { text: text.into() }
    }

    pub fn as_macro(&self) -> Option<&MacroSegment> {
        match self {
            Segment::Macro(m) => Some(m),
            Segment::Markup { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacroType {
    /// Dedicated diagram macro, source in a parameter or plain-text body
    Diagram,
    /// Code macro whose language marks it as a diagram
    CodeDiagram,
    Code,
    /// Macro with a rich-text body holding nested document content
    Callout,
    /// Anything else, preserved byte-for-byte
    Opaque,
}

impl MacroType {
    pub fn is_diagram(self) -> bool {
        matches!(self, MacroType::Diagram | MacroType::CodeDiagram)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MacroBody {
    None,
    Text(String),
    Rich(Vec<Segment>),
}

/// Where the body of a macro lives inside its raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SlotKind {
    Parameter(String),
    PlainText,
    RichText,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroSegment {
    pub macro_type: MacroType,
    pub name: String,
    /// Value of `ac:macro-id`, when present
    pub id: Option<String>,
    /// Decoded values of every `ac:parameter` child
    pub parameters: BTreeMap<String, String>,
    body: MacroBody,
    raw: String,
    #[serde(skip)]
    slot_kind: Option<SlotKind>,
    /// Byte range of the body content inside `raw`, when the body element exists
    #[serde(skip)]
    body_range: Option<Range<usize>>,
    #[serde(skip)]
    dirty: bool,
}

impl MacroSegment {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        macro_type: MacroType,
        name: String,
        id: Option<String>,
        parameters: BTreeMap<String, String>,
        body: MacroBody,
        raw: String,
        slot_kind: Option<SlotKind>,
        body_range: Option<Range<usize>>,
    ) -> Self {
        MacroSegment {
            macro_type,
            name,
            id,
            parameters,
            body,
            raw,
            slot_kind,
            body_range,
            dirty: false,
        }
    }

    /// Build a new diagram macro in canonical form.
    pub fn canonical_diagram(name: &str, parameter: &str, code: &str) -> Self {
        let open = format!(
            "<ac:structured-macro ac:name=\"{}\"><ac:parameter ac:name=\"{}\">",
            escape_attr(name),
            escape_attr(parameter)
        );
        let body = cdata(code);
        let raw = format!("{open}{body}</ac:parameter></ac:structured-macro>");
        let mut parameters = BTreeMap::new();
        parameters.insert(parameter.to_string(), code.to_string());
        MacroSegment::from_parts(
            MacroType::Diagram,
            name.to_string(),
            None,
            parameters,
            MacroBody::Text(code.to_string()),
            raw,
            Some(SlotKind::Parameter(parameter.to_string())),
            Some(open.len()..open.len() + body.len()),
        )
    }

    /// Build a new code macro in canonical form.
    pub fn canonical_code(name: &str, language_parameter: &str, language: &str, code: &str) -> Self {
        let mut open = format!("<ac:structured-macro ac:name=\"{}\">", escape_attr(name));
        let mut parameters = BTreeMap::new();
        if !language.is_empty() {
            open.push_str(&format!(
                "<ac:parameter ac:name=\"{}\">{}</ac:parameter>",
                escape_attr(language_parameter),
                escape_text(language)
            ));
            parameters.insert(language_parameter.to_string(), language.to_string());
        }
        open.push_str("<ac:plain-text-body>");
        let body = cdata(code);
        let raw = format!("{open}{body}</ac:plain-text-body></ac:structured-macro>");
        MacroSegment::from_parts(
            MacroType::Code,
            name.to_string(),
            None,
            parameters,
            MacroBody::Text(code.to_string()),
            raw,
            Some(SlotKind::PlainText),
            Some(open.len()..open.len() + body.len()),
        )
    }

    /// The exact text this macro was parsed from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn body(&self) -> &MacroBody {
        &self.body
    }

    pub fn body_text(&self) -> Option<&str> {
        match &self.body {
            MacroBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&[Segment]> {
        match &self.body {
            MacroBody::Rich(children) => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut [Segment]> {
        match &mut self.body {
            MacroBody::Rich(children) => Some(children.as_mut_slice()),
            _ => None,
        }
    }

    /// Whether serialization will rewrite the body slot
    pub fn is_modified(&self) -> bool {
        self.dirty
    }

    /// Replace a text body. Setting the current value is a no-op.
    pub fn set_text_body(&mut self, text: &str) {
        if self.body_text() == Some(text) {
            return;
        }
        if let SlotKind::Parameter(name) = self.slot_kind.clone().unwrap_or(SlotKind::PlainText) {
            self.parameters.insert(name, text.to_string());
        }
        self.body = MacroBody::Text(text.to_string());
        self.dirty = true;
    }

    /// Replace the nested content of a rich body.
    pub fn set_rich_body(&mut self, children: Vec<Segment>) {
        self.body = MacroBody::Rich(children);
        if self.body_range.is_none() {
            self.slot_kind = Some(SlotKind::RichText);
            self.dirty = true;
        }
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        match (&self.body, &self.body_range) {
            (MacroBody::Rich(children), Some(range)) => {
                out.push_str(&self.raw[..range.start]);
                write_segments(children, out);
                out.push_str(&self.raw[range.end..]);
            }
            (MacroBody::Rich(children), None) if self.dirty => {
                let mut body = String::from("<ac:rich-text-body>");
                write_segments(children, &mut body);
                body.push_str("</ac:rich-text-body>");
                self.write_inserted(&body, out);
            }
            (MacroBody::Text(text), Some(range)) if self.dirty => {
                out.push_str(&self.raw[..range.start]);
                out.push_str(&cdata(text));
                out.push_str(&self.raw[range.end..]);
            }
            (MacroBody::Text(text), None) if self.dirty => {
                let element = match &self.slot_kind {
                    Some(SlotKind::Parameter(name)) => format!(
                        "<ac:parameter ac:name=\"{}\">{}</ac:parameter>",
                        escape_attr(name),
                        cdata(text)
                    ),
                    _ => format!("<ac:plain-text-body>{}</ac:plain-text-body>", cdata(text)),
                };
                self.write_inserted(&element, out);
            }
            _ => out.push_str(&self.raw),
        }
    }

    /// Emit raw with `element` added as the last child of the macro.
    fn write_inserted(&self, element: &str, out: &mut String) {
        if let Some(head) = self.raw.strip_suffix("/>") {
            out.push_str(head.trim_end());
            out.push('>');
            out.push_str(element);
            out.push_str("</ac:structured-macro>");
        } else if let Some(close) = self.raw.rfind("</") {
            out.push_str(&self.raw[..close]);
            out.push_str(element);
            out.push_str(&self.raw[close..]);
        } else {
            out.push_str(&self.raw);
        }
    }
}

pub(crate) fn write_segments(segments: &[Segment], out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Markup { text } => out.push_str(text),
            Segment::Macro(m) => m.write_to(out),
        }
    }
}

/// Wrap text in CDATA, splitting any `]]>` it contains.
pub(crate) fn cdata(text: &str) -> String {
    format!("<![CDATA[{}]]>", text.replace("]]>", "]]]]><![CDATA[>"))
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn segment_at<'a>(segments: &'a [Segment], path: &[usize]) -> Option<&'a Segment> {
    let (first, rest) = path.split_first()?;
    let segment = segments.get(*first)?;
    if rest.is_empty() {
        return Some(segment);
    }
    segment_at(segment.as_macro()?.children()?, rest)
}

pub fn segment_at_mut<'a>(segments: &'a mut [Segment], path: &[usize]) -> Option<&'a mut Segment> {
    let (first, rest) = path.split_first()?;
    let segment = segments.get_mut(*first)?;
    if rest.is_empty() {
        return Some(segment);
    }
    match segment {
        Segment::Macro(m) => segment_at_mut(m.children_mut()?, rest),
        Segment::Markup { .. } => None,
    }
}

/// Depth-first walk over every macro, nested ones included, in document order.
pub fn visit_macros<F>(segments: &[Segment], visit: &mut F)
where
    F: FnMut(&[usize], &MacroSegment),
{
    let mut path = Vec::new();
    visit_inner(segments, &mut path, visit);
}

fn visit_inner<F>(segments: &[Segment], path: &mut Vec<usize>, visit: &mut F)
where
    F: FnMut(&[usize], &MacroSegment),
{
    for (index, segment) in segments.iter().enumerate() {
        if let Segment::Macro(m) = segment {
            path.push(index);
            visit(path, m);
            if let Some(children) = m.children() {
                visit_inner(children, path, visit);
            }
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdata_splits_terminator() {
        assert_eq!(cdata("a]]>b"), "<![CDATA[a]]]]><![CDATA[>b]]>");
    }

    #[test]
    fn test_canonical_diagram_body_range() {
        let m = MacroSegment::canonical_diagram("mermaid", "code", "graph TD");
        let range = m.body_range.clone().unwrap();
        assert_eq!(&m.raw()[range], "<![CDATA[graph TD]]>");
        assert_eq!(m.parameters.get("code").map(String::as_str), Some("graph TD"));
    }

    #[test]
    fn test_set_same_text_is_noop() {
        let mut m = MacroSegment::canonical_diagram("mermaid", "code", "graph TD");
        m.set_text_body("graph TD");
        assert!(!m.is_modified());
        m.set_text_body("graph LR");
        assert!(m.is_modified());
    }

    #[test]
    fn test_insert_into_self_closing_macro() {
        let mut m = MacroSegment::from_parts(
            MacroType::Diagram,
            "mermaid".into(),
            None,
            BTreeMap::new(),
            MacroBody::Text(String::new()),
            r#"<ac:structured-macro ac:name="mermaid" />"#.into(),
            Some(SlotKind::Parameter("code".into())),
            None,
        );
        m.set_text_body("A-->B");
        let mut out = String::new();
        m.write_to(&mut out);
        assert_eq!(
            out,
            r#"<ac:structured-macro ac:name="mermaid"><ac:parameter ac:name="code"><![CDATA[A-->B]]></ac:parameter></ac:structured-macro>"#
        );
    }

    #[test]
    fn test_segment_paths() {
        let inner = Segment::Macro(MacroSegment::canonical_diagram("mermaid", "code", "x"));
        let mut callout = MacroSegment::from_parts(
            MacroType::Callout,
            "info".into(),
            None,
            BTreeMap::new(),
            MacroBody::Rich(vec![Segment::markup("<p>a</p>"), inner]),
            String::new(),
            Some(SlotKind::RichText),
            Some(0..0),
        );
        callout.id = Some("c1".into());
        let segments = vec![Segment::markup("<p/>"), Segment::Macro(callout)];

        let found = segment_at(&segments, &[1, 1]).and_then(Segment::as_macro).unwrap();
        assert_eq!(found.body_text(), Some("x"));
        assert!(segment_at(&segments, &[0, 0]).is_none());

        let mut paths = Vec::new();
        visit_macros(&segments, &mut |path, _| paths.push(path.to_vec()));
        assert_eq!(paths, vec![vec![1], vec![1, 1]]);
    }
}
