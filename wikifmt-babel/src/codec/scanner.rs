//! Tag-level scanner for storage text
//!
//! The storage format is XHTML with namespaced macro elements. The codec only needs to find
//! element boundaries, so this scanner yields a flat token stream (text, CDATA, comments,
//! declarations, open and close tags) with byte ranges into the source. Quoted attribute values
//! are skipped, so a `>` inside an attribute never ends a tag, and CDATA/comment bodies are
//! opaque, so markup-looking text inside them is never treated as structure.

use std::fmt;
use std::ops::Range;

/// Failure to tokenize storage text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// A construct was opened but never closed (e.g. `<![CDATA[` without `]]>`)
    Unterminated {
        construct: &'static str,
        offset: usize,
    },
    /// Macro open/close tags do not pair up
    Unbalanced { offset: usize },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::Unterminated { construct, offset } => {
                write!(f, "unterminated {construct} at byte {offset}")
            }
            ScanError::Unbalanced { offset } => {
                write!(f, "unbalanced macro element at byte {offset}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    CData,
    Comment,
    /// `<!DOCTYPE ...>` or `<?...?>`
    Declaration,
    OpenTag {
        self_closing: bool,
    },
    CloseTag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Element name for tags, empty otherwise
    pub name: &'a str,
    pub range: Range<usize>,
}

impl Token<'_> {
    pub fn is_open(&self, name: &str) -> bool {
        matches!(self.kind, TokenKind::OpenTag { .. }) && self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_close(&self, name: &str) -> bool {
        self.kind == TokenKind::CloseTag && self.name.eq_ignore_ascii_case(name)
    }

    pub fn is_self_closing(&self) -> bool {
        matches!(self.kind, TokenKind::OpenTag { self_closing: true })
    }
}

pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner { src, pos: 0 }
    }

    /// Start scanning at `pos`; token ranges stay relative to the full `src`.
    pub fn starting_at(src: &'a str, pos: usize) -> Self {
        Scanner { src, pos }
    }

    fn until(
        &mut self,
        start: usize,
        opener: usize,
        terminator: &str,
        kind: TokenKind,
        construct: &'static str,
    ) -> Result<Token<'a>, ScanError> {
        match self.src[start + opener..].find(terminator) {
            Some(index) => {
                let end = start + opener + index + terminator.len();
                self.pos = end;
                Ok(Token {
                    kind,
                    name: "",
                    range: start..end,
                })
            }
            None => {
                self.pos = self.src.len();
                Err(ScanError::Unterminated {
                    construct,
                    offset: start,
                })
            }
        }
    }

    fn tag(&mut self, start: usize, prefix: usize, closing: bool) -> Result<Token<'a>, ScanError> {
        let bytes = self.src.as_bytes();
        let name_start = start + prefix;
        let mut i = name_start;
        while i < bytes.len() && is_name_byte(bytes[i]) {
            i += 1;
        }
        let name = &self.src[name_start..i];

        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) if b == q => quote = None,
                Some(_) => {}
                None if b == b'"' || b == b'\'' => quote = Some(b),
                None if b == b'>' => {
                    let kind = if closing {
                        TokenKind::CloseTag
                    } else {
                        TokenKind::OpenTag {
                            self_closing: bytes[i - 1] == b'/',
                        }
                    };
                    self.pos = i + 1;
                    return Ok(Token {
                        kind,
                        name,
                        range: start..i + 1,
                    });
                }
                None => {}
            }
            i += 1;
        }

        self.pos = self.src.len();
        Err(ScanError::Unterminated {
            construct: "tag",
            offset: start,
        })
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.src.len() {
            return None;
        }
        let start = self.pos;
        let rest = &self.src[start..];

        if rest.starts_with("<![CDATA[") {
            return Some(self.until(start, 9, "]]>", TokenKind::CData, "CDATA section"));
        }
        if rest.starts_with("<!--") {
            return Some(self.until(start, 4, "-->", TokenKind::Comment, "comment"));
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            return Some(self.until(start, 2, ">", TokenKind::Declaration, "declaration"));
        }
        if let Some(after) = rest.strip_prefix("</") {
            if after.starts_with(is_name_start) {
                return Some(self.tag(start, 2, true));
            }
        } else if let Some(after) = rest.strip_prefix('<') {
            if after.starts_with(is_name_start) {
                return Some(self.tag(start, 1, false));
            }
        }

        // A '<' that opens no construct is plain text.
        let skip = usize::from(rest.starts_with('<'));
        let end = rest[skip..]
            .find('<')
            .map(|index| start + skip + index)
            .unwrap_or(self.src.len());
        self.pos = end;
        Some(Ok(Token {
            kind: TokenKind::Text,
            name: "",
            range: start..end,
        }))
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':' || !c.is_ascii()
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b':' | b'-' | b'_' | b'.') || b >= 0x80
}

/// Collect `name="value"` pairs from the text of a single open tag.
///
/// Values are entity-decoded. Attributes without a value map to an empty string.
pub fn attributes(tag: &str) -> Vec<(String, String)> {
    let inner = tag
        .strip_prefix('<')
        .unwrap_or(tag)
        .trim_end_matches('>')
        .trim_end_matches('/');
    let bytes = inner.as_bytes();
    let mut i = 0;
    // skip element name
    while i < bytes.len() && is_name_byte(bytes[i]) {
        i += 1;
    }

    let mut attrs = Vec::new();
    loop {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        let name = inner[name_start..i].to_string();
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b'=' {
            if !name.is_empty() {
                attrs.push((name, String::new()));
            }
            continue;
        }
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let value = if i < bytes.len() && (bytes[i] == b'"' || bytes[i] == b'\'') {
            let quote = bytes[i];
            let value_start = i + 1;
            i = value_start;
            while i < bytes.len() && bytes[i] != quote {
                i += 1;
            }
            let value = &inner[value_start..i];
            i = (i + 1).min(bytes.len());
            value
        } else {
            let value_start = i;
            while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            &inner[value_start..i]
        };
        attrs.push((name, decode_entities(value)));
    }
    attrs
}

/// Look up an attribute by name (case-insensitive).
pub fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
