//! Property: serialize(parse(x)) == x for generated documents.

use proptest::prelude::*;
use wikifmt_babel::codec::{self, visit_macros, MacroCatalog};

const RESERVED: &[&str] = &[
    "mermaid", "code", "noformat", "info", "note", "warning", "tip", "panel", "expand",
];

fn markup() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 .,;:!?-]{0,20}".prop_map(|t| format!("<p>{t}</p>")),
        "[a-zA-Z0-9 ]{1,12}".prop_map(|t| format!("<h2>{t}</h2>")),
        "[a-zA-Z ]{1,8}".prop_map(|t| format!("<ul><li>{t}</li></ul>")),
        Just("\n".to_string()),
    ]
}

fn diagram() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ;>-]{0,30}".prop_map(|code| format!(
            r#"<ac:structured-macro ac:name="mermaid"><ac:parameter ac:name="code"><![CDATA[{code}]]></ac:parameter></ac:structured-macro>"#
        )),
        "[a-zA-Z0-9 ]{0,12}".prop_map(|code| format!(
            r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">mermaid</ac:parameter><ac:plain-text-body><![CDATA[{code}]]></ac:plain-text-body></ac:structured-macro>"#
        )),
    ]
}

fn code_block() -> impl Strategy<Value = String> {
    ("[a-z]{1,6}", "[a-zA-Z0-9 <>&;(){}]{0,30}").prop_map(|(lang, code)| {
        format!(
            r#"<ac:structured-macro ac:name="code" ac:macro-id="c"><ac:parameter ac:name="language">{lang}</ac:parameter><ac:plain-text-body><![CDATA[{code}]]></ac:plain-text-body></ac:structured-macro>"#
        )
    })
}

fn opaque() -> impl Strategy<Value = String> {
    let name = "[a-z]{3,8}".prop_filter("not a catalogued macro", |n| !RESERVED.contains(&n.as_str()));
    (name, "[a-zA-Z0-9 ]{0,10}", any::<bool>()).prop_map(|(name, value, closed)| {
        if closed {
            format!(r#"<ac:structured-macro ac:name="{name}" />"#)
        } else {
            format!(
                r#"<ac:structured-macro ac:name="{name}" ac:schema-version="1"><ac:parameter ac:name="key">{value}</ac:parameter></ac:structured-macro>"#
            )
        }
    })
}

/// A piece and the number of macros it contains
fn leaf() -> impl Strategy<Value = (String, usize)> {
    prop_oneof![
        3 => markup().prop_map(|m| (m, 0)),
        2 => diagram().prop_map(|m| (m, 1)),
        1 => code_block().prop_map(|m| (m, 1)),
        1 => opaque().prop_map(|m| (m, 1)),
    ]
}

fn piece() -> impl Strategy<Value = (String, usize)> {
    prop_oneof![
        4 => leaf(),
        1 => prop::collection::vec(leaf(), 0..4).prop_map(|inner| {
            let count = inner.iter().map(|(_, n)| n).sum::<usize>() + 1;
            let body: String = inner.into_iter().map(|(m, _)| m).collect();
            (
                format!(r#"<ac:structured-macro ac:name="note"><ac:rich-text-body>{body}</ac:rich-text-body></ac:structured-macro>"#),
                count,
            )
        }),
    ]
}

fn document() -> impl Strategy<Value = (String, usize)> {
    prop::collection::vec(piece(), 0..8).prop_map(|pieces| {
        let count = pieces.iter().map(|(_, n)| n).sum();
        (pieces.into_iter().map(|(m, _)| m).collect(), count)
    })
}

proptest! {
    #[test]
    fn prop_serialize_parse_is_identity((text, macros) in document()) {
        let catalog = MacroCatalog::default();
        let segments = codec::try_parse_with(&text, &catalog).expect("generated documents are well formed");
        prop_assert_eq!(codec::serialize(&segments), text.clone());

        let mut seen = 0;
        visit_macros(&segments, &mut |_, _| seen += 1);
        prop_assert_eq!(seen, macros);
    }
}
