//! Diagram edits on the kitchensink, where two diagrams share the same source.

use crate::common::kitchensink;
use wikifmt_babel::codec;
use wikifmt_babel::diagrams::{self, DiagramKind, DiagramRegistry};
use wikifmt_babel::FormatError;

#[test]
fn test_nested_duplicate_is_addressed_by_path() {
    let text = kitchensink();
    let segments = codec::parse(&text);
    let registry = DiagramRegistry::register(&segments);

    let top = &registry.diagrams()[0];
    let nested = &registry.diagrams()[1];
    assert_eq!(top.code, nested.code);
    assert_eq!(top.macro_type, DiagramKind::Diagram);
    assert_eq!(nested.owner_segment_index.len(), 2);
    assert_eq!(registry.by_path(&nested.owner_segment_index), Some(nested));
}

#[test]
fn test_editing_one_duplicate_leaves_the_other() {
    let text = kitchensink();
    let segments = codec::parse(&text);
    let mut registry = DiagramRegistry::register(&segments);
    registry.set_code("diagram-1", "graph TD;R-->S").unwrap();

    let updated = diagrams::apply(&segments, registry.get("diagram-1").unwrap()).unwrap();
    let out = codec::serialize(&updated);

    let expected = text.replace(
        r#"ac:macro-id="m-2"><ac:parameter ac:name="code"><![CDATA[graph TD;A-->B]]>"#,
        r#"ac:macro-id="m-2"><ac:parameter ac:name="code"><![CDATA[graph TD;R-->S]]>"#,
    );
    assert_ne!(expected, text);
    assert_eq!(out, expected);
    assert_eq!(out.matches("graph TD;A-->B").count(), 1);
}

#[test]
fn test_apply_all_collects_mismatches() {
    let text = kitchensink();
    let segments = codec::parse(&text);
    let mut registry = DiagramRegistry::register(&segments);
    registry.set_code("diagram-0", "graph LR;X").unwrap();
    registry.set_code("diagram-1", "graph LR;Y").unwrap();

    // Both owners are gone, and two other diagrams still carry the registered source.
    let prefix = r#"<ac:structured-macro ac:name="status" />"#;
    let moved = codec::parse(&format!("{prefix}{text}"));
    let (result, errors) = diagrams::apply_all(&moved, &registry);
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, FormatError::DiagramMismatch { .. })));
    assert_eq!(codec::serialize(&result), format!("{prefix}{text}"));
}

#[test]
fn test_stale_record_never_lands_on_the_duplicate() {
    let text = kitchensink();
    let segments = codec::parse(&text);
    let mut stale = DiagramRegistry::register(&segments);
    stale.set_code("diagram-0", "graph LR;X").unwrap();

    let mut current = DiagramRegistry::register(&segments);
    current.set_code("diagram-0", "graph LR;Y").unwrap();
    let edited = diagrams::apply(&segments, current.get("diagram-0").unwrap()).unwrap();

    let err = diagrams::apply(&edited, stale.get("diagram-0").unwrap()).unwrap_err();
    assert!(matches!(err, FormatError::DiagramMismatch { ref id, .. } if id == "diagram-0"));
    let out = codec::serialize(&edited);
    assert_eq!(out.matches("graph TD;A-->B").count(), 1);
    assert_eq!(out.matches("graph LR;Y").count(), 1);
}
