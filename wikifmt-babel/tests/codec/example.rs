//! The inline-diagram paragraph, end to end through the codec and the registry.

use crate::common::{hello_world, kitchensink};
use insta::assert_snapshot;
use wikifmt_babel::codec::{self, MacroType, Segment};
use wikifmt_babel::diagrams::{self, DiagramRegistry};

#[test]
fn test_hello_world_splits_into_three_segments() {
    let segments = codec::parse(&hello_world());
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0], Segment::markup("<p>Hello "));
    assert_eq!(segments[2], Segment::markup(" world</p>"));

    let diagram = segments[1].as_macro().expect("middle segment is the macro");
    assert_eq!(diagram.macro_type, MacroType::Diagram);
    assert_eq!(diagram.body_text(), Some("graph TD;A-->B"));

    let registry = DiagramRegistry::register(&segments);
    let record = registry.get("diagram-0").expect("diagram registered");
    assert_eq!(record.code, "graph TD;A-->B");
    assert_eq!(record.owner_segment_index, vec![1]);
}

#[test]
fn test_hello_world_edit_changes_only_the_payload() {
    let segments = codec::parse(&hello_world());
    let mut registry = DiagramRegistry::register(&segments);
    registry.set_code("diagram-0", "graph TD;A-->C").unwrap();

    let updated = diagrams::apply(&segments, &registry.diagrams()[0]).unwrap();
    assert_eq!(
        codec::serialize(&updated),
        hello_world().replace("graph TD;A-->B", "graph TD;A-->C")
    );
    assert_eq!(
        codec::serialize(&diagrams::apply(&updated, &registry.diagrams()[0]).unwrap()),
        codec::serialize(&updated)
    );
}

#[test]
fn test_registry_json() {
    let segments = codec::parse(&hello_world());
    let registry = DiagramRegistry::register(&segments);
    let json = serde_json::to_string_pretty(registry.diagrams()).unwrap();
    assert_snapshot!(json, @r#"
    [
      {
        "id": "diagram-0",
        "code": "graph TD;A-->B",
        "original_code": "graph TD;A-->B",
        "macro_type": "diagram",
        "owner_segment_index": [
          1
        ]
      }
    ]
    "#);
}

#[test]
fn test_kitchensink_roundtrip_and_opaque_bytes() {
    let text = kitchensink();
    let segments = codec::parse(&text);
    assert_eq!(codec::serialize(&segments), text);

    let toc = r#"<ac:structured-macro ac:name="toc" ac:schema-version="1" ac:macro-id="toc-1"><ac:parameter ac:name="maxLevel">2</ac:parameter></ac:structured-macro>"#;
    let opaque = segments
        .iter()
        .filter_map(Segment::as_macro)
        .find(|m| m.macro_type == MacroType::Opaque)
        .expect("toc is opaque");
    assert_eq!(opaque.raw(), toc);
    assert_eq!(opaque.id.as_deref(), Some("toc-1"));
}

#[test]
fn test_ids_are_stable_across_registrations() {
    let text = kitchensink();
    let first = DiagramRegistry::register(&codec::parse(&text));
    let second = DiagramRegistry::register(&codec::parse(&text));
    assert_eq!(first, second);
    let ids: Vec<&str> = first.diagrams().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["diagram-0", "diagram-1"]);
}

#[test]
fn test_malformed_text_degrades_to_one_segment() {
    let text = "<p>a</p><ac:structured-macro ac:name=\"code\"><ac:plain-text-body><![CDATA[open";
    assert!(codec::try_parse_with(text, &Default::default()).is_err());
    let segments = codec::parse(text);
    assert_eq!(segments, vec![Segment::markup(text)]);
    assert_eq!(codec::serialize(&segments), text);
}
