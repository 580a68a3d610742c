//! The kitchensink through every surface and back.

use crate::common::kitchensink;
use wikifmt_babel::codec::{self, visit_macros, MacroCatalog, MacroType};
use wikifmt_babel::diagrams::{DiagramRegistry, RenderCache, RenderOutcome};
use wikifmt_babel::{SurfaceContext, SurfaceRegistry};

fn roundtrip(surface: &str, edit: impl Fn(String) -> String) -> String {
    let text = kitchensink();
    let catalog = MacroCatalog::default();
    let segments = codec::parse(&text);
    let registry = DiagramRegistry::register(&segments);
    let ctx = SurfaceContext::new(&segments, &registry, &catalog);
    let surfaces = SurfaceRegistry::default();

    let content = surfaces.to_surface(&segments, surface, &ctx).unwrap();
    let back = surfaces.from_surface(&edit(content), surface, &ctx).unwrap();
    codec::serialize(&back)
}

/// Raw text of every macro except callouts, whose body markup may be reformatted
fn macro_raws(text: &str) -> Vec<String> {
    let mut raws = Vec::new();
    visit_macros(&codec::parse(text), &mut |_, m| {
        if m.macro_type != MacroType::Callout {
            raws.push(m.raw().to_string());
        }
    });
    raws
}

#[test]
fn test_source_is_byte_identical() {
    assert_eq!(roundtrip("source", |s| s), kitchensink());
}

#[test]
fn test_rich_text_roundtrip() {
    assert_eq!(roundtrip("rich-text", |html| html), kitchensink());
}

#[test]
fn test_rich_text_edit_next_to_table() {
    let out = roundtrip("rich-text", |html| html.replace("runs nightly", "runs hourly"));
    assert!(out.contains("</ac:structured-macro> runs hourly.</p>"));
    assert_eq!(out.matches("<tr>").count(), 3);
    assert_eq!(out.matches("<td>").count(), 4);
    assert_eq!(macro_raws(&out), macro_raws(&kitchensink()));
}

#[test]
fn test_plain_text_keeps_every_macro() {
    let out = roundtrip("plain-text", |markdown| markdown);
    for raw in macro_raws(&kitchensink()) {
        assert!(out.contains(&raw), "missing macro {raw}");
    }
    assert_eq!(out.matches("<tr>").count(), 3);
    assert_eq!(out.matches("<th>").count(), 2);
    assert!(out.contains("<h1>Deployment Runbook</h1>"));
    assert!(out.contains("ri:content-title=\"Release Checklist\""));
}

#[test]
fn test_plain_text_edit_of_nested_duplicate() {
    let out = roundtrip("plain-text", |markdown| {
        let at = markdown.rfind("\ngraph TD;A-->B\n").expect("nested diagram fence");
        let mut edited = markdown.clone();
        edited.replace_range(at..at + "\ngraph TD;A-->B\n".len(), "\ngraph TD;A-->Q\n");
        edited
    });
    assert!(out.contains(r#"ac:macro-id="m-1"><ac:parameter ac:name="code"><![CDATA[graph TD;A-->B]]>"#));
    assert!(out.contains(r#"ac:macro-id="m-2"><ac:parameter ac:name="code"><![CDATA[graph TD;A-->Q]]>"#));
}

#[test]
fn test_preview_embeds_renders_and_errors() {
    let text = kitchensink();
    let catalog = MacroCatalog::default();
    let segments = codec::parse(&text);
    let registry = DiagramRegistry::register(&segments);
    let mut cache = RenderCache::new();
    cache.store("diagram-0", "graph TD;A-->B", RenderOutcome::Rendered("<svg id=\"top\"></svg>".into()));
    cache.store("diagram-1", "graph TD;A-->B", RenderOutcome::Failed("Lexical error".into()));
    let ctx = SurfaceContext::new(&segments, &registry, &catalog).with_renders(&cache);

    let surfaces = SurfaceRegistry::default();
    let html = surfaces.to_surface(&segments, "preview", &ctx).unwrap();
    assert!(html.contains("<svg id=\"top\"></svg>"));
    assert!(html.contains("Lexical error"));
    assert!(!html.contains("ac:structured-macro"));

    let back = surfaces.from_surface(&html, "preview", &ctx).unwrap();
    assert_eq!(macro_raws(&codec::serialize(&back)), macro_raws(&text));
}
