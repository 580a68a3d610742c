//! The render queue runs one diagram per step and isolates failures.

use crate::common::kitchensink;
use wikifmt_babel::codec;
use wikifmt_babel::diagrams::{DiagramRegistry, RenderCache, RenderOutcome, RenderQueue};
use wikifmt_babel::FormatError;

fn fussy(source: &str) -> Result<String, String> {
    if source.contains("BROKEN") {
        Err(format!("cannot render {source:?}"))
    } else {
        Ok(format!("<svg><text>{}</text></svg>", source.len()))
    }
}

#[test]
fn test_failure_does_not_block_other_diagrams() {
    let text = kitchensink();
    let segments = codec::parse(&text);
    let mut registry = DiagramRegistry::register(&segments);
    registry.set_code("diagram-0", "BROKEN").unwrap();

    let mut cache = RenderCache::new();
    let mut queue = RenderQueue::new();
    assert_eq!(queue.enqueue_stale(&registry, &cache), 2);

    let first = queue.step(&fussy, &mut cache).unwrap();
    assert_eq!(first.id, "diagram-0");
    assert!(matches!(first.result, Err(FormatError::RenderFailure { .. })));

    let second = queue.step(&fussy, &mut cache).unwrap();
    assert_eq!(second.id, "diagram-1");
    assert_eq!(second.result, Ok(()));
    assert!(queue.step(&fussy, &mut cache).is_none());

    assert!(matches!(
        cache.outcome("diagram-0", "BROKEN"),
        RenderOutcome::Failed(_)
    ));
    assert!(matches!(
        cache.outcome("diagram-1", "graph TD;A-->B"),
        RenderOutcome::Rendered(_)
    ));
}

#[test]
fn test_edited_source_invalidates_cache() {
    let segments = codec::parse(&kitchensink());
    let mut registry = DiagramRegistry::register(&segments);
    let mut cache = RenderCache::new();
    let mut queue = RenderQueue::new();
    queue.enqueue_stale(&registry, &cache);
    while queue.step(&fussy, &mut cache).is_some() {}
    assert_eq!(queue.enqueue_stale(&registry, &cache), 0);

    registry.set_code("diagram-1", "graph TD;Z").unwrap();
    assert_eq!(cache.outcome("diagram-1", "graph TD;Z"), RenderOutcome::Pending);
    assert_eq!(queue.enqueue_stale(&registry, &cache), 1);
}
