//! Opening, editing and saving a document.

use crate::common::{hello_world, kitchensink};
use wikifmt_babel::{
    EditSession, EditorEvent, EventLog, FormatError, NullSink, SessionOptions, VersionSnapshot,
};

#[test]
fn test_snapshot_json_to_session_and_back() {
    let json = serde_json::json!({
        "title": "Runbook",
        "storageText": kitchensink(),
        "timestamp": 1_700_000_000_000u64,
    })
    .to_string();
    let snapshot = VersionSnapshot::from_json(&json).unwrap();
    let mut session = EditSession::from_snapshot(&snapshot, SessionOptions::default(), NullSink).unwrap();
    assert_eq!(session.title(), "Runbook");
    assert_eq!(session.registry().len(), 2);

    session.update_diagram("diagram-0", "graph TD;A-->C").unwrap();
    let saved = session.snapshot();
    assert_eq!(saved.title, "Runbook");
    assert!(saved.timestamp >= snapshot.timestamp);
    assert_eq!(
        saved.storage_text,
        kitchensink().replacen("graph TD;A-->B", "graph TD;A-->C", 1)
    );
}

#[test]
fn test_surface_switching_keeps_document() {
    let (mut session, log) = {
        let log = EventLog::new();
        let session = EditSession::open("", hello_world(), SessionOptions::default(), log.clone()).unwrap();
        (session, log)
    };
    for surface in ["plain-text", "preview", "source", "rich-text"] {
        session.switch_surface(surface).unwrap();
        assert_eq!(session.surface(), surface);
        assert!(!session.surface_content().unwrap().is_empty());
    }
    assert_eq!(session.storage_text(), hello_world());
    assert!(matches!(
        session.switch_surface("wysiwyg"),
        Err(FormatError::SurfaceNotFound(_))
    ));
    assert_eq!(
        log.events(),
        vec![EditorEvent::DocumentCommitted {
            surface: "rich-text".into(),
            diagrams: 1
        }]
    );
}

#[test]
fn test_source_edit_reregisters_diagrams() {
    let options = SessionOptions {
        surface: "source".into(),
        ..SessionOptions::default()
    };
    let mut session = EditSession::open("", "<p>empty</p>", options, NullSink).unwrap();
    assert!(session.registry().is_empty());
    assert!(session.live().is_none());

    session.load_surface_edit(&hello_world()).unwrap();
    assert_eq!(session.storage_text(), hello_world());
    assert_eq!(session.registry().diagrams()[0].id, "diagram-0");
    assert_eq!(session.pending_renders(), 1);
}

#[test]
fn test_render_events_per_diagram() {
    let log = EventLog::new();
    let mut session = EditSession::open("", kitchensink(), SessionOptions::default(), log.clone()).unwrap();
    session.update_diagram("diagram-1", "broken").unwrap();
    log.take();

    let renderer = |source: &str| {
        if source == "broken" {
            Err("Syntax error".to_string())
        } else {
            Ok("<svg></svg>".to_string())
        }
    };
    assert_eq!(session.render_pending(&renderer), 2);
    assert_eq!(
        log.events(),
        vec![
            EditorEvent::RenderCompleted { id: "diagram-0".into() },
            EditorEvent::RenderFailed {
                id: "diagram-1".into(),
                message: "Syntax error".into()
            },
        ]
    );
}

#[test]
fn test_unknown_surface_in_options() {
    let options = SessionOptions {
        surface: "wysiwyg".into(),
        ..SessionOptions::default()
    };
    assert!(EditSession::open("", "<p>x</p>", options, NullSink).is_err());
}
