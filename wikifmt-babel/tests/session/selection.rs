//! Selection replacement through an edit session.

use crate::common::{hello_world, kitchensink};
use wikifmt_babel::selection::swap::SwapStrategy;
use wikifmt_babel::selection::{ReceiveOutcome, SelectOutcome, SelectionPhase};
use wikifmt_babel::{EditResponse, EditSession, EditorEvent, EventLog, SessionOptions};

fn open(text: &str) -> (EditSession, EventLog) {
    let log = EventLog::new();
    let session = EditSession::open("Runbook", text, SessionOptions::default(), log.clone())
        .expect("session opens");
    log.take();
    (session, log)
}

fn replace(session: &mut EditSession, selected: &str, edited: &str) -> SwapStrategy {
    session.select_text(selected).expect("selection resolves");
    let (ticket, request) = session.request_edit("rewrite").expect("request builds");
    assert_eq!(request.selected_text, selected);
    assert_eq!(
        session.receive(ticket, EditResponse::success(edited)),
        ReceiveOutcome::Ready
    );
    session.apply().expect("replacement applies")
}

#[test]
fn test_sentence_swap_keeps_table_and_diagrams() {
    let text = kitchensink();
    let (mut session, log) = open(&text);

    let strategy = replace(
        &mut session,
        "Read this before every release",
        "<p>Read this <script>alert(1)</script><strong>first</strong></p>",
    );
    assert_eq!(strategy, SwapStrategy::SingleNode);

    let storage = session.storage_text().to_string();
    assert!(storage.contains("<p>Read this first.</p>"));
    assert!(!storage.contains("alert"));
    assert_eq!(storage.matches("<tr>").count(), 3);
    assert_eq!(storage.matches("<th>").count(), 2);
    assert_eq!(storage.matches("<td>").count(), 4);
    assert_eq!(session.registry().len(), 2);
    assert!(storage.contains(r#"<ac:structured-macro ac:name="toc" ac:schema-version="1" ac:macro-id="toc-1">"#));

    let events = log.take();
    assert!(events.contains(&EditorEvent::ReplacementApplied {
        strategy: "single-node".into()
    }));

    session.undo().unwrap();
    assert_eq!(session.storage_text(), text);
    assert_eq!(log.take().first(), Some(&EditorEvent::ReplacementUndone));
}

#[test]
fn test_multi_paragraph_swap_and_undo() {
    let text = "<p>Alpha beta</p><p>gamma delta</p><p>tail</p>";
    let (mut session, _) = open(text);

    let strategy = replace(&mut session, "betagamma", "<p>B</p><p>G</p>");
    assert_eq!(strategy, SwapStrategy::Subtree);
    assert_eq!(
        session.storage_text(),
        "<p>Alpha </p><p>B</p><p>G</p><p> delta</p><p>tail</p>"
    );
    assert_eq!(session.selection_phase(), SelectionPhase::Applied);

    session.undo().unwrap();
    assert_eq!(session.storage_text(), text);
    assert_eq!(session.selection_phase(), SelectionPhase::Idle);
    assert!(session.undo().is_err());
}

#[test]
fn test_superseded_request_is_discarded() {
    let (mut session, log) = open("<p>The quick brown fox jumps</p>");

    session.select_text("quick brown").unwrap();
    let (first, _) = session.request_edit("a").unwrap();
    assert_eq!(
        session.select_text("fox jumps").unwrap(),
        SelectOutcome::Selected { superseded: true }
    );
    let (second, request) = session.request_edit("b").unwrap();
    assert_ne!(first, second);
    assert_eq!(request.surrounding_context, "The quick brown fox jumps");

    assert_eq!(
        session.receive(first, EditResponse::success("slow")),
        ReceiveOutcome::Discarded
    );
    assert_eq!(
        session.receive(second, EditResponse::success("<em>leaps</em>")),
        ReceiveOutcome::Ready
    );
    assert_eq!(session.replacer().pending_fragment(), Some("<em>leaps</em>"));
    assert_eq!(log.events(), vec![EditorEvent::SelectionCancelled]);
}

#[test]
fn test_short_selection_is_ignored() {
    let (mut session, _) = open("<p>The quick brown fox</p>");
    assert_eq!(session.select_text("ox").unwrap(), SelectOutcome::Ignored);
    assert_eq!(session.selection_phase(), SelectionPhase::Idle);
    assert!(session.request_edit("x").is_err());
}

#[test]
fn test_closed_panel_drops_late_response() {
    let text = "<p>The quick brown fox</p>";
    let (mut session, log) = open(text);
    session.select_text("quick brown").unwrap();
    let (ticket, _) = session.request_edit("x").unwrap();

    assert!(session.close_panel());
    assert_eq!(
        session.receive(ticket, EditResponse::success("slow")),
        ReceiveOutcome::Discarded
    );
    assert!(session.apply().is_err());
    assert_eq!(session.storage_text(), text);
    assert_eq!(log.events()[0], EditorEvent::SelectionCancelled);
}

#[test]
fn test_unrelated_edit_keeps_pending_request() {
    let (mut session, log) = open("<p>The quick brown fox</p><p>Other para</p>");
    session.select_text("quick brown").unwrap();
    let (ticket, _) = session.request_edit("slower").unwrap();

    let edited = session
        .surface_content()
        .unwrap()
        .replace("Other para", "Another para");
    session.load_surface_edit(&edited).unwrap();
    assert_eq!(session.selection_phase(), SelectionPhase::AwaitingExternalEdit);

    assert_eq!(
        session.receive(ticket, EditResponse::success("slow red")),
        ReceiveOutcome::Ready
    );
    assert_eq!(session.apply().unwrap(), SwapStrategy::SingleNode);
    assert_eq!(
        session.storage_text(),
        "<p>The slow red fox</p><p>Another para</p>"
    );
    assert!(!log.events().contains(&EditorEvent::SelectionCancelled));
}

#[test]
fn test_shifted_selection_falls_back_to_its_text() {
    let (mut session, _) = open("<p>The quick brown fox</p>");
    session.select_text("quick brown").unwrap();
    let (ticket, _) = session.request_edit("slower").unwrap();

    session
        .load_surface_edit("<h1>Title</h1><p>The quick brown fox</p>")
        .unwrap();
    session.receive(ticket, EditResponse::success("slow red"));
    assert_eq!(session.apply().unwrap(), SwapStrategy::TextFallback);
    assert_eq!(
        session.storage_text(),
        "<h1>Title</h1><p>The slow red fox</p>"
    );
}

#[test]
fn test_diagram_source_cannot_be_selected() {
    let text = hello_world();
    let (mut session, _) = open(&text);

    assert_eq!(
        session.select_text("graph TD;A-->B").unwrap(),
        SelectOutcome::Rejected
    );
    assert_eq!(session.selection_phase(), SelectionPhase::Idle);
    assert!(session.request_edit("x").is_err());
    assert_eq!(session.storage_text(), text);
}

#[test]
fn test_selection_spanning_a_diagram_is_rejected() {
    let text = hello_world();
    let (mut session, _) = open(&text);

    assert_eq!(
        session.select_text("Hello graph TD;A-->B world").unwrap(),
        SelectOutcome::Rejected
    );
    assert_eq!(
        session.select_text("Hello").unwrap(),
        SelectOutcome::Selected { superseded: false }
    );
    assert_eq!(session.registry().len(), 1);
    assert_eq!(session.storage_text(), text);
}
