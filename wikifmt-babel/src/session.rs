//! Edit session
//!
//!     Owns one document while it is being edited: its storage text, the segment list parsed
//!     from it, the diagram registry, the active surface and (for HTML surfaces) the live tree
//!     that selection replacement mutates.
//!
//! Commits
//!
//!     Every change goes through the same path: surface text (or the live tree) is converted
//!     back with `from_surface`, serialized, reparsed and re-registered. Last commit wins.
//!     Selection apply and undo commit before they return.
//!
//! Degraded documents
//!
//!     Storage text the codec cannot split is kept as one markup segment and only the `source`
//!     surface is offered until a commit parses cleanly again.

use crate::codec::{self, MacroCatalog, Segment};
use crate::diagrams::{self, DiagramRegistry, DiagramRenderer, RenderCache, RenderQueue, RenderReport};
use crate::error::FormatError;
use crate::events::{EditorEvent, EventSink, NullSink};
use crate::registry::SurfaceRegistry;
use crate::selection::range::{DocumentRange, LiveSurface};
use crate::selection::sanitize::SanitizePolicy;
use crate::selection::{
    EditRequest, EditResponse, EditTicket, ReceiveOutcome, SelectOutcome, SelectionPhase,
    SelectionReplacer, SelectionRules,
};
use crate::selection::swap::SwapStrategy;
use crate::snapshot::VersionSnapshot;
use crate::surface::SurfaceContext;
use tracing::{debug, info, warn};

pub const SOURCE_SURFACE: &str = "source";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub catalog: MacroCatalog,
    pub rules: SelectionRules,
    pub policy: SanitizePolicy,
    /// Surface shown after opening
    pub surface: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            catalog: MacroCatalog::default(),
            rules: SelectionRules::default(),
            policy: SanitizePolicy::default(),
            surface: "rich-text".to_string(),
        }
    }
}

/// Committed document state
#[derive(Debug, Clone)]
struct Committed {
    storage_text: String,
    segments: Vec<Segment>,
    registry: DiagramRegistry,
    degraded: bool,
}

impl Committed {
    fn parse(storage_text: String, catalog: &MacroCatalog) -> (Self, Option<FormatError>) {
        let (segments, error) = match codec::try_parse_with(&storage_text, catalog) {
            Ok(segments) => (segments, None),
            Err(err) => (vec![Segment::markup(storage_text.as_str())], Some(err)),
        };
        let registry = DiagramRegistry::register(&segments);
        let committed = Committed {
            storage_text,
            segments,
            registry,
            degraded: error.is_some(),
        };
        (committed, error)
    }
}

pub struct EditSession {
    title: String,
    options: SessionOptions,
    surfaces: SurfaceRegistry,
    document: Committed,
    surface: String,
    live: Option<LiveSurface>,
    replacer: SelectionReplacer,
    renders: RenderCache,
    queue: RenderQueue,
    /// Document as it was before the last applied replacement
    pre_apply: Option<Committed>,
    sink: Box<dyn EventSink>,
}

impl EditSession {
    pub fn open(
        title: impl Into<String>,
        storage_text: impl Into<String>,
        options: SessionOptions,
        sink: impl EventSink + 'static,
    ) -> Result<Self, FormatError> {
        let surfaces = SurfaceRegistry::with_defaults();
        surfaces.get(&options.surface)?;

        let mut session = EditSession {
            title: title.into(),
            replacer: SelectionReplacer::new(options.rules, options.policy.clone()),
            surface: options.surface.clone(),
            document: Committed {
                storage_text: String::new(),
                segments: Vec::new(),
                registry: DiagramRegistry::default(),
                degraded: false,
            },
            options,
            surfaces,
            live: None,
            renders: RenderCache::new(),
            queue: RenderQueue::new(),
            pre_apply: None,
            sink: Box::new(sink),
        };
        session.reload(storage_text.into());
        session.refresh_live()?;
        info!(title = %session.title, diagrams = session.document.registry.len(), "session opened");
        Ok(session)
    }

    pub fn from_snapshot(
        snapshot: &VersionSnapshot,
        options: SessionOptions,
        sink: impl EventSink + 'static,
    ) -> Result<Self, FormatError> {
        Self::open(&snapshot.title, &snapshot.storage_text, options, sink)
    }

    /// Open with default options and no event sink
    pub fn open_default(storage_text: impl Into<String>) -> Result<Self, FormatError> {
        Self::open("", storage_text, SessionOptions::default(), NullSink)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn storage_text(&self) -> &str {
        &self.document.storage_text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.document.segments
    }

    pub fn registry(&self) -> &DiagramRegistry {
        &self.document.registry
    }

    pub fn renders(&self) -> &RenderCache {
        &self.renders
    }

    pub fn is_degraded(&self) -> bool {
        self.document.degraded
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn surfaces(&self) -> &SurfaceRegistry {
        &self.surfaces
    }

    pub fn live(&self) -> Option<&LiveSurface> {
        self.live.as_ref()
    }

    pub fn snapshot(&self) -> VersionSnapshot {
        VersionSnapshot::new(self.title.clone(), self.document.storage_text.clone())
    }

    /// Surfaces the current document may be shown in
    pub fn available_surfaces(&self) -> Vec<String> {
        if self.document.degraded {
            vec![SOURCE_SURFACE.to_string()]
        } else {
            self.surfaces.list_surfaces()
        }
    }

    pub fn switch_surface(&mut self, name: &str) -> Result<(), FormatError> {
        self.surfaces.get(name)?;
        if self.document.degraded && name != SOURCE_SURFACE {
            return Err(FormatError::NotSupported(format!(
                "document could not be parsed, surface '{name}' is unavailable"
            )));
        }
        if self.replacer.close_panel() {
            self.sink.emit(EditorEvent::SelectionCancelled);
        }
        self.surface = name.to_string();
        self.refresh_live()?;
        debug!(surface = name, "surface switched");
        Ok(())
    }

    /// The current surface text
    pub fn surface_content(&self) -> Result<String, FormatError> {
        if let Some(live) = &self.live {
            return live.html();
        }
        self.surfaces
            .to_surface(&self.document.segments, &self.surface, &self.context())
    }

    /// Commit text the user typed into the current surface.
    ///
    /// A pending selection survives the commit; `apply` re-resolves its range against the new
    /// tree, or falls back to replacing its text.
    pub fn load_surface_edit(&mut self, content: &str) -> Result<(), FormatError> {
        if !self.surfaces.get(&self.surface)?.is_editable() {
            return Err(FormatError::NotSupported(format!(
                "surface '{}' is read-only",
                self.surface
            )));
        }
        self.commit(content)?;
        self.refresh_live()
    }

    /// Replace one diagram's source and commit.
    pub fn update_diagram(&mut self, id: &str, code: &str) -> Result<(), FormatError> {
        let mut registry = self.document.registry.clone();
        let applied = registry
            .set_code(id, code)
            .and_then(|_| match registry.get(id) {
                Some(record) => diagrams::apply(&self.document.segments, record),
                None => Err(FormatError::DiagramMismatch {
                    id: id.to_string(),
                    reason: "no diagram is registered under this id".to_string(),
                }),
            });
        let segments = match applied {
            Ok(segments) => segments,
            Err(err) => {
                if let FormatError::DiagramMismatch { id, reason } = &err {
                    self.sink.emit(EditorEvent::DiagramMismatch {
                        id: id.clone(),
                        reason: reason.clone(),
                    });
                }
                return Err(err);
            }
        };

        self.reload(codec::serialize(&segments));
        self.refresh_live()
    }

    /// Queue every diagram whose render is out of date. Returns the number of new jobs.
    pub fn schedule_renders(&mut self) -> usize {
        self.queue.enqueue_stale(&self.document.registry, &self.renders)
    }

    pub fn pending_renders(&self) -> usize {
        self.queue.len()
    }

    /// Render one queued diagram.
    pub fn render_step(&mut self, renderer: &dyn DiagramRenderer) -> Option<RenderReport> {
        let report = self.queue.step(renderer, &mut self.renders)?;
        match &report.result {
            Ok(()) => self.sink.emit(EditorEvent::RenderCompleted {
                id: report.id.clone(),
            }),
            Err(err) => {
                let message = match err {
                    FormatError::RenderFailure { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                self.sink.emit(EditorEvent::RenderFailed {
                    id: report.id.clone(),
                    message,
                });
            }
        }

        if let (Some(live), Some(record)) = (&self.live, self.document.registry.get(&report.id)) {
            if self.surface == "preview" {
                live.patch_diagram_render(&record.id, &self.renders, &record.code);
            }
        }
        Some(report)
    }

    /// Render everything outstanding. Returns how many jobs ran.
    pub fn render_pending(&mut self, renderer: &dyn DiagramRenderer) -> usize {
        self.schedule_renders();
        let mut ran = 0;
        while self.render_step(renderer).is_some() {
            ran += 1;
        }
        ran
    }

    pub fn selection_phase(&self) -> SelectionPhase {
        self.replacer.phase()
    }

    pub fn replacer(&self) -> &SelectionReplacer {
        &self.replacer
    }

    pub fn select(&mut self, range: DocumentRange) -> Result<SelectOutcome, FormatError> {
        let live = self.live.as_ref().ok_or_else(|| not_live(&self.surface))?;
        let outcome = self.replacer.select(live, range)?;
        if outcome == (SelectOutcome::Selected { superseded: true }) {
            self.sink.emit(EditorEvent::SelectionCancelled);
        }
        Ok(outcome)
    }

    /// Select the first occurrence of `text` in the live tree
    pub fn select_text(&mut self, text: &str) -> Result<SelectOutcome, FormatError> {
        let live = self.live.as_ref().ok_or_else(|| not_live(&self.surface))?;
        let range = live.find_text(text).ok_or_else(|| {
            FormatError::InvalidSelection(format!("{text:?} does not occur in the surface"))
        })?;
        self.select(range)
    }

    pub fn request_edit(&mut self, instruction: &str) -> Result<(EditTicket, EditRequest), FormatError> {
        let live = self.live.as_ref().ok_or_else(|| not_live(&self.surface))?;
        self.replacer.request_edit(live, instruction)
    }

    pub fn receive(&mut self, ticket: EditTicket, response: EditResponse) -> ReceiveOutcome {
        let outcome = self.replacer.receive(ticket, response);
        if let ReceiveOutcome::Failed(message) = &outcome {
            self.sink.emit(EditorEvent::EditFailed {
                message: message.clone(),
            });
        }
        outcome
    }

    /// Swap the ready replacement into the live tree and commit it.
    pub fn apply(&mut self) -> Result<SwapStrategy, FormatError> {
        let live = self.live.as_mut().ok_or_else(|| not_live(&self.surface))?;
        let strategy = match self.replacer.apply(live) {
            Ok(transaction) => transaction.strategy,
            Err(err) => {
                match &err {
                    FormatError::ReplacementNotFound(text) => {
                        self.sink
                            .emit(EditorEvent::ReplacementNotFound { text: text.clone() });
                        self.sink.emit(EditorEvent::SelectionCancelled);
                    }
                    // nothing was ready, so nothing was cancelled
                    FormatError::InvalidSelection(_) => {}
                    _ => self.sink.emit(EditorEvent::SelectionCancelled),
                }
                return Err(err);
            }
        };

        let before = self.document.clone();
        let committed = live.html().and_then(|html| self.commit(&html));
        if let Err(err) = committed {
            warn!(error = %err, "replacement could not be committed, reverting");
            if let Some(live) = self.live.as_mut() {
                self.replacer.undo(live)?;
            }
            return Err(err);
        }
        if let Some(live) = &self.live {
            live.resync_diagram_ids(&self.document.registry);
        }
        self.pre_apply = Some(before);

        let strategy_name = serde_json::to_value(strategy)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        self.sink.emit(EditorEvent::ReplacementApplied {
            strategy: strategy_name,
        });
        Ok(strategy)
    }

    pub fn decline(&mut self) -> bool {
        let cancelled = self.replacer.decline();
        if cancelled {
            self.sink.emit(EditorEvent::SelectionCancelled);
        }
        cancelled
    }

    pub fn close_panel(&mut self) -> bool {
        let cancelled = self.replacer.close_panel();
        if cancelled {
            self.sink.emit(EditorEvent::SelectionCancelled);
        }
        cancelled
    }

    /// Reverse the last applied replacement, restoring the exact prior storage text.
    pub fn undo(&mut self) -> Result<(), FormatError> {
        let live = self.live.as_mut().ok_or_else(|| not_live(&self.surface))?;
        let before = self.pre_apply.take().ok_or_else(|| {
            FormatError::InvalidSelection("no applied replacement to undo".to_string())
        })?;
        if let Err(err) = self.replacer.undo(live) {
            self.pre_apply = Some(before);
            return Err(err);
        }
        self.document = before;
        live.resync_diagram_ids(&self.document.registry);
        self.queue.enqueue_stale(&self.document.registry, &self.renders);
        self.sink.emit(EditorEvent::ReplacementUndone);
        self.emit_committed();
        Ok(())
    }

    fn context(&self) -> SurfaceContext<'_> {
        SurfaceContext::new(
            &self.document.segments,
            &self.document.registry,
            &self.options.catalog,
        )
        .with_renders(&self.renders)
    }

    fn commit(&mut self, content: &str) -> Result<(), FormatError> {
        let segments = self
            .surfaces
            .from_surface(content, &self.surface, &self.context())?;
        self.reload(codec::serialize(&segments));
        Ok(())
    }

    fn reload(&mut self, storage_text: String) {
        let (document, error) = Committed::parse(storage_text, &self.options.catalog);
        self.document = document;
        if let Some(err) = error {
            warn!(error = %err, "document degraded to source-only editing");
            self.sink.emit(EditorEvent::ParseDegraded {
                reason: err.to_string(),
            });
            self.surface = SOURCE_SURFACE.to_string();
        }
        self.queue.enqueue_stale(&self.document.registry, &self.renders);
        self.emit_committed();
    }

    fn emit_committed(&mut self) {
        debug!(
            surface = %self.surface,
            diagrams = self.document.registry.len(),
            "document committed"
        );
        self.sink.emit(EditorEvent::DocumentCommitted {
            surface: self.surface.clone(),
            diagrams: self.document.registry.len(),
        });
    }

    /// Rebuild the live tree from the committed document.
    fn refresh_live(&mut self) -> Result<(), FormatError> {
        self.replacer.forget_undo();
        self.pre_apply = None;
        self.live = if self.surfaces.get(&self.surface)?.is_live() {
            let html = self
                .surfaces
                .to_surface(&self.document.segments, &self.surface, &self.context())?;
            Some(LiveSurface::parse(&html)?)
        } else {
            None
        };
        Ok(())
    }
}

fn not_live(surface: &str) -> FormatError {
    FormatError::NotSupported(format!("surface '{surface}' has no live tree to select in"))
}
