//! Diagram rendering queue
//!
//! Rendering is delegated to a host-supplied [`DiagramRenderer`]. The queue runs one job per
//! [`RenderQueue::step`] so a host can interleave rendering with input handling; a failing
//! diagram records its error and never blocks the others.

use super::DiagramRegistry;
use crate::error::FormatError;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

/// Turns diagram source into markup (typically SVG), or explains why it could not.
pub trait DiagramRenderer {
    fn render(&self, source: &str) -> Result<String, String>;
}

impl<F> DiagramRenderer for F
where
    F: Fn(&str) -> Result<String, String>,
{
    fn render(&self, source: &str) -> Result<String, String> {
        self(source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Pending,
    Rendered(String),
    Failed(String),
}

#[derive(Debug, Clone)]
struct CachedRender {
    source: String,
    outcome: RenderOutcome,
}

/// Render results keyed by diagram id, valid only for the source they were produced from
#[derive(Debug, Clone, Default)]
pub struct RenderCache {
    entries: HashMap<String, CachedRender>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome for `id`, or `Pending` when nothing was rendered for this exact source.
    pub fn outcome(&self, id: &str, source: &str) -> RenderOutcome {
        match self.entries.get(id) {
            Some(entry) if entry.source == source => entry.outcome.clone(),
            _ => RenderOutcome::Pending,
        }
    }

    pub fn is_current(&self, id: &str, source: &str) -> bool {
        self.entries
            .get(id)
            .is_some_and(|entry| entry.source == source)
    }

    pub fn store(&mut self, id: &str, source: &str, outcome: RenderOutcome) {
        self.entries.insert(
            id.to_string(),
            CachedRender {
                source: source.to_string(),
                outcome,
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub id: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderReport {
    pub id: String,
    pub result: Result<(), FormatError>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderQueue {
    pending: VecDeque<RenderJob>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue every diagram whose cached render does not match its live code.
    ///
    /// Jobs for sources the registry no longer holds are dropped first.
    pub fn enqueue_stale(&mut self, registry: &DiagramRegistry, cache: &RenderCache) -> usize {
        self.pending.retain(|job| {
            registry
                .get(&job.id)
                .is_some_and(|record| record.code == job.source)
        });
        let mut added = 0;
        for record in registry.diagrams() {
            if cache.is_current(&record.id, &record.code)
                || self.pending.iter().any(|job| job.id == record.id && job.source == record.code)
            {
                continue;
            }
            self.pending.push_back(RenderJob {
                id: record.id.clone(),
                source: record.code.clone(),
            });
            added += 1;
        }
        added
    }

    pub fn push(&mut self, job: RenderJob) {
        self.pending.push_back(job);
    }

    /// Render the next job. Returns `None` when the queue is empty.
    pub fn step(&mut self, renderer: &dyn DiagramRenderer, cache: &mut RenderCache) -> Option<RenderReport> {
        let job = self.pending.pop_front()?;
        let result = match renderer.render(&job.source) {
            Ok(markup) => {
                debug!(id = %job.id, "diagram rendered");
                cache.store(&job.id, &job.source, RenderOutcome::Rendered(markup));
                Ok(())
            }
            Err(message) => {
                warn!(id = %job.id, error = %message, "diagram failed to render");
                cache.store(&job.id, &job.source, RenderOutcome::Failed(message.clone()));
                Err(FormatError::RenderFailure {
                    id: job.id.clone(),
                    message,
                })
            }
        };
        Some(RenderReport { id: job.id, result })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
