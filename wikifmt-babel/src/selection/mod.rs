//! Selection replacement
//!
//!     A user selects a span of the live surface, asks an external edit service to rewrite it,
//!     and the returned fragment replaces exactly that span.
//!
//! State Machine
//!
//!     Idle ──select──▶ Selected ──request_edit──▶ AwaitingExternalEdit ──receive(ok)──▶ ReadyToApply
//!                         ▲                              │                              │
//!                         └──────── receive(failure) ────┘                      apply / decline
//!                                                                                       ▼
//!                                                                            Applied | Cancelled
//!
//!     A new valid selection supersedes whatever was in flight; a response carrying an older
//!     ticket is discarded. `close_panel` cancels from any state.
//!
//! The replacer only touches the live tree. The session commits that tree right after
//! `apply` and `undo` (see ../session.rs).

pub mod range;
pub mod sanitize;
pub mod swap;

use crate::error::FormatError;
use range::{DocumentRange, LiveSurface, SelectionAnchor};
use sanitize::{sanitize_fragment, SanitizePolicy};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use swap::{SwapStrategy, UndoRecord};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRules {
    /// Shorter selections are treated as accidental
    pub min_selection_chars: usize,
    /// Characters of context sent on each side of the selection
    pub context_chars: usize,
}

impl Default for SelectionRules {
    fn default() -> Self {
        SelectionRules {
            min_selection_chars: 3,
            context_chars: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPhase {
    Idle,
    Selected,
    AwaitingExternalEdit,
    ReadyToApply,
    Applied,
    Cancelled,
}

/// Identifies one outstanding external edit request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EditTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequest {
    pub selected_text: String,
    pub surrounding_context: String,
    pub user_instruction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EditResponse {
    pub fn success(edited_text: impl Into<String>) -> Self {
        EditResponse {
            success: true,
            edited_text: Some(edited_text.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        EditResponse {
            success: false,
            edited_text: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Collapsed or too short; the previous state is untouched
    Ignored,
    /// Reaches into a macro placeholder; the previous state is untouched
    Rejected,
    Selected { superseded: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Ready,
    /// Stale ticket, or nothing is waiting any more
    Discarded,
    Failed(String),
}

/// An applied replacement, kept for one undo
#[derive(Debug, Clone)]
pub struct ReplacementTransaction {
    pub anchor: SelectionAnchor,
    pub incoming_fragment: String,
    pub applied_at: SystemTime,
    pub strategy: SwapStrategy,
    undo: UndoRecord,
}

#[derive(Debug, Clone)]
enum SelectionState {
    Idle,
    Selected {
        anchor: SelectionAnchor,
    },
    AwaitingExternalEdit {
        anchor: SelectionAnchor,
        ticket: EditTicket,
    },
    ReadyToApply {
        anchor: SelectionAnchor,
        fragment: String,
    },
    Applied,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SelectionReplacer {
    rules: SelectionRules,
    policy: SanitizePolicy,
    state: SelectionState,
    next_ticket: u64,
    last_applied: Option<ReplacementTransaction>,
}

impl Default for SelectionReplacer {
    fn default() -> Self {
        SelectionReplacer::new(SelectionRules::default(), SanitizePolicy::default())
    }
}

impl SelectionReplacer {
    pub fn new(rules: SelectionRules, policy: SanitizePolicy) -> Self {
        SelectionReplacer {
            rules,
            policy,
            state: SelectionState::Idle,
            next_ticket: 1,
            last_applied: None,
        }
    }

    pub fn rules(&self) -> &SelectionRules {
        &self.rules
    }

    pub fn phase(&self) -> SelectionPhase {
        match self.state {
            SelectionState::Idle => SelectionPhase::Idle,
            SelectionState::Selected { .. } => SelectionPhase::Selected,
            SelectionState::AwaitingExternalEdit { .. } => SelectionPhase::AwaitingExternalEdit,
            SelectionState::ReadyToApply { .. } => SelectionPhase::ReadyToApply,
            SelectionState::Applied => SelectionPhase::Applied,
            SelectionState::Cancelled => SelectionPhase::Cancelled,
        }
    }

    pub fn anchor(&self) -> Option<&SelectionAnchor> {
        match &self.state {
            SelectionState::Selected { anchor }
            | SelectionState::AwaitingExternalEdit { anchor, .. }
            | SelectionState::ReadyToApply { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    /// The sanitized candidate waiting to be applied
    pub fn pending_fragment(&self) -> Option<&str> {
        match &self.state {
            SelectionState::ReadyToApply { fragment, .. } => Some(fragment),
            _ => None,
        }
    }

    pub fn last_transaction(&self) -> Option<&ReplacementTransaction> {
        self.last_applied.as_ref()
    }

    fn in_flight(&self) -> bool {
        matches!(
            self.state,
            SelectionState::Selected { .. }
                | SelectionState::AwaitingExternalEdit { .. }
                | SelectionState::ReadyToApply { .. }
        )
    }

    pub fn select(
        &mut self,
        live: &LiveSurface,
        range: DocumentRange,
    ) -> Result<SelectOutcome, FormatError> {
        if range.is_collapsed() {
            return Ok(SelectOutcome::Ignored);
        }
        if live.crosses_placeholder(&range) {
            debug!("selection reaches into a macro placeholder, rejected");
            return Ok(SelectOutcome::Rejected);
        }
        let anchor = SelectionAnchor::capture(live, range)?;
        if anchor.captured_text.trim().chars().count() < self.rules.min_selection_chars {
            debug!(text = %anchor.captured_text, "selection below threshold, ignored");
            return Ok(SelectOutcome::Ignored);
        }

        let superseded = self.in_flight();
        if superseded {
            debug!("new selection supersedes the previous one");
        }
        self.state = SelectionState::Selected { anchor };
        Ok(SelectOutcome::Selected { superseded })
    }

    /// Build the request for the external edit service and start waiting for its answer.
    pub fn request_edit(
        &mut self,
        live: &LiveSurface,
        instruction: &str,
    ) -> Result<(EditTicket, EditRequest), FormatError> {
        let SelectionState::Selected { anchor } = &self.state else {
            return Err(FormatError::InvalidSelection(
                "an edit can only be requested for a fresh selection".to_string(),
            ));
        };
        let anchor = anchor.clone();
        let request = EditRequest {
            selected_text: anchor.captured_text.clone(),
            surrounding_context: surrounding_context(live, &anchor, self.rules.context_chars),
            user_instruction: instruction.to_string(),
        };
        let ticket = EditTicket(self.next_ticket);
        self.next_ticket += 1;
        self.state = SelectionState::AwaitingExternalEdit { anchor, ticket };
        Ok((ticket, request))
    }

    pub fn receive(&mut self, ticket: EditTicket, response: EditResponse) -> ReceiveOutcome {
        let anchor = match &self.state {
            SelectionState::AwaitingExternalEdit {
                anchor,
                ticket: waiting,
            } if *waiting == ticket => anchor.clone(),
            _ => {
                debug!(ticket = ticket.0, "response for a superseded request, discarded");
                return ReceiveOutcome::Discarded;
            }
        };

        let edited = response.edited_text.filter(|text| !text.trim().is_empty());
        let failure = match (response.success, edited) {
            (true, Some(text)) => match sanitize_fragment(&text, &self.policy) {
                Ok(fragment) if !fragment.trim().is_empty() => {
                    self.state = SelectionState::ReadyToApply { anchor, fragment };
                    return ReceiveOutcome::Ready;
                }
                Ok(_) => "the edited text was empty after sanitizing".to_string(),
                Err(e) => e.to_string(),
            },
            (true, None) => "the edit service returned no text".to_string(),
            (false, _) => response
                .error
                .unwrap_or_else(|| "the edit service reported a failure".to_string()),
        };
        warn!(error = %failure, "external edit failed");
        self.state = SelectionState::Selected { anchor };
        ReceiveOutcome::Failed(failure)
    }

    /// Swap the candidate into the live tree.
    ///
    /// On `ReplacementNotFound` the tree is unchanged and the selection is cancelled.
    pub fn apply(&mut self, live: &mut LiveSurface) -> Result<&ReplacementTransaction, FormatError> {
        let SelectionState::ReadyToApply { anchor, fragment } = &self.state else {
            return Err(FormatError::InvalidSelection(
                "no replacement is ready to apply".to_string(),
            ));
        };
        let (anchor, fragment) = (anchor.clone(), fragment.clone());

        match swap::swap(live, &anchor, &fragment) {
            Ok((strategy, undo)) => {
                info!(?strategy, "replacement applied");
                self.state = SelectionState::Applied;
                Ok(self.last_applied.insert(ReplacementTransaction {
                    anchor,
                    incoming_fragment: fragment,
                    applied_at: SystemTime::now(),
                    strategy,
                    undo,
                }))
            }
            Err(e) => {
                self.state = SelectionState::Cancelled;
                Err(e)
            }
        }
    }

    /// Reject the candidate (or abandon the request); nothing is mutated.
    pub fn decline(&mut self) -> bool {
        if self.in_flight() {
            self.state = SelectionState::Cancelled;
            true
        } else {
            false
        }
    }

    /// The edit panel was closed: any late response is discarded.
    pub fn close_panel(&mut self) -> bool {
        let cancelled = self.in_flight();
        self.state = if cancelled {
            SelectionState::Cancelled
        } else {
            SelectionState::Idle
        };
        cancelled
    }

    /// Reverse the last applied replacement.
    pub fn undo(&mut self, live: &mut LiveSurface) -> Result<ReplacementTransaction, FormatError> {
        let transaction = self.last_applied.take().ok_or_else(|| {
            FormatError::InvalidSelection("no applied replacement to undo".to_string())
        })?;
        if let Err(e) = swap::undo(live, &transaction.undo) {
            self.last_applied = Some(transaction);
            return Err(e);
        }
        self.state = SelectionState::Idle;
        Ok(transaction)
    }

    /// Forget the undo record (e.g. after the surface was reloaded).
    pub fn forget_undo(&mut self) {
        self.last_applied = None;
    }
}

/// Up to `chars` characters on each side of the selection, with the selection itself.
fn surrounding_context(live: &LiveSurface, anchor: &SelectionAnchor, chars: usize) -> String {
    let range = &anchor.document_range;
    let (Some(start), Some(end)) = (live.offset_of(&range.start), live.offset_of(&range.end)) else {
        return anchor.captured_text.clone();
    };
    let from = start.saturating_sub(chars);
    live.text()
        .chars()
        .skip(from)
        .take(end + chars - from)
        .collect()
}
