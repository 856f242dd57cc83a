//! Manual reordering of sequenced rows.
//!
//! The engine only decides *what* to ask the server for; it never touches
//! the rows it was given. Gesture input (drag and drop) and direct
//! [`ReorderRequest`]s both end up in the same `Committing` phase.

use serde::{Deserialize, Serialize};
use shared::{
    domain::{RecordId, SiblingScope},
    protocol::UpdateSequenceRequest,
};
use thiserror::Error;

use crate::normalize::CanonicalRow;

/// Move `source_id` to the slot currently held by `target_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub source_id: RecordId,
    pub target_id: RecordId,
    pub new_sequence_number: i64,
    pub scope: SiblingScope,
}

impl ReorderRequest {
    /// Builds the request for dropping `source` onto `target`. `None` when
    /// the drop is a no-op (same row).
    pub fn between(
        source: &CanonicalRow,
        target: &CanonicalRow,
    ) -> Result<Option<Self>, ReorderError> {
        if source.id == target.id {
            return Ok(None);
        }
        if source.scope() != target.scope() {
            return Err(ReorderError::CrossScope {
                source_scope: source.scope(),
                target_scope: target.scope(),
            });
        }
        Ok(Some(Self {
            source_id: source.id,
            target_id: target.id,
            new_sequence_number: target.sequence_number,
            scope: source.scope(),
        }))
    }

    pub fn to_wire(&self) -> UpdateSequenceRequest {
        UpdateSequenceRequest {
            id: self.source_id,
            new_seq_no: self.new_sequence_number,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReorderError {
    #[error("a sequence update is already in flight")]
    Busy,
    #[error("no drag in progress")]
    NotDragging,
    #[error("row {0} is not in the current list")]
    UnknownRow(RecordId),
    #[error("rows belong to different sibling collections ({source_scope} vs {target_scope})")]
    CrossScope {
        source_scope: SiblingScope,
        target_scope: SiblingScope,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReorderPhase {
    #[default]
    Idle,
    Dragging {
        source: RecordId,
    },
    HoverTarget {
        source: RecordId,
        target: RecordId,
    },
    Committing {
        request: ReorderRequest,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Dropped on itself, or released without hovering a target.
    NoOp,
    Commit(ReorderRequest),
}

#[derive(Debug, Default)]
pub struct ReorderEngine {
    phase: ReorderPhase,
}

impl ReorderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ReorderPhase {
        self.phase
    }

    pub fn is_committing(&self) -> bool {
        matches!(self.phase, ReorderPhase::Committing { .. })
    }

    fn ensure_not_committing(&self) -> Result<(), ReorderError> {
        if self.is_committing() {
            Err(ReorderError::Busy)
        } else {
            Ok(())
        }
    }

    /// Starting a new drag while a commit is in flight is refused.
    pub fn drag_start(&mut self, source: RecordId) -> Result<(), ReorderError> {
        self.ensure_not_committing()?;
        self.phase = ReorderPhase::Dragging { source };
        Ok(())
    }

    /// Repeatable; the last hovered target wins.
    pub fn drag_over(&mut self, target: RecordId) -> Result<(), ReorderError> {
        let source = match self.phase {
            ReorderPhase::Dragging { source } | ReorderPhase::HoverTarget { source, .. } => source,
            ReorderPhase::Committing { .. } => return Err(ReorderError::Busy),
            ReorderPhase::Idle => return Err(ReorderError::NotDragging),
        };
        self.phase = ReorderPhase::HoverTarget { source, target };
        Ok(())
    }

    pub fn drag_cancel(&mut self) {
        if !self.is_committing() {
            self.phase = ReorderPhase::Idle;
        }
    }

    /// Resolves the drop against the rows currently on screen.
    pub fn drop(&mut self, rows: &[CanonicalRow]) -> Result<DropOutcome, ReorderError> {
        let (source, target) = match self.phase {
            ReorderPhase::HoverTarget { source, target } => (source, target),
            ReorderPhase::Dragging { .. } => {
                self.phase = ReorderPhase::Idle;
                return Ok(DropOutcome::NoOp);
            }
            ReorderPhase::Committing { .. } => return Err(ReorderError::Busy),
            ReorderPhase::Idle => return Err(ReorderError::NotDragging),
        };

        let outcome = Self::resolve(rows, source, target);
        match outcome {
            Ok(Some(request)) => {
                self.phase = ReorderPhase::Committing { request };
                Ok(DropOutcome::Commit(request))
            }
            Ok(None) => {
                self.phase = ReorderPhase::Idle;
                Ok(DropOutcome::NoOp)
            }
            Err(err) => {
                self.phase = ReorderPhase::Idle;
                Err(err)
            }
        }
    }

    fn resolve(
        rows: &[CanonicalRow],
        source: RecordId,
        target: RecordId,
    ) -> Result<Option<ReorderRequest>, ReorderError> {
        if source == target {
            return Ok(None);
        }
        let find = |id: RecordId| {
            rows.iter()
                .find(|row| row.id == id)
                .ok_or(ReorderError::UnknownRow(id))
        };
        ReorderRequest::between(find(source)?, find(target)?)
    }

    /// Enters `Committing` for a request built without a drag gesture.
    pub fn submit(&mut self, request: ReorderRequest) -> Result<DropOutcome, ReorderError> {
        self.ensure_not_committing()?;
        if request.source_id == request.target_id {
            self.phase = ReorderPhase::Idle;
            return Ok(DropOutcome::NoOp);
        }
        self.phase = ReorderPhase::Committing { request };
        Ok(DropOutcome::Commit(request))
    }

    /// Leaves `Committing` once the server answered, whatever the answer.
    pub fn finish(&mut self) -> Option<ReorderRequest> {
        match self.phase {
            ReorderPhase::Committing { request } => {
                self.phase = ReorderPhase::Idle;
                Some(request)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "tests/reorder_tests.rs"]
mod tests;
