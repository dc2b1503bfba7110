use chrono::{DateTime, Utc};

use crate::cell::{CellType, ExecutionStatus};
use crate::ids::{ActorId, CellId, QueueId, Seq};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metadata that accompanies every event: who produced it and when it was
/// built on the write path. The commit sequence lives on [`Committed`], not
/// here, because it is assigned by the log, not the producer.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventMetadata {
    pub actor: ActorId,
    pub at: DateTime<Utc>,
}

/// The closed set of notebook mutations. Payload shapes are immutable once
/// any replica has persisted events of a variant; evolution is additive-only.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type"))]
pub enum EventKind {
    CellInserted {
        id: CellId,
        fractional_index: String,
        cell_type: CellType,
        created_by: ActorId,
    },
    CellMoved {
        id: CellId,
        new_fractional_index: String,
    },
    CellDeleted {
        id: CellId,
    },
    CellSourceChanged {
        id: CellId,
        source: String,
        modified_by: ActorId,
    },
    CellTypeChanged {
        id: CellId,
        cell_type: CellType,
    },
    CellSourceVisibilityToggled {
        id: CellId,
        visible: bool,
        actor_id: ActorId,
    },
    CellOutputVisibilityToggled {
        id: CellId,
        visible: bool,
        actor_id: ActorId,
    },
    CellAiContextVisibilityToggled {
        id: CellId,
        visible: bool,
        actor_id: ActorId,
    },
    ExecutionRequested {
        cell_id: CellId,
        queue_id: QueueId,
        requested_by: ActorId,
        /// Execution count of the cell as seen by the requester.
        execution_count: u64,
    },
    /// Explicit work-started signal from the runtime agent. Optional in the
    /// protocol: replicas that never see it treat "running" as a UI-level
    /// inference from queued plus agent liveness.
    ExecutionStarted {
        cell_id: CellId,
        queue_id: QueueId,
        started_at: DateTime<Utc>,
    },
    ExecutionCompleted {
        cell_id: CellId,
        queue_id: QueueId,
        status: ExecutionStatus,
        completed_at: DateTime<Utc>,
    },
    NotebookTitleChanged {
        title: String,
    },
    NotebookMetadataSet {
        key: String,
        value: String,
    },
    /// Profile upsert. Absent optional fields leave the stored field
    /// untouched (per-field last-write-wins).
    ActorProfileSet {
        id: ActorId,
        display_name: Option<String>,
        actor_type: Option<crate::cell::ActorType>,
        avatar: Option<String>,
    },
}

impl EventKind {
    /// The cell a mutation targets, if it targets one.
    pub fn cell(&self) -> Option<&CellId> {
        match self {
            EventKind::CellInserted { id, .. }
            | EventKind::CellMoved { id, .. }
            | EventKind::CellDeleted { id }
            | EventKind::CellSourceChanged { id, .. }
            | EventKind::CellTypeChanged { id, .. }
            | EventKind::CellSourceVisibilityToggled { id, .. }
            | EventKind::CellOutputVisibilityToggled { id, .. }
            | EventKind::CellAiContextVisibilityToggled { id, .. } => Some(id),
            EventKind::ExecutionRequested { cell_id, .. }
            | EventKind::ExecutionStarted { cell_id, .. }
            | EventKind::ExecutionCompleted { cell_id, .. } => Some(cell_id),
            EventKind::NotebookTitleChanged { .. }
            | EventKind::NotebookMetadataSet { .. }
            | EventKind::ActorProfileSet { .. } => None,
        }
    }
}

/// Full event envelope as produced on the write path.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    pub meta: EventMetadata,
    pub kind: EventKind,
}

/// An event after the log assigned its commit sequence. Immutable; the
/// ordered stream of these is the sole source of truth.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Committed {
    pub seq: Seq,
    pub event: Event,
}

impl Event {
    pub fn new(actor: ActorId, at: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            meta: EventMetadata { actor, at },
            kind,
        }
    }

    pub fn cell_inserted(
        actor: &ActorId,
        at: DateTime<Utc>,
        id: CellId,
        fractional_index: impl Into<String>,
        cell_type: CellType,
    ) -> Self {
        Self::new(
            actor.clone(),
            at,
            EventKind::CellInserted {
                id,
                fractional_index: fractional_index.into(),
                cell_type,
                created_by: actor.clone(),
            },
        )
    }

    pub fn cell_moved(
        actor: &ActorId,
        at: DateTime<Utc>,
        id: CellId,
        new_fractional_index: impl Into<String>,
    ) -> Self {
        Self::new(
            actor.clone(),
            at,
            EventKind::CellMoved {
                id,
                new_fractional_index: new_fractional_index.into(),
            },
        )
    }

    pub fn cell_deleted(actor: &ActorId, at: DateTime<Utc>, id: CellId) -> Self {
        Self::new(actor.clone(), at, EventKind::CellDeleted { id })
    }

    pub fn cell_source_changed(
        actor: &ActorId,
        at: DateTime<Utc>,
        id: CellId,
        source: impl Into<String>,
    ) -> Self {
        Self::new(
            actor.clone(),
            at,
            EventKind::CellSourceChanged {
                id,
                source: source.into(),
                modified_by: actor.clone(),
            },
        )
    }

    pub fn execution_requested(
        actor: &ActorId,
        at: DateTime<Utc>,
        cell_id: CellId,
        queue_id: QueueId,
        execution_count: u64,
    ) -> Self {
        Self::new(
            actor.clone(),
            at,
            EventKind::ExecutionRequested {
                cell_id,
                queue_id,
                requested_by: actor.clone(),
                execution_count,
            },
        )
    }

    pub fn execution_started(
        actor: &ActorId,
        at: DateTime<Utc>,
        cell_id: CellId,
        queue_id: QueueId,
    ) -> Self {
        Self::new(
            actor.clone(),
            at,
            EventKind::ExecutionStarted {
                cell_id,
                queue_id,
                started_at: at,
            },
        )
    }

    pub fn execution_completed(
        actor: &ActorId,
        at: DateTime<Utc>,
        cell_id: CellId,
        queue_id: QueueId,
        status: ExecutionStatus,
    ) -> Self {
        Self::new(
            actor.clone(),
            at,
            EventKind::ExecutionCompleted {
                cell_id,
                queue_id,
                status,
                completed_at: at,
            },
        )
    }
}
