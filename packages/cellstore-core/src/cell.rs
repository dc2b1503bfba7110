use crate::ids::{ActorId, CellId, QueueId, Seq};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Kind of content a cell holds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CellType {
    Code,
    Markdown,
    Sql,
    Ai,
    Raw,
}

/// Per-cell execution lifecycle: idle -> queued -> running -> completed | error.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ExecutionState {
    Idle,
    Queued,
    Running,
    Completed,
    Error,
}

impl ExecutionState {
    /// Whether a new execution request may be accepted in this state.
    /// At most one outstanding queue id per cell: queued/running reject.
    pub fn can_accept_request(self) -> bool {
        matches!(
            self,
            ExecutionState::Idle | ExecutionState::Completed | ExecutionState::Error
        )
    }
}

/// Terminal outcome reported by an execution-completed event. Cancellation is
/// a forward transition like any other completion, never a history rollback.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ExecutionStatus {
    Success,
    Error,
    Cancelled,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ActorType {
    Human,
    Agent,
}

/// One materialized notebook cell. Rows live only inside a snapshot and are
/// mutated exclusively by the reducers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cell {
    pub id: CellId,
    /// Unique per live cell; lexicographic order over these strings is the
    /// canonical notebook order.
    pub fractional_index: String,
    pub cell_type: CellType,
    pub source: String,
    pub execution_state: ExecutionState,
    pub execution_count: u64,
    pub source_visible: bool,
    pub output_visible: bool,
    pub ai_context_visible: bool,
    pub created_by: ActorId,
    /// Latest accepted execution request; completions and starts for any
    /// other queue id are stale and discarded.
    pub last_queue_id: Option<QueueId>,
}

impl Cell {
    pub(crate) fn new(
        id: CellId,
        fractional_index: String,
        cell_type: CellType,
        created_by: ActorId,
    ) -> Self {
        Self {
            id,
            fractional_index,
            cell_type,
            source: String::new(),
            execution_state: ExecutionState::Idle,
            execution_count: 0,
            source_visible: true,
            output_visible: true,
            ai_context_visible: true,
            created_by,
            last_queue_id: None,
        }
    }
}

/// Profile of an actor. Upsert-only: fields merge last-write-wins per field,
/// never whole-record replacement.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Actor {
    pub id: ActorId,
    pub display_name: String,
    pub actor_type: ActorType,
    pub avatar: Option<String>,
}

/// Open entry in the per-notebook execution FIFO. Resolved (and dropped)
/// by the completion event carrying the same queue id.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QueueEntry {
    pub queue_id: QueueId,
    pub cell_id: CellId,
    pub requested_by: ActorId,
    /// Execution count of the cell at request time.
    pub execution_count: u64,
    /// Commit sequence of the request event; FIFO order.
    pub requested_at: Seq,
}
