use std::collections::{BTreeSet, HashMap};

use tracing::warn;

use crate::cell::{Actor, ActorType, Cell, ExecutionState, ExecutionStatus, QueueEntry};
use crate::events::{Committed, Event, EventKind};
use crate::frac_index;
use crate::ids::{ActorId, CellId, Seq};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Why an event materialized as a no-op. Anomalies are logged, never raised:
/// foreign replicas may legitimately send events the local replica can no
/// longer validate, and a single bad event must not stall the stream.
#[derive(Clone, Debug, PartialEq)]
pub enum Anomaly {
    DuplicateCell(CellId),
    UnknownCell(CellId),
    BadKey(CellId),
    /// Execution request while a request is already outstanding.
    RequestWhileBusy(CellId),
    /// Re-delivered queue id for a request already accepted or resolved.
    DuplicateQueue(CellId),
    /// Start or completion for a queue id that is not the cell's latest
    /// accepted request, or for a cell not queued/running.
    StaleQueue(CellId),
}

/// Result of materializing one event.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Applied,
    Ignored(Anomaly),
}

/// The materialized table set: a pure projection of the event log.
///
/// Reducers are deterministic (no I/O, no clock, no randomness), so
/// replaying the same committed sequence on any replica reproduces
/// bit-identical tables. Nothing outside this module mutates the tables.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Snapshot {
    pub(crate) version: u64,
    pub(crate) cells: HashMap<CellId, Cell>,
    /// Sorted (fractional_index, id) pairs; id is a tie-break safety net for
    /// the impossible-by-invariant equal-key case.
    pub(crate) order: BTreeSet<(String, CellId)>,
    pub(crate) actors: HashMap<ActorId, Actor>,
    pub(crate) title: String,
    pub(crate) metadata: HashMap<String, String>,
    pub(crate) queue: Vec<QueueEntry>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a committed event stream into a fresh snapshot, in stream order.
    pub fn replay<'a>(events: impl IntoIterator<Item = &'a Committed>) -> Self {
        let mut snapshot = Self::new();
        for committed in events {
            snapshot.apply(committed.seq, &committed.event);
        }
        snapshot
    }

    /// Apply one event in commit order. Rejections log and leave every table
    /// untouched; the version only advances on applied events.
    pub fn apply(&mut self, seq: Seq, event: &Event) -> Outcome {
        let outcome = self.reduce(seq, event);
        match &outcome {
            Outcome::Applied => self.version += 1,
            Outcome::Ignored(anomaly) => {
                warn!(seq, ?anomaly, "event ignored during materialization");
            }
        }
        outcome
    }

    /// Monotone change counter; bumps once per applied event.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn actor(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn metadata_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.metadata
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Open execution requests in FIFO order (by request commit sequence).
    pub fn open_queue(&self) -> &[QueueEntry] {
        &self.queue
    }

    fn reduce(&mut self, seq: Seq, event: &Event) -> Outcome {
        match &event.kind {
            EventKind::CellInserted {
                id,
                fractional_index,
                cell_type,
                created_by,
            } => {
                if self.cells.contains_key(id) {
                    return Outcome::Ignored(Anomaly::DuplicateCell(id.clone()));
                }
                if frac_index::validate_key(fractional_index).is_err() {
                    return Outcome::Ignored(Anomaly::BadKey(id.clone()));
                }
                self.order.insert((fractional_index.clone(), id.clone()));
                self.cells.insert(
                    id.clone(),
                    Cell::new(
                        id.clone(),
                        fractional_index.clone(),
                        *cell_type,
                        created_by.clone(),
                    ),
                );
                Outcome::Applied
            }
            EventKind::CellMoved {
                id,
                new_fractional_index,
            } => {
                if frac_index::validate_key(new_fractional_index).is_err() {
                    return Outcome::Ignored(Anomaly::BadKey(id.clone()));
                }
                let Some(cell) = self.cells.get_mut(id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(id.clone()));
                };
                self.order.remove(&(cell.fractional_index.clone(), id.clone()));
                self.order.insert((new_fractional_index.clone(), id.clone()));
                cell.fractional_index = new_fractional_index.clone();
                Outcome::Applied
            }
            EventKind::CellDeleted { id } => {
                let Some(cell) = self.cells.remove(id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(id.clone()));
                };
                self.order.remove(&(cell.fractional_index, id.clone()));
                // Open requests for the cell are orphaned; drop them so
                // readers never resurrect them.
                self.queue.retain(|entry| &entry.cell_id != id);
                Outcome::Applied
            }
            EventKind::CellSourceChanged { id, source, .. } => {
                let Some(cell) = self.cells.get_mut(id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(id.clone()));
                };
                // Last-write-wins by commit order; no field-level text merge.
                cell.source = source.clone();
                Outcome::Applied
            }
            EventKind::CellTypeChanged { id, cell_type } => {
                let Some(cell) = self.cells.get_mut(id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(id.clone()));
                };
                cell.cell_type = *cell_type;
                Outcome::Applied
            }
            EventKind::CellSourceVisibilityToggled { id, visible, .. } => {
                let Some(cell) = self.cells.get_mut(id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(id.clone()));
                };
                cell.source_visible = *visible;
                Outcome::Applied
            }
            EventKind::CellOutputVisibilityToggled { id, visible, .. } => {
                let Some(cell) = self.cells.get_mut(id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(id.clone()));
                };
                cell.output_visible = *visible;
                Outcome::Applied
            }
            EventKind::CellAiContextVisibilityToggled { id, visible, .. } => {
                let Some(cell) = self.cells.get_mut(id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(id.clone()));
                };
                cell.ai_context_visible = *visible;
                Outcome::Applied
            }
            EventKind::ExecutionRequested {
                cell_id,
                queue_id,
                requested_by,
                execution_count,
            } => {
                let Some(cell) = self.cells.get_mut(cell_id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(cell_id.clone()));
                };
                if cell.last_queue_id.as_ref() == Some(queue_id)
                    || self.queue.iter().any(|entry| &entry.queue_id == queue_id)
                {
                    return Outcome::Ignored(Anomaly::DuplicateQueue(cell_id.clone()));
                }
                if !cell.execution_state.can_accept_request() {
                    return Outcome::Ignored(Anomaly::RequestWhileBusy(cell_id.clone()));
                }
                cell.execution_state = ExecutionState::Queued;
                cell.last_queue_id = Some(queue_id.clone());
                self.queue.push(QueueEntry {
                    queue_id: queue_id.clone(),
                    cell_id: cell_id.clone(),
                    requested_by: requested_by.clone(),
                    execution_count: *execution_count,
                    requested_at: seq,
                });
                Outcome::Applied
            }
            EventKind::ExecutionStarted {
                cell_id, queue_id, ..
            } => {
                let Some(cell) = self.cells.get_mut(cell_id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(cell_id.clone()));
                };
                if cell.last_queue_id.as_ref() != Some(queue_id)
                    || cell.execution_state != ExecutionState::Queued
                {
                    return Outcome::Ignored(Anomaly::StaleQueue(cell_id.clone()));
                }
                cell.execution_state = ExecutionState::Running;
                Outcome::Applied
            }
            EventKind::ExecutionCompleted {
                cell_id,
                queue_id,
                status,
                ..
            } => {
                let Some(cell) = self.cells.get_mut(cell_id) else {
                    return Outcome::Ignored(Anomaly::UnknownCell(cell_id.clone()));
                };
                let active = matches!(
                    cell.execution_state,
                    ExecutionState::Queued | ExecutionState::Running
                );
                if cell.last_queue_id.as_ref() != Some(queue_id) || !active {
                    return Outcome::Ignored(Anomaly::StaleQueue(cell_id.clone()));
                }
                self.queue.retain(|entry| &entry.queue_id != queue_id);
                match status {
                    ExecutionStatus::Success => {
                        cell.execution_count += 1;
                        cell.execution_state = ExecutionState::Completed;
                    }
                    ExecutionStatus::Error | ExecutionStatus::Cancelled => {
                        cell.execution_state = ExecutionState::Error;
                    }
                }
                Outcome::Applied
            }
            EventKind::NotebookTitleChanged { title } => {
                self.title = title.clone();
                Outcome::Applied
            }
            EventKind::NotebookMetadataSet { key, value } => {
                self.metadata.insert(key.clone(), value.clone());
                Outcome::Applied
            }
            EventKind::ActorProfileSet {
                id,
                display_name,
                actor_type,
                avatar,
            } => {
                let actor = self.actors.entry(id.clone()).or_insert_with(|| Actor {
                    id: id.clone(),
                    display_name: String::new(),
                    actor_type: ActorType::Human,
                    avatar: None,
                });
                // Per-field last-write-wins: absent fields never null
                // out previously written values.
                if let Some(name) = display_name {
                    actor.display_name = name.clone();
                }
                if let Some(kind) = actor_type {
                    actor.actor_type = *kind;
                }
                if let Some(avatar) = avatar {
                    actor.avatar = Some(avatar.clone());
                }
                Outcome::Applied
            }
        }
    }
}
