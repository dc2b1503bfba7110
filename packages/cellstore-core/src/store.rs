use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use crate::cell::{ActorType, CellType, ExecutionState, ExecutionStatus};
use crate::error::{Error, Result};
use crate::events::{Committed, Event, EventKind};
use crate::frac_index;
use crate::ids::{ActorId, CellId, QueueId, Seq};
use crate::snapshot::Snapshot;
use crate::subscription::{Query, QueryResult, SubscriptionId, Subscriptions};

/// Tuning for the optional key-rebalancing pass. Correctness never depends
/// on rebalancing; it only bounds key growth in hot insertion regions.
#[derive(Clone, Copy, Debug)]
pub struct RebalanceConfig {
    /// Longest tolerated live key before a rebalance rewrites the notebook's
    /// keys to evenly spaced minimal-length ones.
    pub max_key_len: usize,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self { max_key_len: 24 }
    }
}

/// What `ingest_remote` did with a delivered batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Previously unseen events materialized into the tables.
    pub applied: usize,
    /// Sequences already held by a different event: provisional local
    /// commits collided with the authoritative numbering.
    pub divergent: usize,
}

impl IngestReport {
    /// True when the replica must `reconcile` against the canonical log.
    pub fn needs_reconcile(&self) -> bool {
        self.divergent > 0
    }
}

/// One replica of the notebook: the local append-only event log plus the
/// snapshot materialized from it.
///
/// All mutation goes through `commit`/`ingest_remote`/`reconcile`; the
/// convenience helpers below only build events (computing fractional keys and
/// minting queue ids on the write path) and commit them. Application is
/// single-threaded and synchronous: local commits materialize immediately,
/// before any network round-trip.
pub struct NotebookStore {
    actor: ActorId,
    log: Vec<Committed>,
    next_seq: Seq,
    snapshot: Snapshot,
    rebalance: RebalanceConfig,
    subscriptions: Subscriptions,
    rng: StdRng,
}

impl NotebookStore {
    pub fn new(actor: ActorId) -> Self {
        Self::with_rng(actor, StdRng::from_entropy())
    }

    /// Deterministic store for tests: seeded key entropy and queue ids.
    pub fn with_seed(actor: ActorId, seed: u64) -> Self {
        Self::with_rng(actor, StdRng::seed_from_u64(seed))
    }

    fn with_rng(actor: ActorId, rng: StdRng) -> Self {
        Self {
            actor,
            log: Vec::new(),
            next_seq: 0,
            snapshot: Snapshot::new(),
            rebalance: RebalanceConfig::default(),
            subscriptions: Subscriptions::default(),
            rng,
        }
    }

    pub fn with_rebalance_config(mut self, config: RebalanceConfig) -> Self {
        self.rebalance = config;
        self
    }

    pub fn actor_id(&self) -> &ActorId {
        &self.actor
    }

    /// Current materialized tables. Read-only; queries live on [`Snapshot`].
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The committed local log, in commit order.
    pub fn log(&self) -> &[Committed] {
        &self.log
    }

    /// Append one event, materialize it, and dispatch subscriptions.
    pub fn commit(&mut self, event: Event) -> Seq {
        let seq = self.append(event);
        self.subscriptions.notify(&self.snapshot);
        seq
    }

    /// Append a batch atomically: events materialize in array order, and
    /// subscribers see only the post-batch state.
    pub fn commit_batch(&mut self, events: impl IntoIterator<Item = Event>) -> Option<(Seq, Seq)> {
        let mut range: Option<(Seq, Seq)> = None;
        for event in events {
            let seq = self.append(event);
            range = Some(match range {
                Some((first, _)) => (first, seq),
                None => (seq, seq),
            });
        }
        if range.is_some() {
            self.subscriptions.notify(&self.snapshot);
        }
        range
    }

    fn append(&mut self, event: Event) -> Seq {
        let seq = self.next_seq;
        self.next_seq += 1;
        let outcome = self.snapshot.apply(seq, &event);
        trace!(seq, ?outcome, "committed local event");
        self.log.push(Committed { seq, event });
        seq
    }

    /// Apply an ordered batch delivered by the sync collaborator. Delivery is
    /// at-least-once: a sequence already held with the identical event is a
    /// duplicate and is skipped. A sequence already held with a different
    /// event is a collision between a provisional local commit and the
    /// authoritative numbering; the event is not applied, and the report
    /// flags the replica as needing `reconcile`.
    pub fn ingest_remote(&mut self, batch: impl IntoIterator<Item = Committed>) -> IngestReport {
        let mut report = IngestReport::default();
        for committed in batch {
            if committed.seq < self.next_seq {
                let held = self
                    .log
                    .binary_search_by_key(&committed.seq, |entry| entry.seq);
                match held {
                    Ok(at) if self.log[at].event == committed.event => {
                        trace!(seq = committed.seq, "duplicate delivery skipped");
                    }
                    _ => {
                        warn!(
                            seq = committed.seq,
                            "remote event collides with a provisional local seq"
                        );
                        report.divergent += 1;
                    }
                }
                continue;
            }
            self.snapshot.apply(committed.seq, &committed.event);
            self.next_seq = committed.seq + 1;
            self.log.push(committed);
            report.applied += 1;
        }
        if report.applied > 0 {
            self.subscriptions.notify(&self.snapshot);
        }
        report
    }

    /// Replace the provisional local order with the authoritative one:
    /// discard the materialized tables and replay the canonical log. Pure
    /// recomputation; no side effect beyond new tables and one dispatch.
    pub fn reconcile(&mut self, canonical: Vec<Committed>) {
        self.snapshot = Snapshot::replay(&canonical);
        self.next_seq = canonical.last().map(|c| c.seq + 1).unwrap_or(0);
        self.log = canonical;
        self.subscriptions.notify(&self.snapshot);
    }

    pub fn subscribe(
        &mut self,
        query: Query,
        callback: impl FnMut(&QueryResult) + 'static,
    ) -> SubscriptionId {
        self.subscriptions.subscribe(query, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    // ---- cell mutation helpers ------------------------------------------

    pub fn insert_cell_at_end(&mut self, id: CellId, cell_type: CellType) -> Result<Seq> {
        let low = self
            .snapshot
            .last_cell()
            .map(|cell| cell.fractional_index.clone());
        let key = frac_index::key_between(low.as_deref(), None, &mut self.rng)?;
        let event = Event::cell_inserted(&self.actor, Utc::now(), id, key, cell_type);
        Ok(self.commit(event))
    }

    pub fn insert_cell_after(
        &mut self,
        anchor: &CellId,
        id: CellId,
        cell_type: CellType,
    ) -> Result<Seq> {
        let (low, high) = self.bounds_around(anchor)?;
        let key = frac_index::key_between(Some(&low), high.as_deref(), &mut self.rng)?;
        let event = Event::cell_inserted(&self.actor, Utc::now(), id, key, cell_type);
        Ok(self.commit(event))
    }

    pub fn insert_cell_before(
        &mut self,
        anchor: &CellId,
        id: CellId,
        cell_type: CellType,
    ) -> Result<Seq> {
        let cell = self
            .snapshot
            .cell(anchor)
            .ok_or_else(|| Error::UnknownCell(anchor.to_string()))?;
        let high = cell.fractional_index.clone();
        let low = self
            .snapshot
            .neighbors_of(anchor)
            .and_then(|(before, _)| before.map(|c| c.fractional_index.clone()));
        let key = frac_index::key_between(low.as_deref(), Some(&high), &mut self.rng)?;
        let event = Event::cell_inserted(&self.actor, Utc::now(), id, key, cell_type);
        Ok(self.commit(event))
    }

    /// Move a cell directly after `anchor` (`None` = to the front).
    pub fn move_cell_after(&mut self, id: &CellId, anchor: Option<&CellId>) -> Result<Seq> {
        if self.snapshot.cell(id).is_none() {
            return Err(Error::UnknownCell(id.to_string()));
        }
        let (low, high) = match anchor {
            Some(anchor) => {
                let (low, mut high) = self.bounds_around(anchor)?;
                // skip the moved cell itself as the upper bound
                if self.snapshot.cell(id).map(|c| c.fractional_index.as_str()) == high.as_deref() {
                    high = self
                        .snapshot
                        .cells_after(&low, 2)
                        .into_iter()
                        .find(|c| &c.id != id)
                        .map(|c| c.fractional_index.clone());
                }
                (Some(low), high)
            }
            None => {
                let high = self
                    .snapshot
                    .ordered_cells()
                    .into_iter()
                    .find(|c| &c.id != id)
                    .map(|c| c.fractional_index.clone());
                (None, high)
            }
        };
        let key = frac_index::key_between(low.as_deref(), high.as_deref(), &mut self.rng)?;
        let event = Event::cell_moved(&self.actor, Utc::now(), id.clone(), key);
        Ok(self.commit(event))
    }

    pub fn delete_cell(&mut self, id: &CellId) -> Result<Seq> {
        self.require_cell(id)?;
        let event = Event::cell_deleted(&self.actor, Utc::now(), id.clone());
        Ok(self.commit(event))
    }

    pub fn set_cell_source(&mut self, id: &CellId, source: impl Into<String>) -> Result<Seq> {
        self.require_cell(id)?;
        let event = Event::cell_source_changed(&self.actor, Utc::now(), id.clone(), source);
        Ok(self.commit(event))
    }

    pub fn set_cell_type(&mut self, id: &CellId, cell_type: CellType) -> Result<Seq> {
        self.require_cell(id)?;
        let event = Event::new(
            self.actor.clone(),
            Utc::now(),
            EventKind::CellTypeChanged {
                id: id.clone(),
                cell_type,
            },
        );
        Ok(self.commit(event))
    }

    pub fn toggle_source_visibility(&mut self, id: &CellId, visible: bool) -> Result<Seq> {
        self.require_cell(id)?;
        let event = Event::new(
            self.actor.clone(),
            Utc::now(),
            EventKind::CellSourceVisibilityToggled {
                id: id.clone(),
                visible,
                actor_id: self.actor.clone(),
            },
        );
        Ok(self.commit(event))
    }

    pub fn toggle_output_visibility(&mut self, id: &CellId, visible: bool) -> Result<Seq> {
        self.require_cell(id)?;
        let event = Event::new(
            self.actor.clone(),
            Utc::now(),
            EventKind::CellOutputVisibilityToggled {
                id: id.clone(),
                visible,
                actor_id: self.actor.clone(),
            },
        );
        Ok(self.commit(event))
    }

    pub fn toggle_ai_context_visibility(&mut self, id: &CellId, visible: bool) -> Result<Seq> {
        self.require_cell(id)?;
        let event = Event::new(
            self.actor.clone(),
            Utc::now(),
            EventKind::CellAiContextVisibilityToggled {
                id: id.clone(),
                visible,
                actor_id: self.actor.clone(),
            },
        );
        Ok(self.commit(event))
    }

    // ---- execution queue helpers ----------------------------------------

    /// Request execution of a cell, minting a fresh queue id. The reducer
    /// enforces the at-most-one-outstanding guard for remote events too;
    /// this local pre-check just surfaces the rejection to the caller.
    pub fn request_execution(&mut self, id: &CellId) -> Result<QueueId> {
        let cell = self
            .snapshot
            .cell(id)
            .ok_or_else(|| Error::UnknownCell(id.to_string()))?;
        if !cell.execution_state.can_accept_request() {
            return Err(Error::InvalidEvent(format!(
                "execution already pending for {id}"
            )));
        }
        let execution_count = cell.execution_count;
        let queue_id = QueueId::new(format!(
            "{:016x}{:016x}",
            self.rng.gen::<u64>(),
            self.rng.gen::<u64>()
        ));
        let event = Event::execution_requested(
            &self.actor,
            Utc::now(),
            id.clone(),
            queue_id.clone(),
            execution_count,
        );
        self.commit(event);
        Ok(queue_id)
    }

    /// Report that the runtime agent picked up a queued request.
    pub fn start_execution(&mut self, id: &CellId, queue_id: QueueId) -> Result<Seq> {
        self.require_cell(id)?;
        let event = Event::execution_started(&self.actor, Utc::now(), id.clone(), queue_id);
        Ok(self.commit(event))
    }

    /// Report the terminal outcome for an accepted queue id.
    pub fn complete_execution(
        &mut self,
        id: &CellId,
        queue_id: QueueId,
        status: ExecutionStatus,
    ) -> Result<Seq> {
        self.require_cell(id)?;
        let event =
            Event::execution_completed(&self.actor, Utc::now(), id.clone(), queue_id, status);
        Ok(self.commit(event))
    }

    /// Interrupt the outstanding execution of a cell. Encoded as a cancelled
    /// completion: state only moves forward, history is never rolled back.
    pub fn cancel_execution(&mut self, id: &CellId) -> Result<Seq> {
        let cell = self
            .snapshot
            .cell(id)
            .ok_or_else(|| Error::UnknownCell(id.to_string()))?;
        let outstanding = matches!(
            cell.execution_state,
            ExecutionState::Queued | ExecutionState::Running
        );
        let Some(queue_id) = cell.last_queue_id.clone().filter(|_| outstanding) else {
            return Err(Error::InvalidEvent(format!(
                "no outstanding execution for {id}"
            )));
        };
        self.complete_execution(id, queue_id, ExecutionStatus::Cancelled)
    }

    // ---- notebook-level helpers -----------------------------------------

    pub fn set_title(&mut self, title: impl Into<String>) -> Seq {
        let event = Event::new(
            self.actor.clone(),
            Utc::now(),
            EventKind::NotebookTitleChanged {
                title: title.into(),
            },
        );
        self.commit(event)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> Seq {
        let event = Event::new(
            self.actor.clone(),
            Utc::now(),
            EventKind::NotebookMetadataSet {
                key: key.into(),
                value: value.into(),
            },
        );
        self.commit(event)
    }

    pub fn set_actor_profile(
        &mut self,
        id: ActorId,
        display_name: Option<String>,
        actor_type: Option<ActorType>,
        avatar: Option<String>,
    ) -> Seq {
        let event = Event::new(
            self.actor.clone(),
            Utc::now(),
            EventKind::ActorProfileSet {
                id,
                display_name,
                actor_type,
                avatar,
            },
        );
        self.commit(event)
    }

    // ---- rebalancing -----------------------------------------------------

    /// Rewrite every live key to an evenly spaced minimal-length one when the
    /// longest key exceeds the configured threshold. Emits one move per cell
    /// whose key changes, as a single batch; the relative order of cells is
    /// preserved exactly. Returns the number of moves committed.
    pub fn rebalance_if_needed(&mut self) -> usize {
        let longest = self
            .snapshot
            .ordered_cells()
            .iter()
            .map(|cell| cell.fractional_index.len())
            .max()
            .unwrap_or(0);
        if longest <= self.rebalance.max_key_len {
            return 0;
        }

        let ordered: Vec<(CellId, String)> = self
            .snapshot
            .ordered_cells()
            .into_iter()
            .map(|cell| (cell.id.clone(), cell.fractional_index.clone()))
            .collect();
        let keys = frac_index::spread_keys(ordered.len());
        let now = Utc::now();
        let events: Vec<Event> = ordered
            .into_iter()
            .zip(keys)
            .filter(|((_, old), new)| old != new)
            .map(|((id, _), new)| Event::cell_moved(&self.actor, now, id, new))
            .collect();
        let moves = events.len();
        self.commit_batch(events);
        debug!(moves, "rebalanced fractional indices");
        moves
    }

    fn require_cell(&self, id: &CellId) -> Result<()> {
        if self.snapshot.cell(id).is_some() {
            Ok(())
        } else {
            Err(Error::UnknownCell(id.to_string()))
        }
    }

    /// Key of `anchor` and of its immediate successor.
    fn bounds_around(&self, anchor: &CellId) -> Result<(String, Option<String>)> {
        let cell = self
            .snapshot
            .cell(anchor)
            .ok_or_else(|| Error::UnknownCell(anchor.to_string()))?;
        let after = self
            .snapshot
            .neighbors_of(anchor)
            .and_then(|(_, after)| after.map(|c| c.fractional_index.clone()));
        Ok((cell.fractional_index.clone(), after))
    }
}
