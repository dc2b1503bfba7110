#![forbid(unsafe_code)]
//! Collaborative-ordering and event-sourcing core for a multi-user notebook.
//!
//! Concurrent actors (human editors and runtime agents) insert, move, and
//! delete ordered cells; every mutation is an event in an append-only log
//! that deterministically materializes into the current tables on every
//! replica. Cell order is encoded in string fractional indices, so
//! convergence needs no central lock: replicas replay the same committed
//! sequence and land on bit-identical state. Transport, persistence, and the
//! execution engines themselves are external collaborators: this crate only
//! consumes ordered event batches and exposes materialized tables plus
//! ordering queries.

pub mod cell;
pub mod error;
pub mod events;
pub mod frac_index;
pub mod ids;
pub mod query;
pub mod snapshot;
pub mod store;
pub mod subscription;

pub use cell::{Actor, ActorType, Cell, CellType, ExecutionState, ExecutionStatus, QueueEntry};
pub use error::{Error, Result};
pub use events::{Committed, Event, EventKind, EventMetadata};
pub use frac_index::{key_between, spread_keys, validate_key};
pub use ids::{ActorId, CellId, QueueId, Seq};
pub use snapshot::{Anomaly, Outcome, Snapshot};
pub use store::{IngestReport, NotebookStore, RebalanceConfig};
pub use subscription::{Query, QueryResult, SubscriptionId};
