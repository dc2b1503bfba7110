use crate::cell::{Actor, Cell, QueueEntry};
use crate::ids::CellId;
use crate::snapshot::Snapshot;

pub type SubscriptionId = u64;

/// Named read-side queries callers can register interest in. The store
/// re-evaluates each subscribed query after every materialization batch and
/// pushes the new result; there is no background polling.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    OrderedCells,
    Cell(CellId),
    OpenQueue,
    Metadata,
    Actors,
}

/// Owned result pushed to subscribers. Comparable, so unchanged results are
/// suppressed instead of re-delivered.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryResult {
    OrderedCells(Vec<Cell>),
    Cell(Option<Cell>),
    OpenQueue(Vec<QueueEntry>),
    Metadata {
        title: String,
        entries: Vec<(String, String)>,
    },
    Actors(Vec<Actor>),
}

pub(crate) fn evaluate(query: &Query, snapshot: &Snapshot) -> QueryResult {
    match query {
        Query::OrderedCells => {
            QueryResult::OrderedCells(snapshot.ordered_cells().into_iter().cloned().collect())
        }
        Query::Cell(id) => QueryResult::Cell(snapshot.cell(id).cloned()),
        Query::OpenQueue => QueryResult::OpenQueue(snapshot.open_queue().to_vec()),
        Query::Metadata => {
            let mut entries: Vec<(String, String)> = snapshot
                .metadata_entries()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            entries.sort();
            QueryResult::Metadata {
                title: snapshot.title().to_owned(),
                entries,
            }
        }
        Query::Actors => {
            let mut actors: Vec<Actor> = snapshot.actors.values().cloned().collect();
            actors.sort_by(|a, b| a.id.cmp(&b.id));
            QueryResult::Actors(actors)
        }
    }
}

type Callback = Box<dyn FnMut(&QueryResult)>;

struct Subscription {
    id: SubscriptionId,
    query: Query,
    last: Option<QueryResult>,
    callback: Callback,
}

/// Subscription registry owned by the store; dispatch happens synchronously
/// after each commit / ingest / reconcile batch.
#[derive(Default)]
pub(crate) struct Subscriptions {
    next_id: SubscriptionId,
    entries: Vec<Subscription>,
}

impl Subscriptions {
    pub(crate) fn subscribe(
        &mut self,
        query: Query,
        callback: impl FnMut(&QueryResult) + 'static,
    ) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Subscription {
            id,
            query,
            last: None,
            callback: Box::new(callback),
        });
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|sub| sub.id != id);
        self.entries.len() != before
    }

    /// Re-evaluate every live query and push results that changed since the
    /// previous dispatch.
    pub(crate) fn notify(&mut self, snapshot: &Snapshot) {
        for sub in &mut self.entries {
            let result = evaluate(&sub.query, snapshot);
            if sub.last.as_ref() != Some(&result) {
                (sub.callback)(&result);
                sub.last = Some(result);
            }
        }
    }
}
