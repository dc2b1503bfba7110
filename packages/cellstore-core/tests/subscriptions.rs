use std::cell::RefCell;
use std::rc::Rc;

use cellstore_core::{
    ActorId, CellId, CellType, ExecutionStatus, NotebookStore, Query, QueryResult,
};

fn store() -> NotebookStore {
    NotebookStore::with_seed(ActorId::new("alice"), 29)
}

#[test]
fn ordered_cells_subscription_pushes_after_each_batch() {
    let mut store = store();
    let pushes: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
    let sink = Rc::clone(&pushes);
    store.subscribe(Query::OrderedCells, move |result| {
        if let QueryResult::OrderedCells(cells) = result {
            sink.borrow_mut()
                .push(cells.iter().map(|c| c.id.0.clone()).collect());
        }
    });

    store.insert_cell_at_end(CellId::new("a"), CellType::Code).unwrap();
    store.insert_cell_at_end(CellId::new("b"), CellType::Code).unwrap();

    assert_eq!(
        *pushes.borrow(),
        vec![vec!["a".to_owned()], vec!["a".to_owned(), "b".to_owned()]]
    );
}

#[test]
fn unchanged_results_are_not_redelivered() {
    let mut store = store();
    let c1 = CellId::new("c1");
    store.insert_cell_at_end(c1.clone(), CellType::Code).unwrap();

    let pushes: Rc<RefCell<usize>> = Rc::default();
    let sink = Rc::clone(&pushes);
    store.subscribe(Query::OrderedCells, move |_| {
        *sink.borrow_mut() += 1;
    });

    // first dispatch after subscribing carries the initial result
    store.set_title("unrelated to cell order");
    assert_eq!(*pushes.borrow(), 1);

    // title churn leaves the ordered-cells result untouched
    store.set_title("still unrelated");
    store.set_metadata("k", "v");
    assert_eq!(*pushes.borrow(), 1);

    store.delete_cell(&c1).unwrap();
    assert_eq!(*pushes.borrow(), 2);
}

#[test]
fn cell_subscription_tracks_execution_state() {
    let mut store = store();
    let c1 = CellId::new("c1");
    store.insert_cell_at_end(c1.clone(), CellType::Code).unwrap();

    let states: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&states);
    store.subscribe(Query::Cell(c1.clone()), move |result| {
        if let QueryResult::Cell(Some(cell)) = result {
            sink.borrow_mut().push(format!("{:?}", cell.execution_state));
        }
    });

    let queue_id = store.request_execution(&c1).unwrap();
    store.start_execution(&c1, queue_id.clone()).unwrap();
    store
        .complete_execution(&c1, queue_id, ExecutionStatus::Success)
        .unwrap();

    assert_eq!(
        *states.borrow(),
        vec!["Queued", "Running", "Completed"]
    );
}

#[test]
fn batch_commit_dispatches_once_with_final_state() {
    let mut store = store();
    let c1 = CellId::new("c1");
    store.insert_cell_at_end(c1.clone(), CellType::Code).unwrap();

    let pushes: Rc<RefCell<Vec<usize>>> = Rc::default();
    let sink = Rc::clone(&pushes);
    store.subscribe(Query::OpenQueue, move |result| {
        if let QueryResult::OpenQueue(queue) = result {
            sink.borrow_mut().push(queue.len());
        }
    });

    // a remote batch: request then immediate completion
    let mut origin = store_for_batch(&c1);
    let batch = origin.log()[origin.log().len() - 2..].to_vec();
    store.ingest_remote(batch);

    // exactly one dispatch, carrying the post-batch state; the intermediate
    // queued entry is never observed
    assert_eq!(*pushes.borrow(), vec![0]);
}

fn store_for_batch(c1: &CellId) -> NotebookStore {
    let mut origin = NotebookStore::with_seed(ActorId::new("alice"), 29);
    origin
        .insert_cell_at_end(c1.clone(), CellType::Code)
        .unwrap();
    let queue_id = origin.request_execution(c1).unwrap();
    origin
        .complete_execution(c1, queue_id, ExecutionStatus::Success)
        .unwrap();
    origin
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut store = store();
    let pushes: Rc<RefCell<usize>> = Rc::default();
    let sink = Rc::clone(&pushes);
    let id = store.subscribe(Query::OrderedCells, move |_| {
        *sink.borrow_mut() += 1;
    });

    store.insert_cell_at_end(CellId::new("a"), CellType::Code).unwrap();
    assert_eq!(*pushes.borrow(), 1);

    assert!(store.unsubscribe(id));
    assert!(!store.unsubscribe(id));
    store.insert_cell_at_end(CellId::new("b"), CellType::Code).unwrap();
    assert_eq!(*pushes.borrow(), 1);
}
