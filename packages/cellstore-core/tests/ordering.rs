use cellstore_core::{ActorId, CellId, CellType, NotebookStore};

fn store() -> NotebookStore {
    NotebookStore::with_seed(ActorId::new("alice"), 1)
}

fn order(store: &NotebookStore) -> Vec<String> {
    store
        .snapshot()
        .ordered_cells()
        .iter()
        .map(|cell| cell.id.0.clone())
        .collect()
}

#[test]
fn single_insert_into_empty_notebook() {
    let mut store = store();
    store
        .insert_cell_at_end(CellId::new("c1"), CellType::Code)
        .unwrap();
    assert_eq!(order(&store), vec!["c1"]);
    assert_eq!(store.snapshot().cell_count(), 1);
}

#[test]
fn insert_between_lands_between() {
    let mut store = store();
    let c1 = CellId::new("c1");
    let c2 = CellId::new("c2");
    let c3 = CellId::new("c3");
    store.insert_cell_at_end(c1.clone(), CellType::Code).unwrap();
    store.insert_cell_after(&c1, c2.clone(), CellType::Code).unwrap();
    store.insert_cell_after(&c1, c3.clone(), CellType::Code).unwrap();
    assert_eq!(order(&store), vec!["c1", "c3", "c2"]);
}

#[test]
fn first_and_last_track_order() {
    let mut store = store();
    for name in ["a", "b", "c"] {
        store
            .insert_cell_at_end(CellId::new(name), CellType::Code)
            .unwrap();
    }
    assert_eq!(store.snapshot().first_cell().unwrap().id, CellId::new("a"));
    assert_eq!(store.snapshot().last_cell().unwrap().id, CellId::new("c"));

    store.move_cell_after(&CellId::new("c"), None).unwrap();
    assert_eq!(store.snapshot().first_cell().unwrap().id, CellId::new("c"));
}

#[test]
fn bounded_neighbor_scans_exclude_the_boundary() {
    let mut store = store();
    for name in ["a", "b", "c", "d", "e"] {
        store
            .insert_cell_at_end(CellId::new(name), CellType::Code)
            .unwrap();
    }
    let snapshot = store.snapshot();
    let pivot = snapshot.cell(&CellId::new("c")).unwrap().fractional_index.clone();

    let before: Vec<_> = snapshot
        .cells_before(&pivot, 2)
        .iter()
        .map(|c| c.id.0.clone())
        .collect();
    // nearest first, descending
    assert_eq!(before, vec!["b", "a"]);

    let after: Vec<_> = snapshot
        .cells_after(&pivot, 1)
        .iter()
        .map(|c| c.id.0.clone())
        .collect();
    assert_eq!(after, vec!["d"]);

    assert!(snapshot.cells_before(&pivot, 0).is_empty());
}

#[test]
fn range_scan_is_inclusive_and_open_ended() {
    let mut store = store();
    for name in ["a", "b", "c", "d"] {
        store
            .insert_cell_at_end(CellId::new(name), CellType::Code)
            .unwrap();
    }
    let snapshot = store.snapshot();
    let key_b = snapshot.cell(&CellId::new("b")).unwrap().fractional_index.clone();
    let key_c = snapshot.cell(&CellId::new("c")).unwrap().fractional_index.clone();

    let mid: Vec<_> = snapshot
        .cells_in_range(Some(&key_b), Some(&key_c))
        .iter()
        .map(|c| c.id.0.clone())
        .collect();
    assert_eq!(mid, vec!["b", "c"]);

    let tail: Vec<_> = snapshot
        .cells_in_range(Some(&key_c), None)
        .iter()
        .map(|c| c.id.0.clone())
        .collect();
    assert_eq!(tail, vec!["c", "d"]);

    let all: Vec<_> = snapshot
        .cells_in_range(None, None)
        .iter()
        .map(|c| c.id.0.clone())
        .collect();
    assert_eq!(all, vec!["a", "b", "c", "d"]);
}

#[test]
fn neighbors_at_the_ends_are_none() {
    let mut store = store();
    for name in ["a", "b", "c"] {
        store
            .insert_cell_at_end(CellId::new(name), CellType::Code)
            .unwrap();
    }
    let snapshot = store.snapshot();

    let (before, after) = snapshot.neighbors_of(&CellId::new("a")).unwrap();
    assert!(before.is_none());
    assert_eq!(after.unwrap().id, CellId::new("b"));

    let (before, after) = snapshot.neighbors_of(&CellId::new("b")).unwrap();
    assert_eq!(before.unwrap().id, CellId::new("a"));
    assert_eq!(after.unwrap().id, CellId::new("c"));

    let (before, after) = snapshot.neighbors_of(&CellId::new("c")).unwrap();
    assert_eq!(before.unwrap().id, CellId::new("b"));
    assert!(after.is_none());

    assert!(snapshot.neighbors_of(&CellId::new("ghost")).is_none());
}

#[test]
fn deleted_cells_leave_the_order() {
    let mut store = store();
    for name in ["a", "b", "c"] {
        store
            .insert_cell_at_end(CellId::new(name), CellType::Code)
            .unwrap();
    }
    store.delete_cell(&CellId::new("b")).unwrap();
    assert_eq!(order(&store), vec!["a", "c"]);

    let (before, after) = store.snapshot().neighbors_of(&CellId::new("c")).unwrap();
    assert_eq!(before.unwrap().id, CellId::new("a"));
    assert!(after.is_none());
}
