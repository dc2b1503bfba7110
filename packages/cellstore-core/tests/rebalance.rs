use cellstore_core::{ActorId, CellId, CellType, NotebookStore, RebalanceConfig, Snapshot};

fn order(store: &NotebookStore) -> Vec<String> {
    store
        .snapshot()
        .ordered_cells()
        .iter()
        .map(|cell| cell.id.0.clone())
        .collect()
}

fn longest_key(store: &NotebookStore) -> usize {
    store
        .snapshot()
        .ordered_cells()
        .iter()
        .map(|cell| cell.fractional_index.len())
        .max()
        .unwrap_or(0)
}

/// Grind keys long by always inserting directly after the first cell.
fn dense_store(inserts: usize, max_key_len: usize) -> NotebookStore {
    let mut store = NotebookStore::with_seed(ActorId::new("alice"), 13)
        .with_rebalance_config(RebalanceConfig { max_key_len });
    let head = CellId::new("head");
    store.insert_cell_at_end(head.clone(), CellType::Code).unwrap();
    for i in 0..inserts {
        store
            .insert_cell_after(&head, CellId::new(format!("n{i}")), CellType::Code)
            .unwrap();
    }
    store
}

#[test]
fn rebalance_preserves_relative_order() {
    let mut store = dense_store(60, 6);
    let before = order(&store);
    assert!(longest_key(&store) > 6);

    let moves = store.rebalance_if_needed();
    assert!(moves > 0);
    assert_eq!(order(&store), before);
    assert!(longest_key(&store) <= 2);
}

#[test]
fn rebalance_is_a_no_op_under_the_threshold() {
    let mut store = dense_store(3, 64);
    assert_eq!(store.rebalance_if_needed(), 0);
    // nothing was committed
    assert_eq!(store.log().len(), 4);
}

#[test]
fn rebalanced_log_replays_identically() {
    let mut store = dense_store(40, 6);
    store.rebalance_if_needed();
    assert_eq!(&Snapshot::replay(store.log()), store.snapshot());
}

#[test]
fn second_rebalance_changes_nothing() {
    let mut store = dense_store(40, 6);
    assert!(store.rebalance_if_needed() > 0);
    let log_len = store.log().len();
    assert_eq!(store.rebalance_if_needed(), 0);
    assert_eq!(store.log().len(), log_len);
}
