use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use cellstore_core::{key_between, ActorId, CellId, CellType, NotebookStore, Snapshot};

fn bench_key_between(c: &mut Criterion) {
    c.bench_function("key_between/end_append", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            let mut last: Option<String> = None;
            for _ in 0..100 {
                let key = key_between(last.as_deref(), None, &mut rng).unwrap();
                last = Some(key);
            }
            black_box(last)
        })
    });

    c.bench_function("key_between/same_boundary", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(1);
            let low = key_between(None, None, &mut rng).unwrap();
            let mut high = key_between(Some(&low), None, &mut rng).unwrap();
            for _ in 0..100 {
                high = key_between(Some(&low), Some(&high), &mut rng).unwrap();
            }
            black_box(high)
        })
    });
}

fn bench_replay(c: &mut Criterion) {
    let mut store = NotebookStore::with_seed(ActorId::new("bench"), 1);
    for i in 0..1_000 {
        let id = CellId::new(format!("cell-{i}"));
        store.insert_cell_at_end(id.clone(), CellType::Code).unwrap();
        store.set_cell_source(&id, "x = 1").unwrap();
    }
    let log = store.log().to_vec();

    c.bench_function("replay/2k_events", |b| {
        b.iter(|| black_box(Snapshot::replay(&log)))
    });
}

criterion_group!(benches, bench_key_between, bench_replay);
criterion_main!(benches);
