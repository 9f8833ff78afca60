use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use lightdb::memtable::btree::BTree;
use lightdb::{Options, DB};

fn btree_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree");
    for degree in [2usize, 16, 64] {
        group.bench_function(format!("insert_10k_degree_{degree}"), |b| {
            b.iter_batched(
                || BTree::new(degree),
                |mut tree| {
                    for k in 0..10_000i64 {
                        // Spread keys so inserts do not all land on the right edge.
                        let key = k.wrapping_mul(7_919) % 10_007;
                        tree.insert(key, "value".to_string()).unwrap();
                    }
                    tree
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn btree_get(c: &mut Criterion) {
    let mut tree = BTree::new(32);
    for k in 0..100_000i64 {
        tree.insert(k, format!("v{k}")).unwrap();
    }
    c.bench_function("btree/get_hit", |b| {
        let mut k = 0i64;
        b.iter(|| {
            k = (k + 7_919) % 100_000;
            black_box(tree.get(k));
        })
    });
}

fn engine_put(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let opts = Options::new(dir.path().join("bench.wal")).memtable_max_entries(None);
    let db = DB::open_with_options(opts).unwrap();
    let mut k = 0i64;
    c.bench_function("engine/put_fsync", |b| {
        b.iter(|| {
            k += 1;
            db.put(k, "value").unwrap();
        })
    });
}

fn engine_get_from_run(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let opts = Options::new(dir.path().join("bench.wal")).memtable_max_entries(None);
    let db = DB::open_with_options(opts).unwrap();
    for k in 0..2_000i64 {
        db.put(k, format!("v{k}")).unwrap();
    }
    db.flush().unwrap();

    c.bench_function("engine/get_from_run", |b| {
        let mut k = 0i64;
        b.iter(|| {
            k = (k + 37) % 2_000;
            black_box(db.get(k).unwrap());
        })
    });
}

criterion_group!(benches, btree_insert, btree_get, engine_put, engine_get_from_run);
criterion_main!(benches);
