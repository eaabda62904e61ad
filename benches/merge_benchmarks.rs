use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hardlinker::compare;
use hardlinker::{Configuration, Merger};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use std::fs;
use tempfile::TempDir;

fn bench_block_comparer(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let mut a = vec![0u8; 4 * 1024 * 1024];
    rng.fill_bytes(&mut a);
    let b = a.clone();
    let mut c_buf = a.clone();
    let last = c_buf.len() - 1;
    c_buf[last] ^= 0xFF;

    c.bench_function("block_equal_4mib", |bencher| {
        bencher.iter(|| compare::is_equal(black_box(&a), black_box(&b)))
    });

    c.bench_function("block_mismatch_at_tail_4mib", |bencher| {
        bencher.iter(|| compare::is_equal(black_box(&a), black_box(&c_buf)))
    });
}

fn bench_shuffler(c: &mut Criterion) {
    c.bench_function("outside_in_10k", |bencher| {
        bencher.iter(|| compare::outside_in(black_box(10_000)).sum::<u64>())
    });
}

// End-to-end merge over a synthetic tree with a 50% duplicate ratio.
fn bench_merge_run(c: &mut Criterion) {
    c.bench_function("merge_tree_200_files", |bencher| {
        bencher.iter_with_setup(
            || {
                let root = TempDir::new().unwrap();
                let mut rng = StdRng::seed_from_u64(2);
                for i in 0..100 {
                    let mut content = vec![0u8; 8192];
                    rng.fill_bytes(&mut content);
                    fs::write(root.path().join(format!("u{i}.bin")), &content).unwrap();
                    fs::write(root.path().join(format!("d{i}.bin")), &content).unwrap();
                }
                root
            },
            |root| {
                let merger = Merger::new(Configuration::default());
                merger.run(&[root.path().to_path_buf()]);
                black_box(merger.stats().hard.created());
            },
        )
    });
}

criterion_group!(benches, bench_block_comparer, bench_shuffler, bench_merge_run);
criterion_main!(benches);
