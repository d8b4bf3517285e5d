use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::path::PathBuf;
use taskstack::{DelimitedStack, Layout, SlotStack, StackConfig, StackStore};
use tempfile::{tempdir, TempDir};

const DEPTH: usize = 256;
const ITEM: &[u8] = b"review the pull request for the parser\n";

fn config() -> StackConfig {
    StackConfig::default()
        .with_max_item_size(63)
        .with_max_stack_size(DEPTH)
        .with_max_file_size(DEPTH * 64)
}

fn filled(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("stack");
    let mut stack = DelimitedStack::open_path(&path, config()).unwrap();
    for _ in 0..DEPTH {
        stack.push(ITEM).unwrap();
    }
    path
}

fn push_drop(c: &mut Criterion) {
    c.bench_function("delimited_push_drop", |b| {
        let dir = tempdir().unwrap();
        let mut stack = DelimitedStack::open_path(dir.path().join("stack"), config()).unwrap();
        b.iter(|| {
            stack.push(ITEM).unwrap();
            stack.drop_top().unwrap();
        });
    });
}

fn swap_rotate(c: &mut Criterion) {
    c.bench_function("delimited_swap_mixed_lengths", |b| {
        let dir = tempdir().unwrap();
        let mut stack = DelimitedStack::open_path(dir.path().join("stack"), config()).unwrap();
        stack.push(b"a\n").unwrap();
        stack.push(ITEM).unwrap();
        b.iter(|| stack.swap().unwrap());
    });

    c.bench_function("delimited_rotate_mixed_lengths", |b| {
        let dir = tempdir().unwrap();
        let mut stack = DelimitedStack::open_path(dir.path().join("stack"), config()).unwrap();
        stack.push(b"a\n").unwrap();
        stack.push(ITEM).unwrap();
        stack.push(b"bb\n").unwrap();
        b.iter(|| stack.rotate().unwrap());
    });
}

fn slot_swap(c: &mut Criterion) {
    c.bench_function("slotted_swap", |b| {
        let dir = tempdir().unwrap();
        let config = config().with_layout(Layout::Slotted);
        let mut stack = SlotStack::open_path(dir.path().join("slots"), config).unwrap();
        stack.push(b"a\n").unwrap();
        stack.push(ITEM).unwrap();
        b.iter(|| stack.swap().unwrap());
    });
}

fn reopen_scan(c: &mut Criterion) {
    c.bench_function("delimited_reopen_256", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = filled(&dir);
                (dir, path)
            },
            |(_dir, path)| {
                let stack = DelimitedStack::open_path(&path, config()).unwrap();
                assert_eq!(stack.len(), DEPTH);
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, push_drop, swap_rotate, slot_swap, reopen_scan);

criterion_main!(benches);
