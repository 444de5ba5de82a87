//! # Consensus Benchmarks
//!
//! | Operation | What is measured |
//! |-----------|------------------|
//! | Extension | `accept_block` on the head, fresh diffs |
//! | Reorg | Reverting one branch and applying a heavier one |
//! | Checksum | Hashing the full consensus state |

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use qc_04_state_management::consensus_checksum;
use qc_tests::fixtures::{miner, TestChain};
use shared_types::BlockId;
use std::time::Duration;

// ============================================================================
// EXTENSION
// ============================================================================

fn bench_extend_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-08-extend");
    group.measurement_time(Duration::from_secs(10));

    for length in [16usize, 64] {
        let source = TestChain::new();
        let ids = source.extend(&source.genesis(), length, 1);

        group.bench_with_input(BenchmarkId::new("accept_blocks", length), &ids, |b, ids| {
            b.iter_batched(
                TestChain::new,
                |target| {
                    source.replay_into(&target, ids);
                    black_box(target.head())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// ============================================================================
// REORG
// ============================================================================

/// Two branches from genesis, `depth` and `depth + 1` blocks long.
fn competing_branches(depth: usize) -> (TestChain, Vec<BlockId>, Vec<BlockId>) {
    let source = TestChain::new();
    let genesis = source.genesis();
    let a = source.extend(&genesis, depth, 1);
    let b = source.extend(&genesis, depth + 1, 2);
    (source, a, b)
}

fn bench_reorg(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-08-reorg");
    group.measurement_time(Duration::from_secs(10));

    for depth in [4usize, 32] {
        let (source, a, b) = competing_branches(depth);
        let (prefix, last) = b.split_at(depth);

        group.bench_with_input(BenchmarkId::new("switch_branch", depth), &depth, |bench, _| {
            bench.iter_batched(
                || {
                    let target = TestChain::new();
                    source.replay_into(&target, &a);
                    source.replay_into(&target, prefix);
                    target
                },
                |target| {
                    source.replay_into(&target, last);
                    black_box(target.head())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

// ============================================================================
// CHECKSUM
// ============================================================================

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("qc-08-checksum");

    for length in [16usize, 128] {
        let chain = TestChain::new();
        chain.extend(&chain.genesis(), length, 1);
        let state = chain.set.state_snapshot();
        let head = chain.set.current_block();

        group.bench_with_input(BenchmarkId::new("full_state", length), &state, |b, state| {
            b.iter(|| black_box(consensus_checksum(state, &head.id, head.height)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extend_chain, bench_reorg, bench_checksum);
criterion_main!(benches);
