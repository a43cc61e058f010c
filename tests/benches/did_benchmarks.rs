//! # DID Anchor Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | Update stack | fold of a long add/remove action list |
//! | Chain sync | initial pass over blocks carrying signed creates |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use did_01_operation_parser::{evaluate, DocumentState, KeyUsage, PublicKey, UpdateAction};
use did_tests::fixtures::{create_op, key_pair, Controller, Harness};

// ============================================================================
// Update stack evaluation
// ============================================================================

fn bench_update_stack(c: &mut Criterion) {
    let master = Controller::new("master0", 1);
    let baseline = DocumentState {
        keys: vec![master.master_key()],
        services: Vec::new(),
        contexts: Vec::new(),
    };
    let auth = key_pair(2);

    let mut group = c.benchmark_group("update_stack");
    for count in [10usize, 50, 200] {
        let actions: Vec<UpdateAction> = (0..count)
            .map(|i| {
                let id = format!("key-{}", i / 2);
                if i % 2 == 0 {
                    UpdateAction::AddKey(PublicKey::from_key_pair(
                        id,
                        KeyUsage::Authentication,
                        &auth,
                    ))
                } else {
                    UpdateAction::RemoveKey { key_id: id }
                }
            })
            .collect();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &actions, |b, actions| {
            b.iter(|| evaluate(black_box(&baseline), black_box(actions)))
        });
    }
    group.finish();
}

// ============================================================================
// Chain sync
// ============================================================================

fn bench_initial_sync(c: &mut Criterion) {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(_) => return,
    };

    let mut group = c.benchmark_group("initial_sync");
    group.sample_size(10);
    for blocks in [20u8, 100] {
        group.throughput(Throughput::Elements(blocks as u64));
        group.bench_function(BenchmarkId::from_parameter(blocks), |b| {
            b.iter(|| {
                let h = Harness::new();
                h.source.extend("genesis");
                for seed in 1..=blocks {
                    let controller = Controller::new("master0", seed);
                    h.extend_with("main", vec![controller.payload(create_op(&controller, vec![]))]);
                }
                rt.block_on(h.sync())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_update_stack, bench_initial_sync);
criterion_main!(benches);
