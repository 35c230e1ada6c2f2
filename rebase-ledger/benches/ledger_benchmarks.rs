//! Benchmarks for ledger operations.
//!
//! Measures performance of:
//! - Transfers with and without fees
//! - Rebase at different holder counts (should stay flat)
//! - Exclusion transitions

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use evo_rebase_ledger::{tokens, AccountId, GenesisConfig, RebaseLedger};

/// Create an unlocked ledger with `holders` funded accounts.
fn create_ledger(holders: u64) -> RebaseLedger {
    let owner = AccountId::from_low_u64(0);
    let mut config = GenesisConfig::new(owner, AccountId::from_low_u64(u64::MAX));
    config.initial_distribution_finished = true;
    config.fees.fees_on_normal_transfers = true;
    let mut ledger = RebaseLedger::genesis(config).unwrap();

    for n in 1..=holders {
        ledger
            .transfer(owner, AccountId::from_low_u64(n), tokens(10), 0)
            .unwrap();
    }
    ledger.take_events();
    ledger
}

/// Benchmark a fee-charging wallet-to-wallet transfer.
fn bench_transfer(c: &mut Criterion) {
    let mut ledger = create_ledger(1_000);
    let alice = AccountId::from_low_u64(1);
    let bob = AccountId::from_low_u64(2);

    c.bench_function("transfer_with_fee", |b| {
        b.iter(|| {
            let receipt = ledger.transfer(alice, bob, 1_000, 0).unwrap();
            ledger.transfer(bob, alice, receipt.net_amount, 0).unwrap();
            ledger.take_events();
            black_box(receipt)
        })
    });
}

/// Benchmark rebase against holder count.
fn bench_rebase(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebase");

    for holders in [10u64, 1_000, 10_000] {
        let mut ledger = create_ledger(holders);
        let owner = ledger.owner();
        group.throughput(Throughput::Elements(holders));
        group.bench_with_input(BenchmarkId::new("holders", holders), &holders, |b, _| {
            b.iter(|| {
                // Shrinking the supply again keeps the ledger under its cap.
                let outcome = ledger.manual_rebase(&owner, 0).unwrap();
                ledger.burn(owner, outcome.growth).unwrap();
                ledger.take_events();
                black_box(outcome)
            })
        });
    }

    group.finish();
}

/// Benchmark a full exclude/include cycle.
fn bench_exclusion(c: &mut Criterion) {
    let mut ledger = create_ledger(1_000);
    let owner = ledger.owner();
    let holder = AccountId::from_low_u64(7);

    c.bench_function("exclude_include_cycle", |b| {
        b.iter(|| {
            ledger.set_excluded(&owner, holder, true).unwrap();
            black_box(ledger.set_excluded(&owner, holder, false).unwrap())
        })
    });
}

criterion_group!(benches, bench_transfer, bench_rebase, bench_exclusion);
criterion_main!(benches);
