//! Parapool Performance Benchmarks
//!
//! Hot paths of the pool:
//! - Tranche interest accrual
//! - Collateral allocation across tranches
//! - Full policy round trip (create then settle)

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;

use parapool_common::{
    AccountId, Currency, InMemoryCurrency, InMemoryPolicyRegistry, ManualClock, Ray, RiskModuleId,
    Role, RoleRegistry, TrancheId, Wad, SECONDS_PER_YEAR, WEEK,
};
use parapool_core::pool::allocation;
use parapool_core::{
    Allocation, CapitalTranche, Collaborators, PolicyPool, PolicyRequest, RiskModuleParams,
    TrancheParams,
};

const T0: i64 = 1_700_000_000;

fn tranche_params(name: String) -> TrancheParams {
    TrancheParams {
        name,
        expiration_period: SECONDS_PER_YEAR,
        pool_loan_interest_rate: Ray::ZERO,
        accept_all_rms: true,
        exceptions: vec![],
        whitelist_only: false,
        deposits_enabled: true,
    }
}

// ============ ACCRUAL BENCHMARKS ============

fn bench_accrual(c: &mut Criterion) {
    let mut group = c.benchmark_group("accrual");
    let lp = AccountId::from("LP");

    group.bench_function("touch", |b| {
        let mut tranche = CapitalTranche::new(TrancheId(0), &tranche_params("t".into()), T0);
        tranche.deposit(&lp, Wad::from_units(1_000_000), T0).ok();
        let mut now = T0;
        b.iter(|| {
            now += 60;
            tranche.touch(black_box(now)).ok();
        });
    });

    group.bench_function("balance_of_at", |b| {
        let mut tranche = CapitalTranche::new(TrancheId(0), &tranche_params("t".into()), T0);
        tranche.deposit(&lp, Wad::from_units(1_000_000), T0).ok();
        b.iter(|| black_box(tranche.balance_of_at(&lp, T0 + SECONDS_PER_YEAR / 2)));
    });

    group.finish();
}

// ============ ALLOCATION BENCHMARKS ============

fn bench_allocation(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation");

    for count in [1usize, 4, 16, 64].iter() {
        let tranches: Vec<CapitalTranche> = (0..*count)
            .map(|i| {
                let mut t = CapitalTranche::new(TrancheId(i as u32), &tranche_params(format!("t{i}")), T0);
                t.deposit(&AccountId::from("LP"), Wad::from_units(1000 + i as i64), T0).ok();
                t
            })
            .collect();
        let current = Allocation::new();

        group.bench_with_input(BenchmarkId::new("plan", count), &tranches, |b, tranches| {
            b.iter(|| {
                allocation::plan(
                    black_box(tranches),
                    RiskModuleId(1),
                    T0 + WEEK,
                    Wad::from_units(500),
                    &current,
                    T0,
                )
            });
        });
    }

    group.finish();
}

// ============ SETTLEMENT BENCHMARKS ============

fn bench_policy_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("settlement");

    for count in [1usize, 8].iter() {
        group.bench_with_input(BenchmarkId::new("create_resolve", count), count, |b, &count| {
            let usd = Arc::new(InMemoryCurrency::new());
            let roles = Arc::new(RoleRegistry::new());
            let mut pool = PolicyPool::new(
                AccountId::from("POOL"),
                AccountId::from("TREASURY"),
                Collaborators {
                    currency: usd.clone(),
                    access: roles.clone(),
                    registry: Arc::new(InMemoryPolicyRegistry::new()),
                    clock: Arc::new(ManualClock::new(T0)),
                },
            );
            let pool_account = AccountId::from("POOL");
            let lp = AccountId::from("LP");
            let customer = AccountId::from("CUST");
            let ops = AccountId::from("OPS");
            usd.mint(&lp, Wad::from_units(1_000_000_000));
            usd.mint(&customer, Wad::from_units(1_000_000_000));
            usd.approve(&lp, &pool_account, Wad::from_units(1_000_000_000));
            usd.approve(&customer, &pool_account, Wad::from_units(1_000_000_000));

            for i in 0..count {
                if let Ok(t) = pool.add_tranche(&tranche_params(format!("t{i}"))) {
                    pool.deposit(t, &lp, Wad::from_units(10_000_000)).ok();
                }
            }
            let Ok(rm) = pool.add_risk_module(
                "bench",
                RiskModuleParams {
                    scr_percentage: Ray::ONE,
                    ensuro_fee: Ray::new(dec!(0.03)),
                    scr_interest_rate: Ray::new(dec!(0.05)),
                    moc: Ray::ONE,
                    max_scr_per_policy: Wad::from_units(1_000_000),
                    scr_limit: Wad::from_units(1_000_000_000),
                    wallet: AccountId::from("RM"),
                    shared_coverage_min_percentage: Ray::ZERO,
                },
            ) else {
                return;
            };
            roles.grant_role(Role::Pricer(rm), &ops);
            roles.grant_role(Role::Resolver(rm), &ops);

            let mut internal_id = 0u128;
            b.iter(|| {
                internal_id += 1;
                let request = PolicyRequest {
                    payout: Wad::from_units(1000),
                    premium: Wad::from_units(100),
                    loss_prob: Ray::new(dec!(0.05)),
                    expiration: T0 + WEEK,
                    customer: customer.clone(),
                    internal_id,
                };
                if let Ok(policy) = pool.new_policy(rm, &ops, request) {
                    let payout = if internal_id % 2 == 0 { Wad::from_units(1000) } else { Wad::ZERO };
                    black_box(pool.resolve_policy(policy.id, &ops, payout).ok());
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_accrual, bench_allocation, bench_policy_round_trip);
criterion_main!(benches);
