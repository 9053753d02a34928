//! Resolution, expiration and the premium ledger

mod common;

use common::*;
use parapool_common::{PolicyError, PolicyRegistry, PoolError, Ray, Role, Wad, SECONDS_PER_YEAR, WEEK};
use rust_decimal_macros::dec;

#[test]
fn test_full_loss_borrows_from_tranche() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 4000);
    let rm = h.add_rm(plain_params());

    let loss_prob = Ray::from_ratio(dec!(1), dec!(37));
    let policy = h.new_policy(rm, units(3600), units(100), loss_prob, T0 + WEEK);
    assert_eq!(policy.pure_premium, Wad::new(dec!(97.297297297297297297)));
    assert_eq!(policy.scr, units(3600) - policy.pure_premium);
    assert_eq!(h.balance("RM_WALLET"), units(100) - policy.pure_premium);

    let before = h.balance("CUST");
    let settlement = h
        .pool
        .resolve_policy(policy.id, &acct("RM_OPS"), units(3600))
        .unwrap();

    assert_eq!(h.balance("CUST") - before, units(3600));
    assert_eq!(settlement.borrowed, units(3600) - policy.pure_premium);

    let tranche = h.pool.tranche(t).unwrap();
    assert_eq!(tranche.pool_loan(), units(3600) - policy.pure_premium);
    assert!(tranche.scr().is_zero());
    assert_eq!(tranche.total_supply(), units(400) + policy.pure_premium);
    assert_eq!(h.balance("POOL"), tranche.total_supply());

    let ledger = h.pool.ledger();
    assert!(ledger.pure_premiums().is_zero());
    assert!(ledger.won_pure_premiums().is_zero());
    assert!(h.pool.is_resolved(policy.id));
    h.assert_tranches_solvent();
}

#[test]
fn test_no_claim_pays_tranche_exactly_its_interest() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 4000);
    let mut params = plain_params();
    params.scr_interest_rate = Ray::new(dec!(0.1));
    let rm = h.add_rm(params);

    let policy = h.new_policy(
        rm,
        units(1000),
        units(120),
        Ray::new(dec!(0.01)),
        T0 + SECONDS_PER_YEAR,
    );
    assert_eq!(policy.pure_premium, units(10));
    assert_eq!(policy.scr, units(990));
    assert_eq!(policy.premium_for_lps, units(99));

    h.advance(SECONDS_PER_YEAR / 2);
    let settlement = h
        .pool
        .resolve_policy(policy.id, &acct("RM_OPS"), Wad::ZERO)
        .unwrap();

    let tranche = h.pool.tranche(t).unwrap();
    assert_eq!(tranche.total_supply(), units(4000) + policy.premium_for_lps);
    assert_eq!(tranche.balance_of(&acct("LP1")), units(4099));
    assert_eq!(settlement.won, units(10));
    assert_eq!(h.pool.ledger().won_pure_premiums(), units(10));
    assert_eq!(h.pool.get_investable(), units(10));
}

#[test]
fn test_lifecycle_guards() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());

    let first = h.new_policy(rm, units(100), units(5), Ray::new(dec!(0.01)), T0 + WEEK);
    assert!(matches!(
        h.pool.expire_policy(first.id),
        Err(PoolError::Policy(PolicyError::NotExpiredYet(_)))
    ));
    assert!(matches!(
        h.pool.resolve_policy(first.id, &acct("STRANGER"), Wad::ZERO),
        Err(PoolError::Unauthorized { .. })
    ));
    assert!(matches!(
        h.pool.resolve_policy(first.id, &acct("RM_OPS"), units(-1)),
        Err(PoolError::Validation(_))
    ));
    h.pool.resolve_policy(first.id, &acct("RM_OPS"), units(50)).unwrap();
    assert!(matches!(
        h.pool.resolve_policy(first.id, &acct("RM_OPS"), units(50)),
        Err(PoolError::Policy(PolicyError::AlreadyResolved(_)))
    ));

    let second = h.new_policy(rm, units(100), units(5), Ray::new(dec!(0.01)), T0 + WEEK);
    h.advance(WEEK + 1);
    assert!(matches!(
        h.pool.resolve_policy(second.id, &acct("RM_OPS"), units(10)),
        Err(PoolError::Policy(PolicyError::AlreadyExpired(_)))
    ));
    let settlement = h.pool.expire_policy(second.id).unwrap();
    assert!(settlement.payout.is_zero());
    assert!(matches!(
        h.pool.expire_policy(second.id),
        Err(PoolError::Policy(PolicyError::AlreadyResolved(_)))
    ));
    assert!(h.pool.tranche(t).unwrap().scr().is_zero());
}

#[test]
fn test_payout_above_policy_payout_is_capped() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());

    let policy = h.new_policy(rm, units(100), units(5), Ray::ZERO, T0 + WEEK);
    let before = h.balance("CUST");
    let settlement = h.pool.resolve_policy(policy.id, &acct("RM_OPS"), units(150)).unwrap();

    assert_eq!(settlement.payout, units(100));
    assert_eq!(h.balance("CUST") - before, units(100));
    assert_eq!(h.pool.tranche(t).unwrap().pool_loan(), units(100));
    assert!(h.pool.is_resolved(policy.id));
}

#[test]
fn test_duplicate_policy_id_rejected() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());
    h.fund("CUST", 100);

    let mut request = h.request(units(100), units(5), Ray::ZERO, T0 + WEEK);
    request.internal_id = 42;
    h.pool.new_policy(rm, &acct("RM_OPS"), request.clone()).unwrap();
    assert!(matches!(
        h.pool.new_policy(rm, &acct("RM_OPS"), request),
        Err(PoolError::Policy(PolicyError::DuplicatePolicyId(_)))
    ));
    assert_eq!(h.pool.tranche(t).unwrap().scr(), units(100));
}

#[test]
fn test_partial_payout_with_shared_coverage() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 2000);
    let mut params = plain_params();
    params.shared_coverage_min_percentage = Ray::new(dec!(0.2));
    let rm = h.add_rm(params);
    h.fund("RM_WALLET", 1000);

    let policy = h.new_policy(rm, units(1000), units(20), Ray::new(dec!(0.01)), T0 + WEEK);
    assert_eq!(policy.rm_coverage, units(200));
    assert_eq!(policy.scr, units(790));
    assert_eq!(policy.rm_shared_premium, units(4));
    assert_eq!(policy.premium_for_rm, units(6));
    // Funded the coverage, received its premium share
    assert_eq!(h.balance("RM_WALLET"), units(1000) - units(200) + units(10));
    assert_eq!(h.pool.ledger().rm_coverage_held(), units(200));

    let before = h.balance("CUST");
    let settlement = h
        .pool
        .resolve_policy(policy.id, &acct("RM_OPS"), units(500))
        .unwrap();

    assert_eq!(h.balance("CUST") - before, units(500));
    assert_eq!(settlement.rm_part, units(100));
    assert_eq!(settlement.borrowed, units(390));
    // Unused coverage goes back to the wallet
    assert_eq!(h.balance("RM_WALLET"), units(910));
    assert_eq!(h.pool.tranche(t).unwrap().pool_loan(), units(390));
    assert!(h.pool.ledger().rm_coverage_held().is_zero());
}

#[test]
fn test_claim_spends_other_active_premiums_first() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());

    let a = h.new_policy(rm, units(100), units(20), Ray::new(dec!(0.1)), T0 + WEEK);
    let b = h.new_policy(rm, units(100), units(20), Ray::new(dec!(0.1)), T0 + WEEK);

    let settlement = h.pool.resolve_policy(a.id, &acct("RM_OPS"), units(100)).unwrap();
    // 10 own premium, 10 of b's premium, 80 borrowed
    assert_eq!(settlement.borrowed, units(80));
    assert_eq!(h.pool.ledger().borrowed_active_pp(), units(10));

    // b's premium was already spent; nothing is won
    let settlement = h.pool.resolve_policy(b.id, &acct("RM_OPS"), Wad::ZERO).unwrap();
    assert!(settlement.won.is_zero());
    assert!(h.pool.ledger().borrowed_active_pp().is_zero());
    assert_eq!(h.pool.tranche(t).unwrap().pool_loan(), units(80));
}

#[test]
fn test_released_premium_repays_pool_loan() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());

    let lost = h.new_policy(rm, units(100), units(20), Ray::new(dec!(0.1)), T0 + WEEK);
    h.pool.resolve_policy(lost.id, &acct("RM_OPS"), units(100)).unwrap();
    assert_eq!(h.pool.tranche(t).unwrap().pool_loan(), units(90));

    let won = h.new_policy(rm, units(100), units(20), Ray::new(dec!(0.1)), T0 + WEEK);
    let settlement = h.pool.resolve_policy(won.id, &acct("RM_OPS"), Wad::ZERO).unwrap();
    assert_eq!(settlement.repaid, units(10));
    assert!(settlement.won.is_zero());
    assert_eq!(h.pool.tranche(t).unwrap().pool_loan(), units(80));
}

#[test]
fn test_grant_then_repay_tranche_loan() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());

    let lost = h.new_policy(rm, units(100), units(20), Ray::new(dec!(0.1)), T0 + WEEK);
    h.pool.resolve_policy(lost.id, &acct("RM_OPS"), units(100)).unwrap();
    let supply_before = h.pool.tranche(t).unwrap().total_supply();

    h.fund("DAO", 50);
    h.pool.receive_grant(&acct("DAO"), units(50)).unwrap();
    assert_eq!(h.pool.ledger().won_pure_premiums(), units(50));

    let repaid = h.pool.repay_tranche_loan(t).unwrap();
    assert_eq!(repaid, units(50));
    let tranche = h.pool.tranche(t).unwrap();
    assert_eq!(tranche.pool_loan(), units(40));
    assert_eq!(tranche.total_supply(), supply_before + units(50));
    assert!(h.pool.ledger().won_pure_premiums().is_zero());

    // Nothing left to repay with
    assert!(h.pool.repay_tranche_loan(t).unwrap().is_zero());
}

#[test]
fn test_withdraw_won_premiums() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());
    h.roles.grant_role(Role::Treasurer, &acct("CFO"));

    let policy = h.new_policy(rm, units(100), units(20), Ray::new(dec!(0.1)), T0 + WEEK);
    h.pool.resolve_policy(policy.id, &acct("RM_OPS"), Wad::ZERO).unwrap();
    assert_eq!(h.pool.ledger().won_pure_premiums(), units(10));

    assert!(matches!(
        h.pool.withdraw_won_premiums(&acct("LP1"), units(5)),
        Err(PoolError::Unauthorized { .. })
    ));
    let withdrawn = h.pool.withdraw_won_premiums(&acct("CFO"), units(25)).unwrap();
    assert_eq!(withdrawn, units(10));
    assert_eq!(h.balance("TREASURY"), units(10));
}

#[test]
fn test_payout_goes_to_current_owner() {
    let mut h = Harness::new();
    let t = h.add_year_tranche("senior");
    h.deposit(t, "LP1", 1000);
    let rm = h.add_rm(plain_params());

    let policy = h.new_policy(rm, units(100), units(5), Ray::ZERO, T0 + WEEK);
    h.registry
        .transfer(policy.id, &acct("CUST"), &acct("BUYER"))
        .unwrap();

    h.pool.resolve_policy(policy.id, &acct("RM_OPS"), units(100)).unwrap();
    assert_eq!(h.balance("BUYER"), units(100));
}
