//! Shared fixtures for the pool integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parapool_common::{
    AccountId, Currency, InMemoryCurrency, InMemoryPolicyRegistry, ManualClock, Ray, RiskModuleId, Role,
    RoleRegistry, Timestamp, TrancheId, Wad, SECONDS_PER_YEAR,
};
use parapool_core::{
    Collaborators, Policy, PolicyPool, PolicyRequest, PoolMetrics, RiskModuleParams, TrancheParams,
};

pub const T0: Timestamp = 1_700_000_000;

pub fn acct(name: &str) -> AccountId {
    AccountId::from(name)
}

pub fn units(n: i64) -> Wad {
    Wad::from_units(n)
}

pub fn tranche_params(name: &str, expiration_period: i64) -> TrancheParams {
    TrancheParams {
        name: name.to_string(),
        expiration_period,
        pool_loan_interest_rate: Ray::ZERO,
        accept_all_rms: true,
        exceptions: vec![],
        whitelist_only: false,
        deposits_enabled: true,
    }
}

/// Full collateral, no fees, no interest
pub fn plain_params() -> RiskModuleParams {
    RiskModuleParams {
        scr_percentage: Ray::ONE,
        ensuro_fee: Ray::ZERO,
        scr_interest_rate: Ray::ZERO,
        moc: Ray::ONE,
        max_scr_per_policy: units(100_000),
        scr_limit: units(1_000_000),
        wallet: acct("RM_WALLET"),
        shared_coverage_min_percentage: Ray::ZERO,
    }
}

pub struct Harness {
    pub pool: PolicyPool,
    pub usd: Arc<InMemoryCurrency>,
    pub roles: Arc<RoleRegistry>,
    pub registry: Arc<InMemoryPolicyRegistry>,
    pub clock: Arc<ManualClock>,
    next_internal_id: u128,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Harness whose pool reports to fresh metrics
    pub fn with_metrics() -> (Self, Arc<PoolMetrics>) {
        let metrics = Arc::new(PoolMetrics::new().unwrap());
        (Self::build(Some(metrics.clone())), metrics)
    }

    fn build(metrics: Option<Arc<PoolMetrics>>) -> Self {
        let usd = Arc::new(InMemoryCurrency::new());
        let roles = Arc::new(RoleRegistry::new());
        let registry = Arc::new(InMemoryPolicyRegistry::new());
        let clock = Arc::new(ManualClock::new(T0));
        let pool = PolicyPool::new(
            acct("POOL"),
            acct("TREASURY"),
            Collaborators {
                currency: usd.clone(),
                access: roles.clone(),
                registry: registry.clone(),
                clock: clock.clone(),
            },
        );
        let pool = match metrics {
            Some(metrics) => pool.with_metrics(metrics),
            None => pool,
        };
        Self {
            pool,
            usd,
            roles,
            registry,
            clock,
            next_internal_id: 1,
        }
    }

    /// Mint `amount` to `who` and let the pool pull from it
    pub fn fund(&self, who: &str, amount: i64) {
        self.usd.mint(&acct(who), units(amount));
        self.usd.approve(&acct(who), &acct("POOL"), units(1_000_000_000));
    }

    pub fn balance(&self, who: &str) -> Wad {
        self.usd.balance_of(&acct(who))
    }

    pub fn add_tranche(&mut self, name: &str, expiration_period: i64) -> TrancheId {
        self.pool
            .add_tranche(&tranche_params(name, expiration_period))
            .unwrap()
    }

    pub fn add_year_tranche(&mut self, name: &str) -> TrancheId {
        self.add_tranche(name, SECONDS_PER_YEAR)
    }

    /// Add a risk module operated by `RM_OPS`
    pub fn add_rm(&mut self, params: RiskModuleParams) -> RiskModuleId {
        let wallet = params.wallet.clone();
        let rm = self.pool.add_risk_module("test", params).unwrap();
        self.roles.grant_role(Role::Pricer(rm), &acct("RM_OPS"));
        self.roles.grant_role(Role::Resolver(rm), &acct("RM_OPS"));
        self.usd.approve(&wallet, &acct("POOL"), units(1_000_000_000));
        rm
    }

    pub fn deposit(&mut self, tranche: TrancheId, lp: &str, amount: i64) {
        self.fund(lp, amount);
        self.pool.deposit(tranche, &acct(lp), units(amount)).unwrap();
    }

    pub fn request(&mut self, payout: Wad, premium: Wad, loss_prob: Ray, expiration: Timestamp) -> PolicyRequest {
        let internal_id = self.next_internal_id;
        self.next_internal_id += 1;
        PolicyRequest {
            payout,
            premium,
            loss_prob,
            expiration,
            customer: acct("CUST"),
            internal_id,
        }
    }

    /// Create a policy paid by `CUST`, funding the customer as needed
    pub fn new_policy(
        &mut self,
        rm: RiskModuleId,
        payout: Wad,
        premium: Wad,
        loss_prob: Ray,
        expiration: Timestamp,
    ) -> Policy {
        self.usd.mint(&acct("CUST"), premium);
        self.usd.approve(&acct("CUST"), &acct("POOL"), units(1_000_000_000));
        let request = self.request(payout, premium, loss_prob, expiration);
        self.pool.new_policy(rm, &acct("RM_OPS"), request).unwrap()
    }

    pub fn advance(&self, seconds: i64) {
        self.clock.advance(seconds);
    }

    /// Sum of locked amounts equals the policy scr for every active policy
    pub fn assert_allocations_exact(&self) {
        for active in self.pool.active_policies() {
            let locked: Wad = active.allocation.values().copied().sum();
            assert_eq!(locked, active.policy.scr, "policy {}", active.policy.id);
        }
    }

    /// Every tranche keeps total_supply >= scr
    pub fn assert_tranches_solvent(&self) {
        for tranche in self.pool.tranches() {
            assert!(
                tranche.total_supply() >= tranche.scr(),
                "tranche {} ocean {}",
                tranche.id(),
                tranche.ocean()
            );
        }
    }
}
