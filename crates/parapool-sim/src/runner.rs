//! Scenario execution against in-memory collaborators

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Encoder;
use tracing::{info, warn};

use parapool_common::{
    Clock, Currency, InMemoryCurrency, InMemoryPolicyRegistry, ManualClock, PolicyId, RoleRegistry,
    Wad,
};
use parapool_core::{Collaborators, PolicyPool, PolicyRequest, PoolMetrics, PoolSnapshot};

use crate::scenario::{Scenario, Step};

/// Allowance granted to the pool by every funded account
const UNLIMITED: i64 = 1_000_000_000_000;

/// Result of one step
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Done,
    Amount(Wad),
    Policy(PolicyId),
    Moved(bool),
}

/// A pool wired to in-memory collaborators
pub struct Simulation {
    pub pool: PolicyPool,
    pub currency: Arc<InMemoryCurrency>,
    pub clock: Arc<ManualClock>,
    pub metrics: Arc<PoolMetrics>,
}

impl Simulation {
    pub fn new(scenario: &Scenario) -> Result<Self> {
        let currency = Arc::new(InMemoryCurrency::new());
        let access = Arc::new(RoleRegistry::new());
        let clock = Arc::new(ManualClock::new(scenario.start));
        let metrics = Arc::new(PoolMetrics::new()?);

        for grant in &scenario.roles {
            access.grant_role(grant.role.clone(), &grant.account);
        }
        let pool_account = &scenario.pool.pool_account;
        for funding in &scenario.funding {
            currency.mint(&funding.account, funding.amount);
            currency.approve(&funding.account, pool_account, Wad::from_units(UNLIMITED));
        }
        // Risk module wallets fund shared coverage
        for rm in &scenario.pool.risk_modules {
            currency.approve(&rm.params.wallet, pool_account, Wad::from_units(UNLIMITED));
        }

        let pool = scenario
            .pool
            .build(Collaborators {
                currency: currency.clone(),
                access,
                registry: Arc::new(InMemoryPolicyRegistry::new()),
                clock: clock.clone(),
            })?
            .with_metrics(metrics.clone());

        Ok(Self {
            pool,
            currency,
            clock,
            metrics,
        })
    }

    /// Run every step in order, stopping at the first failure
    pub fn run(&mut self, steps: &[Step]) -> Result<Vec<Outcome>> {
        steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                self.apply(step)
                    .with_context(|| format!("step {index} ({step:?}) failed"))
            })
            .collect()
    }

    pub fn apply(&mut self, step: &Step) -> Result<Outcome> {
        let pool = &mut self.pool;
        let outcome = match step {
            Step::Deposit { tranche, lp, amount } => Outcome::Amount(pool.deposit(*tranche, lp, *amount)?),
            Step::Withdraw { tranche, lp, amount } => Outcome::Amount(pool.withdraw(*tranche, lp, *amount)?),
            Step::NewPolicy {
                rm,
                caller,
                customer,
                internal_id,
                payout,
                premium,
                loss_prob,
                duration,
            } => {
                let request = PolicyRequest {
                    payout: *payout,
                    premium: *premium,
                    loss_prob: *loss_prob,
                    expiration: self.clock.now() + duration,
                    customer: customer.clone(),
                    internal_id: u128::from(*internal_id),
                };
                Outcome::Policy(pool.new_policy(*rm, caller, request)?.id)
            }
            Step::Resolve {
                rm,
                internal_id,
                caller,
                payout,
            } => {
                let id = pool.make_policy_id(*rm, u128::from(*internal_id))?;
                let settlement = pool.resolve_policy(id, caller, *payout)?;
                Outcome::Amount(settlement.borrowed)
            }
            Step::Expire { rm, internal_id } => {
                let id = pool.make_policy_id(*rm, u128::from(*internal_id))?;
                Outcome::Amount(pool.expire_policy(id)?.won)
            }
            Step::Rebalance {
                rm,
                internal_id,
                caller,
            } => {
                let id = pool.make_policy_id(*rm, u128::from(*internal_id))?;
                Outcome::Moved(pool.rebalance_policy(id, caller)?)
            }
            Step::Advance { seconds } => {
                if *seconds < 0 {
                    warn!(seconds, "Ignoring backwards clock step");
                } else {
                    self.clock.advance(*seconds);
                }
                Outcome::Done
            }
            Step::Checkpoint => {
                let decision = pool.checkpoint()?;
                info!(?decision, "Checkpoint");
                Outcome::Done
            }
            Step::Grant { from, amount } => {
                pool.receive_grant(from, *amount)?;
                Outcome::Done
            }
            Step::RepayLoan { tranche } => Outcome::Amount(pool.repay_tranche_loan(*tranche)?),
            Step::Snapshot => {
                let snapshot = pool.snapshot();
                info!(snapshot = %serde_json::to_string(&snapshot)?, "Snapshot");
                Outcome::Done
            }
        };
        Ok(outcome)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.pool.snapshot()
    }

    pub fn balance(&self, account: &str) -> Wad {
        self.currency.balance_of(&account.into())
    }

    /// Prometheus text exposition of the pool metrics
    pub fn render_metrics(&self) -> Result<String> {
        let registry = prometheus::Registry::new();
        self.metrics.register(&registry)?;
        let mut buffer = Vec::new();
        prometheus::TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
