//! Policy Pool - orchestrates tranches, risk modules and the premium ledger
//!
//! Every mutating entry point runs as one transaction:
//! 1. The current state is cloned into a draft and the operation runs on it
//! 2. Cash movements are recorded, not executed, while the draft is built
//! 3. Pulls are checked against allowances and balances; missing idle cash
//!    is deinvested from the asset manager
//! 4. Cash moves and the draft replaces the state
//!
//! Any error before step 4 leaves the pool untouched.

pub mod allocation;
pub mod ledger;
pub mod settlement;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use parapool_common::{
    AccessControl, AccountId, Clock, Currency, LedgerError, PolicyError, PolicyId, PolicyRegistry,
    PoolError, Result, RiskModuleId, Role, Timestamp, TrancheId, Wad, WEEK,
};

use crate::asset_manager::{AssetManager, Rebalance};
use crate::insolvency::InsolvencyHook;
use crate::metrics::PoolMetrics;
use crate::policy::{Policy, PolicyRequest};
use crate::risk_module::{apply_tweak, ParameterValue, RiskModule, RiskModuleParams, Tier, TweakContext};
use crate::tranche::{CapitalTranche, TrancheParams, TrancheSnapshot};

pub use allocation::Allocation;
pub use ledger::PremiumLedger;
pub use settlement::Settlement;

/// Pool behind the single critical section every entry point runs under
pub type SharedPolicyPool = Arc<parking_lot::Mutex<PolicyPool>>;

/// External services the pool depends on
#[derive(Clone)]
pub struct Collaborators {
    pub currency: Arc<dyn Currency>,
    pub access: Arc<dyn AccessControl>,
    pub registry: Arc<dyn PolicyRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// A policy holding collateral
#[derive(Debug, Clone, Serialize)]
pub struct ActivePolicy {
    pub policy: Policy,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PoolState {
    pub(crate) tranches: Vec<CapitalTranche>,
    pub(crate) risk_modules: BTreeMap<RiskModuleId, RiskModule>,
    pub(crate) policies: BTreeMap<PolicyId, ActivePolicy>,
    pub(crate) resolved: HashSet<PolicyId>,
    pub(crate) ledger: PremiumLedger,
}

impl PoolState {
    fn tranche(&self, id: TrancheId) -> Result<&CapitalTranche> {
        self.tranches
            .get(id.0 as usize)
            .ok_or_else(|| PoolError::NotFound(format!("tranche {id}")))
    }

    fn tranche_mut(&mut self, id: TrancheId) -> Result<&mut CapitalTranche> {
        allocation::tranche_at(&mut self.tranches, id)
    }

    fn risk_module(&self, id: RiskModuleId) -> Result<&RiskModule> {
        self.risk_modules
            .get(&id)
            .ok_or_else(|| PoolError::NotFound(format!("risk module {id}")))
    }

    fn risk_module_mut(&mut self, id: RiskModuleId) -> Result<&mut RiskModule> {
        self.risk_modules
            .get_mut(&id)
            .ok_or_else(|| PoolError::NotFound(format!("risk module {id}")))
    }

    fn total_liquidity(&self) -> Wad {
        self.tranches.iter().map(|t| t.total_supply()).sum()
    }
}

/// Read-only services available while a draft is built
pub(crate) struct Ctx<'a> {
    pub(crate) now: Timestamp,
    pub(crate) pool_account: &'a AccountId,
    pub(crate) currency: &'a dyn Currency,
    pub(crate) registry: &'a dyn PolicyRegistry,
    pub(crate) hook: Option<&'a dyn InsolvencyHook>,
}

/// Cash movements recorded by a draft
#[derive(Debug, Default)]
pub(crate) struct CashFlows {
    pulls: Vec<(AccountId, Wad)>,
    pays: Vec<(AccountId, Wad)>,
    /// Insolvency remedies applied
    pub(crate) remedies: u64,
}

impl CashFlows {
    /// Pull `amount` from `from` into the pool
    pub(crate) fn pull(&mut self, from: &AccountId, amount: Wad) {
        if amount.is_positive() {
            self.pulls.push((from.clone(), amount));
        }
    }

    /// Pay `amount` from the pool to `to`
    pub(crate) fn pay(&mut self, to: &AccountId, amount: Wad) {
        if amount.is_positive() {
            self.pays.push((to.clone(), amount));
        }
    }

    fn pulls_by_account(&self) -> BTreeMap<&AccountId, Wad> {
        let mut totals: BTreeMap<&AccountId, Wad> = BTreeMap::new();
        for (account, amount) in &self.pulls {
            *totals.entry(account).or_default() += *amount;
        }
        totals
    }

    fn inflow(&self) -> Wad {
        self.pulls.iter().map(|(_, a)| *a).sum()
    }

    fn outflow(&self) -> Wad {
        self.pays.iter().map(|(_, a)| *a).sum()
    }
}

/// Serializable view of the whole pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub now: Timestamp,
    pub idle_cash: Wad,
    pub investment_value: Wad,
    pub ledger: PremiumLedger,
    pub tranches: Vec<TrancheSnapshot>,
    pub risk_modules: Vec<RiskModuleSnapshot>,
    pub active_policies: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskModuleSnapshot {
    pub id: RiskModuleId,
    pub name: String,
    pub total_scr: Wad,
    pub params: RiskModuleParams,
}

/// The policy pool
pub struct PolicyPool {
    state: PoolState,
    pool_account: AccountId,
    treasury: AccountId,
    currency: Arc<dyn Currency>,
    access: Arc<dyn AccessControl>,
    registry: Arc<dyn PolicyRegistry>,
    clock: Arc<dyn Clock>,
    asset_manager: Option<Box<dyn AssetManager>>,
    hook: Option<Arc<dyn InsolvencyHook>>,
    metrics: Option<Arc<PoolMetrics>>,
    tweak_cooldown: i64,
}

impl PolicyPool {
    pub fn new(pool_account: AccountId, treasury: AccountId, collaborators: Collaborators) -> Self {
        Self {
            state: PoolState::default(),
            pool_account,
            treasury,
            currency: collaborators.currency,
            access: collaborators.access,
            registry: collaborators.registry,
            clock: collaborators.clock,
            asset_manager: None,
            hook: None,
            metrics: None,
            tweak_cooldown: WEEK,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<PoolMetrics>) -> Self {
        self.metrics = Some(metrics);
        self.refresh_metrics();
        self
    }

    /// Minimum seconds between two `Level3` tweaks of one parameter
    pub fn with_tweak_cooldown(mut self, cooldown: i64) -> Self {
        self.tweak_cooldown = cooldown;
        self
    }

    pub fn with_asset_manager(mut self, asset_manager: Box<dyn AssetManager>) -> Self {
        self.asset_manager = Some(asset_manager);
        self
    }

    pub fn with_insolvency_hook(mut self, hook: Arc<dyn InsolvencyHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn into_shared(self) -> SharedPolicyPool {
        Arc::new(parking_lot::Mutex::new(self))
    }

    // ---------- Setup ----------

    pub fn add_tranche(&mut self, params: &TrancheParams) -> Result<TrancheId> {
        if params.expiration_period <= 0 {
            return Err(PoolError::validation("expiration_period must be positive"));
        }
        if params.pool_loan_interest_rate.is_negative() {
            return Err(PoolError::validation("pool_loan_interest_rate cannot be negative"));
        }
        let id = TrancheId(self.state.tranches.len() as u32);
        self.state
            .tranches
            .push(CapitalTranche::new(id, params, self.clock.now()));
        info!(tranche = %id, name = %params.name, "Tranche added");
        self.refresh_metrics();
        Ok(id)
    }

    pub fn add_risk_module(&mut self, name: &str, params: RiskModuleParams) -> Result<RiskModuleId> {
        let id = RiskModuleId(self.state.risk_modules.len() as u32 + 1);
        let module = RiskModule::new(id, name, params)?;
        self.state.risk_modules.insert(id, module);
        info!(rm = %id, %name, "Risk module added");
        Ok(id)
    }

    /// Replace the insolvency hook. Requires `Guardian`.
    pub fn set_insolvency_hook(
        &mut self,
        caller: &AccountId,
        hook: Option<Arc<dyn InsolvencyHook>>,
    ) -> Result<()> {
        self.access.require_role(&Role::Guardian, caller)?;
        info!(hook = hook.as_ref().map(|h| h.name()).unwrap_or("none"), "Insolvency hook set");
        self.hook = hook;
        Ok(())
    }

    /// Replace the asset manager. Requires `Guardian`.
    ///
    /// The current manager is fully deinvested and its pending earnings
    /// distributed before it is dropped.
    pub fn set_asset_manager(
        &mut self,
        caller: &AccountId,
        asset_manager: Option<Box<dyn AssetManager>>,
    ) -> Result<()> {
        self.access.require_role(&Role::Guardian, caller)?;
        let now = self.clock.now();
        self.distribute_earnings()?;
        if let Some(current) = self.asset_manager.as_mut() {
            let moved = current.deinvest_all(self.currency.as_ref(), &self.pool_account, now)?;
            info!(%moved, "Deinvested before detaching asset manager");
        }
        self.asset_manager = asset_manager;
        self.refresh_metrics();
        Ok(())
    }

    // ---------- Views ----------

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn pool_account(&self) -> &AccountId {
        &self.pool_account
    }

    pub fn treasury(&self) -> &AccountId {
        &self.treasury
    }

    pub fn tranche(&self, id: TrancheId) -> Result<&CapitalTranche> {
        self.state.tranche(id)
    }

    pub fn tranches(&self) -> &[CapitalTranche] {
        &self.state.tranches
    }

    pub fn risk_module(&self, id: RiskModuleId) -> Result<&RiskModule> {
        self.state.risk_module(id)
    }

    pub fn policy(&self, id: PolicyId) -> Option<&ActivePolicy> {
        self.state.policies.get(&id)
    }

    pub fn is_resolved(&self, id: PolicyId) -> bool {
        self.state.resolved.contains(&id)
    }

    pub fn active_policies(&self) -> impl Iterator<Item = &ActivePolicy> {
        self.state.policies.values()
    }

    pub fn ledger(&self) -> &PremiumLedger {
        &self.state.ledger
    }

    /// Cash the pool itself owns and may invest
    pub fn get_investable(&self) -> Wad {
        self.state.ledger.investable()
    }

    /// Total supply across every tranche
    pub fn total_liquidity(&self) -> Wad {
        self.state.total_liquidity()
    }

    pub fn asset_manager(&self) -> Option<&dyn AssetManager> {
        self.asset_manager.as_deref()
    }

    pub fn investment_value(&self) -> Wad {
        let now = self.clock.now();
        self.asset_manager
            .as_ref()
            .map(|am| am.investment_value(now))
            .unwrap_or_default()
    }

    pub fn make_policy_id(&self, rm: RiskModuleId, internal_id: u128) -> Result<PolicyId> {
        self.state.risk_module(rm)?.make_policy_id(internal_id)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            now: self.clock.now(),
            idle_cash: self.currency.balance_of(&self.pool_account),
            investment_value: self.investment_value(),
            ledger: self.state.ledger.clone(),
            tranches: self.state.tranches.iter().map(|t| t.snapshot()).collect(),
            risk_modules: self
                .state
                .risk_modules
                .values()
                .map(|rm| RiskModuleSnapshot {
                    id: rm.id(),
                    name: rm.name().to_string(),
                    total_scr: rm.total_scr(),
                    params: rm.params().clone(),
                })
                .collect(),
            active_policies: self.state.policies.len(),
        }
    }

    // ---------- Transactions ----------

    fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut PoolState, &Ctx<'_>, &mut CashFlows) -> Result<T>,
    ) -> Result<T> {
        let now = self.clock.now();
        let mut draft = self.state.clone();
        let mut flows = CashFlows::default();
        let output = {
            let ctx = Ctx {
                now,
                pool_account: &self.pool_account,
                currency: self.currency.as_ref(),
                registry: self.registry.as_ref(),
                hook: self.hook.as_deref(),
            };
            f(&mut draft, &ctx, &mut flows)?
        };

        for (account, amount) in flows.pulls_by_account() {
            self.currency.check_pull(account, &self.pool_account, amount)?;
        }
        self.ensure_liquidity(flows.outflow() - flows.inflow(), now)?;

        for (account, amount) in &flows.pulls {
            self.currency
                .transfer_from(&self.pool_account, account, &self.pool_account, *amount)?;
        }
        for (account, amount) in &flows.pays {
            self.currency.transfer(&self.pool_account, account, *amount)?;
        }

        self.state = draft;
        if flows.remedies > 0 {
            if let Some(metrics) = &self.metrics {
                metrics.insolvency_remedies.inc_by(flows.remedies);
            }
        }
        self.refresh_metrics();
        Ok(output)
    }

    /// Make sure idle cash covers a net outflow of `net_outflow`,
    /// deinvesting from the asset manager when needed
    fn ensure_liquidity(&mut self, net_outflow: Wad, now: Timestamp) -> Result<()> {
        let idle = self.currency.balance_of(&self.pool_account);
        if net_outflow <= idle {
            return Ok(());
        }
        let missing = net_outflow - idle;
        if let Some(am) = self.asset_manager.as_mut() {
            let moved = am.deinvest(self.currency.as_ref(), &self.pool_account, missing, now)?;
            debug!(%missing, %moved, "Refilled idle cash from asset manager");
        }
        let idle = self.currency.balance_of(&self.pool_account);
        if net_outflow > idle {
            return Err(LedgerError::InsufficientLiquidity {
                required: net_outflow,
                idle,
            }
            .into());
        }
        Ok(())
    }

    fn refresh_metrics(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.observe(&self.snapshot());
        }
    }

    fn require_admin(&self, caller: &AccountId) -> Result<Tier> {
        match Tier::of(self.access.as_ref(), caller) {
            Some(tier @ (Tier::Level1 | Tier::Level2)) => Ok(tier),
            _ => Err(PoolError::unauthorized(caller, Role::Level2)),
        }
    }

    // ---------- Policy lifecycle ----------

    /// Price, allocate and fund a new policy. Requires `Pricer(rm)`.
    ///
    /// The customer pays the premium and the risk module wallet funds the
    /// shared coverage; the wallet receives `premium_for_rm +
    /// rm_shared_premium` and the treasury `premium_for_ensuro`.
    #[instrument(skip(self, request), fields(payout = %request.payout, premium = %request.premium))]
    pub fn new_policy(
        &mut self,
        rm: RiskModuleId,
        caller: &AccountId,
        request: PolicyRequest,
    ) -> Result<Policy> {
        self.access.require_role(&Role::Pricer(rm), caller)?;
        let treasury = self.treasury.clone();

        let policy = self.transact(|state, ctx, flows| {
            let module = state.risk_module(rm)?;
            let policy = module.price_policy(&request, ctx.now)?;
            let wallet = module.wallet().clone();
            if state.policies.contains_key(&policy.id)
                || state.resolved.contains(&policy.id)
                || ctx.registry.owner_of(policy.id).is_some()
            {
                return Err(PolicyError::DuplicatePolicyId(policy.id).into());
            }

            let allocation = allocation::allocate(&mut state.tranches, &policy, ctx.now)?;
            state.ledger.commit(policy.pure_premium, policy.rm_coverage);
            state.risk_module_mut(rm)?.add_scr(policy.scr);

            flows.pull(&request.customer, policy.premium);
            flows.pull(&wallet, policy.rm_coverage);
            flows.pay(&wallet, policy.rm_income());
            flows.pay(&treasury, policy.premium_for_ensuro);

            state.policies.insert(
                policy.id,
                ActivePolicy {
                    policy: policy.clone(),
                    allocation,
                },
            );
            Ok(policy)
        })?;

        self.registry.mint(policy.id, &request.customer)?;
        if let Some(metrics) = &self.metrics {
            metrics.policies_created.inc();
        }
        info!(policy = %policy.id, scr = %policy.scr, customer = %request.customer, "Policy created");
        Ok(policy)
    }

    /// Resolve `id` paying `payout` to its owner. Requires `Resolver(rm)`.
    ///
    /// A zero payout is a no-claim resolution. Requests above the policy's
    /// payout are capped to it.
    #[instrument(skip(self), fields(policy = %id))]
    pub fn resolve_policy(&mut self, id: PolicyId, caller: &AccountId, payout: Wad) -> Result<Settlement> {
        let now = self.clock.now();
        let policy = self.active_policy(id)?.policy.clone();
        self.access
            .require_role(&Role::Resolver(policy.risk_module), caller)?;
        if policy.is_expired(now) {
            return Err(PolicyError::AlreadyExpired(id).into());
        }
        if payout.is_negative() {
            return Err(PoolError::validation(format!("payout {payout} cannot be negative")));
        }
        let payout = payout.min(policy.payout);

        let result = self.transact(|state, ctx, flows| settlement::settle(state, ctx, flows, id, payout))?;
        let outcome = if payout.is_positive() { "claim" } else { "no_claim" };
        self.record_settlement(outcome);
        Ok(result)
    }

    /// Release an expired policy with no payout. Callable by anyone.
    #[instrument(skip(self), fields(policy = %id))]
    pub fn expire_policy(&mut self, id: PolicyId) -> Result<Settlement> {
        let now = self.clock.now();
        let policy = self.active_policy(id)?.policy.clone();
        if !policy.is_expired(now) {
            return Err(PolicyError::NotExpiredYet(id).into());
        }
        let result =
            self.transact(|state, ctx, flows| settlement::settle(state, ctx, flows, id, Wad::ZERO))?;
        self.record_settlement("expired");
        Ok(result)
    }

    /// Recompute the allocation of `id` against the currently eligible
    /// tranches. Requires `Rebalancer`. Returns whether anything moved.
    #[instrument(skip(self), fields(policy = %id))]
    pub fn rebalance_policy(&mut self, id: PolicyId, caller: &AccountId) -> Result<bool> {
        self.access.require_role(&Role::Rebalancer, caller)?;
        self.active_policy(id)?;
        self.transact(|state, ctx, _| {
            let active = state
                .policies
                .get(&id)
                .cloned()
                .ok_or_else(|| PoolError::NotFound(format!("policy {id}")))?;
            match allocation::reallocate(&mut state.tranches, &active.policy, &active.allocation, ctx.now)? {
                Some(next) => {
                    info!(policy = %id, tranches = next.len(), "Policy rebalanced");
                    if let Some(entry) = state.policies.get_mut(&id) {
                        entry.allocation = next;
                    }
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    fn active_policy(&self, id: PolicyId) -> Result<&ActivePolicy> {
        if self.state.resolved.contains(&id) {
            return Err(PolicyError::AlreadyResolved(id).into());
        }
        self.state
            .policies
            .get(&id)
            .ok_or_else(|| PoolError::NotFound(format!("policy {id}")))
    }

    fn record_settlement(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.policies_settled.with_label_values(&[outcome]).inc();
        }
    }

    // ---------- Liquidity providers ----------

    /// Deposit `amount` of `caller`'s cash into `tranche`
    #[instrument(skip(self), fields(tranche = %tranche))]
    pub fn deposit(&mut self, tranche: TrancheId, caller: &AccountId, amount: Wad) -> Result<Wad> {
        self.require_holder(tranche, caller)?;
        let deposited = self.transact(|state, ctx, flows| {
            let deposited = state.tranche_mut(tranche)?.deposit(caller, amount, ctx.now)?;
            flows.pull(caller, deposited);
            Ok(deposited)
        })?;
        info!(%caller, amount = %deposited, "Deposit");
        Ok(deposited)
    }

    /// Withdraw `amount` from `tranche`, or with `None` the largest
    /// withdrawable amount
    #[instrument(skip(self), fields(tranche = %tranche))]
    pub fn withdraw(&mut self, tranche: TrancheId, caller: &AccountId, amount: Option<Wad>) -> Result<Wad> {
        let withdrawn = self.transact(|state, ctx, flows| {
            let withdrawn = state.tranche_mut(tranche)?.withdraw(caller, amount, ctx.now)?;
            flows.pay(caller, withdrawn);
            Ok(withdrawn)
        })?;
        info!(%caller, amount = %withdrawn, "Withdraw");
        Ok(withdrawn)
    }

    pub fn transfer_shares(
        &mut self,
        tranche: TrancheId,
        from: &AccountId,
        to: &AccountId,
        amount: Wad,
    ) -> Result<()> {
        self.require_holder(tranche, to)?;
        self.transact(|state, ctx, _| state.tranche_mut(tranche)?.transfer(from, to, amount, ctx.now))
    }

    pub fn approve_shares(
        &mut self,
        tranche: TrancheId,
        owner: &AccountId,
        spender: &AccountId,
        amount: Wad,
    ) -> Result<()> {
        self.state.tranche_mut(tranche)?.approve(owner, spender, amount);
        Ok(())
    }

    pub fn transfer_shares_from(
        &mut self,
        tranche: TrancheId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: Wad,
    ) -> Result<()> {
        self.require_holder(tranche, to)?;
        self.transact(|state, ctx, _| {
            state
                .tranche_mut(tranche)?
                .transfer_from(spender, from, to, amount, ctx.now)
        })
    }

    /// Whitelisted tranches only accept `LiquidityProvider` holders
    fn require_holder(&self, tranche: TrancheId, holder: &AccountId) -> Result<()> {
        if self.state.tranche(tranche)?.whitelist_only() {
            self.access.require_role(&Role::LiquidityProvider, holder)?;
        }
        Ok(())
    }

    // ---------- Premium ledger ----------

    /// Add `amount` of external capital to won premiums
    #[instrument(skip(self))]
    pub fn receive_grant(&mut self, from: &AccountId, amount: Wad) -> Result<()> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount.into());
        }
        self.transact(|state, _, flows| {
            state.ledger.add_won(amount);
            flows.pull(from, amount);
            Ok(())
        })?;
        info!(%from, %amount, "Grant received");
        Ok(())
    }

    /// Repay as much of `tranche`'s pool loan as won premiums allow.
    /// Returns the amount repaid.
    #[instrument(skip(self), fields(tranche = %tranche))]
    pub fn repay_tranche_loan(&mut self, tranche: TrancheId) -> Result<Wad> {
        let repaid = self.transact(|state, ctx, _| {
            let loan = {
                let t = state.tranche_mut(tranche)?;
                t.touch(ctx.now)?;
                t.pool_loan()
            };
            let amount = loan.min(state.ledger.won_pure_premiums());
            if !amount.is_positive() {
                return Ok(Wad::ZERO);
            }
            state.ledger.take_won(amount);
            state.tranche_mut(tranche)?.repay_pool_loan(amount, ctx.now)?;
            Ok(amount)
        })?;
        info!(%repaid, "Tranche loan repaid");
        Ok(repaid)
    }

    /// Send up to `amount` of won premiums to the treasury. Requires
    /// `Treasurer`. Returns the amount sent.
    #[instrument(skip(self))]
    pub fn withdraw_won_premiums(&mut self, caller: &AccountId, amount: Wad) -> Result<Wad> {
        self.access.require_role(&Role::Treasurer, caller)?;
        let treasury = self.treasury.clone();
        let withdrawn = self.transact(|state, _, flows| {
            let taken = state.ledger.take_won(amount.max_zero());
            flows.pay(&treasury, taken);
            Ok(taken)
        })?;
        info!(amount = %withdrawn, "Won premiums withdrawn");
        Ok(withdrawn)
    }

    // ---------- Administration ----------

    pub fn set_deposits_enabled(&mut self, tranche: TrancheId, caller: &AccountId, enabled: bool) -> Result<()> {
        self.require_admin(caller)?;
        self.state.tranche_mut(tranche)?.set_deposits_enabled(enabled);
        info!(%tranche, enabled, "Deposits toggled");
        Ok(())
    }

    pub fn set_accept_all_rms(&mut self, tranche: TrancheId, caller: &AccountId, accept_all: bool) -> Result<()> {
        self.require_admin(caller)?;
        self.state
            .tranche_mut(tranche)?
            .acceptance_mut()
            .set_accept_all(accept_all);
        info!(%tranche, accept_all, "Risk module default acceptance changed");
        Ok(())
    }

    pub fn set_rm_exception(
        &mut self,
        tranche: TrancheId,
        caller: &AccountId,
        rm: RiskModuleId,
        exception: bool,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.state
            .tranche_mut(tranche)?
            .acceptance_mut()
            .set_exception(rm, exception);
        info!(%tranche, %rm, exception, "Risk module exception changed");
        Ok(())
    }

    /// Change one risk module parameter.
    ///
    /// The wallet requires `RmProvider(rm)`; every other parameter goes
    /// through tiered governance.
    #[instrument(skip(self))]
    pub fn set_rm_parameter(&mut self, rm: RiskModuleId, caller: &AccountId, value: ParameterValue) -> Result<()> {
        if let ParameterValue::Wallet(wallet) = &value {
            self.access.require_role(&Role::RmProvider(rm), caller)?;
            self.state.risk_module_mut(rm)?.params_mut().set(&value)?;
            info!(%rm, %wallet, "Wallet changed");
            return Ok(());
        }
        let tier = Tier::of(self.access.as_ref(), caller)
            .ok_or_else(|| PoolError::unauthorized(caller, Role::Level3))?;
        let ctx = TweakContext {
            now: self.clock.now(),
            total_liquidity: self.state.total_liquidity().raw(),
            cooldown: self.tweak_cooldown,
        };
        apply_tweak(self.state.risk_module_mut(rm)?, tier, &value, &ctx)
    }

    // ---------- Asset management ----------

    /// Distribute pending earnings, then rebalance idle cash against the
    /// asset manager's thresholds. A no-op without an asset manager.
    ///
    /// No cash moves unless the distribution succeeds.
    #[instrument(skip(self))]
    pub fn checkpoint(&mut self) -> Result<Rebalance> {
        if self.asset_manager.is_none() {
            return Ok(Rebalance::Hold);
        }
        self.distribute_earnings()?;

        let now = self.clock.now();
        let idle = self.currency.balance_of(&self.pool_account);
        let Some(am) = self.asset_manager.as_mut() else {
            return Ok(Rebalance::Hold);
        };
        let decision = am.plan(idle, now);
        match decision {
            Rebalance::Invest(amount) => am.invest(self.currency.as_ref(), &self.pool_account, amount, now)?,
            Rebalance::Deinvest(amount) => {
                am.deinvest(self.currency.as_ref(), &self.pool_account, amount, now)?;
            }
            Rebalance::Hold => {}
        }
        debug!(?decision, %idle, "Checkpoint");
        self.refresh_metrics();
        Ok(decision)
    }

    /// Split the asset manager's pending earnings between the pool and
    /// every tranche by investable capital. Returns the amount distributed.
    #[instrument(skip(self))]
    pub fn distribute_earnings(&mut self) -> Result<Wad> {
        let now = self.clock.now();
        let delta = match &self.asset_manager {
            Some(am) => am.pending_earnings(now),
            None => return Ok(Wad::ZERO),
        };
        if delta.is_zero() {
            return Ok(Wad::ZERO);
        }

        self.transact(|state, ctx, flows| {
            for tranche in state.tranches.iter_mut() {
                tranche.touch(ctx.now)?;
            }
            let pool_weight = state.ledger.investable().max_zero();
            let weights: Vec<Wad> = state.tranches.iter().map(|t| t.get_investable()).collect();
            let total = pool_weight + weights.iter().copied().sum::<Wad>();

            let mut parts = vec![Wad::ZERO; weights.len()];
            if total.is_positive() {
                for (part, weight) in parts.iter_mut().zip(&weights) {
                    if weight.is_positive() {
                        *part = delta.mul_div_down(*weight, total);
                    }
                }
            }

            let rest = delta - parts.iter().copied().sum::<Wad>();
            if rest.is_negative() {
                let unabsorbed = state.ledger.absorb_loss(-rest);
                if unabsorbed.is_positive() {
                    // Pool cash is exhausted; tranches bear the rest by capital
                    let holders: Vec<usize> = (0..state.tranches.len())
                        .filter(|&i| state.tranches[i].total_supply().is_positive())
                        .collect();
                    let capital: Vec<Wad> = holders.iter().map(|&i| state.tranches[i].total_supply()).collect();
                    let total_capital = capital.iter().copied().sum::<Wad>();
                    if holders.is_empty() {
                        return Err(LedgerError::UnabsorbedLoss(unabsorbed).into());
                    }
                    let extra = settlement::split_by(-unabsorbed, &capital, total_capital);
                    for (index, amount) in holders.into_iter().zip(extra) {
                        parts[index] += amount;
                    }
                    warn!(%unabsorbed, "Investment loss exceeds pool cash");
                }
            } else if rest.is_positive() {
                state.ledger.add_won(rest);
            }

            for (index, share) in parts.into_iter().enumerate() {
                if share.is_zero() {
                    continue;
                }
                let id = TrancheId(index as u32);
                let mut part = share;
                let ocean = state.tranche(id)?.ocean();
                if part.is_negative() && -part > ocean {
                    // Granted cash stands in for the tranche's capital
                    let granted = settlement::cover_shortfall(state, ctx, flows, id, -part - ocean)?;
                    part += granted.min(-part);
                }
                state.tranche_mut(id)?.apply_earnings(part, ctx.now)?;
                if state.tranche(id)?.ocean().is_negative() {
                    return Err(PoolError::InsolvencyUnresolved {
                        tranche: id,
                        shortfall: -state.tranche(id)?.ocean(),
                    });
                }
            }
            Ok(())
        })?;

        if let Some(am) = self.asset_manager.as_mut() {
            am.mark_distributed(now);
        }
        if delta.is_negative() {
            warn!(%delta, "Investment loss distributed");
        } else {
            info!(%delta, "Earnings distributed");
        }
        Ok(delta)
    }
}

impl std::fmt::Debug for PolicyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyPool")
            .field("pool_account", &self.pool_account)
            .field("tranches", &self.state.tranches.len())
            .field("risk_modules", &self.state.risk_modules.len())
            .field("active_policies", &self.state.policies.len())
            .field("asset_manager", &self.asset_manager)
            .field("hook", &self.hook)
            .finish()
    }
}
