//! Policy settlement
//!
//! Resolution order for a claim of `payout`:
//! 1. The risk module's shared coverage bears `payout * rm_coverage / policy.payout`
//! 2. The policy's own unspent pure premium
//! 3. Won premiums, then other active policies' pure premiums
//! 4. Loans from the policy's tranches, split by locked share
//!
//! Every tranche slice ends with exactly its share of `premium_for_lps`.
//! A loan larger than a tranche's ocean goes through the insolvency hook.

use serde::Serialize;
use tracing::{info, warn};

use parapool_common::{PolicyId, PoolError, Result, Timestamp, TrancheId, Wad};

use super::allocation::tranche_at;
use super::{CashFlows, Ctx, PoolState};
use crate::insolvency::Remedy;

/// Outcome of a resolved or expired policy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub policy_id: PolicyId,
    pub payout: Wad,
    /// Part of the payout funded by the risk module's coverage
    pub rm_part: Wad,
    /// Borrowed from tranches, before any insolvency remedy
    pub borrowed: Wad,
    /// Added to won premiums
    pub won: Wad,
    /// Pool loans repaid from the released premium
    pub repaid: Wad,
}

/// Split `total` by `weights`; the last slice takes the rounding remainder
pub(crate) fn split_by(total: Wad, weights: &[Wad], denominator: Wad) -> Vec<Wad> {
    let mut parts = Vec::with_capacity(weights.len());
    let mut assigned = Wad::ZERO;
    for (i, weight) in weights.iter().enumerate() {
        let part = if i + 1 == weights.len() {
            total - assigned
        } else {
            total.mul_div_down(*weight, denominator)
        };
        assigned += part;
        parts.push(part);
    }
    parts
}

/// Settle `policy_id` paying `payout` to the policy owner
pub(crate) fn settle(
    state: &mut PoolState,
    ctx: &Ctx<'_>,
    flows: &mut CashFlows,
    policy_id: PolicyId,
    payout: Wad,
) -> Result<Settlement> {
    let active = state
        .policies
        .remove(&policy_id)
        .ok_or_else(|| PoolError::NotFound(format!("policy {policy_id}")))?;
    let policy = active.policy;
    let now = ctx.now;

    let rm_part = payout.mul_div_down(policy.rm_coverage, policy.payout);
    let pool_part = payout - rm_part;
    let refund = policy.rm_coverage - rm_part;

    let available = state.ledger.release(policy.pure_premium, policy.rm_coverage);
    let own = available.min(pool_part);
    let to_borrow = state.ledger.cover(pool_part - own);
    let leftover = available - own;

    let tranche_ids: Vec<TrancheId> = active.allocation.keys().copied().collect();
    let locked: Vec<Wad> = active.allocation.values().copied().collect();
    let loans = split_by(to_borrow, &locked, policy.scr);
    let adjustments = split_by(
        policy.premium_for_lps - policy.accrued_interest(now),
        &locked,
        policy.scr,
    );

    for (i, tranche_id) in tranche_ids.iter().enumerate() {
        let tranche = tranche_at(&mut state.tranches, *tranche_id)?;
        tranche.unlock_scr(locked[i], policy.interest_rate, adjustments[i], now)?;

        let mut loan = loans[i];
        if !loan.is_positive() {
            continue;
        }
        let ocean = tranche.ocean();
        if loan > ocean {
            let granted = cover_shortfall(state, ctx, flows, *tranche_id, loan - ocean)?;
            let used = granted.min(loan);
            loan -= used;
            state.ledger.add_won(granted - used);
        }
        let tranche = tranche_at(&mut state.tranches, *tranche_id)?;
        if loan > tranche.ocean() {
            return Err(PoolError::InsolvencyUnresolved {
                tranche: *tranche_id,
                shortfall: loan - tranche.ocean(),
            });
        }
        if loan.is_positive() {
            tranche.lend_from_pool(loan, now)?;
        }
    }

    let rest = state.ledger.refill_borrowed(leftover);
    let repaid = repay_loans(state, &tranche_ids, &locked, policy.scr, rest, now)?;
    let won = rest - repaid;
    state.ledger.add_won(won);

    if let Some(module) = state.risk_modules.get_mut(&policy.risk_module) {
        module.release_scr(policy.scr);
        flows.pay(module.wallet(), refund);
    }
    if payout.is_positive() {
        let owner = ctx
            .registry
            .owner_of(policy_id)
            .ok_or_else(|| PoolError::NotFound(format!("owner of policy {policy_id}")))?;
        flows.pay(&owner, payout);
    }
    state.resolved.insert(policy_id);

    info!(policy = %policy_id, %payout, %rm_part, borrowed = %to_borrow, %won, "Policy settled");
    Ok(Settlement {
        policy_id,
        payout,
        rm_part,
        borrowed: to_borrow,
        won,
        repaid,
    })
}

/// Repay the policy's tranches from `amount`, by locked share and capped by
/// each loan. Returns the total repaid.
fn repay_loans(
    state: &mut PoolState,
    tranche_ids: &[TrancheId],
    locked: &[Wad],
    scr: Wad,
    amount: Wad,
    now: Timestamp,
) -> Result<Wad> {
    if !amount.is_positive() {
        return Ok(Wad::ZERO);
    }
    let shares = split_by(amount, locked, scr);
    let mut repaid = Wad::ZERO;
    for (tranche_id, share) in tranche_ids.iter().zip(shares) {
        let tranche = tranche_at(&mut state.tranches, *tranche_id)?;
        tranche.touch(now)?;
        let payment = share.min(tranche.pool_loan());
        if payment.is_positive() {
            tranche.repay_pool_loan(payment, now)?;
            repaid += payment;
        }
    }
    Ok(repaid)
}

/// Ask the insolvency hook to cover `shortfall` in `tranche_id` and carry out
/// the remedy. Returns the cash granted in place of the tranche; a deposit
/// grants nothing but raises the tranche's ocean.
pub(crate) fn cover_shortfall(
    state: &mut PoolState,
    ctx: &Ctx<'_>,
    flows: &mut CashFlows,
    tranche_id: TrancheId,
    shortfall: Wad,
) -> Result<Wad> {
    let unresolved = || PoolError::InsolvencyUnresolved {
        tranche: tranche_id,
        shortfall,
    };
    let hook = ctx.hook.ok_or_else(unresolved)?;
    warn!(tranche = %tranche_id, %shortfall, hook = hook.name(), "Tranche shortfall");

    let remedy = hook.cover_shortfall(tranche_id, shortfall)?;
    if remedy.amount() < shortfall && matches!(remedy, Remedy::Absorbed { .. }) {
        return Err(unresolved());
    }
    ctx.currency
        .check_pull(remedy.payer(), ctx.pool_account, remedy.amount())
        .map_err(|_| unresolved())?;
    flows.pull(remedy.payer(), remedy.amount());
    flows.remedies += 1;

    match remedy {
        Remedy::Absorbed { amount, .. } => Ok(amount),
        Remedy::Deposited {
            provider,
            tranche,
            amount,
        } => {
            tranche_at(&mut state.tranches, tranche)?.credit(&provider, amount, ctx.now)?;
            Ok(Wad::ZERO)
        }
    }
}
