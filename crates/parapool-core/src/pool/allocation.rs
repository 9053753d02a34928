//! Collateral allocation across tranches
//!
//! A policy's scr is split over every tranche that accepts its risk module
//! and horizon, proportionally to each tranche's capacity. Capacity is the
//! ocean at `now` plus whatever the policy already holds in that tranche, so
//! recomputing an unchanged allocation yields the same plan.

use std::collections::BTreeMap;

use tracing::debug;

use parapool_common::{PolicyError, PoolError, Result, RiskModuleId, Timestamp, TrancheId, Wad};

use crate::policy::Policy;
use crate::tranche::CapitalTranche;

/// Locked amount per tranche for one policy
pub type Allocation = BTreeMap<TrancheId, Wad>;

/// Split `scr` across eligible tranches. Every amount is positive and the
/// amounts sum to `scr` exactly.
pub fn plan(
    tranches: &[CapitalTranche],
    rm: RiskModuleId,
    expiration: Timestamp,
    scr: Wad,
    current: &Allocation,
    now: Timestamp,
) -> Result<Allocation> {
    let horizon = expiration - now;
    let capacities: Vec<(TrancheId, Wad)> = tranches
        .iter()
        .filter(|t| t.eligibility(rm, horizon).is_eligible())
        .map(|t| {
            let held = current.get(&t.id()).copied().unwrap_or_default();
            (t.id(), t.ocean_at(now) + held)
        })
        .filter(|(_, capacity)| capacity.is_positive())
        .collect();

    let total: Wad = capacities.iter().map(|(_, c)| *c).sum();
    if total < scr {
        return Err(PolicyError::CapacityExceeded(format!(
            "scr {scr} exceeds eligible capacity {total}"
        ))
        .into());
    }

    let mut amounts: Vec<(TrancheId, Wad, Wad)> = capacities
        .iter()
        .map(|(id, capacity)| (*id, scr.mul_div_down(*capacity, total), *capacity))
        .collect();

    // Hand the rounding remainder to the tranches with the most slack
    let mut remainder = scr - amounts.iter().map(|(_, a, _)| *a).sum::<Wad>();
    if remainder.is_positive() {
        let mut order: Vec<usize> = (0..amounts.len()).collect();
        order.sort_by(|&a, &b| {
            let slack_a = amounts[a].2 - amounts[a].1;
            let slack_b = amounts[b].2 - amounts[b].1;
            slack_b.cmp(&slack_a).then(a.cmp(&b))
        });
        for i in order {
            let slack = amounts[i].2 - amounts[i].1;
            let extra = slack.min(remainder);
            amounts[i].1 += extra;
            remainder -= extra;
            if remainder.is_zero() {
                break;
            }
        }
    }

    Ok(amounts
        .into_iter()
        .filter(|(_, amount, _)| amount.is_positive())
        .map(|(id, amount, _)| (id, amount))
        .collect())
}

/// Lock `allocation` for `policy`
pub(crate) fn lock(
    tranches: &mut [CapitalTranche],
    policy: &Policy,
    allocation: &Allocation,
    now: Timestamp,
) -> Result<()> {
    for (tranche_id, amount) in allocation {
        let tranche = tranche_at(tranches, *tranche_id)?;
        tranche.lock_scr(policy.risk_module, policy.expiration, *amount, policy.interest_rate, now)?;
        debug!(policy = %policy.id, tranche = %tranche_id, %amount, "Allocated scr");
    }
    Ok(())
}

/// Release `allocation` without any adjustment
pub(crate) fn unlock(
    tranches: &mut [CapitalTranche],
    policy: &Policy,
    allocation: &Allocation,
    now: Timestamp,
) -> Result<()> {
    for (tranche_id, amount) in allocation {
        tranche_at(tranches, *tranche_id)?.unlock_scr(*amount, policy.interest_rate, Wad::ZERO, now)?;
    }
    Ok(())
}

/// Plan and lock a new policy
pub(crate) fn allocate(
    tranches: &mut [CapitalTranche],
    policy: &Policy,
    now: Timestamp,
) -> Result<Allocation> {
    let allocation = plan(
        tranches,
        policy.risk_module,
        policy.expiration,
        policy.scr,
        &Allocation::new(),
        now,
    )?;
    lock(tranches, policy, &allocation, now)?;
    Ok(allocation)
}

/// Move `policy` to a freshly computed allocation.
///
/// Returns `None` when the plan matches `current`; nothing is touched then.
pub(crate) fn reallocate(
    tranches: &mut [CapitalTranche],
    policy: &Policy,
    current: &Allocation,
    now: Timestamp,
) -> Result<Option<Allocation>> {
    let next = plan(tranches, policy.risk_module, policy.expiration, policy.scr, current, now)?;
    if &next == current {
        return Ok(None);
    }
    unlock(tranches, policy, current, now)?;
    lock(tranches, policy, &next, now)?;
    Ok(Some(next))
}

pub(crate) fn tranche_at(tranches: &mut [CapitalTranche], id: TrancheId) -> Result<&mut CapitalTranche> {
    tranches
        .get_mut(id.0 as usize)
        .ok_or_else(|| PoolError::NotFound(format!("tranche {id}")))
}
