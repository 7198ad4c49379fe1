//! Change-making under per-denomination availability.
//!
//! Greedy first (largest value first, as many as fit). When greedy strands a
//! remainder, a bounded backtracking search over the same ordering finds an
//! exact combination if one exists. Failed `(position, remaining)` states are
//! remembered so the search stays polynomial in practice.

use std::collections::HashSet;

use serde::Serialize;

use crate::coin_map::CoinType;
use crate::error::CoinOpError;
use crate::tubes::TubeState;

/// What one tube can contribute to a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Available {
    pub coin_type: CoinType,
    pub value: u32,
    pub dispensable: u32,
}

impl From<&TubeState> for Available {
    fn from(t: &TubeState) -> Self {
        Self {
            coin_type: t.coin_type,
            value: t.value,
            dispensable: t.dispensable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub coin_type: CoinType,
    pub value: u32,
    pub quantity: u32,
}

/// Coin type → quantity, in descending value order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DispensePlan {
    entries: Vec<PlanEntry>,
}

impl DispensePlan {
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn quantity_of(&self, coin_type: CoinType) -> u32 {
        self.entries
            .iter()
            .find(|e| e.coin_type == coin_type)
            .map_or(0, |e| e.quantity)
    }

    /// Sum of `value * quantity` over the plan.
    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| u64::from(e.value) * u64::from(e.quantity))
            .sum()
    }

    pub fn coin_count(&self) -> u32 {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Plan an exact payout of `amount` from `available`.
///
/// `amount == 0` is the empty plan. Tubes without value or without
/// dispensable coins are ignored; if none remain the plan fails immediately.
pub fn plan(amount: u32, available: &[Available]) -> Result<DispensePlan, CoinOpError> {
    if amount == 0 {
        return Ok(DispensePlan::default());
    }
    let mut tubes: Vec<Available> = available
        .iter()
        .copied()
        .filter(|a| a.value > 0 && a.dispensable > 0)
        .collect();
    if tubes.is_empty() {
        return Err(CoinOpError::NoDispensableTubes);
    }
    tubes.sort_by(|a, b| b.value.cmp(&a.value).then(a.coin_type.cmp(&b.coin_type)));

    let usage = greedy(amount, &tubes).or_else(|| {
        tracing::debug!(amount, "greedy plan stranded a remainder, searching");
        let mut usage = vec![0u32; tubes.len()];
        let mut dead = HashSet::new();
        search(&tubes, 0, amount, &mut usage, &mut dead).then_some(usage)
    });

    match usage {
        Some(usage) => Ok(DispensePlan {
            entries: tubes
                .iter()
                .zip(usage)
                .filter(|(_, q)| *q > 0)
                .map(|(t, quantity)| PlanEntry {
                    coin_type: t.coin_type,
                    value: t.value,
                    quantity,
                })
                .collect(),
        }),
        None => Err(CoinOpError::NoExactChange { amount }),
    }
}

fn greedy(amount: u32, tubes: &[Available]) -> Option<Vec<u32>> {
    let mut remaining = amount;
    let usage: Vec<u32> = tubes
        .iter()
        .map(|t| {
            let used = t.dispensable.min(remaining / t.value);
            remaining -= used * t.value;
            used
        })
        .collect();
    (remaining == 0).then_some(usage)
}

fn search(
    tubes: &[Available],
    idx: usize,
    remaining: u32,
    usage: &mut [u32],
    dead: &mut HashSet<(usize, u32)>,
) -> bool {
    if remaining == 0 {
        return true;
    }
    if idx == tubes.len() || dead.contains(&(idx, remaining)) {
        return false;
    }
    let t = tubes[idx];
    let most = t.dispensable.min(remaining / t.value);
    for used in (0..=most).rev() {
        usage[idx] = used;
        if search(tubes, idx + 1, remaining - used * t.value, usage, dead) {
            return true;
        }
    }
    usage[idx] = 0;
    dead.insert((idx, remaining));
    false
}
