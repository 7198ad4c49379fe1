//! Live per-denomination tube inventory.
//!
//! Invariant after every operation: `0 <= dispensable <= count <= capacity`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::coin_map::{CoinMap, CoinType};
use crate::error::{ChangerError, Result};
use crate::util::percent_rounded;

/// Bytes of full-flags ahead of the per-type counts in a tube status reply.
const STATUS_FLAGS_LEN: usize = 2;
const MAX_TYPES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TubeState {
    pub coin_type: CoinType,
    pub value: u32,
    pub count: u32,
    pub capacity: u32,
    pub dispensable: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TubeStatus {
    Empty,
    Full,
    #[serde(rename = "OK")]
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TubeSummary {
    pub coin_type: CoinType,
    pub value: u32,
    pub count: u32,
    pub capacity: u32,
    pub dispensable: u32,
    pub fullness_percent: u32,
    pub status: TubeStatus,
}

#[derive(Debug, Clone)]
pub struct TubeInventory {
    tubes: BTreeMap<CoinType, TubeState>,
    capacity: u32,
    security_stock: u32,
}

impl TubeInventory {
    pub fn new(capacity: u32, security_stock: u32) -> Self {
        Self {
            tubes: BTreeMap::new(),
            capacity,
            security_stock: security_stock.min(capacity),
        }
    }

    /// One empty tube per known denomination.
    pub fn from_coin_map(coins: &CoinMap, capacity: u32, security_stock: u32) -> Self {
        let mut inv = Self::new(capacity, security_stock);
        for (coin_type, value) in coins.iter() {
            inv.tubes.insert(coin_type, empty_tube(coin_type, value, capacity));
        }
        inv
    }

    /// Overwrite counts with a hardware tube status reply.
    ///
    /// The reply is two flag bytes followed by one approximate count per wire
    /// nibble. Counts above capacity are clamped. Types absent from the
    /// inventory get a tube when the coin map knows them or coins are reported.
    pub fn resync_from_hardware(&mut self, bytes: &[u8], coins: &CoinMap) -> Result<()> {
        if bytes.len() < STATUS_FLAGS_LEN + 1 {
            return Err(ChangerError::tube_refresh(
                format!("tube status has {} bytes, need at least 3", bytes.len()),
                hex::encode_upper(bytes),
            ));
        }
        let counts = &bytes[STATUS_FLAGS_LEN..];
        for (raw, &reported) in counts.iter().take(MAX_TYPES).enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let coin_type = CoinType::from_raw(raw as u8);
            let reported = u32::from(reported);
            if !self.tubes.contains_key(&coin_type) && reported == 0 && !coins.contains(coin_type)
            {
                continue;
            }
            let value = coins.value(coin_type).unwrap_or(0);
            let tube = self
                .tubes
                .entry(coin_type)
                .or_insert_with(|| empty_tube(coin_type, value, self.capacity));
            settle(tube, reported, self.security_stock);
        }
        Ok(())
    }

    /// A coin went into the tube. Creates the tube for a mapped type seen for
    /// the first time.
    pub fn apply_accepted(&mut self, coin_type: CoinType, value: u32) -> &TubeState {
        let capacity = self.capacity;
        let tube = self
            .tubes
            .entry(coin_type)
            .or_insert_with(|| empty_tube(coin_type, value, capacity));
        let next = tube.count.saturating_add(1);
        settle(tube, next, self.security_stock);
        tube
    }

    /// One coin left the tube. `None` when no such tube is known.
    pub fn apply_dispensed(&mut self, coin_type: CoinType) -> Option<&TubeState> {
        self.remove_coins(coin_type, 1)
    }

    /// `quantity` coins left the tube by a dispense command.
    pub fn remove_coins(&mut self, coin_type: CoinType, quantity: u32) -> Option<&TubeState> {
        let tube = self.tubes.get_mut(&coin_type)?;
        let next = tube.count.saturating_sub(quantity);
        settle(tube, next, self.security_stock);
        Some(&*tube)
    }

    /// Zero every count; the tubes themselves stay.
    pub fn reset_all(&mut self) {
        for tube in self.tubes.values_mut() {
            tube.count = 0;
            tube.dispensable = 0;
        }
    }

    pub fn get(&self, coin_type: CoinType) -> Option<&TubeState> {
        self.tubes.get(&coin_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TubeState> {
        self.tubes.values()
    }

    pub fn len(&self) -> usize {
        self.tubes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tubes.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn security_stock(&self) -> u32 {
        self.security_stock
    }

    /// Total value currently eligible for automatic dispensing.
    pub fn dispensable_value(&self) -> u64 {
        self.tubes
            .values()
            .map(|t| u64::from(t.value) * u64::from(t.dispensable))
            .sum()
    }

    pub fn summary(&self) -> Vec<TubeSummary> {
        self.tubes
            .values()
            .map(|t| TubeSummary {
                coin_type: t.coin_type,
                value: t.value,
                count: t.count,
                capacity: t.capacity,
                dispensable: t.dispensable,
                fullness_percent: percent_rounded(t.count, t.capacity),
                status: if t.count == 0 {
                    TubeStatus::Empty
                } else if t.count >= t.capacity {
                    TubeStatus::Full
                } else {
                    TubeStatus::Ok
                },
            })
            .collect()
    }
}

fn empty_tube(coin_type: CoinType, value: u32, capacity: u32) -> TubeState {
    TubeState {
        coin_type,
        value,
        count: 0,
        capacity,
        dispensable: 0,
    }
}

fn settle(tube: &mut TubeState, count: u32, security_stock: u32) {
    tube.count = count.min(tube.capacity);
    tube.dispensable = tube.count.saturating_sub(security_stock);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn coins() -> CoinMap {
        CoinMap::from_table(&[(1, 5), (2, 10)])
    }

    #[test]
    fn accepted_caps_at_capacity() {
        let mut inv = TubeInventory::from_coin_map(&coins(), 2, 0);
        for _ in 0..5 {
            inv.apply_accepted(CoinType(1), 5);
        }
        assert_eq!(inv.get(CoinType(1)).unwrap().count, 2);
    }

    #[test]
    fn security_stock_reserves_coins() {
        let mut inv = TubeInventory::from_coin_map(&coins(), 50, 3);
        inv.resync_from_hardware(&[0, 0, 2, 10], &coins()).unwrap();
        assert_eq!(inv.get(CoinType(1)).unwrap().dispensable, 0);
        assert_eq!(inv.get(CoinType(2)).unwrap().dispensable, 7);
    }

    #[test]
    fn resync_clamps_and_skips_unknown_empty_slots() {
        let mut inv = TubeInventory::from_coin_map(&coins(), 50, 0);
        inv.resync_from_hardware(&[0, 0, 200, 1, 0, 4], &coins()).unwrap();
        assert_eq!(inv.get(CoinType(1)).unwrap().count, 50);
        assert!(inv.get(CoinType(3)).is_none());
        let stray = inv.get(CoinType(4)).unwrap();
        assert_eq!((stray.value, stray.count), (0, 4));
    }

    #[test]
    fn short_status_is_refresh_error() {
        let mut inv = TubeInventory::new(50, 0);
        let err = inv.resync_from_hardware(&[0, 0x1f], &coins()).unwrap_err();
        match err.kind {
            ErrorKind::TubeRefresh { raw, .. } => assert_eq!(raw, "001F"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn summary_statuses() {
        let mut inv = TubeInventory::from_coin_map(&CoinMap::from_table(&[(1, 5), (2, 10), (3, 20)]), 4, 0);
        inv.resync_from_hardware(&[0, 0, 0, 1, 4], &coins()).unwrap();
        let s = inv.summary();
        assert_eq!(s[0].status, TubeStatus::Empty);
        assert_eq!(s[1].status, TubeStatus::Ok);
        assert_eq!(s[1].fullness_percent, 25);
        assert_eq!(s[2].status, TubeStatus::Full);
        assert_eq!(s[2].fullness_percent, 100);
    }
}
