//! Coin type identifiers and the coin type → value table.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{ChangerError, ErrorKind, Result};

const SETUP_MIN_LEN: usize = 8;
const SETUP_SCALING: usize = 3;
const SETUP_DECIMALS: usize = 4;
const SETUP_CREDITS: usize = 7;
const MAX_TYPES: usize = 16;

/// Business-level coin type, 1-based. Wire nibble is `coin_type - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CoinType(pub u8);

impl CoinType {
    /// Coin type addressed by a wire nibble (only the low four bits count).
    #[inline]
    pub fn from_raw(raw: u8) -> Self {
        Self((raw & 0x0F) + 1)
    }

    /// Wire nibble for this coin type.
    pub fn raw(self) -> Result<u8> {
        match self.0 {
            1..=16 => Ok(self.0 - 1),
            other => Err(ChangerError::new(ErrorKind::Range { coin_type: other })),
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for CoinType {
    fn from(v: u8) -> Self {
        Self(v)
    }
}

/// Denominations known to the device, keyed by coin type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinMap {
    values: BTreeMap<CoinType, u32>,
    scaling: u8,
    decimals: u8,
}

impl CoinMap {
    /// Build from a setup reply.
    ///
    /// Credit slots of `0x00` or `0xFF` are unused. Fails when the reply is
    /// shorter than 8 bytes or names no coin at all.
    pub fn from_setup(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SETUP_MIN_LEN {
            return Err(ChangerError::setup_parse(
                format!(
                    "setup reply has {} bytes, need at least {SETUP_MIN_LEN}",
                    bytes.len()
                ),
                hex::encode_upper(bytes),
            ));
        }
        let scaling = bytes[SETUP_SCALING];
        let decimals = bytes[SETUP_DECIMALS];
        let slots = MAX_TYPES.min(bytes.len() - SETUP_CREDITS);
        let mut values = BTreeMap::new();
        for raw in 0..slots {
            let credit = bytes[SETUP_CREDITS + raw];
            if credit == 0x00 || credit == 0xFF {
                continue;
            }
            #[allow(clippy::cast_possible_truncation)]
            let coin_type = CoinType::from_raw(raw as u8);
            values.insert(coin_type, u32::from(credit) * u32::from(scaling));
        }
        // a zero scaling factor makes every value zero: as useless as no coins
        values.retain(|_, v| *v > 0);
        if values.is_empty() {
            return Err(ChangerError::setup_parse(
                "setup reply names no usable coin types",
                hex::encode_upper(bytes),
            ));
        }
        tracing::debug!(scaling, decimals, coins = values.len(), "coin map from setup");
        Ok(Self {
            values,
            scaling,
            decimals,
        })
    }

    /// Build from a static `(coin_type, value)` table.
    pub fn from_table(table: &[(u8, u32)]) -> Self {
        let values = table
            .iter()
            .filter(|(_, v)| *v > 0)
            .map(|(t, v)| (CoinType(*t), *v))
            .collect();
        Self {
            values,
            scaling: 1,
            decimals: 0,
        }
    }

    pub fn value(&self, coin_type: CoinType) -> Option<u32> {
        self.values.get(&coin_type).copied()
    }

    pub fn contains(&self, coin_type: CoinType) -> bool {
        self.values.contains_key(&coin_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CoinType, u32)> + '_ {
        self.values.iter().map(|(t, v)| (*t, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn scaling(&self) -> u8 {
        self.scaling
    }

    /// Decimal places of the currency (informational).
    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_credits_times_scaling() {
        let bytes = [0x03, 0x19, 0x78, 0x05, 0x02, 0x00, 0x03, 0x01, 0x02, 0x00, 0xFF, 0x05];
        let map = CoinMap::from_setup(&bytes).unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map.value(CoinType(1)), Some(5));
        assert_eq!(map.value(CoinType(2)), Some(10));
        assert_eq!(map.value(CoinType(3)), None);
        assert_eq!(map.value(CoinType(4)), None);
        assert_eq!(map.value(CoinType(5)), Some(25));
        assert_eq!(map.decimals(), 2);
    }

    #[test]
    fn short_or_empty_setup_is_a_parse_error() {
        let err = CoinMap::from_setup(&[0x03, 0x19]).unwrap_err();
        match err.kind {
            ErrorKind::SetupParse { raw, .. } => assert_eq!(raw, "0319"),
            other => panic!("unexpected {other:?}"),
        }
        let unused = [0x03, 0x19, 0x78, 0x05, 0x02, 0x00, 0x00, 0x00, 0xFF];
        assert!(CoinMap::from_setup(&unused).is_err());
    }

    #[test]
    fn raw_nibble_bounds() {
        assert_eq!(CoinType(1).raw().unwrap(), 0);
        assert_eq!(CoinType(16).raw().unwrap(), 15);
        assert!(CoinType(0).raw().is_err());
        assert!(CoinType(17).raw().is_err());
        assert_eq!(CoinType::from_raw(0x51), CoinType(2));
    }
}
