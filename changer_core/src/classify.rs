//! Poll payload → typed coin event.
//!
//! The first payload byte carries the event kind in its high nibble and the
//! wire coin type in its low nibble. Which nibble means what depends on the
//! bridge dialect, so the mapping is an [`EventMap`] rather than constants.

use std::fmt;

use crate::coin_map::{CoinMap, CoinType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Coin accepted and routed to its tube.
    Accepted,
    /// Coin paid out of a tube.
    Dispensed,
    /// Coin accepted and routed to the cash box.
    Cashbox,
    /// Coin handed back to the customer.
    Returned,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Accepted => "Accepted",
            EventKind::Dispensed => "Dispensed",
            EventKind::Cashbox => "Cashbox",
            EventKind::Returned => "Returned",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoinEvent {
    pub kind: EventKind,
    pub coin_type: CoinType,
    pub value: u32,
}

impl CoinEvent {
    /// Human-readable one-liner, e.g. `Accepted coin 2 (10)`.
    pub fn describe(&self) -> String {
        format!("{} coin {} ({})", self.kind, self.coin_type, self.value)
    }
}

/// High-nibble values of each event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMap {
    pub accepted: u8,
    pub dispensed: u8,
    pub cashbox: u8,
    pub returned: u8,
}

impl Default for EventMap {
    fn default() -> Self {
        Self {
            accepted: 0x5,
            dispensed: 0x9,
            cashbox: 0x4,
            returned: 0x7,
        }
    }
}

impl EventMap {
    pub fn kind_for(&self, nibble: u8) -> Option<EventKind> {
        // first match wins if a dialect reuses a nibble
        [
            (self.accepted, EventKind::Accepted),
            (self.dispensed, EventKind::Dispensed),
            (self.cashbox, EventKind::Cashbox),
            (self.returned, EventKind::Returned),
        ]
        .into_iter()
        .find_map(|(n, k)| (n == nibble).then_some(k))
    }
}

/// Classify a decoded poll payload. Unknown nibbles and unmapped coin types
/// yield `None`.
pub fn classify(payload: &[u8], coins: &CoinMap, events: &EventMap) -> Option<CoinEvent> {
    let &first = payload.first()?;
    let coin_type = CoinType::from_raw(first & 0x0F);
    let Some(value) = coins.value(coin_type) else {
        tracing::trace!(byte = first, "poll byte names unmapped coin type");
        return None;
    };
    let kind = events.kind_for(first >> 4)?;
    Some(CoinEvent {
        kind,
        coin_type,
        value,
    })
}
