//! Runtime configuration for the changer engine.
//!
//! These are separate from the TOML-deserialized config in `changer_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

use crate::classify::EventMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TubeCfg {
    pub capacity: u32,
    /// Coins per tube held back from automatic dispensing.
    pub security_stock: u32,
}

impl Default for TubeCfg {
    fn default() -> Self {
        Self {
            capacity: 50,
            security_stock: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCfg {
    /// Read timeout for one poll reply.
    pub timeout: Duration,
    /// Delay between polls after a reply.
    pub interval: Duration,
    /// Delay after an empty reply.
    pub idle: Duration,
    /// Delay after a failed exchange.
    pub error_backoff: Duration,
    /// The loop turns fatal once consecutive failures exceed this.
    pub max_failures: u32,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(600),
            interval: Duration::from_millis(250),
            idle: Duration::from_millis(150),
            error_backoff: Duration::from_millis(500),
            max_failures: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseCfg {
    pub timeout: Duration,
    /// Pause between consecutive dispense commands.
    pub batch_delay: Duration,
}

impl Default for DispenseCfg {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(800),
            batch_delay: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupCfg {
    /// Substitute `fallback` when the setup reply is unusable.
    pub use_fallback: bool,
    /// Fail initialization when every tube reads empty.
    pub require_stock: bool,
    pub reset_settle: Duration,
    /// Handshake read timeout for enable-master and reset.
    pub handshake_timeout: Duration,
    pub fallback: Vec<(u8, u32)>,
}

impl Default for SetupCfg {
    fn default() -> Self {
        Self {
            use_fallback: true,
            require_stock: false,
            reset_settle: Duration::from_millis(50),
            handshake_timeout: Duration::from_millis(200),
            fallback: vec![(1, 5), (2, 10), (3, 20), (4, 50), (5, 100)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangerCfg {
    /// Timeout of setup/control exchanges.
    pub exchange_timeout: Duration,
    pub tubes: TubeCfg,
    pub poll: PollCfg,
    pub dispense: DispenseCfg,
    pub setup: SetupCfg,
    pub events: EventMap,
}

impl Default for ChangerCfg {
    fn default() -> Self {
        Self {
            exchange_timeout: Duration::from_millis(500),
            tubes: TubeCfg::default(),
            poll: PollCfg::default(),
            dispense: DispenseCfg::default(),
            setup: SetupCfg::default(),
            events: EventMap::default(),
        }
    }
}
