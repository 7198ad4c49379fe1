//! `From` implementations bridging `changer_config` types to `changer_core` types.

use crate::classify::EventMap;
use crate::config::{ChangerCfg, DispenseCfg, PollCfg, SetupCfg, TubeCfg};
use crate::util::ms;

// ── TubeCfg ──────────────────────────────────────────────────────────────────

impl From<&changer_config::TubesCfg> for TubeCfg {
    fn from(c: &changer_config::TubesCfg) -> Self {
        Self {
            capacity: u32::from(c.capacity),
            security_stock: u32::from(c.security_stock),
        }
    }
}

// ── PollCfg ──────────────────────────────────────────────────────────────────

impl From<&changer_config::PollCfg> for PollCfg {
    fn from(c: &changer_config::PollCfg) -> Self {
        Self {
            timeout: ms(c.timeout_ms),
            interval: ms(c.interval_ms),
            idle: ms(c.idle_ms),
            error_backoff: ms(c.error_backoff_ms),
            max_failures: c.max_failures,
        }
    }
}

// ── DispenseCfg ──────────────────────────────────────────────────────────────

impl From<&changer_config::DispenseCfg> for DispenseCfg {
    fn from(c: &changer_config::DispenseCfg) -> Self {
        Self {
            timeout: ms(c.timeout_ms),
            batch_delay: ms(c.batch_delay_ms),
        }
    }
}

// ── EventMap ─────────────────────────────────────────────────────────────────

impl From<&changer_config::EventsCfg> for EventMap {
    fn from(c: &changer_config::EventsCfg) -> Self {
        Self {
            accepted: c.accepted,
            dispensed: c.dispensed,
            cashbox: c.cashbox,
            returned: c.returned,
        }
    }
}

// ── SetupCfg ─────────────────────────────────────────────────────────────────

/// Uses the inline fallback table; callers resolving `fallback_csv` replace
/// `fallback` afterwards.
impl From<&changer_config::SetupCfg> for SetupCfg {
    fn from(c: &changer_config::SetupCfg) -> Self {
        Self {
            use_fallback: c.use_fallback,
            require_stock: c.require_stock,
            reset_settle: ms(c.reset_settle_ms),
            fallback: c.fallback.clone(),
            ..Self::default()
        }
    }
}

// ── ChangerCfg ───────────────────────────────────────────────────────────────

impl From<&changer_config::Config> for ChangerCfg {
    fn from(c: &changer_config::Config) -> Self {
        Self {
            exchange_timeout: ms(c.serial.timeout_ms),
            tubes: TubeCfg::from(&c.tubes),
            poll: PollCfg::from(&c.poll),
            dispense: DispenseCfg::from(&c.dispense),
            setup: SetupCfg::from(&c.setup),
            events: EventMap::from(&c.events),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_line_up() {
        let file = changer_config::Config::default();
        let cfg = ChangerCfg::from(&file);
        assert_eq!(cfg, ChangerCfg::default());
        assert_eq!(cfg.poll.timeout, Duration::from_millis(600));
    }
}
