//! Dispense executor and refund execution.
//!
//! Inventory policy: a dispense command that was written successfully
//! decrements the tube right away by the batch size. Dispensed events seen by
//! the poll loop are payouts made at the mechanism itself and are counted
//! there, so the two paths never see the same coin.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::coin_map::CoinType;
use crate::device::CoinChanger;
use crate::error::{CoinOpError, Result};
use crate::planner::{self, DispensePlan};
use crate::protocol::{self, MAX_BATCH};
use crate::util::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispenseReport {
    pub coin_type: CoinType,
    pub quantity: u32,
    /// Commands sent (quantities above 15 are split).
    pub batches: u32,
    /// Tube count after the dispense.
    pub count: u32,
    pub dispensable: u32,
}

impl CoinChanger {
    /// Dispense `quantity` coins of one type.
    ///
    /// Resyncs levels first (best-effort), validates the full quantity against
    /// what is dispensable, then sends commands of at most 15 coins separated
    /// by the configured batch delay.
    pub fn dispense(&self, coin_type: CoinType, quantity: u32) -> Result<DispenseReport> {
        let _gate = lock(&self.shared.gate);
        self.dispense_locked(coin_type, quantity)
    }

    pub(crate) fn dispense_locked(&self, coin_type: CoinType, quantity: u32) -> Result<DispenseReport> {
        self.resync_best_effort();
        self.check_dispense(coin_type, quantity)?;
        let raw = coin_type.raw()?;
        let cfg = self.shared.cfg.dispense;

        let mut left = quantity;
        let mut batches = 0u32;
        while left > 0 {
            if batches > 0 {
                self.shared.clock.sleep(cfg.batch_delay);
            }
            let batch = left.min(MAX_BATCH);
            let nibble = u8::try_from(batch).map_err(|_| CoinOpError::InvalidQuantity(batch))?;
            let cmd = protocol::encode_dispense(raw, nibble)?;
            let reply = self.exchange(&cmd, cfg.timeout)?;
            if protocol::is_nack(&reply) {
                warn!(coin_type = coin_type.0, quantity = batch, "dispense not acknowledged");
            } else {
                debug!(cmd = %cmd, reply = %reply, "dispense acknowledged");
            }
            lock(&self.shared.tubes).remove_coins(coin_type, batch);
            left -= batch;
            batches += 1;
        }

        let (count, dispensable) = lock(&self.shared.tubes)
            .get(coin_type)
            .map_or((0, 0), |t| (t.count, t.dispensable));
        info!(coin_type = coin_type.0, quantity, batches, count, "dispensed");
        Ok(DispenseReport {
            coin_type,
            quantity,
            batches,
            count,
            dispensable,
        })
    }

    fn check_dispense(&self, coin_type: CoinType, quantity: u32) -> Result<()> {
        let tubes = lock(&self.shared.tubes);
        let Some(tube) = tubes.get(coin_type) else {
            return Err(CoinOpError::UnknownCoinType(coin_type.0).into());
        };
        if quantity == 0 {
            return Err(CoinOpError::InvalidQuantity(quantity).into());
        }
        if quantity > tube.dispensable {
            return Err(CoinOpError::Insufficient {
                coin_type: coin_type.0,
                requested: quantity,
                dispensable: tube.dispensable,
                count: tube.count,
            }
            .into());
        }
        coin_type.raw().map(|_| ())
    }

    /// The plan `refund(amount)` would execute now, without touching the device.
    pub fn plan_refund(&self, amount: u32) -> Result<DispensePlan> {
        Ok(planner::plan(amount, &self.available())?)
    }

    /// Pay out exactly `amount`. Zero is a no-op.
    pub fn refund(&self, amount: u32) -> Result<DispensePlan> {
        if amount == 0 {
            return Ok(DispensePlan::default());
        }
        let _gate = lock(&self.shared.gate);
        self.resync_best_effort();
        let plan = planner::plan(amount, &self.available())?;
        info!(amount, coins = plan.coin_count(), "refund planned");
        for (i, entry) in plan.entries().iter().enumerate() {
            if i > 0 {
                self.shared.clock.sleep(self.shared.cfg.dispense.batch_delay);
            }
            self.dispense_locked(entry.coin_type, entry.quantity)?;
        }
        Ok(plan)
    }
}
