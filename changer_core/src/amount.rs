//! Amount request: collect a target sum from inserted coins.
//!
//! `Idle → Active → {Success, Cancelled}`; both terminal states report once
//! and then fall back to `Idle` with zeroed figures. Overpay on completion and
//! everything collected on cancellation are refunded best-effort through a
//! [`Refund`] implementation; a failed refund is logged, never blocking.

use serde::Serialize;

use crate::classify::{CoinEvent, EventKind};
use crate::error::{CoinOpError, Result};
use crate::events::AmountState;
use crate::planner::DispensePlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Active,
    Success,
    Cancelled,
}

/// Pays an amount back to the customer.
pub trait Refund {
    fn refund(&self, amount: u32) -> Result<DispensePlan>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AmountRequest {
    requested: u32,
    inserted: u32,
    status: RequestStatus,
}

impl AmountRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == RequestStatus::Active
    }

    pub fn remaining(&self) -> u32 {
        self.requested.saturating_sub(self.inserted)
    }

    pub fn state(&self) -> AmountState {
        AmountState {
            status: self.status,
            requested: self.requested,
            inserted: self.inserted,
            remaining: self.remaining(),
        }
    }

    pub fn start(&mut self, amount: u32) -> Result<AmountState> {
        if amount == 0 {
            return Err(CoinOpError::InvalidAmount(amount).into());
        }
        if self.is_active() {
            return Err(CoinOpError::RequestActive.into());
        }
        *self = Self {
            requested: amount,
            inserted: 0,
            status: RequestStatus::Active,
        };
        tracing::info!(requested = amount, "amount request started");
        Ok(self.state())
    }

    /// Feed a classified coin event. Returns the state to publish, or `None`
    /// when no request is active or the event does not touch the amount.
    pub fn on_event(&mut self, event: &CoinEvent, refund: &dyn Refund) -> Option<AmountState> {
        if !self.is_active() {
            return None;
        }
        match event.kind {
            EventKind::Accepted | EventKind::Cashbox => {
                self.inserted = self.inserted.saturating_add(event.value);
            }
            EventKind::Dispensed => {
                self.inserted = self.inserted.saturating_sub(event.value);
            }
            EventKind::Returned => return None,
        }
        Some(self.evaluate(refund))
    }

    fn evaluate(&mut self, refund: &dyn Refund) -> AmountState {
        if self.inserted < self.requested {
            return self.state();
        }
        let overpay = self.inserted - self.requested;
        if overpay > 0 {
            match refund.refund(overpay) {
                Ok(plan) => {
                    tracing::info!(overpay, coins = plan.coin_count(), "overpay refunded");
                    self.inserted -= overpay;
                }
                Err(e) => tracing::warn!(overpay, error = %e, "overpay refund failed"),
            }
        }
        self.status = RequestStatus::Success;
        let settled = self.state();
        tracing::info!(
            requested = settled.requested,
            inserted = settled.inserted,
            "amount request complete"
        );
        *self = Self::default();
        settled
    }

    /// Abort the request, refunding everything collected so far.
    pub fn cancel(&mut self, refund: &dyn Refund) -> AmountState {
        if !self.is_active() {
            *self = Self::default();
            return self.state();
        }
        let collected = self.inserted;
        if collected > 0 {
            match refund.refund(collected) {
                Ok(plan) => tracing::info!(collected, coins = plan.coin_count(), "collected amount refunded"),
                Err(e) => tracing::warn!(collected, error = %e, "cancellation refund failed"),
            }
        }
        *self = Self::default();
        tracing::info!(collected, "amount request cancelled");
        AmountState {
            status: RequestStatus::Cancelled,
            ..self.state()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin_map::CoinType;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<u32>>);

    impl Refund for Recorder {
        fn refund(&self, amount: u32) -> Result<DispensePlan> {
            self.0.borrow_mut().push(amount);
            Ok(DispensePlan::default())
        }
    }

    fn coin(value: u32) -> CoinEvent {
        CoinEvent {
            kind: EventKind::Accepted,
            coin_type: CoinType(1),
            value,
        }
    }

    #[test]
    fn events_outside_a_request_are_ignored() {
        let mut req = AmountRequest::new();
        assert!(req.on_event(&coin(10), &Recorder::default()).is_none());
    }

    #[test]
    fn returned_coins_do_not_count() {
        let mut req = AmountRequest::new();
        req.start(50).unwrap();
        let ev = CoinEvent {
            kind: EventKind::Returned,
            ..coin(10)
        };
        assert!(req.on_event(&ev, &Recorder::default()).is_none());
        assert_eq!(req.state().inserted, 0);
    }

    #[test]
    fn cancel_when_idle_reports_idle() {
        let mut req = AmountRequest::new();
        let r = Recorder::default();
        assert_eq!(req.cancel(&r).status, RequestStatus::Idle);
        assert!(r.0.borrow().is_empty());
    }
}
