//! State-change notifications and their fan-out to observers.
//!
//! Publishing never blocks: each subscriber owns a bounded channel, a full
//! channel drops the notification for that subscriber only, and a
//! disconnected subscriber is forgotten.

use crossbeam_channel as xch;
use serde::Serialize;
use std::sync::Mutex;

use crate::amount::RequestStatus;
use crate::coin_map::CoinType;
use crate::util::lock;

/// Per-subscriber backlog before notifications are dropped.
pub const SUBSCRIBER_BACKLOG: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinNoticeKind {
    Coin,
    Dispense,
    Cashbox,
    Returned,
}

/// A classified coin event after it has been applied to the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinNotice {
    pub event_type: CoinNoticeKind,
    pub coin_type: CoinType,
    pub value: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispensable: Option<u32>,
}

/// Snapshot of the amount request, serialized as `{"type":"amount_state",...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "amount_state")]
pub struct AmountState {
    pub status: RequestStatus,
    pub requested: u32,
    pub inserted: u32,
    pub remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    Coin(CoinNotice),
    Amount(AmountState),
}

impl Notification {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct Broadcaster {
    subscribers: Mutex<Vec<xch::Sender<Notification>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> xch::Receiver<Notification> {
        let (tx, rx) = xch::bounded(SUBSCRIBER_BACKLOG);
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn publish(&self, n: &Notification) {
        let mut subs = lock(&self.subscribers);
        subs.retain(|tx| match tx.try_send(n.clone()) {
            Ok(()) => true,
            Err(xch::TrySendError::Full(_)) => {
                tracing::debug!("subscriber backlog full, notification dropped");
                true
            }
            Err(xch::TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> Notification {
        Notification::Coin(CoinNotice {
            event_type: CoinNoticeKind::Coin,
            coin_type: CoinType(2),
            value: 10,
            new_count: Some(4),
            dispensable: Some(4),
        })
    }

    #[test]
    fn json_shapes() {
        assert_eq!(
            notice().to_json(),
            r#"{"eventType":"coin","coinType":2,"value":10,"newCount":4,"dispensable":4}"#
        );
        let cashbox = Notification::Coin(CoinNotice {
            event_type: CoinNoticeKind::Cashbox,
            coin_type: CoinType(1),
            value: 5,
            new_count: None,
            dispensable: None,
        });
        assert_eq!(
            cashbox.to_json(),
            r#"{"eventType":"cashbox","coinType":1,"value":5}"#
        );
        let state = Notification::Amount(AmountState {
            status: RequestStatus::Active,
            requested: 100,
            inserted: 30,
            remaining: 70,
        });
        assert_eq!(
            state.to_json(),
            r#"{"type":"amount_state","status":"active","requested":100,"inserted":30,"remaining":70}"#
        );
    }

    #[test]
    fn dead_subscribers_are_pruned_and_full_ones_skipped() {
        let b = Broadcaster::new();
        let live = b.subscribe();
        let dead = b.subscribe();
        drop(dead);
        for _ in 0..SUBSCRIBER_BACKLOG + 10 {
            b.publish(&notice());
        }
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(live.try_iter().count(), SUBSCRIBER_BACKLOG);
    }
}
