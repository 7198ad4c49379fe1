#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! MDB coin changer engine (transport-agnostic).
//!
//! All device traffic goes through `changer_traits::Transport`, a half-duplex
//! line exchange with an ASCII-hex bridge.
//!
//! ## Architecture
//!
//! - **Codec**: command vocabulary, dispense byte packing, hex payloads (`protocol`)
//! - **Coin map**: coin type → value from the setup reply or a fallback table (`coin_map`)
//! - **Inventory**: per-tube counts with capacity and security stock (`tubes`)
//! - **Classifier**: poll payload → coin event under a configurable nibble map (`classify`)
//! - **Poll loop**: background thread with failure escalation (`poll`)
//! - **Dispense / refund**: batched payouts and exact-change planning (`dispense`, `planner`)
//! - **Amount request**: collect a target sum, refund overpay or everything on cancel (`amount`)
//! - **Notifications**: non-blocking fan-out to observers (`events`)
//!
//! Amounts are integers in the smallest currency unit.

pub mod amount;
pub mod cancel;
pub mod classify;
pub mod coin_map;
pub mod config;
pub mod conversions;
pub mod device;
pub mod dispense;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod mocks;
pub mod planner;
pub mod poll;
pub mod protocol;
pub mod status;
pub mod tubes;
pub mod util;

pub use amount::{AmountRequest, Refund, RequestStatus};
pub use cancel::{CancelSource, CancelToken};
pub use classify::{CoinEvent, EventKind, EventMap, classify};
pub use coin_map::{CoinMap, CoinType};
pub use config::ChangerCfg;
pub use device::{CoinChanger, InitReport, PollOutcome};
pub use dispense::DispenseReport;
pub use error::{ChangerError, CoinOpError, ErrorKind, Result};
pub use events::{AmountState, Broadcaster, CoinNotice, CoinNoticeKind, Notification};
pub use planner::{Available, DispensePlan, PlanEntry};
pub use poll::{Poller, run_poll_loop};
pub use status::PollState;
pub use tubes::{TubeInventory, TubeState, TubeStatus, TubeSummary};
