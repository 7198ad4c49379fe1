//! The coin changer engine.
//!
//! `CoinChanger` is a cheap handle (`Clone`) over one device shared by the
//! poll thread and foreground callers. Every read-modify-write of the tube
//! inventory happens under its mutex, every line exchange under the link
//! mutex, and dispensing sequences are serialized by a gate.
//!
//! Lock order: request → gate → link → tubes. `coins` and `last_event` are
//! leaves, held only to copy in or out.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use changer_traits::Transport;
use changer_traits::clock::{Clock, MonotonicClock};
use crossbeam_channel as xch;
use tracing::{debug, info, trace, warn};

use crate::amount::{AmountRequest, Refund};
use crate::classify::{CoinEvent, EventKind, classify};
use crate::coin_map::CoinMap;
use crate::config::ChangerCfg;
use crate::error::{ChangerError, Result};
use crate::events::{AmountState, Broadcaster, CoinNotice, CoinNoticeKind, Notification};
use crate::hw_error::map_hw_error;
use crate::planner::{Available, DispensePlan};
use crate::protocol::{self, decode_hex_payload, frame_payload};
use crate::tubes::{TubeInventory, TubeState, TubeSummary};
use crate::util::lock;

/// What `initialize` negotiated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub denominations: usize,
    /// The setup reply was unusable and the fallback table was substituted.
    pub used_fallback: bool,
    /// Raw identification payload of the expansion request, if any.
    pub identification: Option<String>,
    pub tubes: usize,
}

/// Result of one poll exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing came back before the timeout.
    Idle,
    /// A reply without an actionable coin event.
    NoEvent,
    Event(CoinEvent),
}

pub(crate) struct Shared {
    pub(crate) cfg: ChangerCfg,
    pub(crate) link: Mutex<Box<dyn Transport + Send>>,
    pub(crate) coins: Mutex<CoinMap>,
    pub(crate) tubes: Mutex<TubeInventory>,
    pub(crate) request: Mutex<AmountRequest>,
    pub(crate) gate: Mutex<()>,
    pub(crate) last_event: Mutex<Option<String>>,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
}

#[derive(Clone)]
pub struct CoinChanger {
    pub(crate) shared: Arc<Shared>,
}

impl std::fmt::Debug for CoinChanger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinChanger")
            .field("coins", &self.coin_map().len())
            .field("tubes", &lock(&self.shared.tubes).len())
            .finish_non_exhaustive()
    }
}

impl CoinChanger {
    pub fn new<T: Transport + Send + 'static>(transport: T, cfg: ChangerCfg) -> Self {
        Self::with_clock(transport, cfg, Arc::new(MonotonicClock::new()))
    }

    /// Engine whose settle and batch delays go through `clock`.
    pub fn with_clock<T: Transport + Send + 'static>(
        transport: T,
        cfg: ChangerCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let tubes = TubeInventory::new(cfg.tubes.capacity, cfg.tubes.security_stock);
        Self {
            shared: Arc::new(Shared {
                link: Mutex::new(Box::new(transport)),
                coins: Mutex::new(CoinMap::default()),
                tubes: Mutex::new(tubes),
                request: Mutex::new(AmountRequest::new()),
                gate: Mutex::new(()),
                last_event: Mutex::new(None),
                broadcaster: Broadcaster::new(),
                clock,
                cfg,
            }),
        }
    }

    pub fn config(&self) -> &ChangerCfg {
        &self.shared.cfg
    }

    /// One request/response exchange on the link.
    pub(crate) fn exchange(&self, cmd: &str, timeout: Duration) -> Result<String> {
        let reply = lock(&self.shared.link)
            .exchange(cmd, timeout)
            .map_err(|e| map_hw_error(&*e))?;
        trace!(cmd, reply = %reply, "exchange");
        Ok(reply)
    }

    /// Bring the device up: handshake, reset, setup, expansion, tube levels,
    /// then enable coin input.
    ///
    /// An unusable setup reply falls back to the configured denomination table
    /// when `setup.use_fallback` is set. Tube status failures are fatal here.
    pub fn initialize(&self) -> Result<InitReport> {
        let cfg = &self.shared.cfg;
        let _gate = lock(&self.shared.gate);

        let reply = self.exchange(protocol::ENABLE_MASTER, cfg.setup.handshake_timeout)?;
        debug!(reply = %reply, "enable master");
        {
            let mut link = lock(&self.shared.link);
            link.write_line(protocol::RESET)
                .map_err(|e| map_hw_error(&*e))?;
            self.shared.clock.sleep(cfg.setup.reset_settle);
            let reply = link.read_line(cfg.setup.handshake_timeout);
            debug!(reply = %reply, "reset coin acceptor");
        }

        let setup_line = self.exchange(protocol::SETUP, cfg.exchange_timeout)?;
        let (coins, used_fallback) = match parse_setup(&setup_line) {
            Ok(map) => (map, false),
            Err(e) if cfg.setup.use_fallback && !cfg.setup.fallback.is_empty() => {
                warn!(error = %e, "setup reply unusable, using fallback denominations");
                (CoinMap::from_table(&cfg.setup.fallback), true)
            }
            Err(e) => return Err(e),
        };
        for (coin_type, value) in coins.iter() {
            debug!(coin_type = coin_type.0, value, "denomination");
        }

        let ident = self.exchange(protocol::EXPANSION, cfg.exchange_timeout)?;
        let identification = frame_payload(&ident).map(str::to_string);
        debug!(identification = ?identification, "expansion identification");
        let reply = self.exchange(protocol::FEATURE_ENABLE, cfg.exchange_timeout)?;
        debug!(reply = %reply, "expansion feature enable");

        *lock(&self.shared.coins) = coins.clone();
        *lock(&self.shared.tubes) =
            TubeInventory::from_coin_map(&coins, cfg.tubes.capacity, cfg.tubes.security_stock);
        self.refresh_tubes_locked()?;

        let tubes = {
            let inv = lock(&self.shared.tubes);
            if cfg.setup.require_stock && inv.iter().all(|t| t.count == 0) {
                return Err(ChangerError::tube_refresh(
                    "every tube reads empty",
                    String::new(),
                ));
            }
            inv.len()
        };

        self.set_coin_input(true)?;
        info!(
            denominations = coins.len(),
            tubes,
            used_fallback,
            "coin changer initialized"
        );
        Ok(InitReport {
            denominations: coins.len(),
            used_fallback,
            identification,
            tubes,
        })
    }

    /// Enable (coin-type-enable) or inhibit coin acceptance.
    pub fn set_coin_input(&self, enabled: bool) -> Result<()> {
        let cmd = if enabled {
            protocol::COIN_TYPE_ENABLE
        } else {
            protocol::INHIBIT
        };
        let reply = self.exchange(cmd, self.shared.cfg.exchange_timeout)?;
        if protocol::is_nack(&reply) {
            warn!(enabled, "coin input change not acknowledged");
        } else {
            info!(enabled, "coin input");
        }
        Ok(())
    }

    /// Resync tube levels from the hardware.
    pub fn refresh_tubes(&self) -> Result<()> {
        let _gate = lock(&self.shared.gate);
        self.refresh_tubes_locked()
    }

    pub(crate) fn refresh_tubes_locked(&self) -> Result<()> {
        let line = self.exchange(protocol::TUBE_STATUS, self.shared.cfg.exchange_timeout)?;
        let Some(payload) = frame_payload(&line) else {
            return Err(ChangerError::tube_refresh("no tube status payload in reply", line));
        };
        let bytes = decode_hex_payload(payload);
        let coins = self.coin_map();
        lock(&self.shared.tubes).resync_from_hardware(&bytes, &coins)
    }

    /// Resync before a dispense; failures keep the last known levels.
    pub(crate) fn resync_best_effort(&self) {
        if let Err(e) = self.refresh_tubes_locked() {
            warn!(error = %e, "tube resync failed, using last known levels");
        }
    }

    /// Send one poll, classify the reply and apply it.
    pub fn poll_once(&self) -> Result<PollOutcome> {
        let line = self.exchange(protocol::POLL, self.shared.cfg.poll.timeout)?;
        if line.is_empty() {
            return Ok(PollOutcome::Idle);
        }
        let Some(payload) = frame_payload(&line) else {
            return Ok(PollOutcome::NoEvent);
        };
        let bytes = decode_hex_payload(payload);
        if bytes.is_empty() {
            return Err(ChangerError::transport(format!(
                "unparsable poll reply {line:?}"
            )));
        }
        let coins = self.coin_map();
        match classify(&bytes, &coins, &self.shared.cfg.events) {
            Some(ev) => {
                self.handle_event(&ev);
                Ok(PollOutcome::Event(ev))
            }
            None => {
                debug!(raw = %payload, "poll reply without coin event");
                Ok(PollOutcome::NoEvent)
            }
        }
    }

    /// Apply a classified event to the inventory, publish it, and feed the
    /// amount request.
    pub fn handle_event(&self, ev: &CoinEvent) {
        let notice = {
            let mut tubes = lock(&self.shared.tubes);
            let (event_type, tube) = match ev.kind {
                EventKind::Accepted => (
                    CoinNoticeKind::Coin,
                    Some(tubes.apply_accepted(ev.coin_type, ev.value)),
                ),
                EventKind::Dispensed => (CoinNoticeKind::Dispense, tubes.apply_dispensed(ev.coin_type)),
                EventKind::Cashbox => (CoinNoticeKind::Cashbox, None),
                EventKind::Returned => (CoinNoticeKind::Returned, None),
            };
            CoinNotice {
                event_type,
                coin_type: ev.coin_type,
                value: ev.value,
                new_count: tube.map(|t| t.count),
                dispensable: tube.map(|t| t.dispensable),
            }
        };
        info!(
            kind = %ev.kind,
            coin_type = ev.coin_type.0,
            value = ev.value,
            new_count = ?notice.new_count,
            "coin event"
        );
        *lock(&self.shared.last_event) = Some(ev.describe());
        self.shared.broadcaster.publish(&Notification::Coin(notice));

        let state = lock(&self.shared.request).on_event(ev, self);
        if let Some(state) = state {
            self.publish_amount(state);
        }
    }

    fn publish_amount(&self, state: AmountState) {
        self.shared.broadcaster.publish(&Notification::Amount(state));
    }

    pub fn start_amount_request(&self, amount: u32) -> Result<AmountState> {
        let state = lock(&self.shared.request).start(amount)?;
        self.publish_amount(state);
        Ok(state)
    }

    /// Cancel the active request, refunding what was collected (best-effort).
    pub fn cancel_amount_request(&self) -> AmountState {
        let state = lock(&self.shared.request).cancel(self);
        self.publish_amount(state);
        state
    }

    pub fn amount_state(&self) -> AmountState {
        lock(&self.shared.request).state()
    }

    pub fn subscribe(&self) -> xch::Receiver<Notification> {
        self.shared.broadcaster.subscribe()
    }

    pub fn coin_map(&self) -> CoinMap {
        lock(&self.shared.coins).clone()
    }

    pub fn tubes(&self) -> Vec<TubeState> {
        lock(&self.shared.tubes).iter().cloned().collect()
    }

    pub fn tube_summary(&self) -> Vec<TubeSummary> {
        lock(&self.shared.tubes).summary()
    }

    /// Total value that can be paid out without touching security stock.
    pub fn dispensable_value(&self) -> u64 {
        lock(&self.shared.tubes).dispensable_value()
    }

    /// Administrative reset: every tube count goes to zero.
    pub fn reset_tubes(&self) {
        let _gate = lock(&self.shared.gate);
        lock(&self.shared.tubes).reset_all();
        info!("tube counts reset");
    }

    /// Description of the most recent coin event, e.g. `Accepted coin 2 (10)`.
    pub fn last_event(&self) -> Option<String> {
        lock(&self.shared.last_event).clone()
    }

    pub(crate) fn available(&self) -> Vec<Available> {
        lock(&self.shared.tubes).iter().map(Available::from).collect()
    }
}

impl Refund for CoinChanger {
    fn refund(&self, amount: u32) -> Result<DispensePlan> {
        CoinChanger::refund(self, amount)
    }
}

fn parse_setup(line: &str) -> Result<CoinMap> {
    let Some(payload) = frame_payload(line) else {
        return Err(ChangerError::setup_parse("no setup payload in reply", line));
    };
    CoinMap::from_setup(&decode_hex_payload(payload))
}
