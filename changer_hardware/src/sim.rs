//! In-memory MDB bridge that answers the same line protocol as the real one.
//!
//! `SimulatedChanger` is the transport handed to the engine; `SimHandle` is the
//! test/demo side used to script coin activity and link faults after the
//! transport has been moved into the engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use changer_traits::Transport;
use tracing::trace;

use crate::error::HwError;

const FRAME: &str = "p,";
const NUM_TYPES: usize = 16;

/// Setup reply of a level-3 changer: country 0x1978, scaling 5, two decimals,
/// coin types 1..=5 worth 5, 10, 20, 50 and 100 units, all routable to tubes.
pub const DEFAULT_SETUP: [u8; 23] = [
    0x03, 0x19, 0x78, 0x05, 0x02, 0x00, 0x1F, 0x01, 0x02, 0x04, 0x0A, 0x14, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Level-3 identification reply (manufacturer, serial, model, version, features).
const IDENTIFICATION: &str = "53494D3030303030303030303031534D2D4348414E474552310100000000";

#[derive(Debug)]
struct SimState {
    setup: Vec<u8>,
    setup_override: Option<String>,
    tube_status_override: Option<String>,
    tubes: [u8; NUM_TYPES],
    capacity: u8,
    poll_queue: VecDeque<String>,
    pending: VecDeque<String>,
    commands: Vec<String>,
    coin_input_enabled: bool,
    offline: bool,
    silent: bool,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            setup: DEFAULT_SETUP.to_vec(),
            setup_override: None,
            tube_status_override: None,
            tubes: [0; NUM_TYPES],
            capacity: 50,
            poll_queue: VecDeque::new(),
            pending: VecDeque::new(),
            commands: Vec::new(),
            coin_input_enabled: false,
            offline: false,
            silent: false,
        }
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn raw_type(coin_type: u8) -> Option<usize> {
    let raw = usize::from(coin_type.checked_sub(1)?);
    (raw < NUM_TYPES).then_some(raw)
}

impl SimState {
    fn respond(&mut self, line: &str) -> String {
        let ack = format!("{FRAME}ACK");
        let nack = format!("{FRAME}NACK");
        match line {
            "M,1" | "R,08" | "R,0F,0100000000" => ack,
            "R,09" => self
                .setup_override
                .clone()
                .unwrap_or_else(|| format!("{FRAME}{}", hex::encode_upper(&self.setup))),
            "R,0F,00" => format!("{FRAME}{IDENTIFICATION}"),
            "R,0A" => self.tube_status_override.clone().unwrap_or_else(|| {
                let mut full: u16 = 0;
                for (i, count) in self.tubes.iter().enumerate() {
                    if *count >= self.capacity {
                        full |= 1 << i;
                    }
                }
                let mut payload = full.to_be_bytes().to_vec();
                payload.extend_from_slice(&self.tubes);
                format!("{FRAME}{}", hex::encode_upper(&payload))
            }),
            "R,0B" => match self.poll_queue.pop_front() {
                Some(payload) => format!("{FRAME}{payload}"),
                None => ack,
            },
            _ => {
                if let Some(mask) = line.strip_prefix("R,0C,") {
                    self.coin_input_enabled = !mask.trim_start_matches('0').is_empty();
                    return ack;
                }
                if let Some(arg) = line.strip_prefix("R,0D,") {
                    return match u8::from_str_radix(arg, 16) {
                        Ok(b) => {
                            let raw = usize::from(b & 0x0F);
                            let qty = b >> 4;
                            if qty > 0 && self.tubes[raw] >= qty {
                                self.tubes[raw] -= qty;
                                ack
                            } else {
                                nack
                            }
                        }
                        Err(_) => nack,
                    };
                }
                nack
            }
        }
    }
}

/// Simulated bridge transport. Cheap to create; share state through `handle()`.
#[derive(Debug, Default)]
pub struct SimulatedChanger {
    state: Arc<Mutex<SimState>>,
}

/// Scripting side of a `SimulatedChanger`.
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedChanger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulator preloaded with the given per-type tube counts (index 0 = coin type 1).
    pub fn with_tubes(counts: &[u8]) -> Self {
        let sim = Self::new();
        {
            let mut st = lock(&sim.state);
            for (slot, count) in st.tubes.iter_mut().zip(counts) {
                *slot = *count;
            }
        }
        sim
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: self.state.clone(),
        }
    }
}

impl Transport for SimulatedChanger {
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = lock(&self.state);
        if st.offline {
            return Err(Box::new(HwError::Disconnected));
        }
        st.commands.push(line.to_string());
        let reply = st.respond(line.trim());
        trace!(cmd = line, reply = %reply, "sim exchange");
        st.pending.push_back(reply);
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> String {
        let mut st = lock(&self.state);
        let reply = st.pending.pop_front();
        if st.silent || st.offline {
            return String::new();
        }
        reply.unwrap_or_default()
    }
}

impl SimHandle {
    fn queue_event(&self, high_nibble: u8, coin_type: u8, update: impl FnOnce(&mut u8, u8)) {
        let mut st = lock(&self.state);
        let Some(raw) = raw_type(coin_type) else {
            return;
        };
        let capacity = st.capacity;
        update(&mut st.tubes[raw], capacity);
        let first = (high_nibble << 4) | raw as u8;
        let remaining = st.tubes[raw];
        st.poll_queue.push_back(hex::encode_upper([first, remaining]));
    }

    /// Coin accepted and routed to its tube.
    pub fn insert_coin(&self, coin_type: u8) {
        self.queue_event(0x5, coin_type, |count, cap| *count = count.saturating_add(1).min(cap));
    }

    /// Coin accepted and routed to the cash box (tube untouched).
    pub fn insert_to_cashbox(&self, coin_type: u8) {
        self.queue_event(0x4, coin_type, |_, _| {});
    }

    /// Coin handed back to the customer.
    pub fn return_coin(&self, coin_type: u8) {
        self.queue_event(0x7, coin_type, |_, _| {});
    }

    /// Coin paid out with the mechanism's manual dispense button.
    pub fn manual_dispense(&self, coin_type: u8) {
        self.queue_event(0x9, coin_type, |count, _| *count = count.saturating_sub(1));
    }

    /// Queue a raw poll payload (hex text after the frame marker).
    pub fn queue_poll_payload(&self, payload: &str) {
        lock(&self.state).poll_queue.push_back(payload.to_string());
    }

    pub fn set_tube_count(&self, coin_type: u8, count: u8) {
        if let Some(raw) = raw_type(coin_type) {
            lock(&self.state).tubes[raw] = count;
        }
    }

    pub fn tube_count(&self, coin_type: u8) -> Option<u8> {
        raw_type(coin_type).map(|raw| lock(&self.state).tubes[raw])
    }

    pub fn set_setup_payload(&self, bytes: &[u8]) {
        let mut st = lock(&self.state);
        st.setup = bytes.to_vec();
        st.setup_override = None;
    }

    /// Replace the whole setup reply line (e.g. with garbage or an empty line).
    pub fn set_setup_response(&self, line: &str) {
        lock(&self.state).setup_override = Some(line.to_string());
    }

    /// Replace the whole tube-status reply line; `None` restores live counts.
    pub fn set_tube_status_response(&self, line: Option<&str>) {
        lock(&self.state).tube_status_override = line.map(str::to_string);
    }

    /// Writes fail with `HwError::Disconnected` while offline.
    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    /// Reads return nothing (timeout) while silent.
    pub fn set_silent(&self, silent: bool) {
        lock(&self.state).silent = silent;
    }

    pub fn coin_input_enabled(&self) -> bool {
        lock(&self.state).coin_input_enabled
    }

    /// Every command line received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.state).commands.clone()
    }

    pub fn pending_poll_events(&self) -> usize {
        lock(&self.state).poll_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_reply_is_framed_hex() {
        let mut sim = SimulatedChanger::new();
        let reply = sim.exchange("R,09", Duration::from_millis(10)).unwrap();
        assert!(reply.starts_with("p,0319780502"));
        assert_eq!(reply.len(), 2 + DEFAULT_SETUP.len() * 2);
    }

    #[test]
    fn dispense_decrements_tube_and_naks_when_short() {
        let mut sim = SimulatedChanger::with_tubes(&[3]);
        let h = sim.handle();
        // qty 2, raw type 0
        assert_eq!(sim.exchange("R,0D,20", Duration::ZERO).unwrap(), "p,ACK");
        assert_eq!(h.tube_count(1), Some(1));
        assert_eq!(sim.exchange("R,0D,20", Duration::ZERO).unwrap(), "p,NACK");
        assert_eq!(h.tube_count(1), Some(1));
    }

    #[test]
    fn offline_writes_fail() {
        let mut sim = SimulatedChanger::new();
        sim.handle().set_offline(true);
        assert!(sim.write_line("R,0B").is_err());
    }
}
