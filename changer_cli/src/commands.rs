//! Command execution: transport selection, engine assembly and the
//! subcommands themselves.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use changer_config::Config;
use changer_core::{
    ChangerCfg, CoinChanger, CoinType, DispensePlan, Notification, Poller, RequestStatus,
};
use changer_hardware::{SimHandle, SimulatedChanger};
use changer_traits::Transport;
use crossbeam_channel::RecvTimeoutError;
use eyre::{Result, WrapErr};

/// Comma-separated tube counts for the simulator, index 0 = coin type 1.
pub const SIM_TUBES_ENV: &str = "CHANGER_SIM_TUBES";
/// Comma-separated coin types the simulator inserts once polling starts.
pub const SIM_COINS_ENV: &str = "CHANGER_SIM_COINS";

const DEFAULT_SIM_TUBES: [u8; 5] = [20, 20, 20, 10, 5];
const EVENT_WAIT: Duration = Duration::from_millis(100);

/// An initialized engine plus the simulator handle when no serial port is used.
pub struct Session {
    pub changer: CoinChanger,
    pub sim: Option<SimHandle>,
}

fn parse_list(var: &str) -> Result<Vec<u8>> {
    let Ok(text) = std::env::var(var) else {
        return Ok(Vec::new());
    };
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u8>()
                .wrap_err_with(|| format!("{var}: '{s}' is not a number in 0..=255"))
        })
        .collect()
}

fn simulator() -> Result<(Box<dyn Transport + Send>, SimHandle)> {
    let mut tubes = parse_list(SIM_TUBES_ENV)?;
    if tubes.is_empty() {
        tubes = DEFAULT_SIM_TUBES.to_vec();
    }
    let sim = SimulatedChanger::with_tubes(&tubes);
    let handle = sim.handle();
    tracing::info!(?tubes, "using simulated changer");
    Ok((Box::new(sim), handle))
}

#[cfg(feature = "hardware")]
fn open_transport(cfg: &Config) -> Result<(Box<dyn Transport + Send>, Option<SimHandle>)> {
    match &cfg.serial.port {
        Some(port) => {
            let link = changer_hardware::SerialLineTransport::open(
                port,
                cfg.serial.baud,
                Duration::from_millis(cfg.serial.timeout_ms),
            )
            .wrap_err_with(|| format!("open serial port {port}"))?;
            tracing::info!(port = %port, baud = cfg.serial.baud, "serial link open");
            Ok((Box::new(link), None))
        }
        None => {
            let (link, handle) = simulator()?;
            Ok((link, Some(handle)))
        }
    }
}

#[cfg(not(feature = "hardware"))]
fn open_transport(cfg: &Config) -> Result<(Box<dyn Transport + Send>, Option<SimHandle>)> {
    if let Some(port) = &cfg.serial.port {
        tracing::warn!(port = %port, "built without the hardware feature; ignoring serial.port");
    }
    let (link, handle) = simulator()?;
    Ok((link, Some(handle)))
}

/// Map the file config, open the link and run the initialization sequence.
pub fn open_session(cfg: &Config, base_dir: &Path) -> Result<Session> {
    let mut core_cfg = ChangerCfg::from(cfg);
    core_cfg.setup.fallback = cfg
        .fallback_denominations(base_dir)
        .wrap_err("load fallback denominations")?;

    let (link, sim) = open_transport(cfg)?;
    let changer = CoinChanger::new(link, core_cfg);
    let report = changer.initialize()?;
    tracing::info!(
        denominations = report.denominations,
        tubes = report.tubes,
        used_fallback = report.used_fallback,
        "changer ready"
    );
    Ok(Session { changer, sim })
}

fn emit(n: &Notification, json: bool) {
    if json {
        println!("{}", n.to_json());
        return;
    }
    match n {
        Notification::Coin(c) => match c.new_count {
            Some(count) => println!(
                "{:?} coin {} (value {}), tube now {count}",
                c.event_type, c.coin_type, c.value
            ),
            None => println!("{:?} coin {} (value {})", c.event_type, c.coin_type, c.value),
        },
        Notification::Amount(s) => println!(
            "amount {:?}: requested {}, inserted {}, remaining {}",
            s.status, s.requested, s.inserted, s.remaining
        ),
    }
}

fn is_terminal(status: RequestStatus) -> bool {
    matches!(status, RequestStatus::Success | RequestStatus::Cancelled)
}

/// Poll until Ctrl-C, or until the amount request (if any) completes or is
/// cancelled.
pub fn run(
    session: &Session,
    amount: Option<u32>,
    idle_timeout_ms: Option<u64>,
    json: bool,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let changer = &session.changer;
    let rx = changer.subscribe();
    if let Some(amount) = amount {
        changer.start_amount_request(amount)?;
    }
    let idle_limit = idle_timeout_ms.map(Duration::from_millis);

    let poller = Poller::spawn(changer.clone());
    if let Some(sim) = &session.sim {
        for coin in parse_list(SIM_COINS_ENV)? {
            sim.insert_coin(coin);
        }
    }

    let mut last_activity = Instant::now();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("interrupted");
            if changer.amount_state().status == RequestStatus::Active {
                emit(&Notification::Amount(changer.cancel_amount_request()), json);
            }
            break;
        }
        if poller.is_finished() {
            break;
        }
        match rx.recv_timeout(EVENT_WAIT) {
            Ok(n) => {
                last_activity = Instant::now();
                emit(&n, json);
                if let Notification::Amount(s) = n
                    && amount.is_some()
                    && is_terminal(s.status)
                {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(limit) = idle_limit
                    && last_activity.elapsed() >= limit
                    && changer.amount_state().status == RequestStatus::Active
                {
                    tracing::info!(?limit, "amount request idle, cancelling");
                    // the cancelled state arrives on the next receive
                    changer.cancel_amount_request();
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    poller.shutdown()?;
    Ok(())
}

pub fn tubes(session: &Session, json: bool) -> Result<()> {
    session.changer.refresh_tubes()?;
    let summary = session.changer.tube_summary();
    if json {
        println!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }
    println!("type  value  count/cap  dispensable  status");
    for t in &summary {
        println!(
            "{:>4}  {:>5}  {:>5}/{:<3}  {:>11}  {:?} ({}%)",
            t.coin_type.0, t.value, t.count, t.capacity, t.dispensable, t.status, t.fullness_percent
        );
    }
    Ok(())
}

pub fn dispense(session: &Session, coin_type: u8, quantity: u32, json: bool) -> Result<()> {
    let report = session.changer.dispense(CoinType(coin_type), quantity)?;
    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        println!(
            "dispensed {} x coin {} in {} command(s); tube now {} ({} dispensable)",
            report.quantity, report.coin_type, report.batches, report.count, report.dispensable
        );
    }
    Ok(())
}

fn print_plan(verb: &str, amount: u32, plan: &DispensePlan, json: bool) -> Result<()> {
    if json {
        let line = serde_json::json!({
            "amount": amount,
            "total": plan.total(),
            "coins": plan.coin_count(),
            "entries": plan,
        });
        println!("{line}");
        return Ok(());
    }
    if plan.is_empty() {
        println!("nothing to {verb} for {amount}");
        return Ok(());
    }
    println!("{verb} {amount}:");
    for e in plan.entries() {
        println!("  {} x coin {} (value {})", e.quantity, e.coin_type, e.value);
    }
    Ok(())
}

pub fn refund(session: &Session, amount: u32, json: bool) -> Result<()> {
    let plan = session.changer.refund(amount)?;
    print_plan("refund", amount, &plan, json)
}

pub fn plan(session: &Session, amount: u32, json: bool) -> Result<()> {
    let plan = session.changer.plan_refund(amount)?;
    print_plan("plan", amount, &plan, json)
}

pub fn self_check(session: &Session, json: bool) -> Result<()> {
    let changer = &session.changer;
    changer.refresh_tubes()?;
    let coins = changer.coin_map();
    let dispensable = changer.dispensable_value();
    if json {
        let line = serde_json::json!({
            "ok": true,
            "denominations": coins.len(),
            "tubes": changer.tubes().len(),
            "dispensable_value": dispensable,
            "backend": if session.sim.is_some() { "sim" } else { "serial" },
        });
        println!("{line}");
    } else {
        println!(
            "OK: {} denominations, {} tubes, {dispensable} dispensable",
            coins.len(),
            changer.tubes().len()
        );
    }
    Ok(())
}
