//! End-to-end against the simulated bridge.

use std::sync::Arc;
use std::time::Duration;

use changer_core::{
    ChangerCfg, CoinChanger, CoinType, ErrorKind, Notification, Poller, RequestStatus, TubeStatus,
};
use changer_hardware::SimulatedChanger;
use changer_traits::clock::test_clock::TestClock;

fn cfg() -> ChangerCfg {
    let mut cfg = ChangerCfg::default();
    cfg.poll.timeout = Duration::from_millis(10);
    cfg.poll.interval = Duration::from_millis(5);
    cfg.poll.idle = Duration::from_millis(5);
    cfg.poll.error_backoff = Duration::from_millis(5);
    cfg
}

fn changer(sim: SimulatedChanger, cfg: ChangerCfg) -> CoinChanger {
    CoinChanger::with_clock(sim, cfg, Arc::new(TestClock::new()))
}

#[test]
fn initialization_sequence_and_report() {
    let sim = SimulatedChanger::with_tubes(&[10, 5, 0, 50, 1]);
    let h = sim.handle();
    let c = changer(sim, cfg());
    let report = c.initialize().unwrap();
    assert_eq!(report.denominations, 5);
    assert!(!report.used_fallback);
    assert!(report.identification.is_some());
    assert_eq!(
        h.commands(),
        vec![
            "M,1",
            "R,08",
            "R,09",
            "R,0F,00",
            "R,0F,0100000000",
            "R,0A",
            "R,0C,001F0000"
        ]
    );
    assert!(h.coin_input_enabled());

    let summary = c.tube_summary();
    let values: Vec<u32> = summary.iter().map(|t| t.value).collect();
    assert_eq!(values, vec![5, 10, 20, 50, 100]);
    assert_eq!(summary[2].status, TubeStatus::Empty);
    assert_eq!(summary[3].status, TubeStatus::Full);
    assert_eq!(summary[1].fullness_percent, 10);
}

#[test]
fn unusable_setup_uses_fallback_only_when_allowed() {
    let sim = SimulatedChanger::new();
    sim.handle().set_setup_response("p,0319");
    let report = changer(sim, cfg()).initialize().unwrap();
    assert!(report.used_fallback);
    assert_eq!(report.denominations, 5);

    let sim = SimulatedChanger::new();
    sim.handle().set_setup_response("");
    let mut strict = cfg();
    strict.setup.use_fallback = false;
    let err = changer(sim, strict).initialize().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::SetupParse { .. }), "{err}");
}

#[test]
fn tube_status_failure_is_fatal_during_init() {
    let sim = SimulatedChanger::new();
    sim.handle().set_tube_status_response(Some("p,00"));
    let err = changer(sim, cfg()).initialize().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::TubeRefresh { .. }), "{err}");
}

#[test]
fn require_stock_rejects_empty_changer() {
    let mut strict = cfg();
    strict.setup.require_stock = true;
    let err = changer(SimulatedChanger::new(), strict.clone())
        .initialize()
        .unwrap_err();
    assert!(err.to_string().contains("every tube reads empty"));
    assert!(changer(SimulatedChanger::with_tubes(&[1]), strict)
        .initialize()
        .is_ok());
}

#[test]
fn dispense_keeps_device_and_model_in_step() {
    let sim = SimulatedChanger::with_tubes(&[20, 20]);
    let h = sim.handle();
    let c = changer(sim, cfg());
    c.initialize().unwrap();

    let report = c.dispense(CoinType(2), 17).unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.count, 3);
    assert_eq!(h.tube_count(2), Some(3));

    let plan = c.refund(25).unwrap();
    assert_eq!(plan.total(), 25);
    let model: u32 = c.tubes().iter().map(|t| t.count * t.value).sum();
    let device = u32::from(h.tube_count(1).unwrap()) * 5 + u32::from(h.tube_count(2).unwrap()) * 10;
    assert_eq!(model, device);
    assert_eq!(model, 100 + 30 - 25);
}

#[test]
fn dispensable_value_holds_back_security_stock() {
    let mut reserved = cfg();
    reserved.tubes.security_stock = 1;
    let c = changer(SimulatedChanger::with_tubes(&[2, 3]), reserved);
    c.initialize().unwrap();
    assert_eq!(c.dispensable_value(), 5 + 2 * 10);
    c.dispense(CoinType(2), 2).unwrap();
    assert_eq!(c.dispensable_value(), 5);
}

#[test]
fn manual_payout_is_counted_once() {
    let sim = SimulatedChanger::with_tubes(&[4]);
    let h = sim.handle();
    let c = changer(sim, cfg());
    c.initialize().unwrap();
    h.manual_dispense(1);
    c.poll_once().unwrap();
    assert_eq!(c.tubes()[0].count, 3);
    assert_eq!(h.tube_count(1), Some(3));
}

#[test]
fn reset_and_coin_input_controls() {
    let sim = SimulatedChanger::with_tubes(&[4, 4]);
    let h = sim.handle();
    let c = changer(sim, cfg());
    c.initialize().unwrap();
    c.reset_tubes();
    assert!(c.tubes().iter().all(|t| t.count == 0 && t.dispensable == 0));
    c.set_coin_input(false).unwrap();
    assert!(!h.coin_input_enabled());
    c.refresh_tubes().unwrap();
    assert_eq!(c.tubes()[0].count, 4);
}

#[test]
fn amount_request_over_the_poll_loop() {
    let sim = SimulatedChanger::with_tubes(&[10, 10, 10]);
    let h = sim.handle();
    let c = changer(sim, cfg());
    c.initialize().unwrap();
    let rx = c.subscribe();
    c.start_amount_request(40).unwrap();
    let poller = Poller::spawn(c.clone());

    // 20 + 50 = 70, overpay 30
    h.insert_coin(3);
    h.insert_coin(4);

    let done = loop {
        match rx.recv_timeout(Duration::from_secs(5)).expect("amount state") {
            Notification::Amount(s) if s.status == RequestStatus::Success => break s,
            _ => {}
        }
    };
    poller.shutdown().unwrap();
    assert_eq!((done.requested, done.inserted, done.remaining), (40, 40, 0));
    // overpay of 30 left the tubes: 20 + 10
    assert_eq!(h.tube_count(3), Some(10));
    assert_eq!(h.tube_count(2), Some(9));
    assert_eq!(c.amount_state().status, RequestStatus::Idle);
}
