use changer_core::{
    ChangerCfg, CoinChanger, CoinMap, CoinType, EventKind, EventMap, PollOutcome, classify,
    mocks::ScriptedTransport,
};

#[test]
fn byte_0x51_is_accepted_coin_type_two() {
    let coins = CoinMap::from_table(&[(1, 5), (2, 10)]);
    let ev = classify(&[0x51], &coins, &EventMap::default()).unwrap();
    assert_eq!(ev.kind, EventKind::Accepted);
    assert_eq!(ev.coin_type, CoinType(2));
    assert_eq!(ev.value, 10);
}

#[test]
fn unmapped_coin_type_is_noise() {
    let coins = CoinMap::from_table(&[(1, 5)]);
    assert!(classify(&[0x53], &coins, &EventMap::default()).is_none());
}

fn ready_changer(capacity: u32, poll_reply: &str) -> (CoinChanger, ScriptedTransport) {
    let t = ScriptedTransport::new()
        .otherwise("p,ACK")
        .reply("R,09", "p,031978050200030102")
        .reply("R,0A", &format!("p,0000{:02X}03", capacity))
        .reply("R,0B", poll_reply)
        .reply("R,0B", "p,ACK");
    let mut cfg = ChangerCfg::default();
    cfg.tubes.capacity = capacity;
    let changer = CoinChanger::new(t.clone(), cfg);
    changer.initialize().unwrap();
    (changer, t)
}

#[test]
fn accepted_poll_event_increments_capped_at_capacity() {
    let (changer, _t) = ready_changer(50, "p,5104");
    let before = changer.tubes()[1].count;
    assert_eq!(before, 3);
    match changer.poll_once().unwrap() {
        PollOutcome::Event(ev) => {
            assert_eq!(ev.kind, EventKind::Accepted);
            assert_eq!(ev.coin_type, CoinType(2));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(changer.tubes()[1].count, 4);
    assert_eq!(changer.last_event().as_deref(), Some("Accepted coin 2 (10)"));
    assert_eq!(changer.poll_once().unwrap(), PollOutcome::NoEvent);
}

#[test]
fn full_tube_stays_at_capacity() {
    let (changer, _t) = ready_changer(3, "p,5003");
    // tube 1 reported at capacity 3
    assert_eq!(changer.tubes()[0].count, 3);
    changer.poll_once().unwrap();
    assert_eq!(changer.tubes()[0].count, 3);
}
