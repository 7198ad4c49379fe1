#![no_main]
use changer_core::protocol::{decode_hex_payload, frame_payload};
use changer_core::{CoinMap, EventMap, TubeInventory, classify};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Whatever comes off the wire must decode, classify and resync without panicking.
    let payload = frame_payload(data).unwrap_or(data);
    let bytes = decode_hex_payload(payload);
    assert!(bytes.len() <= payload.len().div_ceil(2));

    let coins = CoinMap::from_table(&[(1, 5), (2, 10), (3, 20)]);
    let _ = classify(&bytes, &coins, &EventMap::default());
    let _ = CoinMap::from_setup(&bytes);

    let mut tubes = TubeInventory::from_coin_map(&coins, 50, 2);
    if tubes.resync_from_hardware(&bytes, &coins).is_ok() {
        for t in tubes.iter() {
            assert!(t.count <= t.capacity);
            assert!(t.dispensable <= t.count);
        }
    }
});
