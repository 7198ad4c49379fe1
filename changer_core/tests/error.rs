use changer_core::hw_error::map_hw_error;
use changer_core::{ChangerError, CoinOpError, ErrorKind};
use changer_hardware::error::HwError;

#[test]
fn display_carries_context_and_timestamp() {
    let e: ChangerError = CoinOpError::Insufficient {
        coin_type: 2,
        requested: 5,
        dispensable: 3,
        count: 4,
    }
    .into();
    let s = e.to_string();
    assert!(s.contains("requested 5, dispensable 3, count 4"), "{s}");
    assert!(s.contains("[at "), "{s}");
    assert!(!e.is_fatal());
}

#[test]
fn raw_reply_is_kept_for_parse_errors() {
    let e = ChangerError::setup_parse("too short", "p,03");
    assert!(e.to_string().contains("\"p,03\""));
    let e = ChangerError::tube_refresh("no payload", "");
    assert!(matches!(e.kind(), ErrorKind::TubeRefresh { .. }));
}

#[test]
fn hw_errors_downcast_to_transport() {
    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::Disconnected);
    let e = map_hw_error(&*boxed);
    assert_eq!(e.kind, ErrorKind::Transport("bridge disconnected".into()));

    let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::NotOpen);
    assert!(map_hw_error(&*boxed).to_string().contains("not open"));
}

#[test]
fn foreign_errors_keep_their_message() {
    let boxed: Box<dyn std::error::Error + Send + Sync> =
        Box::new(std::io::Error::other("cable chewed"));
    let e = map_hw_error(&*boxed);
    assert_eq!(e.kind, ErrorKind::Transport("cable chewed".into()));
}

#[test]
fn fatal_kind() {
    let e = ChangerError::new(ErrorKind::DeviceFatal { failures: 11 });
    assert!(e.is_fatal());
    assert!(e.to_string().contains("11 consecutive failures"));
}
