#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validate arbitrary TOML; errors are fine, panics are not.
    if let Ok(cfg) = changer_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // a valid file always maps onto runtime types
            let _ = changer_core::ChangerCfg::from(&cfg);
        }
    }
});
