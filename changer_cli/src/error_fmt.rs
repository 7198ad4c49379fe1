//! Human-readable error descriptions and structured JSON error formatting.

use changer_core::{ChangerError, CoinOpError, ErrorKind};

/// Stable name of the error kind, used as `reason` in JSON errors.
pub fn kind_name(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::SetupParse { .. } => "SetupParse",
        ErrorKind::TubeRefresh { .. } => "TubeRefresh",
        ErrorKind::CoinOperation(_) => "CoinOperation",
        ErrorKind::Range { .. } => "Range",
        ErrorKind::Transport(_) => "Transport",
        ErrorKind::DeviceFatal { .. } => "DeviceFatal",
        ErrorKind::State(_) => "State",
    }
}

fn coin_op_hint(op: &CoinOpError) -> String {
    match op {
        CoinOpError::UnknownCoinType(t) => format!(
            "What happened: Coin type {t} is not in the coin map.\nLikely causes: The changer does not report that type, or the fallback table lacks it.\nHow to fix: Run `changer tubes` to list known types."
        ),
        CoinOpError::InvalidQuantity(_) | CoinOpError::InvalidAmount(_) => format!(
            "What happened: {op}.\nLikely causes: A zero quantity or amount was given.\nHow to fix: Pass a positive value."
        ),
        CoinOpError::Insufficient { .. } => format!(
            "What happened: {op}.\nLikely causes: The tube is low, or tubes.security_stock reserves the remaining coins.\nHow to fix: Refill the tube or lower tubes.security_stock in the config."
        ),
        CoinOpError::RequestActive => "What happened: An amount request is already running.\nLikely causes: A previous request has not completed or been cancelled.\nHow to fix: Wait for it to finish or cancel it first.".to_string(),
        CoinOpError::NoDispensableTubes => "What happened: No tube holds dispensable coins.\nLikely causes: Tubes are empty or entirely held back as security stock.\nHow to fix: Refill the changer, then rerun.".to_string(),
        CoinOpError::NoExactChange { amount } => format!(
            "What happened: {amount} cannot be paid out exactly with the coins on hand.\nLikely causes: Missing small denominations.\nHow to fix: Refill the low-value tubes or choose another amount."
        ),
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(ce) = err.downcast_ref::<ChangerError>() {
        return match ce.kind() {
            ErrorKind::SetupParse { reason, .. } => format!(
                "What happened: The changer setup reply could not be used ({reason}).\nLikely causes: No changer on the bridge, wrong serial port, or a bridge speaking another dialect.\nHow to fix: Check wiring and serial.port, or enable setup.use_fallback with a denomination table."
            ),
            ErrorKind::TubeRefresh { reason, .. } => format!(
                "What happened: Tube levels could not be read ({reason}).\nLikely causes: Link noise, a changer still resetting, or empty tubes with setup.require_stock.\nHow to fix: Retry; raise setup.reset_settle_ms or refill the tubes."
            ),
            ErrorKind::CoinOperation(op) => coin_op_hint(op),
            ErrorKind::Range { coin_type } => format!(
                "What happened: Coin type {coin_type} cannot be addressed on the wire.\nLikely causes: Types are numbered 1..=16.\nHow to fix: Use a type listed by `changer tubes`."
            ),
            ErrorKind::Transport(msg) => format!(
                "What happened: The serial link failed ({msg}).\nLikely causes: Bridge unplugged, port in use, or wrong baud rate.\nHow to fix: Check the cable and serial.port / serial.baud, then rerun."
            ),
            ErrorKind::DeviceFatal { failures } => format!(
                "What happened: The poll loop gave up after {failures} consecutive failures.\nLikely causes: Bridge disconnected or powered off.\nHow to fix: Restore the link; raise poll.max_failures to ride out longer outages."
            ),
            ErrorKind::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
        .to_ascii_lowercase();

    if lower.contains("open serial port") {
        return format!(
            "What happened: {msg}.\nLikely causes: Wrong device path or insufficient permissions on the port.\nHow to fix: Fix serial.port in the config; ensure the process can open the device (e.g. dialout group)."
        );
    }

    if lower.contains("denomination csv must have headers") {
        return "Invalid headers in denomination CSV. Expected 'coin_type,value'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Out-of-range or misspelled values in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map engine error kinds to stable exit codes; anything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ChangerError>().map(ChangerError::kind) {
        Some(ErrorKind::SetupParse { .. }) => 3,
        Some(ErrorKind::TubeRefresh { .. }) => 4,
        Some(ErrorKind::CoinOperation(_) | ErrorKind::Range { .. }) => 5,
        Some(ErrorKind::DeviceFatal { .. }) => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(ce) = err.downcast_ref::<ChangerError>() {
        let details = match ce.kind() {
            ErrorKind::SetupParse { raw, .. } | ErrorKind::TubeRefresh { raw, .. } => {
                Some(json!({ "raw": raw }))
            }
            ErrorKind::DeviceFatal { failures } => Some(json!({ "failures": failures })),
            ErrorKind::Range { coin_type } => Some(json!({ "coin_type": coin_type })),
            _ => None,
        };
        let mut obj = json!({
            "reason": kind_name(ce.kind()),
            "at": ce.at.to_rfc3339(),
            "message": humanize(err),
        });
        if let Some(d) = details {
            obj["details"] = d;
        }
        return obj.to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
