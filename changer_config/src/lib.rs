#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and denomination table parsing for the coin changer.
//!
//! - `Config` and its sections are deserialized from TOML; every section is
//!   optional and falls back to the defaults a stock MDB changer works with.
//! - The fallback denomination table may be given inline or as a CSV file with
//!   strict headers.
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde::de::Deserializer;

/// Highest coin type addressable on the wire (raw nibble 15).
pub const MAX_COIN_TYPE: u8 = 16;

/// Denomination CSV schema.
///
/// Expected headers:
/// coin_type,value
///
/// Example:
/// coin_type,value
/// 1,5
/// 2,10
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DenominationRow {
    pub coin_type: u8,
    pub value: u32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SerialCfg {
    /// Device path of the MDB bridge; absent means "use the simulator"
    pub port: Option<String>,
    pub baud: u32,
    /// Default exchange timeout for setup/control commands
    pub timeout_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
            timeout_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct TubesCfg {
    pub capacity: u8,
    /// Coins per tube held back from automatic dispensing
    pub security_stock: u8,
}

impl Default for TubesCfg {
    fn default() -> Self {
        Self {
            capacity: 50,
            security_stock: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct PollCfg {
    pub timeout_ms: u64,
    pub interval_ms: u64,
    /// Delay after an empty (timed out) poll response
    pub idle_ms: u64,
    pub error_backoff_ms: u64,
    /// Consecutive failures tolerated before the loop turns fatal
    pub max_failures: u32,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 600,
            interval_ms: 250,
            idle_ms: 150,
            error_backoff_ms: 500,
            max_failures: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct DispenseCfg {
    pub timeout_ms: u64,
    /// Pause between consecutive dispense commands
    pub batch_delay_ms: u64,
}

impl Default for DispenseCfg {
    fn default() -> Self {
        Self {
            timeout_ms: 800,
            batch_delay_ms: 150,
        }
    }
}

/// High-nibble values the bridge uses for each poll event kind.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct EventsCfg {
    pub accepted: u8,
    pub dispensed: u8,
    pub cashbox: u8,
    pub returned: u8,
}

impl Default for EventsCfg {
    fn default() -> Self {
        Self {
            accepted: 0x5,
            dispensed: 0x9,
            cashbox: 0x4,
            returned: 0x7,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SetupCfg {
    /// Substitute the fallback table when the setup reply is unusable
    pub use_fallback: bool,
    /// Fail initialization when every tube reads empty
    pub require_stock: bool,
    pub reset_settle_ms: u64,
    /// Accepts either:
    /// - array of tuples: [[1, 5], [2, 10], ...]
    /// - array of tables: [{ coin_type = 1, value = 5 }, ...]
    #[serde(deserialize_with = "de_denominations")]
    pub fallback: Vec<(u8, u32)>,
    /// Optional CSV file that replaces `fallback` when present
    pub fallback_csv: Option<String>,
}

impl Default for SetupCfg {
    fn default() -> Self {
        Self {
            use_fallback: true,
            require_stock: false,
            reset_settle_ms: 50,
            fallback: vec![(1, 5), (2, 10), (3, 20), (4, 50), (5, 100)],
            fallback_csv: None,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub tubes: TubesCfg,
    pub poll: PollCfg,
    pub dispense: DispenseCfg,
    /// Poll event nibble mapping of the bridge dialect
    pub events: EventsCfg,
    pub setup: SetupCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DenominationToml {
    Tuple((u8, u32)),
    Table { coin_type: u8, value: u32 },
}

fn de_denominations<'de, D>(deserializer: D) -> Result<Vec<(u8, u32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<DenominationToml>> = Option::deserialize(deserializer)?;
    Ok(opt
        .unwrap_or_default()
        .into_iter()
        .map(|d| match d {
            DenominationToml::Tuple(pair) => pair,
            DenominationToml::Table { coin_type, value } => (coin_type, value),
        })
        .collect())
}

/// Check a denomination table: coin types in 1..=16, positive values, no duplicates.
pub fn validate_denominations(table: &[(u8, u32)]) -> eyre::Result<()> {
    let mut seen = HashSet::new();
    for (idx, (coin_type, value)) in table.iter().enumerate() {
        if !(1..=MAX_COIN_TYPE).contains(coin_type) {
            eyre::bail!("denomination {idx}: coin_type {coin_type} outside 1..={MAX_COIN_TYPE}");
        }
        if *value == 0 {
            eyre::bail!("denomination {idx}: value for coin_type {coin_type} must be > 0");
        }
        if !seen.insert(*coin_type) {
            eyre::bail!("denomination {idx}: duplicate coin_type {coin_type}");
        }
    }
    Ok(())
}

pub fn load_denominations_csv(path: &Path) -> eyre::Result<Vec<(u8, u32)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open denomination CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["coin_type", "value"];
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != expected {
        eyre::bail!(
            "denomination CSV must have headers 'coin_type,value', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<DenominationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push((row.coin_type, row.value)),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    if rows.is_empty() {
        eyre::bail!("denomination CSV {:?} has no rows", path);
    }
    validate_denominations(&rows)?;
    Ok(rows)
}

impl Config {
    /// The fallback denomination table, reading `fallback_csv` relative to
    /// `base_dir` when configured.
    pub fn fallback_denominations(&self, base_dir: &Path) -> eyre::Result<Vec<(u8, u32)>> {
        match &self.setup.fallback_csv {
            Some(p) => load_denominations_csv(&base_dir.join(p)),
            None => Ok(self.setup.fallback.clone()),
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if self.serial.baud == 0 {
            eyre::bail!("serial.baud must be > 0");
        }
        check_timeout("serial.timeout_ms", self.serial.timeout_ms)?;
        if let Some(port) = &self.serial.port
            && port.trim().is_empty()
        {
            eyre::bail!("serial.port must not be empty when set");
        }

        // Tubes
        if self.tubes.capacity == 0 {
            eyre::bail!("tubes.capacity must be >= 1");
        }
        if self.tubes.security_stock > self.tubes.capacity {
            eyre::bail!(
                "tubes.security_stock ({}) must not exceed tubes.capacity ({})",
                self.tubes.security_stock,
                self.tubes.capacity
            );
        }

        // Poll
        check_timeout("poll.timeout_ms", self.poll.timeout_ms)?;
        check_timeout("poll.interval_ms", self.poll.interval_ms)?;
        check_timeout("poll.idle_ms", self.poll.idle_ms)?;
        check_timeout("poll.error_backoff_ms", self.poll.error_backoff_ms)?;
        if self.poll.max_failures == 0 {
            eyre::bail!("poll.max_failures must be >= 1");
        }

        // Dispense
        check_timeout("dispense.timeout_ms", self.dispense.timeout_ms)?;
        if self.dispense.batch_delay_ms > MAX_DELAY_MS {
            eyre::bail!("dispense.batch_delay_ms is unreasonably large (>1min)");
        }

        // Events
        let nibbles = [
            ("accepted", self.events.accepted),
            ("dispensed", self.events.dispensed),
            ("cashbox", self.events.cashbox),
            ("returned", self.events.returned),
        ];
        let mut seen = HashSet::new();
        for (name, nibble) in nibbles {
            if nibble > 0x0F {
                eyre::bail!("events.{name} must be a nibble (0..=15), got {nibble}");
            }
            if !seen.insert(nibble) {
                eyre::bail!("events.{name} reuses nibble {nibble:#X}");
            }
        }

        // Setup
        if self.setup.reset_settle_ms > MAX_DELAY_MS {
            eyre::bail!("setup.reset_settle_ms is unreasonably large (>1min)");
        }
        validate_denominations(&self.setup.fallback)?;
        if self.setup.use_fallback
            && self.setup.fallback.is_empty()
            && self.setup.fallback_csv.is_none()
        {
            eyre::bail!("setup.fallback must not be empty when setup.use_fallback = true");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot:?}");
        }

        Ok(())
    }
}

const MAX_DELAY_MS: u64 = 60 * 1000;

fn check_timeout(name: &str, ms: u64) -> eyre::Result<()> {
    if ms == 0 {
        eyre::bail!("{name} must be >= 1");
    }
    if ms > MAX_DELAY_MS {
        eyre::bail!("{name} is unreasonably large (>1min)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = load_toml("").unwrap();
        assert_eq!(cfg.tubes.capacity, 50);
        assert_eq!(cfg.poll.max_failures, 10);
        assert_eq!(cfg.events.accepted, 5);
        assert_eq!(cfg.setup.fallback.len(), 5);
        cfg.validate().unwrap();
    }

    #[test]
    fn fallback_accepts_tuples_and_tables() {
        let cfg = load_toml(
            r#"
            [setup]
            fallback = [[1, 5], { coin_type = 2, value = 10 }]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.setup.fallback, vec![(1, 5), (2, 10)]);
    }
}
