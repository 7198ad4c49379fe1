use chrono::{DateTime, Utc};
use thiserror::Error;

/// Precondition violations of coin operations. Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoinOpError {
    #[error("unknown coin type {0}")]
    UnknownCoinType(u8),
    #[error("invalid quantity {0} (must be >= 1)")]
    InvalidQuantity(u32),
    #[error(
        "insufficient coins of type {coin_type}: requested {requested}, dispensable {dispensable}, count {count}"
    )]
    Insufficient {
        coin_type: u8,
        requested: u32,
        dispensable: u32,
        count: u32,
    },
    #[error("invalid amount {0} (must be > 0)")]
    InvalidAmount(u32),
    #[error("an amount request is already active")]
    RequestActive,
    #[error("no tube holds dispensable coins")]
    NoDispensableTubes,
    #[error("no exact change combination for {amount}")]
    NoExactChange { amount: u32 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("setup parse error: {reason} (raw: {raw:?})")]
    SetupParse { reason: String, raw: String },
    #[error("tube refresh error: {reason} (raw: {raw:?})")]
    TubeRefresh { reason: String, raw: String },
    #[error("coin operation error: {0}")]
    CoinOperation(#[from] CoinOpError),
    #[error("coin type {coin_type} outside wire range 1..=16")]
    Range { coin_type: u8 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("device fatal: poll loop gave up after {failures} consecutive failures")]
    DeviceFatal { failures: u32 },
    #[error("invalid state: {0}")]
    State(String),
}

/// Engine error: a kind plus the moment it was raised.
#[derive(Debug, Error, Clone)]
#[error("{kind} [at {at}]")]
pub struct ChangerError {
    pub kind: ErrorKind,
    pub at: DateTime<Utc>,
}

impl ChangerError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            at: Utc::now(),
        }
    }

    pub fn setup_parse(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::new(ErrorKind::SetupParse {
            reason: reason.into(),
            raw: raw.into(),
        })
    }

    pub fn tube_refresh(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::new(ErrorKind::TubeRefresh {
            reason: reason.into(),
            raw: raw.into(),
        })
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport(msg.into()))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn coin_op(&self) -> Option<&CoinOpError> {
        match &self.kind {
            ErrorKind::CoinOperation(e) => Some(e),
            _ => None,
        }
    }

    /// Fatal errors stop the poll loop; the device must be reinitialized.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::DeviceFatal { .. })
    }
}

impl From<ErrorKind> for ChangerError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<CoinOpError> for ChangerError {
    fn from(e: CoinOpError) -> Self {
        Self::new(ErrorKind::CoinOperation(e))
    }
}

pub type Result<T> = std::result::Result<T, ChangerError>;
