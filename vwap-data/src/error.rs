use crate::{exchange::coinbase::connection::ConnectionState, tick::Instrument};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `vwap-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("failed to connect to {url} after {attempts} attempts")]
    Connect { url: String, attempts: u32 },

    #[error("received interrupt signal while connecting")]
    Interrupted,

    #[error("failed to subscribe: {0}")]
    Protocol(String),

    #[error("failed to send closing frame: {0}")]
    Close(String),

    #[error("VWAP value undefined for instrument: {0}")]
    NotFound(Instrument),

    #[error("failed to decode trade message: {0}")]
    Decode(String),

    #[error("VWAP window sums overflowed for instrument: {0}")]
    Overflow(Instrument),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("operation not valid while connection is {0}")]
    InvalidState(ConnectionState),
}

impl DataError {
    /// Determine if an error is fatal to the feed, ie/ the process cannot proceed without a
    /// live, subscribed connection.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            DataError::Connect { .. }
            | DataError::Interrupted
            | DataError::Protocol(_)
            | DataError::Config(_)
            | DataError::InvalidState(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}
