//! Error taxonomy.
//!
//! Three failure families cross three different boundaries:
//!
//! - [`ConnectError`] — the environment itself is unusable; fatal to the
//!   connect trigger, surfaced once as the connection error, never retried.
//! - [`LedgerError`] — a remote operation failed; converted to a single
//!   visible message by the async wrapper and stored on state.
//! - [`ValidationError`] — locally detectable bad input; returned to the
//!   caller before any remote call and never reaches the reducer.
//!
//! Inside async operations errors travel as `anyhow::Error`; none of it
//! crosses the dispatch boundary. Only the rendered message does.

use thiserror::Error;

use crate::config::UNSUPPORTED_NETWORK_MESSAGE;

/// Failure to establish the ledger connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The environment reports a network we have no parameters for.
    #[error("{}", UNSUPPORTED_NETWORK_MESSAGE)]
    UnsupportedNetwork { chain_id: i64 },

    /// The environment is missing or unreadable (no wallet, no provider).
    #[error("environment unavailable: {0}")]
    Environment(String),
}

/// Failure of a remote ledger operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger rejected the submission.
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// The request never reached the ledger or the response was lost.
    #[error("transport failure: {0}")]
    Transport(String),

    /// An operation referenced a token the ledger does not know.
    #[error("unknown token {0}")]
    UnknownToken(String),
}

/// Locally detectable bad input, caught before any remote call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Address is invalid")]
    InvalidAddress,

    #[error("Tokenholder is already present in the whitelist")]
    DuplicateAddress,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("no token selected")]
    NoTokenSelected,

    #[error("not connected to a ledger")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_network_message() {
        let err = ConnectError::UnsupportedNetwork { chain_id: 7 };
        assert_eq!(
            err.to_string(),
            "Please switch to either Main or Kovan network"
        );
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(ValidationError::InvalidAddress.to_string(), "Address is invalid");
        assert_eq!(
            ValidationError::DuplicateAddress.to_string(),
            "Tokenholder is already present in the whitelist"
        );
        assert_eq!(
            ValidationError::MissingField("name").to_string(),
            "name is required"
        );
    }
}
