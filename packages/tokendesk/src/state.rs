//! The root application state.
//!
//! All remote collections live in [`Remote`] cells. Nothing mutates this
//! struct except the reducer; everything else reads snapshots of it.

use std::fmt;
use std::sync::Arc;

use crate::ledger::LedgerClient;
use crate::model::{DelegateRecord, FeatureMap, Reservation, Role, TokenSummary, Tokenholder};
use crate::remote::Remote;

/// Lifecycle of the single ledger connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No connection attempt has started.
    #[default]
    Uninitialized,
    /// The connect trigger is resolving the environment.
    Connecting,
    /// The handle exists; fetch triggers may fire.
    Connected,
    /// Connecting failed; fatal for the session.
    Error,
}

/// Root state. Mutated only by [`crate::reducer::reduce`].
#[derive(Clone, Default)]
pub struct AppState {
    pub connection_status: ConnectionStatus,
    /// Set on successful connection, never changed after.
    pub network_id: Option<i64>,
    pub wallet_address: Option<String>,
    /// Created exactly once, by `InitSuccess`.
    pub remote_handle: Option<Arc<dyn LedgerClient>>,

    /// True while at least the most recent async operation is in flight.
    pub loading: bool,
    /// Human-readable description of the operation in flight.
    /// Invariant: empty whenever `loading` is false.
    pub loading_message: String,
    /// Message of the most recent failure, cleared on the next start.
    pub error: Option<String>,

    pub selected_token_index: Option<usize>,

    pub reservations: Remote<Vec<Reservation>>,
    pub tokens: Remote<Vec<TokenSummary>>,
    pub features: Remote<FeatureMap>,
    pub permissions_enabled: Remote<bool>,
    pub available_roles: Remote<Vec<Role>>,
    pub delegate_records: Remote<Vec<DelegateRecord>>,
    pub tokenholders: Remote<Vec<Tokenholder>>,
}

impl AppState {
    /// The currently selected token, if the list is loaded and the index
    /// points inside it.
    pub fn selected_token(&self) -> Option<&TokenSummary> {
        let tokens = self.tokens.as_loaded()?;
        tokens.get(self.selected_token_index?)
    }
}

impl PartialEq for AppState {
    fn eq(&self, other: &Self) -> bool {
        let handles_equal = match (&self.remote_handle, &other.remote_handle) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        handles_equal
            && self.connection_status == other.connection_status
            && self.network_id == other.network_id
            && self.wallet_address == other.wallet_address
            && self.loading == other.loading
            && self.loading_message == other.loading_message
            && self.error == other.error
            && self.selected_token_index == other.selected_token_index
            && self.reservations == other.reservations
            && self.tokens == other.tokens
            && self.features == other.features
            && self.permissions_enabled == other.permissions_enabled
            && self.available_roles == other.available_roles
            && self.delegate_records == other.delegate_records
            && self.tokenholders == other.tokenholders
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("connection_status", &self.connection_status)
            .field("network_id", &self.network_id)
            .field("wallet_address", &self.wallet_address)
            .field("has_handle", &self.remote_handle.is_some())
            .field("loading", &self.loading)
            .field("loading_message", &self.loading_message)
            .field("error", &self.error)
            .field("selected_token_index", &self.selected_token_index)
            .field("reservations", &self.reservations)
            .field("tokens", &self.tokens)
            .field("features", &self.features)
            .field("permissions_enabled", &self.permissions_enabled)
            .field("available_roles", &self.available_roles)
            .field("delegate_records", &self.delegate_records)
            .field("tokenholders", &self.tokenholders)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_fully_unknown() {
        let state = AppState::default();
        assert_eq!(state.connection_status, ConnectionStatus::Uninitialized);
        assert!(state.remote_handle.is_none());
        assert!(!state.loading);
        assert!(state.loading_message.is_empty());
        assert!(state.reservations.is_unknown());
        assert!(state.tokens.is_unknown());
        assert!(state.tokenholders.is_unknown());
    }

    #[test]
    fn test_selected_token_requires_loaded_list_and_valid_index() {
        let mut state = AppState::default();
        assert!(state.selected_token().is_none());

        state.tokens = Remote::Loaded(vec![TokenSummary {
            symbol: "AAA".into(),
            name: "Token A".into(),
        }]);
        assert!(state.selected_token().is_none());

        state.selected_token_index = Some(0);
        assert_eq!(state.selected_token().unwrap().symbol, "AAA");

        state.selected_token_index = Some(5);
        assert!(state.selected_token().is_none());
    }
}
