//! The root reducer: a pure, total function from (state, action) to state.
//!
//! No IO, no clocks, no randomness. Every variant is handled; unknown kinds
//! cannot reach this function because the taxonomy is a closed enum (the
//! type-erased seam in [`crate::store`] fails fast before anything gets
//! here).

use crate::action::AppAction;
use crate::remote::Remote;
use crate::state::{AppState, ConnectionStatus};

pub fn reduce(mut state: AppState, action: AppAction) -> AppState {
    match action {
        AppAction::InitStart => {
            state.connection_status = ConnectionStatus::Connecting;
            state.error = None;
            state
        }
        AppAction::InitSuccess {
            network_id,
            wallet_address,
            handle,
        } => {
            state.connection_status = ConnectionStatus::Connected;
            state.network_id = Some(network_id);
            state.wallet_address = Some(wallet_address);
            state.remote_handle = Some(handle);
            state.error = None;
            state
        }
        AppAction::ConnectionError(message) => {
            state.connection_status = ConnectionStatus::Error;
            state.error = Some(message);
            state.loading = false;
            state.loading_message.clear();
            state
        }
        AppAction::AsyncStart { message, marks } => {
            // Guard fields move to Loading in the same step the flag rises,
            // so a re-entrant trigger evaluation never sees Unknown.
            let mut state = marks.apply(state);
            state.loading = true;
            state.loading_message = message;
            state.error = None;
            state
        }
        AppAction::AsyncComplete(patch) => {
            let mut state = patch.apply(state);
            state.loading = false;
            state.loading_message.clear();
            state.error = None;
            state
        }
        AppAction::Error(message) => {
            state.error = Some(message);
            state.loading = false;
            state.loading_message.clear();
            state
        }
        AppAction::TokenSelected(index) => {
            state.selected_token_index = Some(index);
            // Everything scoped to the previously selected token is stale.
            state.features = Remote::Unknown;
            state.permissions_enabled = Remote::Unknown;
            state.available_roles = Remote::Unknown;
            state.delegate_records = Remote::Unknown;
            state.tokenholders = Remote::Unknown;
            state
        }
    }
}
