//! User-invoked remote operations.
//!
//! Each follows the same shape: validate locally, run the submission
//! through the async wrapper, and on success invalidate the cells the
//! operation made stale. The scheduler takes it from there.

use std::sync::Arc;

use crate::action::{AppAction, StatePatch};
use crate::effect;
use crate::error::ValidationError;
use crate::ledger::LedgerClient;
use crate::model::{is_valid_address, Role, TokenParams};
use crate::remote::Remote;
use crate::runtime::Orchestrator;
use crate::state::AppState;

fn connected(state: &AppState) -> Result<Arc<dyn LedgerClient>, ValidationError> {
    state
        .remote_handle
        .clone()
        .ok_or(ValidationError::NotConnected)
}

fn selected_symbol(state: &AppState) -> Result<String, ValidationError> {
    state
        .selected_token()
        .map(|t| t.symbol.clone())
        .ok_or(ValidationError::NoTokenSelected)
}

fn start(message: &str, marks: StatePatch) -> AppAction {
    AppAction::AsyncStart {
        message: message.to_string(),
        marks,
    }
}

/// Reserve a token symbol for the connected wallet.
pub fn reserve_symbol(orch: &Arc<Orchestrator>, symbol: &str) -> Result<(), ValidationError> {
    let state = orch.state();
    let handle = connected(&state)?;
    let wallet = state
        .wallet_address
        .clone()
        .ok_or(ValidationError::NotConnected)?;
    if symbol.is_empty() {
        return Err(ValidationError::MissingField("symbol"));
    }

    let symbol = symbol.to_string();
    effect::spawn(
        orch.dispatcher(),
        start("Reserving symbol", StatePatch::new()),
        async move {
            let tx = handle.reserve_symbol(&wallet, &symbol).await?;
            tx.execute().await?;
            Ok(StatePatch::new().with_reservations(Remote::Unknown))
        },
    );
    Ok(())
}

/// Create a token from one of the wallet's reservations.
pub fn create_token(orch: &Arc<Orchestrator>, params: TokenParams) -> Result<(), ValidationError> {
    let state = orch.state();
    let handle = connected(&state)?;
    if params.symbol.is_empty() {
        return Err(ValidationError::MissingField("symbol"));
    }
    if params.name.is_empty() {
        return Err(ValidationError::MissingField("name"));
    }
    if !is_valid_address(&params.treasury_wallet) {
        return Err(ValidationError::InvalidAddress);
    }

    effect::spawn(
        orch.dispatcher(),
        start("Creating token", StatePatch::new()),
        async move {
            let tx = handle.create_token(&params).await?;
            tx.execute().await?;
            // The reservation is spent and the token list has grown.
            Ok(StatePatch::new()
                .with_reservations(Remote::Unknown)
                .with_tokens(Remote::Unknown))
        },
    );
    Ok(())
}

/// Enable or disable a feature on the selected token.
///
/// Feature changes can flip the permissions flag, so everything derived
/// from it is invalidated along with the map.
pub fn toggle_feature(
    orch: &Arc<Orchestrator>,
    feature: &str,
    enable: bool,
) -> Result<(), ValidationError> {
    let state = orch.state();
    let handle = connected(&state)?;
    let symbol = selected_symbol(&state)?;
    if feature.is_empty() {
        return Err(ValidationError::MissingField("feature"));
    }

    let feature = feature.to_string();
    effect::spawn(
        orch.dispatcher(),
        start("Updating feature", StatePatch::new()),
        async move {
            let tx = handle.set_feature(&symbol, &feature, enable).await?;
            tx.execute().await?;
            Ok(StatePatch::new()
                .with_features(Remote::Unknown)
                .with_permissions_enabled(Remote::Unknown)
                .with_available_roles(Remote::Unknown)
                .with_delegate_records(Remote::Unknown))
        },
    );
    Ok(())
}

/// Delegate a role on the selected token to an address.
pub fn assign_role(
    orch: &Arc<Orchestrator>,
    address: &str,
    role: Role,
    description: &str,
) -> Result<(), ValidationError> {
    let state = orch.state();
    let handle = connected(&state)?;
    let symbol = selected_symbol(&state)?;
    if !is_valid_address(address) {
        return Err(ValidationError::InvalidAddress);
    }
    if description.is_empty() {
        return Err(ValidationError::MissingField("description"));
    }

    let address = address.to_string();
    let description = description.to_string();
    effect::spawn(
        orch.dispatcher(),
        start("Assigning role", StatePatch::new()),
        async move {
            let tx = handle
                .assign_role(&symbol, &address, &role, &description)
                .await?;
            tx.execute().await?;
            Ok(StatePatch::new().with_delegate_records(Remote::Unknown))
        },
    );
    Ok(())
}

/// Withdraw a delegated role from an address.
pub fn revoke_role(
    orch: &Arc<Orchestrator>,
    address: &str,
    role: Role,
) -> Result<(), ValidationError> {
    let state = orch.state();
    let handle = connected(&state)?;
    let symbol = selected_symbol(&state)?;

    let address = address.to_string();
    effect::spawn(
        orch.dispatcher(),
        start("Revoking role", StatePatch::new()),
        async move {
            let tx = handle.revoke_role(&symbol, &address, &role).await?;
            tx.execute().await?;
            Ok(StatePatch::new().with_delegate_records(Remote::Unknown))
        },
    );
    Ok(())
}

/// Remove entries from the selected token's whitelist.
pub fn revoke_tokenholders(
    orch: &Arc<Orchestrator>,
    addresses: Vec<String>,
) -> Result<(), ValidationError> {
    let state = orch.state();
    let handle = connected(&state)?;
    let symbol = selected_symbol(&state)?;
    if addresses.is_empty() {
        return Err(ValidationError::MissingField("addresses"));
    }

    effect::spawn(
        orch.dispatcher(),
        start("Removing token holders", StatePatch::new()),
        async move {
            let tx = handle.revoke_tokenholders(&symbol, &addresses).await?;
            tx.execute().await?;
            Ok(StatePatch::new().with_tokenholders(Remote::Unknown))
        },
    );
    Ok(())
}
