//! Collaborator traits for everything outside the state machine.
//!
//! The orchestration core never talks to a chain, a wallet, or a network
//! directly. It talks to these traits; production wires real clients behind
//! them, tests wire the fakes from [`crate::testing`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{NetworkConfig, NetworkId};
use crate::error::{ConnectError, LedgerError};
use crate::model::{Delegate, FeatureMap, Reservation, Role, TokenParams, TokenSummary, Tokenholder};

/// The host environment: which network are we on, and as whom.
#[async_trait]
pub trait Environment: Send + Sync {
    /// The chain id the environment currently reports.
    async fn network_id(&self) -> Result<i64, ConnectError>;

    /// The wallet address acting on the user's behalf.
    async fn wallet_address(&self) -> Result<String, ConnectError>;
}

/// Establishes the ledger connection, exactly once per session.
#[async_trait]
pub trait LedgerConnector: Send + Sync {
    async fn connect(
        &self,
        network: NetworkId,
        config: &NetworkConfig,
    ) -> Result<Arc<dyn LedgerClient>, ConnectError>;
}

/// A prepared mutation awaiting submission.
///
/// Mutating [`LedgerClient`] calls return one of these instead of submitting
/// directly, so callers control when the (potentially slow, user-confirmed)
/// submission happens.
#[async_trait]
pub trait Submittable: Send {
    async fn execute(self: Box<Self>) -> Result<(), LedgerError>;
}

/// Everything the dashboard asks of a connected ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    // Symbol reservations.
    async fn reservations(&self, owner: &str) -> Result<Vec<Reservation>, LedgerError>;
    async fn is_launched(&self, symbol: &str) -> Result<bool, LedgerError>;
    async fn reserve_symbol(
        &self,
        owner: &str,
        symbol: &str,
    ) -> Result<Box<dyn Submittable>, LedgerError>;

    // Tokens.
    async fn tokens(&self, owner: &str) -> Result<Vec<TokenSummary>, LedgerError>;
    async fn create_token(&self, params: &TokenParams) -> Result<Box<dyn Submittable>, LedgerError>;

    // Feature flags.
    async fn feature_status(&self, token: &str) -> Result<FeatureMap, LedgerError>;
    async fn set_feature(
        &self,
        token: &str,
        feature: &str,
        enable: bool,
    ) -> Result<Box<dyn Submittable>, LedgerError>;

    // Role delegation.
    async fn available_roles(&self, token: &str) -> Result<Vec<Role>, LedgerError>;
    async fn delegates(&self, token: &str) -> Result<Vec<Delegate>, LedgerError>;
    async fn assign_role(
        &self,
        token: &str,
        address: &str,
        role: &Role,
        description: &str,
    ) -> Result<Box<dyn Submittable>, LedgerError>;
    async fn revoke_role(
        &self,
        token: &str,
        address: &str,
        role: &Role,
    ) -> Result<Box<dyn Submittable>, LedgerError>;

    // Whitelist.
    async fn tokenholders(&self, token: &str) -> Result<Vec<Tokenholder>, LedgerError>;
    async fn modify_tokenholders(
        &self,
        token: &str,
        entries: &[Tokenholder],
    ) -> Result<Box<dyn Submittable>, LedgerError>;
    async fn revoke_tokenholders(
        &self,
        token: &str,
        addresses: &[String],
    ) -> Result<Box<dyn Submittable>, LedgerError>;
}
