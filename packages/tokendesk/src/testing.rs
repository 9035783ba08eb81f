//! Test doubles for the collaborator traits, plus small async test helpers.
//!
//! Compiled for this crate's own tests and, behind the `testing` feature,
//! for downstream crates that want to drive the orchestrator without a real
//! ledger.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use crate::config::{NetworkConfig, NetworkId};
use crate::error::{ConnectError, LedgerError};
use crate::ledger::{Environment, LedgerClient, LedgerConnector, Submittable};
use crate::model::{
    Delegate, FeatureMap, Reservation, Role, TokenParams, TokenSummary, Tokenholder,
};
use crate::runtime::Orchestrator;
use crate::state::AppState;

/// A fixed environment: one chain id, one wallet.
pub struct FakeEnvironment {
    chain_id: i64,
    wallet: String,
}

impl FakeEnvironment {
    pub fn new(chain_id: i64, wallet: impl Into<String>) -> Self {
        FakeEnvironment {
            chain_id,
            wallet: wallet.into(),
        }
    }
}

#[async_trait]
impl Environment for FakeEnvironment {
    async fn network_id(&self) -> Result<i64, ConnectError> {
        Ok(self.chain_id)
    }

    async fn wallet_address(&self) -> Result<String, ConnectError> {
        Ok(self.wallet.clone())
    }
}

#[derive(Default)]
struct Inner {
    reservations: Vec<Reservation>,
    launched: BTreeSet<String>,
    tokens: Vec<TokenSummary>,
    features: BTreeMap<String, FeatureMap>,
    roles: Vec<Role>,
    delegates: BTreeMap<String, Vec<Delegate>>,
    tokenholders: BTreeMap<String, Vec<Tokenholder>>,
    fail_next: BTreeMap<&'static str, String>,
    calls: BTreeMap<&'static str, usize>,
}

impl Inner {
    /// Count a read call and surface a scripted failure as a transport
    /// error.
    fn record(&mut self, op: &'static str) -> Result<(), LedgerError> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.fail_next.remove(op) {
            Some(message) => Err(LedgerError::Transport(message)),
            None => Ok(()),
        }
    }

    /// Count a mutating call. Scripted failures for these surface at
    /// `execute` time instead, as a rejection.
    fn count(&mut self, op: &'static str) {
        *self.calls.entry(op).or_insert(0) += 1;
    }
}

/// An in-memory ledger with per-operation call counters and scriptable
/// one-shot failures.
pub struct FakeLedger {
    inner: Arc<Mutex<Inner>>,
}

impl FakeLedger {
    pub fn new() -> Self {
        FakeLedger {
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn set_reservations(&self, reservations: Vec<Reservation>) {
        self.inner.lock().unwrap().reservations = reservations;
    }

    /// Mark a symbol's token as already launched, so its reservation gets
    /// filtered out of the reservation fetch.
    pub fn mark_launched(&self, symbol: &str) {
        self.inner.lock().unwrap().launched.insert(symbol.to_string());
    }

    pub fn set_tokens(&self, tokens: Vec<TokenSummary>) {
        self.inner.lock().unwrap().tokens = tokens;
    }

    pub fn set_features(&self, token: &str, features: FeatureMap) {
        self.inner
            .lock()
            .unwrap()
            .features
            .insert(token.to_string(), features);
    }

    pub fn set_roles(&self, roles: Vec<Role>) {
        self.inner.lock().unwrap().roles = roles;
    }

    pub fn set_delegates(&self, token: &str, delegates: Vec<Delegate>) {
        self.inner
            .lock()
            .unwrap()
            .delegates
            .insert(token.to_string(), delegates);
    }

    pub fn set_tokenholders(&self, token: &str, holders: Vec<Tokenholder>) {
        self.inner
            .lock()
            .unwrap()
            .tokenholders
            .insert(token.to_string(), holders);
    }

    /// Make the next call to `op` fail with a transport error carrying
    /// `message`. Ops are named after the trait methods.
    pub fn fail_next(&self, op: &'static str, message: impl Into<String>) {
        self.inner.lock().unwrap().fail_next.insert(op, message.into());
    }

    /// How many times `op` has been called.
    pub fn calls(&self, op: &'static str) -> usize {
        self.inner.lock().unwrap().calls.get(op).copied().unwrap_or(0)
    }

    fn submittable(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut Inner) + Send + 'static,
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        let fail = self.inner.lock().unwrap().fail_next.remove(op);
        Ok(Box::new(FakeSubmittable {
            inner: self.inner.clone(),
            apply: Box::new(apply),
            fail,
        }))
    }
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

struct FakeSubmittable {
    inner: Arc<Mutex<Inner>>,
    apply: Box<dyn FnOnce(&mut Inner) + Send>,
    fail: Option<String>,
}

#[async_trait]
impl Submittable for FakeSubmittable {
    async fn execute(self: Box<Self>) -> Result<(), LedgerError> {
        if let Some(message) = self.fail {
            return Err(LedgerError::Rejected(message));
        }
        (self.apply)(&mut self.inner.lock().unwrap());
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn reservations(&self, _owner: &str) -> Result<Vec<Reservation>, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.record("reservations")?;
        Ok(inner.reservations.clone())
    }

    async fn is_launched(&self, symbol: &str) -> Result<bool, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.record("is_launched")?;
        Ok(inner.launched.contains(symbol))
    }

    async fn reserve_symbol(
        &self,
        _owner: &str,
        symbol: &str,
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        self.inner.lock().unwrap().count("reserve_symbol");
        let symbol = symbol.to_string();
        self.submittable("reserve_symbol", move |inner| {
            inner.reservations.push(Reservation {
                symbol,
                expiry: Utc::now() + ChronoDuration::days(15),
            });
        })
    }

    async fn tokens(&self, _owner: &str) -> Result<Vec<TokenSummary>, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.record("tokens")?;
        Ok(inner.tokens.clone())
    }

    async fn create_token(
        &self,
        params: &TokenParams,
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        self.inner.lock().unwrap().count("create_token");
        let params = params.clone();
        self.submittable("create_token", move |inner| {
            inner.reservations.retain(|r| r.symbol != params.symbol);
            inner.launched.insert(params.symbol.clone());
            inner.tokens.push(TokenSummary {
                symbol: params.symbol,
                name: params.name,
            });
        })
    }

    async fn feature_status(&self, token: &str) -> Result<FeatureMap, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.record("feature_status")?;
        Ok(inner.features.get(token).cloned().unwrap_or_default())
    }

    async fn set_feature(
        &self,
        token: &str,
        feature: &str,
        enable: bool,
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        self.inner.lock().unwrap().count("set_feature");
        let token = token.to_string();
        let feature = feature.to_string();
        self.submittable("set_feature", move |inner| {
            inner.features.entry(token).or_default().insert(feature, enable);
        })
    }

    async fn available_roles(&self, _token: &str) -> Result<Vec<Role>, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.record("available_roles")?;
        Ok(inner.roles.clone())
    }

    async fn delegates(&self, token: &str) -> Result<Vec<Delegate>, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.record("delegates")?;
        Ok(inner.delegates.get(token).cloned().unwrap_or_default())
    }

    async fn assign_role(
        &self,
        token: &str,
        address: &str,
        role: &Role,
        description: &str,
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        self.inner.lock().unwrap().count("assign_role");
        let token = token.to_string();
        let address = address.to_string();
        let role = role.clone();
        let description = description.to_string();
        self.submittable("assign_role", move |inner| {
            let delegates = inner.delegates.entry(token).or_default();
            if let Some(existing) = delegates.iter_mut().find(|d| d.address == address) {
                if !existing.roles.contains(&role) {
                    existing.roles.push(role);
                }
                existing.description = description;
            } else {
                delegates.push(Delegate {
                    address,
                    roles: vec![role],
                    description,
                });
            }
        })
    }

    async fn revoke_role(
        &self,
        token: &str,
        address: &str,
        role: &Role,
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        self.inner.lock().unwrap().count("revoke_role");
        let token = token.to_string();
        let address = address.to_string();
        let role = role.clone();
        self.submittable("revoke_role", move |inner| {
            if let Some(delegates) = inner.delegates.get_mut(&token) {
                for delegate in delegates.iter_mut() {
                    if delegate.address == address {
                        delegate.roles.retain(|r| r != &role);
                    }
                }
                delegates.retain(|d| !d.roles.is_empty());
            }
        })
    }

    async fn tokenholders(&self, token: &str) -> Result<Vec<Tokenholder>, LedgerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.record("tokenholders")?;
        Ok(inner.tokenholders.get(token).cloned().unwrap_or_default())
    }

    async fn modify_tokenholders(
        &self,
        token: &str,
        entries: &[Tokenholder],
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        self.inner.lock().unwrap().count("modify_tokenholders");
        let token = token.to_string();
        let entries = entries.to_vec();
        self.submittable("modify_tokenholders", move |inner| {
            let holders = inner.tokenholders.entry(token).or_default();
            for entry in entries {
                if let Some(existing) = holders
                    .iter_mut()
                    .find(|h| h.address.eq_ignore_ascii_case(&entry.address))
                {
                    *existing = entry;
                } else {
                    holders.push(entry);
                }
            }
        })
    }

    async fn revoke_tokenholders(
        &self,
        token: &str,
        addresses: &[String],
    ) -> Result<Box<dyn Submittable>, LedgerError> {
        self.inner.lock().unwrap().count("revoke_tokenholders");
        let token = token.to_string();
        let addresses = addresses.to_vec();
        self.submittable("revoke_tokenholders", move |inner| {
            if let Some(holders) = inner.tokenholders.get_mut(&token) {
                holders.retain(|h| {
                    !addresses
                        .iter()
                        .any(|a| a.eq_ignore_ascii_case(&h.address))
                });
            }
        })
    }
}

/// Hands out one shared [`FakeLedger`] handle, optionally failing instead.
pub struct FakeConnector {
    ledger: Arc<FakeLedger>,
    fail: Option<String>,
}

impl FakeConnector {
    pub fn new(ledger: Arc<FakeLedger>) -> Self {
        FakeConnector {
            ledger,
            fail: None,
        }
    }

    pub fn failing(ledger: Arc<FakeLedger>, message: impl Into<String>) -> Self {
        FakeConnector {
            ledger,
            fail: Some(message.into()),
        }
    }
}

#[async_trait]
impl LedgerConnector for FakeConnector {
    async fn connect(
        &self,
        _network: NetworkId,
        _config: &NetworkConfig,
    ) -> Result<Arc<dyn LedgerClient>, ConnectError> {
        match &self.fail {
            Some(message) => Err(ConnectError::Environment(message.clone())),
            None => Ok(self.ledger.clone()),
        }
    }
}

/// Await a state condition, panicking after five seconds.
pub async fn wait_for(orch: &Arc<Orchestrator>, mut predicate: impl FnMut(&AppState) -> bool) {
    let mut rx = orch.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if predicate(&orch.state()) {
                return;
            }
            if rx.changed().await.is_err() {
                panic!("orchestrator dropped while waiting for state condition");
            }
        }
    })
    .await;
    if waited.is_err() {
        panic!("timed out waiting for state condition: {:?}", orch.state());
    }
}

/// A tokenholder with plausible eligibility windows around `now`.
pub fn sample_tokenholder(address: &str) -> Tokenholder {
    let now = Utc::now();
    Tokenholder {
        address: address.to_string(),
        can_send_after: now + ChronoDuration::hours(1),
        can_receive_after: now + ChronoDuration::hours(1),
        kyc_expiry: now + ChronoDuration::days(365),
        can_buy_from_sto: true,
        is_accredited: false,
    }
}
