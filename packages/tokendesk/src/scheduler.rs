//! Guarded fetch triggers, re-evaluated after every state transition.
//!
//! Each trigger is a precondition over the state plus a fetch. Preconditions
//! only ever look at cell phases, never payloads, so the scheduler diffs a
//! small [`TriggerView`] between transitions and skips evaluation entirely
//! when the guard subset did not change.
//!
//! Re-entrancy: dispatching re-evaluates, and triggers dispatch. The
//! `dirty`/`evaluating` pair collapses nested evaluations into one loop on
//! the outermost caller's stack. A nested call marks the scheduler dirty and
//! returns; the active pass re-snapshots until the state settles. Together
//! with start actions marking their guard fields Loading before the fetch
//! task first suspends, this makes a second fetch for an in-flight cell
//! structurally impossible.
//!
//! Trigger order is dependency order: connect first, wallet-scoped fetches
//! next, token-scoped fetches last.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::try_join_all;
use tracing::debug;

use crate::action::{AppAction, StatePatch};
use crate::config::{NetworkDirectory, NetworkId};
use crate::effect;
use crate::error::ConnectError;
use crate::ledger::{Environment, LedgerConnector};
use crate::model::{flatten_delegates, PERMISSIONS_FEATURE};
use crate::remote::{Phase, Remote};
use crate::runtime::Orchestrator;
use crate::state::{AppState, ConnectionStatus};

/// The guard subset of the state: connection progress, selection, and the
/// phase of every cached cell.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TriggerView {
    status: ConnectionStatus,
    has_handle: bool,
    has_wallet: bool,
    selected: Option<usize>,
    reservations: Phase,
    tokens: Phase,
    features: Phase,
    permissions_enabled: Option<bool>,
    delegate_records: Phase,
    tokenholders: Phase,
}

impl TriggerView {
    fn of(state: &AppState) -> Self {
        TriggerView {
            status: state.connection_status,
            has_handle: state.remote_handle.is_some(),
            has_wallet: state.wallet_address.is_some(),
            selected: state.selected_token_index,
            reservations: state.reservations.phase(),
            tokens: state.tokens.phase(),
            features: state.features.phase(),
            permissions_enabled: state.permissions_enabled.as_loaded().copied(),
            delegate_records: state.delegate_records.phase(),
            tokenholders: state.tokenholders.phase(),
        }
    }
}

pub struct Scheduler {
    env: Arc<dyn Environment>,
    connector: Arc<dyn LedgerConnector>,
    networks: NetworkDirectory,
    last_view: Mutex<Option<TriggerView>>,
    dirty: AtomicBool,
    evaluating: AtomicBool,
}

impl Scheduler {
    pub fn new(
        env: Arc<dyn Environment>,
        connector: Arc<dyn LedgerConnector>,
        networks: NetworkDirectory,
    ) -> Self {
        Scheduler {
            env,
            connector,
            networks,
            last_view: Mutex::new(None),
            dirty: AtomicBool::new(false),
            evaluating: AtomicBool::new(false),
        }
    }

    /// Re-evaluate the triggers against the current state.
    ///
    /// Safe to call from anywhere, including from inside a trigger's own
    /// dispatches; nested calls fold into the active pass.
    pub fn evaluate(&self, orch: &Arc<Orchestrator>) {
        self.dirty.store(true, Ordering::SeqCst);
        if self.evaluating.swap(true, Ordering::SeqCst) {
            return;
        }
        loop {
            while self.dirty.swap(false, Ordering::SeqCst) {
                self.run_pass(orch);
            }
            self.evaluating.store(false, Ordering::SeqCst);
            // A racing caller may have marked dirty after the inner loop
            // drained; reclaim the evaluating slot unless they already did.
            if !self.dirty.load(Ordering::SeqCst) || self.evaluating.swap(true, Ordering::SeqCst) {
                break;
            }
        }
    }

    fn run_pass(&self, orch: &Arc<Orchestrator>) {
        let state = orch.state();
        let view = TriggerView::of(&state);
        {
            let mut last = self.last_view.lock().unwrap_or_else(|e| e.into_inner());
            if last.as_ref() == Some(&view) {
                return;
            }
            *last = Some(view);
        }

        self.connect(orch, &state);
        self.fetch_tokens(orch, &state);
        self.fetch_reservations(orch, &state);
        self.fetch_features(orch, &state);
        self.fetch_delegates(orch, &state);
        self.fetch_tokenholders(orch, &state);
    }

    /// Fires once per session, while nothing has been attempted yet.
    /// An unsupported network is fatal: the status moves to Error and no
    /// other trigger can ever fire.
    fn connect(&self, orch: &Arc<Orchestrator>, state: &AppState) {
        if state.connection_status != ConnectionStatus::Uninitialized {
            return;
        }
        debug!("trigger: connect");
        orch.dispatch(AppAction::InitStart);

        let env = self.env.clone();
        let connector = self.connector.clone();
        let networks = self.networks.clone();
        let orch = orch.clone();
        tokio::spawn(async move {
            let outcome = async {
                let chain_id = env.network_id().await?;
                let network = NetworkId::from_chain_id(chain_id)
                    .ok_or(ConnectError::UnsupportedNetwork { chain_id })?;
                let wallet_address = env.wallet_address().await?;
                let config = networks
                    .get(network)
                    .ok_or(ConnectError::UnsupportedNetwork { chain_id })?;
                let handle = connector.connect(network, config).await?;
                Ok::<_, ConnectError>((chain_id, wallet_address, handle))
            }
            .await;
            match outcome {
                Ok((network_id, wallet_address, handle)) => orch.dispatch(AppAction::InitSuccess {
                    network_id,
                    wallet_address,
                    handle,
                }),
                Err(err) => orch.dispatch(AppAction::ConnectionError(err.to_string())),
            }
        });
    }

    fn fetch_tokens(&self, orch: &Arc<Orchestrator>, state: &AppState) {
        let (Some(handle), Some(wallet)) = (&state.remote_handle, &state.wallet_address) else {
            return;
        };
        if !state.tokens.is_unknown() {
            return;
        }
        debug!("trigger: fetch tokens");

        let handle = handle.clone();
        let wallet = wallet.clone();
        effect::spawn(
            orch.dispatcher(),
            AppAction::AsyncStart {
                message: "Fetching tokens".into(),
                marks: StatePatch::new().with_tokens(Remote::Loading),
            },
            async move {
                let tokens = handle.tokens(&wallet).await?;
                Ok(StatePatch::new().with_tokens(Remote::Loaded(tokens)))
            },
        );
    }

    /// Reservations whose token has already launched are spent; only the
    /// live ones are kept.
    fn fetch_reservations(&self, orch: &Arc<Orchestrator>, state: &AppState) {
        let (Some(handle), Some(wallet)) = (&state.remote_handle, &state.wallet_address) else {
            return;
        };
        if !state.reservations.is_unknown() {
            return;
        }
        debug!("trigger: fetch reservations");

        let handle = handle.clone();
        let wallet = wallet.clone();
        effect::spawn(
            orch.dispatcher(),
            AppAction::AsyncStart {
                message: "Fetching your previously reserved symbols".into(),
                marks: StatePatch::new().with_reservations(Remote::Loading),
            },
            async move {
                let reservations = handle.reservations(&wallet).await?;
                let launched =
                    try_join_all(reservations.iter().map(|r| handle.is_launched(&r.symbol)))
                        .await?;
                let live = reservations
                    .into_iter()
                    .zip(launched)
                    .filter(|(_, launched)| !launched)
                    .map(|(reservation, _)| reservation)
                    .collect();
                Ok(StatePatch::new().with_reservations(Remote::Loaded(live)))
            },
        );
    }

    /// Fetches the feature map for the selected token, splitting out the
    /// permissions flag. Available roles only exist when permissions are
    /// on, so they ride along in the same operation.
    fn fetch_features(&self, orch: &Arc<Orchestrator>, state: &AppState) {
        let Some(handle) = &state.remote_handle else {
            return;
        };
        let Some(token) = state.selected_token() else {
            return;
        };
        if !state.features.is_unknown() {
            return;
        }
        debug!(token = %token.symbol, "trigger: fetch features");

        let handle = handle.clone();
        let symbol = token.symbol.clone();
        effect::spawn(
            orch.dispatcher(),
            AppAction::AsyncStart {
                message: "Loading features".into(),
                marks: StatePatch::new()
                    .with_features(Remote::Loading)
                    .with_permissions_enabled(Remote::Loading),
            },
            async move {
                let mut features = handle.feature_status(&symbol).await?;
                let permissions = features.remove(PERMISSIONS_FEATURE).unwrap_or(false);
                let mut patch = StatePatch::new()
                    .with_features(Remote::Loaded(features))
                    .with_permissions_enabled(Remote::Loaded(permissions));
                if permissions {
                    let roles = handle.available_roles(&symbol).await?;
                    patch = patch.with_available_roles(Remote::Loaded(roles));
                }
                Ok(patch)
            },
        );
    }

    fn fetch_delegates(&self, orch: &Arc<Orchestrator>, state: &AppState) {
        let Some(handle) = &state.remote_handle else {
            return;
        };
        let Some(token) = state.selected_token() else {
            return;
        };
        if state.permissions_enabled.as_loaded() != Some(&true) {
            return;
        }
        if !state.delegate_records.is_unknown() {
            return;
        }
        debug!(token = %token.symbol, "trigger: fetch delegates");

        let handle = handle.clone();
        let symbol = token.symbol.clone();
        effect::spawn(
            orch.dispatcher(),
            AppAction::AsyncStart {
                message: "Loading delegates".into(),
                marks: StatePatch::new().with_delegate_records(Remote::Loading),
            },
            async move {
                let delegates = handle.delegates(&symbol).await?;
                Ok(StatePatch::new()
                    .with_delegate_records(Remote::Loaded(flatten_delegates(&delegates))))
            },
        );
    }

    fn fetch_tokenholders(&self, orch: &Arc<Orchestrator>, state: &AppState) {
        let Some(handle) = &state.remote_handle else {
            return;
        };
        let Some(token) = state.selected_token() else {
            return;
        };
        if !state.tokenholders.is_unknown() {
            return;
        }
        debug!(token = %token.symbol, "trigger: fetch tokenholders");

        let handle = handle.clone();
        let symbol = token.symbol.clone();
        effect::spawn(
            orch.dispatcher(),
            AppAction::AsyncStart {
                message: "Loading tokenholders".into(),
                marks: StatePatch::new().with_tokenholders(Remote::Loading),
            },
            async move {
                let holders = handle.tokenholders(&symbol).await?;
                Ok(StatePatch::new().with_tokenholders(Remote::Loaded(holders)))
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Utc};

    use crate::action::AppAction;
    use crate::config::NetworkDirectory;
    use crate::model::{Delegate, Reservation, Role, TokenSummary};
    use crate::runtime::Orchestrator;
    use crate::state::ConnectionStatus;
    use crate::testing::{wait_for, FakeConnector, FakeEnvironment, FakeLedger};

    fn orchestrator_with(chain_id: i64, ledger: Arc<FakeLedger>) -> Arc<Orchestrator> {
        Orchestrator::new(
            Arc::new(FakeEnvironment::new(chain_id, "0xwallet")),
            Arc::new(FakeConnector::new(ledger)),
            NetworkDirectory::builtin(),
        )
    }

    fn reservation(symbol: &str) -> Reservation {
        Reservation {
            symbol: symbol.to_string(),
            expiry: Utc::now() + ChronoDuration::days(15),
        }
    }

    #[tokio::test]
    async fn test_connect_then_wallet_scoped_fetches() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_tokens(vec![TokenSummary {
            symbol: "AAA".into(),
            name: "Token A".into(),
        }]);
        let orch = orchestrator_with(42, ledger.clone());
        orch.start();

        wait_for(&orch, |s| {
            s.tokens.is_loaded() && s.reservations.is_loaded() && !s.loading
        })
        .await;

        let state = orch.state();
        assert_eq!(state.connection_status, ConnectionStatus::Connected);
        assert_eq!(state.network_id, Some(42));
        assert_eq!(state.wallet_address.as_deref(), Some("0xwallet"));
        assert!(state.remote_handle.is_some());
        assert_eq!(state.tokens.as_loaded().unwrap().len(), 1);
        assert_eq!(ledger.calls("tokens"), 1);
        assert_eq!(ledger.calls("reservations"), 1);
    }

    #[tokio::test]
    async fn test_unsupported_network_is_fatal() {
        let ledger = Arc::new(FakeLedger::new());
        let orch = orchestrator_with(7, ledger.clone());
        orch.start();

        wait_for(&orch, |s| s.connection_status == ConnectionStatus::Error).await;

        let state = orch.state();
        assert_eq!(
            state.error.as_deref(),
            Some("Please switch to either Main or Kovan network")
        );
        assert!(state.remote_handle.is_none());
        // No downstream trigger ever fired.
        assert_eq!(ledger.calls("tokens"), 0);
        assert_eq!(ledger.calls("reservations"), 0);
    }

    #[tokio::test]
    async fn test_reservation_filter_drops_launched() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_reservations(vec![reservation("OLD"), reservation("NEW")]);
        ledger.mark_launched("OLD");
        let orch = orchestrator_with(1, ledger.clone());
        orch.start();

        wait_for(&orch, |s| s.reservations.is_loaded()).await;

        let state = orch.state();
        let live = state.reservations.as_loaded().unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].symbol, "NEW");
        assert_eq!(ledger.calls("is_launched"), 2);
    }

    #[tokio::test]
    async fn test_selection_drives_token_scoped_fetches() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_tokens(vec![TokenSummary {
            symbol: "AAA".into(),
            name: "Token A".into(),
        }]);
        let mut features = BTreeMap::new();
        features.insert("Permissions".to_string(), true);
        features.insert("StoModule".to_string(), false);
        ledger.set_features("AAA", features);
        ledger.set_roles(vec![Role::from("StoOperator")]);
        ledger.set_delegates(
            "AAA",
            vec![Delegate {
                address: "0xaa".into(),
                roles: vec![Role::from("StoOperator"), Role::from("StoAdministrator")],
                description: "ops".into(),
            }],
        );

        let orch = orchestrator_with(42, ledger.clone());
        orch.start();
        wait_for(&orch, |s| s.tokens.is_loaded()).await;

        orch.dispatch(AppAction::TokenSelected(0));
        wait_for(&orch, |s| {
            s.features.is_loaded() && s.delegate_records.is_loaded() && s.tokenholders.is_loaded()
        })
        .await;

        let state = orch.state();
        // The permissions flag is split out of the stored map.
        assert!(!state.features.as_loaded().unwrap().contains_key("Permissions"));
        assert_eq!(state.permissions_enabled.as_loaded(), Some(&true));
        assert_eq!(state.available_roles.as_loaded().unwrap().len(), 1);
        assert_eq!(state.delegate_records.as_loaded().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_permissions_disabled_skips_delegates() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_tokens(vec![TokenSummary {
            symbol: "BBB".into(),
            name: "Token B".into(),
        }]);
        ledger.set_features("BBB", BTreeMap::new());

        let orch = orchestrator_with(42, ledger.clone());
        orch.start();
        wait_for(&orch, |s| s.tokens.is_loaded()).await;

        orch.dispatch(AppAction::TokenSelected(0));
        wait_for(&orch, |s| s.features.is_loaded() && s.tokenholders.is_loaded()).await;

        let state = orch.state();
        assert_eq!(state.permissions_enabled.as_loaded(), Some(&false));
        assert!(state.available_roles.is_unknown());
        assert!(state.delegate_records.is_unknown());
        assert_eq!(ledger.calls("delegates"), 0);
        assert_eq!(ledger.calls("available_roles"), 0);
    }

    #[tokio::test]
    async fn test_at_most_one_fetch_per_cell_under_rapid_dispatch() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_tokens(vec![TokenSummary {
            symbol: "AAA".into(),
            name: "Token A".into(),
        }]);
        let orch = orchestrator_with(42, ledger.clone());
        orch.start();
        wait_for(&orch, |s| s.tokens.is_loaded()).await;

        orch.dispatch(AppAction::TokenSelected(0));
        // Hammer the scheduler while the token-scoped fetches are pending.
        for _ in 0..20 {
            orch.dispatch(AppAction::Error("noise".into()));
        }
        wait_for(&orch, |s| s.features.is_loaded() && s.tokenholders.is_loaded()).await;

        assert_eq!(ledger.calls("feature_status"), 1);
        assert_eq!(ledger.calls("tokenholders"), 1);
        assert_eq!(ledger.calls("tokens"), 1);
        assert_eq!(ledger.calls("reservations"), 1);
    }

    #[tokio::test]
    async fn test_invalidation_refetches() {
        let ledger = Arc::new(FakeLedger::new());
        let orch = orchestrator_with(42, ledger.clone());
        orch.start();
        wait_for(&orch, |s| s.reservations.is_loaded()).await;
        assert_eq!(ledger.calls("reservations"), 1);

        ledger.set_reservations(vec![reservation("FRESH")]);
        orch.dispatch(AppAction::AsyncComplete(
            crate::action::StatePatch::new()
                .with_reservations(crate::remote::Remote::Unknown),
        ));

        wait_for(&orch, |s| {
            s.reservations
                .as_loaded()
                .is_some_and(|r| r.len() == 1 && r[0].symbol == "FRESH")
        })
        .await;
        assert_eq!(ledger.calls("reservations"), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_surfaces_message_and_does_not_retry() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.fail_next("tokens", "timed out");
        ledger.fail_next("reservations", "timed out");
        let orch = orchestrator_with(42, ledger.clone());
        orch.start();

        wait_for(&orch, |s| s.error.is_some()).await;

        let state = orch.state();
        assert_eq!(state.error.as_deref(), Some("transport failure: timed out"));
        // The cells stay Loading; no automatic retry fires.
        assert!(state.tokens.is_loading());
        assert!(state.reservations.is_loading());
        assert_eq!(ledger.calls("tokens"), 1);
        assert_eq!(ledger.calls("reservations"), 1);
    }
}
