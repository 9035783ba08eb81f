//! The orchestrator: one store, one scheduler, one public dispatch seam.
//!
//! Presentation code holds an `Arc<Orchestrator>`, dispatches actions, and
//! reads state snapshots. Every dispatch re-evaluates the scheduler, so
//! satisfied triggers fire immediately after the transition that satisfied
//! them.

use std::sync::Arc;

use tokio::sync::watch;

use crate::action::{AnyAction, AppAction};
use crate::config::NetworkDirectory;
use crate::ledger::{Environment, LedgerConnector};
use crate::reducer::reduce;
use crate::scheduler::Scheduler;
use crate::state::AppState;
use crate::store::Store;

pub struct Orchestrator {
    store: Store<AppState, AppAction>,
    scheduler: Scheduler,
}

impl Orchestrator {
    pub fn new(
        env: Arc<dyn Environment>,
        connector: Arc<dyn LedgerConnector>,
        networks: NetworkDirectory,
    ) -> Arc<Self> {
        Arc::new(Orchestrator {
            store: Store::new("app", reduce),
            scheduler: Scheduler::new(env, connector, networks),
        })
    }

    /// Run the first trigger evaluation. On a fresh state this fires the
    /// connect trigger; everything after that is driven by dispatches.
    pub fn start(self: &Arc<Self>) {
        self.scheduler.evaluate(self);
    }

    /// Apply an action, then re-evaluate the triggers.
    pub fn dispatch(self: &Arc<Self>, action: AppAction) {
        self.store.dispatch(action);
        self.scheduler.evaluate(self);
    }

    /// Apply a type-erased action. Panics on a foreign kind, naming it.
    pub fn dispatch_erased(self: &Arc<Self>, action: Box<dyn AnyAction>) {
        self.store.dispatch_erased(action);
        self.scheduler.evaluate(self);
    }

    /// An owned dispatch closure, for handing to spawned operations.
    pub fn dispatcher(self: &Arc<Self>) -> impl Fn(AppAction) + Send + Sync + 'static {
        let orch = self.clone();
        move |action| orch.dispatch(action)
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> AppState {
        self.store.snapshot()
    }

    /// A receiver whose value bumps after every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }
}
