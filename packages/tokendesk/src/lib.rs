//! # Tokendesk
//!
//! An event-driven orchestration core for a token dashboard: a reducer
//! decides, guarded triggers fetch, and async effects settle.
//!
//! ## Core Concepts
//!
//! Tokendesk separates **transitions** from **IO**:
//! - [`AppAction`] = Transitions (the only way state changes)
//! - Triggers and operations = IO (fetches and submissions, async, fallible)
//!
//! The key principle: **state is mutated only by the reducer**. Everything
//! else reads snapshots and dispatches actions.
//!
//! ## Architecture
//!
//! ```text
//! Presentation
//!     │
//!     ▼ dispatch(action)
//! Orchestrator
//!     │
//!     ├─► Store.dispatch() ─► reduce(state, action) ─► new state
//!     │
//!     └─► Scheduler.evaluate()
//!             │
//!             ├─ guard subset unchanged? ─► done
//!             │
//!             └─► satisfied trigger
//!                     │
//!                     ▼ effect::spawn
//!             AsyncStart { marks: guard ─► Loading }   (synchronous)
//!                     │
//!                     ▼ await remote operation
//!             AsyncComplete(patch)  or  Error(msg)     (exactly one)
//!                     │
//!                     └─► dispatch ──────────────────────┐
//!                                                        ▼
//!                                              (loop continues)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **The reducer is pure** - No IO, no clocks; a total function over a
//!    closed action enum
//! 2. **Three-phase cells** - Every remote collection is
//!    Unknown / Loading / Loaded; Unknown is never Loaded-and-empty
//! 3. **Invalidation is refetch** - Resetting a cell to Unknown makes the
//!    scheduler fetch it again; nothing refetches by hand
//! 4. **At most one fetch in flight per cell** - The start action marks the
//!    guard cell Loading before the fetch task first suspends
//! 5. **Exactly one terminal action per operation** - Started operations
//!    always settle; there is no cancellation
//! 6. **Fail fast on foreign actions** - A type-erased action of the wrong
//!    kind panics, naming the kind
//!
//! ## Guarantees
//!
//! - Dispatches apply strictly in dispatch order
//! - Operations may settle in any order; each settles exactly once
//! - A failed connect is fatal for the session; no downstream trigger fires
//!
//! The presentation layer is out of scope: this crate exposes state
//! snapshots, a change signal, and dispatch, nothing else.

pub mod action;
pub mod config;
pub mod effect;
pub mod error;
pub mod ledger;
pub mod model;
pub mod ops;
pub mod reducer;
pub mod remote;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod whitelist;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use action::{AnyAction, AppAction, AsyncLifecycle, StatePatch};
pub use config::{NetworkConfig, NetworkDirectory, NetworkId, UNSUPPORTED_NETWORK_MESSAGE};
pub use error::{ConnectError, LedgerError, ValidationError};
pub use ledger::{Environment, LedgerClient, LedgerConnector, Submittable};
pub use remote::{Phase, Remote};
pub use runtime::Orchestrator;
pub use state::{AppState, ConnectionStatus};
pub use store::Store;
pub use whitelist::{
    DateField, FormAction, TokenholderDraft, TxStatus, WhitelistForm, WhitelistFormState,
};
