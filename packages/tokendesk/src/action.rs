//! The closed action taxonomy and the patch type terminal actions carry.
//!
//! Actions are the only way state changes. The taxonomy is closed: every
//! kind is a variant, matched exhaustively in the reducer. The type-erased
//! seam ([`AnyAction`]) exists so a store can reject an action belonging to
//! a different store by name instead of silently ignoring it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ledger::LedgerClient;
use crate::model::{DelegateRecord, FeatureMap, Reservation, Role, TokenSummary, Tokenholder};
use crate::remote::Remote;
use crate::state::AppState;

/// A type-erased action: a stable kind name plus downcast access.
///
/// Stores accept erased actions at their outer boundary and fail fast,
/// naming the kind, when the concrete type is not theirs.
pub trait AnyAction: Send + 'static {
    /// Stable uppercase kind tag, unique within the owning action family.
    fn kind(&self) -> &'static str;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

/// A partial update to the cached fields of [`AppState`].
///
/// Only populated slots are applied; everything else is left untouched.
/// Setting a slot to `Remote::Unknown` is the invalidation protocol: the
/// scheduler will refetch it on the next evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatePatch {
    pub reservations: Option<Remote<Vec<Reservation>>>,
    pub tokens: Option<Remote<Vec<TokenSummary>>>,
    pub features: Option<Remote<FeatureMap>>,
    pub permissions_enabled: Option<Remote<bool>>,
    pub available_roles: Option<Remote<Vec<Role>>>,
    pub delegate_records: Option<Remote<Vec<DelegateRecord>>>,
    pub tokenholders: Option<Remote<Vec<Tokenholder>>>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reservations(mut self, value: Remote<Vec<Reservation>>) -> Self {
        self.reservations = Some(value);
        self
    }

    pub fn with_tokens(mut self, value: Remote<Vec<TokenSummary>>) -> Self {
        self.tokens = Some(value);
        self
    }

    pub fn with_features(mut self, value: Remote<FeatureMap>) -> Self {
        self.features = Some(value);
        self
    }

    pub fn with_permissions_enabled(mut self, value: Remote<bool>) -> Self {
        self.permissions_enabled = Some(value);
        self
    }

    pub fn with_available_roles(mut self, value: Remote<Vec<Role>>) -> Self {
        self.available_roles = Some(value);
        self
    }

    pub fn with_delegate_records(mut self, value: Remote<Vec<DelegateRecord>>) -> Self {
        self.delegate_records = Some(value);
        self
    }

    pub fn with_tokenholders(mut self, value: Remote<Vec<Tokenholder>>) -> Self {
        self.tokenholders = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &StatePatch::default()
    }

    /// Merge the populated slots into `state`.
    pub fn apply(self, mut state: AppState) -> AppState {
        if let Some(value) = self.reservations {
            state.reservations = value;
        }
        if let Some(value) = self.tokens {
            state.tokens = value;
        }
        if let Some(value) = self.features {
            state.features = value;
        }
        if let Some(value) = self.permissions_enabled {
            state.permissions_enabled = value;
        }
        if let Some(value) = self.available_roles {
            state.available_roles = value;
        }
        if let Some(value) = self.delegate_records {
            state.delegate_records = value;
        }
        if let Some(value) = self.tokenholders {
            state.tokenholders = value;
        }
        state
    }
}

/// Root action taxonomy.
#[derive(Clone)]
pub enum AppAction {
    /// Connection sequence has begun.
    InitStart,
    /// Connection established; the handle is created exactly once.
    InitSuccess {
        network_id: i64,
        wallet_address: String,
        handle: Arc<dyn LedgerClient>,
    },
    /// Connection failed; fatal for the session.
    ConnectionError(String),
    /// An async operation started. `marks` moves the operation's guard
    /// fields to Loading in the same reducer step that raises the loading
    /// flag.
    AsyncStart { message: String, marks: StatePatch },
    /// An async operation succeeded; merge its result.
    AsyncComplete(StatePatch),
    /// An async operation failed; surface the message, clear transients.
    Error(String),
    /// The user picked a token; role-scoped caches are invalidated.
    TokenSelected(usize),
}

impl fmt::Debug for AppAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppAction::InitStart => write!(f, "InitStart"),
            AppAction::InitSuccess {
                network_id,
                wallet_address,
                ..
            } => f
                .debug_struct("InitSuccess")
                .field("network_id", network_id)
                .field("wallet_address", wallet_address)
                .finish_non_exhaustive(),
            AppAction::ConnectionError(msg) => f.debug_tuple("ConnectionError").field(msg).finish(),
            AppAction::AsyncStart { message, marks } => f
                .debug_struct("AsyncStart")
                .field("message", message)
                .field("marks", marks)
                .finish(),
            AppAction::AsyncComplete(patch) => f.debug_tuple("AsyncComplete").field(patch).finish(),
            AppAction::Error(msg) => f.debug_tuple("Error").field(msg).finish(),
            AppAction::TokenSelected(index) => f.debug_tuple("TokenSelected").field(index).finish(),
        }
    }
}

impl AnyAction for AppAction {
    fn kind(&self) -> &'static str {
        match self {
            AppAction::InitStart => "INIT_START",
            AppAction::InitSuccess { .. } => "INIT_SUCCESS",
            AppAction::ConnectionError(_) => "CONNECTION_ERROR",
            AppAction::AsyncStart { .. } => "ASYNC_START",
            AppAction::AsyncComplete(_) => "ASYNC_COMPLETE",
            AppAction::Error(_) => "ERROR",
            AppAction::TokenSelected(_) => "TOKEN_SELECTED",
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// An action family with a started/completed/failed lifecycle, usable with
/// the async wrapper in [`crate::effect`].
///
/// Implementors provide the two terminal constructors; the start action is
/// built by the caller because it carries operation-specific guard marks.
pub trait AsyncLifecycle: AnyAction + Sized {
    /// What a successful operation yields.
    type Patch: Send + 'static;

    fn completed(patch: Self::Patch) -> Self;
    fn failed(message: String) -> Self;
}

impl AsyncLifecycle for AppAction {
    type Patch = StatePatch;

    fn completed(patch: StatePatch) -> Self {
        AppAction::AsyncComplete(patch)
    }

    fn failed(message: String) -> Self {
        AppAction::Error(message)
    }
}
