//! Three-state cache cell for remotely fetched data.
//!
//! Every collection the dashboard pulls from the ledger lives in a
//! [`Remote`] cell. The three phases are deliberately distinct:
//!
//! - **Unknown**: never fetched, or invalidated — a trigger must refetch
//! - **Loading**: a fetch is in flight — no trigger may start another
//! - **Loaded**: a concrete (possibly empty) value is present
//!
//! `Unknown` is never equal to `Loaded` of an empty collection; consumers
//! can always tell "not fetched yet" from "fetched and empty". Resetting a
//! cell to `Unknown` is the invalidation protocol: it is how one part of
//! the system asks the scheduler to refetch on its behalf.

/// The phase of a [`Remote`] cell, with the payload stripped.
///
/// Used by the scheduler to diff the guard subset of the state between
/// transitions without comparing loaded payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not fetched, or invalidated.
    Unknown,
    /// A fetch is in flight.
    Loading,
    /// A value is present.
    Loaded,
}

/// A remotely fetched value in one of three phases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Remote<T> {
    /// Not yet fetched; a guarded trigger must fetch it.
    #[default]
    Unknown,
    /// A fetch is in flight; no second fetch may start.
    Loading,
    /// Fetched. The payload may be empty — that is still `Loaded`.
    Loaded(T),
}

impl<T> Remote<T> {
    /// Returns true if the value has never been fetched (or was invalidated).
    pub fn is_unknown(&self) -> bool {
        matches!(self, Remote::Unknown)
    }

    /// Returns true if a fetch is currently in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Remote::Loading)
    }

    /// Returns true if a value is present.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Remote::Loaded(_))
    }

    /// The payload-free phase of this cell.
    pub fn phase(&self) -> Phase {
        match self {
            Remote::Unknown => Phase::Unknown,
            Remote::Loading => Phase::Loading,
            Remote::Loaded(_) => Phase::Loaded,
        }
    }

    /// Borrow the loaded value, if any.
    pub fn as_loaded(&self) -> Option<&T> {
        match self {
            Remote::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Consume the cell and return the loaded value, if any.
    pub fn into_loaded(self) -> Option<T> {
        match self {
            Remote::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// Map the loaded value, preserving the phase otherwise.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Remote<U> {
        match self {
            Remote::Unknown => Remote::Unknown,
            Remote::Loading => Remote::Loading,
            Remote::Loaded(value) => Remote::Loaded(f(value)),
        }
    }
}
