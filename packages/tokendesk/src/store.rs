//! Ordered action dispatch over a single state cell.
//!
//! A store owns one state value and one reducer. Dispatches take a mutex,
//! so transitions apply strictly in dispatch order; readers get snapshots.
//! A watch channel carries a change counter so observers can await "state
//! changed" without polling.

use std::any::Any;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::debug;

use crate::action::AnyAction;

pub struct Store<S, A> {
    name: &'static str,
    state: Mutex<S>,
    reducer: fn(S, A) -> S,
    changed: watch::Sender<u64>,
}

impl<S, A> Store<S, A>
where
    S: Default + Clone + Send + 'static,
    A: AnyAction,
{
    pub fn new(name: &'static str, reducer: fn(S, A) -> S) -> Self {
        let (changed, _) = watch::channel(0);
        Store {
            name,
            state: Mutex::new(S::default()),
            reducer,
            changed,
        }
    }

    /// Apply one action through the reducer.
    pub fn dispatch(&self, action: A) {
        let kind = action.kind();
        {
            let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let current = std::mem::take(&mut *guard);
            *guard = (self.reducer)(current, action);
        }
        debug!(store = self.name, action = kind, "dispatched");
        self.changed.send_modify(|generation| *generation += 1);
    }

    /// Apply a type-erased action.
    ///
    /// Panics, naming the kind, if the action does not belong to this
    /// store's taxonomy. A foreign action reaching a store is a programming
    /// error; silently ignoring it would hide the bug.
    pub fn dispatch_erased(&self, action: Box<dyn AnyAction>) {
        let kind = action.kind();
        let any: Box<dyn Any + Send> = action.into_any();
        match any.downcast::<A>() {
            Ok(action) => self.dispatch(*action),
            Err(_) => panic!("unrecognized action kind \"{kind}\""),
        }
    }

    /// A clone of the current state.
    pub fn snapshot(&self) -> S {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Read the current state in place.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    /// A receiver whose value bumps after every dispatch.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum CounterAction {
        Add(i64),
        Reset,
    }

    impl AnyAction for CounterAction {
        fn kind(&self) -> &'static str {
            match self {
                CounterAction::Add(_) => "ADD",
                CounterAction::Reset => "RESET",
            }
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
            self
        }
    }

    struct ForeignAction;

    impl AnyAction for ForeignAction {
        fn kind(&self) -> &'static str {
            "FOREIGN_THING"
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
            self
        }
    }

    fn reduce_counter(state: i64, action: CounterAction) -> i64 {
        match action {
            CounterAction::Add(n) => state + n,
            CounterAction::Reset => 0,
        }
    }

    #[test]
    fn test_dispatch_applies_in_order() {
        let store = Store::new("counter", reduce_counter);
        store.dispatch(CounterAction::Add(5));
        store.dispatch(CounterAction::Add(3));
        store.dispatch(CounterAction::Reset);
        store.dispatch(CounterAction::Add(1));
        assert_eq!(store.snapshot(), 1);
    }

    #[test]
    fn test_subscribe_sees_every_dispatch() {
        let store = Store::new("counter", reduce_counter);
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), 0);
        store.dispatch(CounterAction::Add(1));
        store.dispatch(CounterAction::Add(1));
        assert_eq!(*rx.borrow(), 2);
    }

    #[test]
    fn test_dispatch_erased_accepts_own_actions() {
        let store = Store::new("counter", reduce_counter);
        store.dispatch_erased(Box::new(CounterAction::Add(7)));
        assert_eq!(store.snapshot(), 7);
    }

    #[test]
    #[should_panic(expected = "unrecognized action kind \"FOREIGN_THING\"")]
    fn test_dispatch_erased_rejects_foreign_kind() {
        let store = Store::new("counter", reduce_counter);
        store.dispatch_erased(Box::new(ForeignAction));
    }
}
