//! The async action wrapper.
//!
//! Every remote operation runs through here and produces exactly one
//! terminal action: `completed(patch)` on success, `failed(message)` on
//! error. There is no deduplication and no cancellation; once the start
//! action is dispatched the terminal action always follows.
//!
//! [`spawn`] dispatches the start action synchronously, before the
//! operation's task is spawned. Guard fields marked Loading in the start
//! action are therefore visible to any trigger evaluation that runs before
//! the operation first suspends, which is what makes duplicate fetches
//! structurally impossible.
//!
//! Errors inside operations travel as `anyhow::Error` and are rendered to a
//! single message here; the error value itself never crosses the dispatch
//! boundary.

use std::future::Future;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::action::AsyncLifecycle;

/// Run an operation inline: dispatch `start`, await, dispatch the terminal.
pub async fn run<A, D, F>(dispatch: &D, start: A, operation: F)
where
    A: AsyncLifecycle,
    D: Fn(A),
    F: Future<Output = anyhow::Result<A::Patch>>,
{
    let op_id = Uuid::new_v4();
    debug!(%op_id, kind = start.kind(), "operation started");
    dispatch(start);
    settle(dispatch, op_id, operation).await;
}

/// Dispatch `start` synchronously, then run the operation on its own task.
///
/// The returned handle is for tests and shutdown sequencing; dropping it
/// does not cancel the operation.
pub fn spawn<A, D, F>(dispatch: D, start: A, operation: F) -> tokio::task::JoinHandle<()>
where
    A: AsyncLifecycle,
    A::Patch: Send,
    D: Fn(A) + Send + Sync + 'static,
    F: Future<Output = anyhow::Result<A::Patch>> + Send + 'static,
{
    let op_id = Uuid::new_v4();
    debug!(%op_id, kind = start.kind(), "operation started");
    dispatch(start);
    tokio::spawn(async move {
        settle(&dispatch, op_id, operation).await;
    })
}

async fn settle<A, D, F>(dispatch: &D, op_id: Uuid, operation: F)
where
    A: AsyncLifecycle,
    D: Fn(A),
    F: Future<Output = anyhow::Result<A::Patch>>,
{
    match operation.await {
        Ok(patch) => {
            debug!(%op_id, "operation completed");
            dispatch(A::completed(patch));
        }
        Err(err) => {
            warn!(%op_id, error = %err, "operation failed");
            dispatch(A::failed(err.to_string()));
        }
    }
}
