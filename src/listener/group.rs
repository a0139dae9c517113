//! # Per-listener task groups.
//!
//! Every asynchronous body (async handler task, ordered-handler consumer,
//! future awaited by a sequence) runs inside the [`TaskGroup`] of its owning
//! listener. The group is the failure boundary:
//!
//! ```text
//! Spawner::spawn(body)
//!   └─► handle.spawn(tracker.track_future(
//!          select! {
//!             token.cancelled()               → Canceled | ListenerStopped
//!             catch_unwind(Gate(owner, body)) → Ok | Fail | Panicked | ListenerStopped
//!          }
//!          └─► Reporter::task_finished       (logged once, never re-raised)
//!       ))
//! ```
//!
//! ## Rules
//! - A failing or panicking body never affects sibling tasks or the dispatcher.
//! - Cancellation is a signal: the body is dropped at its next suspension point.
//! - Closing the group (listener disposal) cancels every task; tasks spawned
//!   afterwards end immediately with `ListenerStopped`.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::gate::Gate;
use super::listener::ListenerRef;
use crate::error::TaskError;
use crate::observe::reporter::Reporter;

/// Cancellation domain of one listener.
#[derive(Debug)]
pub struct TaskGroup {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl TaskGroup {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Token cancelled when the group closes.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the owning listener was disposed.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of tasks that have not finished yet.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until the group is closed and every task has finished.
    pub async fn wait(&self) {
        self.tracker.wait().await;
    }

    pub(crate) fn close(&self) {
        self.token.cancel();
        self.tracker.close();
    }

    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }
}

/// Handle to one spawned task.
///
/// Dropping the handle detaches the task; it keeps running.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// True while the task has not finished.
    pub fn is_active(&self) -> bool {
        !self.join.is_finished()
    }

    /// Requests cancellation; the body is dropped at its next suspension point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the task to finish. Its outcome has already been reported.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}

/// Outcome for a body interrupted by its token.
pub(crate) fn interrupted(group: &CancellationToken, listener: &str) -> TaskError {
    if group.is_cancelled() {
        TaskError::ListenerStopped {
            listener: listener.to_string(),
        }
    } else {
        TaskError::Canceled
    }
}

/// Spawns bodies into the owner's task group on a fixed runtime handle.
#[derive(Clone)]
pub(crate) struct Spawner {
    owner: ListenerRef,
    handle: Handle,
    reporter: Reporter,
    origin: &'static str,
}

impl Spawner {
    pub(crate) fn new(
        owner: ListenerRef,
        handle: Handle,
        reporter: Reporter,
        origin: &'static str,
    ) -> Self {
        Self {
            owner,
            handle,
            reporter,
            origin,
        }
    }

    pub(crate) fn owner(&self) -> &ListenerRef {
        &self.owner
    }

    pub(crate) fn origin(&self) -> &'static str {
        self.origin
    }

    pub(crate) fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Spawns `body`; its outcome is reported when it ends.
    pub(crate) fn spawn<F>(&self, body: F) -> TaskHandle
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let group = self.owner.scope().task_group();
        let group_token = group.token().clone();
        let token = group_token.child_token();
        let task_token = token.clone();

        let owner = self.owner.clone();
        let reporter = self.reporter.clone();
        let origin = self.origin;
        let gated = Gate::new(owner.clone(), body);

        let join = self.handle.spawn(group.tracker().track_future(async move {
            let outcome = tokio::select! {
                biased;
                _ = task_token.cancelled() => Err(interrupted(&group_token, owner.name())),
                res = AssertUnwindSafe(gated).catch_unwind() => {
                    res.unwrap_or_else(|panic| Err(TaskError::from_panic(panic)))
                }
            };
            reporter.task_finished(owner.name(), origin, &outcome);
        }));

        TaskHandle { token, join }
    }

    /// Spawns `fut` for its value, outside the listener gate.
    ///
    /// Resolves to `Err(Canceled | ListenerStopped)` if the group closes first.
    pub(crate) fn spawn_value<T, F>(&self, fut: F) -> JoinHandle<Result<T, TaskError>>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let group = self.owner.scope().task_group();
        let group_token = group.token().clone();
        let owner = self.owner.clone();

        self.handle.spawn(group.tracker().track_future(async move {
            tokio::select! {
                biased;
                _ = group_token.cancelled() => Err(interrupted(&group_token, owner.name())),
                value = fut => Ok(value),
            }
        }))
    }
}
