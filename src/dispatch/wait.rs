//! # Waiting for the next matching event.
//!
//! [`EventManager::wait_matches`] registers a temporary hook and resolves with
//! a clone of the first event accepted by the predicate. The hook is removed
//! as soon as the returned future completes **or is dropped**, so a cancelled
//! waiter never leaves a hook behind.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::hook::{Hook, HookRef};
use super::manager::EventManager;
use crate::error::{DispatchError, TaskError};
use crate::events::Event;
use crate::listener::ListenerRef;

/// Future returned by [`EventManager::wait_matches`].
#[must_use = "the temporary hook is removed when this future is dropped"]
pub struct WaitMatches<'a, E: Event> {
    manager: &'a EventManager,
    hook: HookRef<E>,
    rx: oneshot::Receiver<Result<E, TaskError>>,
}

impl<E: Event> Future for WaitMatches<'_, E> {
    type Output = Result<E, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(TaskError::Canceled)))
    }
}

impl<E: Event> Drop for WaitMatches<'_, E> {
    fn drop(&mut self) {
        self.manager.unregister(&self.hook);
    }
}

impl EventManager {
    /// Waits for the next `E` for which `predicate` returns `true`.
    ///
    /// The temporary hook is owned by `owner` (it only fires while the owner
    /// runs) and registered at `priority`. A panicking predicate resolves the
    /// wait with [`TaskError::Panicked`].
    pub fn wait_matches<E, P>(
        &self,
        owner: &ListenerRef,
        priority: i16,
        predicate: P,
    ) -> Result<WaitMatches<'_, E>, DispatchError>
    where
        E: Event + Clone,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));

        let hook = Hook::new(owner.clone(), priority, move |ev: &mut E| {
            let outcome = match catch_unwind(AssertUnwindSafe(|| predicate(ev))) {
                Ok(false) => return Ok(()),
                Ok(true) => Ok(ev.clone()),
                Err(panic) => Err(TaskError::from_panic(panic)),
            };
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(outcome);
            }
            Ok(())
        });
        let hook = self.register(hook)?;

        Ok(WaitMatches {
            manager: self,
            hook,
            rx,
        })
    }

    /// Like [`wait_matches`](Self::wait_matches), giving up after `timeout`.
    ///
    /// Resolves to `Ok(None)` on timeout; the temporary hook is removed either way.
    pub fn wait_matches_timeout<E, P>(
        &self,
        timeout: Duration,
        owner: &ListenerRef,
        priority: i16,
        predicate: P,
    ) -> Result<impl Future<Output = Result<Option<E>, TaskError>> + Send + '_, DispatchError>
    where
        E: Event + Clone,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let wait = self.wait_matches(owner, priority, predicate)?;
        Ok(async move {
            match tokio::time::timeout(timeout, wait).await {
                Ok(res) => res.map(Some),
                Err(_elapsed) => Ok(None),
            }
        })
    }
}
