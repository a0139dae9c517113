//! # Async handlers.
//!
//! [`EventManager::suspend_handler`] registers an ordinary synchronous hook
//! whose only job is to hand a **clone** of the event to an asynchronous body
//! according to a [`Behavior`]:
//!
//! ```text
//! dispatch(ev) ─► hook ─┬─ Parallel       → spawn(body(ev))
//!                       ├─ Ordered        → queue.push(ev) ─► consumer: body(e1); body(e2); ...
//!                       ├─ CancelPrevious → cancel(slot); slot = spawn(body(ev))
//!                       └─ DiscardLatest  → slot active ? drop(ev) : slot = spawn(body(ev))
//! ```
//!
//! The hook itself never blocks the dispatching thread. Bodies run in the
//! owner's task group: a body failure is reported and never propagates to the
//! dispatcher or to other bodies.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use super::behavior::{Behavior, SuspendSpec};
use super::hook::{Hook, HookRef};
use super::manager::EventManager;
use super::slot::{ActiveSlot, OrderedSlot, QueueRx};
use crate::error::{DispatchError, TaskError};
use crate::events::Event;
use crate::listener::group::Spawner;
use crate::listener::ListenerRef;

impl EventManager {
    /// Registers an asynchronous handler for `E`.
    ///
    /// `body` receives its own clone of each event; mutations it makes are not
    /// visible to the dispatcher. Returns the underlying hook so it can be
    /// unregistered like any other.
    ///
    /// # Example
    /// ```rust
    /// use tickvisor::{impl_event, Config, EventFlags, ListenerRef, Runtime, SuspendSpec, Toggle};
    ///
    /// #[derive(Clone, Default)]
    /// struct Packet { flags: EventFlags, id: u32 }
    /// impl_event!(Packet);
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let rt = Runtime::builder(Config::default()).event::<Packet>("packet").build()?;
    /// let owner: ListenerRef = Toggle::new("replay");
    ///
    /// rt.events().suspend_handler(&owner, SuspendSpec::ordered(), |ev: Packet| async move {
    ///     tokio::task::yield_now().await;
    ///     println!("handled packet {}", ev.id);
    ///     Ok(())
    /// })?;
    /// rt.events().dispatch(Packet { id: 1, ..Default::default() })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn suspend_handler<E, F, Fut>(
        &self,
        owner: &ListenerRef,
        spec: SuspendSpec,
        body: F,
    ) -> Result<HookRef<E>, DispatchError>
    where
        E: Event + Clone,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        // Fail before building anything for an unknown type.
        self.hooks::<E>()?;

        let spawner = Spawner::new(
            owner.clone(),
            spec.handle.unwrap_or_else(|| self.handle.clone()),
            self.reporter.clone(),
            self.event_name::<E>(),
        );
        let body = Arc::new(body);

        let hook = match spec.behavior {
            Behavior::Parallel => Hook::new(owner.clone(), spec.priority, move |ev: &mut E| {
                spawner.spawn(body(ev.clone()));
                Ok(())
            }),
            Behavior::Ordered => {
                let slot = Arc::new(OrderedSlot::new(self.ordered_capacity));
                Hook::new(owner.clone(), spec.priority, move |ev: &mut E| {
                    let accepted = slot.push(ev.clone(), |rx| {
                        spawner.spawn(consume(rx, Arc::clone(&body), spawner.clone()));
                    });
                    if !accepted {
                        spawner.reporter().queue_overflow(
                            spawner.owner().name(),
                            spawner.origin(),
                            slot.capacity().unwrap_or_default(),
                        );
                    }
                    Ok(())
                })
            }
            Behavior::CancelPrevious => {
                let slot = ActiveSlot::new();
                Hook::new(owner.clone(), spec.priority, move |ev: &mut E| {
                    slot.replace(|| spawner.spawn(body(ev.clone())));
                    Ok(())
                })
            }
            Behavior::DiscardLatest => {
                let slot = ActiveSlot::new();
                Hook::new(owner.clone(), spec.priority, move |ev: &mut E| {
                    if !slot.start_if_idle(|| spawner.spawn(body(ev.clone()))) {
                        spawner
                            .reporter()
                            .event_discarded(spawner.owner().name(), spawner.origin());
                    }
                    Ok(())
                })
            }
        };
        self.register(hook)
    }
}

/// Consumer of an ordered handler: one body at a time, in queue order.
///
/// A failing body is reported and the next event is still processed; a
/// cancelled body ends the consumer (its queue is then recreated on demand).
async fn consume<E, F, Fut>(
    mut rx: QueueRx<E>,
    body: Arc<F>,
    spawner: Spawner,
) -> Result<(), TaskError>
where
    F: Fn(E) -> Fut,
    Fut: Future<Output = Result<(), TaskError>>,
{
    while let Some(ev) = rx.recv().await {
        let outcome = AssertUnwindSafe(body(ev))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)));
        match outcome {
            Err(err) if err.is_cancellation() => return Err(err),
            Err(err) => spawner.reporter().task_finished(
                spawner.owner().name(),
                spawner.origin(),
                &Err(err),
            ),
            Ok(()) => {}
        }
    }
    Ok(())
}
