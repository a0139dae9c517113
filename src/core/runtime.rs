//! # Runtime: wires the dispatcher, the sequence scheduler and diagnostics.
//!
//! The [`Runtime`] owns the [`EventManager`], the [`SequenceManager`] and the
//! diagnostics [`Bus`]. The external clock drives it through [`Runtime::tick`].
//!
//! ## High-level architecture
//! ```text
//! Build:
//!   Runtime::builder(cfg).event::<E>("name")... .build()
//!     ├─ EventCatalog (TickEvent = "tick" always present)
//!     ├─ EventManager  (one empty hook list per declared type)
//!     ├─ SequenceManager ── hook on TickEvent @ priority::FIRST
//!     └─ subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Diagnostic)
//!
//! Tick:
//!   clock ──► Runtime::tick() ──► dispatch(TickEvent)
//!                                   ├─ SequenceManager::tick()   (first)
//!                                   └─ user hooks on TickEvent   (then)
//!
//! Diagnostic flow:
//!   EventManager / TaskGroup / SequenceManager ── publish ──► Bus ──┬──► SubscriberSet
//!                                                                  └──► diagnostics() receivers
//!
//! Shutdown:
//!   halt dispatch ─► cancel every sequence ─► flush one scheduler tick ─► stop subscriber workers
//! ```
//!
//! ## Example
//! ```rust
//! use tickvisor::{impl_event, priority, Config, EventFlags, ListenerRef, Runtime, Toggle};
//!
//! #[derive(Clone, Default)]
//! struct Attack { flags: EventFlags, target: u32 }
//! impl_event!(Attack, cancellable);
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rt = Runtime::builder(Config::default())
//!         .event::<Attack>("attack")
//!         .build()?;
//!
//!     let criticals: ListenerRef = Toggle::new("criticals");
//!     rt.sequence_handler(&criticals, priority::NORMAL, |seq, ev: Attack| async move {
//!         seq.wait_ticks(2).await;
//!         println!("follow-up on {}", ev.target);
//!         Ok(())
//!     })?;
//!
//!     rt.dispatch(Attack { target: 7, ..Default::default() })?;
//!     rt.tick();
//!     rt.tick();
//!
//!     rt.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, error};

use super::{builder::RuntimeBuilder, Config};
use crate::{
    dispatch::{EventManager, HookRef},
    error::{DispatchError, TaskError},
    events::{Event, EventCatalog, TickEvent},
    listener::{Listener, ListenerRef},
    observe::{Bus, Diagnostic, SubscriberSet},
    sequence::{Sequence, SequenceManager, TickReport},
};

/// Owns the dispatcher, the sequence scheduler and the diagnostics bus.
pub struct Runtime {
    /// Global runtime configuration.
    pub cfg: Config,
    bus: Bus,
    subs: Option<Arc<SubscriberSet>>,
    events: Arc<EventManager>,
    sequences: Arc<SequenceManager>,
    handle: Handle,
    ticks: AtomicU64,
}

impl Runtime {
    /// Starts building a runtime.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Option<Arc<SubscriberSet>>,
        events: Arc<EventManager>,
        sequences: Arc<SequenceManager>,
        handle: Handle,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            events,
            sequences,
            handle,
            ticks: AtomicU64::new(0),
        }
    }

    /// Forwards diagnostics to the subscriber set (fire-and-forget).
    ///
    /// Subscriber panic records are not re-delivered to subscribers.
    pub(super) fn subscriber_listener(&self) {
        let Some(set) = self.subs.clone() else {
            return;
        };
        let mut rx = self.bus.subscribe();
        self.handle.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(d) if d.is_subscriber_panic() => {}
                    Ok(d) => set.emit(&d),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped = skipped, "diagnostic fan-out lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// The dispatcher.
    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    /// The sequence scheduler.
    pub fn sequences(&self) -> &Arc<SequenceManager> {
        &self.sequences
    }

    /// The closed set of dispatchable event types.
    pub fn catalog(&self) -> &EventCatalog {
        self.events.catalog()
    }

    /// Default execution context of async work.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Subscribes to diagnostics published from now on.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.bus.subscribe()
    }

    /// Number of ticks dispatched so far.
    pub fn current_tick(&self) -> u64 {
        self.ticks.load(AtomicOrdering::Relaxed)
    }

    /// Dispatches the next [`TickEvent`] and returns the scheduler's report.
    ///
    /// After [`shutdown`](Self::shutdown) the tick is not dispatched and an
    /// empty report is returned. The report is also empty when the scheduler
    /// hook did not run for this tick (it was unregistered, or the tick was
    /// re-entrant).
    pub fn tick(&self) -> TickReport {
        let tick = self.ticks.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        if self.events.is_halted() {
            return TickReport::default();
        }
        let before = self.sequences.current_tick();
        if let Err(err) = self.events.dispatch(TickEvent::new(tick)) {
            error!(label = err.as_label(), "tick dispatch failed: {err}");
            return TickReport::default();
        }
        let report = self.sequences.last_report();
        if report.tick > before {
            report
        } else {
            TickReport::default()
        }
    }

    /// Shorthand for [`EventManager::dispatch`].
    pub fn dispatch<E: Event>(&self, event: E) -> Result<E, DispatchError> {
        self.events.dispatch(event)
    }

    /// Starts a sequence owned by `owner`; see [`SequenceManager::start`].
    pub fn start_sequence<F, Fut>(&self, owner: &ListenerRef, body: F) -> Sequence
    where
        F: FnOnce(Sequence) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.sequences.start(owner, body)
    }

    /// Registers a hook on `E` that starts one sequence per dispatched event.
    ///
    /// The sequence starts synchronously inside `dispatch` and receives its
    /// own clone of the event.
    pub fn sequence_handler<E, F, Fut>(
        &self,
        owner: &ListenerRef,
        priority: i16,
        body: F,
    ) -> Result<HookRef<E>, DispatchError>
    where
        E: Event + Clone,
        F: Fn(Sequence, E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let sequences = Arc::clone(&self.sequences);
        let starter = owner.clone();
        self.events.handler(owner, priority, move |ev: &mut E| {
            let ev = ev.clone();
            sequences.start(&starter, |seq| body(seq, ev));
            Ok(())
        })
    }

    /// Unregisters every hook of `listener` and disposes its task group.
    ///
    /// Returns the number of hooks removed.
    pub fn dispose_listener(&self, listener: &dyn Listener) -> usize {
        let removed = self.events.unregister_listener(listener);
        listener.scope().dispose();
        removed
    }

    /// Stops the runtime.
    ///
    /// 1. Halts dispatching (every later `dispatch` is a no-op)
    /// 2. Cancels every sequence and runs one scheduler pass so their
    ///    cancellation callbacks fire
    /// 3. Stops subscriber workers after they drained their queues
    pub async fn shutdown(&self) {
        self.events.halt();
        self.sequences.cancel_all();
        self.sequences.tick();
        if let Some(subs) = &self.subs {
            subs.shutdown().await;
        }
        debug!("runtime stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::dispatch::{priority, SuspendSpec};
    use crate::error::{HandlerError, RuntimeError};
    use crate::events::EventFlags;
    use crate::listener::Toggle;
    use crate::observe::{DiagnosticKind, Subscribe};

    #[derive(Clone, Default)]
    struct Swing {
        flags: EventFlags,
        id: u32,
    }
    crate::impl_event!(Swing);

    fn runtime() -> Arc<Runtime> {
        Runtime::builder(Config::default())
            .event::<Swing>("swing")
            .build()
            .unwrap()
    }

    fn swing(id: u32) -> Swing {
        Swing {
            id,
            ..Default::default()
        }
    }

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn tick_hooks_run_by_descending_priority() {
        let rt = runtime();
        let log = Arc::new(Mutex::new(Vec::new()));

        for (name, prio) in [("Logger", 1), ("Blocker", 10)] {
            let owner: ListenerRef = Toggle::new(name);
            let log = Arc::clone(&log);
            rt.events()
                .handler(&owner, prio, move |_: &mut TickEvent| {
                    log.lock().push(name);
                    Ok(())
                })
                .unwrap();
        }

        rt.tick();
        assert_eq!(*log.lock(), ["Blocker", "Logger"]);
    }

    #[tokio::test]
    async fn sequence_started_at_tick_100_resumes_at_103() {
        let rt = runtime();
        let owner: ListenerRef = Toggle::new("owner");
        for _ in 0..100 {
            rt.tick();
        }
        assert_eq!(rt.current_tick(), 100);

        let resumed = Arc::new(AtomicU64::new(0));
        let clock = Arc::clone(&rt);
        let at = Arc::clone(&resumed);
        let seq = rt.start_sequence(&owner, move |seq| async move {
            seq.wait_ticks(3).await;
            at.store(clock.current_tick(), AtomicOrdering::SeqCst);
            Ok(())
        });

        rt.tick();
        rt.tick();
        assert_eq!(resumed.load(AtomicOrdering::SeqCst), 0);
        rt.tick();
        assert_eq!(resumed.load(AtomicOrdering::SeqCst), 103);
        assert!(seq.is_finished());
    }

    #[tokio::test]
    async fn sequence_started_by_a_tick_hook_resumes_next_tick() {
        let rt = runtime();
        let owner: ListenerRef = Toggle::new("owner");
        let resumed = Arc::new(AtomicU64::new(0));

        let sequences = Arc::clone(rt.sequences());
        let hook_owner = owner.clone();
        let at = Arc::clone(&resumed);
        rt.events()
            .handler(&owner, priority::NORMAL, move |ev: &mut TickEvent| {
                if ev.tick == 5 {
                    let clock = Arc::clone(&sequences);
                    let at = Arc::clone(&at);
                    sequences.start(&hook_owner, move |seq| async move {
                        seq.sync().await;
                        at.store(clock.current_tick(), AtomicOrdering::SeqCst);
                        Ok(())
                    });
                }
                Ok(())
            })
            .unwrap();

        for _ in 0..5 {
            rt.tick();
        }
        assert_eq!(resumed.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(rt.sequences().pending_count(), 1);

        let report = rt.tick();
        assert_eq!(report.admitted, 1);
        assert_eq!(resumed.load(AtomicOrdering::SeqCst), 6);
    }

    #[tokio::test]
    async fn tick_without_the_scheduler_hook_reports_nothing() {
        let rt = runtime();
        let owner: ListenerRef = Toggle::new("owner");
        rt.start_sequence(&owner, |seq| async move {
            seq.wait_ticks(100).await;
            Ok(())
        });

        let report = rt.tick();
        assert_eq!(report.tick, 1);
        assert_eq!(report.admitted, 1);

        rt.events().unregister_all();
        assert_eq!(rt.tick(), TickReport::default());
        assert_eq!(rt.current_tick(), 2);
        assert_eq!(rt.sequences().current_tick(), 1);
    }

    #[tokio::test]
    async fn cancel_previous_leaves_only_the_newest_task() {
        let rt = runtime();
        let owner: ListenerRef = Toggle::new("owner");
        let started = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&started);
        rt.events()
            .suspend_handler(&owner, SuspendSpec::cancel_previous(), move |ev: Swing| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().push(ev.id);
                    std::future::pending::<()>().await;
                    Ok(())
                }
            })
            .unwrap();

        rt.dispatch(swing(1)).unwrap();
        settle().await;
        rt.tick();
        rt.dispatch(swing(2)).unwrap();
        settle().await;
        rt.tick();

        assert_eq!(*started.lock(), [1, 2]);
        assert_eq!(owner.scope().task_group().active(), 1);
    }

    #[tokio::test]
    async fn stopped_owner_interrupts_wait_until() {
        let rt = runtime();
        let toggle = Toggle::new("scaffold");
        let owner: ListenerRef = toggle.clone();
        let checks = Arc::new(AtomicU32::new(0));
        let interrupted = Arc::new(AtomicBool::new(false));

        let counter = Arc::clone(&checks);
        let seq = rt.start_sequence(&owner, move |seq| async move {
            seq.wait_until(|| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                false
            })
            .await;
            Ok(())
        });
        let flag = Arc::clone(&interrupted);
        seq.on_cancellation(move || flag.store(true, AtomicOrdering::SeqCst));

        rt.tick();
        assert_eq!(checks.load(AtomicOrdering::SeqCst), 2);

        toggle.disable();
        rt.tick();
        assert_eq!(checks.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(
            seq.outcome(),
            Some(Err(TaskError::ListenerStopped {
                listener: "scaffold".into()
            }))
        );
        assert!(interrupted.load(AtomicOrdering::SeqCst));
    }

    #[tokio::test]
    async fn sequence_handler_starts_one_sequence_per_event() {
        let rt = runtime();
        let owner: ListenerRef = Toggle::new("criticals");
        let done = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&done);
        rt.sequence_handler(&owner, priority::NORMAL, move |seq, ev: Swing| {
            let log = Arc::clone(&log);
            async move {
                seq.wait_ticks(ev.id).await;
                log.lock().push(ev.id);
                Ok(())
            }
        })
        .unwrap();

        rt.dispatch(swing(2)).unwrap();
        rt.dispatch(swing(1)).unwrap();
        assert_eq!(rt.sequences().pending_count(), 2);

        let report = rt.tick();
        assert_eq!(report.admitted, 2);
        assert_eq!(*done.lock(), [1]);
        rt.tick();
        assert_eq!(*done.lock(), [1, 2]);
    }

    #[tokio::test]
    async fn dispose_listener_drops_hooks_and_tasks() {
        let rt = runtime();
        let owner: ListenerRef = Toggle::new("disposable");
        rt.events()
            .handler(&owner, priority::NORMAL, |_: &mut Swing| Ok(()))
            .unwrap();
        rt.events()
            .suspend_handler(&owner, SuspendSpec::parallel(), |_: Swing| async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .unwrap();

        rt.dispatch(swing(1)).unwrap();
        settle().await;
        assert_eq!(owner.scope().task_group().active(), 1);

        assert_eq!(rt.dispose_listener(owner.as_ref()), 2);
        settle().await;
        assert_eq!(owner.scope().task_group().active(), 0);
        assert_eq!(rt.events().hook_count::<Swing>().unwrap(), 0);
    }

    #[tokio::test]
    async fn shutdown_cancels_sequences_and_halts_dispatch() {
        let rt = runtime();
        let owner: ListenerRef = Toggle::new("owner");
        let cancelled = Arc::new(AtomicBool::new(false));
        let hits = Arc::new(AtomicU32::new(0));

        let seq = rt.start_sequence(&owner, |seq| async move {
            seq.wait_seconds(60).await;
            Ok(())
        });
        let flag = Arc::clone(&cancelled);
        seq.on_cancellation(move || flag.store(true, AtomicOrdering::SeqCst));
        let counter = Arc::clone(&hits);
        rt.events()
            .handler(&owner, priority::NORMAL, move |_: &mut Swing| {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(())
            })
            .unwrap();

        rt.shutdown().await;
        assert!(cancelled.load(AtomicOrdering::SeqCst));
        assert_eq!(seq.outcome(), Some(Err(TaskError::Canceled)));

        let ev = rt.dispatch(swing(1)).unwrap();
        assert!(!ev.is_completed());
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(rt.tick(), TickReport::default());
    }

    struct Collect(Arc<Mutex<Vec<DiagnosticKind>>>);

    #[async_trait]
    impl Subscribe for Collect {
        async fn on_diagnostic(&self, d: &Diagnostic) {
            self.0.lock().push(d.kind);
        }

        fn name(&self) -> &'static str {
            "collect"
        }
    }

    #[tokio::test]
    async fn subscribers_receive_hook_failures() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let rt = Runtime::builder(Config::default())
            .event::<Swing>("swing")
            .with_subscribers(vec![Arc::new(Collect(Arc::clone(&seen)))])
            .build()
            .unwrap();
        let owner: ListenerRef = Toggle::new("faulty");
        rt.events()
            .handler(&owner, priority::NORMAL, |_: &mut Swing| {
                Err(HandlerError::fail("broken"))
            })
            .unwrap();

        rt.dispatch(swing(1)).unwrap();
        settle().await;
        rt.shutdown().await;

        assert!(seen.lock().contains(&DiagnosticKind::HookFailed));
    }

    #[tokio::test]
    async fn duplicate_event_names_fail_the_build() {
        let err = Runtime::builder(Config::default())
            .event::<Swing>("Tick")
            .build()
            .err();
        assert!(matches!(
            err,
            Some(RuntimeError::Catalog(DispatchError::DuplicateEvent { .. }))
        ));
    }

    #[test]
    fn build_requires_a_tokio_runtime() {
        let err = Runtime::builder(Config::default()).build().err();
        assert_eq!(err, Some(RuntimeError::NoRuntime));
    }
}
