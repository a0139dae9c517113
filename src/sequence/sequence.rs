//! # Tick-synchronized sequences.
//!
//! A [`Sequence`] is an asynchronous body whose suspension points are counted
//! in **ticks** of the external clock instead of wall-clock time. Bodies are
//! not spawned on tokio: the [`SequenceManager`](crate::SequenceManager) polls
//! them directly, on the dispatching thread, when their wait is over.
//!
//! ```text
//! body ── seq.wait_ticks(3).await ──► suspension { target = 3 }
//!                                           │
//! tick ─► elapsed = 1 ─► elapsed = 2 ─► elapsed = 3 ≥ target ─► poll(body)
//!                                                              ├─ owner stopped → ListenerStopped
//!                                                              └─ continue body
//! ```
//!
//! Futures that are not tick waits (a [`JoinHandle`], a channel, ...) may be
//! awaited too; their wake-ups are picked up on the next tick.
//!
//! ## Example
//! ```rust
//! use tickvisor::{Config, ListenerRef, Runtime, Toggle};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let rt = Runtime::builder(Config::default()).build()?;
//! let owner: ListenerRef = Toggle::new("auto-eat");
//!
//! let seq = rt.start_sequence(&owner, |seq| async move {
//!     seq.wait_ticks(2).await;
//!     Ok(())
//! });
//! rt.tick();
//! rt.tick();
//! assert!(seq.is_finished());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::task::{waker, ArcWake};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::{panic_info, TaskError};
use crate::events::TICKS_PER_SECOND;
use crate::listener::group::{interrupted, Spawner};
use crate::listener::ListenerRef;

/// Global counter for sequence identities.
static SEQUENCE_SEQ: AtomicU64 = AtomicU64::new(1);

type Body = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;
type Callback = Box<dyn FnOnce() + Send>;

/// Set by wakers handed to the body; checked once per tick.
struct WakeFlag(AtomicBool);

impl WakeFlag {
    fn take(&self) -> bool {
        self.0.swap(false, AtomicOrdering::AcqRel)
    }
}

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, AtomicOrdering::Release);
    }
}

/// A pending tick wait.
struct Suspension {
    id: u64,
    target: u32,
    waker: Waker,
}

struct Progress {
    elapsed: u32,
    suspension: Option<Suspension>,
    next_wait: u64,
}

pub(crate) struct Core {
    id: u64,
    owner: ListenerRef,
    spawner: Spawner,
    token: CancellationToken,
    group_token: CancellationToken,
    progress: Mutex<Progress>,
    body: Mutex<Option<Body>>,
    woken: Arc<WakeFlag>,
    finished: AtomicBool,
    outcome: Mutex<Option<Result<(), TaskError>>>,
    on_cancel: Mutex<Vec<Callback>>,
}

impl Core {
    pub(crate) fn install(&self, body: Body) {
        *self.body.lock() = Some(body);
    }

    /// Advances the sequence by one tick; returns `true` if the body was polled.
    pub(crate) fn on_tick(&self) -> bool {
        if self.token.is_cancelled() {
            self.complete(Err(interrupted(&self.group_token, self.owner.name())));
            return false;
        }

        let due = {
            let mut progress = self.progress.lock();
            progress.elapsed = progress.elapsed.saturating_add(1);
            let elapsed = progress.elapsed;
            if progress
                .suspension
                .as_ref()
                .is_some_and(|s| elapsed >= s.target)
            {
                progress.suspension.take().map(|s| s.waker)
            } else {
                None
            }
        };
        if let Some(waker) = due {
            waker.wake();
        }

        if self.woken.take() {
            self.resume(true);
            true
        } else {
            false
        }
    }

    /// Polls the body once.
    ///
    /// With `gated`, a stopped owner finishes the sequence with
    /// `ListenerStopped` instead of polling.
    pub(crate) fn resume(&self, gated: bool) {
        if self.is_finished() {
            return;
        }
        if self.token.is_cancelled() {
            self.complete(Err(interrupted(&self.group_token, self.owner.name())));
            return;
        }
        if gated && !self.owner.running() {
            self.complete(Err(TaskError::ListenerStopped {
                listener: self.owner.name().to_string(),
            }));
            return;
        }

        let polled = {
            let mut slot = self.body.lock();
            let Some(body) = slot.as_mut() else {
                return;
            };
            self.woken.take();
            let waker = waker(Arc::clone(&self.woken));
            let mut cx = Context::from_waker(&waker);
            catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut cx)))
        };

        match polled {
            Ok(Poll::Pending) => {
                if self.token.is_cancelled() {
                    self.complete(Err(interrupted(&self.group_token, self.owner.name())));
                }
            }
            Ok(Poll::Ready(outcome)) => self.complete(outcome),
            Err(panic) => self.complete(Err(TaskError::from_panic(panic))),
        }
    }

    /// Finishes the sequence exactly once.
    ///
    /// The outcome is published under the callback lock, so a callback
    /// registered concurrently is either taken here or sees the outcome.
    pub(crate) fn complete(&self, outcome: Result<(), TaskError>) {
        let callbacks = {
            let mut on_cancel = self.on_cancel.lock();
            if self.finished.swap(true, AtomicOrdering::AcqRel) {
                return;
            }
            *self.outcome.lock() = Some(outcome.clone());
            std::mem::take(&mut *on_cancel)
        };
        let body = self.body.lock().take();
        drop(body);

        let cancelled = matches!(&outcome, Err(err) if err.is_cancellation());
        self.spawner
            .reporter()
            .sequence_finished(self.owner.name(), &outcome);

        if cancelled {
            for callback in callbacks {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(callback)) {
                    error!(
                        listener = self.owner.name(),
                        "cancellation callback panicked: {}",
                        panic_info(panic.as_ref())
                    );
                }
            }
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(AtomicOrdering::Acquire)
    }

    /// Registers a tick wait of `target` ticks; returns its id.
    fn suspend(&self, target: u32, waker: &Waker) -> u64 {
        let mut progress = self.progress.lock();
        let id = progress.next_wait;
        progress.next_wait += 1;
        progress.elapsed = 0;
        progress.suspension = Some(Suspension {
            id,
            target,
            waker: waker.clone(),
        });
        id
    }

    /// True while wait `id` is still pending; refreshes its waker.
    fn still_waiting(&self, id: u64, waker: &Waker) -> bool {
        match self.progress.lock().suspension.as_mut() {
            Some(s) if s.id == id => {
                s.waker.clone_from(waker);
                true
            }
            _ => false,
        }
    }

    fn abandon(&self, id: u64) {
        let mut progress = self.progress.lock();
        if progress.suspension.as_ref().is_some_and(|s| s.id == id) {
            progress.suspension = None;
        }
    }
}

/// Handle to a running (or finished) sequence.
///
/// Cheap to clone. The body receives one and uses it to wait.
#[derive(Clone)]
pub struct Sequence {
    core: Arc<Core>,
}

impl Sequence {
    pub(crate) fn new(owner: ListenerRef, spawner: Spawner) -> Self {
        let group_token = owner.scope().task_group().token().clone();
        Self {
            core: Arc::new(Core {
                id: SEQUENCE_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
                owner,
                spawner,
                token: group_token.child_token(),
                group_token,
                progress: Mutex::new(Progress {
                    elapsed: 0,
                    suspension: None,
                    next_wait: 0,
                }),
                body: Mutex::new(None),
                woken: Arc::new(WakeFlag(AtomicBool::new(false))),
                finished: AtomicBool::new(false),
                outcome: Mutex::new(None),
                on_cancel: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn core(&self) -> &Core {
        &self.core
    }

    /// Unique id of this sequence.
    pub fn id(&self) -> u64 {
        self.core.id
    }

    /// Owning listener.
    pub fn owner(&self) -> &ListenerRef {
        &self.core.owner
    }

    /// Ticks counted toward the current (or last) single [`wait`](Self::wait).
    ///
    /// Every `wait`/`sync` restarts the count. The looping waits
    /// ([`wait_until`](Self::wait_until), [`wait_dynamic`](Self::wait_dynamic)
    /// and friends) suspend one tick at a time, so between their ticks this
    /// reads `0`; their return values carry the total.
    pub fn elapsed_ticks(&self) -> u32 {
        self.core.progress.lock().elapsed
    }

    /// True once the body completed, failed or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.core.is_finished()
    }

    /// How the body ended, if it did.
    pub fn outcome(&self) -> Option<Result<(), TaskError>> {
        self.core.outcome.lock().clone()
    }

    /// Requests cancellation.
    ///
    /// The body is dropped at the next tick (or right after the current poll
    /// if called from inside the body); cancellation callbacks then run.
    pub fn cancel(&self) {
        self.core.token.cancel();
    }

    /// Registers `callback` to run if the sequence ends by cancellation.
    ///
    /// Runs immediately if the sequence was already cancelled; dropped if it
    /// already ended otherwise.
    pub fn on_cancellation(&self, callback: impl FnOnce() + Send + 'static) {
        let cancelled = {
            let mut callbacks = self.core.on_cancel.lock();
            let outcome = self.core.outcome.lock();
            match outcome.as_ref() {
                None => {
                    callbacks.push(Box::new(callback));
                    return;
                }
                Some(result) => matches!(result, Err(err) if err.is_cancellation()),
            }
        };
        if cancelled {
            callback();
        }
    }

    /// Suspends until `ticks` ticks have elapsed, counting from the next tick.
    ///
    /// `wait(0)` still suspends until the next tick (see [`sync`](Self::sync)).
    pub fn wait(&self, ticks: u32) -> TickWait {
        TickWait {
            core: Arc::clone(&self.core),
            target: ticks,
            id: None,
        }
    }

    /// Suspends until the next tick.
    pub fn sync(&self) -> TickWait {
        self.wait(0)
    }

    /// Suspends for `ticks` ticks; returns immediately for `0`.
    pub async fn wait_ticks(&self, ticks: u32) {
        if ticks == 0 {
            return;
        }
        self.wait(ticks).await;
    }

    /// Suspends for `seconds` at the nominal tick rate.
    pub async fn wait_seconds(&self, seconds: u32) {
        self.wait_ticks(seconds.saturating_mul(TICKS_PER_SECOND)).await;
    }

    /// Suspends one tick at a time until `predicate` holds.
    ///
    /// Returns the number of ticks waited (`0` if it already held).
    pub async fn wait_until(&self, mut predicate: impl FnMut() -> bool) -> u32 {
        let mut ticks = 0u32;
        while !predicate() {
            self.sync().await;
            ticks = ticks.saturating_add(1);
        }
        ticks
    }

    /// Suspends while fewer ticks have passed than `ticks` currently returns.
    ///
    /// `ticks` is re-read after every tick, so the wait can be stretched or
    /// cut short while it runs. Returns the number of ticks waited.
    pub async fn wait_dynamic(&self, mut ticks: impl FnMut() -> u32) -> u32 {
        let mut waited = 0u32;
        while waited < ticks() {
            self.sync().await;
            waited = waited.saturating_add(1);
        }
        waited
    }

    /// Waits up to `ticks` ticks, stopping early once `break_loop` holds.
    ///
    /// `break_loop` is evaluated after every tick. Returns `true` if the full
    /// duration elapsed. With `ticks == 0` no suspension happens and the
    /// result is `!break_loop()`.
    pub async fn wait_conditional(&self, ticks: u32, mut break_loop: impl FnMut() -> bool) -> bool {
        if ticks == 0 {
            return !break_loop();
        }
        let mut waited = 0u32;
        while waited < ticks {
            self.sync().await;
            waited += 1;
            if break_loop() {
                return waited >= ticks;
            }
        }
        true
    }

    /// Waits, tick by tick, for an already-running tokio task.
    pub async fn wait_for<T>(&self, handle: JoinHandle<T>) -> Result<T, TaskError> {
        self.wait_until(|| handle.is_finished()).await;
        handle.await.map_err(|err| {
            if err.is_panic() {
                TaskError::from_panic(err.into_panic())
            } else {
                TaskError::Canceled
            }
        })
    }

    /// Runs `fut` in the owner's task group and waits for it tick by tick.
    pub async fn wait_for_future<T, F>(&self, fut: F) -> Result<T, TaskError>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let handle = self.core.spawner.spawn_value(fut);
        self.wait_for(handle).await?
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("id", &self.core.id)
            .field("owner", &self.core.owner.name())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Future returned by [`Sequence::wait`].
///
/// Resolves once the scheduler has counted `target` ticks. Dropping it
/// before then withdraws the wait.
#[must_use = "futures do nothing unless awaited"]
pub struct TickWait {
    core: Arc<Core>,
    target: u32,
    id: Option<u64>,
}

impl Future for TickWait {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.id {
            None => {
                let id = self.core.suspend(self.target, cx.waker());
                self.id = Some(id);
                Poll::Pending
            }
            Some(id) if self.core.still_waiting(id, cx.waker()) => Poll::Pending,
            Some(_) => Poll::Ready(()),
        }
    }
}

impl Drop for TickWait {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.core.abandon(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use tokio::runtime::Handle;

    use super::*;
    use crate::core::Config;
    use crate::listener::Toggle;
    use crate::observe::{Bus, DiagnosticKind};
    use crate::sequence::SequenceManager;

    fn manager(bus: &Bus) -> Arc<SequenceManager> {
        SequenceManager::new(Handle::current(), bus.clone(), &Config::default())
    }

    #[tokio::test]
    async fn waits_count_ticks_after_the_first() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");
        let resumed = Arc::new(AtomicU64::new(0));

        let clock = Arc::clone(&sequences);
        let at = Arc::clone(&resumed);
        let seq = sequences.start(&owner, move |seq| async move {
            seq.wait_ticks(3).await;
            at.store(clock.current_tick(), AtomicOrdering::SeqCst);
            seq.wait_ticks(0).await;
            Ok(())
        });

        for _ in 0..2 {
            sequences.tick();
            assert!(seq.elapsed_ticks() > 0);
            assert!(!seq.is_finished());
        }
        sequences.tick();
        assert_eq!(resumed.load(AtomicOrdering::SeqCst), 3);
        assert!(seq.is_finished());
    }

    #[tokio::test]
    async fn one_second_is_twenty_ticks() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");

        let seq = sequences.start(&owner, |seq| async move {
            seq.wait_seconds(0).await;
            seq.wait_seconds(1).await;
            Ok(())
        });

        for _ in 0..TICKS_PER_SECOND - 1 {
            sequences.tick();
        }
        assert!(!seq.is_finished());
        assert_eq!(seq.elapsed_ticks(), TICKS_PER_SECOND - 1);
        sequences.tick();
        assert!(seq.is_finished());
    }

    #[tokio::test]
    async fn wait_conditional_reports_early_exit() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");
        let checks = Arc::new(AtomicU32::new(0));
        let full = Arc::new(Mutex::new(None));

        let counter = Arc::clone(&checks);
        let result = Arc::clone(&full);
        let seq = sequences.start(&owner, move |seq| async move {
            let elapsed = seq
                .wait_conditional(5, || counter.fetch_add(1, AtomicOrdering::SeqCst) + 1 >= 2)
                .await;
            *result.lock() = Some(elapsed);
            Ok(())
        });

        sequences.tick();
        assert!(!seq.is_finished());
        sequences.tick();
        assert!(seq.is_finished());
        assert_eq!(*full.lock(), Some(false));
        assert_eq!(checks.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn wait_until_counts_ticks() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");
        let ready = Arc::new(AtomicBool::new(false));
        let waited = Arc::new(AtomicU32::new(u32::MAX));

        let flag = Arc::clone(&ready);
        let out = Arc::clone(&waited);
        let seq = sequences.start(&owner, move |seq| async move {
            let ticks = seq.wait_until(|| flag.load(AtomicOrdering::SeqCst)).await;
            out.store(ticks, AtomicOrdering::SeqCst);
            Ok(())
        });

        sequences.tick();
        sequences.tick();
        ready.store(true, AtomicOrdering::SeqCst);
        sequences.tick();
        assert!(seq.is_finished());
        assert_eq!(waited.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_runs_callbacks_on_the_next_tick() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");
        let calls = Arc::new(AtomicU32::new(0));

        let seq = sequences.start(&owner, |seq| async move {
            seq.wait_ticks(100).await;
            Ok(())
        });
        let counter = Arc::clone(&calls);
        seq.on_cancellation(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });

        seq.cancel();
        assert!(!seq.is_finished());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);

        sequences.tick();
        assert!(seq.is_finished());
        assert_eq!(seq.outcome(), Some(Err(TaskError::Canceled)));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        let counter = Arc::clone(&calls);
        seq.on_cancellation(move || {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn elapsed_ticks_restarts_with_every_wait() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");

        let polling = sequences.start(&owner, |seq| async move {
            seq.wait_until(|| false).await;
            Ok(())
        });
        let counting = sequences.start(&owner, |seq| async move {
            seq.wait_ticks(10).await;
            Ok(())
        });

        for _ in 0..3 {
            sequences.tick();
        }
        assert_eq!(polling.elapsed_ticks(), 0);
        assert_eq!(counting.elapsed_ticks(), 3);
    }

    #[tokio::test]
    async fn dynamic_waits_follow_their_supplier() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");
        let target = Arc::new(AtomicU32::new(5));
        let waited = Arc::new(AtomicU32::new(u32::MAX));

        let current = Arc::clone(&target);
        let out = Arc::clone(&waited);
        let seq = sequences.start(&owner, move |seq| async move {
            let ticks = seq
                .wait_dynamic(|| current.load(AtomicOrdering::SeqCst))
                .await;
            out.store(ticks, AtomicOrdering::SeqCst);
            Ok(())
        });

        sequences.tick();
        sequences.tick();
        assert!(!seq.is_finished());
        target.store(3, AtomicOrdering::SeqCst);
        sequences.tick();
        assert!(seq.is_finished());
        assert_eq!(waited.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn late_callbacks_race_completion_without_loss() {
        let sequences = manager(&Bus::new(256));
        let owner: ListenerRef = Toggle::new("owner");

        for _ in 0..64 {
            let seq = sequences.start(&owner, |seq| async move {
                seq.wait_ticks(100).await;
                Ok(())
            });
            seq.cancel();
            let calls = Arc::new(AtomicU32::new(0));

            std::thread::scope(|s| {
                s.spawn(|| {
                    sequences.tick();
                });
                s.spawn(|| {
                    let counter = Arc::clone(&calls);
                    seq.on_cancellation(move || {
                        counter.fetch_add(1, AtomicOrdering::SeqCst);
                    });
                });
            });

            assert!(seq.is_finished());
            assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn completed_sequences_drop_their_callbacks() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");
        let called = Arc::new(AtomicBool::new(false));

        let seq = sequences.start(&owner, |seq| async move {
            seq.sync().await;
            Ok(())
        });
        let flag = Arc::clone(&called);
        seq.on_cancellation(move || flag.store(true, AtomicOrdering::SeqCst));

        sequences.tick();
        assert_eq!(seq.outcome(), Some(Ok(())));
        assert!(!called.load(AtomicOrdering::SeqCst));
    }

    #[tokio::test]
    async fn failing_sequence_is_isolated() {
        let bus = Bus::new(16);
        let mut diagnostics = bus.subscribe();
        let sequences = manager(&bus);
        let owner: ListenerRef = Toggle::new("owner");

        let failing = sequences.start(&owner, |seq| async move {
            seq.wait_ticks(1).await;
            Err(TaskError::fail("nope"))
        });
        let healthy = sequences.start(&owner, |seq| async move {
            seq.wait_ticks(2).await;
            Ok(())
        });

        let report = sequences.tick();
        assert_eq!(report.finished, 1);
        assert_eq!(failing.outcome(), Some(Err(TaskError::fail("nope"))));
        assert!(!healthy.is_finished());

        sequences.tick();
        assert_eq!(healthy.outcome(), Some(Ok(())));

        let mut kinds = Vec::new();
        while let Ok(d) = diagnostics.try_recv() {
            kinds.push(d.kind);
        }
        assert!(kinds.contains(&DiagnosticKind::TaskFailed));
        assert!(kinds.contains(&DiagnosticKind::SequenceFinished));
    }

    #[tokio::test]
    async fn foreign_futures_are_awaited_tick_by_tick() {
        let sequences = manager(&Bus::new(16));
        let owner: ListenerRef = Toggle::new("owner");
        let value = Arc::new(Mutex::new(None));

        let out = Arc::clone(&value);
        let seq = sequences.start(&owner, move |seq| async move {
            let answer = seq.wait_for_future(async { 40 + 2 }).await?;
            *out.lock() = Some(answer);
            Ok(())
        });

        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        sequences.tick();
        assert!(seq.is_finished());
        assert_eq!(*value.lock(), Some(42));
    }
}
