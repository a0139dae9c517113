//! # The tick scheduler.
//!
//! [`SequenceManager`] holds every live [`Sequence`] and advances them once per
//! tick of the external clock. It is itself a [`Listener`]; the runtime hooks
//! [`SequenceManager::tick`] onto [`TickEvent`](crate::TickEvent) at
//! [`priority::FIRST`](crate::priority::FIRST).
//!
//! ## Tick
//! ```text
//! tick()
//!   ├─ pending ──drain──► running          (sequences created since the last tick)
//!   └─ for seq in running:
//!        finished           → drop
//!        token cancelled    → finish (Canceled | ListenerStopped), drop
//!        elapsed += 1
//!        elapsed ≥ target   → wake ─► poll body (owner stopped → ListenerStopped)
//!        step limit hit     → abort tick, report SchedulerRunaway,
//!                             skipped sequences move to the front for the next tick
//! ```
//!
//! ## Rules
//! - A sequence created during tick `T` is first advanced at tick `T + 1`.
//! - A failing sequence is dropped and reported; the others keep advancing.
//! - With more live sequences than the step limit, every sequence still
//!   advances in turn: each tick resumes where the previous one stopped.
//! - Re-entrant ticks (a body dispatching a tick) are ignored.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::warn;

use super::sequence::Sequence;
use crate::core::Config;
use crate::error::{RuntimeError, TaskError};
use crate::listener::group::Spawner;
use crate::listener::{Listener, ListenerRef, ListenerScope};
use crate::observe::reporter::{Reporter, SEQUENCE_ORIGIN};
use crate::observe::Bus;

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Scheduler tick number (1-based).
    pub tick: u64,
    /// Sequences moved from pending to running.
    pub admitted: usize,
    /// Sequences whose elapsed counter was advanced.
    pub advanced: usize,
    /// Sequences whose body was polled.
    pub resumed: usize,
    /// Sequences removed because they finished.
    pub finished: usize,
    /// Set when the step limit cut the tick short.
    pub aborted: Option<RuntimeError>,
}

/// Scheduler of tick-synchronized sequences.
pub struct SequenceManager {
    scope: ListenerScope,
    handle: Handle,
    reporter: Reporter,
    step_limit: usize,
    pending: Mutex<Vec<Sequence>>,
    running: Mutex<Vec<Sequence>>,
    ticks: AtomicU64,
    ticking: AtomicBool,
    cancel_requested: AtomicBool,
    last: Mutex<TickReport>,
}

/// Clears the re-entrancy flag when a tick ends, even by unwinding.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, AtomicOrdering::Release);
    }
}

impl SequenceManager {
    /// Creates a scheduler; futures awaited by sequences run on `handle`.
    pub fn new(handle: Handle, bus: Bus, cfg: &Config) -> Arc<Self> {
        Arc::new(Self {
            scope: ListenerScope::new("SequenceManager"),
            handle,
            reporter: Reporter::new(bus),
            step_limit: cfg.tick_step_limit_clamped(),
            pending: Mutex::new(Vec::new()),
            running: Mutex::new(Vec::new()),
            ticks: AtomicU64::new(0),
            ticking: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            last: Mutex::new(TickReport::default()),
        })
    }

    /// Starts a sequence owned by `owner`.
    ///
    /// The body runs synchronously up to its first suspension point before
    /// this returns. If the owner is not running, the body is never started
    /// and the sequence finishes normally.
    pub fn start<F, Fut>(&self, owner: &ListenerRef, body: F) -> Sequence
    where
        F: FnOnce(Sequence) -> Fut,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let spawner = Spawner::new(
            owner.clone(),
            self.handle.clone(),
            self.reporter.clone(),
            SEQUENCE_ORIGIN,
        );
        let seq = Sequence::new(owner.clone(), spawner);
        self.pending.lock().push(seq.clone());
        self.reporter.sequence_started(owner.name());

        if owner.running() {
            seq.core().install(Box::pin(body(seq.clone())));
            seq.core().resume(false);
        } else {
            seq.core().complete(Ok(()));
        }
        seq
    }

    /// Advances every live sequence by one tick.
    pub fn tick(&self) -> TickReport {
        if self.ticking.swap(true, AtomicOrdering::AcqRel) {
            warn!("re-entrant tick ignored");
            return TickReport::default();
        }
        let _guard = TickGuard(&self.ticking);

        let tick = self.ticks.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        let mut running = std::mem::take(&mut *self.running.lock());
        {
            let mut pending = self.pending.lock();
            report.admitted = pending.len();
            running.append(&mut pending);
        }

        let mut kept = Vec::with_capacity(running.len());
        let mut queue = running.into_iter();
        while let Some(seq) = queue.next() {
            if report.advanced >= self.step_limit {
                let err = RuntimeError::SchedulerRunaway {
                    tick,
                    limit: self.step_limit,
                    skipped: 1 + queue.len(),
                };
                self.reporter.runaway(&err);
                report.aborted = Some(err);
                // Skipped sequences go first next tick.
                let mut rest: Vec<_> = std::iter::once(seq).chain(queue).collect();
                rest.append(&mut kept);
                kept = rest;
                break;
            }
            if seq.is_finished() {
                report.finished += 1;
                continue;
            }

            report.advanced += 1;
            if seq.core().on_tick() {
                report.resumed += 1;
            }
            if seq.is_finished() {
                report.finished += 1;
            } else {
                kept.push(seq);
            }
        }

        if self.cancel_requested.swap(false, AtomicOrdering::AcqRel) {
            for seq in &kept {
                seq.cancel();
            }
        }
        {
            let mut running = self.running.lock();
            kept.append(&mut running);
            *running = kept;
        }
        *self.last.lock() = report.clone();
        report
    }

    /// Requests cancellation of every live sequence.
    ///
    /// Bodies are dropped, and cancellation callbacks run, on the next tick.
    pub fn cancel_all(&self) {
        if self.ticking.load(AtomicOrdering::Acquire) {
            self.cancel_requested.store(true, AtomicOrdering::Release);
        }
        for seq in self.pending.lock().iter().chain(self.running.lock().iter()) {
            seq.cancel();
        }
    }

    /// Sequences created since the last tick.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Sequences being advanced.
    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    /// Number of ticks processed so far.
    pub fn current_tick(&self) -> u64 {
        self.ticks.load(AtomicOrdering::Relaxed)
    }

    /// Report of the most recent tick.
    pub fn last_report(&self) -> TickReport {
        self.last.lock().clone()
    }
}

impl Listener for SequenceManager {
    fn scope(&self) -> &ListenerScope {
        &self.scope
    }
}
