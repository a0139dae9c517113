//! # Diagnostics emitted by the dispatcher, async handlers and the scheduler.
//!
//! The [`DiagnosticKind`] enum classifies records across three categories:
//! - **Failures**: a hook or task body failed or panicked
//! - **Flow control**: events dropped by an async-handler policy, task cancellations
//! - **Scheduler/observability**: sequence lifecycle, runaway ticks, subscriber trouble
//!
//! The [`Diagnostic`] struct carries metadata such as timestamps, listener name,
//! event name and reasons.
//!
//! ## Ordering guarantees
//! Each record has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when records are delivered out of order.
//!
//! ## Example
//! ```rust
//! use tickvisor::{Diagnostic, DiagnosticKind};
//!
//! let d = Diagnostic::new(DiagnosticKind::HookFailed)
//!     .with_listener("aura")
//!     .with_event("attack")
//!     .with_reason("boom");
//!
//! assert_eq!(d.kind, DiagnosticKind::HookFailed);
//! assert_eq!(d.listener.as_deref(), Some("aura"));
//! assert_eq!(d.event, Some("attack"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for diagnostic ordering.
static DIAGNOSTIC_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    // === Dispatch ===
    /// A synchronous hook returned an error or panicked.
    ///
    /// Sets:
    /// - `listener`: owner of the hook
    /// - `event`: catalog name of the event
    /// - `reason`: error message
    HookFailed,

    // === Async handlers ===
    /// An asynchronous body failed or panicked.
    ///
    /// Sets:
    /// - `listener`: owner of the task group
    /// - `event`: catalog name of the triggering event, or `"sequence"`
    /// - `reason`: error message
    TaskFailed,

    /// An asynchronous body was cancelled explicitly (e.g. replaced by a newer task).
    ///
    /// Sets:
    /// - `listener`, `event`
    TaskCanceled,

    /// An asynchronous body ended because its listener stopped running or was disposed.
    ///
    /// Sets:
    /// - `listener`, `event`
    ListenerStopped,

    /// A discard-latest handler ignored an event because a task was still active.
    ///
    /// Sets:
    /// - `listener`, `event`
    EventDiscarded,

    /// An ordered handler's bounded queue was full; the event was dropped.
    ///
    /// Sets:
    /// - `listener`, `event`
    /// - `reason`: queue capacity
    QueueOverflow,

    // === Sequences ===
    /// A sequence was created and scheduled.
    ///
    /// Sets:
    /// - `listener`: owner of the sequence
    SequenceStarted,

    /// A sequence body ran to completion.
    ///
    /// Sets:
    /// - `listener`: owner of the sequence
    SequenceFinished,

    /// A tick exceeded the configured step limit.
    ///
    /// Sets:
    /// - `tick`: tick number
    /// - `reason`: limit and number of skipped sequences
    SchedulerRunaway,

    // === Subscribers ===
    /// Subscriber panicked during diagnostic processing.
    ///
    /// Sets:
    /// - `listener`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped a diagnostic (queue full or worker closed).
    ///
    /// Sets:
    /// - `listener`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

impl DiagnosticKind {
    /// Returns a short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            DiagnosticKind::HookFailed => "hook_failed",
            DiagnosticKind::TaskFailed => "task_failed",
            DiagnosticKind::TaskCanceled => "task_canceled",
            DiagnosticKind::ListenerStopped => "listener_stopped",
            DiagnosticKind::EventDiscarded => "event_discarded",
            DiagnosticKind::QueueOverflow => "queue_overflow",
            DiagnosticKind::SequenceStarted => "sequence_started",
            DiagnosticKind::SequenceFinished => "sequence_finished",
            DiagnosticKind::SchedulerRunaway => "scheduler_runaway",
            DiagnosticKind::SubscriberPanicked => "subscriber_panicked",
            DiagnosticKind::SubscriberOverflow => "subscriber_overflow",
        }
    }
}

/// Diagnostic record with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`DiagnosticKind`]
#[derive(Clone, Debug)]
pub struct Diagnostic {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,

    /// Record classification.
    pub kind: DiagnosticKind,
    /// Name of the listener (or subscriber), if applicable.
    pub listener: Option<Arc<str>>,
    /// Catalog name of the event involved, if applicable.
    pub event: Option<&'static str>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Tick number, if applicable.
    pub tick: Option<u64>,
}

impl Diagnostic {
    /// Creates a new record of the given kind with current timestamp and next sequence number.
    pub fn new(kind: DiagnosticKind) -> Self {
        Self {
            seq: DIAGNOSTIC_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            listener: None,
            event: None,
            reason: None,
            tick: None,
        }
    }

    /// Attaches a listener name.
    #[inline]
    pub fn with_listener(mut self, listener: impl Into<Arc<str>>) -> Self {
        self.listener = Some(listener.into());
        self
    }

    /// Attaches an event name.
    #[inline]
    pub fn with_event(mut self, event: &'static str) -> Self {
        self.event = Some(event);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a tick number.
    #[inline]
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Creates a subscriber overflow record.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Diagnostic::new(DiagnosticKind::SubscriberOverflow)
            .with_listener(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic record.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Diagnostic::new(DiagnosticKind::SubscriberPanicked)
            .with_listener(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, DiagnosticKind::SubscriberOverflow)
    }

    /// True for records about a subscriber panicking.
    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, DiagnosticKind::SubscriberPanicked)
    }
}
