//! # Async handler policies.
//!
//! An async handler turns every matching event into an asynchronous body that
//! runs in the owner's task group. When a new event arrives while earlier
//! bodies are still running, the [`Behavior`] decides what happens.
//!
//! ## Variants
//! - `Parallel`: start a new task for every event, no coordination.
//! - `Ordered`: enqueue the event; a single consumer runs bodies one at a time, FIFO.
//! - `CancelPrevious`: **cancel** the running task and start the new one.
//! - `DiscardLatest`: if a task is still running, **ignore** the new event.
//!
//! ## Invariants
//! - `Ordered`: bodies never overlap and run in dispatch order.
//! - `CancelPrevious`, `DiscardLatest`: at most one body is active at any instant.

use tokio::runtime::Handle;

use super::priority;

/// Policy controlling how events are handled while earlier bodies still run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Behavior {
    /// Every event gets its own task.
    ///
    /// Use when:
    /// - Bodies are independent
    /// - Example: logging each received packet
    #[default]
    Parallel,

    /// Events are queued and processed one at a time (FIFO).
    ///
    /// Use when:
    /// - All events must be handled
    /// - Order matters
    /// - Example: replaying inventory clicks
    Ordered,

    /// The newest event wins; the running body is cancelled.
    ///
    /// Use when:
    /// - A new event invalidates the old one
    /// - Example: re-targeting on every target change
    CancelPrevious,

    /// The running body wins; events arriving meanwhile are dropped.
    ///
    /// Use when:
    /// - Redundant work should be avoided
    /// - Example: a cooldown-gated action
    DiscardLatest,
}

impl Behavior {
    /// Returns a short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            Behavior::Parallel => "parallel",
            Behavior::Ordered => "ordered",
            Behavior::CancelPrevious => "cancel_previous",
            Behavior::DiscardLatest => "discard_latest",
        }
    }
}

/// Registration request for an async handler.
///
/// Combines a policy, a hook priority and an optional execution context.
#[derive(Clone, Debug)]
pub struct SuspendSpec {
    /// Policy for overlapping events.
    pub behavior: Behavior,

    /// Priority of the underlying synchronous hook.
    pub priority: i16,

    /// Runtime the bodies are spawned on; `None` uses the manager's default.
    pub handle: Option<Handle>,
}

impl SuspendSpec {
    /// Creates a spec with [`priority::NORMAL`] on the default context.
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            priority: priority::NORMAL,
            handle: None,
        }
    }

    /// Convenience: parallel policy.
    #[inline]
    pub fn parallel() -> Self {
        Self::new(Behavior::Parallel)
    }

    /// Convenience: ordered policy.
    #[inline]
    pub fn ordered() -> Self {
        Self::new(Behavior::Ordered)
    }

    /// Convenience: cancel-previous policy.
    #[inline]
    pub fn cancel_previous() -> Self {
        Self::new(Behavior::CancelPrevious)
    }

    /// Convenience: discard-latest policy.
    #[inline]
    pub fn discard_latest() -> Self {
        Self::new(Behavior::DiscardLatest)
    }

    /// Sets the hook priority.
    #[inline]
    pub fn with_priority(mut self, priority: i16) -> Self {
        self.priority = priority;
        self
    }

    /// Runs bodies on `handle` instead of the default context.
    #[inline]
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }
}

impl Default for SuspendSpec {
    fn default() -> Self {
        Self::parallel()
    }
}
