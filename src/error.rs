//! Error types used by the dispatcher, async handlers and the sequence scheduler.
//!
//! - [`TaskError`] — outcome of an asynchronous body (async handler or sequence).
//! - [`HandlerError`] — failure of a synchronous hook.
//! - [`DispatchError`] — event catalog misconfiguration.
//! - [`EventError`] — misuse of an event's flags.
//! - [`RuntimeError`] — failures of the scheduler itself.
//!
//! Every type provides `as_label` (stable snake_case label for logs) and
//! `as_message` helpers.

use std::any::Any;

use thiserror::Error;

/// # Outcome of an asynchronous body.
///
/// Returned by async handler bodies and sequence bodies, and produced by the
/// runtime when a body is interrupted at one of its suspension points.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The body failed with an ordinary error.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The body panicked; the panic was caught at the task-group boundary.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },

    /// The task was canceled explicitly (e.g. replaced by a newer task).
    #[error("task canceled")]
    Canceled,

    /// The body was resumed while its owning listener was no longer running.
    ///
    /// This is the expected way for work to end when a feature is switched off,
    /// so it is logged at a lower severity than real failures.
    #[error("listener '{listener}' is not running")]
    ListenerStopped {
        /// Name of the listener that stopped.
        listener: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use tickvisor::TaskError;
    ///
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
            TaskError::ListenerStopped { .. } => "listener_stopped",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::Canceled => "task canceled".to_string(),
            TaskError::ListenerStopped { listener } => format!("listener stopped: {listener}"),
        }
    }

    /// True for the distinguished "listener stopped" outcome.
    pub fn is_listener_stopped(&self) -> bool {
        matches!(self, TaskError::ListenerStopped { .. })
    }

    /// True when the body ended by cancellation rather than by failing.
    ///
    /// Both explicit cancellation and listener-stopped count; these are expected
    /// outcomes and never reported as errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            TaskError::Canceled | TaskError::ListenerStopped { .. }
        )
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked {
            info: panic_info(payload.as_ref()),
        }
    }
}

/// # Failure of a synchronous hook.
///
/// The dispatcher catches these (and panics) per hook, logs them and moves on
/// to the next hook.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The hook returned an error.
    #[error("handler failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The hook panicked.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl HandlerError {
    /// Convenience constructor for [`HandlerError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        HandlerError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Fail { .. } => "handler_failed",
            HandlerError::Panicked { .. } => "handler_panicked",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            HandlerError::Fail { error } => format!("error: {error}"),
            HandlerError::Panicked { info } => format!("panic: {info}"),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        HandlerError::Panicked {
            info: panic_info(payload.as_ref()),
        }
    }
}

impl From<TaskError> for HandlerError {
    fn from(err: TaskError) -> Self {
        HandlerError::Fail {
            error: err.to_string(),
        }
    }
}

/// # Event catalog misconfiguration.
///
/// The set of dispatchable event types is fixed when the runtime is built.
/// Using a type outside that set is a programming error and is reported loudly
/// instead of silently doing nothing.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The event type was never declared in the catalog.
    #[error("event '{type_name}' is not declared in the event catalog")]
    UnknownEvent {
        /// Rust type name of the offending event.
        type_name: &'static str,
    },

    /// The same event type or name was declared twice.
    #[error("event '{name}' is declared more than once")]
    DuplicateEvent {
        /// Catalog name that collided.
        name: String,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::UnknownEvent { .. } => "dispatch_unknown_event",
            DispatchError::DuplicateEvent { .. } => "dispatch_duplicate_event",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::UnknownEvent { type_name } => format!("unknown event: {type_name}"),
            DispatchError::DuplicateEvent { name } => format!("duplicate event: {name}"),
        }
    }
}

/// # Misuse of an event's flags.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    /// `cancel_event` was called after dispatch finished.
    #[error("cannot cancel an event that has already been completed")]
    AlreadyCompleted,
}

impl EventError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventError::AlreadyCompleted => "event_already_completed",
        }
    }
}

/// # Failures of the scheduler itself.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// More advancement steps than allowed were attempted during one tick.
    ///
    /// Indicates a producer bug, such as a sequence that restarts itself
    /// unconditionally.
    #[error("tick {tick} exceeded the step limit of {limit}; {skipped} sequences left unadvanced")]
    SchedulerRunaway {
        /// Tick number at which the limit was hit.
        tick: u64,
        /// The configured limit.
        limit: usize,
        /// How many sequences were not advanced this tick.
        skipped: usize,
    },

    /// The runtime was built outside a tokio runtime and no handle was given.
    #[error("no tokio runtime available; call RuntimeBuilder::with_handle")]
    NoRuntime,

    /// The event catalog could not be built.
    #[error(transparent)]
    Catalog(#[from] DispatchError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use tickvisor::RuntimeError;
    ///
    /// let err = RuntimeError::SchedulerRunaway { tick: 7, limit: 10, skipped: 3 };
    /// assert_eq!(err.as_label(), "scheduler_runaway");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::SchedulerRunaway { .. } => "scheduler_runaway",
            RuntimeError::NoRuntime => "runtime_missing_handle",
            RuntimeError::Catalog(err) => err.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::SchedulerRunaway {
                tick,
                limit,
                skipped,
            } => format!("runaway at tick {tick}: limit={limit} skipped={skipped}"),
            RuntimeError::NoRuntime => "no tokio runtime".to_string(),
            RuntimeError::Catalog(err) => err.as_message(),
        }
    }
}

/// Renders a panic payload the way `std` prints it.
pub(crate) fn panic_info(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
