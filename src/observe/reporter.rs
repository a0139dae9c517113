//! # Boundary logging for handler and task outcomes.
//!
//! [`Reporter`] is the single place where failures caught at a boundary (hook,
//! task group, scheduler) are turned into a `tracing` record and a
//! [`Diagnostic`] on the [`Bus`].
//!
//! ## Severity
//! | outcome                        | level   | diagnostic          |
//! |--------------------------------|---------|---------------------|
//! | hook / task failure or panic   | `error` | `HookFailed` / `TaskFailed` |
//! | listener stopped               | `debug` | `ListenerStopped`   |
//! | explicit cancellation          | `debug` | `TaskCanceled`      |
//! | discard-latest drop            | `trace` | `EventDiscarded`    |
//! | ordered queue overflow         | `warn`  | `QueueOverflow`     |
//! | scheduler runaway              | `error` | `SchedulerRunaway`  |

use tracing::{debug, error, trace, warn};

use super::bus::Bus;
use super::diagnostic::{Diagnostic, DiagnosticKind};
use crate::error::{HandlerError, RuntimeError, TaskError};

/// Origin label used for sequence bodies.
pub(crate) const SEQUENCE_ORIGIN: &str = "sequence";

#[derive(Clone, Debug)]
pub(crate) struct Reporter {
    bus: Bus,
}

impl Reporter {
    pub(crate) fn new(bus: Bus) -> Self {
        Self { bus }
    }

    pub(crate) fn hook_failed(&self, listener: &str, event: &'static str, err: &HandlerError) {
        error!(
            listener = listener,
            event = event,
            label = err.as_label(),
            "exception while executing handler: {err}"
        );
        self.bus.publish(
            Diagnostic::new(DiagnosticKind::HookFailed)
                .with_listener(listener)
                .with_event(event)
                .with_reason(err.to_string()),
        );
    }

    /// Reports how an asynchronous body ended.
    pub(crate) fn task_finished(
        &self,
        listener: &str,
        origin: &'static str,
        outcome: &Result<(), TaskError>,
    ) {
        let Err(err) = outcome else {
            trace!(listener = listener, origin = origin, "task completed");
            return;
        };
        let kind = match err {
            TaskError::ListenerStopped { .. } => {
                debug!(
                    listener = listener,
                    origin = origin,
                    "{listener} is not running, task cancelled"
                );
                DiagnosticKind::ListenerStopped
            }
            TaskError::Canceled => {
                debug!(listener = listener, origin = origin, "task cancelled");
                DiagnosticKind::TaskCanceled
            }
            _ => {
                error!(
                    listener = listener,
                    origin = origin,
                    label = err.as_label(),
                    "exception occurred in task group of {listener}: {err}"
                );
                DiagnosticKind::TaskFailed
            }
        };
        self.bus.publish(
            Diagnostic::new(kind)
                .with_listener(listener)
                .with_event(origin)
                .with_reason(err.to_string()),
        );
    }

    pub(crate) fn event_discarded(&self, listener: &str, event: &'static str) {
        trace!(
            listener = listener,
            event = event,
            "task still active, event discarded"
        );
        self.bus.publish(
            Diagnostic::new(DiagnosticKind::EventDiscarded)
                .with_listener(listener)
                .with_event(event),
        );
    }

    pub(crate) fn queue_overflow(&self, listener: &str, event: &'static str, capacity: usize) {
        warn!(
            listener = listener,
            event = event,
            capacity = capacity,
            "ordered handler queue is full, event dropped"
        );
        self.bus.publish(
            Diagnostic::new(DiagnosticKind::QueueOverflow)
                .with_listener(listener)
                .with_event(event)
                .with_reason(format!("capacity={capacity}")),
        );
    }

    pub(crate) fn sequence_started(&self, listener: &str) {
        trace!(listener = listener, "sequence started");
        self.bus
            .publish(Diagnostic::new(DiagnosticKind::SequenceStarted).with_listener(listener));
    }

    /// Reports how a sequence ended; failures go through [`Self::task_finished`].
    pub(crate) fn sequence_finished(&self, listener: &str, outcome: &Result<(), TaskError>) {
        if outcome.is_ok() {
            trace!(listener = listener, "sequence finished");
            self.bus
                .publish(Diagnostic::new(DiagnosticKind::SequenceFinished).with_listener(listener));
        } else {
            self.task_finished(listener, SEQUENCE_ORIGIN, outcome);
        }
    }

    pub(crate) fn runaway(&self, err: &RuntimeError) {
        error!(label = err.as_label(), "sequence scheduler aborted tick: {err}");
        let mut d = Diagnostic::new(DiagnosticKind::SchedulerRunaway).with_reason(err.as_message());
        if let RuntimeError::SchedulerRunaway { tick, .. } = err {
            d = d.with_tick(*tick);
        }
        self.bus.publish(d);
    }
}
