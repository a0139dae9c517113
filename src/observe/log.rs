//! # Stdout subscriber for debugging and demos.
//!
//! [`LogWriter`] prints one line per diagnostic:
//!
//! ```text
//! [hook_failed] listener=Some("anti-bot") event=Some("attack") reason=Some("handler failed: ...")
//! [listener_stopped] listener=Some("scaffold") event=Some("sequence")
//! [scheduler_runaway] tick=Some(812) reason=Some("...")
//! ```
//!
//! Sequence start/finish records are skipped; they fire on every sequence.

use async_trait::async_trait;

use super::diagnostic::{Diagnostic, DiagnosticKind};
use super::subscriber::Subscribe;

/// Simple stdout logging subscriber.
///
/// Not intended for production use; implement [`Subscribe`] for structured
/// logging or metrics.
pub struct LogWriter;

impl LogWriter {
    /// Renders `d` the way [`LogWriter`] prints it, or `None` for skipped kinds.
    pub fn render(d: &Diagnostic) -> Option<String> {
        let label = d.kind.as_label();
        let line = match d.kind {
            DiagnosticKind::SequenceStarted | DiagnosticKind::SequenceFinished => return None,
            DiagnosticKind::SchedulerRunaway => {
                format!("[{label}] tick={:?} reason={:?}", d.tick, d.reason)
            }
            DiagnosticKind::SubscriberPanicked | DiagnosticKind::SubscriberOverflow => {
                format!("[{label}] subscriber={:?} reason={:?}", d.listener, d.reason)
            }
            DiagnosticKind::TaskCanceled
            | DiagnosticKind::ListenerStopped
            | DiagnosticKind::EventDiscarded => {
                format!("[{label}] listener={:?} event={:?}", d.listener, d.event)
            }
            DiagnosticKind::HookFailed
            | DiagnosticKind::TaskFailed
            | DiagnosticKind::QueueOverflow => format!(
                "[{label}] listener={:?} event={:?} reason={:?}",
                d.listener, d.event, d.reason
            ),
        };
        Some(line)
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_diagnostic(&self, d: &Diagnostic) {
        if let Some(line) = Self::render(d) {
            println!("{line}");
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_failures_and_skips_lifecycle() {
        let failed = Diagnostic::new(DiagnosticKind::HookFailed)
            .with_listener("anti-bot")
            .with_event("attack")
            .with_reason("boom");
        assert_eq!(
            LogWriter::render(&failed).as_deref(),
            Some(r#"[hook_failed] listener=Some("anti-bot") event=Some("attack") reason=Some("boom")"#)
        );

        let started = Diagnostic::new(DiagnosticKind::SequenceStarted).with_listener("x");
        assert_eq!(LogWriter::render(&started), None);
    }
}
