//! # Diagnostic subscriber trait.
//!
//! Provides [`Subscribe`], an extension point for plugging custom diagnostic
//! handlers into the runtime.
//!
//! Each subscriber gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-subscriber bounded queue** (capacity via [`Subscribe::queue_capacity`])
//! - **Panic isolation** (panics are reported as `DiagnosticKind::SubscriberPanicked`)
//!
//! ## Architecture
//! ```text
//! SubscriberSet ──► [bounded queue] ──► worker task ──► subscriber.on_diagnostic()
//!                                    └─► panic caught → DiagnosticKind::SubscriberPanicked
//! ```
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use tickvisor::{Diagnostic, DiagnosticKind, Subscribe};
//!
//! struct Alerts;
//!
//! #[async_trait]
//! impl Subscribe for Alerts {
//!     async fn on_diagnostic(&self, d: &Diagnostic) {
//!         if matches!(d.kind, DiagnosticKind::TaskFailed) {
//!             // page someone, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "alerts" }
//!     fn queue_capacity(&self) -> usize { 256 }
//! }
//! ```

use async_trait::async_trait;

use super::diagnostic::Diagnostic;

/// Diagnostic subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this subscriber's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single record.
    ///
    /// Called from a dedicated worker task, never from the dispatching thread.
    /// Records are delivered in FIFO order per subscriber.
    async fn on_diagnostic(&self, diagnostic: &Diagnostic);

    /// Returns the subscriber name used in logs and overflow/panic records.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this subscriber.
    ///
    /// On overflow the record is dropped for this subscriber only and a
    /// `DiagnosticKind::SubscriberOverflow` is published. Clamped to a minimum of 1.
    ///
    /// Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
