//! # Non-blocking diagnostic fan-out to multiple subscribers.
//!
//! ## Architecture
//! ```text
//! emit(diagnostic)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_diagnostic()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     ├──► [queue 2] ──► worker 2 ──► subscriber2.on_diagnostic()
//!     └──► [queue N] ──► worker N ──► subscriberN.on_diagnostic()
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process record N while B processes N+5
//! - **Overflow**: record dropped for that subscriber only, `SubscriberOverflow` published
//! - **Non-blocking**: `emit()` returns immediately (uses `try_send`)
//! - **Per-subscriber FIFO**: each subscriber sees records in order
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber panics while holding a lock.

use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::bus::Bus;
use super::diagnostic::Diagnostic;
use super::subscriber::Subscribe;
use crate::error::panic_info;

/// Per-subscriber channel metadata.
struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Diagnostic>>,
}

/// Fan-out coordinator for multiple diagnostic subscribers.
pub struct SubscriberSet {
    channels: Mutex<Vec<SubscriberChannel>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker task per subscriber on `handle`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus, handle: &Handle) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let cap = sub.queue_capacity().max(1);
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Diagnostic>>(cap);
            let bus_for_worker = bus.clone();

            let worker = handle.spawn(async move {
                while let Some(d) = rx.recv().await {
                    let fut = sub.on_diagnostic(d.as_ref());
                    if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        let info = panic_info(panic_err.as_ref());
                        bus_for_worker.publish(Diagnostic::subscriber_panicked(sub.name(), info));
                    }
                }
            });
            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(worker);
        }
        Self {
            channels: Mutex::new(channels),
            workers: Mutex::new(workers),
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    /// True if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }

    /// Emits a record to all subscribers.
    ///
    /// Overflow records are not re-published if they themselves overflow.
    pub fn emit(&self, d: &Diagnostic) {
        let d = Arc::new(d.clone());
        let is_overflow = d.is_subscriber_overflow();

        for channel in self.channels.lock().iter() {
            let reason = match channel.sender.try_send(Arc::clone(&d)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow {
                self.bus
                    .publish(Diagnostic::subscriber_overflow(channel.name, reason));
            }
        }
    }

    /// Gracefully shuts down all subscriber workers.
    ///
    /// 1. Drops all channel senders (workers see channel closed)
    /// 2. Awaits all worker tasks to finish
    pub async fn shutdown(&self) {
        self.channels.lock().clear();

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observe::diagnostic::DiagnosticKind;
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;

    struct Forward(UnboundedSender<DiagnosticKind>);

    #[async_trait]
    impl Subscribe for Forward {
        async fn on_diagnostic(&self, d: &Diagnostic) {
            let _ = self.0.send(d.kind);
        }
        fn name(&self) -> &'static str {
            "forward"
        }
    }

    struct Explodes;

    #[async_trait]
    impl Subscribe for Explodes {
        async fn on_diagnostic(&self, _d: &Diagnostic) {
            panic!("subscriber exploded");
        }
        fn name(&self) -> &'static str {
            "explodes"
        }
    }

    #[tokio::test]
    async fn panicking_subscriber_is_isolated() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let (tx, mut seen) = mpsc::unbounded_channel();
        let set = SubscriberSet::new(
            vec![Arc::new(Explodes), Arc::new(Forward(tx))],
            bus.clone(),
            &Handle::current(),
        );
        assert_eq!(set.len(), 2);

        set.emit(&Diagnostic::new(DiagnosticKind::TaskFailed));

        assert_eq!(seen.recv().await, Some(DiagnosticKind::TaskFailed));
        let published = rx.recv().await.unwrap();
        assert_eq!(published.kind, DiagnosticKind::SubscriberPanicked);
        assert_eq!(published.listener.as_deref(), Some("explodes"));
        assert_eq!(published.reason.as_deref(), Some("subscriber exploded"));

        set.shutdown().await;
        assert!(set.is_empty());
    }
}
