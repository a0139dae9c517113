//! Shared state of single-task and ordered async handlers.

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::listener::TaskHandle;

/// The one task a cancel-previous or discard-latest handler may have.
///
/// The lock makes check-and-install atomic across concurrent dispatches.
pub(super) struct ActiveSlot {
    current: Mutex<Option<TaskHandle>>,
}

impl ActiveSlot {
    pub(super) fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Cancels the current task (if any) and installs the one built by `start`.
    pub(super) fn replace(&self, start: impl FnOnce() -> TaskHandle) {
        let mut current = self.current.lock();
        if let Some(previous) = current.take() {
            previous.cancel();
        }
        *current = Some(start());
    }

    /// Installs the task built by `start` unless one is still active.
    ///
    /// Returns `false` (and never calls `start`) if a task is active.
    pub(super) fn start_if_idle(&self, start: impl FnOnce() -> TaskHandle) -> bool {
        let mut current = self.current.lock();
        if current.as_ref().is_some_and(TaskHandle::is_active) {
            return false;
        }
        *current = Some(start());
        true
    }
}

/// Sending half of an ordered handler's queue.
pub(super) enum QueueTx<E> {
    Bounded(mpsc::Sender<E>),
    Unbounded(mpsc::UnboundedSender<E>),
}

/// Receiving half of an ordered handler's queue.
pub(super) enum QueueRx<E> {
    Bounded(mpsc::Receiver<E>),
    Unbounded(mpsc::UnboundedReceiver<E>),
}

/// Why an event could not be queued.
pub(super) enum Rejected<E> {
    /// Bounded queue is full; the event is dropped.
    Full,
    /// The consumer ended; the event is handed back for a fresh consumer.
    Closed(E),
}

pub(super) fn queue<E>(capacity: Option<usize>) -> (QueueTx<E>, QueueRx<E>) {
    match capacity {
        Some(cap) => {
            let (tx, rx) = mpsc::channel(cap.max(1));
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        }
    }
}

impl<E> QueueTx<E> {
    pub(super) fn try_send(&self, event: E) -> Result<(), Rejected<E>> {
        match self {
            QueueTx::Bounded(tx) => tx.try_send(event).map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => Rejected::Full,
                mpsc::error::TrySendError::Closed(event) => Rejected::Closed(event),
            }),
            QueueTx::Unbounded(tx) => tx.send(event).map_err(|err| Rejected::Closed(err.0)),
        }
    }
}

impl<E> QueueRx<E> {
    pub(super) async fn recv(&mut self) -> Option<E> {
        match self {
            QueueRx::Bounded(rx) => rx.recv().await,
            QueueRx::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// Queue of an ordered handler plus its current consumer's sender.
///
/// A single lock guards the sender so that "consumer gone, start a new one"
/// is decided by exactly one dispatch.
pub(super) struct OrderedSlot<E> {
    tx: Mutex<Option<QueueTx<E>>>,
    capacity: Option<usize>,
}

impl<E> OrderedSlot<E> {
    pub(super) fn new(capacity: Option<usize>) -> Self {
        Self {
            tx: Mutex::new(None),
            capacity,
        }
    }

    pub(super) fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Queues `event`, starting a consumer with `start` when none is alive.
    ///
    /// Returns `false` if the bounded queue was full and the event was dropped.
    pub(super) fn push(&self, event: E, start: impl FnOnce(QueueRx<E>)) -> bool {
        let mut tx = self.tx.lock();
        let event = match tx.as_ref() {
            Some(current) => match current.try_send(event) {
                Ok(()) => return true,
                Err(Rejected::Full) => return false,
                Err(Rejected::Closed(event)) => event,
            },
            None => event,
        };
        let (next, rx) = queue(self.capacity);
        let accepted = next.try_send(event).is_ok();
        start(rx);
        *tx = Some(next);
        accepted
    }
}
