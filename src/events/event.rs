//! # Event payloads and their dispatch flags.
//!
//! Every dispatchable type implements [`Event`], which exposes an
//! [`EventFlags`] value owned by the payload. The dispatcher is the only writer
//! of the completion flag; handlers may flip the cancel flag of events that
//! also implement [`CancellableEvent`].
//!
//! ## Lifecycle
//! ```text
//! producer ──► EventManager::dispatch(ev)
//!                 ├─ is_completed = false
//!                 ├─ hook(&mut ev) ... hook(&mut ev)   (may call cancel_event)
//!                 └─ is_completed = true
//!              ◄── ev returned to producer (inspect is_cancelled)
//! ```
//!
//! ## Example
//! ```rust
//! use tickvisor::{impl_event, CancellableEvent, Event, EventFlags};
//!
//! #[derive(Clone, Default)]
//! struct ChatSend {
//!     flags: EventFlags,
//!     message: String,
//! }
//! impl_event!(ChatSend, cancellable);
//!
//! let mut ev = ChatSend { message: "hi".into(), ..Default::default() };
//! assert!(ev.cancel_event().is_ok());
//! assert!(ev.is_cancelled());
//! assert!(!ev.is_completed());
//! ```

use crate::error::EventError;

/// Completion and cancellation state carried by every event.
///
/// Only the dispatcher sets completion; cancellation is reachable through
/// [`CancellableEvent::cancel_event`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventFlags {
    completed: bool,
    cancelled: bool,
}

impl EventFlags {
    /// Fresh flags: not completed, not cancelled.
    pub const fn new() -> Self {
        Self {
            completed: false,
            cancelled: false,
        }
    }

    /// True once the dispatcher finished fanning the event out.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// True if any handler cancelled the event.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    #[inline]
    pub(crate) fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }

    pub(crate) fn cancel(&mut self) -> Result<(), EventError> {
        if self.completed {
            return Err(EventError::AlreadyCompleted);
        }
        self.cancelled = true;
        Ok(())
    }
}

/// A dispatchable payload.
///
/// Implement it with [`impl_event!`](crate::impl_event) for structs that carry
/// a `flags: EventFlags` field.
pub trait Event: Send + 'static {
    /// Read access to the dispatch flags.
    fn flags(&self) -> &EventFlags;

    /// Write access to the dispatch flags.
    ///
    /// The completion bit can only be changed by the dispatcher.
    fn flags_mut(&mut self) -> &mut EventFlags;

    /// True once dispatch has finished.
    fn is_completed(&self) -> bool {
        self.flags().is_completed()
    }
}

/// An event that handlers may cancel while it is being dispatched.
pub trait CancellableEvent: Event {
    /// True if a handler cancelled the event.
    fn is_cancelled(&self) -> bool {
        self.flags().is_cancelled()
    }

    /// Marks the event as cancelled.
    ///
    /// Idempotent while the event is being dispatched; fails with
    /// [`EventError::AlreadyCompleted`] once dispatch has returned.
    fn cancel_event(&mut self) -> Result<(), EventError> {
        self.flags_mut().cancel()
    }
}

/// Phase of an event raised around an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventState {
    /// Raised before the action happens.
    Pre,
    /// Raised after the action happened.
    Post,
}

impl EventState {
    /// Stable name of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventState::Pre => "PRE",
            EventState::Post => "POST",
        }
    }
}

/// Implements [`Event`] (and optionally [`CancellableEvent`]) for a struct with
/// a `flags: EventFlags` field.
///
/// ```rust
/// use tickvisor::{impl_event, EventFlags};
///
/// #[derive(Clone, Default)]
/// struct WorldChange { flags: EventFlags }
/// impl_event!(WorldChange);
///
/// #[derive(Clone, Default)]
/// struct Attack { flags: EventFlags, target: u32 }
/// impl_event!(Attack, cancellable);
/// ```
#[macro_export]
macro_rules! impl_event {
    ($ty:ty) => {
        impl $crate::Event for $ty {
            fn flags(&self) -> &$crate::EventFlags {
                &self.flags
            }
            fn flags_mut(&mut self) -> &mut $crate::EventFlags {
                &mut self.flags
            }
        }
    };
    ($ty:ty, cancellable) => {
        $crate::impl_event!($ty);
        impl $crate::CancellableEvent for $ty {}
    };
}
