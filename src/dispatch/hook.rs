//! # Synchronous hooks.
//!
//! A [`Hook`] binds a handler closure to an owning listener and a priority.
//! Hooks are shared as [`HookRef`] (`Arc<Hook<E>>`); registration identity is
//! pointer identity, so registering the same `HookRef` twice is a no-op and
//! unregistering needs the exact `HookRef` returned by registration.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::error::HandlerError;
use crate::listener::ListenerRef;

type HandlerFn<E> = dyn Fn(&mut E) -> Result<(), HandlerError> + Send + Sync;

/// Shared reference to a registered hook.
pub type HookRef<E> = Arc<Hook<E>>;

/// Handler closure bound to an owner and a priority.
pub struct Hook<E> {
    owner: ListenerRef,
    priority: i16,
    handler: Box<HandlerFn<E>>,
}

impl<E> Hook<E> {
    /// Creates a hook ready for [`EventManager::register`](crate::EventManager::register).
    pub fn new<F>(owner: ListenerRef, priority: i16, handler: F) -> HookRef<E>
    where
        F: Fn(&mut E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            owner,
            priority,
            handler: Box::new(handler),
        })
    }

    /// Owning listener.
    pub fn owner(&self) -> &ListenerRef {
        &self.owner
    }

    /// Ordering key, higher runs first.
    pub fn priority(&self) -> i16 {
        self.priority
    }

    /// Calls the handler, turning a panic into [`HandlerError::Panicked`].
    pub(crate) fn invoke(&self, event: &mut E) -> Result<(), HandlerError> {
        catch_unwind(AssertUnwindSafe(|| (self.handler)(event)))
            .unwrap_or_else(|panic| Err(HandlerError::from_panic(panic)))
    }
}

impl<E> fmt::Debug for Hook<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("owner", &self.owner.name())
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}
