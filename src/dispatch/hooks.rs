//! # Per-event hook lists.
//!
//! A [`HookList`] is a copy-on-write, priority-sorted array of hooks:
//!
//! ```text
//! RwLock<Arc<[HookRef<E>]>>
//!   register / unregister  → write lock, build a new array, swap it in
//!   dispatch               → read lock, clone the Arc, iterate without locks
//! ```
//!
//! Dispatch iterates a snapshot, so hooks may register or unregister hooks
//! (including themselves) mid-dispatch; changes apply to the next dispatch.
//!
//! [`HookSlot`] is the type-erased view stored by the manager, one per catalog
//! entry.

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use super::hook::HookRef;
use crate::events::Event;
use crate::listener::ListenerId;

/// Type-erased hook list.
pub(crate) trait HookSlot: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Removes every hook owned by `owner`; returns how many were removed.
    fn remove_owner(&self, owner: ListenerId) -> usize;

    fn clear(&self);

    fn len(&self) -> usize;
}

pub(crate) struct HookList<E> {
    hooks: RwLock<Arc<[HookRef<E>]>>,
}

impl<E: Event> HookList<E> {
    pub(crate) fn new() -> Self {
        Self {
            hooks: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub(crate) fn boxed() -> Box<dyn HookSlot> {
        Box::new(Self::new())
    }

    /// Inserts `hook` after every hook of greater or equal priority.
    ///
    /// Returns `false` if the same hook is already present.
    pub(crate) fn insert(&self, hook: &HookRef<E>) -> bool {
        let mut guard = self.hooks.write();
        if guard.iter().any(|h| Arc::ptr_eq(h, hook)) {
            return false;
        }
        let at = guard
            .iter()
            .position(|h| h.priority() < hook.priority())
            .unwrap_or(guard.len());

        let mut next = Vec::with_capacity(guard.len() + 1);
        next.extend_from_slice(&guard[..at]);
        next.push(Arc::clone(hook));
        next.extend_from_slice(&guard[at..]);
        *guard = Arc::from(next);
        true
    }

    /// Removes `hook`; returns `false` if it was not present.
    pub(crate) fn remove(&self, hook: &HookRef<E>) -> bool {
        self.retain(|h| !Arc::ptr_eq(h, hook)) > 0
    }

    pub(crate) fn snapshot(&self) -> Arc<[HookRef<E>]> {
        Arc::clone(&self.hooks.read())
    }

    /// Keeps hooks matching `keep`; returns how many were removed.
    fn retain(&self, keep: impl Fn(&HookRef<E>) -> bool) -> usize {
        let mut guard = self.hooks.write();
        let next: Vec<_> = guard.iter().filter(|h| keep(h)).cloned().collect();
        let removed = guard.len() - next.len();
        if removed > 0 {
            *guard = Arc::from(next);
        }
        removed
    }
}

impl<E: Event> HookSlot for HookList<E> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn remove_owner(&self, owner: ListenerId) -> usize {
        self.retain(|h| h.owner().id() != owner)
    }

    fn clear(&self) {
        *self.hooks.write() = Arc::from(Vec::new());
    }

    fn len(&self) -> usize {
        self.hooks.read().len()
    }
}
