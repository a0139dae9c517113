//! # Priority-ordered synchronous dispatch.
//!
//! [`EventManager`] owns one [`HookList`] per catalog entry, created up front,
//! and fans every dispatched event out to the hooks registered for its exact
//! type.
//!
//! ## Dispatch
//! ```text
//! dispatch(ev)
//!   ├─ unknown type            → Err(DispatchError::UnknownEvent)
//!   ├─ halted                  → Ok(ev) untouched
//!   ├─ ev.completed = false
//!   ├─ for hook in snapshot (priority desc, registration order):
//!   │     owner not running    → skip
//!   │     hook(&mut ev)        → Err/panic logged + HookFailed, continue
//!   ├─ ev.completed = true
//!   └─ Ok(ev)
//! ```
//!
//! ## Rules
//! - Dispatch runs entirely on the caller's thread, lock-free over a snapshot.
//! - Re-entrant dispatch (a hook dispatching another event) is allowed.
//! - Registration changes made during a dispatch apply to the next one.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use tokio::runtime::Handle;
use tracing::debug;

use super::hook::{Hook, HookRef};
use super::hooks::{HookList, HookSlot};
use crate::core::Config;
use crate::error::{DispatchError, HandlerError};
use crate::events::{Event, EventCatalog};
use crate::listener::{Listener, ListenerRef};
use crate::observe::reporter::Reporter;
use crate::observe::Bus;

/// Registry of hooks and synchronous dispatcher.
pub struct EventManager {
    catalog: EventCatalog,
    slots: HashMap<TypeId, Box<dyn HookSlot>>,
    halted: AtomicBool,
    pub(super) reporter: Reporter,
    pub(super) handle: Handle,
    pub(super) ordered_capacity: Option<usize>,
}

impl EventManager {
    /// Creates a manager with an empty hook list for every catalog entry.
    ///
    /// `handle` is the default execution context of async handlers.
    pub fn new(catalog: EventCatalog, bus: Bus, handle: Handle, cfg: &Config) -> Self {
        let slots = catalog
            .iter()
            .map(|key| (key.type_id(), key.new_slot()))
            .collect();
        Self {
            catalog,
            slots,
            halted: AtomicBool::new(false),
            reporter: Reporter::new(bus),
            handle,
            ordered_capacity: cfg.ordered_capacity(),
        }
    }

    /// The closed set of event types this manager accepts.
    pub fn catalog(&self) -> &EventCatalog {
        &self.catalog
    }

    /// Catalog name of `E`, falling back to its Rust type name.
    pub(crate) fn event_name<E: Event>(&self) -> &'static str {
        self.catalog.name_of::<E>().unwrap_or(type_name::<E>())
    }

    pub(super) fn hooks<E: Event>(&self) -> Result<&HookList<E>, DispatchError> {
        self.slots
            .get(&TypeId::of::<E>())
            .and_then(|slot| slot.as_any().downcast_ref::<HookList<E>>())
            .ok_or(DispatchError::UnknownEvent {
                type_name: type_name::<E>(),
            })
    }

    /// Registers `hook` and returns it.
    ///
    /// Registering a hook that is already registered is a no-op.
    pub fn register<E: Event>(&self, hook: HookRef<E>) -> Result<HookRef<E>, DispatchError> {
        let list = self.hooks::<E>()?;
        if list.insert(&hook) {
            debug!(
                listener = hook.owner().name(),
                event = self.event_name::<E>(),
                priority = hook.priority(),
                "hook registered"
            );
        }
        Ok(hook)
    }

    /// Registers a synchronous handler for `E`.
    ///
    /// # Example
    /// ```rust
    /// use tickvisor::{impl_event, priority, Config, EventFlags, ListenerRef, Runtime, Toggle};
    ///
    /// #[derive(Clone, Default)]
    /// struct Jump { flags: EventFlags, height: f32 }
    /// impl_event!(Jump);
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let rt = Runtime::builder(Config::default()).event::<Jump>("jump").build()?;
    /// let owner: ListenerRef = Toggle::new("high-jump");
    ///
    /// rt.events().handler(&owner, priority::MODIFY, |ev: &mut Jump| {
    ///     ev.height *= 2.0;
    ///     Ok(())
    /// })?;
    ///
    /// let ev = rt.events().dispatch(Jump { height: 1.0, ..Default::default() })?;
    /// assert_eq!(ev.height, 2.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn handler<E, F>(
        &self,
        owner: &ListenerRef,
        priority: i16,
        handler: F,
    ) -> Result<HookRef<E>, DispatchError>
    where
        E: Event,
        F: Fn(&mut E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(Hook::new(owner.clone(), priority, handler))
    }

    /// Removes `hook`; a no-op if it is not registered.
    ///
    /// Returns `true` if the hook was removed.
    pub fn unregister<E: Event>(&self, hook: &HookRef<E>) -> bool {
        self.hooks::<E>().is_ok_and(|list| list.remove(hook))
    }

    /// Removes every hook owned by `listener`, across all event types.
    pub fn unregister_listener(&self, listener: &dyn Listener) -> usize {
        let id = listener.id();
        let removed: usize = self.slots.values().map(|slot| slot.remove_owner(id)).sum();
        debug!(listener = listener.name(), removed = removed, "listener unregistered");
        removed
    }

    /// Removes every hook of every type.
    pub fn unregister_all(&self) {
        for slot in self.slots.values() {
            slot.clear();
        }
    }

    /// Number of hooks currently registered for `E`.
    pub fn hook_count<E: Event>(&self) -> Result<usize, DispatchError> {
        Ok(HookSlot::len(self.hooks::<E>()?))
    }

    /// Stops all further dispatching; `dispatch` returns events untouched.
    pub fn halt(&self) {
        self.halted.store(true, AtomicOrdering::Release);
    }

    /// True once [`halt`](Self::halt) was called.
    pub fn is_halted(&self) -> bool {
        self.halted.load(AtomicOrdering::Acquire)
    }

    /// Delivers `event` to every hook registered for its type and returns it.
    ///
    /// Hook failures and panics are logged, published as `HookFailed` and
    /// never propagated; the remaining hooks still run.
    pub fn dispatch<E: Event>(&self, mut event: E) -> Result<E, DispatchError> {
        let list = self.hooks::<E>()?;
        if self.is_halted() {
            return Ok(event);
        }

        let snapshot = list.snapshot();
        event.flags_mut().set_completed(false);
        for hook in snapshot.iter() {
            let owner = hook.owner();
            if !owner.running() {
                continue;
            }
            if let Err(err) = hook.invoke(&mut event) {
                self.reporter
                    .hook_failed(owner.name(), self.event_name::<E>(), &err);
            }
        }
        event.flags_mut().set_completed(true);
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::dispatch::priority;
    use crate::events::{CancellableEvent, EventFlags};
    use crate::listener::Toggle;
    use crate::observe::DiagnosticKind;

    #[derive(Clone, Default)]
    struct Chat {
        flags: EventFlags,
        text: String,
    }
    crate::impl_event!(Chat, cancellable);

    #[derive(Default)]
    struct Undeclared {
        flags: EventFlags,
    }
    crate::impl_event!(Undeclared);

    fn manager(bus: &Bus) -> EventManager {
        let mut catalog = EventCatalog::new();
        catalog.declare::<Chat>("chat").unwrap();
        EventManager::new(catalog, bus.clone(), Handle::current(), &Config::default())
    }

    fn record(
        events: &EventManager,
        owner: &ListenerRef,
        priority: i16,
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> HookRef<Chat> {
        let log = Arc::clone(log);
        events
            .handler(owner, priority, move |_: &mut Chat| {
                log.lock().push(name);
                Ok(())
            })
            .unwrap()
    }

    #[tokio::test]
    async fn equal_priorities_keep_registration_order() {
        let bus = Bus::new(16);
        let events = manager(&bus);
        let owner: ListenerRef = Toggle::new("owner");
        let log = Arc::new(Mutex::new(Vec::new()));

        record(&events, &owner, priority::NORMAL, &log, "first");
        record(&events, &owner, priority::READ_FINAL, &log, "last");
        record(&events, &owner, priority::NORMAL, &log, "second");
        record(&events, &owner, priority::SAFETY, &log, "safety");

        let ev = events.dispatch(Chat::default()).unwrap();
        assert!(ev.is_completed());
        assert_eq!(*log.lock(), ["safety", "first", "second", "last"]);
    }

    #[tokio::test]
    async fn stopped_owners_are_skipped() {
        let bus = Bus::new(16);
        let mut diagnostics = bus.subscribe();
        let events = manager(&bus);
        let log = Arc::new(Mutex::new(Vec::new()));

        let active: ListenerRef = Toggle::new("active");
        let idle = Toggle::new("idle");
        let idle_ref: ListenerRef = idle.clone();
        record(&events, &active, priority::NORMAL, &log, "active");
        record(&events, &idle_ref, priority::NORMAL, &log, "idle");

        idle.disable();
        events.dispatch(Chat::default()).unwrap();
        idle.enable();
        events.dispatch(Chat::default()).unwrap();

        assert_eq!(*log.lock(), ["active", "active", "idle"]);
        // Skipping a stopped owner is silent.
        assert!(diagnostics.try_recv().is_err());
    }

    #[tokio::test]
    async fn failing_hooks_do_not_stop_dispatch() {
        let bus = Bus::new(16);
        let mut diagnostics = bus.subscribe();
        let events = manager(&bus);
        let owner: ListenerRef = Toggle::new("faulty");
        let log = Arc::new(Mutex::new(Vec::new()));

        events
            .handler(&owner, priority::FIRST, |_: &mut Chat| {
                Err(HandlerError::fail("boom"))
            })
            .unwrap();
        events
            .handler(&owner, priority::MODIFY, |_: &mut Chat| -> Result<(), HandlerError> {
                panic!("handler panic")
            })
            .unwrap();
        record(&events, &owner, priority::LAST, &log, "survivor");

        events.dispatch(Chat::default()).unwrap();
        assert_eq!(*log.lock(), ["survivor"]);

        let first = diagnostics.try_recv().unwrap();
        assert_eq!(first.kind, DiagnosticKind::HookFailed);
        assert_eq!(first.event, Some("chat"));
        assert_eq!(first.listener.as_deref(), Some("faulty"));
        let second = diagnostics.try_recv().unwrap();
        assert_eq!(second.kind, DiagnosticKind::HookFailed);
        assert!(second.reason.as_deref().unwrap_or_default().contains("handler panic"));
    }

    #[tokio::test]
    async fn cancellation_is_visible_to_later_hooks_and_the_producer() {
        let bus = Bus::new(16);
        let events = manager(&bus);
        let owner: ListenerRef = Toggle::new("filter");
        let seen = Arc::new(Mutex::new(None));

        events
            .handler(&owner, priority::SAFETY, |ev: &mut Chat| {
                if ev.text.starts_with('#') {
                    ev.cancel_event().ok();
                }
                Ok(())
            })
            .unwrap();
        let flag = Arc::clone(&seen);
        events
            .handler(&owner, priority::READ_FINAL, move |ev: &mut Chat| {
                *flag.lock() = Some(ev.is_cancelled());
                Ok(())
            })
            .unwrap();

        let ev = events
            .dispatch(Chat {
                text: "#cmd".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(ev.is_cancelled());
        assert_eq!(*seen.lock(), Some(true));

        let mut ev = ev;
        assert!(ev.cancel_event().is_err());
    }

    #[tokio::test]
    async fn registration_changes_apply_to_the_next_dispatch() {
        let bus = Bus::new(16);
        let events = Arc::new(manager(&bus));
        let owner: ListenerRef = Toggle::new("owner");
        let log = Arc::new(Mutex::new(Vec::new()));

        let late = Hook::new(owner.clone(), priority::LAST, {
            let log = Arc::clone(&log);
            move |_: &mut Chat| {
                log.lock().push("late");
                Ok(())
            }
        });
        let registrar = Arc::clone(&events);
        let pending = late.clone();
        events
            .handler(&owner, priority::FIRST, move |_: &mut Chat| {
                registrar.register(pending.clone()).map(|_| ()).ok();
                Ok(())
            })
            .unwrap();

        events.dispatch(Chat::default()).unwrap();
        assert!(log.lock().is_empty());
        events.dispatch(Chat::default()).unwrap();
        assert_eq!(*log.lock(), ["late"]);

        assert!(events.unregister(&late));
        assert!(!events.unregister(&late));
        assert_eq!(events.hook_count::<Chat>().unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_types_and_halted_dispatch() {
        let bus = Bus::new(16);
        let events = manager(&bus);
        let owner: ListenerRef = Toggle::new("owner");
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&events, &owner, priority::NORMAL, &log, "hook");

        assert!(matches!(
            events.dispatch(Undeclared::default()),
            Err(DispatchError::UnknownEvent { .. })
        ));
        assert!(events
            .handler(&owner, priority::NORMAL, |_: &mut Undeclared| Ok(()))
            .is_err());

        events.halt();
        let ev = events.dispatch(Chat::default()).unwrap();
        assert!(!ev.is_completed());
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn unregister_listener_removes_only_its_hooks() {
        let bus = Bus::new(16);
        let events = manager(&bus);
        let log = Arc::new(Mutex::new(Vec::new()));
        let a: ListenerRef = Toggle::new("a");
        let b: ListenerRef = Toggle::new("b");
        record(&events, &a, priority::NORMAL, &log, "a1");
        record(&events, &a, priority::LAST, &log, "a2");
        record(&events, &b, priority::NORMAL, &log, "b");

        assert_eq!(events.unregister_listener(a.as_ref()), 2);
        events.dispatch(Chat::default()).unwrap();
        assert_eq!(*log.lock(), ["b"]);

        events.unregister_all();
        assert_eq!(events.hook_count::<Chat>().unwrap(), 0);
    }
}
