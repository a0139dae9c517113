//! # Closed set of dispatchable event types.
//!
//! The catalog is fixed when the runtime is built: every event type gets a
//! unique, human-readable name and a pre-created (empty) hook list in the
//! [`EventManager`](crate::EventManager). Dispatching or registering a type that
//! is not in the catalog is a programming error
//! ([`DispatchError::UnknownEvent`]).
//!
//! Names are resolved case-insensitively by [`EventCatalog::lookup`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::dispatch::hooks::{HookList, HookSlot};
use crate::error::DispatchError;
use crate::events::event::Event;

/// Descriptor of one declared event type.
#[derive(Clone, Copy, Debug)]
pub struct EventKey {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
    make_slot: fn() -> Box<dyn HookSlot>,
}

impl EventKey {
    fn of<E: Event>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<E>(),
            type_name: type_name::<E>(),
            make_slot: HookList::<E>::boxed,
        }
    }

    /// Declared name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Rust type name of the event.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type identity of the event.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn new_slot(&self) -> Box<dyn HookSlot> {
        (self.make_slot)()
    }
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for EventKey {}

/// Closed mapping between event types and their names.
#[derive(Clone, Debug, Default)]
pub struct EventCatalog {
    keys: Vec<EventKey>,
    by_type: HashMap<TypeId, usize>,
    by_name: HashMap<String, usize>,
}

impl EventCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `E` under `name`.
    ///
    /// Fails with [`DispatchError::DuplicateEvent`] if the type or the
    /// (case-folded) name is already declared.
    pub fn declare<E: Event>(&mut self, name: &'static str) -> Result<&EventKey, DispatchError> {
        let folded = name.to_ascii_lowercase();
        if self.by_name.contains_key(&folded) {
            return Err(DispatchError::DuplicateEvent {
                name: name.to_string(),
            });
        }
        if let Some(&idx) = self.by_type.get(&TypeId::of::<E>()) {
            return Err(DispatchError::DuplicateEvent {
                name: self.keys[idx].name.to_string(),
            });
        }

        let idx = self.keys.len();
        self.keys.push(EventKey::of::<E>(name));
        self.by_type.insert(TypeId::of::<E>(), idx);
        self.by_name.insert(folded, idx);
        Ok(&self.keys[idx])
    }

    /// Resolves a name, ignoring ASCII case.
    pub fn lookup(&self, name: &str) -> Option<&EventKey> {
        self.by_name
            .get(&name.to_ascii_lowercase())
            .map(|&idx| &self.keys[idx])
    }

    /// Descriptor for `E`, if declared.
    pub fn key_of<E: Event>(&self) -> Option<&EventKey> {
        self.key_by_id(TypeId::of::<E>())
    }

    fn key_by_id(&self, id: TypeId) -> Option<&EventKey> {
        self.by_type.get(&id).map(|&idx| &self.keys[idx])
    }

    /// Declared name of `E`, if any.
    pub fn name_of<E: Event>(&self) -> Option<&'static str> {
        self.key_of::<E>().map(EventKey::name)
    }

    /// True if `E` is declared.
    pub fn contains<E: Event>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<E>())
    }

    /// Number of declared types.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Declared descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &EventKey> {
        self.keys.iter()
    }
}
