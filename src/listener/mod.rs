//! Listeners, their scopes and task groups.
//!
//! ## Contents
//! - [`Listener`], [`ListenerRef`], [`ListenerId`] the owner contract
//! - [`ListenerScope`] identity plus lazily created [`TaskGroup`]
//! - [`Toggle`] switchable listener, optionally nested under a parent
//! - [`TaskHandle`] cancellable handle of one spawned body

mod gate;
pub(crate) mod group;
#[allow(clippy::module_inception)]
mod listener;

pub use group::{TaskGroup, TaskHandle};
pub use listener::{Listener, ListenerId, ListenerRef, ListenerScope, Toggle};
