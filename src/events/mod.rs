//! Event payloads, the event catalog and the built-in clock event.
//!
//! ## Contents
//! - [`Event`], [`CancellableEvent`], [`EventFlags`] the payload contract
//! - [`EventState`] pre/post phase marker for events raised around an action
//! - [`EventCatalog`], [`EventKey`] the closed set of dispatchable types
//! - [`TickEvent`] the external clock signal driving sequences

pub(crate) mod catalog;
mod event;
mod tick;

pub use catalog::{EventCatalog, EventKey};
pub use event::{CancellableEvent, Event, EventFlags, EventState};
pub use tick::{TickEvent, TICKS_PER_SECOND};
