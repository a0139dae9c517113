//! Hook registry, synchronous dispatch and async handlers.
//!
//! ## Contents
//! - [`EventManager`] the registry and dispatcher
//! - [`Hook`], [`HookRef`] handler bound to an owner and a priority
//! - [`priority`] conventional priority levels
//! - [`Behavior`], [`SuspendSpec`] policies of async handlers
//! - [`WaitMatches`] future resolving on the next matching event
//!
//! ## Architecture
//! ```text
//!                  ┌──────────── EventManager ─────────────┐
//! register(hook) ─►│ TypeId ─► HookList<E> (COW, prio desc) │
//!                  └───────────────┬───────────────────────┘
//! dispatch(ev) ───────────────────►│ snapshot ─► hook(&mut ev) ... ─► ev
//!                                  │
//!          suspend_handler(spec) ──┘ hook ─► TaskGroup of owner (policy)
//!          wait_matches(pred)   ──── temporary hook ─► oneshot ─► awaiting body
//! ```

mod behavior;
mod hook;
pub(crate) mod hooks;
mod manager;
pub mod priority;
mod slot;
mod suspend;
mod wait;

pub use behavior::{Behavior, SuspendSpec};
pub use hook::{Hook, HookRef};
pub use manager::EventManager;
pub use wait::WaitMatches;
