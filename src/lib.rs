//! # tickvisor
//!
//! **Tickvisor** is a priority event dispatcher with policy-driven async
//! handlers and a tick-synchronized sequence scheduler.
//!
//! Producers dispatch typed events synchronously; listeners react through
//! plain hooks, through asynchronous handlers that run in the listener's own
//! task group, or through *sequences*: multi-step procedures that suspend for
//! a number of ticks of an external clock.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer                          external clock (20/s)
//!      │ dispatch(ev)                        │ Runtime::tick()
//!      ▼                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  EventManager                                                     │
//! │  - EventCatalog (closed set of named event types)                 │
//! │  - TypeId ─► HookList<E> (copy-on-write, priority desc)           │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               ▼
//!   plain hook        async handler      sequence_handler   TickEvent hook
//!   (sync, &mut ev)   (policy: Parallel,  (one sequence      @ priority::FIRST
//!                      Ordered, Cancel-    per event)            │
//!                      Previous, Discard-        │               ▼
//!                      Latest)                   └──────► SequenceManager
//!                          │                                 pending ─► running
//!                          ▼                                 poll bodies whose
//!                 TaskGroup of the owner                     tick wait is over
//!                 (tokio tasks, CancellationToken)
//!                          │                                     │
//!                          └──────── failures / drops ───────────┘
//!                                          ▼
//!                               tracing + Bus (broadcast)
//!                                          ▼
//!                               SubscriberSet (per-sub queues)
//! ```
//!
//! ### Sequence lifecycle
//! ```text
//! start(owner, body)
//!   ├─ owner not running ─► finished (body never runs)
//!   └─ poll body until first suspension ─► pending
//!
//! tick T+1: pending ─► running
//! every tick:
//!   ├─ finished          ─► removed
//!   ├─ cancelled         ─► finished(Canceled | ListenerStopped), on_cancellation callbacks
//!   └─ elapsed += 1; elapsed ≥ target?
//!        ├─ owner stopped ─► finished(ListenerStopped), on_cancellation callbacks
//!        └─ poll body ─► Ready(Ok)  ─► finished
//!                        Ready(Err) ─► finished, logged at error
//!                        Pending    ─► stays running
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------|---------------------------------------------|
//! | **Events**        | Typed payloads with completion/cancel flags.              | [`Event`], [`CancellableEvent`], [`impl_event!`] |
//! | **Dispatch**      | Priority-ordered synchronous fan-out.                     | [`EventManager`], [`Hook`], [`priority`]    |
//! | **Async handlers**| Policies for overlapping asynchronous work.               | [`Behavior`], [`SuspendSpec`]               |
//! | **Sequences**     | Tick-counted suspension inside async bodies.              | [`Sequence`], [`SequenceManager`]           |
//! | **Listeners**     | Running gate and per-owner task group.                    | [`Listener`], [`Toggle`], [`TaskGroup`]     |
//! | **Diagnostics**   | Failures and drops as broadcast records.                  | [`Diagnostic`], [`Subscribe`]               |
//! | **Errors**        | Typed errors for handlers, tasks and configuration.       | [`TaskError`], [`DispatchError`]            |
//! | **Configuration** | Centralize runtime settings.                              | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use tickvisor::{
//!     impl_event, priority, CancellableEvent, Config, EventFlags, ListenerRef, Runtime,
//!     SuspendSpec, Toggle,
//! };
//!
//! #[derive(Clone, Default)]
//! struct ChatSend { flags: EventFlags, message: String }
//! impl_event!(ChatSend, cancellable);
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rt = Runtime::builder(Config::default())
//!         .event::<ChatSend>("chatSend")
//!         .build()?;
//!
//!     let filter: ListenerRef = Toggle::new("filter");
//!     rt.events().handler(&filter, priority::SAFETY, |ev: &mut ChatSend| {
//!         if ev.message.starts_with('#') {
//!             ev.cancel_event().ok();
//!         }
//!         Ok(())
//!     })?;
//!
//!     let echo: ListenerRef = Toggle::new("echo");
//!     rt.events().suspend_handler(&echo, SuspendSpec::ordered(), |ev: ChatSend| async move {
//!         println!("sent: {}", ev.message);
//!         Ok(())
//!     })?;
//!
//!     let ev = rt.dispatch(ChatSend { message: "#secret".into(), ..Default::default() })?;
//!     assert!(ev.is_cancelled());
//!
//!     rt.tick();
//!     rt.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod dispatch;
mod error;
mod events;
mod listener;
mod observe;
mod sequence;

// ---- Public re-exports ----

pub use crate::core::{Config, Runtime, RuntimeBuilder};
pub use dispatch::{priority, Behavior, EventManager, Hook, HookRef, SuspendSpec, WaitMatches};
pub use error::{DispatchError, EventError, HandlerError, RuntimeError, TaskError};
pub use events::{
    CancellableEvent, Event, EventCatalog, EventFlags, EventKey, EventState, TickEvent,
    TICKS_PER_SECOND,
};
pub use listener::{Listener, ListenerId, ListenerRef, ListenerScope, TaskGroup, TaskHandle, Toggle};
pub use observe::{Bus, Diagnostic, DiagnosticKind, LogWriter, Subscribe, SubscriberSet};
pub use sequence::{Sequence, SequenceManager, TickReport, TickWait};
