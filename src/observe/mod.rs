//! Diagnostics: data model, broadcast bus and subscriber fan-out.
//!
//! Everything that fails or is dropped at a boundary (a hook, a task group, the
//! sequence scheduler) is logged through `tracing` **and** published here as a
//! [`Diagnostic`], so tests and tools can observe it without scraping logs.
//!
//! ## Contents
//! - [`DiagnosticKind`], [`Diagnostic`] classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//! - [`Subscribe`], [`SubscriberSet`] isolated per-subscriber workers
//! - [`LogWriter`] stdout subscriber

mod bus;
mod diagnostic;
mod log;
pub(crate) mod reporter;
mod subscriber;
mod subscriber_set;

pub use bus::Bus;
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
