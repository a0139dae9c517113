//! Runtime core: configuration, builder and wiring.
//!
//! The public API from this module is [`Runtime`] (with its [`RuntimeBuilder`])
//! and [`Config`].
//!
//! Internal modules:
//! - [`config`]: global settings with sentinel-aware accessors;
//! - [`builder`]: declares the event catalog and assembles the components;
//! - [`runtime`]: owns the dispatcher, the scheduler and the diagnostics bus.

mod builder;
mod config;
mod runtime;

pub use builder::RuntimeBuilder;
pub use config::Config;
pub use runtime::Runtime;
