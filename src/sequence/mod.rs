//! Tick-synchronized sequences and their scheduler.
//!
//! ## Contents
//! - [`Sequence`] handle given to a body, with the tick-wait primitives
//! - [`TickWait`] future behind [`Sequence::wait`]
//! - [`SequenceManager`], [`TickReport`] the per-tick scheduler

mod scheduler;
#[allow(clippy::module_inception)]
mod sequence;

pub use scheduler::{SequenceManager, TickReport};
pub use sequence::{Sequence, TickWait};
