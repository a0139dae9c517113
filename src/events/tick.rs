//! # The external clock signal.

use crate::events::event::EventFlags;

/// Nominal rate of the external clock.
pub const TICKS_PER_SECOND: u32 = 20;

/// One step of the external clock.
///
/// Always present in the catalog under the name `"tick"`. The sequence
/// scheduler consumes it at [`priority::FIRST`](crate::priority::FIRST).
#[derive(Clone, Debug, Default)]
pub struct TickEvent {
    flags: EventFlags,
    /// Monotonic tick number (1-based).
    pub tick: u64,
}

impl TickEvent {
    /// Creates the event for tick number `tick`.
    pub fn new(tick: u64) -> Self {
        Self {
            flags: EventFlags::new(),
            tick,
        }
    }
}

crate::impl_event!(TickEvent);
