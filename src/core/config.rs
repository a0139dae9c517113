//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the dispatcher and scheduler.
//!
//! Config is consumed once, by [`Runtime::builder`](crate::Runtime::builder).
//!
//! ## Sentinel values
//! - `ordered_queue_capacity = 0` → unbounded per-handler queue
//! - `tick_step_limit = 0` → clamped to 1 (a tick always makes progress)

/// Global configuration for the runtime.
///
/// Defines:
/// - **Scheduler bounds**: how much work one tick may perform
/// - **Ordered handlers**: capacity of each handler's pending-event queue
/// - **Diagnostics**: bus capacity for diagnostic delivery
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of sequence advancement steps performed in one tick.
    ///
    /// Exceeding it aborts the remainder of the tick and reports
    /// `RuntimeError::SchedulerRunaway`. Sequences that were not advanced stay
    /// scheduled for the next tick.
    pub tick_step_limit: usize,

    /// Capacity of the pending-event queue of every ordered async handler.
    ///
    /// - `0` = unbounded
    /// - `n > 0` = at most `n` events wait; newer events are dropped and
    ///   reported as `DiagnosticKind::QueueOverflow`
    pub ordered_queue_capacity: usize,

    /// Capacity of the diagnostics broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the ordered-queue capacity as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → bounded to `n`
    #[inline]
    pub fn ordered_capacity(&self) -> Option<usize> {
        if self.ordered_queue_capacity == 0 {
            None
        } else {
            Some(self.ordered_queue_capacity)
        }
    }

    /// Returns the per-tick step limit clamped to a minimum of 1.
    #[inline]
    pub fn tick_step_limit_clamped(&self) -> usize {
        self.tick_step_limit.max(1)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `tick_step_limit = 65_536`
    /// - `ordered_queue_capacity = 0` (unbounded)
    /// - `bus_capacity = 1024` (good baseline)
    fn default() -> Self {
        Self {
            tick_step_limit: 65_536,
            ordered_queue_capacity: 0,
            bus_capacity: 1024,
        }
    }
}
