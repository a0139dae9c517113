//! Conventional hook priorities.
//!
//! Higher runs first. Hooks of equal priority run in registration order.

/// Reserved for infrastructure that must observe an event before anyone else
/// (the sequence scheduler's tick hook).
pub const FIRST: i16 = i16::MAX;

/// Hooks that enforce safety constraints and may cancel the event.
pub const SAFETY: i16 = 100;

/// Hooks that modify the event payload.
pub const MODIFY: i16 = 50;

/// Default priority.
pub const NORMAL: i16 = 0;

/// Hooks that read the final, already-modified payload.
pub const READ_FINAL: i16 = -100;

/// Runs after everything else.
pub const LAST: i16 = i16::MIN;
