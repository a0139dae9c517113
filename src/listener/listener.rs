//! # Owners of hooks, async handlers and sequences.
//!
//! A [`Listener`] answers one question, *"am I running?"*, and owns a
//! [`ListenerScope`]: a stable identity plus a lazily created
//! [`TaskGroup`] that hosts every asynchronous body started on its behalf.
//!
//! ```text
//! Listener ──► running()          (checked before each hook call and on every resume)
//!     └──────► scope()
//!                ├─ id / name
//!                └─ task_group()  (created on first async use, closed by dispose())
//! ```
//!
//! [`Toggle`] is a ready-made listener backed by an atomic switch, optionally
//! nested under a parent listener.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, OnceLock};

use super::group::TaskGroup;

/// Global counter for listener identities.
static LISTENER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Shared reference to a listener.
pub type ListenerRef = Arc<dyn Listener>;

/// Stable identity of a listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        ListenerId(LISTENER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity and task group of a listener.
pub struct ListenerScope {
    id: ListenerId,
    name: Arc<str>,
    group: OnceLock<TaskGroup>,
}

impl ListenerScope {
    /// Creates a scope with a fresh identity.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            id: ListenerId::next(),
            name: name.into(),
            group: OnceLock::new(),
        }
    }

    /// Identity of the owning listener.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Name used in logs and diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The listener's task group, created on first use.
    ///
    /// After [`dispose`](Self::dispose) the same (closed) group is returned;
    /// it is never recreated.
    pub fn task_group(&self) -> &TaskGroup {
        self.group.get_or_init(TaskGroup::new)
    }

    /// Cancels every task in the group and closes it for good.
    pub fn dispose(&self) {
        self.task_group().close();
    }

    /// True once [`dispose`](Self::dispose) was called.
    pub fn is_disposed(&self) -> bool {
        self.group.get().is_some_and(TaskGroup::is_closed)
    }
}

impl fmt::Debug for ListenerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerScope")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Owner of hooks and asynchronous work.
///
/// ### Implementation requirements
/// - `running()` must be cheap; it is called before every hook invocation and
///   on every resume of the listener's asynchronous bodies.
/// - `scope()` must return the same scope for the lifetime of the listener.
pub trait Listener: Send + Sync + 'static {
    /// Identity and task group of this listener.
    fn scope(&self) -> &ListenerScope;

    /// Whether hooks and asynchronous bodies of this listener may run.
    fn running(&self) -> bool {
        true
    }

    /// Name used in logs and diagnostics.
    fn name(&self) -> &str {
        self.scope().name()
    }

    /// Stable identity.
    fn id(&self) -> ListenerId {
        self.scope().id()
    }
}

/// A listener with an on/off switch.
///
/// Nested toggles only run while their parent runs.
///
/// # Example
/// ```rust
/// use tickvisor::{Listener, ListenerRef, Toggle};
///
/// let module = Toggle::new("module");
/// let parent: ListenerRef = module.clone();
/// let mode = Toggle::child_of(&parent, "module.mode");
///
/// assert!(mode.running());
/// module.disable();
/// assert!(!mode.running());
/// ```
pub struct Toggle {
    scope: ListenerScope,
    enabled: AtomicBool,
    parent: Option<ListenerRef>,
}

impl Toggle {
    /// Creates an enabled toggle.
    pub fn new(name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self {
            scope: ListenerScope::new(name),
            enabled: AtomicBool::new(true),
            parent: None,
        })
    }

    /// Creates an enabled toggle that only runs while `parent` runs.
    pub fn child_of(parent: &ListenerRef, name: impl Into<Arc<str>>) -> Arc<Self> {
        Arc::new(Self {
            scope: ListenerScope::new(name),
            enabled: AtomicBool::new(true),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Switches the toggle.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, AtomicOrdering::Release);
    }

    /// Turns the switch on; hooks run again from the next dispatch.
    pub fn enable(&self) {
        self.set_enabled(true);
    }

    /// Turns the switch off; hooks are skipped and bodies end at their next resume.
    pub fn disable(&self) {
        self.set_enabled(false);
    }

    /// Own switch state, ignoring the parent.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(AtomicOrdering::Acquire)
    }
}

impl Listener for Toggle {
    fn scope(&self) -> &ListenerScope {
        &self.scope
    }

    fn running(&self) -> bool {
        self.is_enabled() && self.parent.as_ref().map_or(true, |p| p.running())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identities_are_unique() {
        let a = Toggle::new("a");
        let b = Toggle::new("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.name(), "a");
    }

    #[test]
    fn dispose_closes_the_group_once() {
        let scope = ListenerScope::new("scoped");
        assert!(!scope.is_disposed());

        scope.dispose();
        assert!(scope.is_disposed());
        assert!(scope.task_group().is_closed());
        assert!(scope.task_group().token().is_cancelled());
    }

    #[test]
    fn child_follows_parent() {
        let parent = Toggle::new("parent");
        let parent_ref: ListenerRef = parent.clone();
        let child = Toggle::child_of(&parent_ref, "child");

        child.disable();
        assert!(!child.running());
        child.enable();
        parent.disable();
        assert!(!child.running());
        assert!(child.is_enabled());
        parent.enable();
        assert!(child.running());
    }
}
