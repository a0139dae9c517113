use std::sync::Arc;

use tokio::runtime::Handle;

use super::{runtime::Runtime, Config};
use crate::{
    dispatch::{priority, EventManager},
    error::{DispatchError, RuntimeError},
    events::{Event, EventCatalog, TickEvent},
    listener::ListenerRef,
    observe::{Bus, Subscribe, SubscriberSet},
    sequence::SequenceManager,
};

/// Builder for constructing a [`Runtime`].
pub struct RuntimeBuilder {
    cfg: Config,
    catalog: EventCatalog,
    catalog_error: Option<DispatchError>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handle: Option<Handle>,
}

impl RuntimeBuilder {
    /// Creates a new builder with the given configuration.
    ///
    /// The catalog starts with [`TickEvent`] declared as `"tick"`.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            catalog: EventCatalog::new(),
            catalog_error: None,
            subscribers: Vec::new(),
            handle: None,
        }
        .event::<TickEvent>("tick")
    }

    /// Declares a dispatchable event type under `name`.
    ///
    /// A duplicate type or name makes [`build`](Self::build) fail with
    /// [`DispatchError::DuplicateEvent`].
    pub fn event<E: Event>(mut self, name: &'static str) -> Self {
        if let Err(err) = self.catalog.declare::<E>(name) {
            self.catalog_error.get_or_insert(err);
        }
        self
    }

    /// Sets diagnostic subscribers.
    ///
    /// Subscribers receive diagnostics (hook failures, dropped events, etc.)
    /// through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the default execution context of async handlers and subscriber workers.
    ///
    /// Defaults to the runtime `build` is called from.
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Builds the runtime.
    ///
    /// This consumes the builder and initializes all components:
    /// - Diagnostics bus and subscriber workers
    /// - Event manager with one hook list per declared type
    /// - Sequence scheduler, hooked onto [`TickEvent`] at [`priority::FIRST`]
    pub fn build(self) -> Result<Arc<Runtime>, RuntimeError> {
        if let Some(err) = self.catalog_error {
            return Err(err.into());
        }
        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?,
        };

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = (!self.subscribers.is_empty())
            .then(|| Arc::new(SubscriberSet::new(self.subscribers, bus.clone(), &handle)));

        let events = Arc::new(EventManager::new(
            self.catalog,
            bus.clone(),
            handle.clone(),
            &self.cfg,
        ));
        let sequences = SequenceManager::new(handle.clone(), bus.clone(), &self.cfg);

        let scheduler: ListenerRef = sequences.clone();
        let ticker = Arc::clone(&sequences);
        events.handler(&scheduler, priority::FIRST, move |_: &mut TickEvent| {
            ticker.tick();
            Ok(())
        })?;

        let runtime = Arc::new(Runtime::new_internal(
            self.cfg, bus, subs, events, sequences, handle,
        ));
        runtime.subscriber_listener();
        Ok(runtime)
    }
}
