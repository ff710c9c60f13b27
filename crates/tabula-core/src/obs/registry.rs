use crate::obs::CommandEvent;
use derive_more::Display;
use parking_lot::RwLock;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tracing::debug;

/// Callback invoked for every published command.
pub type CommandObserver = Arc<dyn Fn(&CommandEvent) + Send + Sync>;

///
/// SubscriptionId
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) const fn from_raw(id: u64) -> Self {
        Self(id)
    }
}

///
/// EventRegistry
///
/// Explicit subscription registry for command events, owned by one context.
///

#[derive(Default)]
pub struct EventRegistry {
    next_id: AtomicU64,
    observers: RwLock<BTreeMap<SubscriptionId, CommandObserver>>,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: impl Fn(&CommandEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers.write().insert(id, Arc::new(observer));

        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.write().remove(&id).is_some()
    }

    /// Deliver `event` to every observer in subscription order.
    pub fn publish(&self, event: &CommandEvent) {
        debug!(
            sql = %event.text,
            params = event.params.len(),
            connection = %event.connection_hash,
            "executing command"
        );

        // observers run outside the lock so they may (un)subscribe
        let observers: Vec<CommandObserver> = self.observers.read().values().cloned().collect();
        for observer in observers {
            observer(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
