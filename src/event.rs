//! Event bus for incremental index maintenance
//!
//! A single bus fans events out under the store mutex; listeners (the ranked
//! and BM25 indexes) must be non-blocking. This is the "event-driven index
//! updates" design pattern from the architecture notes, kept deliberately
//! simple: a `Vec` of boxed closures rather than a generic pub/sub crate,
//! since the only subscribers live inside this process.

use std::sync::Mutex;

use crate::entity::Relation;

/// Events emitted by the store on every mutation
#[derive(Debug, Clone)]
pub enum GraphEvent {
    EntityCreated(String),
    EntityUpdated(String),
    EntityDeleted(String),
    RelationCreated(Relation),
    RelationDeleted(Relation),
    ObservationAdded(String),
    ObservationDeleted(String),
    GraphSaved,
    GraphLoaded,
}

/// A non-blocking subscriber. Implementations must return quickly: they run
/// synchronously inside the store's write-mutex critical section.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &GraphEvent);
}

/// Fan-out bus. Listeners are registered once at facade-construction time.
#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<Box<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Box<dyn EventListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    pub fn publish(&self, event: GraphEvent) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.lock().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicUsize>);
    impl EventListener for Counter {
        fn on_event(&self, _event: &GraphEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn fanout_reaches_all_listeners() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        bus.subscribe(Box::new(Counter(count.clone())));
        bus.subscribe(Box::new(Counter(count.clone())));
        bus.publish(GraphEvent::EntityCreated("Alice".into()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
