//! Event handler registry
//!
//! One handler per event name. Registering over an existing name replaces
//! it; removing a name that has no handler does nothing.
//!
//! Each registration owns a dispatch gate. `dispatch` holds the gate while
//! the handler runs; removal clears the `active` flag and then takes the
//! gate once, so when `remove`/`register` returns no dispatch of the old
//! handler is still running or can start. The gate is reentrant: a handler
//! that removes or replaces itself on the dispatching thread does not wait
//! on its own dispatch.

use parking_lot::{Mutex, ReentrantMutex};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Identifies one registration; a replaced handler keeps its stale id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(u64);

struct Slot<E> {
    id: RegistrationId,
    handler: Handler<E>,
    active: AtomicBool,
    gate: ReentrantMutex<()>,
}

impl<E> Slot<E> {
    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        // Wait out an in-flight dispatch on another thread
        drop(self.gate.lock());
    }
}

pub struct HandlerRegistry<E> {
    slots: Mutex<FxHashMap<String, Arc<Slot<E>>>>,
    next_id: AtomicU64,
}

impl<E> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> HandlerRegistry<E> {
    pub fn new() -> Self {
        Self { slots: Mutex::new(FxHashMap::default()), next_id: AtomicU64::new(1) }
    }

    /// Install `handler` for `name`, replacing any previous one
    pub fn register(&self, name: &str, handler: Handler<E>) -> RegistrationId {
        let id = RegistrationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Arc::new(Slot {
            id,
            handler,
            active: AtomicBool::new(true),
            gate: ReentrantMutex::new(()),
        });
        let previous = self.slots.lock().insert(name.to_string(), slot);
        if let Some(previous) = previous {
            debug!(event = %name, "handler_replaced");
            previous.deactivate();
        }
        id
    }

    /// Remove the handler for `name`. Returns false if none was registered.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.slots.lock().remove(name);
        match removed {
            Some(slot) => {
                slot.deactivate();
                true
            }
            None => false,
        }
    }

    /// Remove the handler for `name` only if it is still registration `id`
    pub fn remove_registration(&self, name: &str, id: RegistrationId) -> bool {
        let removed = {
            let mut slots = self.slots.lock();
            if slots.get(name).map(|slot| slot.id) == Some(id) {
                slots.remove(name)
            } else {
                None
            }
        };
        match removed {
            Some(slot) => {
                slot.deactivate();
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, name: &str, id: RegistrationId) -> bool {
        self.slots.lock().get(name).is_some_and(|slot| slot.id == id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke the current handler for `name`. Returns false if there was none.
    pub fn dispatch(&self, name: &str, event: &E) -> bool {
        // Map lock is released before the handler runs
        let slot = self.slots.lock().get(name).cloned();
        let Some(slot) = slot else {
            return false;
        };

        let _gate = slot.gate.lock();
        if !slot.active.load(Ordering::Acquire) {
            return false;
        }
        (slot.handler)(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn counter() -> (Arc<AtomicUsize>, Handler<u32>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handler: Handler<u32> = Arc::new(move |_: &u32| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, handler)
    }

    #[test]
    fn test_double_register_only_second_receives() {
        let registry = HandlerRegistry::new();
        let (first, h1) = counter();
        let (second, h2) = counter();

        registry.register("locationUpdate", h1);
        registry.register("locationUpdate", h2);
        assert!(registry.dispatch("locationUpdate", &1));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_then_dispatch_invokes_nothing() {
        let registry = HandlerRegistry::new();
        let (count, handler) = counter();
        registry.register("locationUpdate", handler);

        assert!(registry.remove("locationUpdate"));
        assert!(!registry.dispatch("locationUpdate", &1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_without_handler_is_noop() {
        let registry: HandlerRegistry<u32> = HandlerRegistry::new();
        assert!(!registry.remove("locationUpdate"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_registration_does_not_remove_replacement() {
        let registry = HandlerRegistry::new();
        let (_, h1) = counter();
        let (second, h2) = counter();

        let old = registry.register("locationUpdate", h1);
        let new = registry.register("locationUpdate", h2);
        assert!(!registry.is_current("locationUpdate", old));
        assert!(!registry.remove_registration("locationUpdate", old));

        registry.dispatch("locationUpdate", &1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert!(registry.remove_registration("locationUpdate", new));
        assert!(!registry.contains("locationUpdate"));
    }

    #[test]
    fn test_handler_can_remove_itself() {
        let registry: Arc<HandlerRegistry<u32>> = Arc::new(HandlerRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let r = Arc::downgrade(&registry);
        let c = calls.clone();
        registry.register(
            "locationUpdate",
            Arc::new(move |_: &u32| {
                c.fetch_add(1, Ordering::SeqCst);
                if let Some(registry) = r.upgrade() {
                    registry.remove("locationUpdate");
                }
            }),
        );

        assert!(registry.dispatch("locationUpdate", &1));
        assert!(!registry.dispatch("locationUpdate", &2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_waits_for_in_flight_dispatch() {
        let registry: Arc<HandlerRegistry<u32>> = Arc::new(HandlerRegistry::new());
        let entered = Arc::new(Barrier::new(2));
        let finished = Arc::new(AtomicBool::new(false));

        let e = entered.clone();
        let f = finished.clone();
        registry.register(
            "locationUpdate",
            Arc::new(move |_: &u32| {
                e.wait();
                thread::sleep(Duration::from_millis(50));
                f.store(true, Ordering::SeqCst);
            }),
        );

        let dispatcher = {
            let registry = registry.clone();
            thread::spawn(move || registry.dispatch("locationUpdate", &1))
        };

        entered.wait();
        assert!(registry.remove("locationUpdate"));
        // The handler had completed by the time remove returned
        assert!(finished.load(Ordering::SeqCst));
        assert!(dispatcher.join().unwrap());
    }
}
