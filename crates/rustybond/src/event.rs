//! Typed notification channels
//!
//! Each notification kind gets its own [`EventSource`]. Listeners are
//! snapshotted before delivery so a listener can unregister itself (or
//! others) from inside its callback without deadlocking.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Listener callback type
pub type EventHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`EventSource::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Inner<T> {
    name: &'static str,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, EventHandler<T>)>>,
}

/// A named event with a dynamic list of listeners.
///
/// Cloning yields another handle to the same listener list.
pub struct EventSource<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for EventSource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for EventSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.inner.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T> EventSource<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                next_id: AtomicU64::new(1),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Register a listener, returning the id used to unregister it
    pub fn register<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, Arc::new(handler)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Invoke every registered listener in registration order
    pub fn notify(&self, args: &T) {
        let snapshot: Vec<EventHandler<T>> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        trace!(event = self.inner.name, listeners = snapshot.len(), "notify");
        for handler in snapshot {
            handler(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_register_notify_unregister() {
        let source: EventSource<u32> = EventSource::new("test");
        let total = Arc::new(AtomicUsize::new(0));

        let t = Arc::clone(&total);
        let id = source.register(move |v| {
            t.fetch_add(*v as usize, Ordering::SeqCst);
        });

        source.notify(&5);
        assert_eq!(total.load(Ordering::SeqCst), 5);

        assert!(source.unregister(id));
        assert!(!source.unregister(id));
        source.notify(&5);
        assert_eq!(total.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_listener_can_unregister_itself() {
        let source: EventSource<()> = EventSource::new("self-removal");
        let calls = Arc::new(AtomicUsize::new(0));
        let id_slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let handle = source.clone();
        let slot = Arc::clone(&id_slot);
        let c = Arc::clone(&calls);
        let id = source.register(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot.lock() {
                handle.unregister(id);
            }
        });
        *id_slot.lock() = Some(id);

        source.notify(&());
        source.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.listener_count(), 0);
    }
}
