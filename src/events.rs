//! Synchronous, typed notification channels between cache layers
//!
//! Each producer owns a `Listeners<E>` table. Emitting calls every registered
//! handler on the caller's stack before returning, so a handler registered
//! before a mutation always observes it. Handlers are called outside the table
//! lock and may register or drop subscriptions while running.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Table<E> {
    next_id: u64,
    handlers: Vec<(u64, Handler<E>)>,
}

pub struct Listeners<E> {
    table: Arc<Mutex<Table<E>>>,
}

impl<E: 'static> Listeners<E> {
    pub fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }

    /// Register a handler; it stays registered until the returned
    /// `Subscription` is dropped.
    #[must_use = "dropping the subscription unregisters the handler"]
    pub fn subscribe(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut table = lock(&self.table);
            let id = table.next_id;
            table.next_id += 1;
            table.handlers.push((id, Arc::new(handler)));
            id
        };

        let table: Weak<Mutex<Table<E>>> = Arc::downgrade(&self.table);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(table) = table.upgrade() {
                    lock(&table).handlers.retain(|(hid, _)| *hid != id);
                }
            })),
        }
    }

    /// Call every handler with `event`. Returns the number of handlers called.
    pub fn emit(&self, event: &E) -> usize {
        let handlers: Vec<Handler<E>> = lock(&self.table)
            .handlers
            .iter()
            .map(|(_, h)| h.clone())
            .collect();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.table).handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: 'static> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a registered handler; unregisters on drop
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Keep the handler registered for the life of the producer.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_emit_reaches_all_handlers() {
        let listeners = Listeners::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));

        let t1 = total.clone();
        let _s1 = listeners.subscribe(move |v| {
            t1.fetch_add(*v as usize, Ordering::SeqCst);
        });
        let t2 = total.clone();
        let _s2 = listeners.subscribe(move |v| {
            t2.fetch_add(*v as usize * 10, Ordering::SeqCst);
        });

        assert_eq!(listeners.emit(&2), 2);
        assert_eq!(total.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn test_drop_subscription_unregisters() {
        let listeners = Listeners::<()>::new();
        let sub = listeners.subscribe(|_| {});
        assert_eq!(listeners.len(), 1);

        drop(sub);
        assert!(listeners.is_empty());
        assert_eq!(listeners.emit(&()), 0);
    }

    #[test]
    fn test_detached_subscription_stays_registered() {
        let listeners = Listeners::<()>::new();
        listeners.subscribe(|_| {}).detach();
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_handler_may_subscribe_while_emitting() {
        let listeners = Arc::new(Listeners::<()>::new());
        let inner = listeners.clone();
        let _sub = listeners.subscribe(move |_| {
            inner.subscribe(|_| {}).detach();
        });

        listeners.emit(&());
        assert_eq!(listeners.len(), 2);
    }
}
