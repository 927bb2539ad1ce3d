//! Synchronous observer channels (§9 "Event-emitter model").
//!
//! Generalizes the teacher's single-slot
//! `navigation_callback: Arc<RwLock<Option<Box<dyn Fn(String)+Send+Sync>>>>`
//! pattern to an arbitrary number of subscribers per channel, since both the
//! Recorder and the Replayer expose several independent channels.

use std::sync::Arc;
use tokio::sync::RwLock;

type Callback<E> = Box<dyn Fn(&E) + Send + Sync>;

/// A single named channel. Subscribers are invoked in registration order on
/// the dispatching task; emission never suspends.
pub struct EventEmitter<E> {
    subscribers: Arc<RwLock<Vec<Callback<E>>>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<E> EventEmitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.subscribers.write().await.push(Box::new(callback));
    }

    pub async fn emit(&self, event: E) {
        let subscribers = self.subscribers.read().await;
        for callback in subscribers.iter() {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn emits_to_all_subscribers_in_order() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let order_a = Arc::clone(&order);
        emitter.subscribe(move |v| order_a.lock().unwrap().push(("a", *v))).await;
        let order_b = Arc::clone(&order);
        emitter.subscribe(move |v| order_b.lock().unwrap().push(("b", *v))).await;

        emitter.emit(1).await;

        assert_eq!(*order.lock().unwrap(), vec![("a", 1), ("b", 1)]);
    }

    #[tokio::test]
    async fn counts_emissions() {
        let emitter: EventEmitter<()> = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        emitter.subscribe(move |_| { count_clone.fetch_add(1, Ordering::SeqCst); }).await;

        emitter.emit(()).await;
        emitter.emit(()).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
