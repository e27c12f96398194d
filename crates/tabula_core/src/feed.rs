//! Event feeds for observing store mutations.
//!
//! A [`Feed`] distributes every dispatched event three ways:
//! - synchronous hooks registered with [`Feed::on_event`], run in dispatch
//!   order before the mutating call returns
//! - channel subscribers from [`Feed::subscribe`]
//! - a bounded history readable with [`Feed::poll`]
//!
//! The store keeps one feed for [`ChangeEvent`](crate::ChangeEvent)s and
//! one for [`TableEvent`](crate::TableEvent)s. A persistence layer usually
//! registers a hook on both to mark itself dirty.
//!
//! # Usage
//!
//! ```rust
//! use tabula_core::Store;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let mut store = Store::new();
//! let dirty = Arc::new(AtomicUsize::new(0));
//! let seen = Arc::clone(&dirty);
//! store.on_table_change(move |_| {
//!     seen.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! store.create_table("users", &["email"]);
//! assert_eq!(dirty.load(Ordering::SeqCst), 2);
//! ```

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};

/// Callback invoked for every dispatched event.
pub type Hook<E> = Box<dyn FnMut(&E) + Send>;

/// An event together with its position in the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced<E> {
    /// Position, starting at 1.
    pub sequence: u64,
    /// The event.
    pub event: E,
}

/// A feed that distributes events to hooks, subscribers and history.
pub struct Feed<E> {
    hooks: Mutex<Vec<Hook<E>>>,
    subscribers: RwLock<Vec<Sender<E>>>,
    history: RwLock<Vec<Sequenced<E>>>,
    sequence: Mutex<u64>,
    max_history: usize,
}

impl<E: Clone> Feed<E> {
    /// Creates a feed with the default history limit.
    pub fn new() -> Self {
        Self::with_max_history(1024)
    }

    /// Creates a feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            hooks: Mutex::new(Vec::new()),
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            sequence: Mutex::new(0),
            max_history,
        }
    }

    /// Registers a hook called synchronously for each event.
    pub fn on_event<F>(&self, hook: F)
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that will receive all future events. The receiver
    /// should be drained regularly to avoid unbounded memory growth.
    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Dispatches an event. Returns its sequence number.
    pub fn emit(&self, event: E) -> u64 {
        let sequence = {
            let mut seq = self.sequence.lock();
            *seq += 1;
            *seq
        };

        for hook in self.hooks.lock().iter_mut() {
            hook(&event);
        }

        if self.max_history > 0 {
            let mut history = self.history.write();
            history.push(Sequenced {
                sequence,
                event: event.clone(),
            });
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        // Send to subscribers (remove disconnected ones)
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        sequence
    }

    /// Polls events from a sequence cursor.
    ///
    /// Returns events with sequence > cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<Sequenced<E>> {
        let history = self.history.read();
        history
            .iter()
            .filter(|e| e.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the sequence number of the last dispatched event.
    pub fn latest_sequence(&self) -> u64 {
        *self.sequence.lock()
    }

    /// Returns the number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of events in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl<E: Clone> Default for Feed<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Feed<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feed")
            .field("hooks", &self.hooks.lock().len())
            .field("subscribers", &self.subscribers.read().len())
            .field("history", &self.history.read().len())
            .field("max_history", &self.max_history)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn emit_and_receive() {
        let feed = Feed::new();
        let rx = feed.subscribe();

        feed.emit("created".to_string());

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, "created");
    }

    #[test]
    fn hooks_run_in_order() {
        let feed: Feed<u64> = Feed::new();
        let total = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&total);
        feed.on_event(move |n| {
            sink.fetch_add(*n, Ordering::SeqCst);
        });

        feed.emit(2);
        feed.emit(5);
        assert_eq!(total.load(Ordering::SeqCst), 7);
        assert_eq!(feed.hook_count(), 1);
    }

    #[test]
    fn subscriber_cleanup() {
        let feed: Feed<u8> = Feed::new();
        let rx = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 1);

        drop(rx);

        feed.emit(1);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn poll_from_cursor() {
        let feed: Feed<u8> = Feed::new();
        for i in 1..=5 {
            feed.emit(i);
        }

        let events = feed.poll(2, 10);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].sequence, 3);
        assert_eq!(events[2].event, 5);

        assert_eq!(feed.poll(0, 2).len(), 2);
    }

    #[test]
    fn history_truncation() {
        let feed: Feed<u8> = Feed::with_max_history(5);
        for i in 1..=10 {
            feed.emit(i);
        }

        assert_eq!(feed.history_len(), 5);
        assert_eq!(feed.poll(0, 100)[0].sequence, 6);
        assert_eq!(feed.latest_sequence(), 10);
    }

    #[test]
    fn zero_history_keeps_nothing() {
        let feed: Feed<u8> = Feed::with_max_history(0);
        assert_eq!(feed.emit(1), 1);
        assert_eq!(feed.history_len(), 0);
    }

    #[test]
    fn threaded_subscribe() {
        let feed = Arc::new(Feed::new());
        let rx = feed.subscribe();

        let feed_clone = Arc::clone(&feed);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            feed_clone.emit(42u32);
        });

        let received = rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert_eq!(received, 42);

        handle.join().unwrap();
    }
}
