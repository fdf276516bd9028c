//! # Broadcast Message Queue
//!
//! Implements the bounded FIFO queue that buffers broadcast events between
//! request handlers. Recognized transcripts and client-submitted messages are
//! pushed here and drained by `GET /api/messages` (or streamed by `/api/events`).
//!
//! ## Lifecycle:
//! - Created once at startup and owned by [`crate::state::AppState`]
//! - Producers: the upload and message handlers
//! - Consumers: the messages endpoint (drains and clears) and the SSE stream
//! - When full, the oldest entry is evicted so producers never block

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Bounded FIFO queue of broadcast events.
///
/// ## Thread Safety:
/// Uses Arc<Mutex<VecDeque>> so multiple request handlers can push and drain
/// concurrently. Every operation takes the lock briefly; nothing is held
/// across an await point.
#[derive(Debug, Clone)]
pub struct BroadcastQueue {
    /// Queued events, oldest at the front
    queue: Arc<Mutex<VecDeque<serde_json::Value>>>,

    /// Maximum number of entries to keep
    capacity: usize,
}

impl BroadcastQueue {
    /// Create an empty queue holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entry when the queue is full.
    pub fn push(&self, message: serde_json::Value) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() == self.capacity {
            queue.pop_front();
        }
        queue.push_back(message);
    }

    /// Remove and return all queued events in FIFO order.
    ///
    /// ## Usage:
    /// Backs `GET /api/messages`, which returns the accumulated events and
    /// clears the queue in one step.
    pub fn drain(&self) -> Vec<serde_json::Value> {
        self.queue.lock().unwrap().drain(..).collect()
    }

    /// Remove and return the oldest event, if any.
    ///
    /// ## Usage:
    /// Backs the SSE stream, which emits one event per tick.
    pub fn pop(&self) -> Option<serde_json::Value> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Get the current number of queued events.
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_and_drain_preserves_order() {
        let queue = BroadcastQueue::new(8);
        queue.push(json!("first"));
        queue.push(json!({"n": 2}));
        queue.push(json!("third"));

        let drained = queue.drain();
        assert_eq!(drained, vec![json!("first"), json!({"n": 2}), json!("third")]);

        // Drain clears the queue
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let queue = BroadcastQueue::new(2);
        queue.push(json!(1));
        queue.push(json!(2));
        queue.push(json!(3));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain(), vec![json!(2), json!(3)]);
    }

    #[test]
    fn test_pop_returns_oldest() {
        let queue = BroadcastQueue::new(4);
        assert_eq!(queue.pop(), None);

        queue.push(json!("a"));
        queue.push(json!("b"));
        assert_eq!(queue.pop(), Some(json!("a")));
        assert_eq!(queue.len(), 1);
    }
}
