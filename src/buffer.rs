//! Lock-free ring buffer for raw event ingestion

use crate::models::RawEvent;
use crossbeam::queue::ArrayQueue;
use std::sync::Arc;

/// A lock-free event buffer backed by crossbeam's ArrayQueue.
///
/// Ingestion handlers push without contention; the flush task drains
/// batches into the store.
#[derive(Clone)]
pub struct EventBuffer {
    queue: Arc<ArrayQueue<RawEvent>>,
    capacity: usize,
}

impl EventBuffer {
    /// Create a new buffer with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity)),
            capacity,
        }
    }

    /// Try to push an event into the buffer.
    ///
    /// Returns `Ok(())` if successful, or `Err(event)` if the buffer is full.
    pub fn try_push(&self, event: RawEvent) -> Result<(), RawEvent> {
        self.queue.push(event)
    }

    /// Pop a batch of events from the buffer.
    ///
    /// Returns up to `max` events, or fewer if the buffer has less.
    pub fn pop_batch(&self, max: usize) -> Vec<RawEvent> {
        let mut batch = Vec::with_capacity(max.min(self.queue.len()));
        for _ in 0..max {
            match self.queue.pop() {
                Some(event) => batch.push(event),
                None => break,
            }
        }
        batch
    }

    /// Get the current number of events in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the buffer capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventOutcome;

    fn event(service: &str, outcome: EventOutcome) -> RawEvent {
        RawEvent::new(service, outcome)
    }

    #[test]
    fn drains_in_ingestion_order() {
        let buffer = EventBuffer::new(8);
        buffer
            .try_push(event("stripe-webhooks", EventOutcome::Failure))
            .unwrap();
        buffer.try_push(event("api", EventOutcome::Success)).unwrap();

        let batch = buffer.pop_batch(8);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].service, "stripe-webhooks");
        assert_eq!(batch[1].service, "api");
        assert!(buffer.is_empty());
    }

    #[test]
    fn full_buffer_hands_the_event_back() {
        // The rejected event comes back so the ingest handler can
        // count it as dropped
        let buffer = EventBuffer::new(1);
        buffer.try_push(event("api", EventOutcome::Success)).unwrap();

        let rejected = buffer
            .try_push(event("mailer", EventOutcome::Timeout))
            .unwrap_err();
        assert_eq!(rejected.service, "mailer");
        assert_eq!(rejected.outcome, EventOutcome::Timeout);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn partial_drain_leaves_the_remainder_for_the_next_flush() {
        let buffer = EventBuffer::new(64);
        for _ in 0..10 {
            buffer.try_push(event("api", EventOutcome::Success)).unwrap();
        }

        assert_eq!(buffer.pop_batch(6).len(), 6);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.pop_batch(6).len(), 4);
        assert!(buffer.pop_batch(6).is_empty());
    }
}
