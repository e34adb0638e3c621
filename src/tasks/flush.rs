//! Flush task - moves raw events from the buffer to the store

use crate::buffer::EventBuffer;
use crate::store::OpsStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Background task that periodically drains the event buffer into the
/// store.
///
/// Runs every 5 seconds, pulls a batch from the buffer, and batch-inserts.
pub async fn flush_task(buffer: EventBuffer, store: Arc<dyn OpsStore>) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));

    info!("Flush task started (5s interval)");

    loop {
        interval.tick().await;

        let batch = buffer.pop_batch(10_000);
        if batch.is_empty() {
            continue;
        }

        let batch_size = batch.len();
        debug!(batch_size = batch_size, "Flushing event batch to store");

        match store.insert_events(&batch).await {
            Ok(inserted) => {
                if inserted < batch_size {
                    error!(
                        inserted = inserted,
                        expected = batch_size,
                        "Some events failed to insert"
                    );
                } else {
                    debug!(inserted = inserted, "Event batch inserted successfully");
                }
            }
            Err(e) => {
                error!(error = %e, batch_size = batch_size, "Failed to insert event batch");
                // Note: events are lost if the insert fails; the SLO
                // calculator treats missing traffic as healthy, so a
                // sustained store outage here surfaces via /ready
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventOutcome, RawEvent};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn batch_lands_in_store() {
        let buffer = EventBuffer::new(1000);
        let store = Arc::new(MemoryStore::new());

        for _ in 0..100 {
            buffer
                .try_push(RawEvent::new("api", EventOutcome::Success))
                .unwrap();
        }

        let batch = buffer.pop_batch(10_000);
        let inserted = store.insert_events(&batch).await.unwrap();
        assert_eq!(inserted, 100);
        assert!(buffer.is_empty());
    }
}
