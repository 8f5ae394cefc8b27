//! Append-only event store boundary.
//!
//! Infrastructure-facing abstraction for storing and loading tenant-scoped
//! event streams without making any storage assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Adapter that publishes committed events to an `EventBus` after a successful
/// append. Publish happens only after append succeeds.
pub struct PublishingEventStore<S, B> {
    store: S,
    bus: B,
}

impl<S, B> PublishingEventStore<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> EventStore for PublishingEventStore<S, B>
where
    S: EventStore,
    B: shutterdesk_events::EventBus<shutterdesk_events::EventEnvelope<serde_json::Value>>,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: shutterdesk_core::ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let committed = self.store.append(events, expected_version)?;

        // At-least-once: events are durable even if a publish fails.
        for e in &committed {
            self.bus
                .publish(e.to_envelope())
                .map_err(|err| EventStoreError::Publish(format!("{err:?}")))?;
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: shutterdesk_core::TenantId,
        aggregate_id: shutterdesk_core::AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.store.load_stream(tenant_id, aggregate_id)
    }
}
