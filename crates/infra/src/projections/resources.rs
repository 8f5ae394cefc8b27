use serde_json::Value as JsonValue;

use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;
use shutterdesk_resources::{ResourceCondition, ResourceEvent, ResourceId};

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable resource read model: per-resource stock split across the
/// internal pool and the rental pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReadModel {
    pub resource_id: ResourceId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub condition: ResourceCondition,
    pub stock: i64,
    pub rental_stock: i64,
    pub retired: bool,
}

/// Resource inventory projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a
/// tenant-isolated read model. Read models are disposable and rebuildable
/// from the event stream.
#[derive(Debug)]
pub struct ResourcesProjection<S>
where
    S: TenantStore<ResourceId, ResourceReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> ResourcesProjection<S>
where
    S: TenantStore<ResourceId, ResourceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, resource_id: &ResourceId) -> Option<ResourceReadModel> {
        self.store.get(tenant_id, resource_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ResourceReadModel> {
        self.store.list(tenant_id)
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces tenant isolation
    /// - Enforces monotonic sequence per (tenant, aggregate) stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: ResourceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        // Validate tenant isolation at the event level.
        let (event_tenant, resource_id) = match &event {
            ResourceEvent::ResourceCreated(e) => (e.tenant_id, e.resource_id),
            ResourceEvent::DetailsUpdated(e) => (e.tenant_id, e.resource_id),
            ResourceEvent::StockAdjusted(e) => (e.tenant_id, e.resource_id),
            ResourceEvent::TransferredToRental(e) => (e.tenant_id, e.resource_id),
            ResourceEvent::ReturnedFromRental(e) => (e.tenant_id, e.resource_id),
            ResourceEvent::ResourceRetired(e) => (e.tenant_id, e.resource_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if resource_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event resource_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ResourceEvent::ResourceCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.resource_id,
                    ResourceReadModel {
                        resource_id: e.resource_id,
                        name: e.name,
                        category: e.category,
                        description: e.description,
                        condition: e.condition,
                        stock: e.initial_stock,
                        rental_stock: 0,
                        retired: false,
                    },
                );
            }
            ResourceEvent::DetailsUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.resource_id) {
                    rm.name = e.name;
                    rm.description = e.description;
                    rm.condition = e.condition;
                    self.store.upsert(tenant_id, e.resource_id, rm);
                }
            }
            ResourceEvent::StockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.resource_id) {
                    rm.stock += e.delta;
                    self.store.upsert(tenant_id, e.resource_id, rm);
                }
            }
            ResourceEvent::TransferredToRental(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.resource_id) {
                    rm.stock -= e.quantity;
                    rm.rental_stock += e.quantity;
                    self.store.upsert(tenant_id, e.resource_id, rm);
                }
            }
            ResourceEvent::ReturnedFromRental(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.resource_id) {
                    rm.rental_stock -= e.quantity;
                    rm.stock += e.quantity;
                    self.store.upsert(tenant_id, e.resource_id, rm);
                }
            }
            ResourceEvent::ResourceRetired(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.resource_id) {
                    rm.retired = true;
                    self.store.upsert(tenant_id, e.resource_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Clear read model per tenant before rebuilding.
        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
            }
        }

        // Deterministic replay order: tenant, aggregate, sequence.
        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use shutterdesk_core::AggregateId;
    use shutterdesk_resources::resource::{ResourceCreated, TransferredToRental};

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn envelope(
        tenant_id: TenantId,
        resource_id: ResourceId,
        seq: u64,
        event: &ResourceEvent,
    ) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            resource_id.0,
            "resources.resource",
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    fn created(tenant_id: TenantId, resource_id: ResourceId, initial_stock: i64) -> ResourceEvent {
        ResourceEvent::ResourceCreated(ResourceCreated {
            tenant_id,
            resource_id,
            name: "Canon R5".to_string(),
            category: "camera".to_string(),
            description: "primary body".to_string(),
            condition: ResourceCondition::Good,
            initial_stock,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn transfer_moves_units_between_pools() {
        let projection = ResourcesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let resource_id = ResourceId(AggregateId::new());

        projection
            .apply_envelope(&envelope(tenant_id, resource_id, 1, &created(tenant_id, resource_id, 10)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                tenant_id,
                resource_id,
                2,
                &ResourceEvent::TransferredToRental(TransferredToRental {
                    tenant_id,
                    resource_id,
                    quantity: 4,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let rm = projection.get(tenant_id, &resource_id).unwrap();
        assert_eq!(rm.stock, 6);
        assert_eq!(rm.rental_stock, 4);
    }

    #[test]
    fn replayed_envelope_is_ignored() {
        let projection = ResourcesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let resource_id = ResourceId(AggregateId::new());

        let env = envelope(tenant_id, resource_id, 1, &created(tenant_id, resource_id, 5));
        projection.apply_envelope(&env).unwrap();
        projection.apply_envelope(&env).unwrap();

        let rm = projection.get(tenant_id, &resource_id).unwrap();
        assert_eq!(rm.stock, 5);
    }

    #[test]
    fn cross_tenant_payload_is_rejected() {
        let projection = ResourcesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let other_tenant = TenantId::new();
        let resource_id = ResourceId(AggregateId::new());

        let env = envelope(tenant_id, resource_id, 1, &created(other_tenant, resource_id, 5));
        assert!(matches!(
            projection.apply_envelope(&env),
            Err(ProjectionError::TenantIsolation(_))
        ));
    }

    #[test]
    fn rebuild_replays_out_of_order_envelopes() {
        let projection = ResourcesProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let resource_id = ResourceId(AggregateId::new());

        let envs = vec![
            envelope(
                tenant_id,
                resource_id,
                2,
                &ResourceEvent::TransferredToRental(TransferredToRental {
                    tenant_id,
                    resource_id,
                    quantity: 3,
                    occurred_at: Utc::now(),
                }),
            ),
            envelope(tenant_id, resource_id, 1, &created(tenant_id, resource_id, 8)),
        ];

        projection.rebuild_from_scratch(envs).unwrap();

        let rm = projection.get(tenant_id, &resource_id).unwrap();
        assert_eq!(rm.stock, 5);
        assert_eq!(rm.rental_stock, 3);
    }
}
