use serde_json::Value as JsonValue;

use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;
use shutterdesk_rentals::{RentalProductEvent, RentalProductId};
use shutterdesk_resources::{ResourceCondition, ResourceId};

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable rental catalog read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RentalProductReadModel {
    pub rental_product_id: RentalProductId,
    pub resource_id: ResourceId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub condition: ResourceCondition,
    pub daily_rate: i64,
    pub rental_stock: i64,
    pub delisted: bool,
}

/// Rental catalog projection: what customers can rent right now.
#[derive(Debug)]
pub struct RentalCatalogProjection<S>
where
    S: TenantStore<RentalProductId, RentalProductReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> RentalCatalogProjection<S>
where
    S: TenantStore<RentalProductId, RentalProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(
        &self,
        tenant_id: TenantId,
        rental_product_id: &RentalProductId,
    ) -> Option<RentalProductReadModel> {
        self.store.get(tenant_id, rental_product_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<RentalProductReadModel> {
        self.store.list(tenant_id)
    }

    /// Listed products with units on hand, for the public catalog view.
    pub fn list_rentable(&self, tenant_id: TenantId) -> Vec<RentalProductReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| !rm.delisted && rm.rental_stock > 0)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: RentalProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, rental_product_id) = match &event {
            RentalProductEvent::RentalProductListed(e) => (e.tenant_id, e.rental_product_id),
            RentalProductEvent::RentalStockAdjusted(e) => (e.tenant_id, e.rental_product_id),
            RentalProductEvent::DailyRateSet(e) => (e.tenant_id, e.rental_product_id),
            RentalProductEvent::RentalProductDelisted(e) => (e.tenant_id, e.rental_product_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if rental_product_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event rental_product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            RentalProductEvent::RentalProductListed(e) => {
                self.store.upsert(
                    tenant_id,
                    e.rental_product_id,
                    RentalProductReadModel {
                        rental_product_id: e.rental_product_id,
                        resource_id: e.resource_id,
                        name: e.name,
                        category: e.category,
                        description: e.description,
                        condition: e.condition,
                        daily_rate: e.daily_rate,
                        rental_stock: e.initial_stock,
                        delisted: false,
                    },
                );
            }
            RentalProductEvent::RentalStockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.rental_product_id) {
                    rm.rental_stock += e.delta;
                    self.store.upsert(tenant_id, e.rental_product_id, rm);
                }
            }
            RentalProductEvent::DailyRateSet(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.rental_product_id) {
                    rm.daily_rate = e.daily_rate;
                    self.store.upsert(tenant_id, e.rental_product_id, rm);
                }
            }
            RentalProductEvent::RentalProductDelisted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.rental_product_id) {
                    rm.delisted = true;
                    self.store.upsert(tenant_id, e.rental_product_id, rm);
                }
            }
        }

        self.cursors.advance(tenant_id, aggregate_id, seq);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
            }
        }

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
    use shutterdesk_rentals::rental_product::{RentalProductDelisted, RentalProductListed};

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn listed_envelope(
        tenant_id: TenantId,
        rental_product_id: RentalProductId,
        seq: u64,
        initial_stock: i64,
    ) -> EventEnvelope<JsonValue> {
        let event = RentalProductEvent::RentalProductListed(RentalProductListed {
            tenant_id,
            rental_product_id,
            resource_id: ResourceId(AggregateId::new()),
            name: "Godox AD600".to_string(),
            category: "lighting".to_string(),
            description: "strobe kit".to_string(),
            condition: ResourceCondition::Good,
            daily_rate: 45,
            initial_stock,
            occurred_at: Utc::now(),
        });
        EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            rental_product_id.0,
            "rentals.rental_product",
            seq,
            serde_json::to_value(&event).unwrap(),
        )
    }

    #[test]
    fn rentable_listing_excludes_delisted_and_empty() {
        let projection = RentalCatalogProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();

        let stocked = RentalProductId(AggregateId::new());
        let empty = RentalProductId(AggregateId::new());
        let delisted = RentalProductId(AggregateId::new());

        projection.apply_envelope(&listed_envelope(tenant_id, stocked, 1, 3)).unwrap();
        projection.apply_envelope(&listed_envelope(tenant_id, empty, 1, 0)).unwrap();
        projection.apply_envelope(&listed_envelope(tenant_id, delisted, 1, 2)).unwrap();

        let event = RentalProductEvent::RentalProductDelisted(RentalProductDelisted {
            tenant_id,
            rental_product_id: delisted,
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&EventEnvelope::new(
                Uuid::now_v7(),
                tenant_id,
                delisted.0,
                "rentals.rental_product",
                2,
                serde_json::to_value(&event).unwrap(),
            ))
            .unwrap();

        let rentable = projection.list_rentable(tenant_id);
        assert_eq!(rentable.len(), 1);
        assert_eq!(rentable[0].rental_product_id, stocked);
    }
}
