use serde_json::Value as JsonValue;

use shutterdesk_catalog::{ProductEvent, ProductId, ProductStatus};
use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable sellable-product read model (prints, albums, gift cards).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: i64,
    pub stock: i64,
    pub status: ProductStatus,
}

/// Product catalog projection.
#[derive(Debug)]
pub struct ProductsProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> ProductsProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(tenant_id, product_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        self.store.list(tenant_id)
    }

    /// Active products only, for the storefront view.
    pub fn list_active(&self, tenant_id: TenantId) -> Vec<ProductReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.status == ProductStatus::Active)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, product_id) = match &event {
            ProductEvent::ProductCreated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductUpdated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductStockAdjusted(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductActivated(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductArchived(e) => (e.tenant_id, e.product_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if product_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        name: e.name,
                        category: e.category,
                        description: e.description,
                        price: e.price,
                        stock: e.initial_stock,
                        status: ProductStatus::Draft,
                    },
                );
            }
            ProductEvent::ProductUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    rm.name = e.name;
                    rm.description = e.description;
                    rm.price = e.price;
                    self.store.upsert(tenant_id, e.product_id, rm);
                }
            }
            ProductEvent::ProductStockAdjusted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    rm.stock += e.delta;
                    self.store.upsert(tenant_id, e.product_id, rm);
                }
            }
            ProductEvent::ProductActivated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    rm.status = ProductStatus::Active;
                    self.store.upsert(tenant_id, e.product_id, rm);
                }
            }
            ProductEvent::ProductArchived(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.product_id) {
                    rm.status = ProductStatus::Archived;
                    self.store.upsert(tenant_id, e.product_id, rm);
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
