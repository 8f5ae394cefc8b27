use serde_json::Value as JsonValue;

use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;
use shutterdesk_feedback::{FeedbackEvent, FeedbackId, FeedbackStatus};

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable customer feedback read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackReadModel {
    pub feedback_id: FeedbackId,
    pub customer_name: String,
    pub customer_email: String,
    pub rating: u8,
    pub comment: String,
    pub status: FeedbackStatus,
}

/// Feedback projection.
#[derive(Debug)]
pub struct FeedbackProjection<S>
where
    S: TenantStore<FeedbackId, FeedbackReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> FeedbackProjection<S>
where
    S: TenantStore<FeedbackId, FeedbackReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, feedback_id: &FeedbackId) -> Option<FeedbackReadModel> {
        self.store.get(tenant_id, feedback_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<FeedbackReadModel> {
        self.store.list(tenant_id)
    }

    /// Published entries only, for the public testimonial wall.
    pub fn list_published(&self, tenant_id: TenantId) -> Vec<FeedbackReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.status == FeedbackStatus::Published)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: FeedbackEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, feedback_id) = match &event {
            FeedbackEvent::FeedbackSubmitted(e) => (e.tenant_id, e.feedback_id),
            FeedbackEvent::FeedbackPublished(e) => (e.tenant_id, e.feedback_id),
            FeedbackEvent::FeedbackArchived(e) => (e.tenant_id, e.feedback_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if feedback_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event feedback_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            FeedbackEvent::FeedbackSubmitted(e) => {
                self.store.upsert(
                    tenant_id,
                    e.feedback_id,
                    FeedbackReadModel {
                        feedback_id: e.feedback_id,
                        customer_name: e.customer_name,
                        customer_email: e.customer_email,
                        rating: e.rating,
                        comment: e.comment,
                        status: FeedbackStatus::Submitted,
                    },
                );
            }
            FeedbackEvent::FeedbackPublished(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.feedback_id) {
                    rm.status = FeedbackStatus::Published;
                    self.store.upsert(tenant_id, e.feedback_id, rm);
                }
            }
            FeedbackEvent::FeedbackArchived(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.feedback_id) {
                    rm.status = FeedbackStatus::Archived;
                    self.store.upsert(tenant_id, e.feedback_id, rm);
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
