use serde_json::Value as JsonValue;
use uuid::Uuid;

use shutterdesk_bookings::BookingId;
use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;
use shutterdesk_payments::{PaymentEvent, PaymentId, PaymentPlan, PaymentStatus};

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable payment ledger read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReadModel {
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub customer_email: String,
    pub amount: i64,
    pub paid: i64,
    pub plan: PaymentPlan,
    pub transaction_id: Uuid,
    pub status: PaymentStatus,
}

impl PaymentReadModel {
    pub fn outstanding(&self) -> i64 {
        self.amount - self.paid
    }
}

/// Payment ledger projection.
#[derive(Debug)]
pub struct PaymentsProjection<S>
where
    S: TenantStore<PaymentId, PaymentReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> PaymentsProjection<S>
where
    S: TenantStore<PaymentId, PaymentReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, payment_id: &PaymentId) -> Option<PaymentReadModel> {
        self.store.get(tenant_id, payment_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<PaymentReadModel> {
        self.store.list(tenant_id)
    }

    /// Payments recorded against one booking.
    pub fn list_for_booking(&self, tenant_id: TenantId, booking_id: &BookingId) -> Vec<PaymentReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.booking_id == *booking_id)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: PaymentEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, payment_id) = match &event {
            PaymentEvent::PaymentRecorded(e) => (e.tenant_id, e.payment_id),
            PaymentEvent::InstallmentRecorded(e) => (e.tenant_id, e.payment_id),
            PaymentEvent::PaymentCompleted(e) => (e.tenant_id, e.payment_id),
            PaymentEvent::PaymentFailed(e) => (e.tenant_id, e.payment_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if payment_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event payment_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            PaymentEvent::PaymentRecorded(e) => {
                self.store.upsert(
                    tenant_id,
                    e.payment_id,
                    PaymentReadModel {
                        payment_id: e.payment_id,
                        booking_id: e.booking_id,
                        customer_email: e.customer_email,
                        amount: e.amount,
                        paid: e.initial_paid,
                        plan: e.plan,
                        transaction_id: e.transaction_id,
                        status: PaymentStatus::Pending,
                    },
                );
            }
            PaymentEvent::InstallmentRecorded(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.payment_id) {
                    rm.paid += e.amount;
                    self.store.upsert(tenant_id, e.payment_id, rm);
                }
            }
            PaymentEvent::PaymentCompleted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.payment_id) {
                    rm.status = PaymentStatus::Completed;
                    self.store.upsert(tenant_id, e.payment_id, rm);
                }
            }
            PaymentEvent::PaymentFailed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.payment_id) {
                    rm.status = PaymentStatus::Failed;
                    self.store.upsert(tenant_id, e.payment_id, rm);
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

    use shutterdesk_core::AggregateId;
    use shutterdesk_payments::payment::{InstallmentRecorded, PaymentRecorded};

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    #[test]
    fn installments_reduce_outstanding() {
        let projection = PaymentsProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let payment_id = PaymentId(AggregateId::new());
        let booking_id = BookingId(AggregateId::new());

        let recorded = PaymentEvent::PaymentRecorded(PaymentRecorded {
            tenant_id,
            payment_id,
            booking_id,
            customer_email: "amelia@example.com".to_string(),
            amount: 1775,
            initial_paid: 900,
            plan: PaymentPlan::Half {
                half_amount: 900,
                to_pay: 875,
            },
            transaction_id: Uuid::now_v7(),
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&EventEnvelope::new(
                Uuid::now_v7(),
                tenant_id,
                payment_id.0,
                "payments.payment",
                1,
                serde_json::to_value(&recorded).unwrap(),
            ))
            .unwrap();

        let installment = PaymentEvent::InstallmentRecorded(InstallmentRecorded {
            tenant_id,
            payment_id,
            amount: 875,
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&EventEnvelope::new(
                Uuid::now_v7(),
                tenant_id,
                payment_id.0,
                "payments.payment",
                2,
                serde_json::to_value(&installment).unwrap(),
            ))
            .unwrap();

        let rm = projection.get(tenant_id, &payment_id).unwrap();
        assert_eq!(rm.paid, 1775);
        assert_eq!(rm.outstanding(), 0);
        assert_eq!(projection.list_for_booking(tenant_id, &booking_id).len(), 1);
    }
}
