use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use shutterdesk_bookings::{BookingEvent, BookingId, BookingStatus, ShootSelection};
use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable booking read model.
///
/// `total_price` is the server-side quote frozen at placement; the saga uses
/// it when requesting payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReadModel {
    pub booking_id: BookingId,
    pub customer_name: String,
    pub customer_email: String,
    pub selection: ShootSelection,
    pub shoot_date: DateTime<Utc>,
    pub total_price: i64,
    pub status: BookingStatus,
    pub cancel_reason: Option<String>,
}

/// Booking projection.
#[derive(Debug)]
pub struct BookingsProjection<S>
where
    S: TenantStore<BookingId, BookingReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> BookingsProjection<S>
where
    S: TenantStore<BookingId, BookingReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, booking_id: &BookingId) -> Option<BookingReadModel> {
        self.store.get(tenant_id, booking_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<BookingReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: BookingEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, booking_id) = match &event {
            BookingEvent::BookingPlaced(e) => (e.tenant_id, e.booking_id),
            BookingEvent::BookingConfirmed(e) => (e.tenant_id, e.booking_id),
            BookingEvent::BookingCancelled(e) => (e.tenant_id, e.booking_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if booking_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event booking_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            BookingEvent::BookingPlaced(e) => {
                self.store.upsert(
                    tenant_id,
                    e.booking_id,
                    BookingReadModel {
                        booking_id: e.booking_id,
                        customer_name: e.customer.name,
                        customer_email: e.customer.email,
                        selection: e.selection,
                        shoot_date: e.shoot_date,
                        total_price: e.total_price,
                        status: BookingStatus::Pending,
                        cancel_reason: None,
                    },
                );
            }
            BookingEvent::BookingConfirmed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.booking_id) {
                    rm.status = BookingStatus::Confirmed;
                    self.store.upsert(tenant_id, e.booking_id, rm);
                }
            }
            BookingEvent::BookingCancelled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.booking_id) {
                    rm.status = BookingStatus::Cancelled;
                    rm.cancel_reason = Some(e.reason);
                    self.store.upsert(tenant_id, e.booking_id, rm);
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
