use serde_json::Value as JsonValue;

use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;
use shutterdesk_staff::{ContactInfo, EmployeeEvent, EmployeeId, EmployeeStatus};

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable employee roster read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeReadModel {
    pub employee_id: EmployeeId,
    pub name: String,
    pub position: String,
    pub contact: ContactInfo,
    pub status: EmployeeStatus,
}

/// Employee roster projection.
#[derive(Debug)]
pub struct EmployeesProjection<S>
where
    S: TenantStore<EmployeeId, EmployeeReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> EmployeesProjection<S>
where
    S: TenantStore<EmployeeId, EmployeeReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, employee_id: &EmployeeId) -> Option<EmployeeReadModel> {
        self.store.get(tenant_id, employee_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<EmployeeReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: EmployeeEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, employee_id) = match &event {
            EmployeeEvent::EmployeeHired(e) => (e.tenant_id, e.employee_id),
            EmployeeEvent::EmployeeUpdated(e) => (e.tenant_id, e.employee_id),
            EmployeeEvent::EmployeeTerminated(e) => (e.tenant_id, e.employee_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if employee_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event employee_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            EmployeeEvent::EmployeeHired(e) => {
                self.store.upsert(
                    tenant_id,
                    e.employee_id,
                    EmployeeReadModel {
                        employee_id: e.employee_id,
                        name: e.name,
                        position: e.position,
                        contact: e.contact,
                        status: EmployeeStatus::Active,
                    },
                );
            }
            EmployeeEvent::EmployeeUpdated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.employee_id) {
                    rm.name = e.name;
                    rm.position = e.position;
                    rm.contact = e.contact;
                    self.store.upsert(tenant_id, e.employee_id, rm);
                }
            }
            EmployeeEvent::EmployeeTerminated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.employee_id) {
                    rm.status = EmployeeStatus::Terminated;
                    self.store.upsert(tenant_id, e.employee_id, rm);
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
