use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use shutterdesk_core::TenantId;
use shutterdesk_events::EventEnvelope;
use shutterdesk_staff::{EmployeeId, TaskEvent, TaskId, TaskStatus};

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable task board read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReadModel {
    pub task_id: TaskId,
    pub employee_id: EmployeeId,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    pub status: TaskStatus,
}

/// Task assignment projection.
#[derive(Debug)]
pub struct TasksProjection<S>
where
    S: TenantStore<TaskId, TaskReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> TasksProjection<S>
where
    S: TenantStore<TaskId, TaskReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, task_id: &TaskId) -> Option<TaskReadModel> {
        self.store.get(tenant_id, task_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<TaskReadModel> {
        self.store.list(tenant_id)
    }

    /// Tasks assigned to one employee.
    pub fn list_for_employee(&self, tenant_id: TenantId, employee_id: &EmployeeId) -> Vec<TaskReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|rm| rm.employee_id == *employee_id)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: TaskEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, task_id) = match &event {
            TaskEvent::TaskAssigned(e) => (e.tenant_id, e.task_id),
            TaskEvent::TaskCompleted(e) => (e.tenant_id, e.task_id),
            TaskEvent::TaskCancelled(e) => (e.tenant_id, e.task_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if task_id.0 != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event task_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            TaskEvent::TaskAssigned(e) => {
                self.store.upsert(
                    tenant_id,
                    e.task_id,
                    TaskReadModel {
                        task_id: e.task_id,
                        employee_id: e.employee_id,
                        title: e.title,
                        description: e.description,
                        due_date: e.due_date,
                        status: TaskStatus::Assigned,
                    },
                );
            }
            TaskEvent::TaskCompleted(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.task_id) {
                    rm.status = TaskStatus::Completed;
                    self.store.upsert(tenant_id, e.task_id, rm);
                }
            }
            TaskEvent::TaskCancelled(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.task_id) {
                    rm.status = TaskStatus::Cancelled;
                    self.store.upsert(tenant_id, e.task_id, rm);
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
