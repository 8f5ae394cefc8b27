use serde_json::Value as JsonValue;

use shutterdesk_auth::{Role, UserEvent, UserId, UserStatus};
use shutterdesk_core::{AggregateId, TenantId};
use shutterdesk_events::EventEnvelope;

use crate::projections::{CursorTracker, ProjectionError};
use crate::read_model::TenantStore;

/// Queryable user account read model.
///
/// Backs login: the OTP flow looks accounts up by email before issuing a
/// challenge, so `find_by_email` is part of the query surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub status: UserStatus,
}

/// User account projection.
#[derive(Debug)]
pub struct UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    store: S,
    cursors: CursorTracker,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: CursorTracker::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        self.store.list(tenant_id)
    }

    /// Case-insensitive email lookup (emails are stored lowercased).
    pub fn find_by_email(&self, tenant_id: TenantId, email: &str) -> Option<UserReadModel> {
        let needle = email.trim().to_lowercase();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|rm| rm.email == needle)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if !self.cursors.check(tenant_id, aggregate_id, seq)? {
            return Ok(());
        }

        let event: UserEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let (event_tenant, user_id) = match &event {
            UserEvent::Registered(e) => (e.tenant_id, e.user_id),
            UserEvent::RoleAssigned(e) => (e.tenant_id, e.user_id),
            UserEvent::RoleRevoked(e) => (e.tenant_id, e.user_id),
            UserEvent::Suspended(e) => (e.tenant_id, e.user_id),
            UserEvent::Activated(e) => (e.tenant_id, e.user_id),
        };

        if event_tenant != tenant_id {
            return Err(ProjectionError::TenantIsolation(
                "event tenant_id does not match envelope tenant_id".to_string(),
            ));
        }
        if AggregateId::from(user_id) != aggregate_id {
            return Err(ProjectionError::TenantIsolation(
                "event user_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match event {
            UserEvent::Registered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.user_id,
                    UserReadModel {
                        user_id: e.user_id,
                        email: e.email,
                        display_name: e.display_name,
                        roles: e.initial_roles,
                        status: UserStatus::Active,
                    },
                );
            }
            UserEvent::RoleAssigned(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    if !rm.roles.contains(&e.role) {
                        rm.roles.push(e.role);
                    }
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::RoleRevoked(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.roles.retain(|r| *r != e.role);
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::Suspended(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.status = UserStatus::Suspended;
                    self.store.upsert(tenant_id, e.user_id, rm);
                }
            }
            UserEvent::Activated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.user_id) {
                    rm.status = UserStatus::Active;
                    self.store.upsert(tenant_id, e.user_id, rm);
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

    use shutterdesk_auth::user::UserRegistered;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    #[test]
    fn find_by_email_normalizes_case() {
        let projection = UsersProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant_id = TenantId::new();
        let user_id = UserId::new();

        let event = UserEvent::Registered(UserRegistered {
            tenant_id,
            user_id,
            email: "amelia@example.com".to_string(),
            display_name: "Amelia".to_string(),
            initial_roles: vec![Role::new("customer")],
            occurred_at: Utc::now(),
        });
        projection
            .apply_envelope(&EventEnvelope::new(
                Uuid::now_v7(),
                tenant_id,
                AggregateId::from(user_id),
                "auth.user",
                1,
                serde_json::to_value(&event).unwrap(),
            ))
            .unwrap();

        let found = projection.find_by_email(tenant_id, " Amelia@Example.COM ");
        assert_eq!(found.map(|rm| rm.user_id), Some(user_id));
    }
}
