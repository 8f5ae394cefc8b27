//! User aggregate for identity management (event-sourced).
//!
//! Covers staff and customer accounts alike: lifecycle plus role grants with
//! strict tenant isolation and privilege escalation prevention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

use crate::Role;

/// Unique identifier for a user within a tenant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<UserId> for Uuid {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl From<AggregateId> for UserId {
    fn from(value: AggregateId) -> Self {
        Self(*value.as_uuid())
    }
}

impl From<UserId> for AggregateId {
    fn from(value: UserId) -> Self {
        AggregateId::from_uuid(value.0)
    }
}

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UserStatus {
    /// Can authenticate and transact.
    #[default]
    Active,
    /// Cannot authenticate.
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => write!(f, "Active"),
            UserStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

/// User aggregate.
///
/// # Invariants
/// - A user belongs to exactly one tenant (tenant_id immutable after creation).
/// - Roles are tenant-scoped.
/// - Suspended users cannot be granted new roles.
/// - An actor cannot grant a role they do not hold (admin excepted).
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<Role>,
    pub status: UserStatus,
    pub version: u64,
    pub created: bool,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: UserId::new(),
            tenant_id: None,
            email: String::new(),
            display_name: String::new(),
            roles: Vec::new(),
            status: UserStatus::Active,
            version: 0,
            created: false,
        }
    }
}

impl User {
    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }

    fn ensure_not_suspended(&self) -> Result<(), DomainError> {
        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user is suspended"));
        }
        Ok(())
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub initial_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    /// Roles of the actor performing the grant (escalation check).
    pub actor_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Register(RegisterUser),
    AssignRole(AssignRole),
    RevokeRole(RevokeRole),
    Suspend(SuspendUser),
    Activate(ActivateUser),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistered {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub initial_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleAssigned {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRevoked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSuspended {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserEvent {
    Registered(UserRegistered),
    RoleAssigned(RoleAssigned),
    RoleRevoked(RoleRevoked),
    Suspended(UserSuspended),
    Activated(UserActivated),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Registered(_) => "auth.user.registered",
            UserEvent::RoleAssigned(_) => "auth.user.role_assigned",
            UserEvent::RoleRevoked(_) => "auth.user.role_revoked",
            UserEvent::Suspended(_) => "auth.user.suspended",
            UserEvent::Activated(_) => "auth.user.activated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Registered(e) => e.occurred_at,
            UserEvent::RoleAssigned(e) => e.occurred_at,
            UserEvent::RoleRevoked(e) => e.occurred_at,
            UserEvent::Suspended(e) => e.occurred_at,
            UserEvent::Activated(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Registered(e) => {
                self.id = e.user_id;
                self.tenant_id = Some(e.tenant_id);
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.roles = e.initial_roles.clone();
                self.status = UserStatus::Active;
                self.created = true;
            }
            UserEvent::RoleAssigned(e) => {
                self.roles.push(e.role.clone());
            }
            UserEvent::RoleRevoked(e) => {
                self.roles.retain(|r| r.as_str() != e.role.as_str());
            }
            UserEvent::Suspended(_) => {
                self.status = UserStatus::Suspended;
            }
            UserEvent::Activated(_) => {
                self.status = UserStatus::Active;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Register(cmd) => self.handle_register(cmd),
            UserCommand::AssignRole(cmd) => self.handle_assign_role(cmd),
            UserCommand::RevokeRole(cmd) => self.handle_revoke_role(cmd),
            UserCommand::Suspend(cmd) => self.handle_suspend(cmd),
            UserCommand::Activate(cmd) => self.handle_activate(cmd),
        }
    }
}

impl User {
    fn handle_register(&self, cmd: &RegisterUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }

        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        if cmd.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }

        Ok(vec![UserEvent::Registered(UserRegistered {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            email: cmd.email.trim().to_lowercase(),
            display_name: cmd.display_name.trim().to_string(),
            initial_roles: cmd.initial_roles.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_role(&self, cmd: &AssignRole) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_not_suspended()?;

        if self.roles.iter().any(|r| r.as_str() == cmd.role.as_str()) {
            return Err(DomainError::invariant("role already assigned"));
        }

        // Escalation guard: an actor may only grant roles they hold, unless
        // they are an admin.
        let actor_has_admin = cmd.actor_roles.iter().any(|r| r.as_str() == "admin");
        let actor_has_role = cmd
            .actor_roles
            .iter()
            .any(|r| r.as_str() == cmd.role.as_str());

        if !actor_has_admin && !actor_has_role {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![UserEvent::RoleAssigned(RoleAssigned {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke_role(&self, cmd: &RevokeRole) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if !self.roles.iter().any(|r| r.as_str() == cmd.role.as_str()) {
            return Err(DomainError::invariant("role not assigned"));
        }

        Ok(vec![UserEvent::RoleRevoked(RoleRevoked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user already suspended"));
        }

        Ok(vec![UserEvent::Suspended(UserSuspended {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateUser) -> Result<Vec<UserEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        self.ensure_tenant(cmd.tenant_id)?;

        if self.status == UserStatus::Active {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Activated(UserActivated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn registered_user(tenant_id: TenantId, user_id: UserId, roles: Vec<Role>) -> User {
        let mut user = User::empty(user_id);
        let cmd = UserCommand::Register(RegisterUser {
            tenant_id,
            user_id,
            email: "maya@studio.example".to_string(),
            display_name: "Maya".to_string(),
            initial_roles: roles,
            occurred_at: now(),
        });
        for event in user.handle(&cmd).unwrap() {
            user.apply(&event);
        }
        user
    }

    #[test]
    fn register_emits_registered_and_normalizes_email() {
        let user = User::empty(UserId::new());
        let cmd = UserCommand::Register(RegisterUser {
            tenant_id: TenantId::new(),
            user_id: UserId::new(),
            email: "  Maya@Studio.Example ".to_string(),
            display_name: "Maya".to_string(),
            initial_roles: vec![Role::new("staff")],
            occurred_at: now(),
        });

        let events = user.handle(&cmd).unwrap();
        let UserEvent::Registered(e) = &events[0] else {
            panic!("expected Registered event");
        };
        assert_eq!(e.email, "maya@studio.example");
    }

    #[test]
    fn register_rejects_invalid_email() {
        let user = User::empty(UserId::new());
        let cmd = UserCommand::Register(RegisterUser {
            tenant_id: TenantId::new(),
            user_id: UserId::new(),
            email: "not-an-email".to_string(),
            display_name: "Maya".to_string(),
            initial_roles: vec![],
            occurred_at: now(),
        });

        let err = user.handle(&cmd).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn assign_role_by_admin_succeeds() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let user = registered_user(tenant_id, user_id, vec![]);

        let cmd = UserCommand::AssignRole(AssignRole {
            tenant_id,
            user_id,
            role: Role::new("manager"),
            actor_roles: vec![Role::new("admin")],
            occurred_at: now(),
        });

        let events = user.handle(&cmd).unwrap();
        let UserEvent::RoleAssigned(e) = &events[0] else {
            panic!("expected RoleAssigned event");
        };
        assert_eq!(e.role.as_str(), "manager");
    }

    #[test]
    fn privilege_escalation_blocked() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let user = registered_user(tenant_id, user_id, vec![]);

        let cmd = UserCommand::AssignRole(AssignRole {
            tenant_id,
            user_id,
            role: Role::new("admin"),
            actor_roles: vec![Role::new("staff")],
            occurred_at: now(),
        });

        assert!(matches!(
            user.handle(&cmd).unwrap_err(),
            DomainError::Unauthorized
        ));
    }

    #[test]
    fn suspended_user_cannot_receive_roles() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = registered_user(tenant_id, user_id, vec![]);

        let suspend = UserCommand::Suspend(SuspendUser {
            tenant_id,
            user_id,
            reason: "account review".to_string(),
            occurred_at: now(),
        });
        for event in user.handle(&suspend).unwrap() {
            user.apply(&event);
        }
        assert_eq!(user.status, UserStatus::Suspended);

        let assign = UserCommand::AssignRole(AssignRole {
            tenant_id,
            user_id,
            role: Role::new("manager"),
            actor_roles: vec![Role::new("admin")],
            occurred_at: now(),
        });
        let err = user.handle(&assign).unwrap_err();
        assert!(err.to_string().contains("suspended"));
    }

    #[test]
    fn tenant_isolation_enforced() {
        let tenant_a = TenantId::new();
        let user_id = UserId::new();
        let user = registered_user(tenant_a, user_id, vec![]);

        let cmd = UserCommand::AssignRole(AssignRole {
            tenant_id: TenantId::new(),
            user_id,
            role: Role::new("manager"),
            actor_roles: vec![Role::new("admin")],
            occurred_at: now(),
        });

        let err = user.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    #[test]
    fn suspend_then_activate_round_trip() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = registered_user(tenant_id, user_id, vec![]);

        let suspend = UserCommand::Suspend(SuspendUser {
            tenant_id,
            user_id,
            reason: "seasonal".to_string(),
            occurred_at: now(),
        });
        for event in user.handle(&suspend).unwrap() {
            user.apply(&event);
        }

        let activate = UserCommand::Activate(ActivateUser {
            tenant_id,
            user_id,
            occurred_at: now(),
        });
        for event in user.handle(&activate).unwrap() {
            user.apply(&event);
        }

        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.version, 3);
    }

    #[test]
    fn revoke_removes_role() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let mut user = registered_user(tenant_id, user_id, vec![Role::new("manager")]);

        let cmd = UserCommand::RevokeRole(RevokeRole {
            tenant_id,
            user_id,
            role: Role::new("manager"),
            occurred_at: now(),
        });
        for event in user.handle(&cmd).unwrap() {
            user.apply(&event);
        }

        assert!(!user.roles.iter().any(|r| r.as_str() == "manager"));
    }

    #[test]
    fn revoke_unassigned_role_rejected() {
        let tenant_id = TenantId::new();
        let user_id = UserId::new();
        let user = registered_user(tenant_id, user_id, vec![]);

        let cmd = UserCommand::RevokeRole(RevokeRole {
            tenant_id,
            user_id,
            role: Role::new("manager"),
            occurred_at: now(),
        });

        assert!(matches!(
            user.handle(&cmd).unwrap_err(),
            DomainError::InvariantViolation(_)
        ));
    }
}
