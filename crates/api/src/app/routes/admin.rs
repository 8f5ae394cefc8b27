//! Admin routes for identity management.
//!
//! Tenant-scoped user administration with privilege escalation prevention:
//! an actor can never hand out a role they do not hold themselves.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use shutterdesk_auth::user::{
    ActivateUser, AssignRole, RegisterUser, RevokeRole, SuspendUser, User, UserCommand, UserId,
};
use shutterdesk_auth::{Permission, Role};
use shutterdesk_core::AggregateId;
use shutterdesk_infra::projections::UserReadModel;

use crate::app::routes::common::CmdAuth;
use crate::app::{errors, services::AppServices};
use crate::context::{PrincipalContext, TenantContext};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub display_name: String,
    pub initial_roles: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct SuspendUserRequest {
    pub reason: Option<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/roles", post(assign_role))
        .route("/users/:id/roles/:role", axum::routing::delete(revoke_role))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/users/:id/permissions", get(inspect_permissions))
}

/// POST /admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateUserRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let user_id = UserId::from(agg);

    let initial_roles: Vec<Role> = body
        .initial_roles
        .unwrap_or_default()
        .into_iter()
        .map(Role::new)
        .collect();

    // Actor cannot seed roles they do not hold (admins excepted).
    let actor_is_admin = principal.roles().iter().any(|r| r.as_str() == "admin");
    if !actor_is_admin {
        for role in &initial_roles {
            let actor_has_role = principal.roles().iter().any(|r| r.as_str() == role.as_str());
            if !actor_has_role && role.as_str() != "customer" {
                return errors::json_error(
                    StatusCode::FORBIDDEN,
                    "privilege_escalation",
                    format!("cannot assign role '{}' that you don't have", role.as_str()),
                );
            }
        }
    }

    let cmd = UserCommand::Register(RegisterUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        email: body.email,
        display_name: body.display_name,
        initial_roles,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("admin.users.create")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<User>(
        tenant.tenant_id(),
        agg,
        "auth.user",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| User::empty(UserId::from(aggregate_id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

/// GET /admin/users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth::new((), vec![Permission::new("admin.users.read")]);
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let users = services.users_list(tenant.tenant_id());
    let items: Vec<serde_json::Value> = users.into_iter().map(user_to_json).collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// GET /admin/users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth::new((), vec![Permission::new("admin.users.read")]);
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let user_id: UserId = match id.parse::<uuid::Uuid>() {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };

    match services.users_get(tenant.tenant_id(), &user_id) {
        Some(user) => (StatusCode::OK, Json(user_to_json(user))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
    }
}

/// POST /admin/users/:id/roles
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<AssignRoleRequest>,
) -> axum::response::Response {
    let user_id: UserId = match id.parse::<uuid::Uuid>() {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };
    let agg = AggregateId::from_uuid(*user_id.as_uuid());

    // Actor roles travel with the command; the aggregate enforces the
    // escalation rule.
    let cmd = UserCommand::AssignRole(AssignRole {
        tenant_id: tenant.tenant_id(),
        user_id,
        role: Role::new(body.role),
        actor_roles: principal.roles().to_vec(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("admin.users.assign_role")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_user(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

/// DELETE /admin/users/:id/roles/:role
pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, role)): Path<(String, String)>,
) -> axum::response::Response {
    let user_id: UserId = match id.parse::<uuid::Uuid>() {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };
    let agg = AggregateId::from_uuid(*user_id.as_uuid());

    let cmd = UserCommand::RevokeRole(RevokeRole {
        tenant_id: tenant.tenant_id(),
        user_id,
        role: Role::new(role),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("admin.users.revoke_role")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_user(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

/// POST /admin/users/:id/suspend
pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<SuspendUserRequest>,
) -> axum::response::Response {
    let user_id: UserId = match id.parse::<uuid::Uuid>() {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };
    let agg = AggregateId::from_uuid(*user_id.as_uuid());

    let cmd = UserCommand::Suspend(SuspendUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        reason: body.reason.unwrap_or_else(|| "no reason provided".to_string()),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("admin.users.suspend")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_user(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

/// POST /admin/users/:id/activate
pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match id.parse::<uuid::Uuid>() {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };
    let agg = AggregateId::from_uuid(*user_id.as_uuid());

    let cmd = UserCommand::Activate(ActivateUser {
        tenant_id: tenant.tenant_id(),
        user_id,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("admin.users.activate")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_user(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

/// GET /admin/users/:id/permissions
pub async fn inspect_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let cmd_auth = CmdAuth::new((), vec![Permission::new("admin.users.read")]);
    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let user_id: UserId = match id.parse::<uuid::Uuid>() {
        Ok(uuid) => UserId::from_uuid(uuid),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id")
        }
    };

    match services.users_get(tenant.tenant_id(), &user_id) {
        Some(user) => {
            let mut permissions: Vec<String> = crate::authz::permissions_from_roles(&user.roles)
                .into_iter()
                .map(|p| p.as_str().to_string())
                .collect();
            permissions.sort();

            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "user_id": user.user_id.as_uuid().to_string(),
                    "tenant_id": tenant.tenant_id().to_string(),
                    "roles": user.roles,
                    "permissions": permissions,
                })),
            )
                .into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found"),
    }
}

fn dispatch_user(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: UserCommand,
) -> axum::response::Response {
    match services.dispatch::<User>(
        tenant_id,
        agg,
        "auth.user",
        cmd,
        |_tenant_id, aggregate_id| User::empty(UserId::from(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": agg.to_string(),
                "events_committed": committed.len(),
                "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

fn user_to_json(user: UserReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": user.user_id.as_uuid().to_string(),
        "email": user.email,
        "display_name": user.display_name,
        "roles": user.roles,
        "status": user.status,
    })
}
