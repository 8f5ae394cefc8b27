//! API-side authorization guard for commands.
//!
//! This enforces authorization at the command boundary (before dispatch),
//! while keeping domain aggregates and infra auth-agnostic.

use shutterdesk_auth::{
    authorize, AuthzError, CommandAuthorization, Permission, Principal, Role, TenantMembership,
};

use crate::context::{PrincipalContext, TenantContext};

/// Check authorization for a command in the current request context.
///
/// This is intended to be called **before** dispatching a command.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let membership = TenantMembership {
        tenant_id: tenant.tenant_id(),
        roles: principal.roles().to_vec(),
        permissions: permissions_from_roles(principal.roles()),
    };

    let principal = Principal {
        principal_id: principal.principal_id(),
        active_tenant_id: tenant.tenant_id(),
        membership,
    };

    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }

    Ok(())
}

/// Static role→permission policy.
///
/// "admin" grants everything within the tenant; "staff" covers day-to-day
/// studio operations; "customer" covers the self-service surface.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    let mut permissions = Vec::new();

    for role in roles {
        match role.as_str() {
            "admin" => return vec![Permission::new("*")],
            "staff" => permissions.extend(
                [
                    "resources.create",
                    "resources.update",
                    "resources.adjust",
                    "resources.transfer",
                    "resources.retire",
                    "rentals.list_product",
                    "rentals.adjust",
                    "rentals.set_rate",
                    "rentals.delist",
                    "catalog.create",
                    "catalog.update",
                    "catalog.adjust",
                    "catalog.activate",
                    "catalog.archive",
                    "bookings.confirm",
                    "bookings.cancel",
                    "payments.record",
                    "payments.installment",
                    "payments.complete",
                    "payments.fail",
                    "staff.tasks.complete",
                ]
                .into_iter()
                .map(Permission::new),
            ),
            "customer" => permissions.extend(
                ["bookings.place", "bookings.cancel", "feedback.submit"]
                    .into_iter()
                    .map(Permission::new),
            ),
            _ => {}
        }
    }

    permissions
}
