use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use shutterdesk_auth::Permission;
use shutterdesk_core::AggregateId;
use shutterdesk_rentals::{AdjustRentalStock, RentalProduct, RentalProductCommand, RentalProductId};
use shutterdesk_resources::{
    AdjustStock, CreateResource, Resource, ResourceCommand, ResourceId, RetireResource,
    ReturnFromRental, TransferToRental, UpdateDetails,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_resource).get(list_resources))
        .route("/:id", get(get_resource).put(update_resource))
        .route("/:id/adjust", post(adjust_stock))
        .route("/:id/transfer-to-rental", post(transfer_to_rental))
        .route("/:id/return-from-rental", post(return_from_rental))
        .route("/:id/retire", post(retire_resource))
}

pub async fn create_resource(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateResourceRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let resource_id = ResourceId::new(agg);

    let cmd = ResourceCommand::CreateResource(CreateResource {
        tenant_id: tenant.tenant_id(),
        resource_id,
        name: body.name,
        category: body.category,
        description: body.description,
        condition: body.condition,
        initial_stock: body.initial_stock,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("resources.create")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Resource>(
        tenant.tenant_id(),
        agg,
        "resources.resource",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| Resource::empty(ResourceId::new(aggregate_id)),
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

pub async fn update_resource(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateResourceRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resource id")
        }
    };

    let cmd = ResourceCommand::UpdateDetails(UpdateDetails {
        tenant_id: tenant.tenant_id(),
        resource_id: ResourceId::new(agg),
        name: body.name,
        description: body.description,
        condition: body.condition,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("resources.update")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_resource(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resource id")
        }
    };

    let cmd = ResourceCommand::AdjustStock(AdjustStock {
        tenant_id: tenant.tenant_id(),
        resource_id: ResourceId::new(agg),
        delta: body.delta,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("resources.adjust")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_resource(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

/// Move stock from a resource's available pool into a rental listing.
///
/// Two aggregates are involved; the resource is debited first and the
/// transfer is rolled back if crediting the rental listing fails.
pub async fn transfer_to_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransferRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resource id")
        }
    };
    let rental_agg: AggregateId = match body.rental_product_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid rental product id",
            )
        }
    };

    // The listing must be carved out of this resource.
    let Some(listing) = services.rentals_get(tenant.tenant_id(), &RentalProductId::new(rental_agg))
    else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "rental product not found");
    };
    if listing.resource_id != ResourceId::new(agg) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "rental product is backed by a different resource",
        );
    }

    let cmd = ResourceCommand::TransferToRental(TransferToRental {
        tenant_id: tenant.tenant_id(),
        resource_id: ResourceId::new(agg),
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("resources.transfer")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Resource>(
        tenant.tenant_id(),
        agg,
        "resources.resource",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| Resource::empty(ResourceId::new(aggregate_id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    let credit = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
        tenant_id: tenant.tenant_id(),
        rental_product_id: RentalProductId::new(rental_agg),
        delta: body.quantity,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<RentalProduct>(
        tenant.tenant_id(),
        rental_agg,
        "rentals.rental_product",
        credit,
        |_tenant_id, aggregate_id| RentalProduct::empty(RentalProductId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "resource_id": agg.to_string(),
                "rental_product_id": rental_agg.to_string(),
                "quantity": body.quantity,
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => {
            // Roll the units back into the available pool.
            let rollback = ResourceCommand::ReturnFromRental(ReturnFromRental {
                tenant_id: tenant.tenant_id(),
                resource_id: ResourceId::new(agg),
                quantity: body.quantity,
                occurred_at: Utc::now(),
            });
            if let Err(rb) = services.dispatch::<Resource>(
                tenant.tenant_id(),
                agg,
                "resources.resource",
                rollback,
                |_tenant_id, aggregate_id| Resource::empty(ResourceId::new(aggregate_id)),
            ) {
                tracing::warn!(resource_id = %agg, error = ?rb, "transfer rollback failed");
            }
            errors::dispatch_error_to_response(e)
        }
    }
}

/// Inverse of `transfer_to_rental`: debit the rental listing, then return
/// the units to the resource's available pool.
pub async fn return_from_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TransferRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resource id")
        }
    };
    let rental_agg: AggregateId = match body.rental_product_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid rental product id",
            )
        }
    };

    let Some(listing) = services.rentals_get(tenant.tenant_id(), &RentalProductId::new(rental_agg))
    else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "rental product not found");
    };
    if listing.resource_id != ResourceId::new(agg) {
        return errors::json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invariant_violation",
            "rental product is backed by a different resource",
        );
    }

    let debit = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
        tenant_id: tenant.tenant_id(),
        rental_product_id: RentalProductId::new(rental_agg),
        delta: -body.quantity,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(debit, vec![Permission::new("resources.transfer")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<RentalProduct>(
        tenant.tenant_id(),
        rental_agg,
        "rentals.rental_product",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| RentalProduct::empty(RentalProductId::new(aggregate_id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    let cmd = ResourceCommand::ReturnFromRental(ReturnFromRental {
        tenant_id: tenant.tenant_id(),
        resource_id: ResourceId::new(agg),
        quantity: body.quantity,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<Resource>(
        tenant.tenant_id(),
        agg,
        "resources.resource",
        cmd,
        |_tenant_id, aggregate_id| Resource::empty(ResourceId::new(aggregate_id)),
    ) {
        Ok(committed) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "resource_id": agg.to_string(),
                "rental_product_id": rental_agg.to_string(),
                "quantity": body.quantity,
                "events_committed": committed.len(),
            })),
        )
            .into_response(),
        Err(e) => {
            // Re-credit the listing so the two pools stay conserved.
            let rollback = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
                tenant_id: tenant.tenant_id(),
                rental_product_id: RentalProductId::new(rental_agg),
                delta: body.quantity,
                occurred_at: Utc::now(),
            });
            if let Err(rb) = services.dispatch::<RentalProduct>(
                tenant.tenant_id(),
                rental_agg,
                "rentals.rental_product",
                rollback,
                |_tenant_id, aggregate_id| RentalProduct::empty(RentalProductId::new(aggregate_id)),
            ) {
                tracing::warn!(rental_product_id = %rental_agg, error = ?rb, "return rollback failed");
            }
            errors::dispatch_error_to_response(e)
        }
    }
}

pub async fn retire_resource(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resource id")
        }
    };

    let cmd = ResourceCommand::RetireResource(RetireResource {
        tenant_id: tenant.tenant_id(),
        resource_id: ResourceId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("resources.retire")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_resource(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn get_resource(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resource id")
        }
    };

    match services.resources_get(tenant.tenant_id(), &ResourceId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::resource_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "resource not found"),
    }
}

pub async fn list_resources(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .resources_list(tenant.tenant_id())
        .into_iter()
        .map(dto::resource_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_resource(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: ResourceCommand,
) -> axum::response::Response {
    match services.dispatch::<Resource>(
        tenant_id,
        agg,
        "resources.resource",
        cmd,
        |_tenant_id, aggregate_id| Resource::empty(ResourceId::new(aggregate_id)),
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
