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
use shutterdesk_rentals::{
    AdjustRentalStock, DelistRentalProduct, ListRentalProduct, RentalProduct, RentalProductCommand,
    RentalProductId, SetDailyRate,
};
use shutterdesk_resources::ResourceId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(list_rental_product).get(list_rentals))
        .route("/rentable", get(list_rentable))
        .route("/:id", get(get_rental))
        .route("/:id/rate", post(set_daily_rate))
        .route("/:id/adjust", post(adjust_rental_stock))
        .route("/:id/delist", post(delist_rental_product))
}

/// Create a rental listing carved out of an inventory resource.
///
/// Descriptive fields are copied from the resource's read model; stock
/// starts at zero and arrives only via transfers.
pub async fn list_rental_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::ListRentalProductRequest>,
) -> axum::response::Response {
    let resource_agg: AggregateId = match body.resource_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid resource id")
        }
    };

    let Some(resource) = services.resources_get(tenant.tenant_id(), &ResourceId::new(resource_agg))
    else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "resource not found");
    };

    let agg = AggregateId::new();

    let cmd = RentalProductCommand::ListRentalProduct(ListRentalProduct {
        tenant_id: tenant.tenant_id(),
        rental_product_id: RentalProductId::new(agg),
        resource_id: resource.resource_id,
        name: resource.name,
        category: resource.category,
        description: resource.description,
        condition: resource.condition,
        daily_rate: body.daily_rate,
        initial_stock: 0,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("rentals.list_product")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<RentalProduct>(
        tenant.tenant_id(),
        agg,
        "rentals.rental_product",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| RentalProduct::empty(RentalProductId::new(aggregate_id)),
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

pub async fn set_daily_rate(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetDailyRateRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid rental product id",
            )
        }
    };

    let cmd = RentalProductCommand::SetDailyRate(SetDailyRate {
        tenant_id: tenant.tenant_id(),
        rental_product_id: RentalProductId::new(agg),
        daily_rate: body.daily_rate,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("rentals.set_rate")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_rental(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn adjust_rental_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdjustStockRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid rental product id",
            )
        }
    };

    let cmd = RentalProductCommand::AdjustRentalStock(AdjustRentalStock {
        tenant_id: tenant.tenant_id(),
        rental_product_id: RentalProductId::new(agg),
        delta: body.delta,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("rentals.adjust")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_rental(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn delist_rental_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid rental product id",
            )
        }
    };

    let cmd = RentalProductCommand::DelistRentalProduct(DelistRentalProduct {
        tenant_id: tenant.tenant_id(),
        rental_product_id: RentalProductId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("rentals.delist")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_rental(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn get_rental(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "invalid_id",
                "invalid rental product id",
            )
        }
    };

    match services.rentals_get(tenant.tenant_id(), &RentalProductId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::rental_product_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "rental product not found"),
    }
}

pub async fn list_rentals(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .rentals_list(tenant.tenant_id())
        .into_iter()
        .map(dto::rental_product_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Listed products with stock on hand (the customer-facing browse view).
pub async fn list_rentable(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .rentals_list_rentable(tenant.tenant_id())
        .into_iter()
        .map(dto::rental_product_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_rental(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: RentalProductCommand,
) -> axum::response::Response {
    match services.dispatch::<RentalProduct>(
        tenant_id,
        agg,
        "rentals.rental_product",
        cmd,
        |_tenant_id, aggregate_id| RentalProduct::empty(RentalProductId::new(aggregate_id)),
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
