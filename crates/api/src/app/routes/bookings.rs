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
use shutterdesk_bookings::{
    quote, Booking, BookingCommand, BookingId, CancelBooking, ConfirmBooking, PlaceBooking,
    ShootSelection,
};
use shutterdesk_core::AggregateId;

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(place_booking).get(list_bookings))
        .route("/quote", post(quote_booking))
        .route("/:id", get(get_booking))
        .route("/:id/confirm", post(confirm_booking))
        .route("/:id/cancel", post(cancel_booking))
}

/// Price a selection without placing a booking. Same calculator the
/// aggregate uses, so the preview always matches the committed total.
pub async fn quote_booking(Json(selection): Json<ShootSelection>) -> axum::response::Response {
    match quote(&selection) {
        Ok(breakdown) => (StatusCode::OK, Json(serde_json::json!(breakdown))).into_response(),
        Err(e) => errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    }
}

pub async fn place_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::PlaceBookingRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = BookingCommand::PlaceBooking(PlaceBooking {
        tenant_id: tenant.tenant_id(),
        booking_id: BookingId::new(agg),
        customer: body.customer,
        selection: body.selection,
        shoot_date: body.shoot_date,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("bookings.place")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Booking>(
        tenant.tenant_id(),
        agg,
        "bookings.booking",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| Booking::empty(BookingId::new(aggregate_id)),
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

pub async fn confirm_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id")
        }
    };

    let cmd = BookingCommand::ConfirmBooking(ConfirmBooking {
        tenant_id: tenant.tenant_id(),
        booking_id: BookingId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("bookings.confirm")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_booking(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn cancel_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelBookingRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id")
        }
    };

    let cmd = BookingCommand::CancelBooking(CancelBooking {
        tenant_id: tenant.tenant_id(),
        booking_id: BookingId::new(agg),
        reason: body.reason.unwrap_or_else(|| "cancelled by customer".to_string()),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("bookings.cancel")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_booking(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id")
        }
    };

    match services.bookings_get(tenant.tenant_id(), &BookingId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::booking_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "booking not found"),
    }
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .bookings_list(tenant.tenant_id())
        .into_iter()
        .map(dto::booking_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_booking(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: BookingCommand,
) -> axum::response::Response {
    match services.dispatch::<Booking>(
        tenant_id,
        agg,
        "bookings.booking",
        cmd,
        |_tenant_id, aggregate_id| Booking::empty(BookingId::new(aggregate_id)),
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
