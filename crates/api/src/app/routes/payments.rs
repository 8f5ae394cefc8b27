use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use shutterdesk_auth::Permission;
use shutterdesk_bookings::BookingId;
use shutterdesk_core::AggregateId;
use shutterdesk_payments::{
    MarkCompleted, MarkFailed, Payment, PaymentCommand, PaymentId, RecordInstallment,
    RecordPayment,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_payment).get(list_payments))
        .route("/:id", get(get_payment))
        .route("/:id/installments", post(record_installment))
        .route("/:id/complete", post(mark_completed))
        .route("/:id/fail", post(mark_failed))
        .route("/by-booking/:booking_id", get(list_for_booking))
}

/// Record a payment against a booking. The transaction id is assigned
/// server-side; clients never supply one.
pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let booking_agg: AggregateId = match body.booking_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id")
        }
    };

    let agg = AggregateId::new();

    let cmd = PaymentCommand::RecordPayment(RecordPayment {
        tenant_id: tenant.tenant_id(),
        payment_id: PaymentId::new(agg),
        booking_id: BookingId::new(booking_agg),
        customer_email: body.customer_email,
        amount: body.amount,
        plan: body.plan,
        transaction_id: Uuid::now_v7(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("payments.record")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Payment>(
        tenant.tenant_id(),
        agg,
        "payments.payment",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| Payment::empty(PaymentId::new(aggregate_id)),
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

pub async fn record_installment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordInstallmentRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid payment id")
        }
    };

    let cmd = PaymentCommand::RecordInstallment(RecordInstallment {
        tenant_id: tenant.tenant_id(),
        payment_id: PaymentId::new(agg),
        amount: body.amount,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("payments.installment")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_payment(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn mark_completed(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid payment id")
        }
    };

    let cmd = PaymentCommand::MarkCompleted(MarkCompleted {
        tenant_id: tenant.tenant_id(),
        payment_id: PaymentId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("payments.complete")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_payment(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn mark_failed(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::FailPaymentRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid payment id")
        }
    };

    let cmd = PaymentCommand::MarkFailed(MarkFailed {
        tenant_id: tenant.tenant_id(),
        payment_id: PaymentId::new(agg),
        reason: body.reason.unwrap_or_else(|| "payment failed".to_string()),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("payments.fail")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_payment(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn get_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid payment id")
        }
    };

    match services.payments_get(tenant.tenant_id(), &PaymentId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::payment_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "payment not found"),
    }
}

pub async fn list_payments(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .payments_list(tenant.tenant_id())
        .into_iter()
        .map(dto::payment_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn list_for_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(booking_id): Path<String>,
) -> axum::response::Response {
    let booking_agg: AggregateId = match booking_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid booking id")
        }
    };

    let items: Vec<serde_json::Value> = services
        .payments_list_for_booking(tenant.tenant_id(), &BookingId::new(booking_agg))
        .into_iter()
        .map(dto::payment_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_payment(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: PaymentCommand,
) -> axum::response::Response {
    match services.dispatch::<Payment>(
        tenant_id,
        agg,
        "payments.payment",
        cmd,
        |_tenant_id, aggregate_id| Payment::empty(PaymentId::new(aggregate_id)),
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
