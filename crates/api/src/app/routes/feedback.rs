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
use shutterdesk_feedback::{
    ArchiveFeedback, Feedback, FeedbackCommand, FeedbackId, PublishFeedback, SubmitFeedback,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_feedback).get(list_feedback))
        .route("/published", get(list_published))
        .route("/:id", get(get_feedback))
        .route("/:id/publish", post(publish_feedback))
        .route("/:id/archive", post(archive_feedback))
}

pub async fn submit_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::SubmitFeedbackRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = FeedbackCommand::SubmitFeedback(SubmitFeedback {
        tenant_id: tenant.tenant_id(),
        feedback_id: FeedbackId::new(agg),
        customer_name: body.customer_name,
        customer_email: body.customer_email,
        rating: body.rating,
        comment: body.comment,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("feedback.submit")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Feedback>(
        tenant.tenant_id(),
        agg,
        "feedback.feedback",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| Feedback::empty(FeedbackId::new(aggregate_id)),
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

pub async fn publish_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid feedback id")
        }
    };

    let cmd = FeedbackCommand::PublishFeedback(PublishFeedback {
        tenant_id: tenant.tenant_id(),
        feedback_id: FeedbackId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("feedback.moderate")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_feedback(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn archive_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid feedback id")
        }
    };

    let cmd = FeedbackCommand::ArchiveFeedback(ArchiveFeedback {
        tenant_id: tenant.tenant_id(),
        feedback_id: FeedbackId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("feedback.moderate")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_feedback(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn get_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid feedback id")
        }
    };

    match services.feedback_get(tenant.tenant_id(), &FeedbackId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::feedback_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "feedback not found"),
    }
}

pub async fn list_feedback(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .feedback_list(tenant.tenant_id())
        .into_iter()
        .map(dto::feedback_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Reviews published to the public site.
pub async fn list_published(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .feedback_list_published(tenant.tenant_id())
        .into_iter()
        .map(dto::feedback_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_feedback(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: FeedbackCommand,
) -> axum::response::Response {
    match services.dispatch::<Feedback>(
        tenant_id,
        agg,
        "feedback.feedback",
        cmd,
        |_tenant_id, aggregate_id| Feedback::empty(FeedbackId::new(aggregate_id)),
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
