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
use shutterdesk_staff::{
    AssignTask, CancelTask, CompleteTask, Employee, EmployeeCommand, EmployeeId, HireEmployee,
    Task, TaskCommand, TaskId, TerminateEmployee, UpdateEmployeeDetails,
};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(hire_employee).get(list_employees))
        .nest("/tasks", tasks_router())
        .route("/:id", get(get_employee).put(update_employee))
        .route("/:id/terminate", post(terminate_employee))
        .route("/:id/tasks", get(list_employee_tasks))
}

fn tasks_router() -> Router {
    Router::new()
        .route("/", post(assign_task).get(list_tasks))
        .route("/:id", get(get_task))
        .route("/:id/complete", post(complete_task))
        .route("/:id/cancel", post(cancel_task))
}

pub async fn hire_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::HireEmployeeRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();

    let cmd = EmployeeCommand::HireEmployee(HireEmployee {
        tenant_id: tenant.tenant_id(),
        employee_id: EmployeeId::new(agg),
        name: body.name,
        position: body.position,
        contact: body.contact,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("staff.manage")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Employee>(
        tenant.tenant_id(),
        agg,
        "staff.employee",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| Employee::empty(EmployeeId::new(aggregate_id)),
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

pub async fn update_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateEmployeeRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id")
        }
    };

    let cmd = EmployeeCommand::UpdateEmployeeDetails(UpdateEmployeeDetails {
        tenant_id: tenant.tenant_id(),
        employee_id: EmployeeId::new(agg),
        name: body.name,
        position: body.position,
        contact: body.contact,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("staff.manage")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_employee(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn terminate_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id")
        }
    };

    let cmd = EmployeeCommand::TerminateEmployee(TerminateEmployee {
        tenant_id: tenant.tenant_id(),
        employee_id: EmployeeId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("staff.manage")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_employee(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn get_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id")
        }
    };

    match services.employees_get(tenant.tenant_id(), &EmployeeId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::employee_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "employee not found"),
    }
}

pub async fn list_employees(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .employees_list(tenant.tenant_id())
        .into_iter()
        .map(dto::employee_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn list_employee_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id")
        }
    };

    let items: Vec<serde_json::Value> = services
        .tasks_list_for_employee(tenant.tenant_id(), &EmployeeId::new(agg))
        .into_iter()
        .map(dto::task_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn assign_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::AssignTaskRequest>,
) -> axum::response::Response {
    let employee_agg: AggregateId = match body.employee_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid employee id")
        }
    };

    let agg = AggregateId::new();

    let cmd = TaskCommand::AssignTask(AssignTask {
        tenant_id: tenant.tenant_id(),
        task_id: TaskId::new(agg),
        employee_id: EmployeeId::new(employee_agg),
        title: body.title,
        description: body.description,
        due_date: body.due_date,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("staff.tasks.assign")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Task>(
        tenant.tenant_id(),
        agg,
        "staff.task",
        cmd_auth.inner,
        |_tenant_id, aggregate_id| Task::empty(TaskId::new(aggregate_id)),
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

pub async fn complete_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid task id"),
    };

    let cmd = TaskCommand::CompleteTask(CompleteTask {
        tenant_id: tenant.tenant_id(),
        task_id: TaskId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("staff.tasks.complete")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_task(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn cancel_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelTaskRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid task id"),
    };

    let cmd = TaskCommand::CancelTask(CancelTask {
        tenant_id: tenant.tenant_id(),
        task_id: TaskId::new(agg),
        reason: body.reason.unwrap_or_else(|| "cancelled".to_string()),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth::new(cmd, vec![Permission::new("staff.tasks.assign")]);

    if let Err(e) = crate::authz::authorize_command(&tenant, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    dispatch_task(&services, tenant.tenant_id(), agg, cmd_auth.inner)
}

pub async fn get_task(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid task id"),
    };

    match services.tasks_get(tenant.tenant_id(), &TaskId::new(agg)) {
        Some(rm) => (StatusCode::OK, Json(dto::task_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "task not found"),
    }
}

pub async fn list_tasks(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let items: Vec<serde_json::Value> = services
        .tasks_list(tenant.tenant_id())
        .into_iter()
        .map(dto::task_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_employee(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: EmployeeCommand,
) -> axum::response::Response {
    match services.dispatch::<Employee>(
        tenant_id,
        agg,
        "staff.employee",
        cmd,
        |_tenant_id, aggregate_id| Employee::empty(EmployeeId::new(aggregate_id)),
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

fn dispatch_task(
    services: &AppServices,
    tenant_id: shutterdesk_core::TenantId,
    agg: AggregateId,
    cmd: TaskCommand,
) -> axum::response::Response {
    match services.dispatch::<Task>(
        tenant_id,
        agg,
        "staff.task",
        cmd,
        |_tenant_id, aggregate_id| Task::empty(TaskId::new(aggregate_id)),
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
