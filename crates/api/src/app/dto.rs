use chrono::{DateTime, Utc};
use serde::Deserialize;

use shutterdesk_bookings::{CustomerDetails, ShootSelection};
use shutterdesk_infra::projections::{
    bookings::BookingReadModel,
    catalog::ProductReadModel,
    employees::EmployeeReadModel,
    feedback_entries::FeedbackReadModel,
    payments::PaymentReadModel,
    rentals::RentalProductReadModel,
    resources::ResourceReadModel,
    tasks::TaskReadModel,
};
use shutterdesk_payments::PaymentPlan;
use shutterdesk_resources::ResourceCondition;
use shutterdesk_staff::ContactInfo;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateResourceRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub condition: ResourceCondition,
    #[serde(default)]
    pub initial_stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResourceRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub condition: Option<ResourceCondition>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub rental_product_id: String,
    pub quantity: i64,
}

/// Descriptive fields are not accepted here; they are copied from the
/// backing resource at carve-out time.
#[derive(Debug, Deserialize)]
pub struct ListRentalProductRequest {
    pub resource_id: String,
    pub daily_rate: i64,
}

#[derive(Debug, Deserialize)]
pub struct SetDailyRateRequest {
    pub daily_rate: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    #[serde(default)]
    pub initial_stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceBookingRequest {
    pub customer: CustomerDetails,
    pub selection: ShootSelection,
    pub shoot_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub booking_id: String,
    pub customer_email: String,
    pub amount: i64,
    pub plan: PaymentPlan,
}

#[derive(Debug, Deserialize)]
pub struct RecordInstallmentRequest {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct FailPaymentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HireEmployeeRequest {
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub contact: ContactInfo,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    pub position: Option<String>,
    pub contact: Option<ContactInfo>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    pub employee_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CancelTaskRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub customer_name: String,
    pub customer_email: String,
    pub rating: u8,
    pub comment: String,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn resource_to_json(rm: ResourceReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.resource_id.0.to_string(),
        "name": rm.name,
        "category": rm.category,
        "description": rm.description,
        "condition": rm.condition,
        "stock": rm.stock,
        "rental_stock": rm.rental_stock,
        "retired": rm.retired,
    })
}

pub fn rental_product_to_json(rm: RentalProductReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.rental_product_id.0.to_string(),
        "resource_id": rm.resource_id.0.to_string(),
        "name": rm.name,
        "category": rm.category,
        "description": rm.description,
        "condition": rm.condition,
        "daily_rate": rm.daily_rate,
        "rental_stock": rm.rental_stock,
        "delisted": rm.delisted,
    })
}

pub fn product_to_json(rm: ProductReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.product_id.0.to_string(),
        "name": rm.name,
        "category": rm.category,
        "description": rm.description,
        "price": rm.price,
        "stock": rm.stock,
        "status": rm.status,
    })
}

pub fn booking_to_json(rm: BookingReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.booking_id.0.to_string(),
        "customer_name": rm.customer_name,
        "customer_email": rm.customer_email,
        "selection": rm.selection,
        "shoot_date": rm.shoot_date.to_rfc3339(),
        "total_price": rm.total_price,
        "status": rm.status,
        "cancel_reason": rm.cancel_reason,
    })
}

pub fn payment_to_json(rm: PaymentReadModel) -> serde_json::Value {
    let outstanding = rm.outstanding();
    serde_json::json!({
        "id": rm.payment_id.0.to_string(),
        "booking_id": rm.booking_id.0.to_string(),
        "customer_email": rm.customer_email,
        "amount": rm.amount,
        "paid": rm.paid,
        "outstanding": outstanding,
        "plan": rm.plan,
        "transaction_id": rm.transaction_id.to_string(),
        "status": rm.status,
    })
}

pub fn employee_to_json(rm: EmployeeReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.employee_id.0.to_string(),
        "name": rm.name,
        "position": rm.position,
        "contact": rm.contact,
        "status": rm.status,
    })
}

pub fn task_to_json(rm: TaskReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.task_id.0.to_string(),
        "employee_id": rm.employee_id.0.to_string(),
        "title": rm.title,
        "description": rm.description,
        "due_date": rm.due_date.map(|d| d.to_rfc3339()),
        "status": rm.status,
    })
}

pub fn feedback_to_json(rm: FeedbackReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.feedback_id.0.to_string(),
        "customer_name": rm.customer_name,
        "customer_email": rm.customer_email,
        "rating": rm.rating,
        "comment": rm.comment,
        "status": rm.status,
    })
}
