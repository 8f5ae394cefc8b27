//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are:
//! - **Rebuildable**: reconstructed from the event stream
//! - **Tenant-isolated**: data is partitioned by tenant
//! - **Idempotent**: safe for at-least-once delivery

pub mod cursor;

pub mod bookings;
pub mod catalog;
pub mod employees;
pub mod feedback_entries;
pub mod payments;
pub mod rentals;
pub mod resources;
pub mod tasks;
pub mod users;

use thiserror::Error;

pub use bookings::{BookingReadModel, BookingsProjection};
pub use catalog::{ProductReadModel, ProductsProjection};
pub use cursor::CursorTracker;
pub use employees::{EmployeeReadModel, EmployeesProjection};
pub use feedback_entries::{FeedbackProjection, FeedbackReadModel};
pub use payments::{PaymentReadModel, PaymentsProjection};
pub use rentals::{RentalCatalogProjection, RentalProductReadModel};
pub use resources::{ResourceReadModel, ResourcesProjection};
pub use tasks::{TaskReadModel, TasksProjection};
pub use users::{UserReadModel, UsersProjection};

/// Error applying a published envelope to a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}
