use axum::{routing::get, Router};

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod common;
pub mod employees;
pub mod feedback;
pub mod payments;
pub mod products;
pub mod rentals;
pub mod resources;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
///
/// `auth` is not assembled here: the OTP login flow is mounted publicly by
/// `app::build_app`, before the JWT middleware.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/resources", resources::router())
        .nest("/rentals", rentals::router())
        .nest("/products", products::router())
        .nest("/bookings", bookings::router())
        .nest("/payments", payments::router())
        .nest("/employees", employees::router())
        .nest("/feedback", feedback::router())
        .nest("/admin", admin::router())
}
