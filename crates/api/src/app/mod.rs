//! HTTP API application wiring (Axum router + service wiring).
//!
//! Layout:
//! - `services.rs`: infrastructure wiring (event store/bus, projections, dispatcher, saga)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use shutterdesk_auth::{Hs256JwtValidator, JwtValidator};

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(jwt_secret: String) -> Router {
    let signer = Arc::new(Hs256JwtValidator::new(&jwt_secret));
    let auth_state = middleware::AuthState {
        jwt: signer.clone() as Arc<dyn JwtValidator>,
    };

    let services = Arc::new(services::build_services());

    // Protected routes: require auth + tenant context.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    // Public routes: health plus the OTP login flow (no token exists yet).
    Router::new()
        .route("/health", get(routes::system::health))
        .nest(
            "/auth",
            routes::auth::router()
                .layer(Extension(services))
                .layer(Extension(signer)),
        )
        .merge(protected)
        .layer(ServiceBuilder::new())
}
