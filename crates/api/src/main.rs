#[tokio::main]
async fn main() {
    shutterdesk_observability::init();

    let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
        "dev-secret".to_string()
    });

    let addr = std::env::var("SHUTTERDESK_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let app = shutterdesk_api::app::build_app(jwt_secret).await;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    tracing::info!("listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}
