use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;
use shutterdesk_auth::{JwtClaims, PrincipalId, Role};
use shutterdesk_core::TenantId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = shutterdesk_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn get_eventually(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> serde_json::Value {
    // The API is intentionally eventual-consistent (command path vs projection
    // update). Poll briefly until the projection catches up.
    for _ in 0..50 {
        let res = client.get(url).bearer_auth(token).send().await.unwrap();
        if res.status() == StatusCode::OK {
            return res.json().await.unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("read model did not become visible within timeout: {url}");
}

/// Create a rental listing for a resource, retrying until the resources
/// projection has seen the resource (listing copies its fields).
async fn list_rental_eventually(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    resource_id: &str,
    daily_rate: i64,
) -> String {
    for _ in 0..50 {
        let res = client
            .post(format!("{base_url}/rentals"))
            .bearer_auth(token)
            .json(&json!({ "resource_id": resource_id, "daily_rate": daily_rate }))
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::CREATED {
            let listed: serde_json::Value = res.json().await.unwrap();
            return listed["id"].as_str().unwrap().to_string();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    panic!("rental listing never succeeded for resource {resource_id}");
}

#[tokio::test]
async fn server_teardown_completes() {
    // The projection subscriber must not keep the runtime alive after the
    // last services handle is dropped.
    let srv = TestServer::spawn("test-secret").await;
    drop(srv);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();
    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn resource_lifecycle_create_adjust_query() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    // Create
    let res = client
        .post(format!("{}/resources", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Canon R5", "category": "camera", "initial_stock": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // Adjust
    let res = client
        .post(format!("{}/resources/{}/adjust", srv.base_url, id))
        .bearer_auth(&token)
        .json(&json!({ "delta": 10 }))
        .send()
        .await
        .unwrap();
    if res.status() != StatusCode::OK {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        panic!("expected 200 OK from adjust, got {status} body={body}");
    }

    // Query (eventually consistent with projection)
    let url = format!("{}/resources/{}", srv.base_url, id);
    for _ in 0..50 {
        let resource = get_eventually(&client, &url, &token).await;
        if resource["stock"] == 12 {
            assert_eq!(resource["name"], "Canon R5");
            assert_eq!(resource["rental_stock"], 0);
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("stock adjustment did not reach the projection");
}

#[tokio::test]
async fn unauthorized_access_blocked_for_commands() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    // Unknown role => permission mapping returns empty => forbidden.
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("viewer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/resources", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Canon R5", "category": "camera" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn customer_role_cannot_manage_inventory() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("customer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/resources", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Canon R5", "category": "camera" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_isolation_blocks_cross_tenant_reads_and_writes() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant1 = TenantId::new();
    let tenant2 = TenantId::new();
    let token1 = mint_jwt(jwt_secret, tenant1, vec![Role::new("admin")]);
    let token2 = mint_jwt(jwt_secret, tenant2, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    // Tenant1 creates a resource
    let res = client
        .post(format!("{}/resources", srv.base_url))
        .bearer_auth(&token1)
        .json(&json!({ "name": "Canon R5", "category": "camera", "initial_stock": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();

    // Tenant2 cannot read it (projection lookup is tenant-scoped)
    let res = client
        .get(format!("{}/resources/{}", srv.base_url, id))
        .bearer_auth(&token2)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Tenant2 cannot adjust it either (dispatch happens under tenant2 context)
    let res = client
        .post(format!("{}/resources/{}/adjust", srv.base_url, id))
        .bearer_auth(&token2)
        .json(&json!({ "delta": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transfer_moves_stock_between_pools() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/resources", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Godox AD200", "category": "lighting", "initial_stock": 10 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    let resource_id = created["id"].as_str().unwrap().to_string();

    // Listing copies descriptive fields from the resource's read model, so
    // poll until the resource projection has caught up.
    let rental_id = list_rental_eventually(&client, &srv.base_url, &token, &resource_id, 45).await;

    // The listing carries the resource's descriptive fields, not
    // client-supplied ones.
    let rental_url = format!("{}/rentals/{}", srv.base_url, rental_id);
    let rental = get_eventually(&client, &rental_url, &token).await;
    assert_eq!(rental["name"], "Godox AD200");
    assert_eq!(rental["category"], "lighting");
    assert_eq!(rental["condition"], "good");
    assert_eq!(rental["resource_id"].as_str().unwrap(), resource_id);
    assert_eq!(rental["rental_stock"], 0);

    // Transfer 4 units into the rental pool
    let res = client
        .post(format!("{}/resources/{}/transfer-to-rental", srv.base_url, resource_id))
        .bearer_auth(&token)
        .json(&json!({ "rental_product_id": rental_id, "quantity": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Both pools move; the total is conserved.
    let url = format!("{}/resources/{}", srv.base_url, resource_id);
    let mut conserved = false;
    for _ in 0..50 {
        let resource = get_eventually(&client, &url, &token).await;
        if resource["rental_stock"] == 4 {
            assert_eq!(resource["stock"], 6);
            conserved = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(conserved, "transfer did not reach the resource projection");

    let mut credited = false;
    for _ in 0..50 {
        let rental = get_eventually(&client, &rental_url, &token).await;
        if rental["rental_stock"] == 4 {
            credited = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert!(credited, "transfer did not reach the rental projection");

    // Over-transfer is rejected by the aggregate invariant.
    let res = client
        .post(format!("{}/resources/{}/transfer-to-rental", srv.base_url, resource_id))
        .bearer_auth(&token)
        .json(&json!({ "rental_product_id": rental_id, "quantity": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn transfer_into_foreign_listing_is_rejected() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    let mut ids = Vec::new();
    for name in ["Canon R5", "Godox AD200"] {
        let res = client
            .post(format!("{}/resources", srv.base_url))
            .bearer_auth(&token)
            .json(&json!({ "name": name, "category": "gear", "initial_stock": 5 }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: serde_json::Value = res.json().await.unwrap();
        ids.push(created["id"].as_str().unwrap().to_string());
    }

    // Listing backed by the first resource.
    let rental_id = list_rental_eventually(&client, &srv.base_url, &token, &ids[0], 30).await;

    // Transferring out of the second resource into that listing must fail
    // without touching either pool.
    let res = client
        .post(format!("{}/resources/{}/transfer-to-rental", srv.base_url, ids[1]))
        .bearer_auth(&token)
        .json(&json!({ "rental_product_id": rental_id, "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resource = get_eventually(&client, &format!("{}/resources/{}", srv.base_url, ids[1]), &token).await;
    assert_eq!(resource["stock"], 5);
    assert_eq!(resource["rental_stock"], 0);
}

#[tokio::test]
async fn task_lifecycle_under_employee_routes() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("admin")]);

    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/employees", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Grace", "position": "photographer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let hired: serde_json::Value = res.json().await.unwrap();
    let employee_id = hired["id"].as_str().unwrap().to_string();

    let res = client
        .post(format!("{}/employees/tasks", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({ "employee_id": employee_id, "title": "Edit wedding gallery" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let assigned: serde_json::Value = res.json().await.unwrap();
    let task_id = assigned["id"].as_str().unwrap().to_string();

    let task_url = format!("{}/employees/tasks/{}", srv.base_url, task_id);
    let task = get_eventually(&client, &task_url, &token).await;
    assert_eq!(task["title"], "Edit wedding gallery");
    assert_eq!(task["employee_id"].as_str().unwrap(), employee_id);

    let res = client
        .post(format!("{}/complete", task_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn booking_quote_matches_published_price_table() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let token = mint_jwt(jwt_secret, tenant_id, vec![Role::new("customer")]);

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/bookings/quote", srv.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "service_type": "photography",
            "event_type": "wedding",
            "package_type": "standard",
            "duration_hours": 2,
            "media_count": 15,
            "transport": true,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let breakdown: serde_json::Value = res.json().await.unwrap();
    assert_eq!(breakdown["total"], 1775);
}

#[tokio::test]
async fn otp_login_flow_end_to_end() {
    let jwt_secret = "test-secret";
    let srv = TestServer::spawn(jwt_secret).await;

    let tenant_id = TenantId::new();
    let client = reqwest::Client::new();

    // Self-service signup (public route, no token).
    let res = client
        .post(format!("{}/auth/register", srv.base_url))
        .json(&json!({
            "tenant_id": tenant_id,
            "email": "ada@example.com",
            "display_name": "Ada",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // Request a code. The users projection is eventually consistent, so
    // poll until the account is visible.
    let mut challenge: Option<serde_json::Value> = None;
    for _ in 0..50 {
        let res = client
            .post(format!("{}/auth/otp/request", srv.base_url))
            .json(&json!({ "tenant_id": tenant_id, "email": "ada@example.com" }))
            .send()
            .await
            .unwrap();
        if res.status() == StatusCode::CREATED {
            challenge = Some(res.json().await.unwrap());
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let challenge = challenge.expect("otp request never succeeded");
    let challenge_id = challenge["challenge_id"].as_str().unwrap();
    let code = challenge["code"].as_str().unwrap();

    // Wrong code is rejected without redeeming the challenge.
    let res = client
        .post(format!("{}/auth/otp/verify", srv.base_url))
        .json(&json!({
            "tenant_id": tenant_id,
            "challenge_id": challenge_id,
            "code": "000000",
        }))
        .send()
        .await
        .unwrap();
    // The generated code could legitimately be 000000; skip the negative
    // assertion in that case.
    if code != "000000" {
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    // Correct code mints a session token carrying the customer role.
    let res = client
        .post(format!("{}/auth/otp/verify", srv.base_url))
        .json(&json!({
            "tenant_id": tenant_id,
            "challenge_id": challenge_id,
            "code": code,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let session: serde_json::Value = res.json().await.unwrap();
    let token = session["token"].as_str().unwrap();

    let res = client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "customer"));

    // The minted token authorizes the customer surface.
    let res = client
        .post(format!("{}/bookings", srv.base_url))
        .bearer_auth(token)
        .json(&json!({
            "customer": {
                "name": "Ada",
                "email": "ada@example.com",
                "phone": "555-0100",
                "address": "1 Analytical Way",
            },
            "selection": {
                "service_type": "photography",
                "event_type": "wedding",
                "package_type": "standard",
                "duration_hours": 2,
                "media_count": 15,
                "transport": true,
            },
            "shoot_date": "2026-10-01T10:00:00Z",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
}
