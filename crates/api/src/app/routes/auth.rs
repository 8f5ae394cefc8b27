//! Public authentication routes: customer self-registration and the OTP
//! login flow. Mounted before the JWT middleware; no token exists yet.
//!
//! There is no outbound mail integration, so `/otp/request` hands the code
//! back in the response for the caller to relay.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use shutterdesk_auth::otp::{
    generate_code, IssueOtp, OtpChallenge, OtpChallengeId, OtpCommand, OtpEvent, VerifyOtp,
    OTP_TTL_MINUTES,
};
use shutterdesk_auth::user::{RegisterUser, User, UserCommand, UserId, UserStatus};
use shutterdesk_auth::{Hs256JwtValidator, JwtClaims, PrincipalId, Role};
use shutterdesk_core::{AggregateId, TenantId};
use shutterdesk_infra::command_dispatcher::DispatchError;

use crate::app::{errors, services::AppServices};

/// Lifetime of a session token minted after OTP verification.
const SESSION_TTL_HOURS: i64 = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub tenant_id: TenantId,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpRequestBody {
    pub tenant_id: TenantId,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct OtpVerifyBody {
    pub tenant_id: TenantId,
    pub challenge_id: Uuid,
    pub code: String,
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/otp/request", post(request_otp))
        .route("/otp/verify", post(verify_otp))
}

/// POST /auth/register - customer self-service signup.
///
/// Always seeds the `customer` role; staff and admin accounts are created
/// through `/admin/users`.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> axum::response::Response {
    let agg = AggregateId::new();
    let user_id = UserId::from(agg);

    let cmd = UserCommand::Register(RegisterUser {
        tenant_id: body.tenant_id,
        user_id,
        email: body.email,
        display_name: body.display_name,
        initial_roles: vec![Role::new("customer")],
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<User>(
        body.tenant_id,
        agg,
        "auth.user",
        cmd,
        |_tenant_id, aggregate_id| User::empty(UserId::from(aggregate_id)),
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

/// POST /auth/otp/request - issue a login code for a known account.
pub async fn request_otp(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<OtpRequestBody>,
) -> axum::response::Response {
    if services
        .users_find_by_email(body.tenant_id, &body.email)
        .is_none()
    {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "unknown_email",
            "no account for that email",
        );
    }

    let challenge_id = OtpChallengeId::new();
    let code = generate_code();

    let cmd = OtpCommand::Issue(IssueOtp {
        tenant_id: body.tenant_id,
        challenge_id,
        email: body.email.clone(),
        code: code.clone(),
        occurred_at: Utc::now(),
    });

    if let Err(e) = services.dispatch::<OtpChallenge>(
        body.tenant_id,
        AggregateId::from(challenge_id),
        "auth.otp",
        cmd,
        |_tenant_id, aggregate_id| OtpChallenge::empty(OtpChallengeId::from(aggregate_id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    // No mail integration; the code is logged and returned to the caller.
    tracing::info!(
        challenge_id = %challenge_id,
        email = %body.email,
        code = %code,
        "otp issued"
    );

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "challenge_id": challenge_id.to_string(),
            "code": code,
            "expires_in_minutes": OTP_TTL_MINUTES,
        })),
    )
        .into_response()
}

/// POST /auth/otp/verify - redeem a code and mint a session token.
pub async fn verify_otp(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(signer): Extension<Arc<Hs256JwtValidator>>,
    Json(body): Json<OtpVerifyBody>,
) -> axum::response::Response {
    let challenge_id = OtpChallengeId::from_uuid(body.challenge_id);

    let cmd = OtpCommand::Verify(VerifyOtp {
        tenant_id: body.tenant_id,
        challenge_id,
        code: body.code,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<OtpChallenge>(
        body.tenant_id,
        AggregateId::from(challenge_id),
        "auth.otp",
        cmd,
        |_tenant_id, aggregate_id| OtpChallenge::empty(OtpChallengeId::from(aggregate_id)),
    ) {
        Ok(c) => c,
        // A wrong code must not leak whether the challenge exists.
        Err(DispatchError::Unauthorized) => {
            return errors::json_error(StatusCode::UNAUTHORIZED, "invalid_code", "invalid code")
        }
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let email = committed.iter().find_map(|stored| {
        match serde_json::from_value::<OtpEvent>(stored.payload.clone()) {
            Ok(OtpEvent::Verified(ev)) => Some(ev.email),
            _ => None,
        }
    });
    let Some(email) = email else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_code",
            "invalid code",
        );
    };

    let Some(user) = services.users_find_by_email(body.tenant_id, &email) else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "invalid_code",
            "invalid code",
        );
    };

    if user.status != UserStatus::Active {
        return errors::json_error(StatusCode::FORBIDDEN, "suspended", "account is suspended");
    }

    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::from_uuid(*user.user_id.as_uuid()),
        tenant_id: body.tenant_id,
        roles: user.roles.clone(),
        issued_at: now,
        expires_at: now + Duration::hours(SESSION_TTL_HOURS),
    };

    let token = match signer.encode(&claims) {
        Ok(t) => t,
        Err(e) => {
            return errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "token_error",
                e.to_string(),
            )
        }
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "token": token,
            "user": {
                "id": user.user_id.as_uuid().to_string(),
                "email": user.email,
                "display_name": user.display_name,
                "roles": user.roles,
            },
        })),
    )
        .into_response()
}
