//! `shutterdesk-auth` — authentication/authorization boundary (zero-trust).
//!
//! Pure policy plus two event-sourced aggregates: `User` (identity, roles)
//! and `OtpChallenge` (the customer login code flow). HTTP and storage stay
//! outside this crate; only the HS256 token codec in [`jwt`] touches a
//! concrete wire format.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod otp;
pub mod permissions;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use otp::{OtpChallenge, OtpChallengeId, OtpCommand, OtpEvent};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::Role;
pub use user::{User, UserCommand, UserEvent, UserId, UserStatus};
