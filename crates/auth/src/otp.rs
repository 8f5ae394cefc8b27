//! OTP challenge aggregate (event-sourced).
//!
//! Customer login flow: a 6-digit code is issued against an email address
//! and must be verified within [`otp_ttl`]. A code verifies successfully at
//! most once; the aggregate records redemption, so replaying the same code
//! fails deterministically.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

/// Validity window for an issued code, in minutes.
pub const OTP_TTL_MINUTES: i64 = 5;

/// Validity window for an issued code.
pub fn otp_ttl() -> Duration {
    Duration::minutes(OTP_TTL_MINUTES)
}

/// Unique identifier for an OTP challenge.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtpChallengeId(Uuid);

impl OtpChallengeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OtpChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for OtpChallengeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<AggregateId> for OtpChallengeId {
    fn from(value: AggregateId) -> Self {
        Self(*value.as_uuid())
    }
}

impl From<OtpChallengeId> for AggregateId {
    fn from(value: OtpChallengeId) -> Self {
        AggregateId::from_uuid(value.0)
    }
}

/// Derive a fresh 6-digit code from UUIDv7 entropy.
pub fn generate_code() -> String {
    let bytes = *Uuid::now_v7().as_bytes();
    let n = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
    format!("{:06}", n % 1_000_000)
}

/// OTP challenge aggregate.
///
/// # Invariants
/// - A challenge is issued exactly once.
/// - Verification requires the exact code, within [`otp_ttl`] of issue.
/// - A verified challenge can never verify again (single-use).
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub id: OtpChallengeId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    code: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub redeemed: bool,
    pub version: u64,
    pub created: bool,
}

impl OtpChallenge {
    pub fn empty(id: OtpChallengeId) -> Self {
        Self {
            id,
            tenant_id: None,
            email: String::new(),
            code: String::new(),
            issued_at: None,
            redeemed: false,
            version: 0,
            created: false,
        }
    }
}

impl AggregateRoot for OtpChallenge {
    type Id = OtpChallengeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueOtp {
    pub tenant_id: TenantId,
    pub challenge_id: OtpChallengeId,
    pub email: String,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtp {
    pub tenant_id: TenantId,
    pub challenge_id: OtpChallengeId,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OtpCommand {
    Issue(IssueOtp),
    Verify(VerifyOtp),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpIssued {
    pub tenant_id: TenantId,
    pub challenge_id: OtpChallengeId,
    pub email: String,
    pub code: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerified {
    pub tenant_id: TenantId,
    pub challenge_id: OtpChallengeId,
    pub email: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OtpEvent {
    Issued(OtpIssued),
    Verified(OtpVerified),
}

impl Event for OtpEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OtpEvent::Issued(_) => "auth.otp.issued",
            OtpEvent::Verified(_) => "auth.otp.verified",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OtpEvent::Issued(e) => e.occurred_at,
            OtpEvent::Verified(e) => e.occurred_at,
        }
    }
}

impl Aggregate for OtpChallenge {
    type Command = OtpCommand;
    type Event = OtpEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OtpEvent::Issued(e) => {
                self.id = e.challenge_id;
                self.tenant_id = Some(e.tenant_id);
                self.email = e.email.clone();
                self.code = e.code.clone();
                self.issued_at = Some(e.occurred_at);
                self.created = true;
            }
            OtpEvent::Verified(_) => {
                self.redeemed = true;
            }
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OtpCommand::Issue(cmd) => self.handle_issue(cmd),
            OtpCommand::Verify(cmd) => self.handle_verify(cmd),
        }
    }
}

impl OtpChallenge {
    fn handle_issue(&self, cmd: &IssueOtp) -> Result<Vec<OtpEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("challenge already issued"));
        }

        if cmd.email.trim().is_empty() || !cmd.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        if cmd.code.len() != 6 || !cmd.code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation("code must be exactly 6 digits"));
        }

        Ok(vec![OtpEvent::Issued(OtpIssued {
            tenant_id: cmd.tenant_id,
            challenge_id: cmd.challenge_id,
            email: cmd.email.trim().to_lowercase(),
            code: cmd.code.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verify(&self, cmd: &VerifyOtp) -> Result<Vec<OtpEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }

        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }

        if self.redeemed {
            return Err(DomainError::invariant("code already used"));
        }

        let issued_at = self.issued_at.ok_or_else(DomainError::not_found)?;
        if cmd.occurred_at - issued_at > otp_ttl() {
            return Err(DomainError::invariant("code expired"));
        }

        if cmd.code != self.code {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![OtpEvent::Verified(OtpVerified {
            tenant_id: cmd.tenant_id,
            challenge_id: cmd.challenge_id,
            email: self.email.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
