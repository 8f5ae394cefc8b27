use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedbackId(pub AggregateId);

impl FeedbackId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Feedback status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Submitted,
    Published,
    Archived,
}

/// Aggregate root: Feedback. Rating is always 1 through 5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    id: FeedbackId,
    tenant_id: Option<TenantId>,
    customer_name: String,
    customer_email: String,
    rating: u8,
    comment: String,
    status: FeedbackStatus,
    version: u64,
    created: bool,
}

impl Feedback {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: FeedbackId) -> Self {
        Self {
            id,
            tenant_id: None,
            customer_name: String::new(),
            customer_email: String::new(),
            rating: 0,
            comment: String::new(),
            status: FeedbackStatus::Submitted,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> FeedbackId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn status(&self) -> FeedbackStatus {
        self.status
    }
}

impl AggregateRoot for Feedback {
    type Id = FeedbackId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitFeedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitFeedback {
    pub tenant_id: TenantId,
    pub feedback_id: FeedbackId,
    pub customer_name: String,
    pub customer_email: String,
    pub rating: u8,
    pub comment: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PublishFeedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishFeedback {
    pub tenant_id: TenantId,
    pub feedback_id: FeedbackId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveFeedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFeedback {
    pub tenant_id: TenantId,
    pub feedback_id: FeedbackId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackCommand {
    SubmitFeedback(SubmitFeedback),
    PublishFeedback(PublishFeedback),
    ArchiveFeedback(ArchiveFeedback),
}

/// Event: FeedbackSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSubmitted {
    pub tenant_id: TenantId,
    pub feedback_id: FeedbackId,
    pub customer_name: String,
    pub customer_email: String,
    pub rating: u8,
    pub comment: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FeedbackPublished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackPublished {
    pub tenant_id: TenantId,
    pub feedback_id: FeedbackId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: FeedbackArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackArchived {
    pub tenant_id: TenantId,
    pub feedback_id: FeedbackId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackEvent {
    FeedbackSubmitted(FeedbackSubmitted),
    FeedbackPublished(FeedbackPublished),
    FeedbackArchived(FeedbackArchived),
}

impl Event for FeedbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FeedbackEvent::FeedbackSubmitted(_) => "feedback.feedback.submitted",
            FeedbackEvent::FeedbackPublished(_) => "feedback.feedback.published",
            FeedbackEvent::FeedbackArchived(_) => "feedback.feedback.archived",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FeedbackEvent::FeedbackSubmitted(e) => e.occurred_at,
            FeedbackEvent::FeedbackPublished(e) => e.occurred_at,
            FeedbackEvent::FeedbackArchived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Feedback {
    type Command = FeedbackCommand;
    type Event = FeedbackEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FeedbackEvent::FeedbackSubmitted(e) => {
                self.id = e.feedback_id;
                self.tenant_id = Some(e.tenant_id);
                self.customer_name = e.customer_name.clone();
                self.customer_email = e.customer_email.clone();
                self.rating = e.rating;
                self.comment = e.comment.clone();
                self.status = FeedbackStatus::Submitted;
                self.created = true;
            }
            FeedbackEvent::FeedbackPublished(_) => {
                self.status = FeedbackStatus::Published;
            }
            FeedbackEvent::FeedbackArchived(_) => {
                self.status = FeedbackStatus::Archived;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FeedbackCommand::SubmitFeedback(cmd) => self.handle_submit(cmd),
            FeedbackCommand::PublishFeedback(cmd) => self.handle_publish(cmd),
            FeedbackCommand::ArchiveFeedback(cmd) => self.handle_archive(cmd),
        }
    }
}

impl Feedback {
    fn ensure_exists(
        &self,
        tenant_id: TenantId,
        feedback_id: FeedbackId,
    ) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != feedback_id {
            return Err(DomainError::invariant("feedback_id mismatch"));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitFeedback) -> Result<Vec<FeedbackEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("feedback already exists"));
        }
        if cmd.customer_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if cmd.customer_email.trim().is_empty() || !cmd.customer_email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if !(1..=5).contains(&cmd.rating) {
            return Err(DomainError::validation("rating must be between 1 and 5"));
        }

        Ok(vec![FeedbackEvent::FeedbackSubmitted(FeedbackSubmitted {
            tenant_id: cmd.tenant_id,
            feedback_id: cmd.feedback_id,
            customer_name: cmd.customer_name.clone(),
            customer_email: cmd.customer_email.trim().to_lowercase(),
            rating: cmd.rating,
            comment: cmd.comment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_publish(&self, cmd: &PublishFeedback) -> Result<Vec<FeedbackEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.feedback_id)?;

        match self.status {
            FeedbackStatus::Submitted => Ok(vec![FeedbackEvent::FeedbackPublished(
                FeedbackPublished {
                    tenant_id: cmd.tenant_id,
                    feedback_id: cmd.feedback_id,
                    occurred_at: cmd.occurred_at,
                },
            )]),
            FeedbackStatus::Published => {
                Err(DomainError::conflict("feedback is already published"))
            }
            FeedbackStatus::Archived => {
                Err(DomainError::invariant("archived feedback cannot be published"))
            }
        }
    }

    fn handle_archive(&self, cmd: &ArchiveFeedback) -> Result<Vec<FeedbackEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.feedback_id)?;

        if self.status == FeedbackStatus::Archived {
            return Err(DomainError::conflict("feedback is already archived"));
        }

        Ok(vec![FeedbackEvent::FeedbackArchived(FeedbackArchived {
            tenant_id: cmd.tenant_id,
            feedback_id: cmd.feedback_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutterdesk_core::AggregateId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_feedback_id() -> FeedbackId {
        FeedbackId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn submitted_feedback(tenant_id: TenantId, feedback_id: FeedbackId, rating: u8) -> Feedback {
        let mut feedback = Feedback::empty(feedback_id);
        let cmd = FeedbackCommand::SubmitFeedback(SubmitFeedback {
            tenant_id,
            feedback_id,
            customer_name: "Lena Moreau".to_string(),
            customer_email: "lena@example.com".to_string(),
            rating,
            comment: "Beautiful album, quick turnaround.".to_string(),
            occurred_at: test_time(),
        });
        for event in feedback.handle(&cmd).unwrap() {
            feedback.apply(&event);
        }
        feedback
    }

    #[test]
    fn submit_accepts_boundary_ratings() {
        for rating in [1u8, 5] {
            let feedback = submitted_feedback(test_tenant_id(), test_feedback_id(), rating);
            assert_eq!(feedback.rating(), rating);
            assert_eq!(feedback.status(), FeedbackStatus::Submitted);
        }
    }

    #[test]
    fn submit_rejects_out_of_range_rating() {
        for rating in [0u8, 6] {
            let feedback = Feedback::empty(test_feedback_id());
            let cmd = FeedbackCommand::SubmitFeedback(SubmitFeedback {
                tenant_id: test_tenant_id(),
                feedback_id: test_feedback_id(),
                customer_name: "Lena Moreau".to_string(),
                customer_email: "lena@example.com".to_string(),
                rating,
                comment: String::new(),
                occurred_at: test_time(),
            });
            assert!(matches!(
                feedback.handle(&cmd).unwrap_err(),
                DomainError::Validation(_)
            ));
        }
    }

    #[test]
    fn publish_then_archive() {
        let tenant_id = test_tenant_id();
        let feedback_id = test_feedback_id();
        let mut feedback = submitted_feedback(tenant_id, feedback_id, 4);

        let publish = FeedbackCommand::PublishFeedback(PublishFeedback {
            tenant_id,
            feedback_id,
            occurred_at: test_time(),
        });
        for event in feedback.handle(&publish).unwrap() {
            feedback.apply(&event);
        }
        assert_eq!(feedback.status(), FeedbackStatus::Published);

        let archive = FeedbackCommand::ArchiveFeedback(ArchiveFeedback {
            tenant_id,
            feedback_id,
            occurred_at: test_time(),
        });
        for event in feedback.handle(&archive).unwrap() {
            feedback.apply(&event);
        }
        assert_eq!(feedback.status(), FeedbackStatus::Archived);
    }

    #[test]
    fn archived_feedback_cannot_be_published() {
        let tenant_id = test_tenant_id();
        let feedback_id = test_feedback_id();
        let mut feedback = submitted_feedback(tenant_id, feedback_id, 2);

        let archive = FeedbackCommand::ArchiveFeedback(ArchiveFeedback {
            tenant_id,
            feedback_id,
            occurred_at: test_time(),
        });
        for event in feedback.handle(&archive).unwrap() {
            feedback.apply(&event);
        }

        let publish = FeedbackCommand::PublishFeedback(PublishFeedback {
            tenant_id,
            feedback_id,
            occurred_at: test_time(),
        });
        assert!(matches!(
            feedback.handle(&publish).unwrap_err(),
            DomainError::InvariantViolation(_)
        ));
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let feedback = submitted_feedback(test_tenant_id(), test_feedback_id(), 3);
        let cmd = FeedbackCommand::PublishFeedback(PublishFeedback {
            tenant_id: test_tenant_id(),
            feedback_id: feedback.id_typed(),
            occurred_at: test_time(),
        });
        let err = feedback.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }
}
