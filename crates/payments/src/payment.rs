use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shutterdesk_bookings::BookingId;
use shutterdesk_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use shutterdesk_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub AggregateId);

impl PaymentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payment status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// How the customer pays.
///
/// `Half` splits the total: `half_amount` is taken up front and `to_pay`
/// remains outstanding. The two must sum to the payment amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "plan")]
pub enum PaymentPlan {
    Full,
    Half { half_amount: i64, to_pay: i64 },
}

/// Aggregate root: Payment.
///
/// # Invariants
/// - `transaction_id` is assigned at record time and never changes.
/// - `outstanding() >= 0`; installments may not overpay.
/// - Completion requires a zero outstanding balance.
/// - Completed and Failed are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    id: PaymentId,
    tenant_id: Option<TenantId>,
    booking_id: Option<BookingId>,
    customer_email: String,
    amount: i64,
    paid: i64,
    plan: PaymentPlan,
    transaction_id: Option<Uuid>,
    status: PaymentStatus,
    version: u64,
    created: bool,
}

impl Payment {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: PaymentId) -> Self {
        Self {
            id,
            tenant_id: None,
            booking_id: None,
            customer_email: String::new(),
            amount: 0,
            paid: 0,
            plan: PaymentPlan::Full,
            transaction_id: None,
            status: PaymentStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PaymentId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn booking_id(&self) -> Option<BookingId> {
        self.booking_id
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn paid(&self) -> i64 {
        self.paid
    }

    pub fn plan(&self) -> PaymentPlan {
        self.plan
    }

    pub fn transaction_id(&self) -> Option<Uuid> {
        self.transaction_id
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Remaining balance.
    pub fn outstanding(&self) -> i64 {
        self.amount - self.paid
    }
}

impl AggregateRoot for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordPayment.
///
/// `transaction_id` is generated server-side before dispatch; clients never
/// supply one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub customer_email: String,
    pub amount: i64,
    pub plan: PaymentPlan,
    pub transaction_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordInstallment (reduces the outstanding balance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInstallment {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkCompleted {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkFailed {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentCommand {
    RecordPayment(RecordPayment),
    RecordInstallment(RecordInstallment),
    MarkCompleted(MarkCompleted),
    MarkFailed(MarkFailed),
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub customer_email: String,
    pub amount: i64,
    pub initial_paid: i64,
    pub plan: PaymentPlan,
    pub transaction_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InstallmentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentRecorded {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentCompleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub tenant_id: TenantId,
    pub payment_id: PaymentId,
    pub booking_id: BookingId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEvent {
    PaymentRecorded(PaymentRecorded),
    InstallmentRecorded(InstallmentRecorded),
    PaymentCompleted(PaymentCompleted),
    PaymentFailed(PaymentFailed),
}

impl Event for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentRecorded(_) => "payments.payment.recorded",
            PaymentEvent::InstallmentRecorded(_) => "payments.payment.installment_recorded",
            PaymentEvent::PaymentCompleted(_) => "payments.payment.completed",
            PaymentEvent::PaymentFailed(_) => "payments.payment.failed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentEvent::PaymentRecorded(e) => e.occurred_at,
            PaymentEvent::InstallmentRecorded(e) => e.occurred_at,
            PaymentEvent::PaymentCompleted(e) => e.occurred_at,
            PaymentEvent::PaymentFailed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Payment {
    type Command = PaymentCommand;
    type Event = PaymentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentEvent::PaymentRecorded(e) => {
                self.id = e.payment_id;
                self.tenant_id = Some(e.tenant_id);
                self.booking_id = Some(e.booking_id);
                self.customer_email = e.customer_email.clone();
                self.amount = e.amount;
                self.paid = e.initial_paid;
                self.plan = e.plan;
                self.transaction_id = Some(e.transaction_id);
                self.status = PaymentStatus::Pending;
                self.created = true;
            }
            PaymentEvent::InstallmentRecorded(e) => {
                self.paid += e.amount;
            }
            PaymentEvent::PaymentCompleted(_) => {
                self.status = PaymentStatus::Completed;
            }
            PaymentEvent::PaymentFailed(_) => {
                self.status = PaymentStatus::Failed;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentCommand::RecordPayment(cmd) => self.handle_record(cmd),
            PaymentCommand::RecordInstallment(cmd) => self.handle_installment(cmd),
            PaymentCommand::MarkCompleted(cmd) => self.handle_complete(cmd),
            PaymentCommand::MarkFailed(cmd) => self.handle_fail(cmd),
        }
    }
}

impl Payment {
    fn ensure_exists(&self, tenant_id: TenantId, payment_id: PaymentId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != payment_id {
            return Err(DomainError::invariant("payment_id mismatch"));
        }
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        match self.status {
            PaymentStatus::Pending => Ok(()),
            PaymentStatus::Completed => Err(DomainError::invariant("payment is completed")),
            PaymentStatus::Failed => Err(DomainError::invariant("payment is failed")),
        }
    }

    fn handle_record(&self, cmd: &RecordPayment) -> Result<Vec<PaymentEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("payment already exists"));
        }
        if cmd.amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if cmd.customer_email.trim().is_empty() || !cmd.customer_email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        let initial_paid = match cmd.plan {
            PaymentPlan::Full => cmd.amount,
            PaymentPlan::Half { half_amount, to_pay } => {
                if half_amount <= 0 || to_pay <= 0 {
                    return Err(DomainError::validation(
                        "half plan amounts must be positive",
                    ));
                }
                if half_amount + to_pay != cmd.amount {
                    return Err(DomainError::invariant(
                        "half plan must sum to the payment amount",
                    ));
                }
                half_amount
            }
        };

        Ok(vec![PaymentEvent::PaymentRecorded(PaymentRecorded {
            tenant_id: cmd.tenant_id,
            payment_id: cmd.payment_id,
            booking_id: cmd.booking_id,
            customer_email: cmd.customer_email.trim().to_lowercase(),
            amount: cmd.amount,
            initial_paid,
            plan: cmd.plan,
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_installment(
        &self,
        cmd: &RecordInstallment,
    ) -> Result<Vec<PaymentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.payment_id)?;
        self.ensure_pending()?;

        if cmd.amount <= 0 {
            return Err(DomainError::validation("amount must be positive"));
        }
        if cmd.amount > self.outstanding() {
            return Err(DomainError::invariant(
                "installment exceeds outstanding balance",
            ));
        }

        Ok(vec![PaymentEvent::InstallmentRecorded(
            InstallmentRecorded {
                tenant_id: cmd.tenant_id,
                payment_id: cmd.payment_id,
                amount: cmd.amount,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_complete(&self, cmd: &MarkCompleted) -> Result<Vec<PaymentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.payment_id)?;
        self.ensure_pending()?;

        if self.outstanding() != 0 {
            return Err(DomainError::invariant(
                "payment has an outstanding balance",
            ));
        }
        let booking_id = self.booking_id.ok_or_else(DomainError::not_found)?;

        Ok(vec![PaymentEvent::PaymentCompleted(PaymentCompleted {
            tenant_id: cmd.tenant_id,
            payment_id: cmd.payment_id,
            booking_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fail(&self, cmd: &MarkFailed) -> Result<Vec<PaymentEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id, cmd.payment_id)?;
        self.ensure_pending()?;
        let booking_id = self.booking_id.ok_or_else(DomainError::not_found)?;

        Ok(vec![PaymentEvent::PaymentFailed(PaymentFailed {
            tenant_id: cmd.tenant_id,
            payment_id: cmd.payment_id,
            booking_id,
            reason: cmd.reason.clone(),
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

    fn test_payment_id() -> PaymentId {
        PaymentId::new(AggregateId::new())
    }

    fn test_booking_id() -> BookingId {
        BookingId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn recorded_payment(
        tenant_id: TenantId,
        payment_id: PaymentId,
        amount: i64,
        plan: PaymentPlan,
    ) -> Payment {
        let mut payment = Payment::empty(payment_id);
        let cmd = PaymentCommand::RecordPayment(RecordPayment {
            tenant_id,
            payment_id,
            booking_id: test_booking_id(),
            customer_email: "lena@example.com".to_string(),
            amount,
            plan,
            transaction_id: Uuid::now_v7(),
            occurred_at: test_time(),
        });
        for event in payment.handle(&cmd).unwrap() {
            payment.apply(&event);
        }
        payment
    }

    #[test]
    fn full_plan_records_with_zero_balance() {
        let payment = recorded_payment(
            test_tenant_id(),
            test_payment_id(),
            1775,
            PaymentPlan::Full,
        );
        assert_eq!(payment.outstanding(), 0);
        assert_eq!(payment.status(), PaymentStatus::Pending);
        assert!(payment.transaction_id().is_some());
    }

    #[test]
    fn half_plan_must_sum_to_amount() {
        let payment = Payment::empty(test_payment_id());
        let cmd = PaymentCommand::RecordPayment(RecordPayment {
            tenant_id: test_tenant_id(),
            payment_id: test_payment_id(),
            booking_id: test_booking_id(),
            customer_email: "lena@example.com".to_string(),
            amount: 1000,
            plan: PaymentPlan::Half {
                half_amount: 400,
                to_pay: 500,
            },
            transaction_id: Uuid::now_v7(),
            occurred_at: test_time(),
        });
        let err = payment.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("sum"));
    }

    #[test]
    fn half_plan_leaves_outstanding_balance() {
        let payment = recorded_payment(
            test_tenant_id(),
            test_payment_id(),
            1000,
            PaymentPlan::Half {
                half_amount: 500,
                to_pay: 500,
            },
        );
        assert_eq!(payment.outstanding(), 500);
    }

    #[test]
    fn installment_reduces_balance_then_completion_succeeds() {
        let tenant_id = test_tenant_id();
        let payment_id = test_payment_id();
        let mut payment = recorded_payment(
            tenant_id,
            payment_id,
            1000,
            PaymentPlan::Half {
                half_amount: 500,
                to_pay: 500,
            },
        );

        let complete = PaymentCommand::MarkCompleted(MarkCompleted {
            tenant_id,
            payment_id,
            occurred_at: test_time(),
        });
        assert!(payment.handle(&complete).is_err());

        let installment = PaymentCommand::RecordInstallment(RecordInstallment {
            tenant_id,
            payment_id,
            amount: 500,
            occurred_at: test_time(),
        });
        for event in payment.handle(&installment).unwrap() {
            payment.apply(&event);
        }
        assert_eq!(payment.outstanding(), 0);

        for event in payment.handle(&complete).unwrap() {
            payment.apply(&event);
        }
        assert_eq!(payment.status(), PaymentStatus::Completed);
    }

    #[test]
    fn installment_cannot_overpay() {
        let tenant_id = test_tenant_id();
        let payment_id = test_payment_id();
        let payment = recorded_payment(
            tenant_id,
            payment_id,
            1000,
            PaymentPlan::Half {
                half_amount: 500,
                to_pay: 500,
            },
        );

        let cmd = PaymentCommand::RecordInstallment(RecordInstallment {
            tenant_id,
            payment_id,
            amount: 501,
            occurred_at: test_time(),
        });
        let err = payment.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("exceeds outstanding"));
    }

    #[test]
    fn failed_payment_is_terminal() {
        let tenant_id = test_tenant_id();
        let payment_id = test_payment_id();
        let mut payment =
            recorded_payment(tenant_id, payment_id, 1775, PaymentPlan::Full);

        let fail = PaymentCommand::MarkFailed(MarkFailed {
            tenant_id,
            payment_id,
            reason: "card declined".to_string(),
            occurred_at: test_time(),
        });
        let events = payment.handle(&fail).unwrap();
        let PaymentEvent::PaymentFailed(e) = &events[0] else {
            panic!("expected PaymentFailed event");
        };
        assert_eq!(e.reason, "card declined");
        for event in &events {
            payment.apply(event);
        }

        let complete = PaymentCommand::MarkCompleted(MarkCompleted {
            tenant_id,
            payment_id,
            occurred_at: test_time(),
        });
        assert!(payment.handle(&complete).is_err());
        assert!(payment.handle(&fail).is_err());
    }

    #[test]
    fn record_rejects_non_positive_amount() {
        let payment = Payment::empty(test_payment_id());
        let cmd = PaymentCommand::RecordPayment(RecordPayment {
            tenant_id: test_tenant_id(),
            payment_id: test_payment_id(),
            booking_id: test_booking_id(),
            customer_email: "lena@example.com".to_string(),
            amount: 0,
            plan: PaymentPlan::Full,
            transaction_id: Uuid::now_v7(),
            occurred_at: test_time(),
        });
        assert!(matches!(
            payment.handle(&cmd).unwrap_err(),
            DomainError::Validation(_)
        ));
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let payment = recorded_payment(
            test_tenant_id(),
            test_payment_id(),
            1775,
            PaymentPlan::Full,
        );
        let cmd = PaymentCommand::MarkCompleted(MarkCompleted {
            tenant_id: test_tenant_id(),
            payment_id: payment.id_typed(),
            occurred_at: test_time(),
        });
        let err = payment.handle(&cmd).unwrap_err();
        assert!(err.to_string().contains("tenant"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Paid never exceeds amount under any accepted installment
            /// sequence, and completion only ever fires at zero balance.
            #[test]
            fn paid_never_exceeds_amount(
                half in 1i64..500,
                rest in 1i64..500,
                installments in proptest::collection::vec(1i64..300, 0..12)
            ) {
                let tenant_id = test_tenant_id();
                let payment_id = test_payment_id();
                let mut payment = recorded_payment(
                    tenant_id,
                    payment_id,
                    half + rest,
                    PaymentPlan::Half { half_amount: half, to_pay: rest },
                );

                for amount in installments {
                    let cmd = PaymentCommand::RecordInstallment(RecordInstallment {
                        tenant_id,
                        payment_id,
                        amount,
                        occurred_at: test_time(),
                    });
                    if let Ok(events) = payment.handle(&cmd) {
                        for event in events {
                            payment.apply(&event);
                        }
                    }
                    prop_assert!(payment.paid() <= payment.amount());
                    prop_assert!(payment.outstanding() >= 0);
                }

                let complete = PaymentCommand::MarkCompleted(MarkCompleted {
                    tenant_id,
                    payment_id,
                    occurred_at: test_time(),
                });
                prop_assert_eq!(
                    payment.handle(&complete).is_ok(),
                    payment.outstanding() == 0
                );
            }
        }
    }
}
