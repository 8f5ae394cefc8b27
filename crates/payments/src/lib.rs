//! Payments domain (event-sourced).
//!
//! The money side of a booking. A payment is recorded against a booking
//! with a server-assigned transaction id, tracks its outstanding balance
//! across installments, and completes only once the balance reaches zero.

pub mod payment;

pub use payment::{
    MarkCompleted, MarkFailed, Payment, PaymentCommand, PaymentEvent, PaymentId, PaymentPlan,
    PaymentStatus, RecordInstallment, RecordPayment,
};
