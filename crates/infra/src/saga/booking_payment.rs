//! Booking → Payment saga.
//!
//! Orchestrates the flow:
//! 1. Booking confirmed → request payment for the frozen quote
//! 2. Payment completed → settle and complete the saga
//!
//! Compensating action: cancel the booking if the payment fails.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use shutterdesk_bookings::{BookingEvent, BookingId};
use shutterdesk_core::{AggregateId, TenantId};
use shutterdesk_events::{EventEnvelope, Saga, SagaAction};
use shutterdesk_payments::PaymentEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingPaymentState {
    #[default]
    WaitingForConfirmation,
    WaitingForPayment,
    Completed,
    Compensated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingPaymentSagaEvent {
    PaymentRequested { booking_id: BookingId, amount: i64 },
    PaymentSettled { booking_id: BookingId },
    BookingCancelRequested { booking_id: BookingId, reason: String },
}

pub struct BookingPaymentSaga;

impl Saga for BookingPaymentSaga {
    type State = BookingPaymentState;
    type SagaEvent = BookingPaymentSagaEvent;
    type CorrelationId = BookingId;

    fn saga_type() -> &'static str {
        "saga.booking_payment"
    }

    fn correlate(envelope: &EventEnvelope<JsonValue>) -> Option<Self::CorrelationId> {
        match envelope.aggregate_type() {
            "bookings.booking" => {
                let event: BookingEvent = serde_json::from_value(envelope.payload().clone()).ok()?;
                match event {
                    BookingEvent::BookingConfirmed(e) => Some(e.booking_id),
                    _ => None,
                }
            }
            "payments.payment" => {
                let event: PaymentEvent = serde_json::from_value(envelope.payload().clone()).ok()?;
                match event {
                    PaymentEvent::PaymentCompleted(e) => Some(e.booking_id),
                    PaymentEvent::PaymentFailed(e) => Some(e.booking_id),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn saga_id(_tenant_id: TenantId, correlation: &Self::CorrelationId) -> AggregateId {
        // The saga stream needs its own id: reusing the booking id would
        // collide with the booking stream's aggregate_type.
        let derived = Uuid::new_v5(&Uuid::NAMESPACE_OID, correlation.0.as_uuid().as_bytes());
        AggregateId::from_uuid(derived)
    }

    fn apply(state: &mut Self::State, event: &Self::SagaEvent) {
        match event {
            BookingPaymentSagaEvent::PaymentRequested { .. } => {
                *state = BookingPaymentState::WaitingForPayment;
            }
            BookingPaymentSagaEvent::PaymentSettled { .. } => {
                *state = BookingPaymentState::Completed;
            }
            BookingPaymentSagaEvent::BookingCancelRequested { .. } => {
                *state = BookingPaymentState::Compensated;
            }
        }
    }

    fn react(
        state: &Self::State,
        _tenant_id: TenantId,
        correlation: &Self::CorrelationId,
        incoming: &EventEnvelope<JsonValue>,
    ) -> Vec<SagaAction> {
        match state {
            BookingPaymentState::WaitingForConfirmation => {
                if incoming.aggregate_type() != "bookings.booking" {
                    return vec![];
                }
                let Ok(BookingEvent::BookingConfirmed(e)) =
                    serde_json::from_value::<BookingEvent>(incoming.payload().clone())
                else {
                    return vec![];
                };

                let saga_event = BookingPaymentSagaEvent::PaymentRequested {
                    booking_id: e.booking_id,
                    amount: e.total_price,
                };
                vec![
                    SagaAction::Emit {
                        event_type: "payment_requested".to_string(),
                        payload: serde_json::json!(saga_event),
                    },
                    SagaAction::Command {
                        aggregate_type: "payments.payment".to_string(),
                        command_type: "record_payment".to_string(),
                        payload: serde_json::json!({
                            "booking_id": e.booking_id,
                            "amount": e.total_price,
                        }),
                    },
                ]
            }
            BookingPaymentState::WaitingForPayment => {
                if incoming.aggregate_type() != "payments.payment" {
                    return vec![];
                }
                let Ok(event) = serde_json::from_value::<PaymentEvent>(incoming.payload().clone())
                else {
                    return vec![];
                };

                match event {
                    PaymentEvent::PaymentCompleted(e) => {
                        let saga_event = BookingPaymentSagaEvent::PaymentSettled {
                            booking_id: e.booking_id,
                        };
                        vec![
                            SagaAction::Emit {
                                event_type: "payment_settled".to_string(),
                                payload: serde_json::json!(saga_event),
                            },
                            SagaAction::Complete,
                        ]
                    }
                    PaymentEvent::PaymentFailed(e) => {
                        let reason = format!("payment failed: {}", e.reason);
                        let saga_event = BookingPaymentSagaEvent::BookingCancelRequested {
                            booking_id: e.booking_id,
                            reason: reason.clone(),
                        };
                        vec![
                            SagaAction::Emit {
                                event_type: "booking_cancel_requested".to_string(),
                                payload: serde_json::json!(saga_event),
                            },
                            SagaAction::Compensate {
                                aggregate_type: "bookings.booking".to_string(),
                                command_type: "cancel_booking".to_string(),
                                payload: serde_json::json!({
                                    "booking_id": correlation.0,
                                    "reason": reason,
                                }),
                            },
                        ]
                    }
                    _ => vec![],
                }
            }
            BookingPaymentState::Completed | BookingPaymentState::Compensated => vec![],
        }
    }
}
