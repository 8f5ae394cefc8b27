//! Saga / process-manager mechanics (framework only, no business rules).
//!
//! A saga instance is identified by a correlation id extracted from incoming
//! domain events. Infra computes a deterministic saga aggregate id, persists
//! saga events through the normal event store, and executes the actions a
//! saga emits. Actions must be idempotent; runners guard against duplicate
//! deliveries.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use shutterdesk_core::{AggregateId, TenantId};

use crate::EventEnvelope;

/// Actions a saga can emit in response to an incoming domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SagaAction {
    /// Append a saga event (JSON payload) to this saga's stream.
    Emit {
        event_type: String,
        payload: JsonValue,
    },
    /// Dispatch a command to a target aggregate.
    Command {
        aggregate_type: String,
        command_type: String,
        payload: JsonValue,
    },
    /// Dispatch a compensating command to undo prior side-effects.
    Compensate {
        aggregate_type: String,
        command_type: String,
        payload: JsonValue,
    },
    /// Mark saga as completed.
    Complete,
}

/// Saga contract: a typed state machine advanced by saga events, reacting to
/// domain events with zero or more actions.
pub trait Saga: Send + Sync + 'static {
    /// Typed state machine (serde for persistence).
    type State: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Saga events persisted in the event store.
    type SagaEvent: Serialize + DeserializeOwned + Send + Sync + 'static;
    /// Correlation id routing events to a saga instance.
    type CorrelationId: Clone + Send + Sync + 'static;

    /// Stable saga type identifier (used as aggregate_type).
    fn saga_type() -> &'static str;

    /// Extract a correlation id from a domain event envelope, or None if the
    /// event is not relevant to this saga.
    fn correlate(envelope: &EventEnvelope<JsonValue>) -> Option<Self::CorrelationId>;

    /// Deterministic saga aggregate id for (tenant, correlation).
    fn saga_id(tenant_id: TenantId, correlation: &Self::CorrelationId) -> AggregateId;

    /// Initial state for a new saga instance.
    fn initial_state(_tenant_id: TenantId, _correlation: &Self::CorrelationId) -> Self::State {
        Self::State::default()
    }

    /// Apply a saga event to mutate state.
    fn apply(state: &mut Self::State, event: &Self::SagaEvent);

    /// React to an incoming domain event given current state.
    fn react(
        state: &Self::State,
        tenant_id: TenantId,
        correlation: &Self::CorrelationId,
        incoming: &EventEnvelope<JsonValue>,
    ) -> Vec<SagaAction>;
}
