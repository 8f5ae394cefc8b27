//! Saga infrastructure: persistence, command execution and the runner.

pub mod booking_payment;

use serde_json::Value as JsonValue;
use thiserror::Error;

use shutterdesk_core::{AggregateId, ExpectedVersion, TenantId};
use shutterdesk_events::{EventEnvelope, Saga, SagaAction};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

pub use booking_payment::{BookingPaymentSaga, BookingPaymentSagaEvent, BookingPaymentState};

/// Repository for persisting saga events via the event store.
pub struct SagaRepository<S: Saga, E: EventStore> {
    event_store: E,
    _phantom: std::marker::PhantomData<S>,
}

impl<S: Saga, E: EventStore> SagaRepository<S, E> {
    pub fn new(event_store: E) -> Self {
        Self {
            event_store,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Load saga event history for a saga instance.
    pub fn load(
        &self,
        tenant_id: TenantId,
        saga_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.event_store.load_stream(tenant_id, saga_id)
    }

    /// Append a saga event (Emit action).
    pub fn append_emit(
        &self,
        tenant_id: TenantId,
        saga_id: AggregateId,
        event_type: &str,
        payload: JsonValue,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let uncommitted = UncommittedEvent {
            event_id: uuid::Uuid::now_v7(),
            tenant_id,
            aggregate_id: saga_id,
            aggregate_type: S::saga_type().to_string(),
            event_type: event_type.to_string(),
            event_version: 1,
            occurred_at: chrono::Utc::now(),
            payload,
        };
        self.event_store.append(vec![uncommitted], ExpectedVersion::Any)
    }
}

/// Command executor for saga actions. The application layer implements this
/// by translating (aggregate_type, command_type, payload) into a dispatch.
pub trait CommandExecutor: Send + Sync {
    type Error: std::fmt::Debug;

    fn execute(
        &self,
        tenant_id: TenantId,
        aggregate_type: &str,
        command_type: &str,
        payload: &JsonValue,
    ) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum SagaError {
    #[error("saga event store failure: {0}")]
    Store(#[from] EventStoreError),

    #[error("failed to deserialize saga event: {0}")]
    Deserialize(String),

    #[error("saga command execution failed: {0}")]
    Execute(String),
}

/// Drives one saga type off the published event stream.
///
/// For each incoming envelope: correlate, rehydrate saga state from its own
/// stream, react, then persist emits and forward commands. Reactions must be
/// guarded by state flags so redelivered envelopes do not repeat
/// side-effects.
pub struct SagaRunner<S: Saga, E: EventStore, X: CommandExecutor> {
    repository: SagaRepository<S, E>,
    executor: X,
}

impl<S: Saga, E: EventStore, X: CommandExecutor> SagaRunner<S, E, X> {
    pub fn new(event_store: E, executor: X) -> Self {
        Self {
            repository: SagaRepository::new(event_store),
            executor,
        }
    }

    /// Feed one published envelope to the saga. Irrelevant envelopes are a
    /// no-op.
    pub fn handle_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), SagaError> {
        let Some(correlation) = S::correlate(envelope) else {
            return Ok(());
        };

        let tenant_id = envelope.tenant_id();
        let saga_id = S::saga_id(tenant_id, &correlation);

        let history = self.repository.load(tenant_id, saga_id)?;
        let mut state = S::initial_state(tenant_id, &correlation);
        for stored in &history {
            let ev: S::SagaEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| SagaError::Deserialize(e.to_string()))?;
            S::apply(&mut state, &ev);
        }

        for action in S::react(&state, tenant_id, &correlation, envelope) {
            match action {
                SagaAction::Emit { event_type, payload } => {
                    self.repository.append_emit(tenant_id, saga_id, &event_type, payload)?;
                }
                SagaAction::Command {
                    aggregate_type,
                    command_type,
                    payload,
                } => {
                    self.executor
                        .execute(tenant_id, &aggregate_type, &command_type, &payload)
                        .map_err(|e| SagaError::Execute(format!("{e:?}")))?;
                }
                SagaAction::Compensate {
                    aggregate_type,
                    command_type,
                    payload,
                } => {
                    tracing::warn!(
                        saga_type = S::saga_type(),
                        %aggregate_type,
                        %command_type,
                        "executing compensation"
                    );
                    self.executor
                        .execute(tenant_id, &aggregate_type, &command_type, &payload)
                        .map_err(|e| SagaError::Execute(format!("{e:?}")))?;
                }
                SagaAction::Complete => {
                    tracing::info!(saga_type = S::saga_type(), "saga completed");
                }
            }
        }

        Ok(())
    }
}
