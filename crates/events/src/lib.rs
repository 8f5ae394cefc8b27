//! `shutterdesk-events` — event contracts and pub/sub mechanics.
//!
//! No business rules here: the `Event` trait, the `EventEnvelope` carrying
//! stream metadata, the `EventBus` abstraction with an in-memory
//! implementation, and the saga contract. Domain crates define their own
//! event enums; infra persists and distributes them.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod saga;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use saga::{Saga, SagaAction};
