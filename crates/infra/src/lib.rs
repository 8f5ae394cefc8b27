//! Infrastructure layer: event store, command dispatch, read models, sagas.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod saga;
