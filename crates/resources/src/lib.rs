//! Resource inventory domain (event-sourced).
//!
//! Physical equipment owned by the studio (cameras, lights, props). Each
//! resource tracks two pools: `stock` (available) and `rental_stock` (carved
//! out into the rental catalog). Pure domain logic only.

pub mod resource;

pub use resource::{
    AdjustStock, CreateResource, Resource, ResourceCommand, ResourceCondition, ResourceEvent,
    ResourceId, RetireResource, ReturnFromRental, TransferToRental, UpdateDetails,
};
