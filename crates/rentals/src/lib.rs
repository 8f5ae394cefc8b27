//! Rental catalog domain (event-sourced).
//!
//! Customer-facing listings backed by the resource inventory. A rental
//! product carries its own `rental_stock` counter, fed exclusively by
//! transfers out of the owning resource's available pool.

pub mod rental_product;

pub use rental_product::{
    AdjustRentalStock, DelistRentalProduct, ListRentalProduct, RentalProduct,
    RentalProductCommand, RentalProductEvent, RentalProductId, SetDailyRate,
};
