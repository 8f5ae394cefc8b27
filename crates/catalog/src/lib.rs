//! Sale catalog domain (event-sourced).
//!
//! Products the studio sells outright (prints, albums, frames). Distinct
//! from the rental catalog: sale stock is consumed by purchases, never
//! transferred back.

pub mod product;

pub use product::{
    ActivateProduct, AdjustProductStock, ArchiveProduct, CreateProduct, Product, ProductCommand,
    ProductEvent, ProductId, ProductStatus, UpdateProduct,
};
