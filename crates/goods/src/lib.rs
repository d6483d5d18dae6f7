//! Goods domain module.
//!
//! This crate contains the catalog-side view of an item on flash sale,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no
//! storage).

pub mod goods;

pub use goods::Goods;
