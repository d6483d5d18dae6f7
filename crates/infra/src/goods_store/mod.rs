//! Goods store implementations (authoritative stock source).

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryGoodsStore;
pub use postgres::PostgresGoodsStore;
