//! Database Models
//!
//! 数据库侧的行模型，id 使用 SurrealDB RecordId；
//! API 侧对应的共享模型见 `shared::models`。

pub mod serde_helpers;

pub mod cart_item;
pub mod product;
pub mod table_session;

// Re-exports
pub use cart_item::CartItemRow;
pub use product::ProductRow;
pub use table_session::TableSessionRow;
