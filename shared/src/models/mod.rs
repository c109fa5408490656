//! Domain Models

pub mod cart_item;
pub mod product;
pub mod table_session;

// Re-exports
pub use cart_item::{
    AddCartItemRequest, CartAddon, CartVariant, CartView, ItemStatus, ProductSummary,
    SharedCartItem, SubmitCartResponse, UpdateQuantityRequest, UpdateQuantityResponse,
    effective_unit_price,
};
pub use product::{Product, ProductCreate};
pub use table_session::{
    CloseSessionRequest, CloseSessionResponse, OpenSessionRequest, OpenSessionResponse,
    SessionStatus, SessionWithItems, TableSession, ValidateSessionRequest,
    ValidateSessionResponse,
};
