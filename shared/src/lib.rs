//! 餐厅桌台会话与共享购物车 - 共享类型库
//!
//! 这些类型在 table-server 和客户端之间共享：
//!
//! - **models**: 领域模型 (桌台会话、购物车条目、商品) 和请求/响应 DTO
//! - **message**: 会话范围内的实时变更事件
//! - **client**: 客户端侧的 API 响应信封

pub mod client;
pub mod message;
pub mod models;

pub use client::ApiResponse;
pub use message::{ChangeAction, ChangeEvent, ChangeResource};
pub use models::{
    AddCartItemRequest, CartAddon, CartVariant, CartView, CloseSessionRequest,
    CloseSessionResponse, ItemStatus, OpenSessionRequest, OpenSessionResponse, Product,
    ProductCreate, ProductSummary, SessionStatus, SessionWithItems, SharedCartItem,
    SubmitCartResponse, TableSession, UpdateQuantityRequest, UpdateQuantityResponse,
    ValidateSessionRequest, ValidateSessionResponse,
};
