//! Dine Client - 扫码点餐设备端
//!
//! 每台设备 (顾客手机浏览器的宿主、桌边自助机、员工平板) 持有：
//!
//! - **identity**: 客人身份解析 (稳定 guest_id + 调色板颜色)
//! - **http**: Table Server 的 HTTP 客户端
//! - **controller**: 共享购物车的本地镜像，消费实时变更事件

pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod identity;

pub use config::ClientConfig;
pub use controller::{AddItemOptions, CartApi, SharedCartController};
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, OpenResult};
pub use identity::{
    FileIdentityStore, GuestIdentity, IdentityStore, MemoryIdentityStore, palette_color,
    resolve_identity,
};

// Re-export shared types for convenience
pub use shared::{ApiResponse, CartView, ChangeEvent, SharedCartItem, TableSession};
