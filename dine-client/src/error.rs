//! Client error types

use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// 会话已过期 (410) - 界面应引导重新扫码
    #[error("Session expired: {0}")]
    Expired(String),

    /// 冲突 (409) - 开已占用的桌台、重复关台、改动已下厨条目
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Permission denied - 删除他人条目
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Identity persistence failed
    #[error("Identity store error: {0}")]
    IdentityStore(#[from] std::io::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
