//! Table Session Model (桌台会话)
//!
//! 一次落座对应一个会话：开台 → 点餐 → 结账/过期。
//! 同一餐厅同一桌号同时最多只有一个 active 会话。

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::cart_item::SharedCartItem;

/// 会话状态
///
/// 状态迁移是单向的: active → {closed, expired}。
/// 终态会话不可复活，重新开台会创建新的会话记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// 进行中，可以点餐
    Active,
    /// 员工结账关闭
    Closed,
    /// 超时过期 (惰性检查或后台清扫触发)
    Expired,
}

impl SessionStatus {
    /// 是否为终态 (closed / expired)
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::Expired)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Closed => write!(f, "closed"),
            SessionStatus::Expired => write!(f, "expired"),
        }
    }
}

/// 桌台会话实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSession {
    pub id: String,
    pub restaurant_id: String,
    pub table_number: u32,
    /// 不可猜测的能力令牌，扫码端凭它绑定到会话
    pub session_token: String,
    pub guest_count: u32,
    pub status: SessionStatus,
    /// 订单级汇总金额 (下单时重算，不随购物车变动)
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

impl TableSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

fn default_guest_count() -> u32 {
    1
}

/// 开台请求
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OpenSessionRequest {
    #[validate(length(min = 1))]
    pub restaurant_id: String,
    #[validate(range(min = 1))]
    pub table_number: u32,
    #[serde(default = "default_guest_count")]
    #[validate(range(min = 1))]
    pub guest_count: u32,
}

/// 开台响应: 新会话 + 顾客扫码地址
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSessionResponse {
    pub session: TableSession,
    pub qr_url: String,
}

/// 会话校验请求
///
/// `session_token` 可选: 不带令牌为宽松 (自助机) 模式，
/// 带令牌时必须与会话匹配。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateSessionRequest {
    pub table_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
}

/// 会话校验响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateSessionResponse {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<TableSession>,
    /// 失败原因: "not_found" | "expired" | "token_mismatch"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidateSessionResponse {
    pub fn valid(session: TableSession) -> Self {
        Self {
            valid: true,
            session: Some(session),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            session: None,
            error: Some(error.into()),
        }
    }
}

/// 结账关台请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseSessionRequest {
    /// 实收金额，缺省取会话的 total_amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_amount: Option<Decimal>,
}

/// 结账关台响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseSessionResponse {
    pub session: TableSession,
    pub message: String,
}

/// 活跃会话列表条目 (可选携带购物车条目)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWithItems {
    pub session: TableSession,
    #[serde(default)]
    pub items: Vec<SharedCartItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Closed.is_terminal());
        assert!(SessionStatus::Expired.is_terminal());
    }

    #[test]
    fn test_status_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Active).unwrap(),
            "\"active\""
        );
        let status: SessionStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(status, SessionStatus::Expired);
    }

    #[test]
    fn test_open_request_validation() {
        use validator::Validate;

        let bad = OpenSessionRequest {
            restaurant_id: "rest-1".into(),
            table_number: 0,
            guest_count: 2,
        };
        assert!(bad.validate().is_err());

        let ok = OpenSessionRequest {
            restaurant_id: "rest-1".into(),
            table_number: 5,
            guest_count: 2,
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_guest_count_defaults_to_one() {
        let req: OpenSessionRequest =
            serde_json::from_str(r#"{"restaurant_id":"r1","table_number":3}"#).unwrap();
        assert_eq!(req.guest_count, 1);
    }
}
