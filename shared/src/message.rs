//! 会话范围内的实时变更事件
//!
//! 当购物车或会话发生变更时 (由某台顾客设备触发，或服务端后台触发)，
//! 服务端向订阅了该会话的所有客户端广播 [`ChangeEvent`]。
//!
//! 投递语义是 at-least-once、尽力有序: 客户端按条目 id 对账，
//! 乱序到达的 update/delete 在两条都收到后自行收敛。
//!
//! # 示例
//! - `resource`: cart_item, `action`: created, `id`: "cart_item:abc"
//! - `resource`: table_session, `action`: closed, `id`: "table_session:xyz"

use serde::{Deserialize, Serialize};
use std::fmt;

/// 变更的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeResource {
    CartItem,
    TableSession,
}

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
    /// 会话被员工关闭
    Closed,
    /// 会话超时过期
    Expired,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Created => write!(f, "created"),
            ChangeAction::Updated => write!(f, "updated"),
            ChangeAction::Deleted => write!(f, "deleted"),
            ChangeAction::Closed => write!(f, "closed"),
            ChangeAction::Expired => write!(f, "expired"),
        }
    }
}

/// 会话范围变更事件
///
/// `data` 是变更后的裸行 (cart_item 不含商品 join)，deleted 时为 None。
/// insert 的订阅端需要商品详情时按 `id` 回查水合。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 事件所属会话 - 订阅按此过滤
    pub session_id: String,
    pub resource: ChangeResource,
    pub action: ChangeAction,
    /// 会话内递增版本号 (客户端据此判断数据新旧)
    pub version: u64,
    /// 变更行 id
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(
        session_id: impl Into<String>,
        resource: ChangeResource,
        action: ChangeAction,
        id: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            resource,
            action,
            version: 0,
            id: id.into(),
            data,
        }
    }

    /// 设置版本号 (发布端在广播前填充)
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn is_cart_item(&self) -> bool {
        self.resource == ChangeResource::CartItem
    }

    /// 会话终结事件 (closed / expired)
    pub fn is_session_end(&self) -> bool {
        self.resource == ChangeResource::TableSession
            && matches!(self.action, ChangeAction::Closed | ChangeAction::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_roundtrip() {
        let event = ChangeEvent::new(
            "table_session:a1",
            ChangeResource::CartItem,
            ChangeAction::Created,
            "cart_item:x9",
            Some(serde_json::json!({"quantity": 2})),
        )
        .with_version(7);

        let json = serde_json::to_string(&event).unwrap();
        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.session_id, "table_session:a1");
        assert_eq!(back.action, ChangeAction::Created);
        assert_eq!(back.version, 7);
        assert!(back.is_cart_item());
    }

    #[test]
    fn test_session_end_detection() {
        let closed = ChangeEvent::new(
            "table_session:a1",
            ChangeResource::TableSession,
            ChangeAction::Closed,
            "table_session:a1",
            None,
        );
        assert!(closed.is_session_end());

        let updated = ChangeEvent::new(
            "table_session:a1",
            ChangeResource::CartItem,
            ChangeAction::Updated,
            "cart_item:x",
            None,
        );
        assert!(!updated.is_session_end());
    }
}
