//! 实时传播通道
//!
//! # 架构
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              RealtimeChannel                 │
//! │  ┌───────────────────────────────────────┐  │
//! │  │  broadcast::Sender<ChangeEvent>       │  │
//! │  └───────────────────────────────────────┘  │
//! └──────────────────────┬──────────────────────┘
//!                        │
//!          ┌─────────────┼─────────────┐
//!          ▼             ▼             ▼
//!   Subscription   Subscription   Subscription
//!   (session A)    (session A)    (session B)
//! ```
//!
//! 每个订阅按 `session_id` 过滤事件。订阅是一个拥有所有权的 guard：
//! 任何退出路径 (导航离开、错误、显式 drop) 都会触发注销，
//! 不存在跨会话泄漏的隐式全局句柄。
//!
//! 投递语义 at-least-once: 订阅端落后太多时 broadcast 丢弃旧事件并
//! 返回 [`SubscriptionError::Lagged`]，调用方应全量刷新而不是继续消费。

use std::sync::Arc;

use dashmap::DashMap;
use shared::ChangeEvent;
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the broadcast channel (default: 1024)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// 会话级版本号管理器
///
/// 使用 DashMap 实现无锁并发的版本号管理。
/// 每个会话维护独立的版本号，支持原子递增；
/// 客户端通过版本号判断事件新旧。
#[derive(Debug, Default)]
pub struct SessionVersions {
    versions: DashMap<String, u64>,
}

impl SessionVersions {
    pub fn new() -> Self {
        Self {
            versions: DashMap::new(),
        }
    }

    /// 递增指定会话的版本号并返回新值
    pub fn increment(&self, session_id: &str) -> u64 {
        let mut entry = self.versions.entry(session_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// 当前版本号 (不存在返回 0)
    pub fn get(&self, session_id: &str) -> u64 {
        self.versions.get(session_id).map(|v| *v).unwrap_or(0)
    }
}

/// 订阅错误
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// 通道已关闭 (服务器停止)
    #[error("Realtime channel closed")]
    Closed,

    /// 订阅端落后，事件被丢弃 - 调用方应全量刷新
    #[error("Subscriber lagged, {0} events dropped")]
    Lagged(u64),
}

/// 实时通道 - 负责会话范围事件的扇出
///
/// 句柄持在 `ServerState` 里并显式注入，不是模块级单例。
#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    tx: broadcast::Sender<ChangeEvent>,
    /// 每个会话的在线订阅数 (session id -> count)
    subscribers: Arc<DashMap<String, usize>>,
}

impl RealtimeChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            subscribers: Arc::new(DashMap::new()),
        }
    }

    /// 广播事件到所有订阅者
    ///
    /// 无人订阅时事件直接丢弃 (broadcast send 的正常行为)。
    pub fn publish(&self, event: ChangeEvent) {
        debug!(
            session_id = %event.session_id,
            resource = ?event.resource,
            action = %event.action,
            id = %event.id,
            version = event.version,
            "Broadcasting change event"
        );
        let _ = self.tx.send(event);
    }

    /// 订阅一个会话的事件流
    ///
    /// 返回的 guard 在 Drop 时注销订阅。
    pub fn subscribe(&self, session_id: &str) -> CartSubscription {
        *self
            .subscribers
            .entry(session_id.to_string())
            .or_insert(0) += 1;
        CartSubscription {
            session_id: session_id.to_string(),
            rx: self.tx.subscribe(),
            subscribers: self.subscribers.clone(),
        }
    }

    /// 某会话当前的订阅数
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.subscribers
            .get(session_id)
            .map(|v| *v)
            .unwrap_or(0)
    }

    /// 当前有订阅者的会话数 (健康检查用)
    pub fn subscribed_session_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for RealtimeChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// 会话订阅 - 按 session id 过滤的事件接收端
///
/// Drop 即注销，订阅的生命周期和持有方绑定。
pub struct CartSubscription {
    session_id: String,
    rx: broadcast::Receiver<ChangeEvent>,
    subscribers: Arc<DashMap<String, usize>>,
}

impl CartSubscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 等待下一条本会话的事件
    pub async fn recv(&mut self) -> Result<ChangeEvent, SubscriptionError> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.session_id == self.session_id => return Ok(event),
                Ok(_) => continue, // 其他会话的事件，跳过
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    return Err(SubscriptionError::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
            }
        }
    }

    /// 非阻塞读取，无事件时返回 Ok(None)
    pub fn try_recv(&mut self) -> Result<Option<ChangeEvent>, SubscriptionError> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.session_id == self.session_id => return Ok(Some(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Err(SubscriptionError::Lagged(n));
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed);
                }
            }
        }
    }
}

impl Drop for CartSubscription {
    fn drop(&mut self) {
        let mut remove = false;
        if let Some(mut entry) = self.subscribers.get_mut(&self.session_id) {
            *entry = entry.saturating_sub(1);
            remove = *entry == 0;
        }
        if remove {
            self.subscribers
                .remove_if(&self.session_id, |_, count| *count == 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ChangeAction, ChangeResource};

    fn item_event(session_id: &str, item_id: &str) -> ChangeEvent {
        ChangeEvent::new(
            session_id,
            ChangeResource::CartItem,
            ChangeAction::Created,
            item_id,
            None,
        )
    }

    #[tokio::test]
    async fn test_subscription_filters_by_session() {
        let channel = RealtimeChannel::new();
        let mut sub = channel.subscribe("table_session:a");

        channel.publish(item_event("table_session:b", "cart_item:1"));
        channel.publish(item_event("table_session:a", "cart_item:2"));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.session_id, "table_session:a");
        assert_eq!(event.id, "cart_item:2");
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let channel = RealtimeChannel::new();
        assert_eq!(channel.subscriber_count("table_session:a"), 0);

        let sub1 = channel.subscribe("table_session:a");
        let sub2 = channel.subscribe("table_session:a");
        assert_eq!(channel.subscriber_count("table_session:a"), 2);

        drop(sub1);
        assert_eq!(channel.subscriber_count("table_session:a"), 1);
        drop(sub2);
        assert_eq!(channel.subscriber_count("table_session:a"), 0);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let channel = RealtimeChannel::new();
        let mut sub = channel.subscribe("table_session:a");
        assert!(sub.try_recv().unwrap().is_none());

        channel.publish(item_event("table_session:a", "cart_item:1"));
        assert!(sub.try_recv().unwrap().is_some());
        assert!(sub.try_recv().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_gets_error() {
        let channel = RealtimeChannel::with_capacity(4);
        let mut sub = channel.subscribe("table_session:a");

        for i in 0..32 {
            channel.publish(item_event("table_session:a", &format!("cart_item:{}", i)));
        }

        match sub.recv().await {
            Err(SubscriptionError::Lagged(n)) => assert!(n > 0),
            other => panic!("expected Lagged, got {:?}", other.map(|e| e.id)),
        }
    }

    #[test]
    fn test_session_versions_increment() {
        let versions = SessionVersions::new();
        assert_eq!(versions.get("s1"), 0);
        assert_eq!(versions.increment("s1"), 1);
        assert_eq!(versions.increment("s1"), 2);
        assert_eq!(versions.increment("s2"), 1);
        assert_eq!(versions.get("s1"), 2);
    }
}
