//! 共享购物车客户端控制器
//!
//! 维护会话购物车的本地镜像: 连接时全量拉取一次，之后消费实时
//! 变更事件增量收敛。事件语义是 at-least-once、尽力有序，因此
//! 镜像按条目 id 对账 - 重复事件幂等，乱序事件在全部到达后收敛。
//!
//! 服务端 API 通过 [`CartApi`] 注入，HTTP 客户端和测试 harness
//! 走同一条路。

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::ClientResult;
use crate::identity::GuestIdentity;
use shared::{
    AddCartItemRequest, CartAddon, CartVariant, CartView, ChangeAction, ChangeEvent,
    SharedCartItem, UpdateQuantityResponse,
};

/// 购物车服务端 API 的接缝
#[async_trait::async_trait]
pub trait CartApi: Send + Sync {
    async fn fetch_cart(&self, session_id: &str) -> ClientResult<CartView>;
    async fn fetch_item(&self, item_id: &str) -> ClientResult<SharedCartItem>;
    async fn add_item(
        &self,
        session_id: &str,
        request: AddCartItemRequest,
    ) -> ClientResult<SharedCartItem>;
    async fn update_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> ClientResult<UpdateQuantityResponse>;
    async fn remove_item(&self, item_id: &str, guest_id: &str) -> ClientResult<bool>;
}

/// 新条目的可选项
#[derive(Debug, Clone, Default)]
pub struct AddItemOptions {
    pub notes: Option<String>,
    pub addons: Vec<CartAddon>,
    pub selected_variant: Option<CartVariant>,
}

/// 共享购物车控制器 - 每台设备一个
pub struct SharedCartController<A: CartApi> {
    api: A,
    session_id: String,
    identity: GuestIdentity,
    items: Vec<SharedCartItem>,
    /// 会话已终结 (closed / expired)，镜像冻结
    session_ended: bool,
}

impl<A: CartApi> SharedCartController<A> {
    pub fn new(api: A, session_id: impl Into<String>, identity: GuestIdentity) -> Self {
        Self {
            api,
            session_id: session_id.into(),
            identity,
            items: Vec::new(),
            session_ended: false,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn identity(&self) -> &GuestIdentity {
        &self.identity
    }

    pub fn session_ended(&self) -> bool {
        self.session_ended
    }

    /// 当前镜像中的条目
    pub fn items(&self) -> &[SharedCartItem] {
        &self.items
    }

    /// 连接: 全量拉取一次，作为镜像的基线
    pub async fn connect(&mut self) -> ClientResult<()> {
        let view = self.api.fetch_cart(&self.session_id).await?;
        self.items = view.items;
        debug!(
            session_id = %self.session_id,
            items = self.items.len(),
            "Cart mirror seeded"
        );
        Ok(())
    }

    /// 全量刷新 - 事件流中断 (lagged) 后的恢复路径
    pub async fn refresh(&mut self) -> ClientResult<()> {
        self.connect().await
    }

    /// 消费一条实时变更事件
    ///
    /// created 事件携带裸行，回查服务端水合出商品信息；
    /// updated 直接以事件里的行替换本地条目 (商品 join 保留旧值)；
    /// deleted 按 id 移除；会话终结事件冻结镜像。
    pub async fn apply_event(&mut self, event: &ChangeEvent) -> ClientResult<()> {
        if event.session_id != self.session_id {
            return Ok(());
        }
        if event.is_session_end() {
            debug!(session_id = %self.session_id, action = %event.action, "Session ended");
            self.session_ended = true;
            return Ok(());
        }
        if !event.is_cart_item() {
            return Ok(());
        }

        match event.action {
            ChangeAction::Created => {
                // 裸行没有商品信息，回查水合
                match self.api.fetch_item(&event.id).await {
                    Ok(item) => self.upsert(item),
                    // 极快的 add-then-delete: 回查时行已不在了
                    Err(e) => warn!(item_id = %event.id, "Hydrating fetch failed: {}", e),
                }
            }
            ChangeAction::Updated => {
                if let Some(data) = &event.data
                    && let Ok(mut item) = serde_json::from_value::<SharedCartItem>(data.clone())
                {
                    // 事件行不带商品 join，保留本地已水合的值
                    if item.product.is_none()
                        && let Some(existing) = self.items.iter().find(|i| i.id == item.id)
                    {
                        item.product = existing.product.clone();
                    }
                    self.upsert(item);
                } else {
                    // 事件缺行数据，退回单条回查
                    match self.api.fetch_item(&event.id).await {
                        Ok(item) => self.upsert(item),
                        Err(e) => warn!(item_id = %event.id, "Fetch after update failed: {}", e),
                    }
                }
            }
            ChangeAction::Deleted => {
                self.items.retain(|i| i.id != event.id);
            }
            // cart_item 不产生 closed/expired
            ChangeAction::Closed | ChangeAction::Expired => {}
        }
        Ok(())
    }

    /// 加入购物车 - 条目打上本设备客人的身份
    pub async fn add_item(
        &mut self,
        product_id: impl Into<String>,
        quantity: u32,
        options: AddItemOptions,
    ) -> ClientResult<SharedCartItem> {
        let request = AddCartItemRequest {
            product_id: product_id.into(),
            guest_id: self.identity.guest_id.clone(),
            guest_name: self.identity.name.clone(),
            guest_color: self.identity.color.clone(),
            quantity,
            notes: options.notes,
            addons: options.addons,
            selected_variant: options.selected_variant,
        };
        let item = self.api.add_item(&self.session_id, request).await?;
        // 本地立即可见，不等事件回环
        self.upsert(item.clone());
        Ok(item)
    }

    /// 修改数量 (<= 0 删除)
    pub async fn update_quantity(
        &mut self,
        item_id: &str,
        quantity: i64,
    ) -> ClientResult<UpdateQuantityResponse> {
        let response = self.api.update_quantity(item_id, quantity).await?;
        match &response.item {
            Some(item) => self.upsert(item.clone()),
            None => self.items.retain(|i| i.id != item_id),
        }
        Ok(response)
    }

    /// 删除条目 - 带上自己的 guest_id，归属在服务端校验
    pub async fn remove_item(&mut self, item_id: &str) -> ClientResult<bool> {
        self.api
            .remove_item(item_id, &self.identity.guest_id)
            .await?;
        self.items.retain(|i| i.id != item_id);
        Ok(true)
    }

    /// 该条目是否允许本设备的客人删除
    pub fn can_remove_item(&self, item: &SharedCartItem) -> bool {
        item.guest_id == self.identity.guest_id
    }

    /// 本设备客人自己的条目
    pub fn my_items(&self) -> Vec<&SharedCartItem> {
        self.items
            .iter()
            .filter(|i| i.guest_id == self.identity.guest_id)
            .collect()
    }

    /// 全桌合计 (cancelled 条目除外，未水合条目不计价)
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .filter(|i| i.counts_toward_total())
            .filter_map(|i| i.line_total())
            .sum()
    }

    /// 条目数量合计
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .filter(|i| i.counts_toward_total())
            .map(|i| i.quantity)
            .sum()
    }

    /// 按 id 替换或追加 (幂等: 重复事件收敛到同一状态)
    fn upsert(&mut self, item: SharedCartItem) {
        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::palette_color;
    use chrono::Utc;
    use shared::{ChangeResource, ItemStatus, ProductSummary};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// 内存 CartApi - 模拟服务端的最小行为
    #[derive(Default)]
    struct MockApi {
        items: Mutex<HashMap<String, SharedCartItem>>,
        next_id: Mutex<u32>,
    }

    impl MockApi {
        fn seed(&self, item: SharedCartItem) {
            self.items.lock().unwrap().insert(item.id.clone(), item);
        }
    }

    #[async_trait::async_trait]
    impl CartApi for MockApi {
        async fn fetch_cart(&self, session_id: &str) -> ClientResult<CartView> {
            let items: Vec<_> = self
                .items
                .lock()
                .unwrap()
                .values()
                .filter(|i| i.table_session_id == session_id)
                .cloned()
                .collect();
            Ok(CartView::from_items(items))
        }

        async fn fetch_item(&self, item_id: &str) -> ClientResult<SharedCartItem> {
            self.items
                .lock()
                .unwrap()
                .get(item_id)
                .cloned()
                .ok_or_else(|| crate::ClientError::NotFound(item_id.to_string()))
        }

        async fn add_item(
            &self,
            session_id: &str,
            request: AddCartItemRequest,
        ) -> ClientResult<SharedCartItem> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let item = test_item(
                &format!("cart_item:{}", *next),
                session_id,
                &request.guest_id,
                request.quantity,
            );
            self.seed(item.clone());
            Ok(item)
        }

        async fn update_quantity(
            &self,
            item_id: &str,
            quantity: i64,
        ) -> ClientResult<UpdateQuantityResponse> {
            let mut items = self.items.lock().unwrap();
            if quantity <= 0 {
                items.remove(item_id);
                return Ok(UpdateQuantityResponse {
                    item: None,
                    deleted: true,
                });
            }
            let item = items
                .get_mut(item_id)
                .ok_or_else(|| crate::ClientError::NotFound(item_id.to_string()))?;
            item.quantity = quantity as u32;
            Ok(UpdateQuantityResponse {
                item: Some(item.clone()),
                deleted: false,
            })
        }

        async fn remove_item(&self, item_id: &str, guest_id: &str) -> ClientResult<bool> {
            let mut items = self.items.lock().unwrap();
            let item = items
                .get(item_id)
                .ok_or_else(|| crate::ClientError::NotFound(item_id.to_string()))?;
            if guest_id != item.guest_id {
                return Err(crate::ClientError::Forbidden("not your item".into()));
            }
            items.remove(item_id);
            Ok(true)
        }
    }

    const SESSION: &str = "table_session:s1";

    fn test_item(id: &str, session_id: &str, guest_id: &str, quantity: u32) -> SharedCartItem {
        SharedCartItem {
            id: id.into(),
            table_session_id: session_id.into(),
            product_id: "product:ramen".into(),
            guest_id: guest_id.into(),
            guest_name: format!("Guest {}", guest_id),
            guest_color: palette_color(guest_id).into(),
            quantity,
            notes: None,
            addons: vec![],
            selected_variant: None,
            status: ItemStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            product: Some(ProductSummary {
                id: "product:ramen".into(),
                name: "Ramen".into(),
                price: "12.50".parse().unwrap(),
            }),
        }
    }

    fn identity(guest_id: &str) -> GuestIdentity {
        GuestIdentity {
            guest_id: guest_id.into(),
            name: format!("Guest {}", guest_id),
            color: palette_color(guest_id).into(),
        }
    }

    fn cart_event(action: ChangeAction, item: &SharedCartItem, version: u64) -> ChangeEvent {
        let mut bare = item.clone();
        bare.product = None;
        ChangeEvent::new(
            SESSION,
            ChangeResource::CartItem,
            action,
            item.id.clone(),
            serde_json::to_value(&bare).ok(),
        )
        .with_version(version)
    }

    #[tokio::test]
    async fn test_connect_seeds_mirror() {
        let api = MockApi::default();
        api.seed(test_item("cart_item:a", SESSION, "g1", 2));
        api.seed(test_item("cart_item:b", SESSION, "g2", 1));
        // 其他会话的条目不出现在镜像里
        api.seed(test_item("cart_item:c", "table_session:other", "g3", 1));

        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        controller.connect().await.unwrap();

        assert_eq!(controller.items().len(), 2);
        assert_eq!(controller.item_count(), 3);
        assert_eq!(controller.total(), "37.50".parse::<Decimal>().unwrap());
    }

    #[tokio::test]
    async fn test_created_event_hydrates_via_fetch() {
        let api = MockApi::default();
        let item = test_item("cart_item:a", SESSION, "g2", 1);
        api.seed(item.clone());

        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        controller
            .apply_event(&cart_event(ChangeAction::Created, &item, 1))
            .await
            .unwrap();

        // 事件裸行，镜像里的条目却已水合 (回查补全)
        let mirrored = &controller.items()[0];
        assert_eq!(mirrored.product.as_ref().unwrap().name, "Ramen");
    }

    #[tokio::test]
    async fn test_duplicate_events_are_idempotent() {
        let api = MockApi::default();
        let item = test_item("cart_item:a", SESSION, "g2", 1);
        api.seed(item.clone());

        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        let event = cart_event(ChangeAction::Created, &item, 1);
        controller.apply_event(&event).await.unwrap();
        controller.apply_event(&event).await.unwrap();

        assert_eq!(controller.items().len(), 1);
    }

    #[tokio::test]
    async fn test_updated_event_preserves_hydrated_product() {
        let api = MockApi::default();
        let mut item = test_item("cart_item:a", SESSION, "g2", 1);
        api.seed(item.clone());

        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        controller.connect().await.unwrap();

        item.quantity = 5;
        controller
            .apply_event(&cart_event(ChangeAction::Updated, &item, 2))
            .await
            .unwrap();

        let mirrored = &controller.items()[0];
        assert_eq!(mirrored.quantity, 5);
        // updated 事件也是裸行，商品 join 从本地旧值保留
        assert!(mirrored.product.is_some());
    }

    #[tokio::test]
    async fn test_deleted_event_removes_item() {
        let api = MockApi::default();
        let item = test_item("cart_item:a", SESSION, "g2", 1);
        api.seed(item.clone());

        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        controller.connect().await.unwrap();
        controller
            .apply_event(&cart_event(ChangeAction::Deleted, &item, 2))
            .await
            .unwrap();

        assert!(controller.items().is_empty());
    }

    #[tokio::test]
    async fn test_other_session_events_ignored() {
        let api = MockApi::default();
        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));

        let foreign = ChangeEvent::new(
            "table_session:other",
            ChangeResource::CartItem,
            ChangeAction::Created,
            "cart_item:x",
            None,
        );
        controller.apply_event(&foreign).await.unwrap();
        assert!(controller.items().is_empty());
    }

    #[tokio::test]
    async fn test_session_end_freezes_mirror() {
        let api = MockApi::default();
        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        assert!(!controller.session_ended());

        let closed = ChangeEvent::new(
            SESSION,
            ChangeResource::TableSession,
            ChangeAction::Closed,
            SESSION,
            None,
        );
        controller.apply_event(&closed).await.unwrap();
        assert!(controller.session_ended());
    }

    #[tokio::test]
    async fn test_add_item_tags_own_identity() {
        let api = MockApi::default();
        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));

        let item = controller
            .add_item("product:ramen", 2, AddItemOptions::default())
            .await
            .unwrap();

        assert_eq!(item.guest_id, "g1");
        assert_eq!(controller.my_items().len(), 1);
        assert!(controller.can_remove_item(&item));
    }

    #[tokio::test]
    async fn test_remove_other_guests_item_is_forbidden() {
        let api = MockApi::default();
        let foreign = test_item("cart_item:a", SESSION, "g2", 1);
        api.seed(foreign.clone());

        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        controller.connect().await.unwrap();

        assert!(!controller.can_remove_item(&foreign));
        match controller.remove_item("cart_item:a").await {
            Err(crate::ClientError::Forbidden(_)) => {}
            other => panic!("expected Forbidden, got {:?}", other),
        }
        // 镜像保持不变
        assert_eq!(controller.items().len(), 1);
    }

    #[tokio::test]
    async fn test_update_quantity_zero_removes_locally() {
        let api = MockApi::default();
        let item = test_item("cart_item:a", SESSION, "g1", 3);
        api.seed(item.clone());

        let mut controller = SharedCartController::new(api, SESSION, identity("g1"));
        controller.connect().await.unwrap();

        let response = controller.update_quantity("cart_item:a", 0).await.unwrap();
        assert!(response.deleted);
        assert!(controller.items().is_empty());
    }
}
