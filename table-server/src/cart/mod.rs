//! 共享购物车服务
//!
//! 同一会话的所有客人看到同一份购物车。条目归创建它的客人所有：
//! 删除必须通过归属校验，数量修改对全桌开放。合计永远从当前
//! 条目集重算，任何地方都不信任缓存的合计值。
//!
//! 实时事件只携带裸行 (无商品 join)。订阅端收到 insert 后回查
//! [`CartService::get_item`] 补全商品信息。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};
use tracing::{info, warn};
use validator::Validate;

use crate::db::models::CartItemRow;
use crate::db::repository::{
    CartItemRepository, ProductRepository, RepoError, TableSessionRepository,
};
use crate::realtime::{RealtimeChannel, SessionVersions};
use crate::utils::{AppError, AppResult};
use shared::{
    AddCartItemRequest, CartView, ChangeAction, ChangeEvent, ChangeResource, ItemStatus,
    ProductSummary, SharedCartItem, SubmitCartResponse, TableSession, UpdateQuantityResponse,
};

/// 购物车服务
#[derive(Clone)]
pub struct CartService {
    session_repo: TableSessionRepository,
    item_repo: CartItemRepository,
    product_repo: ProductRepository,
    channel: RealtimeChannel,
    versions: Arc<SessionVersions>,
}

impl CartService {
    pub fn new(
        db: Surreal<Db>,
        channel: RealtimeChannel,
        versions: Arc<SessionVersions>,
    ) -> Self {
        Self {
            session_repo: TableSessionRepository::new(db.clone()),
            item_repo: CartItemRepository::new(db.clone()),
            product_repo: ProductRepository::new(db),
            channel,
            versions,
        }
    }

    /// 加入购物车
    ///
    /// 不做同商品合并: 两位客人点同一道菜保持两条可区分的记录，
    /// 同一位客人重复 add 也是独立的行。返回水合后的条目。
    pub async fn add_item(
        &self,
        session_id: &str,
        req: AddCartItemRequest,
    ) -> AppResult<SharedCartItem> {
        req.validate()?;
        let session_rid = TableSessionRepository::parse_session_id(session_id)?;
        self.require_active_session(&session_rid).await?;

        let product_rid: RecordId = req
            .product_id
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid product ID: {}", req.product_id)))?;
        let product = self
            .product_repo
            .find_by_id(&product_rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::not_found(format!("Product {} not found", req.product_id)))?;

        let now = Utc::now();
        let row = CartItemRow {
            id: None,
            table_session_id: session_rid.clone(),
            product_id: product_rid,
            guest_id: req.guest_id,
            guest_name: req.guest_name,
            guest_color: req.guest_color,
            quantity: req.quantity,
            notes: req.notes,
            addons: req.addons,
            selected_variant: req.selected_variant,
            status: ItemStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let created = self
            .item_repo
            .create(row)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        info!(
            session_id = %session_rid,
            item_id = ?created.id,
            guest_id = %created.guest_id,
            quantity = created.quantity,
            "Cart item added"
        );
        // 事件携带裸行: 订阅端回查补全商品信息
        self.broadcast_item(&session_rid, &created, ChangeAction::Created);
        Ok(created.into_shared(Some(product.summary())))
    }

    /// 会话购物车视图 (水合 + 重算合计)
    pub async fn get_cart(&self, session_id: &str) -> AppResult<CartView> {
        let session_rid = TableSessionRepository::parse_session_id(session_id)?;
        let rows = self
            .item_repo
            .find_by_session(&session_rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        let items = self.hydrate(rows).await?;
        Ok(CartView::from_items(items))
    }

    /// 单条目水合读取 (订阅端收到 insert 事件后的回查)
    pub async fn get_item(&self, item_id: &str) -> AppResult<SharedCartItem> {
        let rid: RecordId = item_id
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid item ID: {}", item_id)))?;
        let row = self
            .item_repo
            .find_by_id(&rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Cart item {} not found", item_id)))?;
        let mut items = self.hydrate(vec![row]).await?;
        Ok(items.remove(0))
    }

    /// 修改数量 - quantity <= 0 等价于删除该条目
    pub async fn update_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> AppResult<UpdateQuantityResponse> {
        let rid: RecordId = item_id
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid item ID: {}", item_id)))?;
        let row = self
            .item_repo
            .find_by_id(&rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Cart item {} not found", item_id)))?;
        Self::require_mutable(&row)?;

        let session_rid = row.table_session_id.clone();
        if quantity <= 0 {
            self.item_repo
                .delete(&rid)
                .await
                .map_err(|e| AppError::database(e.to_string()))?;
            info!(session_id = %session_rid, item_id, "Cart item removed via zero quantity");
            self.broadcast_item(&session_rid, &row, ChangeAction::Deleted);
            return Ok(UpdateQuantityResponse {
                item: None,
                deleted: true,
            });
        }

        // 截断转换会把超界数量折成 0 落库，必须先拒绝
        let quantity = u32::try_from(quantity)
            .map_err(|_| AppError::validation(format!("Quantity {} is out of range", quantity)))?;
        let updated = self
            .item_repo
            .update_quantity(&rid, quantity, Utc::now())
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Cart item {} not found", item_id)))?;
        self.broadcast_item(&session_rid, &updated, ChangeAction::Updated);
        let mut items = self.hydrate(vec![updated]).await?;
        Ok(UpdateQuantityResponse {
            item: Some(items.remove(0)),
            deleted: false,
        })
    }

    /// 删除条目
    ///
    /// 归属校验没有旁路: 只有加入该条目的客人能删除它。
    pub async fn remove_item(&self, item_id: &str, guest_id: &str) -> AppResult<()> {
        let rid: RecordId = item_id
            .parse()
            .map_err(|_| AppError::validation(format!("Invalid item ID: {}", item_id)))?;
        let row = self
            .item_repo
            .find_by_id(&rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Cart item {} not found", item_id)))?;

        if guest_id != row.guest_id {
            warn!(
                item_id,
                guest_id,
                owner = %row.guest_id,
                "Rejected cross-guest item removal"
            );
            return Err(AppError::forbidden("You can only remove your own items"));
        }
        Self::require_mutable(&row)?;

        let session_rid = row.table_session_id.clone();
        self.item_repo
            .delete(&rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        info!(session_id = %session_rid, item_id, "Cart item removed");
        self.broadcast_item(&session_rid, &row, ChangeAction::Deleted);
        Ok(())
    }

    /// 提交下厨
    ///
    /// 会话内 pending/verified 条目批量置为 sent_to_kitchen，
    /// 然后从当前条目集重算会话的订单合计并落库。
    pub async fn submit_to_kitchen(&self, session_id: &str) -> AppResult<SubmitCartResponse> {
        let session_rid = TableSessionRepository::parse_session_id(session_id)?;
        self.require_active_session(&session_rid).await?;

        let now = Utc::now();
        let sent = self
            .item_repo
            .mark_sent_to_kitchen(&session_rid, now)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        if sent.is_empty() {
            return Err(AppError::invalid("Cart has no items to submit"));
        }
        for row in &sent {
            self.broadcast_item(&session_rid, row, ChangeAction::Updated);
        }

        // 合计从全部非 cancelled 条目重算 (含此前已下厨的)
        let all_rows = self
            .item_repo
            .find_by_session(&session_rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        let items = self.hydrate(all_rows).await?;
        let view = CartView::from_items(items);

        let session_row = self
            .session_repo
            .set_total(&session_rid, view.total)
            .await
            .map_err(|e| match e {
                RepoError::NotFound(msg) => AppError::not_found(msg),
                other => AppError::database(other.to_string()),
            })?;
        let session = TableSession::from(session_row);
        info!(
            session_id = %session.id,
            items = sent.len(),
            total = %session.total_amount,
            "Cart submitted to kitchen"
        );
        self.broadcast(ChangeEvent::new(
            session.id.clone(),
            ChangeResource::TableSession,
            ChangeAction::Updated,
            session.id.clone(),
            serde_json::to_value(&session).ok(),
        ));

        let sent_ids: Vec<String> = sent
            .iter()
            .filter_map(|r| r.id.as_ref().map(|id| id.to_string()))
            .collect();
        let sent_items = view
            .items
            .into_iter()
            .filter(|i| sent_ids.contains(&i.id))
            .collect();
        Ok(SubmitCartResponse {
            session,
            items: sent_items,
        })
    }

    /// 批量水合: 一次查出涉及的商品，避免 N+1
    async fn hydrate(&self, rows: Vec<CartItemRow>) -> AppResult<Vec<SharedCartItem>> {
        let mut ids: Vec<RecordId> = Vec::new();
        for row in &rows {
            if !ids.contains(&row.product_id) {
                ids.push(row.product_id.clone());
            }
        }
        let products = self
            .product_repo
            .find_by_ids(ids)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        let by_id: HashMap<String, ProductSummary> = products
            .iter()
            .map(|p| {
                let summary = p.summary();
                (summary.id.clone(), summary)
            })
            .collect();
        Ok(rows
            .into_iter()
            .map(|row| {
                let product = by_id.get(&row.product_id.to_string()).cloned();
                row.into_shared(product)
            })
            .collect())
    }

    async fn require_active_session(&self, session_rid: &RecordId) -> AppResult<()> {
        let row = self
            .session_repo
            .find_by_id(session_rid)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Session {} not found", session_rid)))?;
        match row.status {
            shared::SessionStatus::Active => Ok(()),
            shared::SessionStatus::Expired => Err(AppError::expired(format!(
                "Session {} has expired",
                session_rid
            ))),
            shared::SessionStatus::Closed => Err(AppError::conflict(format!(
                "Session {} is closed",
                session_rid
            ))),
        }
    }

    /// 下厨后的条目不再可改 (取消/改量走员工侧订单流程)
    fn require_mutable(row: &CartItemRow) -> AppResult<()> {
        match row.status {
            ItemStatus::Pending | ItemStatus::Verified => Ok(()),
            ItemStatus::SentToKitchen => {
                Err(AppError::conflict("Item was already sent to the kitchen"))
            }
            ItemStatus::Cancelled => Err(AppError::conflict("Item was cancelled")),
        }
    }

    fn broadcast_item(&self, session_rid: &RecordId, row: &CartItemRow, action: ChangeAction) {
        let id = row
            .id
            .as_ref()
            .map(|t| t.to_string())
            .unwrap_or_default();
        self.broadcast(ChangeEvent::new(
            session_rid.to_string(),
            ChangeResource::CartItem,
            action,
            id,
            serde_json::to_value(row.clone().into_shared(None)).ok(),
        ));
    }

    fn broadcast(&self, event: ChangeEvent) {
        let version = self.versions.increment(&event.session_id);
        self.channel.publish(event.with_version(version));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use rust_decimal::Decimal;
    use shared::ProductCreate;

    struct Fixture {
        cart: CartService,
        channel: RealtimeChannel,
        session_id: String,
        product_id: String,
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    async fn fixture() -> Fixture {
        let db = DbService::memory().await.unwrap();
        let channel = RealtimeChannel::new();
        let versions = Arc::new(SessionVersions::new());
        let cart = CartService::new(db.db.clone(), channel.clone(), versions);

        let session_repo = TableSessionRepository::new(db.db.clone());
        let session = session_repo
            .create_active("rest-1", 5, 2, "token", Utc::now())
            .await
            .unwrap();
        let product_repo = ProductRepository::new(db.db);
        let product = product_repo
            .create(ProductCreate {
                name: "Ramen".into(),
                price: dec("12.50"),
            })
            .await
            .unwrap();

        Fixture {
            cart,
            channel,
            session_id: session.id.unwrap().to_string(),
            product_id: product.id.unwrap().to_string(),
        }
    }

    fn add_request(fx: &Fixture, guest: &str, quantity: u32) -> AddCartItemRequest {
        AddCartItemRequest {
            product_id: fx.product_id.clone(),
            guest_id: guest.into(),
            guest_name: format!("Guest {}", guest),
            guest_color: "#EF4444".into(),
            quantity,
            notes: None,
            addons: vec![],
            selected_variant: None,
        }
    }

    #[tokio::test]
    async fn test_add_item_hydrates_product() {
        let fx = fixture().await;
        let item = fx
            .cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 2))
            .await
            .unwrap();

        assert_eq!(item.quantity, 2);
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.product.as_ref().unwrap().name, "Ramen");
        assert_eq!(item.line_total(), Some(dec("25.00")));
    }

    #[tokio::test]
    async fn test_add_does_not_merge_duplicate_products() {
        let fx = fixture().await;
        fx.cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 1))
            .await
            .unwrap();
        fx.cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 1))
            .await
            .unwrap();

        let view = fx.cart.get_cart(&fx.session_id).await.unwrap();
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.item_count, 2);
        assert_eq!(view.total, dec("25.00"));
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_not_found() {
        let fx = fixture().await;
        let mut req = add_request(&fx, "g1", 1);
        req.product_id = "product:missing".into();
        match fx.cart.add_item(&fx.session_id, req).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other.map(|i| i.id)),
        }
    }

    #[tokio::test]
    async fn test_insert_event_is_bare_and_fetch_hydrates() {
        let fx = fixture().await;
        let mut sub = fx.channel.subscribe(&fx.session_id);
        let item = fx
            .cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 1))
            .await
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.action, ChangeAction::Created);
        assert_eq!(event.id, item.id);
        // 事件裸行不带商品 join
        let bare: SharedCartItem = serde_json::from_value(event.data.unwrap()).unwrap();
        assert!(bare.product.is_none());

        // 回查补全
        let hydrated = fx.cart.get_item(&event.id).await.unwrap();
        assert_eq!(hydrated.product.as_ref().unwrap().price, dec("12.50"));
    }

    #[tokio::test]
    async fn test_update_quantity_zero_deletes() {
        let fx = fixture().await;
        let item = fx
            .cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 3))
            .await
            .unwrap();

        let resp = fx.cart.update_quantity(&item.id, 0).await.unwrap();
        assert!(resp.deleted);
        assert!(resp.item.is_none());

        let view = fx.cart.get_cart(&fx.session_id).await.unwrap();
        assert!(view.items.is_empty());
    }

    #[tokio::test]
    async fn test_update_quantity_recomputes_total() {
        let fx = fixture().await;
        let item = fx
            .cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 1))
            .await
            .unwrap();

        let resp = fx.cart.update_quantity(&item.id, 4).await.unwrap();
        assert_eq!(resp.item.unwrap().quantity, 4);

        let view = fx.cart.get_cart(&fx.session_id).await.unwrap();
        assert_eq!(view.total, dec("50.00"));
    }

    #[tokio::test]
    async fn test_remove_requires_ownership() {
        let fx = fixture().await;
        let item = fx
            .cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 1))
            .await
            .unwrap();

        // 别的客人删不掉
        match fx.cart.remove_item(&item.id, "g2").await {
            Err(AppError::Forbidden(_)) => {}
            other => panic!("expected Forbidden, got {:?}", other),
        }
        // 条目仍在
        assert_eq!(fx.cart.get_cart(&fx.session_id).await.unwrap().items.len(), 1);

        // 本人可以删
        fx.cart.remove_item(&item.id, "g1").await.unwrap();
        assert!(fx.cart.get_cart(&fx.session_id).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_update_quantity_out_of_range_is_rejected() {
        let fx = fixture().await;
        let item = fx
            .cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 2))
            .await
            .unwrap();

        // 超出 u32 的数量不允许折返成 0 落库
        match fx.cart.update_quantity(&item.id, 1i64 << 32).await {
            Err(AppError::Validation(_)) => {}
            other => panic!("expected Validation, got {:?}", other.map(|r| r.deleted)),
        }
        let view = fx.cart.get_cart(&fx.session_id).await.unwrap();
        assert_eq!(view.items[0].quantity, 2);
        assert_eq!(view.total, dec("25.00"));
    }

    #[tokio::test]
    async fn test_submit_marks_items_and_recomputes_session_total() {
        let fx = fixture().await;
        fx.cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 2))
            .await
            .unwrap();
        fx.cart
            .add_item(&fx.session_id, add_request(&fx, "g2", 1))
            .await
            .unwrap();

        let resp = fx.cart.submit_to_kitchen(&fx.session_id).await.unwrap();
        assert_eq!(resp.items.len(), 2);
        assert!(resp
            .items
            .iter()
            .all(|i| i.status == ItemStatus::SentToKitchen));
        assert_eq!(resp.session.total_amount, dec("37.50"));
    }

    #[tokio::test]
    async fn test_submit_empty_cart_is_invalid() {
        let fx = fixture().await;
        match fx.cart.submit_to_kitchen(&fx.session_id).await {
            Err(AppError::Invalid(_)) => {}
            other => panic!("expected Invalid, got {:?}", other.map(|r| r.items.len())),
        }
    }

    #[tokio::test]
    async fn test_sent_item_is_immutable() {
        let fx = fixture().await;
        let item = fx
            .cart
            .add_item(&fx.session_id, add_request(&fx, "g1", 1))
            .await
            .unwrap();
        fx.cart.submit_to_kitchen(&fx.session_id).await.unwrap();

        match fx.cart.update_quantity(&item.id, 5).await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {:?}", other.map(|r| r.deleted)),
        }
        match fx.cart.remove_item(&item.id, "g1").await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_add_to_closed_session_is_conflict() {
        let fx = fixture().await;
        let db_session = TableSessionRepository::parse_session_id(&fx.session_id).unwrap();
        fx.cart
            .session_repo
            .close(&db_session, Decimal::ZERO, Utc::now())
            .await
            .unwrap();

        match fx.cart.add_item(&fx.session_id, add_request(&fx, "g1", 1)).await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("expected Conflict, got {:?}", other.map(|i| i.id)),
        }
    }
}
