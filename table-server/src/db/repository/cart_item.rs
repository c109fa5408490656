//! Cart Item Repository

use chrono::{DateTime, Utc};
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::CartItemRow;

const TABLE: &str = "cart_item";

#[derive(Clone)]
pub struct CartItemRepository {
    base: BaseRepository,
}

impl CartItemRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// 插入新条目 - 每次 add 都是独立的一行，不做同商品合并
    pub async fn create(&self, item: CartItemRow) -> RepoResult<CartItemRow> {
        let created: Option<CartItemRow> = self.base.db().create(TABLE).content(item).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create cart item".to_string()))
    }

    /// Find item by id
    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<CartItemRow>> {
        let item: Option<CartItemRow> = self.base.db().select(id.clone()).await?;
        Ok(item)
    }

    /// 会话的全部非 cancelled 条目，按创建时间排序
    ///
    /// 会话引用按 "table:id" 字符串存储，比较也用字符串。
    pub async fn find_by_session(&self, session_id: &RecordId) -> RepoResult<Vec<CartItemRow>> {
        let items: Vec<CartItemRow> = self
            .base
            .db()
            .query(
                "SELECT * FROM cart_item \
                 WHERE table_session_id = $session_id AND status != 'cancelled' \
                 ORDER BY created_at",
            )
            .bind(("session_id", session_id.to_string()))
            .await?
            .take(0)?;
        Ok(items)
    }

    /// 更新数量 - 调用方保证 quantity >= 1 (<= 0 时应走删除)
    pub async fn update_quantity(
        &self,
        id: &RecordId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<CartItemRow>> {
        let updated: Vec<CartItemRow> = self
            .base
            .db()
            .query(
                "UPDATE cart_item SET quantity = $quantity, updated_at = $now \
                 WHERE id = $id RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("quantity", quantity))
            .bind(("now", now))
            .await?
            .take(0)?;
        Ok(updated.into_iter().next())
    }

    /// Hard delete a cart item
    pub async fn delete(&self, id: &RecordId) -> RepoResult<bool> {
        self.base
            .db()
            .query("DELETE $id")
            .bind(("id", id.clone()))
            .await?;
        Ok(true)
    }

    /// 会话内 pending/verified 条目批量下厨
    pub async fn mark_sent_to_kitchen(
        &self,
        session_id: &RecordId,
        now: DateTime<Utc>,
    ) -> RepoResult<Vec<CartItemRow>> {
        let updated: Vec<CartItemRow> = self
            .base
            .db()
            .query(
                "UPDATE cart_item SET status = 'sent_to_kitchen', updated_at = $now \
                 WHERE table_session_id = $session_id \
                 AND status IN ['pending', 'verified'] RETURN AFTER",
            )
            .bind(("session_id", session_id.to_string()))
            .bind(("now", now))
            .await?
            .take(0)?;
        Ok(updated)
    }
}
