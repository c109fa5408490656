//! Table Session Repository

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use surrealdb::engine::local::Db;
use surrealdb::{RecordId, Surreal};

use super::{BaseRepository, RepoError, RepoResult};
use crate::db::models::TableSessionRow;

/// THROW 标记: 开台时发现同桌已有 active 会话
const OCCUPIED_MARKER: &str = "table_occupied";

#[derive(Clone)]
pub struct TableSessionRepository {
    base: BaseRepository,
}

impl TableSessionRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// 原子开台: 存在性检查和插入在同一个数据库事务里执行
    ///
    /// 同桌已有 active 会话时事务 THROW 回滚，返回 [`RepoError::Duplicate`]。
    /// 先读后写的两步方案有竞态窗口，这里不允许。
    pub async fn create_active(
        &self,
        restaurant_id: &str,
        table_number: u32,
        guest_count: u32,
        session_token: &str,
        started_at: DateTime<Utc>,
    ) -> RepoResult<TableSessionRow> {
        let mut response = self
            .base
            .db()
            .query(
                "BEGIN TRANSACTION;
                 LET $existing = (SELECT VALUE id FROM table_session \
                    WHERE restaurant_id = $restaurant_id \
                    AND table_number = $table_number \
                    AND status = 'active');
                 IF array::len($existing) > 0 { THROW 'table_occupied' };
                 CREATE table_session CONTENT {
                     restaurant_id: $restaurant_id,
                     table_number: $table_number,
                     guest_count: $guest_count,
                     session_token: $session_token,
                     status: 'active',
                     total_amount: $zero,
                     paid_amount: $zero,
                     started_at: $started_at
                 };
                 COMMIT TRANSACTION;",
            )
            .bind(("restaurant_id", restaurant_id.to_string()))
            .bind(("table_number", table_number))
            .bind(("guest_count", guest_count))
            .bind(("session_token", session_token.to_string()))
            // 金额按 Decimal 绑定，和行模型的字符串序列化保持一致
            .bind(("zero", Decimal::ZERO))
            .bind(("started_at", started_at))
            .await?;

        // LET = 0, IF = 1, CREATE = 2
        let created: Result<Vec<TableSessionRow>, surrealdb::Error> = response.take(2);
        match created {
            Ok(rows) => rows.into_iter().next().ok_or_else(|| {
                RepoError::Database("Failed to create table session".to_string())
            }),
            Err(e) if e.to_string().contains(OCCUPIED_MARKER) => Err(RepoError::Duplicate(
                format!("Table {} already has an active session", table_number),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// 按桌号查找 active 会话 (可选限定餐厅)
    pub async fn find_active(
        &self,
        restaurant_id: Option<&str>,
        table_number: u32,
    ) -> RepoResult<Option<TableSessionRow>> {
        let mut query = String::from(
            "SELECT * FROM table_session WHERE table_number = $table_number AND status = 'active'",
        );
        if restaurant_id.is_some() {
            query.push_str(" AND restaurant_id = $restaurant_id");
        }
        query.push_str(" LIMIT 1");

        let mut request = self
            .base
            .db()
            .query(query)
            .bind(("table_number", table_number));
        if let Some(rid) = restaurant_id {
            request = request.bind(("restaurant_id", rid.to_string()));
        }

        let sessions: Vec<TableSessionRow> = request.await?.take(0)?;
        Ok(sessions.into_iter().next())
    }

    /// Find session by id
    pub async fn find_by_id(&self, id: &RecordId) -> RepoResult<Option<TableSessionRow>> {
        let session: Option<TableSessionRow> = self.base.db().select(id.clone()).await?;
        Ok(session)
    }

    /// 某餐厅的全部 active 会话，按开台时间排序
    pub async fn list_active(&self, restaurant_id: &str) -> RepoResult<Vec<TableSessionRow>> {
        let sessions: Vec<TableSessionRow> = self
            .base
            .db()
            .query(
                "SELECT * FROM table_session \
                 WHERE restaurant_id = $restaurant_id AND status = 'active' \
                 ORDER BY started_at",
            )
            .bind(("restaurant_id", restaurant_id.to_string()))
            .await?
            .take(0)?;
        Ok(sessions)
    }

    /// 全部 active 会话 (后台清扫用，跨餐厅)
    pub async fn list_all_active(&self) -> RepoResult<Vec<TableSessionRow>> {
        let sessions: Vec<TableSessionRow> = self
            .base
            .db()
            .query("SELECT * FROM table_session WHERE status = 'active'")
            .await?
            .take(0)?;
        Ok(sessions)
    }

    /// 标记会话过期 (仅从 active 出发，终态不可再变)
    ///
    /// 返回 None 表示会话已不是 active (被并发关台/过期)。
    pub async fn mark_expired(
        &self,
        id: &RecordId,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<TableSessionRow>> {
        let updated: Vec<TableSessionRow> = self
            .base
            .db()
            .query(
                "UPDATE table_session SET status = 'expired', closed_at = $now \
                 WHERE id = $id AND status = 'active' RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("now", now))
            .await?
            .take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 结账关台 (仅从 active 出发)
    ///
    /// 返回 None 表示会话已不是 active，调用方据此报 Conflict。
    pub async fn close(
        &self,
        id: &RecordId,
        paid_amount: Decimal,
        now: DateTime<Utc>,
    ) -> RepoResult<Option<TableSessionRow>> {
        let updated: Vec<TableSessionRow> = self
            .base
            .db()
            .query(
                "UPDATE table_session \
                 SET status = 'closed', closed_at = $now, paid_amount = $paid_amount \
                 WHERE id = $id AND status = 'active' RETURN AFTER",
            )
            .bind(("id", id.clone()))
            .bind(("paid_amount", paid_amount))
            .bind(("now", now))
            .await?
            .take(0)?;
        Ok(updated.into_iter().next())
    }

    /// 重算后的订单级合计写回会话
    pub async fn set_total(
        &self,
        id: &RecordId,
        total_amount: Decimal,
    ) -> RepoResult<TableSessionRow> {
        let updated: Vec<TableSessionRow> = self
            .base
            .db()
            .query("UPDATE table_session SET total_amount = $total WHERE id = $id RETURN AFTER")
            .bind(("id", id.clone()))
            .bind(("total", total_amount))
            .await?
            .take(0)?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| RepoError::NotFound(format!("Session {} not found", id)))
    }

    /// 回溯开台时间 (测试过期路径用)
    #[doc(hidden)]
    pub async fn backdate_started_at(
        &self,
        id: &RecordId,
        started_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        self.base
            .db()
            .query("UPDATE table_session SET started_at = $started_at WHERE id = $id")
            .bind(("id", id.clone()))
            .bind(("started_at", started_at))
            .await?;
        Ok(())
    }
}
