//! 会话生命周期管理
//!
//! 开台 → 校验 (惰性过期) → 结账/过期，状态迁移单向：
//!
//! ```text
//! (open) ──▶ active ──▶ closed   (员工结账)
//!                 └───▶ expired  (超时: 校验路径惰性触发，或后台清扫)
//! ```
//!
//! 同一餐厅同一桌号同时最多一个 active 会话，由仓储层的
//! 原子条件插入保证；并发开台竞态的输家拿回赢家的会话，
//! 没有任何客人可见状态丢失。

mod sweeper;

pub use sweeper::spawn_expiry_sweeper;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tracing::{info, warn};

use crate::db::repository::{RepoError, TableSessionRepository};
use crate::realtime::{RealtimeChannel, SessionVersions};
use crate::utils::{AppError, AppResult};
use shared::{ChangeAction, ChangeEvent, ChangeResource, TableSession};

/// 开台结果
#[derive(Debug)]
pub enum OpenOutcome {
    /// 开台成功，新会话
    Opened(TableSession),
    /// 桌台已被占用 - 返回已存在的 active 会话 (无破坏性动作)
    Occupied(TableSession),
}

/// 会话生命周期管理器
#[derive(Clone)]
pub struct SessionManager {
    repo: TableSessionRepository,
    channel: RealtimeChannel,
    versions: Arc<SessionVersions>,
    ttl: Duration,
    public_base_url: String,
}

impl SessionManager {
    pub fn new(
        db: Surreal<Db>,
        channel: RealtimeChannel,
        versions: Arc<SessionVersions>,
        ttl: Duration,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            repo: TableSessionRepository::new(db),
            channel,
            versions,
            ttl,
            public_base_url: public_base_url.into(),
        }
    }

    /// 生成不可猜测的会话令牌 (32 随机字节, hex)
    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        hex::encode(bytes)
    }

    /// 顾客扫码地址 (编码桌号和令牌)
    pub fn qr_url_for(&self, session: &TableSession) -> String {
        format!(
            "{}/r/{}/order?table={}&token={}",
            self.public_base_url.trim_end_matches('/'),
            session.restaurant_id,
            session.table_number,
            session.session_token,
        )
    }

    /// 开台
    ///
    /// 桌台已有 active 会话时不做任何破坏性动作，返回
    /// [`OpenOutcome::Occupied`] 携带现存会话 - 调用方必须先关台再重开。
    pub async fn open(
        &self,
        restaurant_id: &str,
        table_number: u32,
        guest_count: u32,
    ) -> AppResult<OpenOutcome> {
        let token = Self::generate_token();
        let mut attempts = 0;
        let created = loop {
            let result = self
                .repo
                .create_active(restaurant_id, table_number, guest_count, &token, Utc::now())
                .await;
            // 嵌入式引擎下并发事务可能以读写冲突失败而不是 THROW，重试让
            // 输家走到 occupied 分支
            match result {
                Err(RepoError::Database(msg)) if attempts < 3 && msg.contains("conflict") => {
                    attempts += 1;
                }
                other => break other,
            }
        };
        match created {
            Ok(row) => {
                let session = TableSession::from(row);
                info!(
                    session_id = %session.id,
                    restaurant_id,
                    table_number,
                    guest_count,
                    "Table session opened"
                );
                Ok(OpenOutcome::Opened(session))
            }
            Err(RepoError::Duplicate(_)) => {
                // 竞态的输家取回赢家的会话
                let existing = self
                    .repo
                    .find_active(Some(restaurant_id), table_number)
                    .await
                    .map_err(|e| AppError::database(e.to_string()))?;
                match existing {
                    Some(row) => {
                        warn!(
                            restaurant_id,
                            table_number, "桌台已被占用，返回现存会话"
                        );
                        Ok(OpenOutcome::Occupied(TableSession::from(row)))
                    }
                    // 极小窗口: 赢家的会话在取回前刚好被关闭
                    None => Err(AppError::conflict(format!(
                        "Table {} was busy, please retry",
                        table_number
                    ))),
                }
            }
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// 校验会话 (顾客端每次进入页面 / 下单前调用)
    ///
    /// 依次检查：
    /// 1. 存在性: 无 active 会话 → NotFound
    /// 2. 过期: 超过 TTL → 惰性标记 expired 并广播，然后报 Expired
    /// 3. 令牌: 传了令牌但不匹配 → Forbidden (不带令牌为宽松模式)
    pub async fn validate(
        &self,
        table_number: u32,
        session_token: Option<&str>,
        restaurant_id: Option<&str>,
    ) -> AppResult<TableSession> {
        let row = self
            .repo
            .find_active(restaurant_id, table_number)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "No active session for table {}. Ask staff to open your table.",
                    table_number
                ))
            })?;

        let now = Utc::now();
        if now - row.started_at > self.ttl {
            // 惰性过期: 校验这次读操作的副作用就是状态迁移
            let session_id = row.id.clone();
            if let Some(id) = session_id {
                let expired = self
                    .repo
                    .mark_expired(&id, now)
                    .await
                    .map_err(|e| AppError::database(e.to_string()))?;
                if let Some(expired_row) = expired {
                    let session = TableSession::from(expired_row);
                    info!(session_id = %session.id, table_number, "Session lazily expired");
                    self.broadcast_session(&session, ChangeAction::Expired);
                }
            }
            return Err(AppError::expired(format!(
                "Session for table {} has expired",
                table_number
            )));
        }

        if let Some(token) = session_token
            && token != row.session_token
        {
            return Err(AppError::forbidden("Session token mismatch"));
        }

        Ok(TableSession::from(row))
    }

    /// 结账关台
    ///
    /// 只有 active 会话可以关闭；重复关台报 Conflict，不会静默成功。
    /// `paid_amount` 缺省取会话当前的 total_amount。
    pub async fn close(
        &self,
        session_id: &str,
        paid_amount: Option<Decimal>,
    ) -> AppResult<TableSession> {
        let id = TableSessionRepository::parse_session_id(session_id)?;
        let row = self
            .repo
            .find_by_id(&id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            .ok_or_else(|| AppError::not_found(format!("Session {} not found", session_id)))?;

        if row.status.is_terminal() {
            return Err(AppError::conflict(format!(
                "Session {} is already {}",
                session_id, row.status
            )));
        }

        let paid = paid_amount.unwrap_or(row.total_amount);
        let closed = self
            .repo
            .close(&id, paid, Utc::now())
            .await
            .map_err(|e| AppError::database(e.to_string()))?
            // 并发关台: 这次更新没抢到 active 状态
            .ok_or_else(|| {
                AppError::conflict(format!("Session {} is already closed", session_id))
            })?;

        let session = TableSession::from(closed);
        info!(
            session_id = %session.id,
            paid_amount = %session.paid_amount,
            "Table session closed"
        );
        self.broadcast_session(&session, ChangeAction::Closed);
        Ok(session)
    }

    /// 某餐厅的 active 会话列表
    pub async fn list_active(&self, restaurant_id: &str) -> AppResult<Vec<TableSession>> {
        let rows = self
            .repo
            .list_active(restaurant_id)
            .await
            .map_err(|e| AppError::database(e.to_string()))?;
        Ok(rows.into_iter().map(TableSession::from).collect())
    }

    /// 后台清扫: 将超过 TTL 的 active 会话标记为 expired
    ///
    /// 惰性过期保证正确性，清扫保证 "active 会话列表" 不长期残留僵尸行。
    pub async fn sweep_expired(&self) -> AppResult<usize> {
        let now = Utc::now();
        let rows = self
            .repo
            .list_all_active()
            .await
            .map_err(|e| AppError::database(e.to_string()))?;

        let mut count = 0;
        for row in rows {
            if now - row.started_at <= self.ttl {
                continue;
            }
            let Some(id) = row.id.clone() else { continue };
            let expired = self
                .repo
                .mark_expired(&id, now)
                .await
                .map_err(|e| AppError::database(e.to_string()))?;
            if let Some(expired_row) = expired {
                let session = TableSession::from(expired_row);
                self.broadcast_session(&session, ChangeAction::Expired);
                count += 1;
            }
        }
        Ok(count)
    }

    fn broadcast_session(&self, session: &TableSession, action: ChangeAction) {
        let event = ChangeEvent::new(
            session.id.clone(),
            ChangeResource::TableSession,
            action,
            session.id.clone(),
            serde_json::to_value(session).ok(),
        );
        let version = self.versions.increment(&event.session_id);
        self.channel.publish(event.with_version(version));
    }
}

impl TableSessionRepository {
    /// 解析会话 id，失败报 Validation
    pub fn parse_session_id(id: &str) -> AppResult<surrealdb::RecordId> {
        id.parse()
            .map_err(|_| AppError::validation(format!("Invalid session ID: {}", id)))
    }
}
