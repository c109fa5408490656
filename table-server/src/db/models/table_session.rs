//! Table Session Row Model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{SessionStatus, TableSession};
use surrealdb::RecordId;

use super::serde_helpers;

/// 桌台会话行 (数据库实体)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSessionRow {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub restaurant_id: String,
    pub table_number: u32,
    pub session_token: String,
    pub guest_count: u32,
    pub status: SessionStatus,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<TableSessionRow> for TableSession {
    fn from(row: TableSessionRow) -> Self {
        TableSession {
            id: row.id.map(|t| t.to_string()).unwrap_or_default(),
            restaurant_id: row.restaurant_id,
            table_number: row.table_number,
            session_token: row.session_token,
            guest_count: row.guest_count,
            status: row.status,
            total_amount: row.total_amount,
            paid_amount: row.paid_amount,
            started_at: row.started_at,
            closed_at: row.closed_at,
        }
    }
}
