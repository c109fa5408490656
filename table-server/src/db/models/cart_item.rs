//! Cart Item Row Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{CartAddon, CartVariant, ItemStatus, ProductSummary, SharedCartItem};
use surrealdb::RecordId;

use super::serde_helpers;

/// 购物车条目行 (数据库实体)
///
/// 客人名字和颜色在创建时拷贝到行上，之后不跟随客人改名 (历史快照)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemRow {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 所属会话 (record link)
    #[serde(with = "serde_helpers::record_id")]
    pub table_session_id: RecordId,
    /// 商品 (record link)
    #[serde(with = "serde_helpers::record_id")]
    pub product_id: RecordId,
    pub guest_id: String,
    pub guest_name: String,
    pub guest_color: String,
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub addons: Vec<CartAddon>,
    #[serde(default)]
    pub selected_variant: Option<CartVariant>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItemRow {
    /// 转成 API 模型，`product` 为 join 的商品摘要 (裸行传 None)
    pub fn into_shared(self, product: Option<ProductSummary>) -> SharedCartItem {
        SharedCartItem {
            id: self.id.map(|t| t.to_string()).unwrap_or_default(),
            table_session_id: self.table_session_id.to_string(),
            product_id: self.product_id.to_string(),
            guest_id: self.guest_id,
            guest_name: self.guest_name,
            guest_color: self.guest_color,
            quantity: self.quantity,
            notes: self.notes,
            addons: self.addons,
            selected_variant: self.selected_variant,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            product,
        }
    }
}
