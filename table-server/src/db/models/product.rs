//! Product Row Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{Product, ProductSummary};
use surrealdb::RecordId;

use super::serde_helpers;

/// 商品行 (数据库实体)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRow {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl ProductRow {
    /// join 用的商品摘要
    pub fn summary(&self) -> ProductSummary {
        ProductSummary {
            id: self.id.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            name: self.name.clone(),
            price: self.price,
        }
    }
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id.map(|t| t.to_string()).unwrap_or_default(),
            name: row.name,
            price: row.price,
            is_active: row.is_active,
        }
    }
}
