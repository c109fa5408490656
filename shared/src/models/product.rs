//! Product Model
//!
//! 购物车定价所需的最小商品目录。价格真值只存在商品表里，
//! 实时事件不拷贝价格，订阅端回查水合。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 商品
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// 创建商品
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductCreate {
    #[validate(length(min = 1))]
    pub name: String,
    pub price: Decimal,
}
