//! Shared Cart Item Model (共享购物车条目)
//!
//! 购物车条目归属于一个会话，由某位客人创建。客人的名字和颜色在
//! 创建时拷贝到条目上 (历史快照)，之后改名不会重写已有条目。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::table_session::TableSession;

/// 条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// 刚加入购物车
    Pending,
    /// 员工已确认
    Verified,
    /// 已下厨
    SentToKitchen,
    /// 已取消，不计入合计
    Cancelled,
}

/// 加料 (自带价格)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartAddon {
    pub name: String,
    pub price: Decimal,
}

/// 规格选择 (携带价格修正，可为负)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartVariant {
    pub name: String,
    pub price_modifier: Decimal,
}

/// 商品摘要 - 水合 (join) 后附在条目上
///
/// 实时事件里不携带，订阅端收到 insert 后回查补全。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub price: Decimal,
}

/// 共享购物车条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedCartItem {
    pub id: String,
    pub table_session_id: String,
    pub product_id: String,
    /// 创建该条目的客人 (删除权限以此为准)
    pub guest_id: String,
    pub guest_name: String,
    pub guest_color: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub addons: Vec<CartAddon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<CartVariant>,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// join 的商品信息，仅水合读取时存在
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
}

impl SharedCartItem {
    /// 是否计入合计 (cancelled 条目排除)
    pub fn counts_toward_total(&self) -> bool {
        self.status != ItemStatus::Cancelled
    }

    /// 单价 = 商品价 + 规格修正 + 加料合计
    ///
    /// 未水合 (缺商品信息) 时返回 None。
    pub fn unit_price(&self) -> Option<Decimal> {
        let product = self.product.as_ref()?;
        Some(effective_unit_price(
            product.price,
            self.selected_variant.as_ref(),
            &self.addons,
        ))
    }

    /// 行合计 = 单价 × 数量
    pub fn line_total(&self) -> Option<Decimal> {
        Some(self.unit_price()? * Decimal::from(self.quantity))
    }
}

/// 有效单价计算 - 服务端和客户端共用同一份公式
pub fn effective_unit_price(
    product_price: Decimal,
    variant: Option<&CartVariant>,
    addons: &[CartAddon],
) -> Decimal {
    let variant_modifier = variant.map(|v| v.price_modifier).unwrap_or(Decimal::ZERO);
    let addon_total: Decimal = addons.iter().map(|a| a.price).sum();
    product_price + variant_modifier + addon_total
}

/// 购物车视图 - 合计永远从当前条目集重算，不信任任何缓存值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<SharedCartItem>,
    pub total: Decimal,
    /// 条目数量合计 (Σ quantity)
    pub item_count: u32,
}

impl CartView {
    /// 从水合条目列表构建视图
    pub fn from_items(items: Vec<SharedCartItem>) -> Self {
        let counted = items.iter().filter(|i| i.counts_toward_total());
        let total = counted
            .clone()
            .filter_map(|i| i.line_total())
            .sum::<Decimal>();
        let item_count = counted.map(|i| i.quantity).sum();
        Self {
            items,
            total,
            item_count,
        }
    }
}

/// 加入购物车请求
///
/// 服务端不合并同商品条目: 每次 add 都是独立的一行，
/// 两位客人点同一道菜保持两条可区分的记录。
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddCartItemRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(length(min = 1))]
    pub guest_id: String,
    #[validate(length(min = 1))]
    pub guest_name: String,
    pub guest_color: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub addons: Vec<CartAddon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_variant: Option<CartVariant>,
}

/// 数量修改请求 - quantity <= 0 等价于删除该条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

/// 数量修改响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuantityResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<SharedCartItem>,
    pub deleted: bool,
}

/// 提交购物车 (下厨) 响应 - 会话的订单级合计在此时重算
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitCartResponse {
    pub session: TableSession,
    pub items: Vec<SharedCartItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(quantity: u32, price: &str, status: ItemStatus) -> SharedCartItem {
        SharedCartItem {
            id: "cart_item:x".into(),
            table_session_id: "table_session:a".into(),
            product_id: "product:p".into(),
            guest_id: "g1".into(),
            guest_name: "Guest".into(),
            guest_color: "#EF4444".into(),
            quantity,
            notes: None,
            addons: vec![],
            selected_variant: None,
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            product: Some(ProductSummary {
                id: "product:p".into(),
                name: "Dish".into(),
                price: dec(price),
            }),
        }
    }

    #[test]
    fn test_effective_unit_price() {
        let variant = CartVariant {
            name: "Large".into(),
            price_modifier: dec("2.50"),
        };
        let addons = vec![
            CartAddon {
                name: "Cheese".into(),
                price: dec("1.00"),
            },
            CartAddon {
                name: "Bacon".into(),
                price: dec("1.50"),
            },
        ];
        assert_eq!(
            effective_unit_price(dec("10.00"), Some(&variant), &addons),
            dec("15.00")
        );
        assert_eq!(effective_unit_price(dec("10.00"), None, &[]), dec("10.00"));
    }

    #[test]
    fn test_line_total_multiplies_quantity() {
        let i = item(3, "4.20", ItemStatus::Pending);
        assert_eq!(i.line_total(), Some(dec("12.60")));
    }

    #[test]
    fn test_unhydrated_item_has_no_price() {
        let mut i = item(1, "4.20", ItemStatus::Pending);
        i.product = None;
        assert_eq!(i.unit_price(), None);
        assert_eq!(i.line_total(), None);
    }

    #[test]
    fn test_cart_view_excludes_cancelled() {
        let items = vec![
            item(2, "10.00", ItemStatus::Pending),
            item(1, "5.00", ItemStatus::SentToKitchen),
            item(4, "99.00", ItemStatus::Cancelled),
        ];
        let view = CartView::from_items(items);
        assert_eq!(view.total, dec("25.00"));
        assert_eq!(view.item_count, 3);
        // 原始条目列表仍包含 cancelled 行，仅合计排除
        assert_eq!(view.items.len(), 3);
    }
}
