//! Shared Cart API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::utils::{AppResponse, AppResult, ok, ok_with_message};
use shared::{
    AddCartItemRequest, CartView, SharedCartItem, SubmitCartResponse, UpdateQuantityRequest,
    UpdateQuantityResponse,
};

/// GET /api/cart/:session_id - 购物车视图 (水合 + 重算合计)
pub async fn get_cart(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<AppResponse<CartView>>> {
    let view = state.cart_service().get_cart(&session_id).await?;
    Ok(ok(view))
}

/// POST /api/cart/:session_id/items - 加入购物车
pub async fn add_item(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
    Json(payload): Json<AddCartItemRequest>,
) -> AppResult<Json<AppResponse<SharedCartItem>>> {
    let item = state.cart_service().add_item(&session_id, payload).await?;
    Ok(ok(item))
}

/// POST /api/cart/:session_id/submit - 提交下厨
pub async fn submit(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<AppResponse<SubmitCartResponse>>> {
    let response = state.cart_service().submit_to_kitchen(&session_id).await?;
    Ok(ok_with_message(response, "Cart submitted to kitchen"))
}

/// GET /api/cart/items/:id - 单条目水合读取
///
/// 订阅端收到 insert 事件 (裸行) 后回查此接口补全商品信息。
pub async fn get_item(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<SharedCartItem>>> {
    let item = state.cart_service().get_item(&id).await?;
    Ok(ok(item))
}

/// PATCH /api/cart/items/:id - 修改数量 (quantity <= 0 删除)
pub async fn update_quantity(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> AppResult<Json<AppResponse<UpdateQuantityResponse>>> {
    let response = state
        .cart_service()
        .update_quantity(&id, payload.quantity)
        .await?;
    Ok(ok(response))
}

#[derive(Debug, Deserialize)]
pub struct RemoveQuery {
    /// 请求方客人 id - 必填，归属校验的输入
    pub guest_id: String,
}

/// DELETE /api/cart/items/:id?guest_id=.. - 删除条目
///
/// 缺 guest_id 直接 400，归属校验没有省略路径。
pub async fn remove_item(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> AppResult<Json<AppResponse<bool>>> {
    state
        .cart_service()
        .remove_item(&id, &query.guest_id)
        .await?;
    Ok(ok(true))
}
