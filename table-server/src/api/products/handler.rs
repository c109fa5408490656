//! Product API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use crate::core::ServerState;
use crate::db::repository::{BaseRepository, ProductRepository};
use crate::utils::{AppError, AppResponse, AppResult, ok};
use shared::{Product, ProductCreate};

/// GET /api/products - 在售商品列表
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<AppResponse<Vec<Product>>>> {
    let repo = ProductRepository::new(state.db.db.clone());
    let products = repo
        .find_all()
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(ok(products.into_iter().map(Product::from).collect()))
}

/// GET /api/products/:id - 单个商品
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<AppResponse<Product>>> {
    let rid = BaseRepository::parse_id(&id)
        .map_err(|_| AppError::validation(format!("Invalid product ID: {}", id)))?;
    let repo = ProductRepository::new(state.db.db.clone());
    let product = repo
        .find_by_id(&rid)
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("Product {} not found", id)))?;
    Ok(ok(Product::from(product)))
}

/// POST /api/products - 创建商品 (员工端建目录用)
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ProductCreate>,
) -> AppResult<Json<AppResponse<Product>>> {
    payload.validate()?;
    let repo = ProductRepository::new(state.db.db.clone());
    let product = repo
        .create(payload)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(ok(Product::from(product)))
}
