//! Table Session API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::sessions::OpenOutcome;
use crate::utils::{AppError, AppResponse, AppResult, ok, ok_with_message};
use shared::{
    CloseSessionRequest, CloseSessionResponse, OpenSessionRequest, OpenSessionResponse,
    SessionWithItems, ValidateSessionRequest, ValidateSessionResponse,
};

/// POST /api/sessions/open - 开台
///
/// 桌台已被占用时返回 409，`data` 携带现存会话方便员工端
/// 直接展示 "去结账" 路径，不做任何破坏性动作。
pub async fn open(
    State(state): State<ServerState>,
    Json(payload): Json<OpenSessionRequest>,
) -> AppResult<Response> {
    payload.validate()?;
    let manager = state.session_manager();
    let outcome = manager
        .open(&payload.restaurant_id, payload.table_number, payload.guest_count)
        .await?;

    match outcome {
        OpenOutcome::Opened(session) => {
            let qr_url = manager.qr_url_for(&session);
            Ok(ok(OpenSessionResponse { session, qr_url }).into_response())
        }
        OpenOutcome::Occupied(existing) => {
            let qr_url = manager.qr_url_for(&existing);
            let body = Json(AppResponse {
                code: "E0004".to_string(),
                message: format!(
                    "Table {} already has an active session",
                    existing.table_number
                ),
                data: Some(OpenSessionResponse {
                    session: existing,
                    qr_url,
                }),
            });
            Ok((StatusCode::CONFLICT, body).into_response())
        }
    }
}

/// POST /api/sessions/validate - 扫码端会话校验
///
/// 永远返回 200: 校验失败是正常业务结果，不是错误。
/// `error` 字段区分 not_found / expired / token_mismatch。
pub async fn validate(
    State(state): State<ServerState>,
    Json(payload): Json<ValidateSessionRequest>,
) -> AppResult<Json<AppResponse<ValidateSessionResponse>>> {
    let manager = state.session_manager();
    let result = manager
        .validate(
            payload.table_number,
            payload.session_token.as_deref(),
            payload.restaurant_id.as_deref(),
        )
        .await;

    let response = match result {
        Ok(session) => ValidateSessionResponse::valid(session),
        Err(AppError::NotFound(_)) => ValidateSessionResponse::invalid("not_found"),
        Err(AppError::Expired(_)) => ValidateSessionResponse::invalid("expired"),
        Err(AppError::Forbidden(_)) => ValidateSessionResponse::invalid("token_mismatch"),
        Err(e) => return Err(e),
    };
    Ok(ok(response))
}

/// POST /api/sessions/:id/close - 结账关台
pub async fn close(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    payload: Option<Json<CloseSessionRequest>>,
) -> AppResult<Json<AppResponse<CloseSessionResponse>>> {
    let paid_amount = payload.and_then(|Json(p)| p.paid_amount);
    let session = state.session_manager().close(&id, paid_amount).await?;
    let message = format!("Table {} closed", session.table_number);
    Ok(ok_with_message(
        CloseSessionResponse {
            session,
            message: message.clone(),
        },
        message,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub restaurant_id: String,
    /// 是否附带各会话的购物车条目
    #[serde(default)]
    pub include_items: bool,
}

/// GET /api/sessions?restaurant_id=..&include_items=true - 活跃会话列表
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<SessionWithItems>>>> {
    let sessions = state
        .session_manager()
        .list_active(&query.restaurant_id)
        .await?;

    let mut result = Vec::with_capacity(sessions.len());
    if query.include_items {
        let cart = state.cart_service();
        for session in sessions {
            let view = cart.get_cart(&session.id).await?;
            result.push(SessionWithItems {
                session,
                items: view.items,
            });
        }
    } else {
        result.extend(sessions.into_iter().map(|session| SessionWithItems {
            session,
            items: vec![],
        }));
    }
    Ok(ok(result))
}
