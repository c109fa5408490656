//! HTTP client for the table server API

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::controller::CartApi;
use crate::{ClientConfig, ClientError, ClientResult};
use shared::{
    AddCartItemRequest, ApiResponse, CartView, CloseSessionRequest, CloseSessionResponse,
    OpenSessionRequest, OpenSessionResponse, Product, SessionWithItems, SharedCartItem,
    SubmitCartResponse, UpdateQuantityRequest, UpdateQuantityResponse, ValidateSessionRequest,
    ValidateSessionResponse,
};

/// 开台结果 - 409 不是失败: 服务端会附上现存会话
#[derive(Debug)]
pub enum OpenResult {
    Opened(OpenSessionResponse),
    /// 桌台已被占用，携带现存会话
    Occupied(OpenSessionResponse),
}

/// HTTP client for making network requests to the table server
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request without body
    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Make a PATCH request with JSON body
    async fn patch<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self.client.patch(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Make a DELETE request
    async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let response = self.client.delete(self.url(path)).send().await?;
        Self::handle_response(response).await
    }

    /// Unwrap the `{code, message, data}` envelope, mapping HTTP errors
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return Err(Self::map_error(status, &text));
        }

        let envelope: ApiResponse<T> = response.json().await?;
        envelope
            .into_data()
            .map_err(|(code, message)| ClientError::InvalidResponse(format!("{}: {}", code, message)))
    }

    fn map_error(status: StatusCode, body: &str) -> ClientError {
        // 错误体也是信封格式，取 message；解析失败退回原始文本
        let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
            .map(|e| e.message)
            .unwrap_or_else(|_| body.to_string());
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::GONE => ClientError::Expired(message),
            StatusCode::CONFLICT => ClientError::Conflict(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            StatusCode::BAD_REQUEST => ClientError::Validation(message),
            _ => ClientError::Internal(message),
        }
    }

    // ========== Session API ==========

    /// 开台 - 409 解析为 [`OpenResult::Occupied`]
    pub async fn open_session(&self, request: &OpenSessionRequest) -> ClientResult<OpenResult> {
        let response = self
            .client
            .post(self.url("/api/sessions/open"))
            .json(request)
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::CONFLICT {
            let envelope: ApiResponse<OpenSessionResponse> = response.json().await?;
            return match envelope.data {
                Some(existing) => Ok(OpenResult::Occupied(existing)),
                None => Err(ClientError::Conflict(envelope.message)),
            };
        }
        if !status.is_success() {
            let text = response.text().await?;
            return Err(Self::map_error(status, &text));
        }
        let envelope: ApiResponse<OpenSessionResponse> = response.json().await?;
        envelope
            .into_data()
            .map(OpenResult::Opened)
            .map_err(|(code, message)| ClientError::InvalidResponse(format!("{}: {}", code, message)))
    }

    /// 扫码端会话校验 (永远 200, 看 `valid` 字段)
    pub async fn validate_session(
        &self,
        request: &ValidateSessionRequest,
    ) -> ClientResult<ValidateSessionResponse> {
        self.post("/api/sessions/validate", request).await
    }

    /// 结账关台
    pub async fn close_session(
        &self,
        session_id: &str,
        request: &CloseSessionRequest,
    ) -> ClientResult<CloseSessionResponse> {
        self.post(&format!("/api/sessions/{}/close", session_id), request)
            .await
    }

    /// 活跃会话列表 (员工端)
    pub async fn list_sessions(
        &self,
        restaurant_id: &str,
        include_items: bool,
    ) -> ClientResult<Vec<SessionWithItems>> {
        self.get(&format!(
            "/api/sessions?restaurant_id={}&include_items={}",
            restaurant_id, include_items
        ))
        .await
    }

    // ========== Product API ==========

    /// 在售商品列表
    pub async fn products(&self) -> ClientResult<Vec<Product>> {
        self.get("/api/products").await
    }

    // ========== Cart API ==========

    /// 提交下厨
    pub async fn submit_cart(&self, session_id: &str) -> ClientResult<SubmitCartResponse> {
        self.post_empty(&format!("/api/cart/{}/submit", session_id))
            .await
    }
}

#[async_trait::async_trait]
impl CartApi for HttpClient {
    async fn fetch_cart(&self, session_id: &str) -> ClientResult<CartView> {
        self.get(&format!("/api/cart/{}", session_id)).await
    }

    async fn fetch_item(&self, item_id: &str) -> ClientResult<SharedCartItem> {
        self.get(&format!("/api/cart/items/{}", item_id)).await
    }

    async fn add_item(
        &self,
        session_id: &str,
        request: AddCartItemRequest,
    ) -> ClientResult<SharedCartItem> {
        self.post(&format!("/api/cart/{}/items", session_id), &request)
            .await
    }

    async fn update_quantity(
        &self,
        item_id: &str,
        quantity: i64,
    ) -> ClientResult<UpdateQuantityResponse> {
        self.patch(
            &format!("/api/cart/items/{}", item_id),
            &UpdateQuantityRequest { quantity },
        )
        .await
    }

    async fn remove_item(&self, item_id: &str, guest_id: &str) -> ClientResult<bool> {
        self.delete(&format!("/api/cart/items/{}?guest_id={}", item_id, guest_id))
            .await
    }
}
