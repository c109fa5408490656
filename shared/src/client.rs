//! 客户端侧的 API 响应封装
//!
//! 服务端所有接口都返回统一的 `{code, message, data}` 信封，
//! `code = "E0000"` 表示成功。

use serde::{Deserialize, Serialize};

/// 成功码
pub const SUCCESS_CODE: &str = "E0000";

/// API 响应信封
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: String,
    pub message: String,
    // 路径形式的 default 不给 T 加 Default 约束
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// 取出 data，失败时返回服务端的错误码和消息
    pub fn into_data(self) -> Result<T, (String, String)> {
        if self.is_success() {
            if let Some(data) = self.data {
                return Ok(data);
            }
        }
        Err((self.code, self.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_data() {
        let ok: ApiResponse<u32> = serde_json::from_str(
            r#"{"code":"E0000","message":"Success","data":7}"#,
        )
        .unwrap();
        assert_eq!(ok.into_data().unwrap(), 7);

        let err: ApiResponse<u32> =
            serde_json::from_str(r#"{"code":"E0003","message":"Resource not found: x"}"#).unwrap();
        let (code, _) = err.into_data().unwrap_err();
        assert_eq!(code, "E0003");
    }

    #[test]
    fn test_deserializes_without_default_payload() {
        // data 类型没有 Default 实现也能反序列化缺失的 data 字段
        #[derive(Debug, Deserialize)]
        struct Payload {
            #[allow(dead_code)]
            name: String,
        }

        let missing: ApiResponse<Payload> =
            serde_json::from_str(r#"{"code":"E0004","message":"Conflict"}"#).unwrap();
        assert!(missing.data.is_none());

        let present: ApiResponse<Payload> = serde_json::from_str(
            r#"{"code":"E0000","message":"Success","data":{"name":"ramen"}}"#,
        )
        .unwrap();
        assert_eq!(present.into_data().unwrap().name, "ramen");
    }
}
