use crate::response::{LlmResponse, Message};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub messages: &'a [Message],
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenReply {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub total_tokens: i64,
}

/// 把 completion 端点的原始响应体转换为最终结果。
///
/// 缺少 `result`（包括无法解析的响应体）一律视为供应商错误，原始响应体作为失败原因。
pub fn parse_chat_reply(body: &[u8]) -> LlmResponse {
    match sonic_rs::from_slice::<ChatReply>(body) {
        Ok(ChatReply {
            result: Some(content),
            usage,
        }) => LlmResponse::success(content, usage.total_tokens),
        _ => LlmResponse::failure(String::from_utf8_lossy(body).into_owned()),
    }
}
