use serde::{Deserialize, Serialize};

pub const TIMEOUT_REASON: &str = "TimeoutError";
pub const SHUTDOWN_REASON: &str = "PoolShutdown";
pub const ABANDONED_REASON: &str = "DispatchAbandoned";

/// 对话消息：`{"role": ..., "content": ...}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// 一次请求的最终结果：成功（文本 + 总 token 数）或失败原因，二者恰好其一。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LlmResponse {
    Success { content: String, tokens: i64 },
    Failure { error: String },
}

impl LlmResponse {
    pub fn success(content: impl Into<String>, tokens: i64) -> Self {
        Self::Success {
            content: content.into(),
            tokens,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            error: reason.into(),
        }
    }

    pub fn timeout() -> Self {
        Self::failure(TIMEOUT_REASON)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Success { content, .. } => Some(content),
            Self::Failure { .. } => None,
        }
    }

    pub fn tokens(&self) -> Option<i64> {
        match self {
            Self::Success { tokens, .. } => Some(*tokens),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}
