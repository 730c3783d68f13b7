use thiserror::Error;

/// 配置加载/校验错误：在任何网络 I/O 之前暴露。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置错误: {0}")]
    Invalid(String),

    #[error("读取配置失败: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Load(Box::new(e))
    }
}

/// token 端点错误：对当次派发是致命的，不重试、不降级。
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token 端点 HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("token 响应过大（超过 {limit} bytes）")]
    BodyTooLarge { limit: usize },

    #[error("token 响应缺少 access_token: {0}")]
    MissingToken(String),

    #[error("token 端点不可达: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token 响应解析失败: {0}")]
    Json(#[from] sonic_rs::Error),
}

/// 单次派发（dispatch unit）的失败原因。
///
/// 供应商返回的业务错误（缺少 `result`）不在这里：它被转换为 `LlmResponse::Failure`。
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("completion 端点不可达: {0}")]
    Transport(#[from] reqwest::Error),
}

/// 工作池启动错误。
#[derive(Debug, Error)]
pub enum PoolError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("账号 {worker} 初始化 token 失败: {source}")]
    Prime {
        worker: String,
        #[source]
        source: CredentialError,
    },

    #[error("构建 HTTP client 失败: {0}")]
    Http(#[from] reqwest::Error),
}

impl PoolError {
    pub fn prime(worker: impl Into<String>, source: CredentialError) -> Self {
        Self::Prime {
            worker: worker.into(),
            source,
        }
    }
}
