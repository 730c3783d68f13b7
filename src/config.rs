use crate::error::ConfigError;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "wenxin-hub.toml";
const CONFIG_PATH_ENV: &str = "WENXIN_HUB_CONFIG";
const ENV_PREFIX: &str = "WENXIN_HUB_";

pub const DEFAULT_TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
pub const DEFAULT_COMPLETION_URL: &str =
    "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/completions_pro";

const DEFAULT_HTTP_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_USER_AGENT: &str = "wenxin-hub/0.1";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_BACKOFF_MS: u64 = 300;
pub const DEFAULT_MAX_CALLS_PER_SECOND: u32 = 2;
const DEFAULT_MAX_INFLIGHT: usize = 64;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// 配置文件里的占位账号名，建池时跳过。
pub const PLACEHOLDER_ACCOUNT_NAME: &str = "未知用户";

#[derive(Debug, Clone)]
pub struct Config {
    pub debug: String,
    pub http: HttpConfig,
    pub endpoints: Endpoints,
    pub pool: PoolConfig,
    pub accounts: Vec<Account>,
    pub prompts: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub proxy: String,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct Endpoints {
    pub token_url: String,
    pub completion_url: String,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub request_timeout_ms: u64,
    pub backoff_ms: u64,
    pub max_calls_per_second: u32,
    pub max_inflight: usize,
    pub shutdown_timeout_ms: u64,
}

impl PoolConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// 供应商账号。`provider` 字段作为标签，新增供应商时必须在这里显式加变体。
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum Account {
    Baidu(BaiduAccount),
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaiduAccount {
    pub name: String,
    pub api_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub max_calls_per_second: Option<u32>,
}

impl Account {
    pub fn name(&self) -> &str {
        match self {
            Self::Baidu(a) => &a.name,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name().trim() == PLACEHOLDER_ACCOUNT_NAME
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Baidu(a) => {
                if a.name.trim().is_empty() {
                    return Err(ConfigError::invalid("baidu 账号缺少 name"));
                }
                if a.api_key.trim().is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "baidu 账号 {} 的 api_key 不能为空",
                        a.name
                    )));
                }
                if a.secret_key.trim().is_empty() {
                    return Err(ConfigError::invalid(format!(
                        "baidu 账号 {} 的 secret_key 不能为空",
                        a.name
                    )));
                }
                if a.max_calls_per_second == Some(0) {
                    return Err(ConfigError::invalid(format!(
                        "baidu 账号 {} 的 max_calls_per_second 必须大于 0",
                        a.name
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    debug: Option<String>,
    http: RawHttp,
    endpoints: RawEndpoints,
    pool: RawPool,
    accounts: Vec<Account>,
    prompts: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawHttp {
    timeout_ms: Option<u64>,
    proxy: Option<String>,
    user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEndpoints {
    token_url: Option<String>,
    completion_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPool {
    request_timeout_ms: Option<u64>,
    backoff_ms: Option<u64>,
    max_calls_per_second: Option<u32>,
    max_inflight: Option<usize>,
    shutdown_timeout_ms: Option<u64>,
}

impl Config {
    /// 依次合并：配置文件（wenxin-hub.toml）、`WENXIN_HUB_` 前缀环境变量（嵌套键用 `__` 分隔）。
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = find_config_path() {
            tracing::debug!("加载配置文件: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Self::from_figment(Figment::from(Toml::string(toml)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let raw = figment.extract::<RawConfig>()?;

        let cfg = Self {
            debug: raw.debug.unwrap_or_else(|| "off".to_string()),
            http: HttpConfig {
                timeout_ms: raw.http.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS),
                proxy: raw.http.proxy.unwrap_or_default(),
                user_agent: raw
                    .http
                    .user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            },
            endpoints: Endpoints {
                token_url: raw
                    .endpoints
                    .token_url
                    .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
                completion_url: raw
                    .endpoints
                    .completion_url
                    .unwrap_or_else(|| DEFAULT_COMPLETION_URL.to_string()),
            },
            pool: PoolConfig {
                request_timeout_ms: raw
                    .pool
                    .request_timeout_ms
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
                backoff_ms: raw.pool.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS),
                max_calls_per_second: raw
                    .pool
                    .max_calls_per_second
                    .unwrap_or(DEFAULT_MAX_CALLS_PER_SECOND),
                max_inflight: raw.pool.max_inflight.unwrap_or(DEFAULT_MAX_INFLIGHT),
                shutdown_timeout_ms: raw
                    .pool
                    .shutdown_timeout_ms
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS),
            },
            accounts: raw.accounts,
            prompts: raw.prompts,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.request_timeout_ms == 0 {
            return Err(ConfigError::invalid("pool.request_timeout_ms 必须大于 0"));
        }
        if self.pool.max_calls_per_second == 0 {
            return Err(ConfigError::invalid("pool.max_calls_per_second 必须大于 0"));
        }
        if self.pool.backoff_ms == 0 {
            return Err(ConfigError::invalid("pool.backoff_ms 必须大于 0"));
        }
        if self.pool.max_inflight == 0 {
            return Err(ConfigError::invalid("pool.max_inflight 必须大于 0"));
        }
        for url in [&self.endpoints.token_url, &self.endpoints.completion_url] {
            reqwest::Url::parse(url)
                .map_err(|e| ConfigError::invalid(format!("端点 URL 无效 {url}: {e}")))?;
        }
        // 占位账号建池时会被跳过，未填写的 key 不算错误。
        for account in self.accounts.iter().filter(|a| !a.is_placeholder()) {
            account.validate()?;
        }
        Ok(())
    }

    pub fn log_level(&self) -> crate::logging::LogLevel {
        crate::logging::LogLevel::parse(&self.debug)
    }
}

fn find_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        let explicit = explicit.trim();
        if !explicit.is_empty() {
            return Some(PathBuf::from(explicit));
        }
    }

    let cwd = std::env::current_dir().ok()?;
    let mut dir: &Path = cwd.as_path();

    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }

        // 不跨越仓库根目录。
        if dir.join("Cargo.toml").is_file() || dir.join(".git").is_dir() {
            return None;
        }

        let parent = dir.parent()?;
        if parent == dir {
            return None;
        }
        dir = parent;
    }
}
