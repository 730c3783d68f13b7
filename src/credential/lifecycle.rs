use crate::baidu::BaiduClient;
use crate::credential::types::Credential;
use crate::error::CredentialError;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// 一个账号的 access_token 缓存。只有所属 worker 及其派发任务会访问它。
///
/// 刷新时持有锁：同一 worker 的多个并发派发同时发现过期时，只会刷新一次。
#[derive(Debug)]
pub struct CredentialCell {
    name: String,
    api_key: String,
    secret_key: String,
    state: Mutex<Credential>,
    refreshes: AtomicU64,
}

impl CredentialCell {
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self::with_credential(name, api_key, secret_key, Credential::default())
    }

    pub fn with_credential(
        name: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            state: Mutex::new(credential),
            refreshes: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 返回可用的 access_token；缺失或超过 25 天时先向 token 端点刷新。
    pub async fn ensure_fresh(&self, client: &BaiduClient) -> Result<String, CredentialError> {
        let mut guard = self.state.lock().await;
        if let Some(token) = guard.token.as_ref()
            && !guard.is_stale()
        {
            return Ok(token.clone());
        }

        tracing::debug!(worker = %self.name, "刷新百度 access_token");
        let token = client
            .fetch_access_token(&self.api_key, &self.secret_key)
            .await?;
        *guard = Credential::new(token.clone(), Utc::now());
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        tracing::info!(worker = %self.name, "百度 access_token 已刷新");
        Ok(token)
    }

    /// 累计刷新次数。
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub async fn snapshot(&self) -> Credential {
        self.state.lock().await.clone()
    }
}
