use crate::baidu::types::{ChatRequest, TokenReply, parse_chat_reply};
use crate::config::Config;
use crate::error::{ConfigError, CredentialError, PoolError};
use crate::logging::{self, LogLevel};
use crate::response::{LlmResponse, Message};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use std::time::{Duration, Instant};
use tracing::{error, info};

const MAX_TOKEN_BODY_BYTES: usize = 1 << 20;

/// 所有 worker 共享的百度 HTTP client（连接池复用）。
#[derive(Debug, Clone)]
pub struct BaiduClient {
    http: reqwest::Client,
    token_url: reqwest::Url,
    completion_url: reqwest::Url,
    user_agent: String,
    log_level: LogLevel,
}

impl BaiduClient {
    pub fn new(cfg: &Config) -> Result<Self, PoolError> {
        let token_url = parse_url(&cfg.endpoints.token_url)?;
        let completion_url = parse_url(&cfg.endpoints.completion_url)?;

        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .http1_only();

        if cfg.http.timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(cfg.http.timeout_ms));
        }

        if !cfg.http.proxy.trim().is_empty() {
            builder = builder.proxy(reqwest::Proxy::all(cfg.http.proxy.trim())?);
        }

        Ok(Self {
            http: builder.build()?,
            token_url,
            completion_url,
            user_agent: cfg.http.user_agent.clone(),
            log_level: cfg.log_level(),
        })
    }

    /// client_credentials 换取 access_token。
    pub async fn fetch_access_token(
        &self,
        api_key: &str,
        secret_key: &str,
    ) -> Result<String, CredentialError> {
        // 百度同样接受这三个字段作为 query 参数；这里走 form 请求体，secret 不进 URL。
        let resp = self
            .http
            .post(self.token_url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", api_key),
                ("client_secret", secret_key),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = read_capped(resp, MAX_TOKEN_BODY_BYTES).await?;

        if !status.is_success() {
            return Err(CredentialError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let reply = sonic_rs::from_slice::<TokenReply>(&body)?;
        match reply.access_token {
            Some(token) if !token.trim().is_empty() => {
                tracing::debug!(expires_in = ?reply.expires_in, "获取 access_token 成功");
                Ok(token)
            }
            _ => Err(CredentialError::MissingToken(
                String::from_utf8_lossy(&body).into_owned(),
            )),
        }
    }

    /// 调用 chat completions。供应商业务错误（缺少 `result`）以 `LlmResponse::Failure` 返回；
    /// 只有传输层失败才返回 `Err`。
    pub async fn chat(
        &self,
        worker: &str,
        access_token: &str,
        messages: &[Message],
    ) -> Result<LlmResponse, reqwest::Error> {
        let mut url = self.completion_url.clone();
        url.query_pairs_mut()
            .append_pair("access_token", access_token);

        let body = match sonic_rs::to_vec(&ChatRequest { messages }) {
            Ok(b) => b,
            Err(e) => return Ok(LlmResponse::failure(format!("序列化请求失败: {e}"))),
        };
        logging::backend_request(self.log_level, worker, url.as_str(), &body);

        let start = Instant::now();
        let resp = self
            .http
            .post(url)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        let elapsed = start.elapsed();
        logging::backend_response(self.log_level, worker, status.as_u16(), elapsed, &bytes);

        let reply = parse_chat_reply(&bytes);
        match &reply {
            LlmResponse::Failure { error: raw } => {
                error!(worker, status = status.as_u16(), "百度返回错误: {raw}");
            }
            LlmResponse::Success { tokens, .. } if self.log_level.summary_enabled() => {
                info!(
                    worker,
                    tokens,
                    elapsed_ms = logging::format_duration_ms(elapsed),
                    "百度响应成功"
                );
            }
            LlmResponse::Success { .. } => {}
        }
        Ok(reply)
    }
}

/// 边读边检查长度，超过 `limit` 立即放弃，不把整个响应体读进内存。
async fn read_capped(
    mut resp: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, CredentialError> {
    if resp
        .content_length()
        .is_some_and(|len| len > limit as u64)
    {
        return Err(CredentialError::BodyTooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(CredentialError::BodyTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn parse_url(raw: &str) -> Result<reqwest::Url, PoolError> {
    reqwest::Url::parse(raw)
        .map_err(|e| PoolError::Config(ConfigError::invalid(format!("端点 URL 无效 {raw}: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> BaiduClient {
        let cfg = Config::from_toml_str(&format!(
            "[endpoints]\ntoken_url = \"{}\"\ncompletion_url = \"{}\"\n",
            server.url("/oauth/2.0/token"),
            server.url("/chat"),
        ))
        .unwrap();
        BaiduClient::new(&cfg).unwrap()
    }

    #[tokio::test]
    async fn oversized_token_body_is_rejected() {
        let server = MockServer::start_async().await;
        let huge = format!(
            r#"{{"access_token":"tok","padding":"{}"}}"#,
            "x".repeat(MAX_TOKEN_BODY_BYTES)
        );
        server
            .mock_async(|when, then| {
                when.method(POST).path("/oauth/2.0/token");
                then.status(200).body(huge);
            })
            .await;

        let err = client_for(&server)
            .fetch_access_token("ak", "sk")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CredentialError::BodyTooLarge { limit } if limit == MAX_TOKEN_BODY_BYTES
        ));
    }

    #[tokio::test]
    async fn token_body_within_limit_is_parsed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/2.0/token")
                    .body_includes("grant_type=client_credentials");
                then.status(200).body(r#"{"access_token":"tok","expires_in":2592000}"#);
            })
            .await;

        let token = client_for(&server).fetch_access_token("ak", "sk").await.unwrap();
        assert_eq!(token, "tok");
    }
}
