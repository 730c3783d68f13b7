use crate::baidu::BaiduClient;
use crate::config::{Account, Config};
use crate::credential::CredentialCell;
use crate::dispatch::handle::{WaitError, result_channel};
use crate::dispatch::queue::{SharedQueue, Task};
use crate::dispatch::worker::{Worker, WorkerEnv};
use crate::error::{ConfigError, PoolError};
use crate::prompt::PromptBook;
use crate::response::{ABANDONED_REASON, LlmResponse, Message, SHUTDOWN_REASON};
use crate::util::id;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// 面向调用方的请求管理器：持有 worker 池与共享队列，负责单请求截止时间。
///
/// 由进程入口显式构造并按引用（或 `Arc`）传给调用方。
#[derive(Debug)]
pub struct Manager {
    env: Arc<WorkerEnv>,
    prompts: PromptBook,
    credentials: Vec<Arc<CredentialCell>>,
    loops: TaskTracker,
    request_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Manager {
    /// 为每个账号创建 worker，并发预取 token；全部成功后 worker 才开始消费队列。
    pub async fn start(cfg: &Config) -> Result<Self, PoolError> {
        let client = BaiduClient::new(cfg)?;

        let mut workers = Vec::new();
        for account in &cfg.accounts {
            if account.is_placeholder() {
                warn!(account = account.name(), "跳过占位账号");
                continue;
            }
            workers.push(build_worker(account, cfg.pool.max_calls_per_second));
        }
        if workers.is_empty() {
            return Err(ConfigError::invalid("没有可用的百度账号").into());
        }

        futures::future::try_join_all(workers.iter().map(|w| w.prime(&client))).await?;

        let env = Arc::new(WorkerEnv::new(
            SharedQueue::new(),
            client,
            cfg.pool.max_inflight,
            cfg.pool.backoff(),
        ));
        let credentials = workers.iter().map(|w| w.credential().clone()).collect();
        let loops = TaskTracker::new();
        for worker in workers {
            loops.spawn(worker.run(env.clone()));
        }

        let manager = Self {
            env,
            prompts: PromptBook::new(cfg.prompts.clone()),
            credentials,
            loops,
            request_timeout: cfg.pool.request_timeout(),
            shutdown_timeout: cfg.pool.shutdown_timeout(),
        };
        info!(
            workers = manager.worker_count(),
            prompts = manager.prompts.len(),
            "百度工作池已就绪"
        );
        Ok(manager)
    }

    /// 按模板名组装提示词并发送。未知模板名立即失败，不做任何网络调用。
    pub async fn request(&self, message: &str, prompt_type: &str) -> LlmResponse {
        let Some(prepared) = self.prompts.render(prompt_type, message) else {
            let reason = format!("unsupported type: {prompt_type}");
            error!("{reason}");
            return LlmResponse::failure(reason);
        };
        tracing::debug!(prompt_type, "提示词已组装");
        self.request_messages(vec![Message::user(prepared)]).await
    }

    /// 直接发送消息序列（不经过模板）。
    pub async fn request_messages(&self, messages: Vec<Message>) -> LlmResponse {
        if self.env.shutdown.is_cancelled() {
            return LlmResponse::failure(SHUTDOWN_REASON);
        }

        let request_id = id::request_id();
        let (resolver, handle) = result_channel();
        let task = Task {
            id: request_id.clone(),
            resolver,
            messages,
        };
        let message_count = task.messages.len();
        if self.env.queue.push(task).is_err() {
            return LlmResponse::failure(SHUTDOWN_REASON);
        }
        info!(request_id = %request_id, messages = message_count, "请求入队");

        match handle.wait(self.request_timeout).await {
            Ok(response) => response,
            Err(WaitError::Timeout(deadline)) => {
                warn!(request_id = %request_id, ?deadline, "请求超时");
                LlmResponse::timeout()
            }
            Err(WaitError::Abandoned) => {
                error!(request_id = %request_id, "请求未被写回结果");
                LlmResponse::failure(ABANDONED_REASON)
            }
        }
    }

    pub fn supports(&self, prompt_type: &str) -> bool {
        self.prompts.contains(prompt_type)
    }

    pub fn worker_count(&self) -> usize {
        self.credentials.len()
    }

    /// 在途（已派发、未完成）的 HTTP 调用数。
    pub fn outstanding(&self) -> usize {
        self.env.dispatches.len()
    }

    /// 所有 worker 累计的 token 刷新次数（含启动时的预取）。
    pub fn token_refreshes(&self) -> u64 {
        self.credentials.iter().map(|c| c.refresh_count()).sum()
    }

    /// 优雅关闭：停止 worker 循环，排队中的任务以 `PoolShutdown` 失败，
    /// 在 `shutdown_timeout` 内等待在途派发完成。可重复调用。
    pub async fn shutdown(&self) {
        info!("关闭百度工作池...");
        self.env.shutdown.cancel();
        self.loops.close();
        self.loops.wait().await;

        let pending = self.env.queue.close_and_drain().await;
        if !pending.is_empty() {
            warn!(pending = pending.len(), "丢弃排队中的任务");
        }
        for task in pending {
            task.resolver.resolve(LlmResponse::failure(SHUTDOWN_REASON));
        }

        self.env.dispatches.close();
        if tokio::time::timeout(self.shutdown_timeout, self.env.dispatches.wait())
            .await
            .is_err()
        {
            warn!(outstanding = self.outstanding(), "等待在途请求超时，直接退出");
        }
        info!("百度工作池已关闭");
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.env.shutdown.cancel();
    }
}

fn build_worker(account: &Account, default_rate: u32) -> Worker {
    match account {
        Account::Baidu(a) => {
            let rate = a.max_calls_per_second.unwrap_or(default_rate);
            let cell = CredentialCell::new(&a.name, &a.api_key, &a.secret_key);
            Worker::new(Arc::new(cell), rate)
        }
    }
}
