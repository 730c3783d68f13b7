use crate::baidu::BaiduClient;
use crate::credential::CredentialCell;
use crate::dispatch::queue::{SharedQueue, Task};
use crate::dispatch::rate::RateWindow;
use crate::error::{DispatchError, PoolError};
use crate::response::{LlmResponse, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// 同一个池内所有 worker 共用的运行环境。
#[derive(Debug)]
pub struct WorkerEnv {
    pub queue: SharedQueue,
    pub client: BaiduClient,
    pub shutdown: CancellationToken,
    /// 已派发、尚未完成的 HTTP 调用。
    pub dispatches: TaskTracker,
    /// 在途派发上限。
    pub inflight: Arc<Semaphore>,
    /// 达到限速时的轮询间隔。
    pub backoff: Duration,
}

impl WorkerEnv {
    pub fn new(
        queue: SharedQueue,
        client: BaiduClient,
        max_inflight: usize,
        backoff: Duration,
    ) -> Self {
        Self {
            queue,
            client,
            shutdown: CancellationToken::new(),
            dispatches: TaskTracker::new(),
            inflight: Arc::new(Semaphore::new(max_inflight.max(1))),
            backoff,
        }
    }
}

/// 一个账号 = 一个 worker：自己的 token、自己的限速窗口，从共享队列消费任务。
#[derive(Debug)]
pub struct Worker {
    credential: Arc<CredentialCell>,
    rate: RateWindow,
}

impl Worker {
    pub fn new(credential: Arc<CredentialCell>, max_calls_per_second: u32) -> Self {
        Self {
            credential,
            rate: RateWindow::new(max_calls_per_second),
        }
    }

    pub fn name(&self) -> &str {
        self.credential.name()
    }

    pub fn max_calls_per_second(&self) -> usize {
        self.rate.max_calls_per_second()
    }

    pub fn credential(&self) -> &Arc<CredentialCell> {
        &self.credential
    }

    /// 加入队列前先拿到一个可用 token。
    pub async fn prime(&self, client: &BaiduClient) -> Result<(), PoolError> {
        self.credential
            .ensure_fresh(client)
            .await
            .map(|_| ())
            .map_err(|e| PoolError::prime(self.name(), e))
    }

    /// 消费循环，直到 `env.shutdown` 被取消。
    pub async fn run(mut self, env: Arc<WorkerEnv>) {
        info!(worker = %self.name(), "启动 worker 循环");
        loop {
            if !self.rate.has_capacity(Instant::now()) {
                tokio::select! {
                    _ = env.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(env.backoff) => continue,
                }
            }

            let permit = tokio::select! {
                _ = env.shutdown.cancelled() => break,
                permit = env.inflight.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let task = tokio::select! {
                _ = env.shutdown.cancelled() => break,
                task = env.queue.pop() => match task {
                    Some(t) => t,
                    None => break,
                },
            };

            // 调用方已超时：丢弃，不占用限速额度，也不 backoff。
            if task.resolver.is_cancelled() {
                warn!(worker = %self.name(), request_id = %task.id, "忽略已超时任务");
                continue;
            }

            // 派发是异步的，但在发出时就计入窗口。
            self.rate.record(Instant::now());

            let credential = self.credential.clone();
            let client = env.client.clone();
            env.dispatches.spawn(async move {
                let _permit = permit;
                dispatch(credential, client, task).await;
            });
        }
        info!(worker = %self.name(), "worker 循环退出");
    }
}

/// 单次派发：刷新 token（如需）→ 调用 completion → 写回结果。不重试。
async fn dispatch(credential: Arc<CredentialCell>, client: BaiduClient, task: Task) {
    let Task {
        id,
        resolver,
        messages,
    } = task;
    let worker = credential.name();

    let response = match send(&credential, &client, &messages).await {
        Ok(r) => r,
        Err(e) => {
            error!(worker, request_id = %id, error = %e, "派发失败");
            LlmResponse::failure(e.to_string())
        }
    };

    if !resolver.resolve(response) {
        warn!(worker, request_id = %id, "调用方已取消，丢弃迟到的响应");
    }
}

async fn send(
    credential: &CredentialCell,
    client: &BaiduClient,
    messages: &[Message],
) -> Result<LlmResponse, DispatchError> {
    let token = credential.ensure_fresh(client).await?;
    Ok(client.chat(credential.name(), &token, messages).await?)
}
