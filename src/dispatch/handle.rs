use crate::response::LlmResponse;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// 创建一对一次性结果句柄：写端交给任务（最终由派发它的 worker 写入），读端留给调用方。
pub fn result_channel() -> (Resolver, ResultHandle) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, ResultHandle { rx })
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("等待超时 {0:?}")]
    Timeout(Duration),

    /// 写端在写入前被丢弃（例如派发任务 panic）。
    #[error("结果句柄被丢弃")]
    Abandoned,
}

/// 写端：`resolve` 消耗自身，所以最多写一次。
#[derive(Debug)]
pub struct Resolver {
    tx: oneshot::Sender<LlmResponse>,
}

impl Resolver {
    /// 调用方已取消（超时或放弃等待）。
    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// 写入结果。调用方已取消时什么也不做，返回 `false`。
    pub fn resolve(self, response: LlmResponse) -> bool {
        self.tx.send(response).is_ok()
    }
}

/// 读端：等待结果，或取消。
#[derive(Debug)]
pub struct ResultHandle {
    rx: oneshot::Receiver<LlmResponse>,
}

impl ResultHandle {
    /// 标记为已取消：之后写端的 `resolve` 变为空操作。
    pub fn cancel(&mut self) {
        self.rx.close();
    }

    /// 最多等待 `deadline`；超时后自动取消句柄。
    pub async fn wait(mut self, deadline: Duration) -> Result<LlmResponse, WaitError> {
        match tokio::time::timeout(deadline, &mut self.rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(WaitError::Abandoned),
            Err(_) => {
                self.cancel();
                Err(WaitError::Timeout(deadline))
            }
        }
    }
}
