use crate::dispatch::handle::Resolver;
use crate::response::Message;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// 一个待派发的请求：结果写端 + 消息序列。只会被一个 worker 消费一次。
#[derive(Debug)]
pub struct Task {
    pub id: String,
    pub resolver: Resolver,
    pub messages: Vec<Message>,
}

/// 同一供应商的所有 worker 共享的 FIFO 队列。
///
/// 多个 worker 同时等待时，接收端的锁按先来先得交出，谁拿到锁谁拿下一个任务。
#[derive(Debug, Clone)]
pub struct SharedQueue {
    tx: mpsc::UnboundedSender<Task>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Task>>>,
}

impl SharedQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// 入队；队列已关闭时把任务原样还给调用方。
    pub fn push(&self, task: Task) -> Result<(), Task> {
        self.tx.send(task).map_err(|e| e.0)
    }

    /// 阻塞直到有任务；队列关闭且已取空时返回 `None`。
    pub async fn pop(&self) -> Option<Task> {
        self.rx.lock().await.recv().await
    }

    /// 关闭队列（之后 `push` 全部失败），并取出仍在排队的任务。
    pub async fn close_and_drain(&self) -> Vec<Task> {
        let mut rx = self.rx.lock().await;
        rx.close();
        let mut pending = Vec::new();
        while let Ok(task) = rx.try_recv() {
            pending.push(task);
        }
        pending
    }
}

impl Default for SharedQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::handle::result_channel;

    fn task(id: &str) -> Task {
        let (resolver, _handle) = result_channel();
        Task {
            id: id.to_string(),
            resolver,
            messages: vec![Message::user(id)],
        }
    }

    #[tokio::test]
    async fn pops_in_fifo_order() {
        let q = SharedQueue::new();
        for id in ["a", "b", "c"] {
            q.push(task(id)).unwrap();
        }
        let mut got = Vec::new();
        for _ in 0..3 {
            got.push(q.pop().await.unwrap().id);
        }
        assert_eq!(got, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let q = SharedQueue::new();
        let consumer = {
            let q = q.clone();
            tokio::spawn(async move { q.pop().await.map(|t| t.id) })
        };
        tokio::task::yield_now().await;
        q.push(task("late")).unwrap();
        assert_eq!(consumer.await.unwrap().as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn each_task_goes_to_exactly_one_consumer() {
        let q = SharedQueue::new();
        let mut consumers = Vec::new();
        for _ in 0..4 {
            let q = q.clone();
            consumers.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Ok(Some(t)) =
                    tokio::time::timeout(std::time::Duration::from_millis(200), q.pop()).await
                {
                    seen.push(t.id);
                }
                seen
            }));
        }
        for i in 0..20 {
            q.push(task(&i.to_string())).unwrap();
        }

        let mut all = Vec::new();
        for c in consumers {
            all.extend(c.await.unwrap());
        }
        all.sort_by_key(|id| id.parse::<u32>().unwrap());
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(all, expected);
    }

    #[tokio::test]
    async fn close_rejects_new_tasks_and_returns_pending() {
        let q = SharedQueue::new();
        q.push(task("queued")).unwrap();
        let pending = q.close_and_drain().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "queued");
        let rejected = q.push(task("after")).unwrap_err();
        assert_eq!(rejected.id, "after");
        assert!(q.pop().await.is_none());
    }
}
