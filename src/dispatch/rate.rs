use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// 限速窗口长度。
pub const WINDOW: Duration = Duration::from_secs(1);

/// 单个 worker 的滑动 1 秒窗口：记录最近的派发时刻。
///
/// 只由所属 worker 的消费循环访问，无需加锁。
#[derive(Debug)]
pub struct RateWindow {
    max_calls_per_second: usize,
    stamps: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(max_calls_per_second: u32) -> Self {
        let max = (max_calls_per_second as usize).max(1);
        Self {
            max_calls_per_second: max,
            stamps: VecDeque::with_capacity(max),
        }
    }

    /// 先丢弃 1 秒之前的记录，再判断是否还能派发。
    pub fn has_capacity(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.stamps.len() < self.max_calls_per_second
    }

    /// 记录一次派发。调用前必须刚通过 `has_capacity`。
    pub fn record(&mut self, now: Instant) {
        self.stamps.push_back(now);
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn max_calls_per_second(&self) -> usize {
        self.max_calls_per_second
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.stamps.front() {
            if now.saturating_duration_since(oldest) >= WINDOW {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }
}
