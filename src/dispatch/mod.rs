//! 派发引擎：共享任务队列 + 限速 worker 池 + 带截止时间的请求管理器。
//!
//! 调用方 → `Manager::request` → 入队 → 某个空闲 worker 出队（受每秒调用上限约束）
//! → 百度 HTTP 调用 → 通过一次性结果句柄回传 → `Manager` 返回结果或超时失败。

pub mod handle;
pub mod manager;
pub mod queue;
pub mod rate;
pub mod worker;

pub use handle::{ResultHandle, Resolver, WaitError, result_channel};
pub use manager::Manager;
pub use queue::{SharedQueue, Task};
pub use rate::RateWindow;
pub use worker::Worker;
