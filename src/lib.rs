//! 百度文心多账号派发：共享队列 + 按账号限速的 worker 池 + 带截止时间的请求管理器。

pub mod baidu;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod prompt;
pub mod response;
pub mod util;

pub use config::Config;
pub use dispatch::Manager;
pub use response::{LlmResponse, Message};
