//! 百度千帆（文心）对接：access_token 获取与 chat completions 调用。

pub mod client;
pub mod types;

pub use client::BaiduClient;
