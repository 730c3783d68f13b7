//! 单个 worker 的 access_token 生命周期：缓存、按时间过期、按需刷新。

pub mod lifecycle;
pub mod types;

pub use lifecycle::CredentialCell;
pub use types::Credential;
