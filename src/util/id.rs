use uuid::Uuid;

/// 单次请求的日志关联 id。
pub fn request_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}
