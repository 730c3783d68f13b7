use std::time::Duration;

/// 供应商请求/响应日志等级：
/// - off：不输出请求响应详情
/// - low：只输出请求摘要（账号、消息条数、耗时）
/// - medium：输出后端请求/响应体（格式化、截断）
/// - high：输出后端请求/响应体（完全原始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl LogLevel {
    pub fn parse(debug: &str) -> Self {
        match debug.trim().to_lowercase().as_str() {
            "low" | "client" => Self::Low,
            "medium" | "backend" => Self::Medium,
            "high" | "all" | "raw" => Self::High,
            _ => Self::Off,
        }
    }

    pub fn summary_enabled(self) -> bool {
        self >= Self::Low
    }

    pub fn backend_enabled(self) -> bool {
        self >= Self::Medium
    }

    pub fn raw_enabled(self) -> bool {
        self >= Self::High
    }
}

pub fn format_duration_ms(d: Duration) -> i64 {
    d.as_millis().min(i64::MAX as u128) as i64
}

pub fn backend_request(level: LogLevel, worker: &str, url: &str, body: &[u8]) {
    if !level.backend_enabled() {
        return;
    }
    let url = redact_access_token(url);
    let body = if level.raw_enabled() {
        format_bytes_raw(body)
    } else {
        format_body_bytes(body)
    };
    tracing::info!(
        "\n====================== 后端请求 ========================\n[后端请求] {worker} POST {url}\n{body}\n=========================================================="
    );
}

pub fn backend_response(level: LogLevel, worker: &str, status: u16, duration: Duration, body: &[u8]) {
    if !level.backend_enabled() {
        return;
    }
    let body = if level.raw_enabled() {
        format_bytes_raw(body)
    } else {
        format_body_bytes(body)
    };
    tracing::info!(
        "\n====================== 后端响应 ========================\n[后端响应] {worker} {status} {}ms\n{body}\n==========================================================",
        format_duration_ms(duration),
    );
}

/// URL 里的 access_token 一律打码后再落日志。
pub fn redact_access_token(url: &str) -> String {
    let Ok(mut parsed) = reqwest::Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.query_pairs().any(|(k, _)| k == "access_token") {
        return url.to_string();
    }
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_token" {
                mask(&v)
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

/// 截断到日志可接受的长度（按字符计，避免切断多字节字符）。
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push_str("...[TRUNCATED]");
    out
}

fn format_body_bytes(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    const MAX_CHARS: usize = 32 * 1024;
    match sonic_rs::from_slice::<sonic_rs::Value>(bytes) {
        Ok(v) => match sonic_rs::to_string_pretty(&v) {
            Ok(s) => truncate_for_log(&s, MAX_CHARS),
            Err(_) => truncate_for_log(&v.to_string(), MAX_CHARS),
        },
        Err(_) => truncate_for_log(&String::from_utf8_lossy(bytes), MAX_CHARS),
    }
}

fn format_bytes_raw(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
