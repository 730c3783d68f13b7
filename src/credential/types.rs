use chrono::{DateTime, TimeDelta, Utc};

/// access_token 超过这个天数即视为过期（百度 token 有效期 30 天，留出余量）。
pub const TOKEN_MAX_AGE_DAYS: i64 = 25;

#[derive(Debug, Clone, Default)]
pub struct Credential {
    pub token: Option<String>,
    pub obtained_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(token: impl Into<String>, obtained_at: DateTime<Utc>) -> Self {
        Self {
            token: Some(token.into()),
            obtained_at: Some(obtained_at),
        }
    }

    /// token 缺失，或年龄 >= 25 天。
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.obtained_at) {
            (Some(token), Some(obtained_at)) if !token.is_empty() => {
                now - obtained_at >= TimeDelta::days(TOKEN_MAX_AGE_DAYS)
            }
            _ => true,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }
}
