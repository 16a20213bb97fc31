// Работа со временем

use chrono::{DateTime, Duration, Utc};

/// Текущее время в UTC
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Текущее время в формате ISO 8601 (как в конверте API)
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Unix timestamp в секундах
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Момент времени `minutes` минут назад (для seed-данных моков)
pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

/// Момент времени `days` дней назад
pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}
