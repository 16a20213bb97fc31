// Генерация идентификаторов

use rand::distributions::Alphanumeric;
use rand::Rng;

pub fn generate_v4() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// ID сообщения, сгенерированного симулятором: `msg-{millis}-{9 символов}`
pub fn simulated_message_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("msg-{}-{}", chrono::Utc::now().timestamp_millis(), suffix)
}

/// ID сообщения мок-API: `msg-{sessionId}-{counter}`
pub fn api_message_id(session_id: &str, counter: u64) -> String {
    format!("msg-{}-{}", session_id, counter)
}

/// Извлечь ID сессии из ID сообщения формата `msg-{sessionId}-{counter}`
///
/// ID сессии сам может содержать дефисы (`session-1`), поэтому отрезаются
/// только префикс и последний числовой сегмент.
pub fn session_id_from_message_id(message_id: &str) -> Option<&str> {
    let rest = message_id.strip_prefix("msg-")?;
    let (session_id, counter) = rest.rsplit_once('-')?;
    if session_id.is_empty() || counter.is_empty() || !counter.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(session_id)
}
