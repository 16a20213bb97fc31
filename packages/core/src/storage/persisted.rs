// Сохраняемое состояние: история чата и заметка консультанта
//
// Все операции best-effort: ошибки логируются и не пробрасываются.

use crate::api::types::Message;
use crate::storage::LocalStorage;

pub const CHAT_HISTORY_KEY: &str = "mirae_chat_history";
pub const MEMO_KEY: &str = "agent_workspace_memo";

/// Загрузить историю чата. Повреждённое значение удаляется.
pub fn load_chat_history(storage: &dyn LocalStorage) -> Vec<Message> {
    let raw = match storage.get_item(CHAT_HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(key = CHAT_HISTORY_KEY, error = %e, "failed to read chat history");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(key = CHAT_HISTORY_KEY, error = %e, "corrupt chat history, discarding");
            if let Err(e) = storage.remove_item(CHAT_HISTORY_KEY) {
                tracing::warn!(key = CHAT_HISTORY_KEY, error = %e, "failed to remove chat history");
            }
            Vec::new()
        }
    }
}

/// Сохранить историю чата; `false`, если запись не удалась
pub fn save_chat_history(storage: &dyn LocalStorage, messages: &[Message]) -> bool {
    let raw = match serde_json::to_string(messages) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode chat history");
            return false;
        }
    };

    match storage.set_item(CHAT_HISTORY_KEY, &raw) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key = CHAT_HISTORY_KEY, error = %e, "failed to save chat history");
            false
        }
    }
}

pub fn load_memo(storage: &dyn LocalStorage) -> String {
    match storage.get_item(MEMO_KEY) {
        Ok(memo) => memo.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(key = MEMO_KEY, error = %e, "failed to read memo");
            String::new()
        }
    }
}

pub fn save_memo(storage: &dyn LocalStorage, memo: &str) -> bool {
    match storage.set_item(MEMO_KEY, memo) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(key = MEMO_KEY, error = %e, "failed to save memo");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Sender;
    use crate::storage::MemoryStorage;
    use crate::utils::error::{AiccError, Result};

    /// Хранилище, у которого всё ломается
    struct BrokenStorage;

    impl LocalStorage for BrokenStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>> {
            Err(AiccError::StorageError("access denied".to_string()))
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
            Err(AiccError::StorageError("access denied".to_string()))
        }

        fn remove_item(&self, _key: &str) -> Result<()> {
            Err(AiccError::StorageError("access denied".to_string()))
        }
    }

    #[test]
    fn test_chat_history_survives_save_and_load() {
        let storage = MemoryStorage::new();
        let history = vec![
            Message::new("m1", "session-1", Sender::User, "안녕하세요"),
            Message::new("m2", "session-1", Sender::Ai, "무엇을 도와드릴까요?"),
        ];

        assert!(save_chat_history(&storage, &history));
        assert_eq!(load_chat_history(&storage), history);
    }

    #[test]
    fn test_corrupt_history_is_removed() {
        let storage = MemoryStorage::new();
        storage.set_item(CHAT_HISTORY_KEY, "{not json").unwrap();

        assert!(load_chat_history(&storage).is_empty());
        assert_eq!(storage.get_item(CHAT_HISTORY_KEY).unwrap(), None);
    }

    #[test]
    fn test_failures_are_swallowed() {
        assert!(load_chat_history(&BrokenStorage).is_empty());
        assert!(!save_chat_history(&BrokenStorage, &[]));
        assert_eq!(load_memo(&BrokenStorage), "");
        assert!(!save_memo(&BrokenStorage, "memo"));
    }

    #[test]
    fn test_quota_failure_keeps_previous_memo() {
        let storage = MemoryStorage::with_quota(64);
        assert!(save_memo(&storage, "짧은 메모"));
        assert!(!save_memo(&storage, &"가".repeat(100)));
        assert_eq!(load_memo(&storage), "짧은 메모");
    }
}
