// In-memory хранилище для тестов и non-browser платформ

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::storage::LocalStorage;
use crate::utils::error::{AiccError, Result};

/// In-memory хранилище с необязательной квотой в байтах (ключи + значения)
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes: None,
        }
    }

    /// Хранилище, отказывающее в записи сверх `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Занятый объём в байтах
    pub fn used_bytes(&self) -> usize {
        self.items
            .lock()
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock();

        if let Some(quota) = self.quota_bytes {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(AiccError::StorageError(format!(
                    "quota exceeded: {needed} of {quota} bytes"
                )));
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}
