// Локальное хранилище (аналог localStorage браузера)

pub mod memory;
pub mod persisted;

use crate::utils::error::Result;

pub use memory::MemoryStorage;

/// Строковое key-value хранилище
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;
}
