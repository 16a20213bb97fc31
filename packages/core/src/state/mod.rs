// Сторы приложения
//
// Каждый стор владеет своим состоянием за `parking_lot::Mutex`, получает
// зависимости (API, шина, транспорт, конфиг) при создании и сообщает об
// изменениях через счётчик ревизий `watch`.

pub mod agent;
pub mod app;
pub mod auth;
pub mod chat;
pub mod conversations;

use tokio::sync::watch;

use crate::api::ApiError;

pub use agent::AgentStore;
pub use app::{AppContext, Services};
pub use auth::AuthStore;
pub use chat::ChatStore;
pub use conversations::{MessageCache, TypingIndicators};

/// Состояние UI, общее для всех сторов
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub is_loading: bool,
    pub is_sending: bool,
    pub error: Option<String>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Начало загрузки: флаг поднят, прошлая ошибка стёрта
    pub fn begin_loading(&mut self) {
        self.is_loading = true;
        self.error = None;
    }

    pub fn begin_sending(&mut self) {
        self.is_sending = true;
        self.error = None;
    }

    /// Ошибка с контекстной меткой операции
    pub fn fail(&mut self, label: &str, error: &ApiError) {
        tracing::warn!(code = error.code(), "{label} {}", error.message());
        self.error = Some(format!("{label} {}", error.message()));
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.error = error;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Счётчик ревизий стора: каждое изменение состояния увеличивает его на 1
pub(crate) struct Revision {
    sender: watch::Sender<u64>,
}

impl Revision {
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self { sender }
    }

    pub(crate) fn bump(&self) {
        self.sender.send_modify(|revision| *revision += 1);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }

    pub(crate) fn current(&self) -> u64 {
        *self.sender.borrow()
    }
}
