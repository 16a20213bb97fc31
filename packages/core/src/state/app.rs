// Корень композиции: шина, транспорт, сторы и хранилище в одном месте
//
// Глобальных синглтонов нет. Всё создаётся явно, жизненный цикл управляется
// через `init()` / `dispose()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::agent::{AgentApi, MockAgentApi};
use crate::api::auth::{AuthApi, MockAuthApi};
use crate::api::chat::{ChatApi, MockChatApi};
use crate::config::Config;
use crate::protocol::bus::EventBus;
use crate::protocol::transport::{MockTransport, Outbound};
use crate::state::agent::AgentStore;
use crate::state::auth::AuthStore;
use crate::state::chat::ChatStore;
use crate::storage::persisted;
use crate::storage::{LocalStorage, MemoryStorage};

/// Сервисы, из которых собирается приложение
pub struct Services {
    pub chat: Arc<dyn ChatApi>,
    pub agent: Arc<dyn AgentApi>,
    pub auth: Arc<dyn AuthApi>,
    pub storage: Arc<dyn LocalStorage>,
}

impl Default for Services {
    /// Мок-сервисы с реалистичными задержками и память вместо localStorage
    fn default() -> Self {
        Self {
            chat: Arc::new(MockChatApi::new()),
            agent: Arc::new(MockAgentApi::new()),
            auth: Arc::new(MockAuthApi::new()),
            storage: Arc::new(MemoryStorage::new()),
        }
    }
}

/// Главное состояние приложения
pub struct AppContext {
    config: Config,
    bus: Arc<EventBus>,
    transport: MockTransport,
    chat: ChatStore,
    agent: AgentStore,
    auth: AuthStore,
    storage: Arc<dyn LocalStorage>,
    initialized: AtomicBool,
}

impl AppContext {
    /// Приложение на мок-сервисах
    pub fn new(config: Config) -> Self {
        Self::with_services(config, Services::default())
    }

    pub fn with_services(config: Config, services: Services) -> Self {
        let bus = EventBus::new();
        let transport = MockTransport::new(config.clone(), bus.clone());

        let chat = ChatStore::new(services.chat, bus.clone(), config.clone());
        let outbound: Arc<dyn Outbound> = Arc::new(transport.clone());
        chat.set_outbound(outbound);

        let agent = AgentStore::new(services.agent, bus.clone());
        let auth = AuthStore::with_transport(services.auth, transport.clone());

        Self {
            config,
            bus,
            transport,
            chat,
            agent,
            auth,
            storage: services.storage,
            initialized: AtomicBool::new(false),
        }
    }

    /// Подписать сторы на шину и открыть соединение.
    /// `false`, если приложение уже инициализировано.
    pub fn init(&self) -> bool {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return false;
        }

        tracing::info!(simulation = self.config.simulation_enabled, "initializing app context");
        self.chat.connect_websocket();
        self.agent.connect_websocket();
        self.transport.connect();
        true
    }

    /// Снять таймеры и подписки сторов, закрыть соединение.
    /// `false`, если приложение не было инициализировано.
    pub fn dispose(&self) -> bool {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return false;
        }

        tracing::info!("disposing app context");
        self.chat.cleanup();
        self.agent.cleanup();
        self.transport.disconnect();
        true
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn transport(&self) -> &MockTransport {
        &self.transport
    }

    pub fn chat(&self) -> &ChatStore {
        &self.chat
    }

    pub fn agent(&self) -> &AgentStore {
        &self.agent
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    // === Сохранение ===

    /// Сохранить кешированную историю чата
    pub fn persist_chat_history(&self) -> bool {
        persisted::save_chat_history(self.storage.as_ref(), &self.chat.all_messages())
    }

    /// Восстановить историю чата; возвращает число восстановленных сессий
    pub fn restore_chat_history(&self) -> usize {
        let messages = persisted::load_chat_history(self.storage.as_ref());
        if messages.is_empty() {
            return 0;
        }
        self.chat.restore_messages(messages)
    }

    pub fn load_memo(&self) -> String {
        persisted::load_memo(self.storage.as_ref())
    }

    pub fn save_memo(&self, memo: &str) -> bool {
        persisted::save_memo(self.storage.as_ref(), memo)
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
