//! Централизованная конфигурация ядра AICC
//!
//! Все задержки, политика переподключения и параметры симуляции определены
//! здесь, чтобы избежать хардкода по всему проекту. Компоненты получают
//! `Config` явно при создании; `Config::global()` нужен только как источник
//! значений по умолчанию для корня композиции.

use std::sync::OnceLock;
use std::time::Duration;

use crate::utils::error::{AiccError, Result};

/// Глобальная конфигурация по умолчанию
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Основная структура конфигурации
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // ============================================
    // ПАРАМЕТРЫ ТРАНСПОРТА
    // ============================================

    /// Симулируемая задержка установки соединения (мс)
    pub connect_latency_ms: u64,

    /// Начальная задержка для exponential backoff при переподключении (мс)
    pub reconnect_initial_ms: u64,

    /// Максимальная задержка для exponential backoff (мс)
    pub reconnect_max_ms: u64,

    /// Максимальное количество попыток переподключения
    pub max_reconnect_attempts: u32,

    /// Период проверки токена (heartbeat), по умолчанию 5 минут
    pub token_refresh_interval_ms: u64,

    // ============================================
    // СИМУЛЯЦИЯ СОБЫТИЙ СЕРВЕРА
    // ============================================

    /// Генерировать ли синтетические события, пока соединение открыто
    pub simulation_enabled: bool,

    pub simulation_min_interval_ms: u64,
    pub simulation_max_interval_ms: u64,

    /// Через сколько симулятор снимает "печатает"
    pub simulated_typing_ms: u64,

    /// Диапазон задержки ответа AI на исходящее `chat:send`
    pub ai_response_min_ms: u64,
    pub ai_response_max_ms: u64,

    /// Задержка эха `chat:read`
    pub read_receipt_delay_ms: u64,

    // ============================================
    // ПАРАМЕТРЫ СТОРОВ
    // ============================================

    /// Автосброс индикатора "печатает" без повторного сигнала
    pub typing_expiry_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_latency_ms: 500,
            reconnect_initial_ms: 1000,
            reconnect_max_ms: 30_000,
            max_reconnect_attempts: 5,
            token_refresh_interval_ms: 5 * 60 * 1000,

            simulation_enabled: true,
            simulation_min_interval_ms: 2000,
            simulation_max_interval_ms: 10_000,
            simulated_typing_ms: 3000,
            ai_response_min_ms: 1000,
            ai_response_max_ms: 3000,
            read_receipt_delay_ms: 800,

            typing_expiry_ms: 3000,
        }
    }
}

impl Config {
    /// Конфигурация без фоновой симуляции (для тестов и детерминированных сценариев)
    pub fn without_simulation() -> Self {
        Self {
            simulation_enabled: false,
            ..Self::default()
        }
    }

    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(parsed) = env_parse("AICC_CONNECT_LATENCY_MS") {
            config.connect_latency_ms = parsed;
        }

        if let Some(parsed) = env_parse("AICC_RECONNECT_INITIAL_MS") {
            config.reconnect_initial_ms = parsed;
        }

        if let Some(parsed) = env_parse("AICC_RECONNECT_MAX_MS") {
            config.reconnect_max_ms = parsed;
        }

        if let Some(parsed) = env_parse("AICC_MAX_RECONNECT_ATTEMPTS") {
            config.max_reconnect_attempts = parsed;
        }

        if let Ok(val) = std::env::var("AICC_SIMULATION") {
            config.simulation_enabled = !matches!(val.trim(), "0" | "false" | "off");
        }

        config
    }

    /// Проверить согласованность значений
    pub fn validate(&self) -> Result<()> {
        if self.max_reconnect_attempts == 0 {
            return Err(AiccError::InvalidInput(
                "max_reconnect_attempts must be at least 1".to_string(),
            ));
        }
        if self.simulation_min_interval_ms > self.simulation_max_interval_ms {
            return Err(AiccError::InvalidInput(format!(
                "simulation interval {}..{} ms is empty",
                self.simulation_min_interval_ms, self.simulation_max_interval_ms
            )));
        }
        if self.ai_response_min_ms > self.ai_response_max_ms {
            return Err(AiccError::InvalidInput(format!(
                "AI response delay {}..{} ms is empty",
                self.ai_response_min_ms, self.ai_response_max_ms
            )));
        }
        if self.reconnect_initial_ms > self.reconnect_max_ms {
            return Err(AiccError::InvalidInput(
                "reconnect_initial_ms exceeds reconnect_max_ms".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_latency(&self) -> Duration {
        Duration::from_millis(self.connect_latency_ms)
    }

    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.token_refresh_interval_ms)
    }

    pub fn typing_expiry(&self) -> Duration {
        Duration::from_millis(self.typing_expiry_ms)
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализируется из окружения при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::from_env)
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> std::result::Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|val| val.trim().parse().ok())
}
