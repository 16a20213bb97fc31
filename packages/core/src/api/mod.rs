// Граница API: единый конверт ответа, ошибки и мок-реализации сервисов
//
// Сторы видят только трейты `ChatApi` / `AgentApi` / `AuthApi`. Мок-реализации
// держат данные в памяти и имитируют сетевую задержку через tokio::time.

pub mod agent;
pub mod auth;
pub mod chat;
pub mod types;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::time::now_iso;

pub use agent::{AgentApi, MockAgentApi};
pub use auth::{AuthApi, MockAuthApi};
pub use chat::{ChatApi, MockChatApi};
pub use types::*;

/// Успешный ответ API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            timestamp: now_iso(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

/// Ошибка API (`success: false`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: ApiErrorBody,
    pub timestamp: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ApiErrorBody {
                code: code.into(),
                message: message.into(),
            },
            timestamp: now_iso(),
        }
    }

    pub fn code(&self) -> &str {
        &self.error.code
    }

    pub fn message(&self) -> &str {
        &self.error.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error.code, self.error.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = std::result::Result<ApiResponse<T>, ApiError>;

/// Имитация сетевой задержки мок-сервисов
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latency {
    enabled: bool,
}

impl Latency {
    pub const fn realistic() -> Self {
        Self { enabled: true }
    }

    /// Без задержек (детерминированные тесты)
    pub const fn none() -> Self {
        Self { enabled: false }
    }

    pub async fn wait(&self, ms: u64) {
        if self.enabled && ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

impl Default for Latency {
    fn default() -> Self {
        Self::realistic()
    }
}
