// Каталог событий реального времени
//
// Закрытые перечисления вместо строковых имён: обработчики регистрируются по
// `IncomingEventKind`, полезная нагрузка строго типизирована.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::types::{Customer, Message, OutgoingAttachment, SentimentData};
use crate::protocol::transport::ConnectionState;
use crate::utils::error::AiccError;

// ============================================================================
// Входящие (сервер → клиент)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageData {
    pub session_id: String,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReadData {
    pub session_id: String,
    pub message_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTypingData {
    pub session_id: String,
    pub user_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConnectedData {
    pub user_id: String,
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemErrorData {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentWaitingUpdateData {
    pub waiting_count: u32,
    pub consulting_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentNewCustomerData {
    pub customer: Customer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSentimentUpdateData {
    pub customer_id: String,
    pub sentiment: SentimentData,
}

/// Переход состояния транспорта
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangedData {
    pub previous_state: ConnectionState,
    pub current_state: ConnectionState,
    /// Номер попытки переподключения, если идёт переподключение
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_attempt: Option<u32>,
    pub max_reconnect_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum IncomingEvent {
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessageData),
    #[serde(rename = "chat:read")]
    ChatRead(ChatReadData),
    #[serde(rename = "chat:typing")]
    ChatTyping(ChatTypingData),
    #[serde(rename = "system:connected")]
    SystemConnected(SystemConnectedData),
    #[serde(rename = "system:error")]
    SystemError(SystemErrorData),
    #[serde(rename = "agent:waiting_update")]
    AgentWaitingUpdate(AgentWaitingUpdateData),
    #[serde(rename = "agent:new_customer")]
    AgentNewCustomer(AgentNewCustomerData),
    #[serde(rename = "agent:sentiment_update")]
    AgentSentimentUpdate(AgentSentimentUpdateData),
    #[serde(rename = "state:changed")]
    StateChanged(StateChangedData),
}

/// Ключ подписки на входящее событие
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IncomingEventKind {
    ChatMessage,
    ChatRead,
    ChatTyping,
    SystemConnected,
    SystemError,
    AgentWaitingUpdate,
    AgentNewCustomer,
    AgentSentimentUpdate,
    StateChanged,
}

impl IncomingEventKind {
    pub const ALL: [IncomingEventKind; 9] = [
        Self::ChatMessage,
        Self::ChatRead,
        Self::ChatTyping,
        Self::SystemConnected,
        Self::SystemError,
        Self::AgentWaitingUpdate,
        Self::AgentNewCustomer,
        Self::AgentSentimentUpdate,
        Self::StateChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatMessage => "chat:message",
            Self::ChatRead => "chat:read",
            Self::ChatTyping => "chat:typing",
            Self::SystemConnected => "system:connected",
            Self::SystemError => "system:error",
            Self::AgentWaitingUpdate => "agent:waiting_update",
            Self::AgentNewCustomer => "agent:new_customer",
            Self::AgentSentimentUpdate => "agent:sentiment_update",
            Self::StateChanged => "state:changed",
        }
    }
}

impl fmt::Display for IncomingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncomingEventKind {
    type Err = AiccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AiccError::InvalidInput(format!("unknown incoming event: {s}")))
    }
}

impl IncomingEvent {
    pub fn kind(&self) -> IncomingEventKind {
        match self {
            Self::ChatMessage(_) => IncomingEventKind::ChatMessage,
            Self::ChatRead(_) => IncomingEventKind::ChatRead,
            Self::ChatTyping(_) => IncomingEventKind::ChatTyping,
            Self::SystemConnected(_) => IncomingEventKind::SystemConnected,
            Self::SystemError(_) => IncomingEventKind::SystemError,
            Self::AgentWaitingUpdate(_) => IncomingEventKind::AgentWaitingUpdate,
            Self::AgentNewCustomer(_) => IncomingEventKind::AgentNewCustomer,
            Self::AgentSentimentUpdate(_) => IncomingEventKind::AgentSentimentUpdate,
            Self::StateChanged(_) => IncomingEventKind::StateChanged,
        }
    }
}

// ============================================================================
// Исходящие (клиент → сервер)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendData {
    pub session_id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<OutgoingAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReadSendData {
    pub session_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTypingSendData {
    pub session_id: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutgoingEvent {
    #[serde(rename = "chat:send")]
    ChatSend(ChatSendData),
    #[serde(rename = "chat:read")]
    ChatRead(ChatReadSendData),
    #[serde(rename = "chat:typing")]
    ChatTyping(ChatTypingSendData),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutgoingEventKind {
    ChatSend,
    ChatRead,
    ChatTyping,
}

impl OutgoingEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChatSend => "chat:send",
            Self::ChatRead => "chat:read",
            Self::ChatTyping => "chat:typing",
        }
    }
}

impl fmt::Display for OutgoingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OutgoingEvent {
    pub fn kind(&self) -> OutgoingEventKind {
        match self {
            Self::ChatSend(_) => OutgoingEventKind::ChatSend,
            Self::ChatRead(_) => OutgoingEventKind::ChatRead,
            Self::ChatTyping(_) => OutgoingEventKind::ChatTyping,
        }
    }
}
