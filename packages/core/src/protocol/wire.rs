// Wire format (JSON конверт WebSocket-кадра)
// `{ "event": "...", "data": {...}, "timestamp": "..." }`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::protocol::events::{IncomingEvent, OutgoingEvent};
use crate::utils::error::{AiccError, Result};
use crate::utils::time::now_iso;

/// Кадр в обе стороны
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsEnvelope {
    pub event: String,
    pub data: Value,
    pub timestamp: String,
}

impl WsEnvelope {
    fn from_tagged<T: Serialize>(tagged: &T) -> Result<Self> {
        let mut value = serde_json::to_value(tagged)?;
        let event = value
            .get("event")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AiccError::SerializationError("event tag is missing".to_string()))?;
        let data = value
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);

        Ok(Self {
            event,
            data,
            timestamp: now_iso(),
        })
    }

    fn into_tagged(self) -> Value {
        serde_json::json!({ "event": self.event, "data": self.data })
    }
}

/// Упаковать исходящее событие (клиент -> сервер)
pub fn pack_outgoing(event: &OutgoingEvent) -> Result<String> {
    let envelope = WsEnvelope::from_tagged(event)?;
    Ok(serde_json::to_string(&envelope)?)
}

/// Упаковать входящее событие (используется симулятором и в тестах)
pub fn pack_incoming(event: &IncomingEvent) -> Result<String> {
    let envelope = WsEnvelope::from_tagged(event)?;
    Ok(serde_json::to_string(&envelope)?)
}

/// Распаковать кадр сервера
pub fn unpack_incoming(frame: &str) -> Result<IncomingEvent> {
    let envelope: WsEnvelope = serde_json::from_str(frame)?;
    let event = envelope.event.clone();
    serde_json::from_value(envelope.into_tagged()).map_err(|e| {
        AiccError::SerializationError(format!("invalid `{event}` frame: {e}"))
    })
}
