// Типы ошибок

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiccError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API error [{code}]: {message}")]
    ApiError { code: String, message: String },

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for AiccError {
    fn from(error: serde_json::Error) -> Self {
        AiccError::SerializationError(error.to_string())
    }
}

impl From<crate::api::ApiError> for AiccError {
    fn from(error: crate::api::ApiError) -> Self {
        AiccError::ApiError {
            code: error.error.code,
            message: error.error.message,
        }
    }
}

pub type Result<T> = std::result::Result<T, AiccError>;
