// Mirae AICC Core
// Real-time state engine for the customer chat widget and the agent workspace

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

// Модули
pub mod api;
pub mod config;
pub mod protocol;
pub mod state;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use config::Config;
pub use protocol::{ConnectionState, EventBus, IncomingEvent, IncomingEventKind, MockTransport};
pub use state::{AgentStore, AppContext, AuthStore, ChatStore};
pub use utils::error::{AiccError, Result};
pub use utils::logging::init_logging;
