// Протокол реального времени: события, шина, транспорт

pub mod bus;
pub mod events;
pub mod reconnect;
pub mod transport;
pub mod wire;

pub use bus::{EventBus, Listener, ListenerId, Subscription};
pub use events::{IncomingEvent, IncomingEventKind, OutgoingEvent, OutgoingEventKind};
pub use transport::{ConnectionState, MockTransport, Outbound};
