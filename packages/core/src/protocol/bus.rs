// Шина событий: подписка по типу входящего события
//
// Доставка синхронная, в порядке регистрации. Ошибка или паника одного
// слушателя логируется и не мешает остальным.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::events::{IncomingEvent, IncomingEventKind};

/// Обработчик события
pub type Listener = Arc<dyn Fn(&IncomingEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Дескриптор подписки, возвращаемый [`EventBus::on`].
///
/// Удаление дескриптора НЕ отписывает слушателя, нужно вызвать
/// [`Subscription::unsubscribe`] или [`EventBus::off`].
#[derive(Debug, Clone)]
pub struct Subscription {
    bus: Weak<EventBus>,
    kind: IncomingEventKind,
    id: ListenerId,
}

impl Subscription {
    pub fn kind(&self) -> IncomingEventKind {
        self.kind
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Отписаться. `false`, если слушатель уже удалён или шины нет.
    pub fn unsubscribe(&self) -> bool {
        self.bus
            .upgrade()
            .map(|bus| bus.off(self.kind, self.id))
            .unwrap_or(false)
    }
}

#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<HashMap<IncomingEventKind, Vec<(ListenerId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Зарегистрировать слушателя
    pub fn on<F>(self: &Arc<Self>, kind: IncomingEventKind, listener: F) -> Subscription
    where
        F: Fn(&IncomingEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));

        tracing::trace!(event = kind.as_str(), listener = id.0, "listener registered");

        Subscription {
            bus: Arc::downgrade(self),
            kind,
            id,
        }
    }

    /// Удалить конкретного слушателя; no-op, если он не зарегистрирован
    pub fn off(&self, kind: IncomingEventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(registered) = listeners.get_mut(&kind) else {
            return false;
        };

        match registered.iter().position(|(listener_id, _)| *listener_id == id) {
            Some(pos) => {
                registered.remove(pos);
                if registered.is_empty() {
                    listeners.remove(&kind);
                }
                true
            }
            None => false,
        }
    }

    /// Удалить слушателей одного события или всех, если `kind` не задан
    pub fn remove_all_listeners(&self, kind: Option<IncomingEventKind>) {
        let mut listeners = self.listeners.lock();
        match kind {
            Some(kind) => {
                listeners.remove(&kind);
            }
            None => listeners.clear(),
        }
    }

    pub fn listener_count(&self, kind: IncomingEventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Доставить событие всем слушателям; возвращает число успешных вызовов.
    ///
    /// Список слушателей копируется до вызова, поэтому слушатель может
    /// подписываться и отписываться прямо из обработчика.
    pub fn emit(&self, event: &IncomingEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<(ListenerId, Listener)> = self
            .listeners
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(event = kind.as_str(), listener = id.0, error = %e, "listener failed");
                }
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(event = kind.as_str(), listener = id.0, %reason, "listener panicked");
                }
            }
        }
        delivered
    }
}
