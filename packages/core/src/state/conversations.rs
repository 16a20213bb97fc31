// Состояние бесед: кеш сообщений по сессиям и индикаторы "печатает"

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::api::types::Message;
use crate::utils::timers::{TimerRegistry, TimerTicket};

/// Кеш сообщений. Порядок внутри сессии = порядок поступления, без сортировки.
#[derive(Debug, Default)]
pub struct MessageCache {
    sessions: HashMap<String, Vec<Message>>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Загружена ли история сессии
    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&[Message]> {
        self.sessions.get(session_id).map(Vec::as_slice)
    }

    /// Заменить историю сессии целиком
    pub fn insert(&mut self, session_id: impl Into<String>, messages: Vec<Message>) {
        self.sessions.insert(session_id.into(), messages);
    }

    /// Добавить сообщения, создав историю при необходимости
    pub fn append(&mut self, session_id: &str, messages: impl IntoIterator<Item = Message>) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .extend(messages);
    }

    /// Добавить сообщение только в уже загруженную историю.
    ///
    /// `false`, если история не загружена или сообщение с таким ID уже есть.
    pub fn append_existing(&mut self, session_id: &str, message: Message) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(messages) if !messages.iter().any(|m| m.id == message.id) => {
                messages.push(message);
                true
            }
            _ => false,
        }
    }

    /// Отметить сообщение прочитанным (только false → true)
    pub fn mark_read(&mut self, session_id: &str, message_id: &str) -> bool {
        let Some(message) = self
            .sessions
            .get_mut(session_id)
            .and_then(|messages| messages.iter_mut().find(|m| m.id == message_id))
        else {
            return false;
        };

        if message.read {
            return false;
        }
        message.read = true;
        true
    }

    /// Найти сообщение во всех сессиях
    pub fn find(&self, message_id: &str) -> Option<&Message> {
        self.sessions.values().flatten().find(|m| m.id == message_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    /// Все сообщения всех сессий (для сохранения истории)
    pub fn all_messages(&self) -> Vec<Message> {
        self.sessions.values().flatten().cloned().collect()
    }
}

pub type TypingKey = (String, String);

/// Кто сейчас печатает, по сессиям. Каждая пара (сессия, пользователь)
/// имеет свой таймер автосброса.
#[derive(Default)]
pub struct TypingIndicators {
    active: HashMap<String, BTreeSet<String>>,
    timers: TimerRegistry<TypingKey>,
}

impl TypingIndicators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Отметить, что пользователь печатает; перезапускает таймер автосброса.
    ///
    /// `expire` вызывается по истечении `ttl` с билетом, который нужно
    /// передать в [`TypingIndicators::expire`].
    pub fn start<F>(&mut self, session_id: &str, user_id: &str, ttl: Duration, expire: F)
    where
        F: FnOnce(TimerTicket<TypingKey>) + Send + 'static,
    {
        self.active
            .entry(session_id.to_string())
            .or_default()
            .insert(user_id.to_string());

        let key = (session_id.to_string(), user_id.to_string());
        self.timers.schedule(key, ttl, expire);
    }

    /// Явный сброс (`isTyping: false`)
    pub fn stop(&mut self, session_id: &str, user_id: &str) -> bool {
        self.timers
            .cancel(&(session_id.to_string(), user_id.to_string()));
        self.remove(session_id, user_id)
    }

    /// Сработал таймер. Устаревший билет (сигнал обновлялся) игнорируется.
    pub fn expire(&mut self, ticket: &TimerTicket<TypingKey>) -> bool {
        if !self.timers.release(ticket) {
            return false;
        }
        let (session_id, user_id) = &ticket.key;
        self.remove(session_id, user_id)
    }

    fn remove(&mut self, session_id: &str, user_id: &str) -> bool {
        let Some(users) = self.active.get_mut(session_id) else {
            return false;
        };
        let removed = users.remove(user_id);
        if users.is_empty() {
            self.active.remove(session_id);
        }
        removed
    }

    pub fn is_typing(&self, session_id: &str) -> bool {
        self.active
            .get(session_id)
            .map_or(false, |users| !users.is_empty())
    }

    pub fn users(&self, session_id: &str) -> Vec<String> {
        self.active
            .get(session_id)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Снять все индикаторы и отменить все таймеры
    pub fn clear(&mut self) -> usize {
        self.active.clear();
        self.timers.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::Sender;

    fn message(id: &str, session: &str) -> Message {
        Message::new(id, session, Sender::User, "hi")
    }

    #[test]
    fn test_append_keeps_arrival_order() {
        let mut cache = MessageCache::new();
        let mut late = message("b", "s1");
        late.timestamp = chrono::Utc::now() - chrono::Duration::hours(1);

        cache.append("s1", [message("a", "s1"), late]);
        let ids: Vec<_> = cache.get("s1").unwrap().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_append_existing_requires_history() {
        let mut cache = MessageCache::new();
        assert!(!cache.append_existing("s1", message("a", "s1")));
        assert!(!cache.contains("s1"));

        cache.insert("s1", Vec::new());
        assert!(cache.append_existing("s1", message("a", "s1")));
        assert!(!cache.append_existing("s1", message("a", "s1")));
        assert_eq!(cache.get("s1").unwrap().len(), 1);
    }

    #[test]
    fn test_mark_read_is_one_way() {
        let mut cache = MessageCache::new();
        cache.insert("s1", vec![message("a", "s1")]);

        assert!(cache.mark_read("s1", "a"));
        assert!(!cache.mark_read("s1", "a"));
        assert!(!cache.mark_read("s1", "missing"));
        assert!(cache.find("a").unwrap().read);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_stop_cancels_timer() {
        let mut typing = TypingIndicators::new();
        typing.start("s1", "u1", Duration::from_secs(3), |_| {});
        typing.start("s1", "u2", Duration::from_secs(3), |_| {});

        assert!(typing.is_typing("s1"));
        assert_eq!(typing.users("s1"), vec!["u1", "u2"]);

        assert!(typing.stop("s1", "u1"));
        assert_eq!(typing.pending_timers(), 1);
        assert_eq!(typing.clear(), 1);
        assert!(!typing.is_typing("s1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_expiry_is_ignored() {
        let mut typing = TypingIndicators::new();
        typing.start("s1", "u1", Duration::from_secs(3), |_| {});
        let stale = TimerTicket {
            key: ("s1".to_string(), "u1".to_string()),
            generation: 0,
        };

        assert!(!typing.expire(&stale));
        assert!(typing.is_typing("s1"));
    }
}
