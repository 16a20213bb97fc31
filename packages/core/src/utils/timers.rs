// Реестр таймеров с владением отменой
//
// Каждый таймер (истечение "печатает", heartbeat, симуляция) хранится под
// ключом. Вставка по существующему ключу отменяет предыдущий таймер,
// `clear()` отменяет всё. Drop реестра тоже отменяет всё.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Билет однократного таймера: ключ + поколение.
///
/// Сработавший таймер должен вызвать [`TimerRegistry::release`] со своим
/// билетом; если за это время ключ был перезапущен, билет устарел и
/// `release` вернёт `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerTicket<K> {
    pub key: K,
    pub generation: u64,
}

struct Entry {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct TimerRegistry<K> {
    entries: HashMap<K, Entry>,
    next_generation: u64,
}

impl<K> TimerRegistry<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Запланировать однократный вызов `fire` через `delay`.
    ///
    /// Дедлайн считается в момент вызова, а не при первом опросе задачи.
    /// Предыдущий таймер с тем же ключом отменяется.
    pub fn schedule<F>(&mut self, key: K, delay: Duration, fire: F) -> TimerTicket<K>
    where
        F: FnOnce(TimerTicket<K>) + Send + 'static,
    {
        let ticket = self.next_ticket(key.clone());
        let deadline = Instant::now() + delay;
        let fired = ticket.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire(fired);
        });

        self.insert(ticket.clone(), handle);
        ticket
    }

    /// Зарегистрировать произвольную долгоживущую задачу (интервалы, циклы).
    pub fn spawn<Fut>(&mut self, key: K, task: Fut) -> TimerTicket<K>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let ticket = self.next_ticket(key);
        let handle = tokio::spawn(task);
        self.insert(ticket.clone(), handle);
        ticket
    }

    /// Снять сработавший таймер с учёта. `false`, если билет устарел.
    pub fn release(&mut self, ticket: &TimerTicket<K>) -> bool {
        match self.entries.get(&ticket.key) {
            Some(entry) if entry.generation == ticket.generation => {
                self.entries.remove(&ticket.key);
                true
            }
            _ => false,
        }
    }

    /// Отменить таймер по ключу
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Отменить все таймеры, вернуть их количество
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.handle.abort();
        }
        count
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn next_ticket(&mut self, key: K) -> TimerTicket<K> {
        self.next_generation += 1;
        TimerTicket {
            key,
            generation: self.next_generation,
        }
    }

    fn insert(&mut self, ticket: TimerTicket<K>, handle: JoinHandle<()>) {
        let entry = Entry {
            generation: ticket.generation,
            handle,
        };
        if let Some(previous) = self.entries.insert(ticket.key, entry) {
            previous.handle.abort();
        }
    }
}

impl<K> Default for TimerRegistry<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for TimerRegistry<K> {
    fn drop(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.handle.abort();
        }
    }
}
