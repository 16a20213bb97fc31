// Политика переподключения (exponential backoff)

use std::time::Duration;

use crate::config::Config;

/// Состояние переподключения: номер попытки n получает задержку
/// `initial * 2^(n-1)`, ограниченную `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectState {
    /// Количество выполненных попыток
    attempts: u32,
    /// Максимальное количество попыток
    max_attempts: u32,
    /// Начальная задержка в миллисекундах
    initial_delay_ms: u64,
    /// Максимальная задержка в миллисекундах
    max_delay_ms: u64,
}

impl ReconnectState {
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            initial_delay_ms,
            max_delay_ms,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.reconnect_initial_ms,
            config.reconnect_max_ms,
            config.max_reconnect_attempts,
        )
    }

    /// Засчитать попытку и вернуть её задержку
    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempts.min(31);
        let delay_ms = self
            .initial_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);

        self.attempts += 1;
        Duration::from_millis(delay_ms)
    }

    /// Сбросить счётчик попыток
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Проверить, можно ли продолжать попытки
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ReconnectState {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let mut state = ReconnectState::default();
        let delays: Vec<u64> = (0..5).map(|_| state.next_delay().as_millis() as u64).collect();

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
        assert_eq!(state.attempts(), 5);
        assert!(!state.can_retry());
    }

    #[test]
    fn test_delay_is_capped() {
        let mut state = ReconnectState::new(1000, 3000, 10);
        state.next_delay();
        state.next_delay();
        assert_eq!(state.next_delay(), Duration::from_millis(3000));
        assert_eq!(state.next_delay(), Duration::from_millis(3000));
    }

    #[test]
    fn test_reset() {
        let mut state = ReconnectState::new(500, 30_000, 2);
        state.next_delay();
        state.next_delay();
        assert!(!state.can_retry());

        state.reset();
        assert_eq!(state.attempts(), 0);
        assert!(state.can_retry());
        assert_eq!(state.next_delay(), Duration::from_millis(500));
    }
}
