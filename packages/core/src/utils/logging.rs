// Логирование

use tracing_subscriber::EnvFilter;

/// Установить глобальный tracing-подписчик.
///
/// Уровень берётся из `RUST_LOG`, по умолчанию `info`. Повторный вызов
/// ничего не делает (подписчик уже установлен).
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
