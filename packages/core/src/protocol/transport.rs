// Симулятор WebSocket-транспорта
//
// Реального соединения нет: подключение, ответы сервера и фоновые события
// имитируются таймерами tokio. Состояние наблюдается снаружи только через
// событие `state:changed` на шине (плюс синхронный геттер `state()`).

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::api::auth::validate_token;
use crate::api::types::{Confidence, Message, RiskLevel, Sender, Sentiment, SentimentData};
use crate::config::Config;
use crate::protocol::bus::EventBus;
use crate::protocol::events::*;
use crate::protocol::reconnect::ReconnectState;
use crate::protocol::wire::pack_outgoing;
use crate::utils::timers::{TimerRegistry, TimerTicket};
use crate::utils::uuid::{generate_v4, simulated_message_id};

/// ID пользователя, от имени которого работает симулятор
pub const MOCK_USER_ID: &str = "mock-user-id";
pub const MOCK_SESSION_ID: &str = "mock-session-1";
pub const MOCK_CUSTOMER_ID: &str = "mock-customer-1";

/// Состояние WebSocket соединения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Disconnected => "DISCONNECTED",
            Self::Reconnecting => "RECONNECTING",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Канал исходящих событий. Сторы отправляют через него, не владея транспортом.
pub trait Outbound: Send + Sync {
    fn send(&self, event: OutgoingEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TransportTimer {
    Connect,
    Reconnect,
    Heartbeat,
    Simulation,
    /// Отложенное событие симулятора (ответ AI, эхо прочтения, конец "печатает")
    Scheduled(u64),
}

struct Inner {
    state: ConnectionState,
    reconnect: ReconnectState,
    auth_token: Option<String>,
    connection_id: Option<String>,
    timers: TimerRegistry<TransportTimer>,
    next_scheduled: u64,
}

impl Inner {
    /// Сменить состояние; событие добавляется в `out` только при реальном переходе
    fn set_state(
        &mut self,
        next: ConnectionState,
        reason: impl Into<String>,
        out: &mut Vec<IncomingEvent>,
    ) {
        let previous = self.state;
        if previous == next {
            return;
        }
        self.state = next;

        let attempts = self.reconnect.attempts();
        let reason = reason.into();
        tracing::debug!(from = %previous, to = %next, %reason, "transport state changed");

        out.push(IncomingEvent::StateChanged(StateChangedData {
            previous_state: previous,
            current_state: next,
            reconnect_attempt: (attempts > 0).then_some(attempts),
            max_reconnect_attempts: self.reconnect.max_attempts(),
            reason: Some(reason),
        }));
    }

    fn next_scheduled_key(&mut self) -> TransportTimer {
        self.next_scheduled += 1;
        TransportTimer::Scheduled(self.next_scheduled)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    bus: Arc<EventBus>,
    config: Config,
}

/// Мок-транспорт. Клонирование дешёвое: все клоны разделяют одно соединение.
///
/// Фоновые задачи держат только `Weak`-ссылку, поэтому удаление последнего
/// клона останавливает все таймеры.
#[derive(Clone)]
pub struct MockTransport {
    shared: Arc<Shared>,
}

impl MockTransport {
    pub fn new(config: Config, bus: Arc<EventBus>) -> Self {
        let inner = Inner {
            state: ConnectionState::Disconnected,
            reconnect: ReconnectState::from_config(&config),
            auth_token: None,
            connection_id: None,
            timers: TimerRegistry::new(),
            next_scheduled: 0,
        };

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                bus,
                config,
            }),
        }
    }

    fn weak(&self) -> Weak<Shared> {
        Arc::downgrade(&self.shared)
    }

    fn upgrade(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    fn emit_all(&self, events: Vec<IncomingEvent>) {
        for event in &events {
            self.shared.bus.emit(event);
        }
    }

    // ========================================================================
    // Состояние
    // ========================================================================

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.inner.lock().reconnect.attempts()
    }

    pub fn auth_token(&self) -> Option<String> {
        self.shared.inner.lock().auth_token.clone()
    }

    /// ID текущего соединения (выдаётся при каждом подключении)
    pub fn connection_id(&self) -> Option<String> {
        self.shared.inner.lock().connection_id.clone()
    }

    /// Количество живых таймеров и фоновых задач
    pub fn active_timers(&self) -> usize {
        self.shared.inner.lock().timers.len()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.shared.bus
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Установить токен. Смена токена при открытом соединении переподключает его.
    pub fn set_auth_token(&self, token: Option<String>) {
        let must_reconnect = {
            let mut inner = self.shared.inner.lock();
            let changed = inner.auth_token != token;
            inner.auth_token = token;
            changed && inner.state == ConnectionState::Connected
        };

        if must_reconnect {
            tracing::info!("auth token changed, re-establishing connection");
            self.disconnect();
            self.connect();
        }
    }

    // ========================================================================
    // Жизненный цикл соединения
    // ========================================================================

    /// Начать подключение. No-op, если уже подключено или идёт подключение.
    pub fn connect(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if matches!(
                inner.state,
                ConnectionState::Connected | ConnectionState::Connecting
            ) {
                tracing::warn!(state = %inner.state, "already connected or connecting");
                return;
            }

            tracing::info!("connecting");
            inner.set_state(ConnectionState::Connecting, "Connection initiated", &mut events);

            let weak = self.weak();
            inner.timers.schedule(
                TransportTimer::Connect,
                self.shared.config.connect_latency(),
                move |ticket| {
                    if let Some(transport) = Self::upgrade(&weak) {
                        transport.finish_connect(ticket);
                    }
                },
            );
        }
        self.emit_all(events);
    }

    fn finish_connect(&self, ticket: TimerTicket<TransportTimer>) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if !inner.timers.release(&ticket) {
                return;
            }

            inner.set_state(ConnectionState::Connected, "Connection established", &mut events);
            inner.reconnect.reset();

            let connection_id = format!("conn-{}", generate_v4());
            inner.connection_id = Some(connection_id.clone());
            tracing::info!(%connection_id, "connected");

            events.push(IncomingEvent::SystemConnected(SystemConnectedData {
                user_id: MOCK_USER_ID.to_string(),
                connection_id,
            }));

            let config = &self.shared.config;
            inner.timers.spawn(
                TransportTimer::Heartbeat,
                heartbeat_loop(self.weak(), config.token_refresh_interval()),
            );

            if config.simulation_enabled {
                tracing::debug!("starting event simulation");
                inner.timers.spawn(
                    TransportTimer::Simulation,
                    simulation_loop(
                        self.weak(),
                        config.simulation_min_interval_ms,
                        config.simulation_max_interval_ms,
                    ),
                );
            }
        }
        self.emit_all(events);
    }

    /// Закрыть соединение. Всегда приводит к DISCONNECTED.
    pub fn disconnect(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            let cancelled = inner.timers.clear();
            tracing::info!(cancelled, "disconnecting");

            inner.set_state(ConnectionState::Disconnected, "Disconnected by user", &mut events);
            inner.reconnect.reset();
            inner.connection_id = None;
        }
        self.emit_all(events);
    }

    /// Одна попытка переподключения с exponential backoff.
    ///
    /// После исчерпания попыток переходит в ERROR и публикует неповторяемую
    /// `system:error`; выйти из ERROR можно только явным `connect()`.
    pub fn reconnect(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();

            // Соединение потеряно: фоновые задачи прошлой сессии больше не нужны
            inner.timers.cancel(&TransportTimer::Heartbeat);
            inner.timers.cancel(&TransportTimer::Simulation);
            inner.connection_id = None;

            if !inner.reconnect.can_retry() {
                inner.timers.cancel(&TransportTimer::Reconnect);
                tracing::error!(
                    attempts = inner.reconnect.attempts(),
                    "max reconnect attempts reached"
                );
                inner.set_state(
                    ConnectionState::Error,
                    "Max reconnect attempts reached",
                    &mut events,
                );
                events.push(IncomingEvent::SystemError(SystemErrorData {
                    code: "MAX_RECONNECT_ATTEMPTS".to_string(),
                    message: "최대 재연결 시도 횟수를 초과했습니다.".to_string(),
                    retryable: false,
                }));
            } else {
                let reason = format!("Reconnecting (attempt {})", inner.reconnect.attempts() + 1);
                inner.set_state(ConnectionState::Reconnecting, reason, &mut events);

                let delay = inner.reconnect.next_delay();
                tracing::info!(
                    attempt = inner.reconnect.attempts(),
                    max = inner.reconnect.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );

                let weak = self.weak();
                inner
                    .timers
                    .schedule(TransportTimer::Reconnect, delay, move |ticket| {
                        if let Some(transport) = Self::upgrade(&weak) {
                            let current = transport.shared.inner.lock().timers.release(&ticket);
                            if current {
                                transport.connect();
                            }
                        }
                    });
            }
        }
        self.emit_all(events);
    }

    // ========================================================================
    // Отправка
    // ========================================================================

    /// Отправить событие серверу. Без соединения только пишет предупреждение.
    pub fn send(&self, event: OutgoingEvent) {
        let mut inner = self.shared.inner.lock();
        if inner.state != ConnectionState::Connected {
            tracing::warn!(event = event.kind().as_str(), state = %inner.state, "cannot send: not connected");
            return;
        }

        match pack_outgoing(&event) {
            Ok(frame) => tracing::debug!(%frame, "sent"),
            Err(e) => tracing::warn!(error = %e, "failed to encode outgoing frame"),
        }

        let config = &self.shared.config;
        match event {
            OutgoingEvent::ChatSend(data) => {
                let delay = random_delay(config.ai_response_min_ms, config.ai_response_max_ms);
                let reply = simulated_ai_response(&data);
                self.schedule_event(&mut inner, delay, reply);
            }
            OutgoingEvent::ChatRead(data) => {
                let receipt = IncomingEvent::ChatRead(ChatReadData {
                    session_id: data.session_id,
                    message_id: data.message_id,
                    user_id: MOCK_USER_ID.to_string(),
                });
                let delay = Duration::from_millis(config.read_receipt_delay_ms);
                self.schedule_event(&mut inner, delay, receipt);
            }
            OutgoingEvent::ChatTyping(_) => {}
        }
    }

    fn schedule_event(&self, inner: &mut Inner, delay: Duration, event: IncomingEvent) {
        let key = inner.next_scheduled_key();
        let weak = self.weak();
        inner.timers.schedule(key, delay, move |ticket| {
            if let Some(transport) = Self::upgrade(&weak) {
                transport.fire_scheduled(ticket, event);
            }
        });
    }

    fn fire_scheduled(&self, ticket: TimerTicket<TransportTimer>, event: IncomingEvent) {
        let live = {
            let mut inner = self.shared.inner.lock();
            inner.timers.release(&ticket) && inner.state == ConnectionState::Connected
        };
        if live {
            self.shared.bus.emit(&event);
        }
    }

    // ========================================================================
    // Фоновые события
    // ========================================================================

    fn heartbeat(&self) {
        match self.auth_token() {
            Some(token) if validate_token(&token) => {
                tracing::debug!("token refresh check: token is valid");
            }
            Some(_) => tracing::warn!("token refresh check: token is expired or malformed"),
            None => tracing::trace!("token refresh check: no token"),
        }
    }

    fn simulate_random_event(&self) {
        let mut events = Vec::new();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != ConnectionState::Connected {
                return;
            }

            match rand::thread_rng().gen_range(0..4) {
                0 => events.push(simulated_chat_message()),
                1 => events.push(simulated_waiting_update()),
                2 => events.push(simulated_sentiment_update()),
                _ => {
                    events.push(simulated_typing(true));
                    let delay = Duration::from_millis(self.shared.config.simulated_typing_ms);
                    self.schedule_event(&mut inner, delay, simulated_typing(false));
                }
            }
        }

        for event in &events {
            tracing::debug!(event = event.kind().as_str(), "simulated event");
        }
        self.emit_all(events);
    }
}

impl Outbound for MockTransport {
    fn send(&self, event: OutgoingEvent) {
        MockTransport::send(self, event);
    }
}

async fn heartbeat_loop(weak: Weak<Shared>, period: Duration) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        match MockTransport::upgrade(&weak) {
            Some(transport) => transport.heartbeat(),
            None => break,
        }
    }
}

async fn simulation_loop(weak: Weak<Shared>, min_ms: u64, max_ms: u64) {
    loop {
        tokio::time::sleep(random_delay(min_ms, max_ms)).await;
        match MockTransport::upgrade(&weak) {
            Some(transport) => transport.simulate_random_event(),
            None => break,
        }
    }
}

// ============================================================================
// Генерация синтетического контента
// ============================================================================

fn random_delay(min_ms: u64, max_ms: u64) -> Duration {
    let ms = if min_ms >= max_ms {
        min_ms
    } else {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    };
    Duration::from_millis(ms)
}

fn pick<'a>(items: &[&'a str]) -> &'a str {
    items.choose(&mut rand::thread_rng()).copied().unwrap_or_default()
}

fn assistant_message(session_id: &str, text: String) -> Message {
    let mut message = Message::new(simulated_message_id(), session_id, Sender::Ai, text);
    message.sender_id = Some("ai-agent-1".to_string());
    message.sender_name = Some("AI Assistant".to_string());
    message
}

fn simulated_chat_message() -> IncomingEvent {
    let text = pick(&[
        "안녕하세요! 무엇을 도와드릴까요?",
        "계좌 조회를 원하시나요?",
        "대출 상품 안내가 필요하신가요?",
        "최근 거래 내역을 확인하시겠습니까?",
        "다른 서비스가 필요하시면 말씀해 주세요.",
    ]);

    let mut rng = rand::thread_rng();
    let mut message = assistant_message(MOCK_SESSION_ID, text.to_string());
    message.confidence = Some(if rng.gen_bool(0.7) {
        Confidence::High
    } else if rng.gen_bool(0.5) {
        Confidence::Medium
    } else {
        Confidence::Low
    });
    message.has_audio = rng.gen_bool(0.3);

    IncomingEvent::ChatMessage(ChatMessageData {
        session_id: MOCK_SESSION_ID.to_string(),
        message,
    })
}

fn simulated_ai_response(request: &ChatSendData) -> IncomingEvent {
    let echo = format!("네, \"{}\"에 대해 안내해 드리겠습니다.", request.text);
    let text = match rand::thread_rng().gen_range(0..4) {
        0 => echo,
        1 => "요청하신 내용을 확인했습니다.".to_string(),
        2 => "추가 정보가 필요하시면 말씀해 주세요.".to_string(),
        _ => "잠시만 기다려 주시면 상세 정보를 안내해 드리겠습니다.".to_string(),
    };

    let replies: &[&str] = match rand::thread_rng().gen_range(0..3) {
        0 => &["계좌 조회", "거래 내역", "대출 상품"],
        1 => &["네", "아니오", "더 알아보기"],
        _ => &["상담원 연결", "자동 응답", "메인 메뉴"],
    };

    let mut message = assistant_message(&request.session_id, text);
    message.confidence = Some(Confidence::High);
    message.has_audio = true;
    message.quick_replies = replies.iter().map(|r| r.to_string()).collect();

    IncomingEvent::ChatMessage(ChatMessageData {
        session_id: request.session_id.clone(),
        message,
    })
}

fn simulated_waiting_update() -> IncomingEvent {
    let mut rng = rand::thread_rng();
    IncomingEvent::AgentWaitingUpdate(AgentWaitingUpdateData {
        waiting_count: rng.gen_range(1..=20),
        consulting_count: rng.gen_range(1..=10),
    })
}

fn simulated_sentiment_update() -> IncomingEvent {
    let mut rng = rand::thread_rng();
    let current_sentiment = *[
        Sentiment::Positive,
        Sentiment::Neutral,
        Sentiment::Negative,
        Sentiment::Angry,
    ]
    .choose(&mut rng)
    .unwrap_or(&Sentiment::Neutral);

    let risk_level = if rng.gen_bool(0.3) {
        RiskLevel::High
    } else if rng.gen_bool(0.6) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    IncomingEvent::AgentSentimentUpdate(AgentSentimentUpdateData {
        customer_id: MOCK_CUSTOMER_ID.to_string(),
        sentiment: SentimentData {
            customer_id: MOCK_CUSTOMER_ID.to_string(),
            customer_name: "Mock Customer".to_string(),
            current_sentiment,
            sentiment_score: rng.gen_range(-100..100),
            sentiment_history: Vec::new(),
            keywords: Vec::new(),
            risk_level,
            suggested_actions: None,
        },
    })
}

fn simulated_typing(is_typing: bool) -> IncomingEvent {
    IncomingEvent::ChatTyping(ChatTypingData {
        session_id: MOCK_SESSION_ID.to_string(),
        user_id: MOCK_USER_ID.to_string(),
        is_typing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance_ms(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        settle().await;
    }

    fn recorder(bus: &Arc<EventBus>) -> Arc<Mutex<Vec<IncomingEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in IncomingEventKind::ALL {
            let seen = seen.clone();
            bus.on(kind, move |event| {
                seen.lock().push(event.clone());
                Ok(())
            });
        }
        seen
    }

    fn transitions(events: &[IncomingEvent]) -> Vec<(ConnectionState, ConnectionState)> {
        events
            .iter()
            .filter_map(|e| match e {
                IncomingEvent::StateChanged(data) => {
                    Some((data.previous_state, data.current_state))
                }
                _ => None,
            })
            .collect()
    }

    fn transport() -> (MockTransport, Arc<Mutex<Vec<IncomingEvent>>>) {
        let bus = EventBus::new();
        let seen = recorder(&bus);
        (MockTransport::new(Config::without_simulation(), bus), seen)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_after_latency() {
        let (transport, seen) = transport();

        transport.connect();
        assert_eq!(transport.state(), ConnectionState::Connecting);

        advance_ms(499).await;
        assert_eq!(transport.state(), ConnectionState::Connecting);

        advance_ms(1).await;
        assert!(transport.is_connected());
        assert!(transport.connection_id().is_some());

        let events = seen.lock().clone();
        assert_eq!(
            transitions(&events),
            vec![
                (ConnectionState::Disconnected, ConnectionState::Connecting),
                (ConnectionState::Connecting, ConnectionState::Connected),
            ]
        );
        assert!(events.iter().any(|e| matches!(
            e,
            IncomingEvent::SystemConnected(data) if data.user_id == MOCK_USER_ID
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_while_connecting() {
        let (transport, seen) = transport();

        transport.connect();
        transport.connect();
        advance_ms(500).await;
        transport.connect();

        assert_eq!(transitions(&seen.lock()).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_while_connecting_wins() {
        let (transport, _seen) = transport();

        transport.connect();
        transport.disconnect();
        assert_eq!(transport.state(), ConnectionState::Disconnected);

        advance_ms(1000).await;
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert_eq!(transport.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_is_unconditional() {
        let (transport, seen) = transport();

        transport.disconnect();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(transitions(&seen.lock()).is_empty());

        transport.connect();
        advance_ms(500).await;
        transport.disconnect();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert_eq!(transport.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_backoff_and_reset() {
        let (transport, seen) = transport();

        transport.reconnect();
        assert_eq!(transport.state(), ConnectionState::Reconnecting);
        assert_eq!(transport.reconnect_attempts(), 1);

        advance_ms(999).await;
        assert_eq!(transport.state(), ConnectionState::Reconnecting);
        advance_ms(1).await;
        assert_eq!(transport.state(), ConnectionState::Connecting);

        advance_ms(500).await;
        assert!(transport.is_connected());
        assert_eq!(transport.reconnect_attempts(), 0);

        let events = seen.lock().clone();
        let connected = events.iter().find_map(|e| match e {
            IncomingEvent::StateChanged(data)
                if data.current_state == ConnectionState::Connected =>
            {
                Some(data.clone())
            }
            _ => None,
        });
        assert_eq!(connected.and_then(|d| d.reconnect_attempt), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_exhaustion_is_terminal() {
        let (transport, seen) = transport();

        for _ in 0..5 {
            transport.reconnect();
        }
        assert_eq!(transport.reconnect_attempts(), 5);

        transport.reconnect();
        assert_eq!(transport.state(), ConnectionState::Error);

        let error = seen.lock().iter().find_map(|e| match e {
            IncomingEvent::SystemError(data) => Some(data.clone()),
            _ => None,
        });
        let error = error.unwrap();
        assert_eq!(error.code, "MAX_RECONNECT_ATTEMPTS");
        assert!(!error.retryable);

        assert_eq!(transport.active_timers(), 0);
        advance_ms(60_000).await;
        assert_eq!(transport.state(), ConnectionState::Error);

        transport.connect();
        advance_ms(500).await;
        assert!(transport.is_connected());
        assert_eq!(transport.reconnect_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_state_waits_for_explicit_connect() {
        let (transport, _seen) = transport();

        for _ in 0..6 {
            transport.reconnect();
        }
        assert_eq!(transport.state(), ConnectionState::Error);

        advance_ms(40_000).await;
        assert_eq!(transport.state(), ConnectionState::Error);
        assert_eq!(transport.connection_id(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_from_connected_stops_session_tasks() {
        let (transport, _seen) = transport();
        transport.connect();
        advance_ms(500).await;
        assert!(transport.connection_id().is_some());

        transport.reconnect();
        assert_eq!(transport.state(), ConnectionState::Reconnecting);
        assert_eq!(transport.connection_id(), None);
        // остался только таймер переподключения
        assert_eq!(transport.active_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_connection() {
        let (transport, seen) = transport();

        transport.send(OutgoingEvent::ChatSend(ChatSendData {
            session_id: "session-1".to_string(),
            text: "안녕".to_string(),
            attachment: None,
        }));
        advance_ms(5000).await;

        assert!(seen.lock().is_empty());
        assert_eq!(transport.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_send_produces_ai_reply() {
        let (transport, seen) = transport();
        transport.connect();
        advance_ms(500).await;
        seen.lock().clear();

        transport.send(OutgoingEvent::ChatSend(ChatSendData {
            session_id: "session-1".to_string(),
            text: "금리 문의".to_string(),
            attachment: None,
        }));

        advance_ms(999).await;
        assert!(seen.lock().is_empty());

        advance_ms(2001).await;
        let events = seen.lock().clone();
        assert_eq!(events.len(), 1);
        match &events[0] {
            IncomingEvent::ChatMessage(data) => {
                assert_eq!(data.session_id, "session-1");
                assert_eq!(data.message.sender, Sender::Ai);
                assert_eq!(data.message.quick_replies.len(), 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_read_echo() {
        let (transport, seen) = transport();
        transport.connect();
        advance_ms(500).await;
        seen.lock().clear();

        Outbound::send(
            &transport,
            OutgoingEvent::ChatRead(ChatReadSendData {
                session_id: "session-1".to_string(),
                message_id: "msg-1-3".to_string(),
            }),
        );
        advance_ms(800).await;

        let events = seen.lock().clone();
        assert_eq!(
            events,
            vec![IncomingEvent::ChatRead(ChatReadData {
                session_id: "session-1".to_string(),
                message_id: "msg-1-3".to_string(),
                user_id: MOCK_USER_ID.to_string(),
            })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_change_while_connected_reconnects() {
        let (transport, seen) = transport();

        transport.set_auth_token(Some("a".to_string()));
        assert!(transitions(&seen.lock()).is_empty());

        transport.connect();
        advance_ms(500).await;
        let first_connection = transport.connection_id();
        seen.lock().clear();

        transport.set_auth_token(Some("a".to_string()));
        assert!(seen.lock().is_empty());

        transport.set_auth_token(Some("b".to_string()));
        assert_eq!(
            transitions(&seen.lock()),
            vec![
                (ConnectionState::Connected, ConnectionState::Disconnected),
                (ConnectionState::Disconnected, ConnectionState::Connecting),
            ]
        );

        advance_ms(500).await;
        assert!(transport.is_connected());
        assert_ne!(transport.connection_id(), first_connection);
        assert_eq!(transport.auth_token().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_emits_while_connected() {
        let bus = EventBus::new();
        let seen = recorder(&bus);
        let transport = MockTransport::new(Config::default(), bus);

        transport.connect();
        advance_ms(500).await;
        seen.lock().clear();

        advance_ms(10_000).await;
        let simulated = seen
            .lock()
            .iter()
            .filter(|e| !matches!(e, IncomingEvent::StateChanged(_)))
            .count();
        assert!(simulated >= 1);

        transport.disconnect();
        seen.lock().clear();
        advance_ms(60_000).await;
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_transport_stops_timers() {
        let bus = EventBus::new();
        let seen = recorder(&bus);
        let transport = MockTransport::new(Config::default(), bus);

        transport.connect();
        drop(transport);

        advance_ms(60_000).await;
        assert!(transitions(&seen.lock()).len() <= 1);
    }
}
