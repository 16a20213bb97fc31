// Стор чата: сессии, кеш сообщений, индикаторы "печатает"
//
// Асинхронные команды никогда не возвращают ошибку: неудача превращается в
// строку `error` с меткой операции. Блокировка состояния не удерживается ни
// во время ожидания API, ни во время отправки исходящих событий.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::api::chat::ChatApi;
use crate::api::types::{
    ChatSession, CreateSessionOptions, Message, OutgoingAttachment, QuickReplyRequest,
    SendMessageRequest, SendMessageResponse,
};
use crate::config::Config;
use crate::protocol::bus::{EventBus, Subscription};
use crate::protocol::events::{
    ChatMessageData, ChatReadData, ChatReadSendData, ChatTypingData, ChatTypingSendData,
    IncomingEvent, IncomingEventKind, OutgoingEvent,
};
use crate::protocol::transport::Outbound;
use crate::state::conversations::{MessageCache, TypingIndicators, TypingKey};
use crate::state::{Revision, UiState};
use crate::utils::timers::TimerTicket;
use crate::utils::uuid::session_id_from_message_id;

const LOAD_SESSIONS_FAILED: &str = "세션 목록을 불러오는데 실패했습니다.";
const LOAD_MESSAGES_FAILED: &str = "메시지를 불러오는데 실패했습니다.";
const SEND_FAILED: &str = "메시지 전송에 실패했습니다.";
const QUICK_REPLY_FAILED: &str = "빠른 답변 전송에 실패했습니다.";
const CREATE_SESSION_FAILED: &str = "세션 생성에 실패했습니다.";
const VOICE_FAILED: &str = "음성 업로드에 실패했습니다.";
const NO_SESSION: &str = "선택된 세션이 없습니다.";
const VOICE_PREVIEW: &str = "음성 메시지";

#[derive(Default)]
struct ChatState {
    sessions: Vec<ChatSession>,
    current_session_id: Option<String>,
    messages: MessageCache,
    typing: TypingIndicators,
    ui: UiState,
}

impl ChatState {
    fn session_mut(&mut self, session_id: &str) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == session_id)
    }

    fn touch_session(&mut self, session_id: &str, preview: String, time: DateTime<Utc>) {
        if let Some(session) = self.session_mut(session_id) {
            session.preview = preview;
            session.last_message_time = time;
        }
    }

    /// Применить ответ отправки: сообщение пользователя строго перед ответом AI
    fn apply_sent(&mut self, session_id: &str, response: SendMessageResponse) {
        let SendMessageResponse {
            message,
            ai_response,
        } = response;

        let latest = ai_response.as_ref().unwrap_or(&message);
        let preview = if latest.text.is_empty() {
            message.text.clone()
        } else {
            latest.text.clone()
        };
        let time = latest.timestamp;

        self.messages
            .append(session_id, std::iter::once(message).chain(ai_response));
        self.touch_session(session_id, preview, time);
    }

    fn is_current(&self, session_id: &str) -> bool {
        self.current_session_id.as_deref() == Some(session_id)
    }
}

struct ChatShared {
    state: Mutex<ChatState>,
    api: Arc<dyn ChatApi>,
    bus: Arc<EventBus>,
    outbound: Mutex<Option<Arc<dyn Outbound>>>,
    config: Config,
    subscriptions: Mutex<Vec<Subscription>>,
    revision: Revision,
}

/// Стор чата. Клоны разделяют одно состояние.
#[derive(Clone)]
pub struct ChatStore {
    shared: Arc<ChatShared>,
}

impl ChatStore {
    pub fn new(api: Arc<dyn ChatApi>, bus: Arc<EventBus>, config: Config) -> Self {
        Self {
            shared: Arc::new(ChatShared {
                state: Mutex::new(ChatState::default()),
                api,
                bus,
                outbound: Mutex::new(None),
                config,
                subscriptions: Mutex::new(Vec::new()),
                revision: Revision::new(),
            }),
        }
    }

    /// Канал для `chat:typing` / `chat:read`
    pub fn set_outbound(&self, outbound: Arc<dyn Outbound>) {
        *self.shared.outbound.lock() = Some(outbound);
    }

    fn weak(&self) -> Weak<ChatShared> {
        Arc::downgrade(&self.shared)
    }

    fn update<R>(&self, apply: impl FnOnce(&mut ChatState) -> R) -> R {
        let result = {
            let mut state = self.shared.state.lock();
            apply(&mut *state)
        };
        self.shared.revision.bump();
        result
    }

    fn read<R>(&self, view: impl FnOnce(&ChatState) -> R) -> R {
        view(&*self.shared.state.lock())
    }

    fn send_outgoing(&self, event: OutgoingEvent) -> bool {
        let outbound = self.shared.outbound.lock().clone();
        match outbound {
            Some(outbound) => {
                outbound.send(event);
                true
            }
            None => {
                tracing::warn!(event = event.kind().as_str(), "no outbound channel, event dropped");
                false
            }
        }
    }

    // ========================================================================
    // Команды
    // ========================================================================

    pub async fn load_sessions(&self) {
        self.update(|s| s.ui.begin_loading());

        let result = self.shared.api.get_sessions().await;

        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => s.sessions = response.data,
                Err(e) => s.ui.fail(LOAD_SESSIONS_FAILED, &e),
            }
        });
    }

    /// Выбрать сессию. История загружается только при первом выборе.
    pub async fn select_session(&self, session_id: &str) {
        let cached = self.update(|s| {
            s.ui.begin_loading();
            s.messages.contains(session_id)
        });

        if !cached {
            let result = self.shared.api.get_messages(session_id).await;
            let failed = self.update(|s| match result {
                Ok(response) => {
                    if !s.messages.contains(session_id) {
                        s.messages.insert(session_id, response.data);
                    }
                    false
                }
                Err(e) => {
                    s.ui.is_loading = false;
                    s.ui.fail(LOAD_MESSAGES_FAILED, &e);
                    true
                }
            });
            if failed {
                return;
            }
        }

        self.update(|s| {
            s.current_session_id = Some(session_id.to_string());
            if let Some(session) = s.session_mut(session_id) {
                session.unread_count = 0;
            }
            s.ui.is_loading = false;
        });
        tracing::debug!(session_id, cached, "session selected");
    }

    /// Отправить сообщение в текущую сессию
    pub async fn send_message(&self, text: &str, attachment: Option<OutgoingAttachment>) {
        let Some(session_id) = self.require_session() else {
            return;
        };
        self.update(|s| s.ui.begin_sending());

        let request = SendMessageRequest {
            text: text.to_string(),
            attachment,
        };
        let result = self.shared.api.send_message(&session_id, request).await;

        self.update(|s| {
            s.ui.is_sending = false;
            match result {
                Ok(response) => s.apply_sent(&session_id, response.data),
                Err(e) => s.ui.fail(SEND_FAILED, &e),
            }
        });
    }

    /// Ответить кнопкой быстрого ответа на сообщение `message_id`.
    ///
    /// Сессия берётся из кеша, затем из формата ID сообщения, затем текущая.
    pub async fn send_quick_reply(&self, message_id: &str, reply: &str) {
        let resolved = self.read(|s| {
            s.messages
                .find(message_id)
                .map(|m| m.session_id.clone())
                .or_else(|| session_id_from_message_id(message_id).map(str::to_string))
                .or_else(|| s.current_session_id.clone())
        });
        let Some(session_id) = resolved else {
            self.update(|s| s.ui.set_error(Some(NO_SESSION.to_string())));
            return;
        };
        self.update(|s| s.ui.begin_sending());

        let request = QuickReplyRequest {
            reply: reply.to_string(),
        };
        let result = self.shared.api.send_quick_reply(message_id, request).await;

        self.update(|s| {
            s.ui.is_sending = false;
            match result {
                Ok(response) => s.apply_sent(&session_id, response.data),
                Err(e) => s.ui.fail(QUICK_REPLY_FAILED, &e),
            }
        });
    }

    /// Создать сессию: она встаёт в начало списка и становится текущей
    pub async fn create_session(&self, options: CreateSessionOptions) {
        self.update(|s| s.ui.begin_loading());

        let result = self.shared.api.create_session(options).await;

        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => {
                    let session = response.data;
                    tracing::info!(session_id = %session.id, "session created");
                    s.messages.insert(session.id.clone(), Vec::new());
                    s.current_session_id = Some(session.id.clone());
                    s.sessions.insert(0, session);
                }
                Err(e) => s.ui.fail(CREATE_SESSION_FAILED, &e),
            }
        });
    }

    /// Загрузить голосовое сообщение в текущую сессию
    pub async fn upload_voice(&self, audio: Vec<u8>, duration_secs: f64) {
        let Some(session_id) = self.require_session() else {
            return;
        };
        self.update(|s| s.ui.begin_sending());

        let result = self
            .shared
            .api
            .upload_voice(&session_id, audio, duration_secs)
            .await;

        self.update(|s| {
            s.ui.is_sending = false;
            match result {
                Ok(response) => {
                    let upload = response.data;
                    let preview = upload
                        .transcription
                        .unwrap_or_else(|| VOICE_PREVIEW.to_string());
                    let time = upload.message.timestamp;
                    s.messages.append(&session_id, [upload.message]);
                    s.touch_session(&session_id, preview, time);
                }
                Err(e) => s.ui.fail(VOICE_FAILED, &e),
            }
        });
    }

    fn require_session(&self) -> Option<String> {
        let current = self.read(|s| s.current_session_id.clone());
        if current.is_none() {
            self.update(|s| s.ui.set_error(Some(NO_SESSION.to_string())));
        }
        current
    }

    /// Сообщить собеседнику, что пользователь печатает в текущей сессии
    pub fn notify_typing(&self, is_typing: bool) -> bool {
        let Some(session_id) = self.current_session_id() else {
            return false;
        };
        self.send_outgoing(OutgoingEvent::ChatTyping(ChatTypingSendData {
            session_id,
            is_typing,
        }))
    }

    /// Отметить сообщение текущей сессии прочитанным и отправить `chat:read`
    pub fn mark_read(&self, message_id: &str) -> bool {
        let Some(session_id) = self.current_session_id() else {
            return false;
        };
        let changed = self.update(|s| s.messages.mark_read(&session_id, message_id));
        if changed {
            self.send_outgoing(OutgoingEvent::ChatRead(ChatReadSendData {
                session_id,
                message_id: message_id.to_string(),
            }));
        }
        changed
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|s| s.ui.set_error(error));
    }

    pub fn clear_error(&self) {
        self.update(|s| s.ui.clear_error());
    }

    // ========================================================================
    // Подписка на шину
    // ========================================================================

    /// Подписать обработчики на `chat:message`, `chat:read`, `chat:typing`.
    /// Повторный вызов ничего не делает.
    pub fn connect_websocket(&self) {
        let mut subscriptions = self.shared.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }

        subscriptions.push(self.listen(IncomingEventKind::ChatMessage, |store, event| {
            if let IncomingEvent::ChatMessage(data) = event {
                store.handle_chat_message(data);
            }
        }));
        subscriptions.push(self.listen(IncomingEventKind::ChatRead, |store, event| {
            if let IncomingEvent::ChatRead(data) = event {
                store.handle_chat_read(data);
            }
        }));
        subscriptions.push(self.listen(IncomingEventKind::ChatTyping, |store, event| {
            if let IncomingEvent::ChatTyping(data) = event {
                store.handle_chat_typing(data);
            }
        }));
        tracing::debug!("chat store listening");
    }

    pub fn disconnect_websocket(&self) {
        let subscriptions: Vec<Subscription> = self.shared.subscriptions.lock().drain(..).collect();
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
        if !subscriptions.is_empty() {
            tracing::debug!("chat store stopped listening");
        }
    }

    /// Снять все таймеры "печатает" и отписаться от шины. Идемпотентно.
    pub fn cleanup(&self) {
        let cancelled = {
            let mut state = self.shared.state.lock();
            state.typing.clear()
        };
        self.disconnect_websocket();
        if cancelled > 0 {
            tracing::debug!(cancelled, "typing timers cancelled");
            self.shared.revision.bump();
        }
    }

    fn listen(&self, kind: IncomingEventKind, handler: fn(&ChatStore, &IncomingEvent)) -> Subscription {
        let weak = self.weak();
        self.shared.bus.on(kind, move |event| {
            if let Some(shared) = weak.upgrade() {
                handler(&ChatStore { shared }, event);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Обработчики входящих событий
    // ========================================================================

    /// Входящее сообщение. В незагруженную историю не добавляется,
    /// повтор по ID игнорируется.
    pub fn handle_chat_message(&self, data: &ChatMessageData) {
        let session_id = data.session_id.as_str();
        let message = data.message.clone();
        let preview = message.text.clone();
        let time = message.timestamp;

        let applied = {
            let mut state = self.shared.state.lock();
            if state.messages.contains(session_id)
                && !state.messages.append_existing(session_id, message)
            {
                false
            } else {
                let is_current = state.is_current(session_id);
                if let Some(session) = state.session_mut(session_id) {
                    session.preview = preview;
                    session.last_message_time = time;
                    if !is_current {
                        session.unread_count += 1;
                    }
                }
                true
            }
        };

        if applied {
            self.shared.revision.bump();
        } else {
            tracing::debug!(session_id, message_id = %data.message.id, "duplicate message ignored");
        }
    }

    /// Уведомление о прочтении
    pub fn handle_chat_read(&self, data: &ChatReadData) {
        let changed = {
            let mut state = self.shared.state.lock();
            state.messages.mark_read(&data.session_id, &data.message_id)
        };
        if changed {
            self.shared.revision.bump();
        }
    }

    /// Индикатор "печатает": `true` (пере)запускает таймер автосброса
    pub fn handle_chat_typing(&self, data: &ChatTypingData) {
        {
            let mut state = self.shared.state.lock();
            if data.is_typing {
                let weak = self.weak();
                state.typing.start(
                    &data.session_id,
                    &data.user_id,
                    self.shared.config.typing_expiry(),
                    move |ticket| {
                        if let Some(shared) = weak.upgrade() {
                            ChatStore { shared }.expire_typing(ticket);
                        }
                    },
                );
            } else {
                state.typing.stop(&data.session_id, &data.user_id);
            }
        }
        self.shared.revision.bump();
    }

    fn expire_typing(&self, ticket: TimerTicket<TypingKey>) {
        let expired = self.shared.state.lock().typing.expire(&ticket);
        if expired {
            tracing::trace!(session_id = %ticket.key.0, user_id = %ticket.key.1, "typing expired");
            self.shared.revision.bump();
        }
    }

    // ========================================================================
    // Запросы
    // ========================================================================

    pub fn current_session(&self) -> Option<ChatSession> {
        self.read(|s| {
            let id = s.current_session_id.as_deref()?;
            s.sessions.iter().find(|session| session.id == id).cloned()
        })
    }

    pub fn current_messages(&self) -> Vec<Message> {
        self.read(|s| {
            s.current_session_id
                .as_deref()
                .and_then(|id| s.messages.get(id))
                .map(<[Message]>::to_vec)
                .unwrap_or_default()
        })
    }

    /// Сумма непрочитанных по всем сессиям
    pub fn unread_count(&self) -> u32 {
        self.read(|s| s.sessions.iter().map(|session| session.unread_count).sum())
    }

    /// Печатает ли кто-нибудь в текущей сессии
    pub fn is_someone_typing(&self) -> bool {
        self.read(|s| {
            s.current_session_id
                .as_deref()
                .map_or(false, |id| s.typing.is_typing(id))
        })
    }

    pub fn typing_users(&self, session_id: &str) -> Vec<String> {
        self.read(|s| s.typing.users(session_id))
    }

    pub fn sessions(&self) -> Vec<ChatSession> {
        self.read(|s| s.sessions.clone())
    }

    pub fn current_session_id(&self) -> Option<String> {
        self.read(|s| s.current_session_id.clone())
    }

    /// Кешированная история сессии; `None`, если не загружалась
    pub fn messages(&self, session_id: &str) -> Option<Vec<Message>> {
        self.read(|s| s.messages.get(session_id).map(<[Message]>::to_vec))
    }

    pub fn ui(&self) -> UiState {
        self.read(|s| s.ui.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.ui.is_loading)
    }

    pub fn is_sending(&self) -> bool {
        self.read(|s| s.ui.is_sending)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.ui.error.clone())
    }

    pub fn pending_timers(&self) -> usize {
        self.read(|s| s.typing.pending_timers())
    }

    pub fn is_listening(&self) -> bool {
        !self.shared.subscriptions.lock().is_empty()
    }

    /// Подписка на изменения состояния (значение = номер ревизии)
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        self.shared.revision.current()
    }

    // ========================================================================
    // Сохранение истории
    // ========================================================================

    /// Все кешированные сообщения
    pub fn all_messages(&self) -> Vec<Message> {
        self.read(|s| s.messages.all_messages())
    }

    /// Восстановить сохранённую историю. Уже загруженные сессии не трогаются.
    pub fn restore_messages(&self, messages: Vec<Message>) -> usize {
        let mut grouped: HashMap<String, Vec<Message>> = HashMap::new();
        for message in messages {
            grouped
                .entry(message.session_id.clone())
                .or_default()
                .push(message);
        }

        self.update(|s| {
            let mut restored = 0;
            for (session_id, history) in grouped {
                if !s.messages.contains(&session_id) {
                    s.messages.insert(session_id, history);
                    restored += 1;
                }
            }
            restored
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::chat::MockChatApi;
    use crate::api::types::Sender;
    use crate::api::Latency;
    use std::time::Duration;

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutgoingEvent>>,
    }

    impl Outbound for Recorder {
        fn send(&self, event: OutgoingEvent) {
            self.sent.lock().push(event);
        }
    }

    fn store() -> ChatStore {
        ChatStore::new(
            Arc::new(MockChatApi::with_latency(Latency::none())),
            EventBus::new(),
            Config::without_simulation(),
        )
    }

    fn inbound(session_id: &str, id: &str, text: &str) -> ChatMessageData {
        ChatMessageData {
            session_id: session_id.to_string(),
            message: Message::new(id, session_id, Sender::Agent, text),
        }
    }

    #[tokio::test]
    async fn test_select_session_clears_unread() {
        let store = store();
        store.load_sessions().await;
        assert_eq!(store.unread_count(), 1);

        store.select_session("session-1").await;

        assert_eq!(store.current_session_id().as_deref(), Some("session-1"));
        assert_eq!(store.current_messages().len(), 3);
        assert_eq!(store.unread_count(), 0);
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_send_without_session_sets_error() {
        let store = store();
        store.send_message("안녕하세요", None).await;

        assert_eq!(store.error().as_deref(), Some(NO_SESSION));
        assert!(!store.is_sending());
    }

    #[tokio::test]
    async fn test_send_message_appends_user_then_ai() {
        let store = store();
        store.load_sessions().await;
        store.select_session("session-1").await;

        store.send_message("금리 문의", None).await;

        let messages = store.current_messages();
        let tail = &messages[messages.len() - 2..];
        assert_eq!(tail[0].sender, Sender::User);
        assert_eq!(tail[0].text, "금리 문의");
        assert_eq!(tail[1].sender, Sender::Ai);

        let session = store.current_session().unwrap();
        assert_eq!(session.preview, tail[1].text);
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn test_create_session_becomes_current() {
        let store = store();
        store.load_sessions().await;
        store
            .create_session(CreateSessionOptions {
                category: Some("대출".to_string()),
                title: Some("새 대출 상담".to_string()),
            })
            .await;

        let sessions = store.sessions();
        assert_eq!(sessions.len(), 4);
        assert_eq!(sessions[0].title, "새 대출 상담");
        assert_eq!(store.current_session_id(), Some(sessions[0].id.clone()));
        assert_eq!(store.messages(&sessions[0].id), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_upload_voice_uses_transcription_preview() {
        let store = store();
        store.load_sessions().await;
        store.select_session("session-2").await;

        store.upload_voice(vec![0u8; 128], 2.5).await;

        let last = store.current_messages().pop().unwrap();
        assert!(last.attachment.is_some());
        assert_eq!(store.current_session().unwrap().preview, "대출 금리가 궁금합니다.");
    }

    #[tokio::test]
    async fn test_quick_reply_targets_message_session() {
        let store = store();
        store.load_sessions().await;
        store.select_session("session-1").await;
        store.select_session("session-2").await;

        store.send_quick_reply("msg-1-3", "금리 계산기").await;

        let history = store.messages("session-1").unwrap();
        assert_eq!(history.len(), 5);
        assert_eq!(history[3].text, "금리 계산기");
        assert_eq!(store.messages("session-2").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inbound_message_counts_unread_for_other_session() {
        let store = store();
        store.load_sessions().await;
        store.select_session("session-1").await;
        store.select_session("session-3").await;

        store.handle_chat_message(&inbound("session-1", "in-1", "확인했습니다"));
        store.handle_chat_message(&inbound("session-1", "in-1", "확인했습니다"));
        store.handle_chat_message(&inbound("session-3", "in-2", "네"));

        let sessions = store.sessions();
        assert_eq!(sessions[0].unread_count, 1);
        assert_eq!(sessions[0].preview, "확인했습니다");
        assert_eq!(sessions[2].unread_count, 0);
        assert_eq!(store.messages("session-1").unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_inbound_message_for_uncached_session() {
        let store = store();
        store.load_sessions().await;

        store.handle_chat_message(&inbound("session-2", "in-1", "대기 중입니다"));

        assert_eq!(store.messages("session-2"), None);
        assert_eq!(store.sessions()[1].unread_count, 1);
    }

    #[tokio::test]
    async fn test_read_receipt_flips_flag() {
        let store = store();
        store.load_sessions().await;
        store.select_session("session-1").await;

        store.handle_chat_read(&ChatReadData {
            session_id: "session-1".to_string(),
            message_id: "msg-1-3".to_string(),
            user_id: "u1".to_string(),
        });
        store.handle_chat_read(&ChatReadData {
            session_id: "session-1".to_string(),
            message_id: "missing".to_string(),
            user_id: "u1".to_string(),
        });

        assert!(store.current_messages()[2].read);
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_expires_after_three_seconds() {
        let store = store();
        let typing = ChatTypingData {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            is_typing: true,
        };

        store.handle_chat_typing(&typing);
        tokio::time::advance(Duration::from_millis(2000)).await;
        settle().await;
        store.handle_chat_typing(&typing);

        tokio::time::advance(Duration::from_millis(2999)).await;
        settle().await;
        assert_eq!(store.typing_users("s1"), vec!["u1"]);

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert!(store.typing_users("s1").is_empty());
        assert_eq!(store.pending_timers(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_sends_receipt() {
        let store = store();
        let recorder = Arc::new(Recorder::default());
        store.set_outbound(recorder.clone());
        store.load_sessions().await;
        store.select_session("session-1").await;

        assert!(store.mark_read("msg-1-3"));
        assert!(!store.mark_read("msg-1-3"));
        assert!(store.notify_typing(true));

        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[0], OutgoingEvent::ChatRead(d) if d.message_id == "msg-1-3"));
        assert!(matches!(&sent[1], OutgoingEvent::ChatTyping(d) if d.is_typing));
    }

    #[tokio::test]
    async fn test_bus_delivery_after_connect() {
        let bus = EventBus::new();
        let store = ChatStore::new(
            Arc::new(MockChatApi::with_latency(Latency::none())),
            bus.clone(),
            Config::without_simulation(),
        );
        store.load_sessions().await;

        store.connect_websocket();
        store.connect_websocket();
        assert_eq!(bus.listener_count(IncomingEventKind::ChatMessage), 1);

        bus.emit(&IncomingEvent::ChatMessage(inbound("session-3", "in-1", "안녕하세요")));
        assert_eq!(store.sessions()[2].unread_count, 1);

        store.cleanup();
        store.cleanup();
        assert!(!store.is_listening());
        assert_eq!(bus.listener_count(IncomingEventKind::ChatMessage), 0);
    }

    #[tokio::test]
    async fn test_restore_skips_loaded_sessions() {
        let store = store();
        store.load_sessions().await;
        store.select_session("session-1").await;

        let restored = store.restore_messages(vec![
            Message::new("old-1", "session-1", Sender::User, "이전 대화"),
            Message::new("old-2", "session-2", Sender::User, "이전 대화"),
        ]);

        assert_eq!(restored, 1);
        assert_eq!(store.messages("session-1").unwrap().len(), 3);
        assert_eq!(store.messages("session-2").unwrap().len(), 1);
    }
}
