//! Scenario tests for the chat and agent stores
//!
//! The stores are driven through stub API implementations that count calls
//! and can be switched into failure mode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aicc_core::api::types::*;
use aicc_core::api::{AgentApi, ApiError, ApiResponse, ApiResult, ChatApi, Latency, MockAgentApi};
use aicc_core::protocol::events::{ChatTypingData, IncomingEvent};
use aicc_core::{AgentStore, ChatStore, Config, EventBus};
use async_trait::async_trait;
use chrono::Utc;

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

fn session(id: &str, title: &str) -> ChatSession {
    ChatSession {
        id: id.to_string(),
        customer_id: "customer-1".to_string(),
        customer_name: "김미래".to_string(),
        agent_id: None,
        agent_name: None,
        title: title.to_string(),
        preview: String::new(),
        last_message_time: Utc::now(),
        unread_count: 2,
        status: SessionStatus::Active,
        category: Some("대출".to_string()),
        priority: Priority::Normal,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Chat service stub with call counters
#[derive(Default)]
struct StubChatApi {
    fail: AtomicBool,
    message_fetches: AtomicUsize,
    sends: AtomicUsize,
}

impl StubChatApi {
    fn failing() -> Self {
        let api = Self::default();
        api.fail.store(true, Ordering::SeqCst);
        api
    }

    fn check(&self) -> Result<(), ApiError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(ApiError::new("NETWORK_ERROR", "서버에 연결할 수 없습니다."))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatApi for StubChatApi {
    async fn get_sessions(&self) -> ApiResult<Vec<ChatSession>> {
        self.check()?;
        Ok(ApiResponse::ok(vec![session("session-1", "대출 상담")]))
    }

    async fn get_session(&self, session_id: &str) -> ApiResult<ChatSession> {
        self.check()?;
        Ok(ApiResponse::ok(session(session_id, "대출 상담")))
    }

    async fn get_messages(&self, session_id: &str) -> ApiResult<Vec<Message>> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(ApiResponse::ok(vec![Message::new(
            "msg-0",
            session_id,
            Sender::Ai,
            "안녕하세요",
        )]))
    }

    async fn send_message(
        &self,
        session_id: &str,
        request: SendMessageRequest,
    ) -> ApiResult<SendMessageResponse> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(ApiResponse::ok(SendMessageResponse {
            message: Message::new(format!("user-{n}"), session_id, Sender::User, request.text),
            ai_response: Some(Message::new(
                format!("ai-{n}"),
                session_id,
                Sender::Ai,
                "확인했습니다.",
            )),
        }))
    }

    async fn send_quick_reply(
        &self,
        message_id: &str,
        request: QuickReplyRequest,
    ) -> ApiResult<SendMessageResponse> {
        self.check()?;
        let session_id = message_id.trim_start_matches("msg-");
        Ok(ApiResponse::ok(SendMessageResponse {
            message: Message::new("quick", session_id, Sender::User, request.reply),
            ai_response: None,
        }))
    }

    async fn upload_voice(
        &self,
        session_id: &str,
        _audio: Vec<u8>,
        _duration_secs: f64,
    ) -> ApiResult<VoiceUploadResponse> {
        self.check()?;
        Ok(ApiResponse::ok(VoiceUploadResponse {
            message: Message::new("voice", session_id, Sender::User, ""),
            transcription: None,
        }))
    }

    async fn create_session(&self, options: CreateSessionOptions) -> ApiResult<ChatSession> {
        self.check()?;
        let title = options.title.unwrap_or_else(|| "새 상담".to_string());
        Ok(ApiResponse::ok(session("session-new", &title)))
    }
}

fn chat_store(api: Arc<StubChatApi>) -> ChatStore {
    ChatStore::new(api, EventBus::new(), Config::without_simulation())
}

#[tokio::test]
async fn test_load_sessions_scenario() {
    let store = chat_store(Arc::new(StubChatApi::default()));
    store.load_sessions().await;

    let sessions = store.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].title, "대출 상담");
    assert!(!store.is_loading());
    assert_eq!(store.error(), None);
}

#[tokio::test]
async fn test_failed_load_keeps_previous_sessions() {
    let api = Arc::new(StubChatApi::default());
    let store = chat_store(api.clone());
    store.load_sessions().await;

    api.fail.store(true, Ordering::SeqCst);
    store.load_sessions().await;

    assert_eq!(store.sessions().len(), 1);
    assert_eq!(
        store.error().as_deref(),
        Some("세션 목록을 불러오는데 실패했습니다. 서버에 연결할 수 없습니다.")
    );
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_send_message_scenario() {
    let store = chat_store(Arc::new(StubChatApi::default()));
    store.load_sessions().await;
    store.select_session("session-1").await;

    store.send_message("테스트 메시지", None).await;

    let messages = store.messages("session-1").unwrap();
    let tail = &messages[messages.len() - 2..];
    assert_eq!(tail[0].sender, Sender::User);
    assert_eq!(tail[0].text, "테스트 메시지");
    assert_eq!(tail[1].sender, Sender::Ai);
    assert!(!store.is_sending());
    assert_eq!(store.error(), None);
    assert_eq!(store.sessions()[0].preview, "확인했습니다.");
}

#[tokio::test]
async fn test_send_failure_keeps_applied_messages() {
    let api = Arc::new(StubChatApi::default());
    let store = chat_store(api.clone());
    store.load_sessions().await;
    store.select_session("session-1").await;
    store.send_message("첫 번째", None).await;

    api.fail.store(true, Ordering::SeqCst);
    store.send_message("두 번째", None).await;

    assert_eq!(store.current_messages().len(), 3);
    assert!(store
        .error()
        .unwrap()
        .starts_with("메시지 전송에 실패했습니다."));
    assert!(!store.is_sending());
}

#[tokio::test]
async fn test_select_session_fetches_once() {
    let api = Arc::new(StubChatApi::default());
    let store = chat_store(api.clone());
    store.load_sessions().await;

    store.select_session("session-1").await;
    store.select_session("session-1").await;

    assert_eq!(api.message_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(store.sessions()[0].unread_count, 0);
    assert_eq!(store.unread_count(), 0);
}

#[tokio::test]
async fn test_select_session_failure() {
    let store = chat_store(Arc::new(StubChatApi::failing()));
    store.select_session("session-1").await;

    assert_eq!(store.current_session_id(), None);
    assert!(store
        .error()
        .unwrap()
        .starts_with("메시지를 불러오는데 실패했습니다."));
    assert!(!store.is_loading());
}

#[tokio::test]
async fn test_create_and_voice_without_transcription() {
    let store = chat_store(Arc::new(StubChatApi::default()));
    store
        .create_session(CreateSessionOptions {
            category: None,
            title: Some("음성 상담".to_string()),
        })
        .await;
    assert_eq!(store.current_session_id().as_deref(), Some("session-new"));

    store.upload_voice(vec![1, 2, 3], 1.0).await;

    assert_eq!(store.current_messages().len(), 1);
    assert_eq!(store.current_session().unwrap().preview, "음성 메시지");
}

#[tokio::test(start_paused = true)]
async fn test_double_typing_clears_once() {
    let store = chat_store(Arc::new(StubChatApi::default()));
    let typing = ChatTypingData {
        session_id: "s1".to_string(),
        user_id: "u1".to_string(),
        is_typing: true,
    };

    store.handle_chat_typing(&typing);
    store.handle_chat_typing(&typing);
    assert_eq!(store.pending_timers(), 1);

    tokio::time::advance(Duration::from_millis(3000)).await;
    settle().await;

    assert!(store.typing_users("s1").is_empty());
    assert_eq!(store.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_leaves_no_timers() {
    let store = chat_store(Arc::new(StubChatApi::default()));
    for user in ["u1", "u2", "u3"] {
        store.handle_chat_typing(&ChatTypingData {
            session_id: "s1".to_string(),
            user_id: user.to_string(),
            is_typing: true,
        });
    }
    store.connect_websocket();

    store.cleanup();
    store.cleanup();
    let revision = store.revision();

    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(store.pending_timers(), 0);
    assert_eq!(store.revision(), revision);
    assert!(!store.is_listening());
}

#[tokio::test]
async fn test_changes_are_observable() {
    let store = chat_store(Arc::new(StubChatApi::default()));
    let mut changes = store.changes();

    store.load_sessions().await;

    assert!(changes.has_changed().unwrap());
    assert!(*changes.borrow_and_update() >= 2);
}

#[tokio::test]
async fn test_agent_sentiment_scenario() {
    let store = AgentStore::new(
        Arc::new(MockAgentApi::with_latency(Latency::none())),
        EventBus::new(),
    );

    store.load_sentiment("customer-1").await;

    let sentiment = store.sentiment("customer-1").unwrap();
    assert_eq!(sentiment.sentiment_score, 75);
    assert_eq!(sentiment.current_sentiment, Sentiment::Positive);
    assert_eq!(sentiment.risk_level, RiskLevel::Low);
}

/// Agent service that always fails
struct DownAgentApi;

impl DownAgentApi {
    fn down<T>() -> ApiResult<T> {
        Err(ApiError::new("SERVICE_UNAVAILABLE", "잠시 후 다시 시도해주세요."))
    }
}

#[async_trait]
impl AgentApi for DownAgentApi {
    async fn get_stats(&self) -> ApiResult<DashboardStats> {
        Self::down()
    }

    async fn get_customers(&self, _filter: CustomerFilter) -> ApiResult<Vec<Customer>> {
        Self::down()
    }

    async fn get_customer(&self, _customer_id: &str) -> ApiResult<Customer> {
        Self::down()
    }

    async fn get_sentiment(&self, _customer_id: &str) -> ApiResult<SentimentData> {
        Self::down()
    }

    async fn get_ai_proposals(&self, _customer_id: &str) -> ApiResult<AiProposalsResponse> {
        Self::down()
    }

    async fn get_waiting_count(&self) -> ApiResult<CountResponse> {
        Self::down()
    }

    async fn get_active_count(&self) -> ApiResult<CountResponse> {
        Self::down()
    }

    async fn get_team_ranking(&self) -> ApiResult<Vec<TeamRankEntry>> {
        Self::down()
    }

    async fn get_notices(&self) -> ApiResult<Vec<Notice>> {
        Self::down()
    }
}

#[tokio::test]
async fn test_agent_failure_labels() {
    let store = AgentStore::new(Arc::new(DownAgentApi), EventBus::new());

    store.load_stats().await;
    assert_eq!(
        store.error().as_deref(),
        Some("통계를 불러오는데 실패했습니다. 잠시 후 다시 시도해주세요.")
    );

    store.load_proposals("customer-1").await;
    assert!(store.error().unwrap().starts_with("AI 제안을 불러오는데 실패했습니다."));

    store.load_notices().await;
    assert!(store.error().unwrap().starts_with("공지사항을 불러오는데 실패했습니다."));
    assert!(!store.is_loading());

    store.clear_error();
    assert_eq!(store.error(), None);
}

#[tokio::test]
async fn test_agent_events_through_bus() {
    let bus = EventBus::new();
    let store = AgentStore::new(Arc::new(MockAgentApi::with_latency(Latency::none())), bus.clone());
    store.load_sentiment("customer-2").await;
    store.connect_websocket();

    let mut update = store.sentiment("customer-2").unwrap();
    update.sentiment_score = -80;
    update.current_sentiment = Sentiment::Angry;
    update.risk_level = RiskLevel::High;
    bus.emit(&IncomingEvent::AgentSentimentUpdate(
        aicc_core::protocol::events::AgentSentimentUpdateData {
            customer_id: "customer-2".to_string(),
            sentiment: update.clone(),
        },
    ));

    assert_eq!(store.sentiment("customer-2"), Some(update));

    store.load_customers(CustomerFilter::default()).await;
    let customer = store
        .customers()
        .into_iter()
        .find(|c| c.id == "customer-2")
        .unwrap();
    assert_ne!(customer.risk_level, Some(RiskLevel::High));
}
