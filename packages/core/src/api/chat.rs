// API чата: трейт и мок-реализация с seed-данными

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::types::*;
use super::{ApiError, ApiResponse, ApiResult, Latency};
use crate::utils::time::{days_ago, minutes_ago, now};
use crate::utils::uuid::{api_message_id, session_id_from_message_id};

pub const AI_SENDER_NAME: &str = "AI 상담사";

/// Сервис чата, как его видит `ChatStore`
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn get_sessions(&self) -> ApiResult<Vec<ChatSession>>;

    async fn get_session(&self, session_id: &str) -> ApiResult<ChatSession>;

    async fn get_messages(&self, session_id: &str) -> ApiResult<Vec<Message>>;

    async fn send_message(
        &self,
        session_id: &str,
        request: SendMessageRequest,
    ) -> ApiResult<SendMessageResponse>;

    async fn send_quick_reply(
        &self,
        message_id: &str,
        request: QuickReplyRequest,
    ) -> ApiResult<SendMessageResponse>;

    async fn upload_voice(
        &self,
        session_id: &str,
        audio: Vec<u8>,
        duration_secs: f64,
    ) -> ApiResult<VoiceUploadResponse>;

    async fn create_session(&self, options: CreateSessionOptions) -> ApiResult<ChatSession>;
}

struct ChatDb {
    sessions: Vec<ChatSession>,
    messages: HashMap<String, Vec<Message>>,
    message_counter: u64,
}

impl ChatDb {
    fn next_message_id(&mut self, session_id: &str) -> String {
        let id = api_message_id(session_id, self.message_counter);
        self.message_counter += 1;
        id
    }

    fn push(&mut self, message: Message) {
        self.messages
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
    }

    fn touch_session(&mut self, session_id: &str, preview: &str) {
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == session_id) {
            let timestamp = now();
            session.preview = preview.to_string();
            session.last_message_time = timestamp;
            session.updated_at = timestamp;
        }
    }

    fn session_of_message(&self, message_id: &str) -> Option<String> {
        self.messages
            .values()
            .flatten()
            .find(|m| m.id == message_id)
            .map(|m| m.session_id.clone())
    }
}

/// In-memory сервис чата
pub struct MockChatApi {
    db: Mutex<ChatDb>,
    latency: Latency,
}

impl MockChatApi {
    pub fn new() -> Self {
        Self::with_latency(Latency::realistic())
    }

    pub fn with_latency(latency: Latency) -> Self {
        Self {
            db: Mutex::new(ChatDb {
                sessions: seed_sessions(),
                messages: seed_messages(),
                message_counter: 100,
            }),
            latency,
        }
    }

    fn ai_message(&self, session_id: &str, text: String, quick_replies: Vec<String>) -> Message {
        let id = self.db.lock().next_message_id(session_id);
        let mut message = Message::new(id, session_id, Sender::Ai, text);
        message.sender_name = Some(AI_SENDER_NAME.to_string());
        message.confidence = Some(Confidence::High);
        message.has_audio = true;
        message.quick_replies = quick_replies;
        message
    }
}

impl Default for MockChatApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn get_sessions(&self) -> ApiResult<Vec<ChatSession>> {
        self.latency.wait(300).await;
        Ok(ApiResponse::ok(self.db.lock().sessions.clone()))
    }

    async fn get_session(&self, session_id: &str) -> ApiResult<ChatSession> {
        self.latency.wait(200).await;

        let db = self.db.lock();
        db.sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .map(ApiResponse::ok)
            .ok_or_else(|| ApiError::new("NOT_FOUND", "채팅 세션을 찾을 수 없습니다."))
    }

    async fn get_messages(&self, session_id: &str) -> ApiResult<Vec<Message>> {
        self.latency.wait(200).await;

        let messages = self
            .db
            .lock()
            .messages
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        Ok(ApiResponse::ok(messages))
    }

    async fn send_message(
        &self,
        session_id: &str,
        request: SendMessageRequest,
    ) -> ApiResult<SendMessageResponse> {
        self.latency.wait(400).await;

        let user_message = {
            let mut db = self.db.lock();
            let id = db.next_message_id(session_id);
            let mut message = Message::new(id, session_id, Sender::User, request.text.clone());
            message.attachment = request.attachment.as_ref().map(|a| Attachment {
                name: "attachment".to_string(),
                kind: a.kind,
                url: a.url.clone(),
                size: None,
            });
            db.push(message.clone());
            db.touch_session(session_id, &request.text);
            message
        };

        // Время "обдумывания" ответа AI
        self.latency.wait(500).await;

        let ai_message = self.ai_message(
            session_id,
            generate_ai_response(&request.text).to_string(),
            generate_quick_replies(&request.text),
        );
        {
            let mut db = self.db.lock();
            db.push(ai_message.clone());
            db.touch_session(session_id, &ai_message.text);
        }

        Ok(ApiResponse::ok(SendMessageResponse {
            message: user_message,
            ai_response: Some(ai_message),
        }))
    }

    async fn send_quick_reply(
        &self,
        message_id: &str,
        request: QuickReplyRequest,
    ) -> ApiResult<SendMessageResponse> {
        self.latency.wait(300).await;

        let session_id = self
            .db
            .lock()
            .session_of_message(message_id)
            .or_else(|| session_id_from_message_id(message_id).map(str::to_string))
            .ok_or_else(|| {
                ApiError::new("INVALID_INPUT", "메시지 ID에서 세션을 찾을 수 없습니다.")
            })?;

        self.send_message(
            &session_id,
            SendMessageRequest {
                text: request.reply,
                attachment: None,
            },
        )
        .await
    }

    async fn upload_voice(
        &self,
        session_id: &str,
        audio: Vec<u8>,
        duration_secs: f64,
    ) -> ApiResult<VoiceUploadResponse> {
        self.latency.wait(800).await;
        tracing::debug!(session_id, bytes = audio.len(), duration_secs, "voice upload");

        let user_message = {
            let mut db = self.db.lock();
            let id = db.next_message_id(session_id);
            let mut message = Message::new(id, session_id, Sender::User, "");
            message.attachment = Some(Attachment {
                name: "voice-message.wav".to_string(),
                kind: AttachmentKind::Voice,
                url: None,
                size: Some(audio.len() as u64),
            });
            db.push(message.clone());
            message
        };

        let transcription = "대출 금리가 궁금합니다.".to_string();

        self.latency.wait(500).await;

        let ai_message = self.ai_message(
            session_id,
            format!("네, \"{transcription}\" 문의에 대해 답변드리겠습니다."),
            vec![
                "금리 안내".to_string(),
                "상담원 연결".to_string(),
                "신청 방법".to_string(),
            ],
        );
        self.db.lock().push(ai_message);

        Ok(ApiResponse::ok(VoiceUploadResponse {
            message: user_message,
            transcription: Some(transcription),
        }))
    }

    async fn create_session(&self, options: CreateSessionOptions) -> ApiResult<ChatSession> {
        self.latency.wait(300).await;

        let timestamp = now();
        let session = ChatSession {
            id: format!("session-{}", timestamp.timestamp_millis()),
            customer_id: "current-customer".to_string(),
            customer_name: "현재 고객".to_string(),
            agent_id: None,
            agent_name: None,
            title: options.title.unwrap_or_else(|| "새 상담".to_string()),
            preview: "상담을 시작합니다.".to_string(),
            last_message_time: timestamp,
            unread_count: 0,
            status: SessionStatus::Active,
            category: options.category,
            priority: Priority::Normal,
            created_at: timestamp,
            updated_at: timestamp,
        };

        let mut db = self.db.lock();
        db.sessions.insert(0, session.clone());
        db.messages.insert(session.id.clone(), Vec::new());

        Ok(ApiResponse::ok(session))
    }
}

/// Ответ AI по ключевым словам
pub fn generate_ai_response(user_text: &str) -> &'static str {
    let text = user_text.to_lowercase();

    if text.contains("금리") || text.contains("이자") {
        "현재 연 3.5%~7.5%의 금리로 제공되고 있습니다. 신용 등급에 따라 차등 적용됩니다."
    } else if text.contains("대출") {
        "대출 상품은 신용대출, 담보대출, 주택담보대출 등이 있습니다. 어떤 상품에 관심 있으신가요?"
    } else if text.contains("상담원") || text.contains("사람") {
        "네, 상담원 연결을 도와드리겠습니다. 잠시만 기다려 주세요."
    } else if text.contains("계좌") {
        "계좌 개설은 영업점 방문 또는 모바일 앱에서 가능합니다. 어떤 방법을 선호하시나요?"
    } else if text.contains("적금") {
        "적금 상품은 목적별로 다양하게 준비되어 있습니다. 목표 금액과 기간을 알려주시면 최적의 상품을 추천해드리겠습니다."
    } else {
        "문의해주셔서 감사합니다. 더 자세한 안내를 위해 어떤 부분이 궁금하신가요?"
    }
}

pub fn generate_quick_replies(user_text: &str) -> Vec<String> {
    let text = user_text.to_lowercase();

    let replies: &[&str] = if text.contains("금리") {
        &["연 3.5%~7.5%", "금리 계산기", "신청 방법"]
    } else if text.contains("대출") {
        &["신용대출", "담보대출", "주택담보대출"]
    } else if text.contains("상담원") {
        &["상담원 연결", "계속 AI 상담"]
    } else if text.contains("계좌") {
        &["영업점 방문", "모바일 개설"]
    } else {
        &["상담원 연결", "자주 묻는 질문", "메인 메뉴"]
    };

    replies.iter().map(|r| r.to_string()).collect()
}

fn seed_session(
    id: &str,
    customer: (&str, &str),
    agent: Option<(&str, &str)>,
    title: &str,
    preview: &str,
    status: SessionStatus,
    category: &str,
    priority: Priority,
) -> ChatSession {
    ChatSession {
        id: id.to_string(),
        customer_id: customer.0.to_string(),
        customer_name: customer.1.to_string(),
        agent_id: agent.map(|a| a.0.to_string()),
        agent_name: agent.map(|a| a.1.to_string()),
        title: title.to_string(),
        preview: preview.to_string(),
        last_message_time: now(),
        unread_count: 0,
        status,
        category: Some(category.to_string()),
        priority,
        created_at: now(),
        updated_at: now(),
    }
}

fn seed_sessions() -> Vec<ChatSession> {
    let agent = Some(("agent-1", "김상담"));

    let mut loan = seed_session(
        "session-1",
        ("customer-1", "김미래"),
        agent,
        "AI 대출 상담사",
        "금리 관련해서 도와드릴까요?",
        SessionStatus::Active,
        "대출",
        Priority::Normal,
    );
    loan.unread_count = 1;
    loan.last_message_time = minutes_ago(30);
    loan.updated_at = minutes_ago(30);
    loan.created_at = days_ago(2);

    let mut general = seed_session(
        "session-2",
        ("customer-2", "이철수"),
        None,
        "일반 문의",
        "상담원 대기 중...",
        SessionStatus::Waiting,
        "문의",
        Priority::Low,
    );
    general.last_message_time = days_ago(1);
    general.updated_at = days_ago(1);
    general.created_at = days_ago(3);

    let mut savings = seed_session(
        "session-3",
        ("customer-3", "박영희"),
        agent,
        "적금 상품 문의",
        "적금 금리가 얼마인가요?",
        SessionStatus::Completed,
        "적금",
        Priority::Low,
    );
    savings.last_message_time = days_ago(2);
    savings.updated_at = days_ago(2);
    savings.created_at = days_ago(5);

    vec![loan, general, savings]
}

fn seed_messages() -> HashMap<String, Vec<Message>> {
    let ai = |id: &str, session: &str, text: &str, minutes: i64, replies: &[&str]| {
        let mut message = Message::new(id, session, Sender::Ai, text);
        message.sender_name = Some(AI_SENDER_NAME.to_string());
        message.timestamp = minutes_ago(minutes);
        message.confidence = Some(Confidence::High);
        message.has_audio = true;
        message.quick_replies = replies.iter().map(|r| r.to_string()).collect();
        message
    };
    let person = |id: &str, session: &str, sender: Sender, who: (&str, &str), text: &str, minutes: i64| {
        let mut message = Message::new(id, session, sender, text);
        message.sender_id = Some(who.0.to_string());
        message.sender_name = Some(who.1.to_string());
        message.timestamp = minutes_ago(minutes);
        message
    };

    let mut asked = person(
        "msg-1-2",
        "session-1",
        Sender::User,
        ("customer-1", "김미래"),
        "신용대출 금리가 어떻게 되나요?",
        32,
    );
    asked.read = true;

    let three_days = 3 * 24 * 60;
    let mut agent_reply = person(
        "msg-3-2",
        "session-3",
        Sender::Agent,
        ("agent-1", "김상담"),
        "네, 미래적금 상품을 안내해드리겠습니다.",
        three_days,
    );
    agent_reply.timestamp += chrono::Duration::seconds(1);

    HashMap::from([
        (
            "session-1".to_string(),
            vec![
                ai(
                    "msg-1-1",
                    "session-1",
                    "안녕하세요! 미래금융 AI 고객센터입니다. 무엇을 도와드릴까요?",
                    35,
                    &["대출 상품 안내", "금리 확인", "상담원 연결"],
                ),
                asked,
                ai(
                    "msg-1-3",
                    "session-1",
                    "금리 관련해서 도와드릴까요?",
                    30,
                    &["연 3.5%~7.5%", "금리 계산기", "신청 방법"],
                ),
            ],
        ),
        (
            "session-2".to_string(),
            vec![person(
                "msg-2-1",
                "session-2",
                Sender::User,
                ("customer-2", "이철수"),
                "계좌 개설 방법 문의드립니다.",
                25,
            )],
        ),
        (
            "session-3".to_string(),
            vec![
                person(
                    "msg-3-1",
                    "session-3",
                    Sender::User,
                    ("customer-3", "박영희"),
                    "적금 상품 안내 부탁드립니다.",
                    three_days,
                ),
                agent_reply,
            ],
        ),
    ])
}
