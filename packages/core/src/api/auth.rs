// API аутентификации: вход, выход, проверка и обновление токенов
//
// Токены имеют форму JWT (`header.payload.signature`, base64), но подпись
// фиктивная: проверяется только структура и срок `exp`.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::types::*;
use super::{ApiError, ApiResponse, ApiResult, Latency};
use crate::utils::time::current_timestamp;

/// Время жизни access-токена, секунды
pub const TOKEN_TTL_SECS: u64 = 3600;

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: LoginRequest) -> ApiResult<LoginResponse>;

    async fn logout(&self) -> ApiResult<bool>;

    /// Проверить токен; `None` означает "текущий токен сервиса"
    async fn verify_token(&self, token: Option<&str>) -> ApiResult<VerifyTokenResponse>;

    async fn refresh_token(&self, refresh_token: &str) -> ApiResult<TokenPair>;

    async fn get_me(&self) -> ApiResult<AuthUser>;
}

struct MockUser {
    id: &'static str,
    username: &'static str,
    password: &'static str,
    name: &'static str,
    role: UserRole,
    email: &'static str,
    phone: &'static str,
}

impl MockUser {
    fn profile(&self) -> AuthUser {
        AuthUser {
            id: self.id.to_string(),
            name: self.name.to_string(),
            role: self.role,
            email: Some(self.email.to_string()),
            phone: Some(self.phone.to_string()),
        }
    }
}

const MOCK_USERS: [MockUser; 2] = [
    MockUser {
        id: "customer-1",
        username: "customer",
        password: "customer123",
        name: "김미래",
        role: UserRole::Customer,
        email: "customer@example.com",
        phone: "01012345678",
    },
    MockUser {
        id: "agent-1",
        username: "agent",
        password: "agent123",
        name: "김상담",
        role: UserRole::Agent,
        email: "agent@mirae-finance.com",
        phone: "01098765432",
    },
];

#[derive(Default)]
struct AuthSession {
    user: Option<&'static MockUser>,
    token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    name: String,
    role: UserRole,
    iat: i64,
    exp: i64,
}

/// In-memory сервис аутентификации
pub struct MockAuthApi {
    session: Mutex<AuthSession>,
    latency: Latency,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self::with_latency(Latency::realistic())
    }

    pub fn with_latency(latency: Latency) -> Self {
        Self {
            session: Mutex::new(AuthSession::default()),
            latency,
        }
    }

    fn issue_tokens(user: &MockUser) -> TokenPair {
        TokenPair {
            access_token: generate_access_token(user),
            refresh_token: generate_refresh_token(user),
            expires_in: TOKEN_TTL_SECS,
        }
    }
}

impl Default for MockAuthApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, request: LoginRequest) -> ApiResult<LoginResponse> {
        self.latency.wait(500).await;

        let user = MOCK_USERS
            .iter()
            .find(|u| {
                (u.username == request.username || u.email == request.username)
                    && u.password == request.password
            })
            .ok_or_else(|| {
                ApiError::new(
                    "INVALID_CREDENTIALS",
                    "아이디 또는 비밀번호가 올바르지 않습니다.",
                )
            })?;

        let token = Self::issue_tokens(user);
        {
            let mut session = self.session.lock();
            session.user = Some(user);
            session.token = Some(token.access_token.clone());
        }

        tracing::info!(user_id = user.id, "login succeeded");

        Ok(ApiResponse::ok(LoginResponse {
            user: user.profile(),
            token,
        })
        .with_message("로그인에 성공했습니다."))
    }

    async fn logout(&self) -> ApiResult<bool> {
        self.latency.wait(200).await;

        *self.session.lock() = AuthSession::default();
        Ok(ApiResponse::ok(true).with_message("로그아웃되었습니다."))
    }

    async fn verify_token(&self, token: Option<&str>) -> ApiResult<VerifyTokenResponse> {
        self.latency.wait(100).await;

        let session = self.session.lock();
        let candidate = token.map(str::to_string).or_else(|| session.token.clone());

        let response = match (candidate, session.user) {
            (Some(token), Some(user)) => VerifyTokenResponse {
                valid: validate_token(&token),
                user: AuthUser {
                    email: None,
                    phone: None,
                    ..user.profile()
                },
            },
            _ => VerifyTokenResponse {
                valid: false,
                user: AuthUser {
                    id: String::new(),
                    name: String::new(),
                    role: UserRole::Customer,
                    email: None,
                    phone: None,
                },
            },
        };

        Ok(ApiResponse::ok(response))
    }

    async fn refresh_token(&self, _refresh_token: &str) -> ApiResult<TokenPair> {
        self.latency.wait(300).await;

        let mut session = self.session.lock();
        let user = session.user.ok_or_else(|| {
            ApiError::new("TOKEN_EXPIRED", "세션이 만료되었습니다. 다시 로그인해주세요.")
        })?;

        let token = Self::issue_tokens(user);
        session.token = Some(token.access_token.clone());
        Ok(ApiResponse::ok(token))
    }

    async fn get_me(&self) -> ApiResult<AuthUser> {
        self.latency.wait(100).await;

        self.session
            .lock()
            .user
            .map(|u| ApiResponse::ok(u.profile()))
            .ok_or_else(|| ApiError::new("UNAUTHORIZED", "로그인이 필요합니다."))
    }
}

fn encode_segment(raw: &str) -> String {
    general_purpose::STANDARD.encode(raw.as_bytes())
}

fn generate_access_token(user: &MockUser) -> String {
    let iat = current_timestamp();
    let claims = TokenClaims {
        sub: user.id.to_string(),
        name: user.name.to_string(),
        role: user.role,
        iat,
        exp: iat + TOKEN_TTL_SECS as i64,
    };

    let header = encode_segment(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = general_purpose::STANDARD
        .encode(serde_json::to_vec(&claims).unwrap_or_default());
    let signature = encode_segment("mock-signature");

    format!("{header}.{payload}.{signature}")
}

fn generate_refresh_token(user: &MockUser) -> String {
    let nonce: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(11)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!(
        "refresh_{}_{}_{}",
        user.id,
        chrono::Utc::now().timestamp_millis(),
        nonce
    )
}

/// Проверка структуры и срока действия токена
pub fn validate_token(token: &str) -> bool {
    if token.is_empty() || token == "invalid" {
        return false;
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return false;
    }

    general_purpose::STANDARD
        .decode(parts[1])
        .ok()
        .and_then(|bytes| serde_json::from_slice::<TokenClaims>(&bytes).ok())
        .map(|claims| claims.exp > current_timestamp())
        .unwrap_or(false)
}
