// Стор аутентификации
//
// Токен доступа пробрасывается в транспорт при каждом изменении, поэтому
// вход, выход и обновление токена переподключают открытое соединение.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::api::auth::AuthApi;
use crate::api::types::{AuthUser, LoginRequest, UserRole};
use crate::protocol::transport::MockTransport;
use crate::state::{Revision, UiState};
use crate::utils::error::{AiccError, Result};

const LOGIN_FAILED: &str = "로그인에 실패했습니다.";

#[derive(Debug, Default)]
struct AuthState {
    is_authenticated: bool,
    user: Option<AuthUser>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    ui: UiState,
}

impl AuthState {
    fn sign_out(&mut self) {
        self.is_authenticated = false;
        self.user = None;
        self.access_token = None;
        self.refresh_token = None;
    }
}

struct AuthShared {
    state: Mutex<AuthState>,
    api: Arc<dyn AuthApi>,
    transport: Option<MockTransport>,
    revision: Revision,
}

#[derive(Clone)]
pub struct AuthStore {
    shared: Arc<AuthShared>,
}

impl AuthStore {
    pub fn new(api: Arc<dyn AuthApi>) -> Self {
        Self::build(api, None)
    }

    /// Стор, сообщающий транспорту о смене токена
    pub fn with_transport(api: Arc<dyn AuthApi>, transport: MockTransport) -> Self {
        Self::build(api, Some(transport))
    }

    fn build(api: Arc<dyn AuthApi>, transport: Option<MockTransport>) -> Self {
        Self {
            shared: Arc::new(AuthShared {
                state: Mutex::new(AuthState::default()),
                api,
                transport,
                revision: Revision::new(),
            }),
        }
    }

    fn update<R>(&self, apply: impl FnOnce(&mut AuthState) -> R) -> R {
        let result = {
            let mut state = self.shared.state.lock();
            apply(&mut *state)
        };
        self.shared.revision.bump();
        result
    }

    fn read<R>(&self, view: impl FnOnce(&AuthState) -> R) -> R {
        view(&*self.shared.state.lock())
    }

    /// Передать текущий токен транспорту (вне блокировки состояния)
    fn sync_transport(&self) {
        if let Some(transport) = &self.shared.transport {
            transport.set_auth_token(self.access_token());
        }
    }

    /// Вход. В отличие от остальных команд ошибка возвращается вызывающему,
    /// но и записывается в `error`.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthUser> {
        self.update(|s| s.ui.begin_loading());

        let result = self.shared.api.login(request).await;

        let outcome = self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => {
                    let login = response.data;
                    s.is_authenticated = true;
                    s.user = Some(login.user.clone());
                    s.access_token = Some(login.token.access_token);
                    s.refresh_token = Some(login.token.refresh_token);
                    Ok(login.user)
                }
                Err(e) => {
                    s.sign_out();
                    s.ui.fail(LOGIN_FAILED, &e);
                    Err(AiccError::from(e))
                }
            }
        });

        if let Ok(user) = &outcome {
            tracing::info!(user_id = %user.id, role = ?user.role, "signed in");
            self.sync_transport();
        }
        outcome
    }

    /// Выход. Ошибка API не мешает локальному выходу.
    pub async fn logout(&self) {
        self.update(|s| s.ui.begin_loading());

        if let Err(e) = self.shared.api.logout().await {
            tracing::warn!(error = %e, "logout request failed, signing out locally");
        }

        self.update(|s| {
            s.sign_out();
            s.ui.is_loading = false;
        });
        self.sync_transport();
    }

    /// Проверить сохранённый токен; невалидный или ошибка означают выход
    pub async fn verify(&self) {
        let token = self.update(|s| {
            s.ui.begin_loading();
            s.access_token.clone()
        });

        let Some(token) = token else {
            self.update(|s| {
                s.sign_out();
                s.ui.is_loading = false;
            });
            return;
        };

        let result = self.shared.api.verify_token(Some(&token)).await;

        let valid = self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) if response.data.valid => {
                    s.is_authenticated = true;
                    s.user = Some(response.data.user);
                    true
                }
                Ok(_) => {
                    s.sign_out();
                    false
                }
                Err(e) => {
                    tracing::warn!(error = %e, "token verification failed");
                    s.sign_out();
                    false
                }
            }
        });

        if !valid {
            self.sync_transport();
        }
    }

    /// Обновить пару токенов. `false` и выход, если обновить не удалось.
    pub async fn refresh(&self) -> bool {
        let Some(refresh_token) = self.read(|s| s.refresh_token.clone()) else {
            return false;
        };

        let result = self.shared.api.refresh_token(&refresh_token).await;

        let refreshed = self.update(|s| match result {
            Ok(response) => {
                s.access_token = Some(response.data.access_token);
                s.refresh_token = Some(response.data.refresh_token);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                s.sign_out();
                false
            }
        });

        self.sync_transport();
        refreshed
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|s| s.ui.set_error(error));
    }

    pub fn clear_error(&self) {
        self.update(|s| s.ui.clear_error());
    }

    pub fn is_authenticated(&self) -> bool {
        self.read(|s| s.is_authenticated)
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.read(|s| s.user.clone())
    }

    pub fn role(&self) -> Option<UserRole> {
        self.read(|s| s.user.as_ref().map(|u| u.role))
    }

    pub fn is_agent(&self) -> bool {
        self.role() == Some(UserRole::Agent)
    }

    pub fn is_customer(&self) -> bool {
        self.role() == Some(UserRole::Customer)
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(|s| s.access_token.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.ui.is_loading)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.ui.error.clone())
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }
}
