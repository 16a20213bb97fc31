// Стор консультанта: статистика, клиенты, анализ настроения, AI-предложения

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::api::agent::AgentApi;
use crate::api::types::{
    AiProposal, Customer, CustomerFilter, CustomerStatus, DashboardStats, Notice, SentimentData,
    TeamRankEntry,
};
use crate::protocol::bus::{EventBus, Subscription};
use crate::protocol::events::{
    AgentNewCustomerData, AgentSentimentUpdateData, AgentWaitingUpdateData, IncomingEvent,
    IncomingEventKind,
};
use crate::state::{Revision, UiState};

const LOAD_STATS_FAILED: &str = "통계를 불러오는데 실패했습니다.";
const LOAD_CUSTOMERS_FAILED: &str = "고객 목록을 불러오는데 실패했습니다.";
const LOAD_CUSTOMER_FAILED: &str = "고객 정보를 불러오는데 실패했습니다.";
const LOAD_SENTIMENT_FAILED: &str = "감정 분석을 불러오는데 실패했습니다.";
const LOAD_PROPOSALS_FAILED: &str = "AI 제안을 불러오는데 실패했습니다.";
const LOAD_RANKING_FAILED: &str = "팀 랭킹을 불러오는데 실패했습니다.";
const LOAD_NOTICES_FAILED: &str = "공지사항을 불러오는데 실패했습니다.";
const LOAD_COUNTS_FAILED: &str = "대기 현황을 불러오는데 실패했습니다.";

#[derive(Debug, Default)]
struct AgentState {
    stats: Option<DashboardStats>,
    customers: Vec<Customer>,
    selected_customer_id: Option<String>,
    /// Полная замена по ID клиента, без слияния полей
    sentiments: HashMap<String, SentimentData>,
    proposals: HashMap<String, Vec<AiProposal>>,
    team_ranking: Option<Vec<TeamRankEntry>>,
    notices: Option<Vec<Notice>>,
    waiting_count: u32,
    consulting_count: u32,
    ui: UiState,
}

impl AgentState {
    /// Заменить клиента с тем же ID или добавить в начало списка
    fn upsert_customer(&mut self, customer: Customer) {
        match self.customers.iter_mut().find(|c| c.id == customer.id) {
            Some(existing) => *existing = customer,
            None => self.customers.insert(0, customer),
        }
    }

    fn customers_with_status(&self, status: CustomerStatus) -> Vec<Customer> {
        self.customers
            .iter()
            .filter(|c| c.status == Some(status))
            .cloned()
            .collect()
    }

    fn set_counts(&mut self, waiting: u32, consulting: u32) {
        self.waiting_count = waiting;
        self.consulting_count = consulting;
        if let Some(stats) = self.stats.as_mut() {
            stats.real_time.waiting_customers = waiting;
            stats.real_time.active_consults = consulting;
        }
    }
}

struct AgentShared {
    state: Mutex<AgentState>,
    api: Arc<dyn AgentApi>,
    bus: Arc<EventBus>,
    subscriptions: Mutex<Vec<Subscription>>,
    revision: Revision,
}

/// Стор панели консультанта. Клоны разделяют одно состояние.
#[derive(Clone)]
pub struct AgentStore {
    shared: Arc<AgentShared>,
}

impl AgentStore {
    pub fn new(api: Arc<dyn AgentApi>, bus: Arc<EventBus>) -> Self {
        Self {
            shared: Arc::new(AgentShared {
                state: Mutex::new(AgentState::default()),
                api,
                bus,
                subscriptions: Mutex::new(Vec::new()),
                revision: Revision::new(),
            }),
        }
    }

    fn weak(&self) -> Weak<AgentShared> {
        Arc::downgrade(&self.shared)
    }

    fn update<R>(&self, apply: impl FnOnce(&mut AgentState) -> R) -> R {
        let result = {
            let mut state = self.shared.state.lock();
            apply(&mut *state)
        };
        self.shared.revision.bump();
        result
    }

    fn read<R>(&self, view: impl FnOnce(&AgentState) -> R) -> R {
        view(&*self.shared.state.lock())
    }

    // ========================================================================
    // Загрузка
    // ========================================================================

    pub async fn load_stats(&self) {
        self.update(|s| s.ui.begin_loading());
        let result = self.shared.api.get_stats().await;
        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => s.stats = Some(response.data),
                Err(e) => s.ui.fail(LOAD_STATS_FAILED, &e),
            }
        });
    }

    pub async fn load_customers(&self, filter: CustomerFilter) {
        self.update(|s| s.ui.begin_loading());
        let result = self.shared.api.get_customers(filter).await;
        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => s.customers = response.data,
                Err(e) => s.ui.fail(LOAD_CUSTOMERS_FAILED, &e),
            }
        });
    }

    /// Загрузить карточку клиента и обновить её в списке
    pub async fn load_customer(&self, customer_id: &str) {
        self.update(|s| s.ui.begin_loading());
        let result = self.shared.api.get_customer(customer_id).await;
        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => s.upsert_customer(response.data),
                Err(e) => s.ui.fail(LOAD_CUSTOMER_FAILED, &e),
            }
        });
    }

    pub async fn load_sentiment(&self, customer_id: &str) {
        self.update(|s| s.ui.begin_loading());
        let result = self.shared.api.get_sentiment(customer_id).await;
        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => {
                    s.sentiments.insert(customer_id.to_string(), response.data);
                }
                Err(e) => s.ui.fail(LOAD_SENTIMENT_FAILED, &e),
            }
        });
    }

    pub async fn load_proposals(&self, customer_id: &str) {
        self.update(|s| s.ui.begin_loading());
        let result = self.shared.api.get_ai_proposals(customer_id).await;
        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => {
                    s.proposals
                        .insert(customer_id.to_string(), response.data.proposals);
                }
                Err(e) => s.ui.fail(LOAD_PROPOSALS_FAILED, &e),
            }
        });
    }

    pub async fn load_team_ranking(&self) {
        self.update(|s| s.ui.begin_loading());
        let result = self.shared.api.get_team_ranking().await;
        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => s.team_ranking = Some(response.data),
                Err(e) => s.ui.fail(LOAD_RANKING_FAILED, &e),
            }
        });
    }

    pub async fn load_notices(&self) {
        self.update(|s| s.ui.begin_loading());
        let result = self.shared.api.get_notices().await;
        self.update(|s| {
            s.ui.is_loading = false;
            match result {
                Ok(response) => s.notices = Some(response.data),
                Err(e) => s.ui.fail(LOAD_NOTICES_FAILED, &e),
            }
        });
    }

    /// Запросить счётчики очереди (до первого `agent:waiting_update`)
    pub async fn load_queue_counts(&self) {
        self.update(|s| s.ui.begin_loading());
        let waiting = self.shared.api.get_waiting_count().await;
        let active = self.shared.api.get_active_count().await;
        self.update(|s| {
            s.ui.is_loading = false;
            match (waiting, active) {
                (Ok(waiting), Ok(active)) => s.set_counts(waiting.data.count, active.data.count),
                (Err(e), _) | (_, Err(e)) => s.ui.fail(LOAD_COUNTS_FAILED, &e),
            }
        });
    }

    /// Выбор клиента синхронный, данные подгружаются отдельными командами
    pub fn select_customer(&self, customer_id: Option<&str>) {
        self.update(|s| s.selected_customer_id = customer_id.map(str::to_string));
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

    /// Подписать обработчики `agent:*`. Повторный вызов ничего не делает.
    pub fn connect_websocket(&self) {
        let mut subscriptions = self.shared.subscriptions.lock();
        if !subscriptions.is_empty() {
            return;
        }

        subscriptions.push(self.listen(IncomingEventKind::AgentWaitingUpdate, |store, event| {
            if let IncomingEvent::AgentWaitingUpdate(data) = event {
                store.handle_waiting_update(data);
            }
        }));
        subscriptions.push(self.listen(IncomingEventKind::AgentNewCustomer, |store, event| {
            if let IncomingEvent::AgentNewCustomer(data) = event {
                store.handle_new_customer(data);
            }
        }));
        subscriptions.push(self.listen(IncomingEventKind::AgentSentimentUpdate, |store, event| {
            if let IncomingEvent::AgentSentimentUpdate(data) = event {
                store.handle_sentiment_update(data);
            }
        }));
        tracing::debug!("agent store listening");
    }

    pub fn disconnect_websocket(&self) {
        let subscriptions: Vec<Subscription> = self.shared.subscriptions.lock().drain(..).collect();
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }
    }

    /// Отписаться от шины. Идемпотентно; таймеров стор не держит.
    pub fn cleanup(&self) {
        self.disconnect_websocket();
    }

    fn listen(&self, kind: IncomingEventKind, handler: fn(&AgentStore, &IncomingEvent)) -> Subscription {
        let weak = self.weak();
        self.shared.bus.on(kind, move |event| {
            if let Some(shared) = weak.upgrade() {
                handler(&AgentStore { shared }, event);
            }
            Ok(())
        })
    }

    // ========================================================================
    // Обработчики входящих событий
    // ========================================================================

    pub fn handle_waiting_update(&self, data: &AgentWaitingUpdateData) {
        self.update(|s| s.set_counts(data.waiting_count, data.consulting_count));
    }

    pub fn handle_new_customer(&self, data: &AgentNewCustomerData) {
        tracing::debug!(customer_id = %data.customer.id, "new customer");
        self.update(|s| s.upsert_customer(data.customer.clone()));
    }

    /// Перезаписывает запись настроения; карточка клиента не меняется
    pub fn handle_sentiment_update(&self, data: &AgentSentimentUpdateData) {
        self.update(|s| {
            s.sentiments
                .insert(data.customer_id.clone(), data.sentiment.clone());
        });
    }

    // ========================================================================
    // Запросы
    // ========================================================================

    pub fn selected_customer(&self) -> Option<Customer> {
        self.read(|s| {
            let id = s.selected_customer_id.as_deref()?;
            s.customers.iter().find(|c| c.id == id).cloned()
        })
    }

    pub fn selected_sentiment(&self) -> Option<SentimentData> {
        self.read(|s| {
            let id = s.selected_customer_id.as_deref()?;
            s.sentiments.get(id).cloned()
        })
    }

    pub fn selected_proposals(&self) -> Vec<AiProposal> {
        self.read(|s| {
            s.selected_customer_id
                .as_deref()
                .and_then(|id| s.proposals.get(id))
                .cloned()
                .unwrap_or_default()
        })
    }

    pub fn consulting_customers(&self) -> Vec<Customer> {
        self.read(|s| s.customers_with_status(CustomerStatus::Consulting))
    }

    pub fn waiting_customers(&self) -> Vec<Customer> {
        self.read(|s| s.customers_with_status(CustomerStatus::Waiting))
    }

    pub fn waiting_count(&self) -> u32 {
        self.read(|s| s.waiting_count)
    }

    pub fn consulting_count(&self) -> u32 {
        self.read(|s| s.consulting_count)
    }

    pub fn stats(&self) -> Option<DashboardStats> {
        self.read(|s| s.stats.clone())
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.read(|s| s.customers.clone())
    }

    pub fn selected_customer_id(&self) -> Option<String> {
        self.read(|s| s.selected_customer_id.clone())
    }

    pub fn sentiment(&self, customer_id: &str) -> Option<SentimentData> {
        self.read(|s| s.sentiments.get(customer_id).cloned())
    }

    pub fn proposals(&self, customer_id: &str) -> Option<Vec<AiProposal>> {
        self.read(|s| s.proposals.get(customer_id).cloned())
    }

    pub fn team_ranking(&self) -> Option<Vec<TeamRankEntry>> {
        self.read(|s| s.team_ranking.clone())
    }

    pub fn notices(&self) -> Option<Vec<Notice>> {
        self.read(|s| s.notices.clone())
    }

    pub fn ui(&self) -> UiState {
        self.read(|s| s.ui.clone())
    }

    pub fn is_loading(&self) -> bool {
        self.read(|s| s.ui.is_loading)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|s| s.ui.error.clone())
    }

    pub fn is_listening(&self) -> bool {
        !self.shared.subscriptions.lock().is_empty()
    }

    pub fn changes(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        self.shared.revision.current()
    }
}
