// API панели консультанта: статистика, клиенты, эмоции, предложения AI

use std::collections::HashMap;

use async_trait::async_trait;

use super::types::*;
use super::{ApiError, ApiResponse, ApiResult, Latency};
use crate::utils::time::{days_ago, minutes_ago};

#[async_trait]
pub trait AgentApi: Send + Sync {
    async fn get_stats(&self) -> ApiResult<DashboardStats>;

    async fn get_customers(&self, filter: CustomerFilter) -> ApiResult<Vec<Customer>>;

    async fn get_customer(&self, customer_id: &str) -> ApiResult<Customer>;

    async fn get_sentiment(&self, customer_id: &str) -> ApiResult<SentimentData>;

    async fn get_ai_proposals(&self, customer_id: &str) -> ApiResult<AiProposalsResponse>;

    async fn get_waiting_count(&self) -> ApiResult<CountResponse>;

    async fn get_active_count(&self) -> ApiResult<CountResponse>;

    async fn get_team_ranking(&self) -> ApiResult<Vec<TeamRankEntry>>;

    async fn get_notices(&self) -> ApiResult<Vec<Notice>>;
}

/// In-memory сервис консультанта
pub struct MockAgentApi {
    customers: Vec<Customer>,
    sentiments: HashMap<String, SentimentData>,
    proposals: HashMap<String, Vec<AiProposal>>,
    latency: Latency,
}

impl MockAgentApi {
    pub fn new() -> Self {
        Self::with_latency(Latency::realistic())
    }

    pub fn with_latency(latency: Latency) -> Self {
        Self {
            customers: seed_customers(),
            sentiments: seed_sentiments(),
            proposals: seed_proposals(),
            latency,
        }
    }

    fn count_by_status(&self, status: CustomerStatus) -> u32 {
        self.customers
            .iter()
            .filter(|c| c.status == Some(status))
            .count() as u32
    }
}

impl Default for MockAgentApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentApi for MockAgentApi {
    async fn get_stats(&self) -> ApiResult<DashboardStats> {
        self.latency.wait(300).await;

        let activity = [4, 8, 12, 5, 9, 15, 10]
            .into_iter()
            .enumerate()
            .map(|(i, count)| ActivityPoint {
                time: format!("{}시", 9 + i),
                count,
            })
            .collect();

        let queue = [2, 4, 8, 5, 3, 6, 9, 7, 4]
            .into_iter()
            .enumerate()
            .map(|(i, waiting)| QueuePoint {
                time: format!("{:02}:{:02}", 9 + i / 4, (i % 4) * 15),
                waiting,
            })
            .collect();

        Ok(ApiResponse::ok(DashboardStats {
            today: TodayStats {
                consult_count: 23,
                avg_duration: "5m 30s".to_string(),
                satisfaction: 4.8,
                change: StatsChange {
                    consult_count: "150%".to_string(),
                    avg_duration: "30s".to_string(),
                    satisfaction: "0.2".to_string(),
                },
            },
            real_time: RealTimeStats {
                active_consults: 3,
                waiting_customers: 2,
                avg_wait_time: "4m 20s".to_string(),
            },
            activity,
            queue,
        }))
    }

    async fn get_customers(&self, filter: CustomerFilter) -> ApiResult<Vec<Customer>> {
        self.latency.wait(300).await;

        let customers = self
            .customers
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        Ok(ApiResponse::ok(customers))
    }

    async fn get_customer(&self, customer_id: &str) -> ApiResult<Customer> {
        self.latency.wait(200).await;

        self.customers
            .iter()
            .find(|c| c.id == customer_id)
            .cloned()
            .map(ApiResponse::ok)
            .ok_or_else(|| ApiError::new("NOT_FOUND", "고객을 찾을 수 없습니다."))
    }

    async fn get_sentiment(&self, customer_id: &str) -> ApiResult<SentimentData> {
        self.latency.wait(400).await;

        let sentiment = self
            .sentiments
            .get(customer_id)
            .cloned()
            .unwrap_or_else(|| SentimentData {
                customer_id: customer_id.to_string(),
                customer_name: "알 수 없음".to_string(),
                current_sentiment: Sentiment::Neutral,
                sentiment_score: 0,
                sentiment_history: Vec::new(),
                keywords: Vec::new(),
                risk_level: RiskLevel::Medium,
                suggested_actions: None,
            });
        Ok(ApiResponse::ok(sentiment))
    }

    async fn get_ai_proposals(&self, customer_id: &str) -> ApiResult<AiProposalsResponse> {
        self.latency.wait(300).await;

        let proposals = self.proposals.get(customer_id).cloned().unwrap_or_default();
        let summary = if proposals.is_empty() {
            "새로운 제안이 없습니다.".to_string()
        } else {
            format!("{}개의 제안이 있습니다.", proposals.len())
        };

        Ok(ApiResponse::ok(AiProposalsResponse {
            customer_id: customer_id.to_string(),
            proposals,
            summary: Some(summary),
        }))
    }

    async fn get_waiting_count(&self) -> ApiResult<CountResponse> {
        self.latency.wait(100).await;
        Ok(ApiResponse::ok(CountResponse {
            count: self.count_by_status(CustomerStatus::Waiting),
        }))
    }

    async fn get_active_count(&self) -> ApiResult<CountResponse> {
        self.latency.wait(100).await;
        Ok(ApiResponse::ok(CountResponse {
            count: self.count_by_status(CustomerStatus::Consulting),
        }))
    }

    async fn get_team_ranking(&self) -> ApiResult<Vec<TeamRankEntry>> {
        self.latency.wait(200).await;

        let ranking = [
            ("김미래", 23, 4.8),
            ("이철수", 21, 4.7),
            ("박영희", 18, 4.6),
            ("최수진", 15, 4.5),
            ("정준호", 12, 4.4),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, (name, consult_count, satisfaction))| TeamRankEntry {
            rank: i as u32 + 1,
            name: name.to_string(),
            consult_count,
            satisfaction,
        })
        .collect();

        Ok(ApiResponse::ok(ranking))
    }

    async fn get_notices(&self) -> ApiResult<Vec<Notice>> {
        self.latency.wait(200).await;

        Ok(ApiResponse::ok(vec![
            Notice {
                id: "notice-1".to_string(),
                title: "시스템 점검 안내".to_string(),
                content: "오늘 밤 22:00 - 23:00 서버 패치가 있습니다.".to_string(),
                kind: NoticeKind::System,
                created_at: minutes_ago(120),
            },
            Notice {
                id: "notice-2".to_string(),
                title: "신규 스크립트 업데이트".to_string(),
                content: "변경된 대출 정책을 확인해주세요.".to_string(),
                kind: NoticeKind::Update,
                created_at: days_ago(1),
            },
        ]))
    }
}

struct CustomerSeed {
    id: &'static str,
    name: &'static str,
    phone: &'static str,
    email: Option<(&'static str, &'static str)>,
    segment: Segment,
    risk: RiskLevel,
    last_consult_days: Option<i64>,
    consult_count: u32,
    status: CustomerStatus,
    tags: &'static [&'static str],
}

impl From<CustomerSeed> for Customer {
    fn from(seed: CustomerSeed) -> Self {
        Customer {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            phone: seed.phone.to_string(),
            masked_phone: format!("{}****{}", &seed.phone[..3], &seed.phone[7..]),
            email: seed.email.map(|(raw, _)| raw.to_string()),
            masked_email: seed.email.map(|(_, masked)| masked.to_string()),
            segment: Some(seed.segment),
            risk_level: Some(seed.risk),
            last_consult_date: seed.last_consult_days.map(days_ago),
            consult_count: seed.consult_count,
            status: Some(seed.status),
            priority: None,
            tags: seed.tags.iter().map(|t| t.to_string()).collect(),
            avatar: Some("👤".to_string()),
        }
    }
}

fn seed_customers() -> Vec<Customer> {
    vec![
        CustomerSeed {
            id: "customer-1",
            name: "김미래",
            phone: "01012345678",
            email: Some(("mirae@example.com", "mir***@example.com")),
            segment: Segment::Vip,
            risk: RiskLevel::Low,
            last_consult_days: Some(2),
            consult_count: 15,
            status: CustomerStatus::Consulting,
            tags: &["우수고객", "장기고객"],
        },
        CustomerSeed {
            id: "customer-2",
            name: "이철수",
            phone: "01023456789",
            email: None,
            segment: Segment::General,
            risk: RiskLevel::Medium,
            last_consult_days: Some(7),
            consult_count: 5,
            status: CustomerStatus::Waiting,
            tags: &["신규"],
        },
        CustomerSeed {
            id: "customer-3",
            name: "박영희",
            phone: "01034567890",
            email: Some(("younghee@example.com", "you***@example.com")),
            segment: Segment::Vip,
            risk: RiskLevel::Low,
            last_consult_days: Some(1),
            consult_count: 23,
            status: CustomerStatus::Consulting,
            tags: &["우수고객", "정회원"],
        },
        CustomerSeed {
            id: "customer-4",
            name: "최수진",
            phone: "01045678901",
            email: None,
            segment: Segment::New,
            risk: RiskLevel::High,
            last_consult_days: None,
            consult_count: 1,
            status: CustomerStatus::Waiting,
            tags: &["긴급"],
        },
        CustomerSeed {
            id: "customer-5",
            name: "정준호",
            phone: "01056789012",
            email: Some(("junho@example.com", "jun***@example.com")),
            segment: Segment::General,
            risk: RiskLevel::Low,
            last_consult_days: Some(14),
            consult_count: 3,
            status: CustomerStatus::Completed,
            tags: &[],
        },
    ]
    .into_iter()
    .map(Customer::from)
    .collect()
}

fn samples(points: &[(&str, i32, Sentiment)]) -> Vec<SentimentSample> {
    points
        .iter()
        .map(|&(time, score, emotion)| SentimentSample {
            time: time.to_string(),
            score,
            emotion,
        })
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn seed_sentiments() -> HashMap<String, SentimentData> {
    use Sentiment::*;

    let entries = [
        SentimentData {
            customer_id: "customer-1".to_string(),
            customer_name: "김미래".to_string(),
            current_sentiment: Positive,
            sentiment_score: 75,
            sentiment_history: samples(&[
                ("10:00", 50, Neutral),
                ("10:15", 60, Positive),
                ("10:30", 75, Positive),
                ("10:45", 70, Positive),
            ]),
            keywords: strings(&["금리", "상환", "기간"]),
            risk_level: RiskLevel::Low,
            suggested_actions: Some(strings(&["추가 상품 추천", "만족도 조사 요청"])),
        },
        SentimentData {
            customer_id: "customer-2".to_string(),
            customer_name: "이철수".to_string(),
            current_sentiment: Neutral,
            sentiment_score: 10,
            sentiment_history: samples(&[("09:00", 0, Neutral), ("09:30", 10, Neutral)]),
            keywords: strings(&["계좌", "개설", "서류"]),
            risk_level: RiskLevel::Medium,
            suggested_actions: Some(strings(&["필요 서류 안내", "영업점 방문 권유"])),
        },
        SentimentData {
            customer_id: "customer-4".to_string(),
            customer_name: "최수진".to_string(),
            current_sentiment: Negative,
            sentiment_score: -60,
            sentiment_history: samples(&[
                ("11:00", -30, Negative),
                ("11:15", -50, Negative),
                ("11:30", -60, Angry),
            ]),
            keywords: strings(&["긴급", "불만", "지연"]),
            risk_level: RiskLevel::High,
            suggested_actions: Some(strings(&["우선 배정", "팀장 에스컬레이션"])),
        },
    ];

    entries
        .into_iter()
        .map(|s| (s.customer_id.clone(), s))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn proposal(
    id: &str,
    kind: ProposalKind,
    title: &str,
    description: &str,
    confidence: f64,
    category: &str,
    metadata: ProposalMetadata,
    priority: ProposalPriority,
    minutes: i64,
) -> AiProposal {
    AiProposal {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        description: description.to_string(),
        confidence,
        category: Some(category.to_string()),
        metadata: Some(metadata),
        priority,
        created_at: minutes_ago(minutes),
    }
}

fn seed_proposals() -> HashMap<String, Vec<AiProposal>> {
    HashMap::from([
        (
            "customer-1".to_string(),
            vec![
                proposal(
                    "proposal-1-1",
                    ProposalKind::NextBestAction,
                    "신용대출 한도 상향 추천",
                    "고객님의 최근 신용 등급 상승으로 신용대출 한도를 500만원에서 700만원으로 상향할 수 있습니다.",
                    0.92,
                    "대출",
                    ProposalMetadata {
                        script_id: Some("script-loan-increase".to_string()),
                        reason: Some("신용등급 상승 (750 → 780)".to_string()),
                        ..Default::default()
                    },
                    ProposalPriority::High,
                    5,
                ),
                proposal(
                    "proposal-1-2",
                    ProposalKind::Knowledge,
                    "대출 금리 인하 안내",
                    "최근 금리 인하로 신용대출 금리가 연 4.5%에서 4.2%로 인하되었습니다.",
                    0.88,
                    "대출",
                    ProposalMetadata {
                        knowledge_id: Some("knowledge-rate-decrease".to_string()),
                        ..Default::default()
                    },
                    ProposalPriority::Normal,
                    10,
                ),
            ],
        ),
        (
            "customer-2".to_string(),
            vec![proposal(
                "proposal-2-1",
                ProposalKind::Script,
                "계좌 개설 절차 안내",
                "모바일 앱을 통한 계좌 개설 절차를 안내해주세요.",
                0.85,
                "계좌",
                ProposalMetadata {
                    script_id: Some("script-account-guide".to_string()),
                    ..Default::default()
                },
                ProposalPriority::Normal,
                3,
            )],
        ),
        (
            "customer-4".to_string(),
            vec![proposal(
                "proposal-4-1",
                ProposalKind::Warning,
                "긴급: 고객 불만도 상승",
                "고객이 현재 불만을 표출하고 있습니다. 즉시 우선적으로 응대해주세요.",
                0.95,
                "위험관리",
                ProposalMetadata {
                    reason: Some("감정분석: angry (-60)".to_string()),
                    ..Default::default()
                },
                ProposalPriority::High,
                2,
            )],
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> MockAgentApi {
        MockAgentApi::with_latency(Latency::none())
    }

    #[tokio::test]
    async fn test_customer_filters() {
        let api = api();

        let waiting = api
            .get_customers(CustomerFilter {
                status: Some(CustomerStatus::Waiting),
                ..Default::default()
            })
            .await
            .unwrap()
            .data;
        assert_eq!(waiting.len(), 2);

        let vip = api
            .get_customers(CustomerFilter {
                segment: Some(Segment::Vip),
                ..Default::default()
            })
            .await
            .unwrap()
            .data;
        assert_eq!(vip.len(), 2);

        let by_masked_phone = api
            .get_customers(CustomerFilter {
                search: Some("****5678".to_string()),
                ..Default::default()
            })
            .await
            .unwrap()
            .data;
        assert_eq!(by_masked_phone.len(), 1);
        assert_eq!(by_masked_phone[0].masked_phone, "010****5678");
    }

    #[tokio::test]
    async fn test_sentiment_seed_and_default() {
        let api = api();

        let known = api.get_sentiment("customer-1").await.unwrap().data;
        assert_eq!(known.current_sentiment, Sentiment::Positive);
        assert_eq!(known.sentiment_score, 75);
        assert_eq!(known.risk_level, RiskLevel::Low);

        let unknown = api.get_sentiment("customer-9").await.unwrap().data;
        assert_eq!(unknown.current_sentiment, Sentiment::Neutral);
        assert_eq!(unknown.customer_id, "customer-9");
        assert!(unknown.sentiment_history.is_empty());
    }

    #[tokio::test]
    async fn test_proposals_summary() {
        let api = api();

        let found = api.get_ai_proposals("customer-1").await.unwrap().data;
        assert_eq!(found.proposals.len(), 2);
        assert_eq!(found.summary.as_deref(), Some("2개의 제안이 있습니다."));

        let empty = api.get_ai_proposals("customer-5").await.unwrap().data;
        assert!(empty.proposals.is_empty());
    }

    #[tokio::test]
    async fn test_counts_and_lookup() {
        let api = api();
        assert_eq!(api.get_waiting_count().await.unwrap().data.count, 2);
        assert_eq!(api.get_active_count().await.unwrap().data.count, 2);
        assert_eq!(
            api.get_customer("customer-404").await.unwrap_err().code(),
            "NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_stats_series() {
        let stats = api().get_stats().await.unwrap().data;
        assert_eq!(stats.real_time.waiting_customers, 2);
        assert_eq!(stats.activity[0].time, "9시");
        assert_eq!(stats.queue[1].time, "09:15");
        assert_eq!(stats.queue[8].time, "11:00");
    }
}
