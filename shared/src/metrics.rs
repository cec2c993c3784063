//! Request and chat telemetry.
//!
//! Records are retained in bounded windows for latency percentiles; the
//! cumulative counters are kept separately so rotation never lowers a count.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::Result;

/// Default number of records kept per stream.
pub const DEFAULT_RETENTION: usize = 10_000;

/// One completed HTTP request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMetricRecord {
    pub method: String,
    pub status_code: u16,
    pub latency_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

/// One chat interaction outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMetricRecord {
    pub user_id: String,
    pub query_type: String,
    pub latency_seconds: f64,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMetricRecord {
    pub fn succeeded(user_id: &str, query_type: &str, latency_seconds: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            query_type: query_type.to_string(),
            latency_seconds,
            success: true,
            timestamp: Utc::now(),
        }
    }

    /// Failed interactions are recorded with `query_type = "error"` and zero latency.
    pub fn failed(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            query_type: "error".to_string(),
            latency_seconds: 0.0,
            success: false,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated request statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub by_status: BTreeMap<u16, u64>,
    pub by_method: BTreeMap<String, u64>,
    pub avg_latency_seconds: f64,
    pub p50_latency_seconds: f64,
    pub p95_latency_seconds: f64,
    pub p99_latency_seconds: f64,
}

/// Aggregated chat statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatStats {
    pub total: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub by_query_type: BTreeMap<String, u64>,
    pub avg_latency_seconds: f64,
}

/// Point-in-time view over all recorded telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests: RequestStats,
    pub chat: ChatStats,
    pub retained_records: usize,
    pub generated_at: DateTime<Utc>,
}

/// Sink for gateway telemetry.
#[async_trait]
pub trait MetricsRecorder: Send + Sync {
    async fn record_request(&self, record: RequestMetricRecord);

    async fn record_chat(&self, record: ChatMetricRecord);

    async fn snapshot(&self) -> Result<MetricsSnapshot>;
}

#[derive(Default)]
struct Totals {
    requests: u64,
    by_status: BTreeMap<u16, u64>,
    by_method: BTreeMap<String, u64>,
    request_latency_sum: f64,
    chats: u64,
    chats_succeeded: u64,
    by_query_type: BTreeMap<String, u64>,
    chat_latency_sum: f64,
}

#[derive(Default)]
struct MetricsState {
    requests: VecDeque<RequestMetricRecord>,
    chats: VecDeque<ChatMetricRecord>,
    totals: Totals,
}

/// Process-local recorder; one lock guards records and counters together so
/// a snapshot never observes half of an update.
pub struct InMemoryMetricsRecorder {
    retention: usize,
    state: Mutex<MetricsState>,
}

impl InMemoryMetricsRecorder {
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            state: Mutex::new(MetricsState::default()),
        }
    }
}

impl Default for InMemoryMetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

#[async_trait]
impl MetricsRecorder for InMemoryMetricsRecorder {
    async fn record_request(&self, record: RequestMetricRecord) {
        let mut state = self.state.lock().await;
        let totals = &mut state.totals;
        totals.requests += 1;
        *totals.by_status.entry(record.status_code).or_default() += 1;
        *totals.by_method.entry(record.method.clone()).or_default() += 1;
        totals.request_latency_sum += record.latency_seconds;

        if state.requests.len() == self.retention {
            state.requests.pop_front();
        }
        state.requests.push_back(record);
    }

    async fn record_chat(&self, record: ChatMetricRecord) {
        let mut state = self.state.lock().await;
        let totals = &mut state.totals;
        totals.chats += 1;
        if record.success {
            totals.chats_succeeded += 1;
        }
        *totals.by_query_type.entry(record.query_type.clone()).or_default() += 1;
        totals.chat_latency_sum += record.latency_seconds;

        if state.chats.len() == self.retention {
            state.chats.pop_front();
        }
        state.chats.push_back(record);
    }

    async fn snapshot(&self) -> Result<MetricsSnapshot> {
        let state = self.state.lock().await;
        let totals = &state.totals;

        let mut latencies: Vec<f64> = state.requests.iter().map(|r| r.latency_seconds).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let requests = RequestStats {
            total: totals.requests,
            by_status: totals.by_status.clone(),
            by_method: totals.by_method.clone(),
            avg_latency_seconds: ratio(totals.request_latency_sum, totals.requests),
            p50_latency_seconds: percentile(&latencies, 50.0),
            p95_latency_seconds: percentile(&latencies, 95.0),
            p99_latency_seconds: percentile(&latencies, 99.0),
        };

        let chat = ChatStats {
            total: totals.chats,
            succeeded: totals.chats_succeeded,
            failed: totals.chats - totals.chats_succeeded,
            success_rate: ratio(totals.chats_succeeded as f64, totals.chats),
            by_query_type: totals.by_query_type.clone(),
            avg_latency_seconds: ratio(totals.chat_latency_sum, totals.chats),
        };

        Ok(MetricsSnapshot {
            requests,
            chat,
            retained_records: state.requests.len() + state.chats.len(),
            generated_at: Utc::now(),
        })
    }
}

fn ratio(numerator: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        numerator / count as f64
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
