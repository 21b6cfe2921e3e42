//! Polling sync client.
//!
//! Keeps a local view of the completed-analyses feed and the aggregate stats
//! fresh by polling the server on a fixed interval. Consumers read the view
//! through a shared handle; they never talk to the server directly.
//!
//! Refresh semantics:
//! - Each tick fetches the feed and the stats concurrently.
//! - A successful fetch replaces the corresponding slice of the view
//!   wholesale. There is no merging, so a record deleted server-side
//!   disappears on the next tick.
//! - A failed feed fetch leaves the previous feed in place and surfaces the
//!   error on the view. A failed stats fetch only leaves the previous
//!   snapshot in place; stats staleness is not worth alarming over.
//! - Ticks are independent: a slow refresh never delays or blocks the next
//!   one, and two overlapping refreshes both resolve to full-replacement
//!   writes, so the view is always some server state, never a splice of two.

use reqwest::header::{HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::OWNER_ID_HEADER;
use crate::models::{ImageListResponse, ImageResponse, StatsSnapshot};

/// Default poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Per-request timeout. Shorter than the poll interval so a hung request
/// resolves before the next tick piles on top of it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// Sync client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server base URL, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Owner identity forwarded on every request.
    pub owner_id: Uuid,
    /// Poll interval.
    pub interval: Duration,
    /// Page size for the completed-analyses feed.
    pub page_limit: u32,
}

impl SyncConfig {
    pub fn new(base_url: impl Into<String>, owner_id: Uuid) -> Self {
        SyncConfig {
            base_url: base_url.into(),
            owner_id,
            interval: DEFAULT_POLL_INTERVAL,
            page_limit: 20,
        }
    }
}

/// The locally maintained view of server state.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// First page of the completed-analyses feed, newest first.
    pub analyses: Vec<ImageResponse>,
    /// Latest stats snapshot, absent until the first successful fetch.
    pub stats: Option<StatsSnapshot>,
    /// Error from the most recent feed fetch, cleared on success.
    pub last_error: Option<String>,
    /// Number of refreshes that have written to this view.
    pub refresh_count: u64,
}

/// Fold one refresh's results into the view.
///
/// Feed and stats fail independently. Only a feed failure is surfaced; the
/// previous data is kept either way.
fn apply_refresh(
    state: &mut ViewState,
    feed: Result<Vec<ImageResponse>, String>,
    stats: Result<StatsSnapshot, String>,
) {
    match feed {
        Ok(analyses) => {
            state.analyses = analyses;
            state.last_error = None;
        }
        Err(message) => {
            state.last_error = Some(message);
        }
    }

    if let Ok(snapshot) = stats {
        state.stats = Some(snapshot);
    }

    state.refresh_count += 1;
}

/// Errors constructing the sync client.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Invalid sync client configuration: {0}")]
    Config(String),
}

/// Handle to a running poll loop.
///
/// Dropping the handle stops the loop; no tick fires afterwards.
pub struct SyncHandle {
    state: Arc<RwLock<ViewState>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Snapshot the current view.
    pub async fn view(&self) -> ViewState {
        self.state.read().await.clone()
    }

    /// Stop polling. Idempotent. No further tick fires; a refresh already in
    /// flight may still complete and write once more to the view.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Polling client over the server's read API.
pub struct SyncClient {
    http: reqwest::Client,
    config: SyncConfig,
}

impl SyncClient {
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        let owner_value = HeaderValue::from_str(&config.owner_id.to_string())
            .map_err(|e| SyncError::Config(format!("owner id header: {}", e)))?;
        headers.insert(OWNER_ID_HEADER, owner_value);

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        Ok(SyncClient { http, config })
    }

    /// Start the poll loop. The first refresh runs immediately.
    pub fn start(self) -> SyncHandle {
        let state = Arc::new(RwLock::new(ViewState::default()));
        let client = Arc::new(self);
        let loop_state = state.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(client.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Independent task per tick so one slow refresh cannot
                // stall the schedule.
                let client = client.clone();
                let state = loop_state.clone();
                tokio::spawn(async move {
                    client.refresh(&state).await;
                });
            }
        });

        SyncHandle { state, task }
    }

    /// Run one refresh against the shared view.
    pub async fn refresh(&self, state: &RwLock<ViewState>) {
        let (feed, stats) = tokio::join!(self.fetch_feed(), self.fetch_stats());

        if let Err(message) = &feed {
            warn!("Completed-analyses refresh failed: {}", message);
        }
        if let Err(message) = &stats {
            debug!("Stats refresh failed: {}", message);
        }

        let mut view = state.write().await;
        apply_refresh(&mut view, feed, stats);
    }

    async fn fetch_feed(&self) -> Result<Vec<ImageResponse>, String> {
        let url = format!(
            "{}/api/v1/completed-analyses?page=1&limit={}",
            self.config.base_url, self.config.page_limit
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        let body: ImageListResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.images)
    }

    async fn fetch_stats(&self) -> Result<StatsSnapshot, String> {
        let url = format!("{}/api/v1/stats", self.config.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;

        response.json().await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRecord, ImageStatus, RiskLevel};

    fn completed_response(name: &str) -> ImageResponse {
        let mut record = ImageRecord::new_pending(
            Uuid::new_v4(),
            format!("{}.png", Uuid::now_v7()),
            name.to_string(),
        );
        record.apply_outcome(crate::models::AnalysisOutcome::Completed {
            risk_level: RiskLevel::None,
            risk_description: "No hazards detected".to_string(),
            detected_objects: vec![],
            confidence_scores: None,
        });
        ImageResponse::from(record)
    }

    fn snapshot(completed: u64) -> StatsSnapshot {
        StatsSnapshot::from_counts(
            [(ImageStatus::Completed, completed)],
            [(RiskLevel::None, completed)],
        )
    }

    #[test]
    fn test_successful_refresh_replaces_wholesale() {
        let mut state = ViewState::default();
        apply_refresh(
            &mut state,
            Ok(vec![completed_response("a.png"), completed_response("b.png")]),
            Ok(snapshot(2)),
        );
        assert_eq!(state.analyses.len(), 2);
        assert!(state.last_error.is_none());
        assert_eq!(state.refresh_count, 1);

        // A shorter feed fully replaces the longer one; nothing merges.
        apply_refresh(&mut state, Ok(vec![completed_response("c.png")]), Ok(snapshot(1)));
        assert_eq!(state.analyses.len(), 1);
        assert_eq!(state.analyses[0].original_filename, "c.png");
        assert_eq!(state.refresh_count, 2);
    }

    #[test]
    fn test_feed_failure_keeps_data_and_surfaces_error() {
        let mut state = ViewState::default();
        apply_refresh(
            &mut state,
            Ok(vec![completed_response("a.png")]),
            Ok(snapshot(1)),
        );

        apply_refresh(
            &mut state,
            Err("connection refused".to_string()),
            Err("connection refused".to_string()),
        );
        assert_eq!(state.analyses.len(), 1);
        assert_eq!(state.last_error.as_deref(), Some("connection refused"));
        // Stats keep the previous snapshot silently
        assert_eq!(state.stats.as_ref().map(|s| s.total_completed()), Some(1));
    }

    #[test]
    fn test_error_clears_on_next_success() {
        let mut state = ViewState::default();
        apply_refresh(&mut state, Err("timeout".to_string()), Ok(snapshot(0)));
        assert!(state.last_error.is_some());

        apply_refresh(&mut state, Ok(vec![]), Ok(snapshot(0)));
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_stats_failure_is_independent_of_feed() {
        let mut state = ViewState::default();
        apply_refresh(
            &mut state,
            Ok(vec![completed_response("a.png")]),
            Err("500".to_string()),
        );
        assert_eq!(state.analyses.len(), 1);
        assert!(state.last_error.is_none());
        assert!(state.stats.is_none());
    }

    #[tokio::test]
    async fn test_stop_prevents_further_ticks() {
        let client = SyncClient::new(SyncConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            owner_id: Uuid::new_v4(),
            interval: Duration::from_millis(10),
            page_limit: 20,
        })
        .unwrap();

        let handle = client.start();
        handle.stop();
        let count_after_stop = handle.view().await.refresh_count;
        tokio::time::sleep(Duration::from_millis(50)).await;
        // No refresh may have started after stop; at most the in-flight one
        // from before the abort can land.
        assert!(handle.view().await.refresh_count <= count_after_stop + 1);
    }
}
