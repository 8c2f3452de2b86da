use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{filter_stock, StockItem};

/// Buffer size for refresh results. A view has at most one live task, plus
/// the odd result from a task superseded after it already sent.
const CHANNEL_BUFFER_SIZE: usize = 4;

/// Where the view is in its load cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewPhase {
    /// Not mounted yet
    NoData,
    /// Nothing to show; waiting on the first fetch
    Loading,
    /// Showing cached data that may be out of date
    ShowingStale,
    /// Showing data while a background fetch runs
    Refreshing,
    /// Showing data fetched this session
    ShowingFresh,
    /// First fetch failed with nothing cached to fall back on
    Failed(String),
}

/// Result sent back from a refresh task
struct RefreshResult {
    generation: u64,
    result: Result<Vec<StockItem>, ApiError>,
}

/// A background fetch owned by a view. Dropping it aborts the fetch, so a
/// view that goes away (or starts a newer refresh) never sees its result.
pub struct RefreshTask {
    generation: u64,
    handle: JoinHandle<()>,
}

impl RefreshTask {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Stale-while-revalidate view over live stock.
///
/// On mount, cached stock (of any age) is shown at once and a background
/// fetch starts. A successful fetch replaces the data; a failed one keeps
/// what is shown. With nothing cached the view waits in `Loading`.
pub struct StockView {
    api: ApiClient,
    items: Option<Vec<StockItem>>,
    items_fresh: bool,
    phase: ViewPhase,
    generation: u64,
    task: Option<RefreshTask>,
    refresh_tx: mpsc::Sender<RefreshResult>,
    refresh_rx: mpsc::Receiver<RefreshResult>,
}

impl StockView {
    pub fn new(api: ApiClient) -> Self {
        let (refresh_tx, refresh_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            api,
            items: None,
            items_fresh: false,
            phase: ViewPhase::NoData,
            generation: 0,
            task: None,
            refresh_tx,
            refresh_rx,
        }
    }

    /// Show cached stock if there is any and start a background fetch.
    /// Must be called from within a tokio runtime.
    pub fn mount(&mut self) {
        self.show_cached();
        self.spawn_fetch(false);
    }

    /// Like `mount`, but the fetch bypasses a fresh cache entry.
    pub fn mount_forced(&mut self) {
        self.show_cached();
        self.spawn_fetch(true);
    }

    fn show_cached(&mut self) {
        match self.api.cached_live_stock() {
            Some(items) => {
                debug!(count = items.len(), "Showing cached stock");
                self.items = Some(items);
                self.items_fresh = false;
                self.phase = ViewPhase::ShowingStale;
            }
            None => {
                self.phase = ViewPhase::Loading;
            }
        }
    }

    /// Start a new fetch. With `force`, the fetch goes to the network even
    /// while the cache is fresh; the cached entry survives a failed fetch.
    pub fn refresh(&mut self, force: bool) {
        if self.items.is_none() {
            self.phase = ViewPhase::Loading;
        }
        self.spawn_fetch(force);
    }

    fn spawn_fetch(&mut self, force: bool) {
        self.generation += 1;
        let generation = self.generation;
        let api = self.api.clone();
        let tx = self.refresh_tx.clone();

        let handle = tokio::spawn(async move {
            let result = if force {
                api.refresh_live_stock().await
            } else {
                api.fetch_live_stock().await
            };
            if tx.send(RefreshResult { generation, result }).await.is_err() {
                debug!(generation, "View gone before refresh finished");
            }
        });

        if self.items.is_some() {
            self.phase = ViewPhase::Refreshing;
        }
        // Replacing the old task aborts it
        self.task = Some(RefreshTask { generation, handle });
    }

    /// Apply any finished refresh without waiting. Returns true if the view
    /// changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(result) = self.refresh_rx.try_recv() {
            changed |= self.apply(result);
        }
        changed
    }

    /// Wait for the current refresh, if any, and apply its result.
    pub async fn settle(&mut self) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        let generation = task.generation;
        if let Err(e) = (&mut task.handle).await {
            warn!(error = %e, "Refresh task ended abnormally");
        }
        self.poll();

        // The task died without reporting back
        if self.task.as_ref().map(|t| t.generation) == Some(generation) {
            self.apply(RefreshResult {
                generation,
                result: Err(ApiError::InvalidResponse(
                    "refresh task ended without a result".to_string(),
                )),
            });
        }
    }

    fn apply(&mut self, refresh: RefreshResult) -> bool {
        if refresh.generation != self.generation {
            debug!(
                generation = refresh.generation,
                current = self.generation,
                "Discarding superseded refresh"
            );
            return false;
        }
        self.task = None;

        match refresh.result {
            Ok(items) => {
                info!(count = items.len(), "Live stock refreshed");
                self.items = Some(items);
                self.items_fresh = true;
                self.phase = ViewPhase::ShowingFresh;
            }
            Err(e) if self.items.is_some() => {
                // The user already sees usable data
                warn!(error = %e, "Background refresh failed, keeping current stock");
                self.phase = if self.items_fresh {
                    ViewPhase::ShowingFresh
                } else {
                    ViewPhase::ShowingStale
                };
            }
            Err(e) => {
                warn!(error = %e, "Loading live stock failed");
                self.phase = ViewPhase::Failed(e.to_string());
            }
        }
        true
    }

    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    pub fn items(&self) -> Option<&[StockItem]> {
        self.items.as_deref()
    }

    /// Shown items matching `query` (see `filter_stock`).
    pub fn filtered(&self, query: &str) -> Vec<&StockItem> {
        self.items
            .as_deref()
            .map(|items| filter_stock(items, query))
            .unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == ViewPhase::Loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.phase == ViewPhase::Refreshing
    }

    pub fn is_stale(&self) -> bool {
        self.items.is_some() && !self.items_fresh
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            ViewPhase::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Generation of the running refresh, if any.
    pub fn pending(&self) -> Option<u64> {
        self.task.as_ref().map(RefreshTask::generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::api::fake::{ok_json, status, FakeTransport};
    use crate::api::HttpResponse;
    use crate::cache::{CacheManager, DurableStore, MemoryStore, CACHE_TTL_MINUTES};
    use crate::config::Config;

    fn stock(component: &str, count: u32) -> StockItem {
        StockItem {
            component: component.to_string(),
            stock: count,
            case_name: "CaseA".to_string(),
        }
    }

    /// Cache holding live stock written two hours ago.
    fn stale_cache(items: &[StockItem]) -> Arc<CacheManager> {
        let store = MemoryStore::new();
        let written = Utc::now() - Duration::minutes(CACHE_TTL_MINUTES * 2);
        let entry = json!({"data": items, "timestamp": written.timestamp_millis()});
        store
            .set("inv-cache:getLiveStock", &entry.to_string())
            .unwrap();
        Arc::new(CacheManager::new(store))
    }

    fn view(
        cache: Arc<CacheManager>,
        response: HttpResponse,
    ) -> (StockView, Arc<FakeTransport>, Arc<tokio::sync::Semaphore>) {
        let (transport, gate) = FakeTransport::new(move |_| response.clone()).gated();
        let transport = Arc::new(transport);
        let config = Config {
            backend_url: Some("https://script.example.com/exec".to_string()),
            ..Default::default()
        };
        let api = ApiClient::with_transport(&config, cache, transport.clone());
        (StockView::new(api), transport, gate)
    }

    fn fresh_response() -> HttpResponse {
        ok_json(json!([{"component": "Servo", "stock": 7, "caseName": "CaseA"}]))
    }

    #[tokio::test]
    async fn test_stale_data_shown_before_refresh_completes() {
        let stale = vec![stock("Servo", 2)];
        let (mut view, _transport, gate) = view(stale_cache(&stale), fresh_response());
        assert_eq!(view.phase(), &ViewPhase::NoData);

        view.mount();

        assert_eq!(view.items(), Some(stale.as_slice()));
        assert!(view.is_refreshing());
        assert!(view.is_stale());
        tokio::task::yield_now().await;
        assert!(!view.poll());
        assert_eq!(view.items(), Some(stale.as_slice()));

        gate.add_permits(1);
        view.settle().await;

        assert_eq!(view.phase(), &ViewPhase::ShowingFresh);
        assert_eq!(view.items(), Some([stock("Servo", 7)].as_slice()));
        assert!(!view.is_refreshing());
        assert!(!view.is_stale());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_data() {
        let stale = vec![stock("Servo", 2)];
        let (mut view, _transport, gate) = view(stale_cache(&stale), status(503));

        view.mount();
        gate.add_permits(1);
        view.settle().await;

        assert_eq!(view.phase(), &ViewPhase::ShowingStale);
        assert_eq!(view.items(), Some(stale.as_slice()));
        assert!(!view.is_refreshing());
        assert!(view.error().is_none());
    }

    #[tokio::test]
    async fn test_no_cache_blocks_until_first_fetch() {
        let (mut view, _transport, gate) =
            view(Arc::new(CacheManager::in_memory()), fresh_response());

        view.mount();
        assert!(view.is_loading());
        assert!(view.items().is_none());

        gate.add_permits(1);
        view.settle().await;

        assert_eq!(view.phase(), &ViewPhase::ShowingFresh);
        assert_eq!(view.filtered("servo").len(), 1);
    }

    #[tokio::test]
    async fn test_no_cache_and_failed_fetch_surfaces_error() {
        let (mut view, _transport, gate) = view(Arc::new(CacheManager::in_memory()), status(500));

        view.mount();
        gate.add_permits(1);
        view.settle().await;

        assert!(view.items().is_none());
        assert!(view.error().unwrap().contains("Server error"));
    }

    #[tokio::test]
    async fn test_superseded_refresh_is_discarded() {
        let stale = vec![stock("Servo", 2)];
        let (mut view, transport, gate) = view(stale_cache(&stale), fresh_response());

        view.mount();
        let first = view.pending().unwrap();
        view.refresh(true);
        assert_eq!(view.pending(), Some(first + 1));

        // A result tagged with the old generation changes nothing
        let applied = view.apply(RefreshResult {
            generation: first,
            result: Ok(vec![stock("Servo", 99)]),
        });
        assert!(!applied);
        assert_eq!(view.items(), Some(stale.as_slice()));

        gate.add_permits(2);
        view.settle().await;

        assert_eq!(view.items(), Some([stock("Servo", 7)].as_slice()));
        assert!(view.pending().is_none());
        // The first task was aborted before it ever ran
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_forced_refresh_keeps_cached_stock() {
        let stale = vec![stock("Servo", 2)];
        let store = MemoryStore::new();
        let written = Utc::now() - Duration::minutes(CACHE_TTL_MINUTES * 2);
        let entry = json!({"data": &stale, "timestamp": written.timestamp_millis()});
        store
            .set("inv-cache:getLiveStock", &entry.to_string())
            .unwrap();
        let (mut view, _transport, gate) =
            view(Arc::new(CacheManager::new(store.clone())), status(503));

        view.mount_forced();
        assert_eq!(view.items(), Some(stale.as_slice()));
        gate.add_permits(1);
        view.settle().await;

        assert_eq!(view.phase(), &ViewPhase::ShowingStale);
        assert_eq!(view.items(), Some(stale.as_slice()));

        // A new session still has the entry to fall back on
        let restarted = CacheManager::new(store);
        assert_eq!(
            restarted.get_stale::<Vec<StockItem>>("getLiveStock"),
            Some(stale)
        );
    }

    #[tokio::test]
    async fn test_failed_forced_refresh_without_display_keeps_cache() {
        let stale = vec![stock("Servo", 2)];
        let (mut view, _transport, gate) = view(stale_cache(&stale), status(503));

        view.refresh(true);
        gate.add_permits(1);
        view.settle().await;

        assert!(view.error().is_some());
        assert_eq!(view.api.cached_live_stock(), Some(stale));
    }

    #[tokio::test]
    async fn test_forced_refresh_skips_fresh_cache() {
        let cache = Arc::new(CacheManager::in_memory());
        cache.set("getLiveStock", &vec![stock("Servo", 2)]);
        let (mut view, transport, gate) = view(cache, fresh_response());

        view.mount();
        gate.add_permits(1);
        view.settle().await;
        assert!(transport.requests().is_empty());
        assert_eq!(view.items(), Some([stock("Servo", 2)].as_slice()));

        view.refresh(true);
        gate.add_permits(1);
        view.settle().await;
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(view.items(), Some([stock("Servo", 7)].as_slice()));
    }

    #[tokio::test]
    async fn test_settle_without_refresh_is_noop() {
        let (mut view, _transport, _gate) =
            view(Arc::new(CacheManager::in_memory()), fresh_response());
        view.settle().await;
        assert_eq!(view.phase(), &ViewPhase::NoData);
    }
}
