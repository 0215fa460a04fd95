// Synchronization loop - polls the dashboard snapshot and owns the live view
use crate::application::telemetry_api::TelemetryApi;
use crate::domain::dashboard::DashboardSnapshot;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// The one message shown for any failed poll.
pub const FETCH_FAILED_MESSAGE: &str = "failed to retrieve data from backend";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncPhase {
    /// No poll has succeeded yet; data is the placeholder.
    Initializing,
    Ready,
    /// Latest poll failed; data is the last good snapshot.
    Degraded,
}

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub data: Arc<DashboardSnapshot>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub phase: SyncPhase,
}

impl DashboardView {
    pub fn initial() -> Self {
        Self {
            data: Arc::new(DashboardSnapshot::placeholder()),
            is_loading: true,
            error: None,
            phase: SyncPhase::Initializing,
        }
    }

    fn succeeded(&self, snapshot: DashboardSnapshot) -> Self {
        // Keep the old allocation when nothing changed.
        let data = if *self.data == snapshot {
            Arc::clone(&self.data)
        } else {
            Arc::new(snapshot)
        };
        Self {
            data,
            is_loading: false,
            error: None,
            phase: SyncPhase::Ready,
        }
    }

    fn failed(&self, message: String) -> Self {
        let phase = match self.phase {
            SyncPhase::Initializing => SyncPhase::Initializing,
            SyncPhase::Ready | SyncPhase::Degraded => SyncPhase::Degraded,
        };
        Self {
            data: Arc::clone(&self.data),
            is_loading: false,
            error: Some(message),
            phase,
        }
    }
}

/// State shared between the ticker, in-flight polls and the handle.
/// `active` and `last_applied` are only read or written inside the watch
/// channel's write lock, so a result is either applied before deactivation
/// completes or not at all.
struct Shared {
    tx: watch::Sender<DashboardView>,
    active: AtomicBool,
    last_applied: AtomicU64,
    /// Flips to `true` once on stop; lets readers end without waiting for
    /// in-flight polls to release `tx`.
    stopped: watch::Sender<bool>,
}

impl Shared {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(DashboardView::initial());
        let (stopped, _rx) = watch::channel(false);
        Self {
            tx,
            active: AtomicBool::new(true),
            last_applied: AtomicU64::new(0),
            stopped,
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn apply(&self, seq: u64, outcome: Result<DashboardSnapshot, String>) -> bool {
        self.tx.send_if_modified(|view| {
            if !self.active.load(Ordering::Relaxed) {
                tracing::debug!("Discarding poll #{} result, sync loop stopped", seq);
                return false;
            }
            if seq < self.last_applied.load(Ordering::Relaxed) {
                tracing::debug!("Discarding poll #{} result, a newer poll already landed", seq);
                return false;
            }
            self.last_applied.store(seq, Ordering::Relaxed);

            let next = match outcome {
                Ok(snapshot) => view.succeeded(snapshot),
                Err(message) => view.failed(message),
            };
            if *view == next {
                return false;
            }
            *view = next;
            true
        })
    }

    fn deactivate(&self) -> bool {
        let mut was_active = false;
        self.tx.send_if_modified(|_| {
            was_active = self.active.swap(false, Ordering::Relaxed);
            false
        });
        if was_active {
            self.stopped.send_replace(true);
        }
        was_active
    }
}

pub struct SyncLoop {
    api: Arc<dyn TelemetryApi>,
    interval: Duration,
}

impl SyncLoop {
    pub fn new(api: Arc<dyn TelemetryApi>, interval: Duration) -> Self {
        Self { api, interval }
    }

    /// Start polling: one fetch right away, then one per interval until
    /// the returned handle is stopped or dropped.
    pub fn spawn(self) -> SyncHandle {
        let shared = Arc::new(Shared::new());

        tracing::info!("Starting dashboard sync every {:?}", self.interval);
        let ticker = tokio::spawn(run_ticker(self.api, self.interval, Arc::clone(&shared)));

        SyncHandle { shared, ticker }
    }
}

async fn run_ticker(api: Arc<dyn TelemetryApi>, period: Duration, shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut seq: u64 = 0;
    loop {
        interval.tick().await;
        if !shared.is_active() {
            break;
        }
        seq += 1;

        // Polls are never queued behind each other; a slow one may overlap the next.
        let api = Arc::clone(&api);
        let shared = Arc::clone(&shared);
        tokio::spawn(async move {
            poll_once(api, shared, seq).await;
        });
    }
}

async fn poll_once(api: Arc<dyn TelemetryApi>, shared: Arc<Shared>, seq: u64) {
    let outcome = match AssertUnwindSafe(api.dashboard_snapshot()).catch_unwind().await {
        Ok(Ok(snapshot)) => {
            tracing::debug!(
                "Poll #{} got {}: {}/{} modules healthy, alarm={}",
                seq,
                snapshot.site_info.site_name,
                snapshot.healthy_module_count(),
                snapshot.modules.len(),
                snapshot.site_info.status_realtime.is_alarm()
            );
            Ok(snapshot)
        }
        Ok(Err(e)) => {
            tracing::debug!("Poll #{} failed: {}", seq, e);
            Err(FETCH_FAILED_MESSAGE.to_string())
        }
        Err(_) => {
            tracing::error!("Poll #{} panicked while fetching the dashboard", seq);
            Err(FETCH_FAILED_MESSAGE.to_string())
        }
    };

    if shared.apply(seq, outcome) {
        tracing::debug!("Dashboard view updated by poll #{}", seq);
    }
}

/// Owner of a running sync loop. Dropping it stops the loop.
pub struct SyncHandle {
    shared: Arc<Shared>,
    ticker: JoinHandle<()>,
}

impl SyncHandle {
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.shared.tx.subscribe()
    }

    /// Becomes `true` when the loop stops. Long-lived readers should end
    /// on it rather than on the view channel closing.
    pub fn stopped(&self) -> watch::Receiver<bool> {
        self.shared.stopped.subscribe()
    }

    /// Cancel the timer. Polls already in flight finish but their results
    /// are dropped.
    pub fn stop(&self) {
        self.ticker.abort();
        if self.shared.deactivate() {
            tracing::info!("Dashboard sync stopped");
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::telemetry_api::FetchError;
    use crate::domain::dashboard::tests::sample_snapshot;
    use crate::domain::dashboard::LOADING_SITE_NAME;
    use crate::domain::telemetry::{ChartSeries, RectifierRecord, RectifierStats};
    use crate::infrastructure::rectifier_client::RectifierClient;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::collections::VecDeque;
    use std::num::NonZeroU32;
    use std::sync::Mutex;
    use tokio::sync::{mpsc, oneshot};

    type Reply = Result<DashboardSnapshot, FetchError>;

    fn unavailable() -> FetchError {
        FetchError::Status {
            url: "scripted".to_string(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Each dashboard call announces itself on `started` and then waits for
    /// the next scripted reply. Calls beyond the script never resolve.
    struct ScriptedApi {
        replies: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
        started: mpsc::UnboundedSender<usize>,
        calls: Mutex<usize>,
    }

    fn scripted(
        polls: usize,
    ) -> (Arc<ScriptedApi>, VecDeque<oneshot::Sender<Reply>>, mpsc::UnboundedReceiver<usize>) {
        let (started_tx, started_rx) = mpsc::unbounded_channel();
        let mut senders = VecDeque::new();
        let mut receivers = VecDeque::new();
        for _ in 0..polls {
            let (tx, rx) = oneshot::channel();
            senders.push_back(tx);
            receivers.push_back(rx);
        }
        let api = Arc::new(ScriptedApi {
            replies: Mutex::new(receivers),
            started: started_tx,
            calls: Mutex::new(0),
        });
        (api, senders, started_rx)
    }

    #[async_trait]
    impl TelemetryApi for ScriptedApi {
        async fn dashboard_snapshot(&self) -> Result<DashboardSnapshot, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls
            };
            let _ = self.started.send(call);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(unavailable())),
                None => std::future::pending().await,
            }
        }

        async fn latest_record(&self) -> Result<RectifierRecord, FetchError> {
            Err(unavailable())
        }

        async fn stats(&self) -> Result<RectifierStats, FetchError> {
            Err(unavailable())
        }

        async fn chart_series(&self, _limit: NonZeroU32) -> Result<ChartSeries, FetchError> {
            Err(unavailable())
        }

        async fn records(&self, _limit: NonZeroU32) -> Result<Vec<RectifierRecord>, FetchError> {
            Err(unavailable())
        }
    }

    struct PanickingApi;

    #[async_trait]
    impl TelemetryApi for PanickingApi {
        async fn dashboard_snapshot(&self) -> Result<DashboardSnapshot, FetchError> {
            panic!("decoder blew up")
        }

        async fn latest_record(&self) -> Result<RectifierRecord, FetchError> {
            Err(unavailable())
        }

        async fn stats(&self) -> Result<RectifierStats, FetchError> {
            Err(unavailable())
        }

        async fn chart_series(&self, _limit: NonZeroU32) -> Result<ChartSeries, FetchError> {
            Err(unavailable())
        }

        async fn records(&self, _limit: NonZeroU32) -> Result<Vec<RectifierRecord>, FetchError> {
            Err(unavailable())
        }
    }

    /// Lets every runnable task finish before the paused clock moves on.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_is_exposed() {
        let (api, mut replies, mut started) = scripted(1);
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let mut rx = handle.subscribe();

        assert!(rx.borrow().is_loading);
        assert_eq!(rx.borrow().data.site_info.site_name, LOADING_SITE_NAME);

        assert_eq!(started.recv().await, Some(1));
        replies.pop_front().unwrap().send(Ok(sample_snapshot("Site-42"))).unwrap();
        rx.changed().await.unwrap();

        let view = rx.borrow_and_update().clone();
        assert_eq!(view.data.site_info.site_name, "Site-42");
        assert_eq!(*view.data, sample_snapshot("Site-42"));
        assert!(!view.is_loading);
        assert_eq!(view.error, None);
        assert_eq!(view.phase, SyncPhase::Ready);
    }

    #[tokio::test]
    async fn test_unreachable_backend_keeps_placeholder() {
        let api = Arc::new(RectifierClient::new("http://127.0.0.1:9/api"));
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        let view = rx.borrow_and_update().clone();

        assert_eq!(view.data.site_info.site_name, LOADING_SITE_NAME);
        assert_eq!(view.error.as_deref(), Some(FETCH_FAILED_MESSAGE));
        assert!(!view.is_loading);
        assert_eq!(view.phase, SyncPhase::Initializing);
        handle.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_success_keeps_last_snapshot() {
        let (api, mut replies, mut started) = scripted(2);
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let mut rx = handle.subscribe();

        assert_eq!(started.recv().await, Some(1));
        replies.pop_front().unwrap().send(Ok(sample_snapshot("S1"))).unwrap();
        rx.changed().await.unwrap();
        rx.borrow_and_update();

        // Second poll is issued one interval later.
        assert_eq!(started.recv().await, Some(2));
        replies.pop_front().unwrap().send(Err(unavailable())).unwrap();
        rx.changed().await.unwrap();

        let view = rx.borrow_and_update().clone();
        assert_eq!(*view.data, sample_snapshot("S1"));
        assert_eq!(view.error.as_deref(), Some(FETCH_FAILED_MESSAGE));
        assert!(!view.is_loading);
        assert_eq!(view.phase, SyncPhase::Degraded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_clears_once_and_stays_cleared() {
        let (api, mut replies, mut started) = scripted(2);
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let mut rx = handle.subscribe();

        assert_eq!(started.recv().await, Some(1));
        replies.pop_front().unwrap().send(Err(unavailable())).unwrap();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_loading);

        assert_eq!(started.recv().await, Some(2));
        replies.pop_front().unwrap().send(Ok(sample_snapshot("S1"))).unwrap();
        rx.changed().await.unwrap();

        let view = rx.borrow_and_update().clone();
        assert!(!view.is_loading);
        assert_eq!(view.error, None);
        assert_eq!(view.phase, SyncPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_snapshot_does_not_notify() {
        let (api, mut replies, mut started) = scripted(2);
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let mut rx = handle.subscribe();

        assert_eq!(started.recv().await, Some(1));
        replies.pop_front().unwrap().send(Ok(sample_snapshot("S1"))).unwrap();
        rx.changed().await.unwrap();
        let first = rx.borrow_and_update().clone();

        assert_eq!(started.recv().await, Some(2));
        replies.pop_front().unwrap().send(Ok(sample_snapshot("S1"))).unwrap();
        settle().await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(rx.borrow().clone(), first);
        assert!(Arc::ptr_eq(&rx.borrow().clone().data, &first.data));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_completion_keeps_newest_poll() {
        let (api, mut replies, mut started) = scripted(2);
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let mut rx = handle.subscribe();

        // Poll 1 hangs across the next tick.
        assert_eq!(started.recv().await, Some(1));
        assert_eq!(started.recv().await, Some(2));
        let poll_one = replies.pop_front().unwrap();
        let poll_two = replies.pop_front().unwrap();

        poll_two.send(Ok(sample_snapshot("S2"))).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().data.site_info.site_name, "S2");

        poll_one.send(Ok(sample_snapshot("S1"))).unwrap();
        settle().await;

        assert!(!rx.has_changed().unwrap());
        assert_eq!(rx.borrow().clone().data.site_info.site_name, "S2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_after_stop_is_discarded() {
        let (api, mut replies, mut started) = scripted(1);
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let rx = handle.subscribe();

        assert_eq!(started.recv().await, Some(1));
        handle.stop();

        replies.pop_front().unwrap().send(Ok(sample_snapshot("S1"))).unwrap();
        settle().await;

        assert!(!rx.has_changed().unwrap());
        let view = rx.borrow().clone();
        assert_eq!(view.data.site_info.site_name, LOADING_SITE_NAME);
        assert!(view.is_loading);

        // No further polls once stopped.
        tokio::time::sleep(DEFAULT_POLL_INTERVAL * 5).await;
        assert!(started.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_signals_readers_while_poll_hangs() {
        let (api, _replies, mut started) = scripted(1);
        let handle = SyncLoop::new(api, DEFAULT_POLL_INTERVAL).spawn();
        let mut stopped = handle.stopped();
        assert!(!*stopped.borrow());

        // The only scripted reply is never sent, so poll 1 stays in flight.
        assert_eq!(started.recv().await, Some(1));
        drop(handle);

        let signalled = tokio::time::timeout(Duration::from_secs(1), stopped.wait_for(|s| *s)).await;
        assert!(matches!(signalled, Ok(Ok(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_exits_without_polling_once_inactive() {
        let (api, _replies, mut started) = scripted(1);
        let shared = Arc::new(Shared::new());
        shared.deactivate();

        let ticker = run_ticker(api, DEFAULT_POLL_INTERVAL, Arc::clone(&shared));
        let finished = tokio::time::timeout(DEFAULT_POLL_INTERVAL * 3, ticker).await;

        assert!(finished.is_ok());
        assert!(started.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_fetch_is_a_failed_poll() {
        let handle = SyncLoop::new(Arc::new(PanickingApi), DEFAULT_POLL_INTERVAL).spawn();
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        let view = rx.borrow_and_update().clone();

        assert_eq!(view.data.site_info.site_name, LOADING_SITE_NAME);
        assert_eq!(view.error.as_deref(), Some(FETCH_FAILED_MESSAGE));
        assert!(!view.is_loading);
    }

    #[test]
    fn test_view_serializes_for_renderers() {
        let value = serde_json::to_value(DashboardView::initial()).unwrap();

        assert_eq!(value["isLoading"], true);
        assert_eq!(value["error"], serde_json::Value::Null);
        assert_eq!(value["phase"], "initializing");
        assert_eq!(value["data"]["siteInfo"]["siteName"], "Loading...");
    }
}
