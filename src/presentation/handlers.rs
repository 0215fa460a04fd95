// HTTP request handlers
use crate::application::sync_loop::{DashboardView, FETCH_FAILED_MESSAGE};
use crate::application::telemetry_api::{FetchError, DEFAULT_CHART_LIMIT, DEFAULT_RECORDS_LIMIT};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

impl LimitQuery {
    fn resolve(&self, default: NonZeroU32) -> Result<NonZeroU32, StatusCode> {
        match self.limit {
            None => Ok(default),
            Some(limit) => NonZeroU32::new(limit).ok_or(StatusCode::BAD_REQUEST),
        }
    }
}

fn upstream<T: Serialize>(result: Result<T, FetchError>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(_) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": FETCH_FAILED_MESSAGE })),
        )
            .into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Current dashboard view, as last applied by the sync loop
pub async fn dashboard(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    Json(state.view.borrow().clone())
}

/// The current view, then one item per change, ending when the sync loop stops.
fn view_updates(
    view: watch::Receiver<DashboardView>,
    mut stopped: watch::Receiver<bool>,
) -> impl Stream<Item = DashboardView> {
    WatchStream::new(view).take_until(async move {
        let _ = stopped.wait_for(|stopped| *stopped).await;
    })
}

/// Server-sent events: the current view, then one event per change
pub async fn dashboard_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = view_updates(state.view.clone(), state.stopped.clone())
        .map(|view| Event::default().event("dashboard").json_data(view));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn latest_record(State(state): State<Arc<AppState>>) -> Response {
    upstream(state.api.latest_record().await)
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Response {
    upstream(state.api.stats().await)
}

pub async fn chart_series(
    Query(query): Query<LimitQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match query.resolve(DEFAULT_CHART_LIMIT) {
        Ok(limit) => upstream(state.api.chart_series(limit).await),
        Err(status) => status.into_response(),
    }
}

pub async fn records(
    Query(query): Query<LimitQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match query.resolve(DEFAULT_RECORDS_LIMIT) {
        Ok(limit) => upstream(state.api.records(limit).await),
        Err(status) => status.into_response(),
    }
}
