use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use reading_publisher::MemorySink;
use types::PublishedReading;

#[derive(Clone)]
pub struct HttpState {
    pub readings: MemorySink,
    pub metrics: Option<PrometheusHandle>,
}

/// A reading plus its rendered state string.
#[derive(Debug, Serialize)]
pub struct ReadingView {
    #[serde(flatten)]
    pub reading: PublishedReading,
    pub state: Option<String>,
}

impl From<PublishedReading> for ReadingView {
    fn from(reading: PublishedReading) -> Self {
        let state = reading.state();
        Self { reading, state }
    }
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/readings", get(list_readings))
        .route("/readings/:id", get(get_reading))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "http listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await
}

async fn health() -> &'static str {
    "ok"
}

async fn list_readings(State(state): State<HttpState>) -> Json<Vec<ReadingView>> {
    Json(state.readings.all().into_iter().map(ReadingView::from).collect())
}

async fn get_reading(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<ReadingView>, StatusCode> {
    state
        .readings
        .get(&id)
        .map(|reading| Json(ReadingView::from(reading)))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn render_metrics(State(state): State<HttpState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
