use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use common::Strategy;
use painter::{Controller, PainterError};
use serde::Deserialize;
use std::sync::Arc;

use crate::store::SessionStore;
use crate::surface::WsSurface;
use crate::ws;

pub type Painter = Controller<WsSurface>;

#[derive(Clone)]
pub struct AppState {
    pub painter: Arc<Painter>,
    pub store: SessionStore,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/image", post(select_image))
        .route("/api/calibrate", post(calibrate))
        .route("/api/draw", post(draw))
        .route("/api/census", post(census).get(last_census))
        .route("/api/cancel", post(cancel))
        .route("/api/purchase", post(purchase_completed))
        .route("/api/settings", put(update_settings))
        .route("/api/status", get(status))
        .route("/api/tasks", get(pending_tasks))
        .route("/api/charges", get(charges))
        .route("/api/session", get(session).delete(forget_session))
        .route("/api/health", get(health))
        .route("/ws/page", get(page_upgrade))
        .route("/ws/status", get(status_upgrade))
        .with_state(state)
}

/// Engine errors as HTTP responses.
pub struct ApiError(PainterError);

impl From<PainterError> for ApiError {
    fn from(e: PainterError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            PainterError::Busy(_) | PainterError::Cancelled => StatusCode::CONFLICT,
            PainterError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
            PainterError::Api(_) => StatusCode::BAD_GATEWAY,
            PainterError::Surface(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        (code, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Write the session record after an operation that may have changed it.
async fn persist(state: &AppState) {
    if let Some(record) = state.painter.to_record().await {
        state.store.save(&record).await;
    }
}

async fn select_image(State(state): State<AppState>) -> ApiResult<painter::ImageSummary> {
    let summary = state.painter.select_image().await?;
    persist(&state).await;
    Ok(Json(summary))
}

async fn calibrate(State(state): State<AppState>) -> ApiResult<common::Calibration> {
    let calibration = state.painter.calibrate().await?;
    persist(&state).await;
    Ok(Json(calibration))
}

async fn draw(State(state): State<AppState>) -> ApiResult<painter::DrawOutcome> {
    let outcome = state.painter.draw().await?;
    tracing::info!(
        "Painted {} pixels, {} left ({:?})",
        outcome.painted,
        outcome.remaining,
        outcome.stop
    );
    Ok(Json(outcome))
}

async fn census(State(state): State<AppState>) -> ApiResult<painter::census::Census> {
    let census = state.painter.census().await?;
    state.store.save_census(&census).await;
    Ok(Json(census))
}

async fn last_census(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.painter.last_census().await)
}

async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("Cancelling {}", state.painter.phase());
    state.painter.cancel();
    StatusCode::NO_CONTENT
}

async fn purchase_completed(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.painter.purchase_completed()?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    scale: Option<u32>,
    strategy: Option<Strategy>,
    overlay_opacity: Option<u8>,
    widget: Option<(f64, f64)>,
}

async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> ApiResult<Option<painter::ImageSummary>> {
    let painter = &state.painter;
    if let Some(strategy) = settings.strategy {
        painter.set_strategy(strategy)?;
    }
    if let Some(opacity) = settings.overlay_opacity {
        painter.set_overlay_opacity(opacity)?;
    }
    if let Some((x, y)) = settings.widget {
        painter.set_widget_position(x, y)?;
    }
    let summary = match settings.scale {
        Some(scale) => painter.set_scale(scale)?,
        None => None,
    };
    persist(&state).await;
    Ok(Json(summary))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(ws::status_snapshot(&state.painter))
}

async fn pending_tasks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.painter.pending_tasks().await)
}

async fn charges(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let charges = state.painter.charges().await?;
    Ok(Json(serde_json::json!({
        "count": charges.count,
        "max": charges.max,
        "cooldownMs": charges.cooldown_ms,
        "msUntilFull": charges.ms_until_full(),
    })))
}

async fn session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.painter.to_record().await)
}

async fn forget_session(State(state): State<AppState>) -> impl IntoResponse {
    state.store.clear().await;
    StatusCode::NO_CONTENT
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "phase": state.painter.phase(),
        "page_connected": state.painter.surface().is_connected(),
    }))
}

async fn page_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_page_socket(socket, state))
}

async fn status_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_status_socket(socket, state))
}
