use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::refresh::Refresher;
use crate::app::store::LeaderboardStore;
use crate::model::LeaderboardEntry;

pub const WELCOME_MESSAGE: &str = "Hello! This is the SkillBoost Leaderboard API.";
pub const REFRESHED_MESSAGE: &str = "Student data refreshed successfully!";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LeaderboardStore>,
    pub refresher: Arc<Refresher>,
}

#[derive(Debug, Serialize)]
struct MessageBody {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Any failure surfaced to an API caller as `500 {"error": ...}`.
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: format!("{:#}", self.0),
            }),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/students", get(list_students))
        .route("/api/students/refresh", post(refresh_students))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Json<MessageBody> {
    Json(MessageBody {
        message: WELCOME_MESSAGE,
    })
}

async fn list_students(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let entries = state.store.list().await?;
    Ok(Json(entries))
}

async fn refresh_students(State(state): State<AppState>) -> Result<Json<MessageBody>, ApiError> {
    if let Err(err) = state.refresher.perform_refresh().await {
        tracing::error!(?err, "manual refresh failed");
        return Err(err.into());
    }
    Ok(Json(MessageBody {
        message: REFRESHED_MESSAGE,
    }))
}
