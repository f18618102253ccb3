//! HTTP routes.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use dropfour_domain::LeaderboardEntry;
use serde::Deserialize;

use crate::app::App;
use crate::infrastructure::ports::DEFAULT_LEADERBOARD_LIMIT;

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/leaderboard", get(leaderboard))
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    limit: Option<String>,
}

async fn leaderboard(
    State(app): State<Arc<App>>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let limit = match query.limit.as_deref().map(str::trim) {
        None | Some("") => DEFAULT_LEADERBOARD_LIMIT,
        Some(raw) => parse_limit(raw)?,
    };

    let entries = app
        .repositories
        .game_records
        .get_leaderboard(limit)
        .await?;
    Ok(Json(entries))
}

fn parse_limit(raw: &str) -> Result<u32, ApiError> {
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
        _ => Err(ApiError::BadRequest(
            "limit must be a positive integer".to_string(),
        )),
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::BadRequest(msg) => {
                (axum::http::StatusCode::BAD_REQUEST, msg).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error",
                )
                    .into_response()
            }
        }
    }
}

impl From<crate::infrastructure::ports::RepoError> for ApiError {
    fn from(e: crate::infrastructure::ports::RepoError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
