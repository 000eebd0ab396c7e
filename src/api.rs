//! HTTP surface over the match store.
//!
//! The handlers translate store semantics into status codes so remote
//! clients ([`crate::store::HttpStore`]) see exactly what an in-process
//! caller would: 404 for missing rows, 409 for a lost conditional update.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::store::{CreateProfileRequest, MatchStore, StoreError, UpdateRequest};
use crate::types::NewMatch;

type SharedStore = Arc<dyn MatchStore>;

/// Default number of leaderboard rows when the query does not say.
const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Assemble the service router over any store implementation.
pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/api/profiles", post(create_profile))
        .route("/api/profiles/{id}", get(get_profile))
        .route("/api/matches", post(create_match).get(list_matches))
        .route("/api/matches/{id}", get(get_match).patch(update_match))
        .route("/api/leaderboard", get(leaderboard))
        .with_state(store)
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Player whose own matches are filtered out of the list.
    pub exclude: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

async fn create_profile(
    State(store): State<SharedStore>,
    Json(body): Json<CreateProfileRequest>,
) -> Response {
    if body.username.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "username must not be empty").into_response();
    }
    match store.create_profile(&body.username).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_profile(State(store): State<SharedStore>, Path(id): Path<String>) -> Response {
    match store.get_profile(&id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_match(
    State(store): State<SharedStore>,
    Json(body): Json<NewMatch>,
) -> Response {
    if body.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "match name must not be empty").into_response();
    }
    match store.insert_match(body).await {
        Ok(row) => Json(row).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_match(State(store): State<SharedStore>, Path(id): Path<String>) -> Response {
    match store.get_match(&id).await {
        Ok(row) => Json(row).into_response(),
        Err(err) => error_response(err),
    }
}

async fn update_match(
    State(store): State<SharedStore>,
    Path(id): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> Response {
    match store.update_match(&id, body.guard, body.patch).await {
        Ok(row) => Json(row).into_response(),
        Err(err) => error_response(err),
    }
}

async fn list_matches(
    State(store): State<SharedStore>,
    Query(query): Query<ListQuery>,
) -> Response {
    let exclude = query.exclude.unwrap_or_default();
    match store.list_waiting(&exclude).await {
        Ok(open) => Json(open).into_response(),
        Err(err) => error_response(err),
    }
}

async fn leaderboard(
    State(store): State<SharedStore>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    match store.leaderboard(limit).await {
        Ok(entries) => Json(entries).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: StoreError) -> Response {
    let status = match err {
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::ConditionFailed => StatusCode::CONFLICT,
        StoreError::Transport(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        tracing::error!("store error: {}", err);
    }
    (status, err.to_string()).into_response()
}
