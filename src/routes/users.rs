use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::{
    error::AppResult,
    models::{LikedSongResponse, SuggestionResponse},
};

#[derive(Debug, Deserialize)]
pub struct UserSuggestionQuery {
    genre: Option<String>,
    limit: Option<usize>,
}

/// Handler for GET /api/v1/users/:user_id/likes
pub async fn likes(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<LikedSongResponse>>> {
    let likes = state.suggestions.liked_songs(&user_id).await?;
    Ok(Json(likes.into_iter().map(LikedSongResponse::from).collect()))
}

/// Handler for GET /api/v1/users/:user_id/suggestions
pub async fn suggestions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<UserSuggestionQuery>,
) -> AppResult<Json<SuggestionResponse>> {
    let suggestions = state
        .suggestions
        .suggest_for_user(&user_id, params.genre.as_deref(), params.limit)
        .await?;
    Ok(Json(SuggestionResponse { suggestions }))
}
