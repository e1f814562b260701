use axum::{extract::State, Json};

use super::AppState;
use crate::{
    error::{AppError, AppResult},
    models::{SuggestionRequest, SuggestionResponse},
};

/// Handler for POST /api/v1/suggestions
pub async fn suggest(
    State(state): State<AppState>,
    Json(request): Json<SuggestionRequest>,
) -> AppResult<Json<SuggestionResponse>> {
    if !state.search_available {
        return Err(AppError::ServiceUnavailable(
            "Song search is not configured".to_string(),
        ));
    }

    let suggestions = state.suggestions.suggest_for_songs(&request).await?;
    Ok(Json(SuggestionResponse { suggestions }))
}
