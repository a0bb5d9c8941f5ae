//! Axum route handlers for the Pajama Finder API.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::info;

use crate::errors::AppError;
use crate::finder::models::{FinderRequest, FinderResponse};
use crate::finder::recommender::find_kits;
use crate::finder::validation::validate_request;
use crate::state::AppState;

/// POST /pajama-finder
///
/// Validates the request, asks the completion service for 1–4 kits, and returns only
/// picks whose handle was submitted. Upstream failures degrade to the fallback list.
pub async fn handle_pajama_finder(
    State(state): State<AppState>,
    payload: Result<Json<FinderRequest>, JsonRejection>,
) -> Result<Json<FinderResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    info!(
        question = request.question.as_deref().unwrap_or_default(),
        kits_count = request.kits.as_ref().map_or(0, Vec::len),
        "Incoming pajama-finder request"
    );

    let request = validate_request(request)?;
    let llm = state.llm.as_deref().ok_or(AppError::ConfigurationMissing)?;

    let response = find_kits(&request, llm, state.config.upstream_timeout).await;

    info!(
        "Returning {} recommendation(s)",
        response.recommendations.len()
    );
    Ok(Json(response))
}
