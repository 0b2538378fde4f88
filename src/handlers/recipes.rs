use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::models::Recipe;

/// GET /api/recipes - all recipes owned by the caller
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<Recipe>> {
    let recipes = state.recipes.list(&user.owner_id).await?;
    Ok(ApiResponse::success(recipes))
}

/// GET /api/recipes/:id - a single recipe owned by the caller
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Recipe> {
    let recipe = state.recipes.get(&user.owner_id, &id).await?;
    Ok(ApiResponse::success(recipe))
}

/// POST /api/recipes - create a recipe, answering 201 with its location
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Recipe> {
    let body = json_body(payload)?;
    let recipe = state.recipes.create(&user.owner_id, &body).await?;
    let location = format!("{}/{}", uri.path().trim_end_matches('/'), recipe.id);
    Ok(ApiResponse::created(recipe, location))
}

/// PUT /api/recipes/:id - replace a recipe owned by the caller
pub async fn put(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Recipe> {
    let body = json_body(payload)?;
    let recipe = state.recipes.update(&user.owner_id, &id, &body).await?;
    Ok(ApiResponse::success(recipe))
}

/// DELETE /api/recipes/:id - 204 whether or not anything was removed
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.recipes.delete(&user.owner_id, &id).await?;
    Ok(ApiResponse::no_content())
}

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        // A body sent without a JSON content type carries no fields
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(Value::Null),
        Err(rejection @ (JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_))) => {
            Err(ApiError::invalid_json(rejection.body_text()))
        }
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(ApiError::payload_too_large(rejection.body_text()))
        }
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}
