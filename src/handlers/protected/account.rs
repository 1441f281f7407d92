use axum::{body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Map, Value};

use crate::middleware::{ApiResponse, ApiResult, CallerIdentity, JsonBody};
use crate::models::{Account, AccountView, FieldUpdateGuard};
use crate::state::AppState;

use super::upload_content_type;

/// GET /account
pub async fn get(State(state): State<AppState>, caller: CallerIdentity) -> ApiResult<AccountView> {
    let account = state.accounts.get(&caller).await?;
    Ok(ApiResponse::success(account))
}

/// PATCH /account - body is a map of whitelisted fields (name, password, photo)
pub async fn patch(
    State(state): State<AppState>,
    caller: CallerIdentity,
    JsonBody(patch): JsonBody<Map<String, Value>>,
) -> ApiResult<AccountView> {
    let updates = FieldUpdateGuard::parse::<Account>(patch)?;
    let account = state.accounts.update(&caller, updates).await?;
    Ok(ApiResponse::success(account))
}

/// DELETE /account - leaves every pet, deleting those with no feeder left
pub async fn delete(State(state): State<AppState>, caller: CallerIdentity) -> ApiResult<()> {
    state.ownership.delete_account(&caller).await?;
    Ok(ApiResponse::no_content())
}

/// PUT /account/photo - raw image bytes
pub async fn put_photo(
    State(state): State<AppState>,
    caller: CallerIdentity,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<AccountView> {
    let account = state
        .accounts
        .upload_profile(&caller, upload_content_type(&headers), body.to_vec())
        .await?;
    Ok(ApiResponse::success(account))
}

/// POST /sign/out
pub async fn sign_out(State(state): State<AppState>, caller: CallerIdentity) -> ApiResult<()> {
    state.accounts.sign_out(&caller).await?;
    Ok(ApiResponse::no_content())
}
