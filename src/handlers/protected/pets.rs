use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, CallerIdentity, JsonBody};
use crate::models::{FieldUpdateGuard, NewPet, Pet};
use crate::state::AppState;

use super::upload_content_type;

/// GET /pets - every pet the caller feeds
pub async fn list(State(state): State<AppState>, caller: CallerIdentity) -> ApiResult<Vec<Pet>> {
    let pets = state.ownership.list_pets(&caller).await?;
    Ok(ApiResponse::success(pets))
}

/// POST /pets - register a pet with the caller as its first feeder
pub async fn create(
    State(state): State<AppState>,
    caller: CallerIdentity,
    JsonBody(new_pet): JsonBody<NewPet>,
) -> ApiResult<Pet> {
    let pet = state.ownership.add_pet(&caller, new_pet).await?;
    Ok(ApiResponse::created(pet))
}

/// GET /pets/:pet_id
pub async fn get(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pet_id): Path<Uuid>,
) -> ApiResult<Pet> {
    let pet = state.ownership.get_pet(&caller, pet_id).await?;
    Ok(ApiResponse::success(pet))
}

/// PATCH /pets/:pet_id - name, photo, adopted, family, species
pub async fn patch(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pet_id): Path<Uuid>,
    JsonBody(patch): JsonBody<Map<String, Value>>,
) -> ApiResult<Pet> {
    let updates = FieldUpdateGuard::parse::<Pet>(patch)?;
    let pet = state.ownership.update_pet(&caller, pet_id, updates).await?;
    Ok(ApiResponse::success(pet))
}

/// DELETE /pets/:pet_id - the caller stops feeding; the last feeder deletes the pet
pub async fn delete(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pet_id): Path<Uuid>,
) -> ApiResult<()> {
    state.ownership.remove_feeder(&caller, pet_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /pets/:pet_id/feeders - the caller joins as a co-feeder
pub async fn join(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pet_id): Path<Uuid>,
) -> ApiResult<Pet> {
    let pet = state.ownership.accept_invite(&caller, pet_id).await?;
    Ok(ApiResponse::success(pet))
}

/// PUT /pets/:pet_id/photo - raw image bytes
pub async fn put_photo(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pet_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Pet> {
    let pet = state
        .ownership
        .upload_pet_photo(&caller, pet_id, upload_content_type(&headers), body.to_vec())
        .await?;
    Ok(ApiResponse::success(pet))
}
