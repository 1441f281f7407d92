use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult, CallerIdentity, JsonBody};
use crate::models::{Feed, FeedView, FieldUpdateGuard, NewFeed};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only feeds strictly older than this (RFC 3339)
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// GET /pets/:pet_id/feeds?before=&limit=
pub async fn list(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pet_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<FeedView>> {
    let feeds = state
        .feeds
        .list_feeds(&caller, pet_id, query.before, query.limit)
        .await?;
    Ok(ApiResponse::success(feeds))
}

/// POST /pets/:pet_id/feeds
pub async fn create(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(pet_id): Path<Uuid>,
    JsonBody(new_feed): JsonBody<NewFeed>,
) -> ApiResult<FeedView> {
    let feed = state.feeds.add_feed(&caller, pet_id, new_feed).await?;
    Ok(ApiResponse::created(feed))
}

/// PATCH /pets/:pet_id/feeds/:feed_id - timestamp, amount, unit
pub async fn patch(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((pet_id, feed_id)): Path<(Uuid, Uuid)>,
    JsonBody(patch): JsonBody<Map<String, Value>>,
) -> ApiResult<FeedView> {
    let updates = FieldUpdateGuard::parse::<Feed>(patch)?;
    let feed = state
        .feeds
        .update_feed(&caller, pet_id, feed_id, updates)
        .await?;
    Ok(ApiResponse::success(feed))
}

/// DELETE /pets/:pet_id/feeds/:feed_id
pub async fn delete(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((pet_id, feed_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<()> {
    state.feeds.delete_feed(&caller, pet_id, feed_id).await?;
    Ok(ApiResponse::no_content())
}
