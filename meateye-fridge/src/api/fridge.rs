//! Fridge item endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{Days, NaiveDate};
use meateye_common::db::{FridgeItem, ItemStatus};
use meateye_common::parts::{self, PartResolution};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::MemberId;
use crate::error::{ApiError, ApiResult};
use crate::services::fridge_store::DEFAULT_ALERT_BEFORE;
use crate::services::{ConsumptionStats, FridgeItemUpdate, IngestionInput, IngestionOutcome, ListFilter, NewFridgeItem};
use crate::AppState;

/// Item plus the values the list screen shows
#[derive(Debug, Serialize)]
pub struct FridgeItemView {
    #[serde(flatten)]
    pub item: FridgeItem,
    pub display_name: String,
    /// Days until expiry; negative once expired
    pub d_day: i64,
}

impl FridgeItemView {
    fn new(item: FridgeItem, today: NaiveDate) -> Self {
        Self {
            display_name: item.display_name(),
            d_day: item.d_day(today),
            item,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<ItemStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub items: Vec<FridgeItemView>,
    pub total: usize,
}

/// Manual entry; `part` may be a canonical id or a legacy label
///
/// A label that resolves to no part is kept as the item's name.
#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub part: Option<String>,
    pub custom_name: Option<String>,
    pub storage_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub desired_consumption_date: Option<NaiveDate>,
    pub alert_before: Option<u32>,
    pub use_push: Option<bool>,
}

/// GET /api/v1/fridge/list
pub async fn list_items(
    State(state): State<AppState>,
    member: MemberId,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let today = state.store.today();
    let items: Vec<FridgeItemView> = state
        .store
        .list(member.0, ListFilter { status: query.status })
        .await?
        .into_iter()
        .map(|item| FridgeItemView::new(item, today))
        .collect();

    Ok(Json(ListResponse {
        total: items.len(),
        items,
    }))
}

/// POST /api/v1/fridge/item
pub async fn create_item(
    State(state): State<AppState>,
    member: MemberId,
    Json(request): Json<CreateItemRequest>,
) -> ApiResult<(StatusCode, Json<FridgeItemView>)> {
    let today = state.store.today();
    let storage_date = request.storage_date.unwrap_or(today);
    let expiry_date = match request.expiry_date {
        Some(date) => date,
        None => storage_date
            .checked_add_days(Days::new(u64::from(state.shelf_life_days)))
            .ok_or_else(|| ApiError::BadRequest("storage_date out of range".to_string()))?,
    };

    let mut new_item = NewFridgeItem::new(storage_date, expiry_date)
        .with_alert_before(request.alert_before.unwrap_or(DEFAULT_ALERT_BEFORE))
        .with_use_push(request.use_push.unwrap_or(false));
    new_item.desired_consumption_date = request.desired_consumption_date;
    new_item.custom_name = request.custom_name;

    if let Some(label) = request.part {
        match parts::resolve(&label) {
            PartResolution::Resolved(part) => new_item.part = Some(part),
            PartResolution::Unresolved => {
                debug!(label = %label, "Unresolved part label kept as item name");
                if new_item.custom_name.is_none() {
                    new_item.custom_name = Some(label);
                }
            }
        }
    }

    let item = state.store.create(member.0, new_item).await?;
    Ok((StatusCode::CREATED, Json(FridgeItemView::new(item, today))))
}

/// POST /api/v1/fridge/ingest
pub async fn ingest(
    State(state): State<AppState>,
    member: MemberId,
    Json(input): Json<IngestionInput>,
) -> ApiResult<(StatusCode, Json<IngestionOutcome>)> {
    let outcome = state.ingestion.ingest(member.0, input).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/v1/fridge/consumption-stats
pub async fn consumption_stats(
    State(state): State<AppState>,
    member: MemberId,
) -> ApiResult<Json<ConsumptionStats>> {
    Ok(Json(state.store.consumption_stats(member.0).await?))
}

/// PATCH /api/v1/fridge/:id
pub async fn update_item(
    State(state): State<AppState>,
    member: MemberId,
    Path(item_id): Path<Uuid>,
    Json(changes): Json<FridgeItemUpdate>,
) -> ApiResult<Json<FridgeItemView>> {
    let item = state.store.update(item_id, member.0, changes).await?;
    Ok(Json(FridgeItemView::new(item, state.store.today())))
}

/// DELETE /api/v1/fridge/:id
pub async fn delete_item(
    State(state): State<AppState>,
    member: MemberId,
    Path(item_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete(item_id, member.0).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn fridge_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/fridge/list", get(list_items))
        .route("/api/v1/fridge/item", post(create_item))
        .route("/api/v1/fridge/ingest", post(ingest))
        .route("/api/v1/fridge/consumption-stats", get(consumption_stats))
        .route("/api/v1/fridge/:id", patch(update_item).delete(delete_item))
}
