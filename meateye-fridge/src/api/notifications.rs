//! Notification history endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use meateye_common::db::{NotificationIntent, NotificationStatus};
use serde::{Deserialize, Serialize};

use super::MemberId;
use crate::error::ApiResult;
use crate::services::NotificationSummary;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<NotificationStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub notifications: Vec<NotificationIntent>,
    pub summary: NotificationSummary,
}

#[derive(Debug, Deserialize)]
pub struct CustomNotificationRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Defaults to now
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// GET /api/v1/notifications/list
///
/// Terminal `failed` intents are listed like any other record.
pub async fn list_notifications(
    State(state): State<AppState>,
    member: MemberId,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let notifications = state.scheduler.list_for_member(member.0, query.status).await?;
    let summary = state.scheduler.summary_for_member(member.0).await?;
    Ok(Json(ListResponse { notifications, summary }))
}

/// POST /api/v1/notifications/custom
pub async fn schedule_custom(
    State(state): State<AppState>,
    member: MemberId,
    Json(request): Json<CustomNotificationRequest>,
) -> ApiResult<(StatusCode, Json<NotificationIntent>)> {
    let scheduled_at = request.scheduled_at.unwrap_or_else(|| state.scheduler.now());
    let intent = state
        .scheduler
        .schedule_custom(member.0, &request.title, &request.body, scheduled_at)
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/notifications/list", get(list_notifications))
        .route("/api/v1/notifications/custom", post(schedule_custom))
}
