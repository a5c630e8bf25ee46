//! Push subscription endpoints

use axum::{
    extract::State,
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use meateye_common::db::PushSubscription;
use serde::Deserialize;

use super::MemberId;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Browser `PushSubscription.toJSON()` shape
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

/// POST /api/v1/push/subscribe
pub async fn subscribe(
    State(state): State<AppState>,
    member: MemberId,
    headers: HeaderMap,
    Json(request): Json<SubscribeRequest>,
) -> ApiResult<(StatusCode, Json<PushSubscription>)> {
    let user_agent = headers.get(USER_AGENT).and_then(|v| v.to_str().ok());
    let subscription = state
        .push_registry
        .register(
            member.0,
            &request.endpoint,
            &request.keys.p256dh,
            &request.keys.auth,
            user_agent,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// DELETE /api/v1/push/subscribe
pub async fn unsubscribe(
    State(state): State<AppState>,
    member: MemberId,
    Json(request): Json<UnsubscribeRequest>,
) -> ApiResult<StatusCode> {
    state.push_registry.unregister(member.0, &request.endpoint).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn push_routes() -> Router<AppState> {
    Router::new().route("/api/v1/push/subscribe", post(subscribe).delete(unsubscribe))
}
