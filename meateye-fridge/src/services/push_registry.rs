//! Push subscription registry

use meateye_common::db::PushSubscription;
use meateye_common::{Clock, Error, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::db::subscriptions;

pub struct PushRegistry {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl PushRegistry {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Register an endpoint; registering it again replaces its keys
    pub async fn register(
        &self,
        member_id: Uuid,
        endpoint: &str,
        p256dh_key: &str,
        auth_key: &str,
        user_agent: Option<&str>,
    ) -> Result<PushSubscription> {
        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(Error::Validation(format!("Push endpoint must be an http(s) URL: {}", endpoint)));
        }
        if p256dh_key.trim().is_empty() || auth_key.trim().is_empty() {
            return Err(Error::Validation("Push subscription keys must not be empty".to_string()));
        }

        let subscription = subscriptions::upsert(
            &self.pool,
            member_id,
            endpoint,
            p256dh_key.trim(),
            auth_key.trim(),
            user_agent,
            self.clock.now(),
        )
        .await?;

        info!(member_id = %member_id, subscription_id = %subscription.id, "Push subscription registered");
        Ok(subscription)
    }

    /// Remove one of the member's endpoints
    pub async fn unregister(&self, member_id: Uuid, endpoint: &str) -> Result<()> {
        if !subscriptions::delete_for_member(&self.pool, member_id, endpoint.trim()).await? {
            return Err(Error::NotFound(format!("Push subscription {}", endpoint.trim())));
        }
        info!(member_id = %member_id, "Push subscription removed");
        Ok(())
    }

    pub async fn list_for_member(&self, member_id: Uuid) -> Result<Vec<PushSubscription>> {
        subscriptions::list_for_member(&self.pool, member_id).await
    }
}
