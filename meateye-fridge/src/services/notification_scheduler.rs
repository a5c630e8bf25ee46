//! Notification Scheduler
//!
//! Maintains the pending expiry alert of every stored item and drives
//! delivery of due intents.
//!
//! **Intent state machine:**
//! ```text
//! pending --claim--> in_flight --delivered--> sent
//!                              --transient, attempts < max--> pending (backoff)
//!                              --transient, attempts >= max--> failed
//!                              --item consumed/deleted--> cancelled
//! pending --recompute/consume/delete--> cancelled
//! ```
//!
//! Recomputation and the pre-dispatch re-check run under the same per-item
//! lock, and every status change is a conditional UPDATE, so the
//! one-live-alert-per-item rule holds with concurrent requests and sweep
//! workers.

use chrono::{DateTime, Days, Duration, FixedOffset, NaiveDate, Utc};
use meateye_common::db::{
    AlertKind, DeliveryChannel, FridgeItem, NotificationIntent, NotificationStatus, NotificationType,
};
use meateye_common::events::{EventBus, FridgeEvent};
use meateye_common::time::{local_date, local_instant, offset_from_hours, Clock};
use meateye_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::delivery_gateway::{DeliveryGateway, DeliveryOutcome, PushMessage};
use super::item_locks::ItemLocks;
use crate::db::{fridge_items, notifications, subscriptions};
use crate::utils::LockRetry;

/// Tunables for scheduling and delivery
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Max intents claimed per sweep
    pub batch_size: u32,
    /// Delivery attempts before an intent becomes terminally failed
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
    /// Claims older than this are assumed abandoned by a crashed worker
    pub claim_timeout: Duration,
    /// Upper bound for one gateway call
    pub send_timeout: std::time::Duration,
    /// Local hour of day alerts fire at
    pub alert_hour: u32,
    pub utc_offset: FixedOffset,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_attempts: 3,
            retry_base: Duration::seconds(60),
            retry_max: Duration::seconds(3600),
            claim_timeout: Duration::seconds(300),
            send_timeout: std::time::Duration::from_secs(10),
            alert_hour: 9,
            utc_offset: offset_from_hours(9),
        }
    }
}

/// When and which expiry alert should fire for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertPlan {
    pub kind: AlertKind,
    pub scheduled_at: DateTime<Utc>,
    /// Days between the alert's firing date and expiry; negative once expired
    pub days_left: i64,
}

/// Compute the single expiry alert for an item
///
/// The lead-time alert fires `alert_before` days ahead of expiry at
/// `alert_hour` local time. With `alert_before == 0`, or once the expiry date
/// has been reached, the expired alert is planned instead. A target already in
/// the past is moved to `now` so the item still gets one notification.
pub fn plan_expiry_alert(
    expiry_date: NaiveDate,
    alert_before: u32,
    now: DateTime<Utc>,
    alert_hour: u32,
    offset: FixedOffset,
) -> AlertPlan {
    let today = local_date(now, offset);

    let (kind, target_date) = if alert_before > 0 && today < expiry_date {
        let target = expiry_date
            .checked_sub_days(Days::new(u64::from(alert_before)))
            .unwrap_or(NaiveDate::MIN);
        (AlertKind::ExpiringSoon, target)
    } else {
        (AlertKind::Expired, expiry_date)
    };

    let target_at = local_instant(target_date, alert_hour, offset);
    let scheduled_at = target_at.max(now);
    let firing_date = local_date(scheduled_at, offset);

    AlertPlan {
        kind,
        scheduled_at,
        days_left: (expiry_date - firing_date).num_days(),
    }
}

/// Title and body for an expiry alert
pub fn render_alert(item: &FridgeItem, plan: &AlertPlan) -> (String, String) {
    let name = item.display_name();
    match plan.kind {
        AlertKind::ExpiringSoon => (
            format!("{} expires soon", name),
            format!(
                "{} expires on {} (D-{}).",
                name,
                item.expiry_date.format("%Y-%m-%d"),
                plan.days_left.max(0)
            ),
        ),
        AlertKind::Expired if plan.days_left >= 0 => (
            format!("{} expires today", name),
            format!("{} reaches its expiry date today. Use it or discard it.", name),
        ),
        AlertKind::Expired => (
            format!("{} has expired", name),
            format!(
                "{} expired on {} ({} days ago).",
                name,
                item.expiry_date.format("%Y-%m-%d"),
                -plan.days_left
            ),
        ),
    }
}

/// Delay before retry number `attempts` (1-based): base * 2^(attempts-1), capped
pub fn retry_backoff(attempts: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempts.saturating_sub(1).min(30);
    let factor = 1i32 << exponent;
    base.checked_mul(factor).map_or(max, |delay| delay.min(max))
}

/// Per-sweep counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub released_claims: u64,
    pub claimed: u32,
    pub sent: u32,
    pub retried: u32,
    pub failed: u32,
    pub cancelled: u32,
    /// Due intents another worker claimed first
    pub skipped: u32,
    /// Dispatches aborted by a database error; their claim expires later
    pub errors: u32,
}

/// Per-status notification counts for one member
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationSummary {
    /// Pending plus currently claimed
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
}

enum DispatchResult {
    Sent,
    Retried,
    Failed,
    Cancelled,
}

pub struct NotificationScheduler {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    gateway: Arc<dyn DeliveryGateway>,
    events: EventBus,
    locks: ItemLocks,
    retry: LockRetry,
    settings: SchedulerSettings,
}

impl NotificationScheduler {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn DeliveryGateway>,
        events: EventBus,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            pool,
            clock,
            gateway,
            events,
            locks: ItemLocks::new(),
            retry: LockRetry::default(),
            settings,
        }
    }

    /// Per-item locks shared with the item store
    pub fn locks(&self) -> &ItemLocks {
        &self.locks
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Calendar date in the configured offset
    pub fn today(&self) -> NaiveDate {
        local_date(self.clock.now(), self.settings.utc_offset)
    }

    /// Bring an item's live expiry alert in line with its current state
    ///
    /// Cancels any live alert, then inserts a fresh one unless the item is
    /// consumed or gone. Running it twice with unchanged inputs leaves a
    /// single pending intent with the same `scheduled_at`.
    pub async fn recompute(&self, item_id: Uuid) -> Result<Option<NotificationIntent>> {
        let _guard = self.locks.acquire(item_id).await;

        let scheduled = self
            .retry
            .run("recompute expiry alert", || self.recompute_locked(item_id))
            .await?;

        if let Some(intent) = &scheduled {
            debug!(
                item_id = %item_id,
                notification_id = %intent.id,
                scheduled_at = %intent.scheduled_at,
                kind = ?intent.alert_kind,
                "Expiry alert scheduled"
            );
            self.events.emit_lossy(FridgeEvent::NotificationScheduled {
                notification_id: intent.id,
                item_id: Some(item_id),
                scheduled_at: intent.scheduled_at,
            });
        }

        Ok(scheduled)
    }

    async fn recompute_locked(&self, item_id: Uuid) -> Result<Option<NotificationIntent>> {
        let mut tx = self.pool.begin().await?;

        let cancelled = notifications::cancel_live_expiry_alerts(&mut *tx, item_id).await?;
        if cancelled > 0 {
            debug!(item_id = %item_id, cancelled, "Superseded live expiry alerts");
        }

        let item = match fridge_items::get_item(&mut *tx, item_id).await? {
            Some(item) if !item.is_consumed() => item,
            _ => {
                tx.commit().await?;
                return Ok(None);
            }
        };

        let now = self.clock.now();
        let plan = plan_expiry_alert(
            item.expiry_date,
            item.alert_before,
            now,
            self.settings.alert_hour,
            self.settings.utc_offset,
        );
        let intent = self.build_expiry_intent(&item, &plan, now);
        notifications::insert(&mut *tx, &intent).await?;

        tx.commit().await?;
        Ok(Some(intent))
    }

    fn build_expiry_intent(&self, item: &FridgeItem, plan: &AlertPlan, now: DateTime<Utc>) -> NotificationIntent {
        let (title, body) = render_alert(item, plan);
        NotificationIntent {
            id: Uuid::new_v4(),
            member_id: item.member_id,
            fridge_item_id: Some(item.id),
            notification_type: NotificationType::ExpiryAlert,
            alert_kind: Some(plan.kind),
            title,
            body,
            scheduled_at: plan.scheduled_at,
            sent_at: None,
            status: NotificationStatus::Pending,
            attempts: 0,
            last_error: None,
            channel: None,
            claimed_at: None,
            created_at: now,
        }
    }

    /// Queue a member notification that is not tied to an item
    pub async fn schedule_custom(
        &self,
        member_id: Uuid,
        title: &str,
        body: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<NotificationIntent> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Notification title must not be empty".to_string()));
        }

        let now = self.clock.now();
        let intent = NotificationIntent {
            id: Uuid::new_v4(),
            member_id,
            fridge_item_id: None,
            notification_type: NotificationType::Custom,
            alert_kind: None,
            title: title.to_string(),
            body: body.to_string(),
            scheduled_at: scheduled_at.max(now),
            sent_at: None,
            status: NotificationStatus::Pending,
            attempts: 0,
            last_error: None,
            channel: None,
            claimed_at: None,
            created_at: now,
        };

        self.retry
            .run("schedule custom notification", || notifications::insert(&self.pool, &intent))
            .await?;

        self.events.emit_lossy(FridgeEvent::NotificationScheduled {
            notification_id: intent.id,
            item_id: None,
            scheduled_at: intent.scheduled_at,
        });

        Ok(intent)
    }

    pub async fn list_for_member(
        &self,
        member_id: Uuid,
        status: Option<NotificationStatus>,
    ) -> Result<Vec<NotificationIntent>> {
        notifications::list_for_member(&self.pool, member_id, status).await
    }

    pub async fn summary_for_member(&self, member_id: Uuid) -> Result<NotificationSummary> {
        let mut summary = NotificationSummary::default();
        for (status, count) in notifications::count_by_status(&self.pool, member_id).await? {
            match status {
                NotificationStatus::Pending | NotificationStatus::InFlight => summary.pending += count,
                NotificationStatus::Sent => summary.sent += count,
                NotificationStatus::Failed => summary.failed += count,
                NotificationStatus::Cancelled => summary.cancelled += count,
            }
        }
        Ok(summary)
    }

    /// One delivery pass over due intents
    ///
    /// Errors while dispatching a single intent are logged and counted; the
    /// intent keeps its claim until `claim_timeout` releases it.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let mut report = SweepReport::default();

        report.released_claims =
            notifications::release_stale_claims(&self.pool, now - self.settings.claim_timeout).await?;
        if report.released_claims > 0 {
            warn!(released = report.released_claims, "Released stale notification claims");
        }

        let due = notifications::select_due(&self.pool, now, self.settings.batch_size).await?;
        for intent in due {
            let claimed = self
                .retry
                .run("claim notification", || notifications::claim(&self.pool, intent.id, now))
                .await?;
            if !claimed {
                report.skipped += 1;
                continue;
            }
            report.claimed += 1;

            let notification_id = intent.id;
            match self.dispatch(intent).await {
                Ok(DispatchResult::Sent) => report.sent += 1,
                Ok(DispatchResult::Retried) => report.retried += 1,
                Ok(DispatchResult::Failed) => report.failed += 1,
                Ok(DispatchResult::Cancelled) => report.cancelled += 1,
                Err(e) => {
                    report.errors += 1;
                    warn!(notification_id = %notification_id, error = %e, "Notification dispatch aborted");
                }
            }
        }

        if report.claimed > 0 {
            info!(
                claimed = report.claimed,
                sent = report.sent,
                retried = report.retried,
                failed = report.failed,
                cancelled = report.cancelled,
                "Notification sweep complete"
            );
        }

        Ok(report)
    }

    /// Deliver one claimed intent
    async fn dispatch(&self, intent: NotificationIntent) -> Result<DispatchResult> {
        let _guard = match intent.fridge_item_id {
            Some(item_id) => Some(self.locks.acquire(item_id).await),
            None => None,
        };

        // Recompute, consume or delete may have landed while we waited for the lock
        let still_claimed = notifications::get(&self.pool, intent.id)
            .await?
            .is_some_and(|current| current.status == NotificationStatus::InFlight);
        if !still_claimed {
            debug!(notification_id = %intent.id, "Intent superseded before dispatch");
            return Ok(DispatchResult::Cancelled);
        }

        let item = match intent.fridge_item_id {
            Some(item_id) => match fridge_items::get_item(&self.pool, item_id).await? {
                Some(item) if !item.is_consumed() => Some(item),
                _ => return self.cancel_claimed(&intent, "item no longer stored").await,
            },
            None if intent.notification_type == NotificationType::ExpiryAlert => {
                return self.cancel_claimed(&intent, "item deleted").await;
            }
            None => None,
        };
        let use_push = item.as_ref().is_some_and(|item| item.use_push);

        let endpoints = subscriptions::list_for_member(&self.pool, intent.member_id).await?;
        if endpoints.is_empty() {
            if use_push {
                warn!(
                    notification_id = %intent.id,
                    member_id = %intent.member_id,
                    "Push requested but member has no subscription, delivering in-app"
                );
            }
            return self.complete_sent(&intent, item.as_ref(), DeliveryChannel::InApp, intent.attempts).await;
        }

        let attempts = intent.attempts + 1;
        let message = PushMessage::from(&intent);
        let mut delivered = 0u32;
        let mut transient_errors: Vec<String> = Vec::new();

        for subscription in &endpoints {
            let outcome =
                match tokio::time::timeout(self.settings.send_timeout, self.gateway.send(subscription, &message))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => DeliveryOutcome::TransientFailure("delivery timed out".to_string()),
                };

            match outcome {
                DeliveryOutcome::Delivered => delivered += 1,
                DeliveryOutcome::TransientFailure(reason) => {
                    debug!(notification_id = %intent.id, endpoint = %subscription.endpoint, reason = %reason, "Transient delivery failure");
                    transient_errors.push(reason);
                }
                DeliveryOutcome::PermanentInvalidEndpoint(reason) => {
                    info!(
                        member_id = %subscription.member_id,
                        endpoint = %subscription.endpoint,
                        reason = %reason,
                        "Removing invalid push subscription"
                    );
                    // A failed removal is logged and leaves this intent's outcome unchanged
                    match self
                        .retry
                        .run("remove invalid subscription", || {
                            subscriptions::delete_by_id(&self.pool, subscription.id)
                        })
                        .await
                    {
                        Ok(_) => self.events.emit_lossy(FridgeEvent::SubscriptionRemoved {
                            member_id: subscription.member_id,
                            endpoint: subscription.endpoint.clone(),
                            timestamp: self.clock.now(),
                        }),
                        Err(e) => warn!(
                            subscription_id = %subscription.id,
                            endpoint = %subscription.endpoint,
                            error = %e,
                            "Failed to remove invalid push subscription"
                        ),
                    }
                }
            }
        }

        if delivered > 0 {
            return self.complete_sent(&intent, item.as_ref(), DeliveryChannel::Push, attempts).await;
        }

        if transient_errors.is_empty() {
            // Every endpoint was permanently invalid
            return self.complete_sent(&intent, item.as_ref(), DeliveryChannel::InApp, attempts).await;
        }

        let error = transient_errors.join("; ");
        let now = self.clock.now();
        let will_retry = attempts < self.settings.max_attempts;

        if will_retry {
            let next_attempt_at =
                now + retry_backoff(attempts, self.settings.retry_base, self.settings.retry_max);
            self.retry
                .run("reschedule notification", || {
                    notifications::mark_retry(&self.pool, intent.id, attempts, next_attempt_at, &error)
                })
                .await?;
            warn!(
                notification_id = %intent.id,
                attempts,
                next_attempt_at = %next_attempt_at,
                error = %error,
                "Delivery failed, retry scheduled"
            );
        } else {
            self.retry
                .run("fail notification", || notifications::mark_failed(&self.pool, intent.id, attempts, &error))
                .await?;
            warn!(
                notification_id = %intent.id,
                attempts,
                error = %error,
                "Delivery failed, attempts exhausted"
            );
        }

        self.events.emit_lossy(FridgeEvent::NotificationFailed {
            notification_id: intent.id,
            member_id: intent.member_id,
            attempts,
            will_retry,
            timestamp: now,
        });

        Ok(if will_retry {
            DispatchResult::Retried
        } else {
            DispatchResult::Failed
        })
    }

    async fn cancel_claimed(&self, intent: &NotificationIntent, reason: &str) -> Result<DispatchResult> {
        self.retry
            .run("cancel claimed notification", || notifications::cancel(&self.pool, intent.id))
            .await?;
        info!(notification_id = %intent.id, reason, "Cancelled claimed notification");
        Ok(DispatchResult::Cancelled)
    }

    /// Mark sent and, after a lead-time alert, queue the expired alert
    async fn complete_sent(
        &self,
        intent: &NotificationIntent,
        item: Option<&FridgeItem>,
        channel: DeliveryChannel,
        attempts: u32,
    ) -> Result<DispatchResult> {
        let now = self.clock.now();
        let follow_up = match (intent.alert_kind, item) {
            (Some(AlertKind::ExpiringSoon), Some(item)) => {
                let plan = plan_expiry_alert(item.expiry_date, 0, now, self.settings.alert_hour, self.settings.utc_offset);
                Some(self.build_expiry_intent(item, &plan, now))
            }
            _ => None,
        };

        self.retry
            .run("complete notification", || {
                self.commit_sent(intent.id, now, channel, attempts, follow_up.as_ref())
            })
            .await?;

        info!(
            notification_id = %intent.id,
            member_id = %intent.member_id,
            channel = %channel,
            "Notification sent"
        );
        self.events.emit_lossy(FridgeEvent::NotificationSent {
            notification_id: intent.id,
            member_id: intent.member_id,
            timestamp: now,
        });

        if let Some(follow_up) = follow_up {
            self.events.emit_lossy(FridgeEvent::NotificationScheduled {
                notification_id: follow_up.id,
                item_id: follow_up.fridge_item_id,
                scheduled_at: follow_up.scheduled_at,
            });
        }

        Ok(DispatchResult::Sent)
    }

    async fn commit_sent(
        &self,
        notification_id: Uuid,
        now: DateTime<Utc>,
        channel: DeliveryChannel,
        attempts: u32,
        follow_up: Option<&NotificationIntent>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        notifications::mark_sent(&mut *tx, notification_id, now, channel, attempts).await?;
        if let Some(follow_up) = follow_up {
            notifications::insert(&mut *tx, follow_up).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
