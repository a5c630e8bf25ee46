//! Integration tests for expiry alert scheduling and the delivery sweep

mod helpers;

use chrono::Duration;
use helpers::TestHarness;
use meateye_common::db::{
    AlertKind, DeliveryChannel, FridgeItem, ItemStatus, NotificationIntent, NotificationStatus,
};
use meateye_common::events::FridgeEvent;
use meateye_common::time::local_date;
use meateye_common::{CanonicalPart, Clock};
use meateye_fridge::db::{fridge_items, notifications};
use meateye_fridge::services::{DeliveryOutcome, FridgeItemUpdate, NewFridgeItem};
use meateye_fridge::FridgeConfig;
use uuid::Uuid;

async fn store_item(h: &TestHarness, member_id: Uuid, expiry_in_days: i64, alert_before: u32) -> FridgeItem {
    let new_item = NewFridgeItem::new(h.today(), h.days_from_today(expiry_in_days))
        .with_part(CanonicalPart::BeefSirloin)
        .with_alert_before(alert_before);
    h.state.store.create(member_id, new_item).await.unwrap()
}

async fn intents_for(h: &TestHarness, item_id: Uuid) -> Vec<NotificationIntent> {
    notifications::list_for_item(&h.pool, item_id).await.unwrap()
}

async fn live_alerts(h: &TestHarness, item_id: Uuid) -> Vec<NotificationIntent> {
    intents_for(h, item_id)
        .await
        .into_iter()
        .filter(|n| matches!(n.status, NotificationStatus::Pending | NotificationStatus::InFlight))
        .collect()
}

#[tokio::test]
async fn test_lead_time_alert_scheduled_alert_before_days_ahead() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();

    let item = store_item(&h, member, 5, 3).await;

    let pending = live_alerts(&h, item.id).await;
    assert_eq!(pending.len(), 1);
    let alert = &pending[0];
    assert_eq!(alert.alert_kind, Some(AlertKind::ExpiringSoon));
    assert_eq!(alert.status, NotificationStatus::Pending);
    let offset = h.state.scheduler.settings().utc_offset;
    assert_eq!(local_date(alert.scheduled_at, offset), h.days_from_today(2));
    assert!(alert.title.contains("소/채끝"));
}

#[tokio::test]
async fn test_already_expired_item_is_alerted_immediately() {
    let h = TestHarness::new().await;
    let new_item = NewFridgeItem::new(h.days_from_today(-4), h.days_from_today(-1))
        .with_custom_name("leftover bulgogi")
        .with_alert_before(3);
    let item = h.state.store.create(Uuid::new_v4(), new_item).await.unwrap();

    let pending = live_alerts(&h, item.id).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].alert_kind, Some(AlertKind::Expired));
    assert_eq!(pending[0].scheduled_at, h.clock.now());
    assert_eq!(pending[0].title, "leftover bulgogi has expired");
}

#[tokio::test]
async fn test_recompute_is_idempotent() {
    let h = TestHarness::new().await;
    let item = store_item(&h, Uuid::new_v4(), 5, 3).await;
    let first = live_alerts(&h, item.id).await;

    h.state.scheduler.recompute(item.id).await.unwrap();
    h.state.scheduler.recompute(item.id).await.unwrap();

    let live = live_alerts(&h, item.id).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].scheduled_at, first[0].scheduled_at);

    let cancelled = intents_for(&h, item.id)
        .await
        .into_iter()
        .filter(|n| n.status == NotificationStatus::Cancelled)
        .count();
    assert_eq!(cancelled, 2);
}

#[tokio::test]
async fn test_concurrent_recompute_leaves_single_pending_intent() {
    let h = TestHarness::new().await;
    let item = store_item(&h, Uuid::new_v4(), 7, 2).await;

    let scheduler = &h.state.scheduler;
    let (a, b, c, d) = tokio::join!(
        scheduler.recompute(item.id),
        scheduler.recompute(item.id),
        scheduler.recompute(item.id),
        scheduler.recompute(item.id),
    );
    for result in [a, b, c, d] {
        assert!(result.unwrap().is_some());
    }

    assert_eq!(live_alerts(&h, item.id).await.len(), 1);
}

#[tokio::test]
async fn test_alert_before_edit_reschedules() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    let item = store_item(&h, member, 10, 3).await;

    let update = FridgeItemUpdate {
        alert_before: Some(1),
        ..Default::default()
    };
    h.state.store.update(item.id, member, update).await.unwrap();

    let live = live_alerts(&h, item.id).await;
    assert_eq!(live.len(), 1);
    let offset = h.state.scheduler.settings().utc_offset;
    assert_eq!(local_date(live[0].scheduled_at, offset), h.days_from_today(9));
}

#[tokio::test]
async fn test_alert_before_zero_schedules_expired_alert_only() {
    let h = TestHarness::new().await;
    let item = store_item(&h, Uuid::new_v4(), 4, 0).await;

    let live = live_alerts(&h, item.id).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].alert_kind, Some(AlertKind::Expired));
    let offset = h.state.scheduler.settings().utc_offset;
    assert_eq!(local_date(live[0].scheduled_at, offset), h.days_from_today(4));
}

#[tokio::test]
async fn test_consumption_cancels_and_sweep_never_delivers() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/device-1").await;
    let item = store_item(&h, member, 1, 3).await;

    let update = FridgeItemUpdate {
        status: Some(ItemStatus::Consumed),
        ..Default::default()
    };
    let consumed = h.state.store.update(item.id, member, update).await.unwrap();
    assert!(consumed.is_consumed());
    assert!(live_alerts(&h, item.id).await.is_empty());

    h.clock.advance(Duration::days(3));
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.claimed, 0);
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_consumed_after_claim_is_cancelled_at_dispatch() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/device-1").await;
    let mut item = store_item(&h, member, 1, 3).await;
    let intent = live_alerts(&h, item.id).await.remove(0);

    // A worker claims the intent, then crashes
    assert!(notifications::claim(&h.pool, intent.id, h.clock.now()).await.unwrap());

    // The item is consumed underneath the claim
    item.status = ItemStatus::Consumed;
    fridge_items::update_item(&h.pool, &item).await.unwrap();

    h.clock.advance(Duration::minutes(10));
    let report = h.state.scheduler.sweep().await.unwrap();

    assert_eq!(report.released_claims, 1);
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.sent, 0);
    assert_eq!(h.gateway.call_count(), 0);

    let stored = notifications::get(&h.pool, intent.id).await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Cancelled);
}

#[tokio::test]
async fn test_no_subscription_is_delivered_in_app_without_gateway_call() {
    let h = TestHarness::new().await;
    let item = store_item(&h, Uuid::new_v4(), 2, 3).await;
    let intent = live_alerts(&h, item.id).await.remove(0);

    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(h.gateway.call_count(), 0);

    let sent = notifications::get(&h.pool, intent.id).await.unwrap().unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.channel, Some(DeliveryChannel::InApp));
    assert_eq!(sent.sent_at, Some(h.clock.now()));

    // The expired alert follows the lead-time alert
    let live = live_alerts(&h, item.id).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].alert_kind, Some(AlertKind::Expired));
    let offset = h.state.scheduler.settings().utc_offset;
    assert_eq!(local_date(live[0].scheduled_at, offset), h.days_from_today(2));
}

#[tokio::test]
async fn test_push_delivery_marks_sent_and_emits_event() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/device-1").await;
    let mut events = h.state.event_bus.subscribe();

    let item = store_item(&h, member, 5, 3).await;
    let intent = live_alerts(&h, item.id).await.remove(0);

    // Not due yet
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.claimed, 0);

    h.clock.set(intent.scheduled_at);
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.sent, 1);

    let calls = h.gateway.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "https://push.example/device-1");
    assert_eq!(calls[0].1.notification_id, intent.id);
    assert_eq!(calls[0].1.fridge_item_id, Some(item.id));

    let sent = notifications::get(&h.pool, intent.id).await.unwrap().unwrap();
    assert_eq!(sent.channel, Some(DeliveryChannel::Push));
    assert_eq!(sent.attempts, 1);

    let mut saw_sent = false;
    while let Ok(event) = events.try_recv() {
        if let FridgeEvent::NotificationSent { notification_id, .. } = event {
            saw_sent |= notification_id == intent.id;
        }
    }
    assert!(saw_sent);
}

#[tokio::test]
async fn test_transient_failures_retry_then_fail_terminally() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/flaky").await;
    h.gateway.set_outcome(
        "https://push.example/flaky",
        DeliveryOutcome::TransientFailure("503 from push service".to_string()),
    );

    let item = store_item(&h, member, 1, 3).await;
    let intent_id = live_alerts(&h, item.id).await[0].id;

    // First failure: back to pending, retry after 60s
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.retried, 1);
    let after_first = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(after_first.status, NotificationStatus::Pending);
    assert_eq!(after_first.attempts, 1);
    assert_eq!(after_first.scheduled_at, h.clock.now() + Duration::seconds(60));
    assert_eq!(after_first.last_error.as_deref(), Some("503 from push service"));

    // Not due again until the backoff elapses
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.claimed, 0);

    // Second failure: pending with a longer backoff
    h.clock.set(after_first.scheduled_at);
    h.state.scheduler.sweep().await.unwrap();
    let after_second = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(after_second.status, NotificationStatus::Pending);
    assert_eq!(after_second.attempts, 2);
    assert_eq!(after_second.scheduled_at, h.clock.now() + Duration::seconds(120));
    assert!(after_second.scheduled_at > after_first.scheduled_at);

    // Third failure exhausts max_attempts = 3
    h.clock.set(after_second.scheduled_at);
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.failed, 1);
    let failed = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(failed.status, NotificationStatus::Failed);
    assert_eq!(failed.attempts, 3);

    assert_eq!(h.gateway.call_count(), 3);

    // Terminal: later sweeps leave it alone
    h.clock.advance(Duration::days(1));
    h.state.scheduler.sweep().await.unwrap();
    assert_eq!(h.gateway.call_count(), 3);

    let summary = h.state.scheduler.summary_for_member(member).await.unwrap();
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_invalid_endpoint_removes_subscription() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/gone").await;
    h.subscribe(member, "https://push.example/alive").await;
    h.gateway.set_outcome(
        "https://push.example/gone",
        DeliveryOutcome::PermanentInvalidEndpoint("410 Gone".to_string()),
    );
    let mut events = h.state.event_bus.subscribe();

    let item = store_item(&h, member, 1, 3).await;
    let intent_id = live_alerts(&h, item.id).await[0].id;

    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.sent, 1);

    let remaining = h.state.push_registry.list_for_member(member).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].endpoint, "https://push.example/alive");

    let sent = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.channel, Some(DeliveryChannel::Push));

    let mut removed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let FridgeEvent::SubscriptionRemoved { endpoint, .. } = event {
            removed.push(endpoint);
        }
    }
    assert_eq!(removed, vec!["https://push.example/gone".to_string()]);
}

#[tokio::test]
async fn test_all_endpoints_invalid_falls_back_to_in_app() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/gone").await;
    h.gateway.set_outcome(
        "https://push.example/gone",
        DeliveryOutcome::PermanentInvalidEndpoint("404".to_string()),
    );

    let item = store_item(&h, member, 1, 3).await;
    let intent_id = live_alerts(&h, item.id).await[0].id;

    h.state.scheduler.sweep().await.unwrap();

    let sent = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.channel, Some(DeliveryChannel::InApp));
    assert!(h.state.push_registry.list_for_member(member).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_subscription_cleanup_does_not_redeliver() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/alive").await;
    h.subscribe(member, "https://push.example/gone").await;
    h.gateway.set_outcome(
        "https://push.example/gone",
        DeliveryOutcome::PermanentInvalidEndpoint("410 Gone".to_string()),
    );

    // Subscription removal fails with a non-retryable error
    sqlx::query(
        r#"
        CREATE TRIGGER keep_subscriptions BEFORE DELETE ON push_subscriptions
        BEGIN
            SELECT RAISE(ABORT, 'subscriptions are read-only');
        END
        "#,
    )
    .execute(&h.pool)
    .await
    .unwrap();

    let item = store_item(&h, member, 1, 3).await;
    let intent_id = live_alerts(&h, item.id).await[0].id;

    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.errors, 0);
    assert_eq!(report.sent, 1);

    let sent = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.channel, Some(DeliveryChannel::Push));
    assert_eq!(h.state.push_registry.list_for_member(member).await.unwrap().len(), 2);

    sqlx::query("DROP TRIGGER keep_subscriptions").execute(&h.pool).await.unwrap();
    h.clock.advance(Duration::minutes(10));

    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.released_claims, 0);
    assert_eq!(report.claimed, 0);
    assert_eq!(h.gateway.calls_to("https://push.example/alive"), 1);
    assert_eq!(h.gateway.calls_to("https://push.example/gone"), 1);
}

#[tokio::test]
async fn test_gateway_timeout_counts_as_transient_failure() {
    let h = TestHarness::with_config(FridgeConfig {
        push_timeout_secs: 1,
        ..Default::default()
    })
    .await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/slow").await;
    h.gateway.set_delay(std::time::Duration::from_secs(30));

    let item = store_item(&h, member, 1, 3).await;
    let intent_id = live_alerts(&h, item.id).await[0].id;

    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.retried, 1);

    let retried = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(retried.status, NotificationStatus::Pending);
    assert_eq!(retried.attempts, 1);
    assert_eq!(retried.sent_at, None);
    assert_eq!(retried.last_error.as_deref(), Some("delivery timed out"));
}

#[tokio::test]
async fn test_deleted_item_orphans_intent_and_leaves_sweep() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    let item = store_item(&h, member, 5, 3).await;
    let intent_id = live_alerts(&h, item.id).await[0].id;

    h.state.store.delete(item.id, member).await.unwrap();

    let orphan = notifications::get(&h.pool, intent_id).await.unwrap().unwrap();
    assert_eq!(orphan.fridge_item_id, None);
    assert_eq!(orphan.status, NotificationStatus::Cancelled);

    h.clock.advance(Duration::days(10));
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.claimed, 0);

    // History is kept
    let history = h.state.scheduler.list_for_member(member, None).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_deleting_item_keeps_sent_history_status() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    let item = store_item(&h, member, 1, 3).await;
    let first_id = live_alerts(&h, item.id).await[0].id;

    h.state.scheduler.sweep().await.unwrap();
    h.state.store.delete(item.id, member).await.unwrap();

    let sent = notifications::get(&h.pool, first_id).await.unwrap().unwrap();
    assert_eq!(sent.status, NotificationStatus::Sent);
    assert_eq!(sent.fridge_item_id, None);
}

#[tokio::test]
async fn test_custom_notification_is_delivered_by_sweep() {
    let h = TestHarness::new().await;
    let member = Uuid::new_v4();
    h.subscribe(member, "https://push.example/device-1").await;

    let at = h.clock.now() + Duration::hours(2);
    let intent = h
        .state
        .scheduler
        .schedule_custom(member, "Weekly fridge check", "Time to review your fridge", at)
        .await
        .unwrap();
    assert_eq!(intent.fridge_item_id, None);

    assert_eq!(h.state.scheduler.sweep().await.unwrap().claimed, 0);

    h.clock.set(at);
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(h.gateway.calls()[0].1.title, "Weekly fridge check");
}

#[tokio::test]
async fn test_custom_notification_requires_title() {
    let h = TestHarness::new().await;
    let result = h
        .state
        .scheduler
        .schedule_custom(Uuid::new_v4(), "  ", "body", h.clock.now())
        .await;
    assert!(matches!(result, Err(meateye_common::Error::Validation(_))));
}

#[tokio::test]
async fn test_sweep_processes_oldest_due_first_within_batch() {
    let config = meateye_fridge::FridgeConfig {
        sweep_batch_size: 2,
        ..Default::default()
    };
    let h = TestHarness::with_config(config).await;
    let member = Uuid::new_v4();

    let base = h.clock.now();
    for hours in [3, 1, 2] {
        h.state
            .scheduler
            .schedule_custom(member, &format!("reminder {}", hours), "", base + Duration::hours(hours))
            .await
            .unwrap();
    }

    h.clock.advance(Duration::hours(4));
    let report = h.state.scheduler.sweep().await.unwrap();
    assert_eq!(report.claimed, 2);

    let pending = h
        .state
        .scheduler
        .list_for_member(member, Some(NotificationStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].title, "reminder 3");
}
