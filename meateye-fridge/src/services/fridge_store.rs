//! Fridge Item Store
//!
//! Owns the lifecycle of stored items: validation on create and edit, the
//! stored -> consumed transition, and the delete cascade onto notification
//! history. Expiry-relevant changes hand off to the scheduler; scheduling
//! errors are logged, never returned to the caller.

use chrono::NaiveDate;
use meateye_common::db::{FridgeItem, ItemStatus, TraceSnapshot};
use meateye_common::events::{EventBus, FridgeEvent};
use meateye_common::{CanonicalPart, Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::notification_scheduler::NotificationScheduler;
use crate::db::fridge_items::{self, DailyConsumption};
use crate::db::notifications;
use crate::utils::LockRetry;

pub const DEFAULT_ALERT_BEFORE: u32 = 3;

fn default_alert_before() -> u32 {
    DEFAULT_ALERT_BEFORE
}

/// Input for [`FridgeStore::create`]
#[derive(Debug, Clone, Deserialize)]
pub struct NewFridgeItem {
    #[serde(default)]
    pub part: Option<CanonicalPart>,
    #[serde(default)]
    pub custom_name: Option<String>,
    pub storage_date: NaiveDate,
    pub expiry_date: NaiveDate,
    #[serde(default)]
    pub desired_consumption_date: Option<NaiveDate>,
    #[serde(default)]
    pub trace: TraceSnapshot,
    #[serde(default = "default_alert_before")]
    pub alert_before: u32,
    #[serde(default)]
    pub use_push: bool,
}

impl NewFridgeItem {
    pub fn new(storage_date: NaiveDate, expiry_date: NaiveDate) -> Self {
        Self {
            part: None,
            custom_name: None,
            storage_date,
            expiry_date,
            desired_consumption_date: None,
            trace: TraceSnapshot::default(),
            alert_before: DEFAULT_ALERT_BEFORE,
            use_push: false,
        }
    }

    pub fn with_part(mut self, part: CanonicalPart) -> Self {
        self.part = Some(part);
        self
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    pub fn with_alert_before(mut self, days: u32) -> Self {
        self.alert_before = days;
        self
    }

    pub fn with_use_push(mut self, use_push: bool) -> Self {
        self.use_push = use_push;
        self
    }

    pub fn with_desired_consumption_date(mut self, date: NaiveDate) -> Self {
        self.desired_consumption_date = Some(date);
        self
    }

    pub fn with_trace(mut self, trace: TraceSnapshot) -> Self {
        self.trace = trace;
        self
    }
}

/// Partial edit; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FridgeItemUpdate {
    /// An empty string clears the custom name
    pub custom_name: Option<String>,
    pub alert_before: Option<u32>,
    pub use_push: Option<bool>,
    pub expiry_date: Option<NaiveDate>,
    /// `Some(None)` (JSON `null`) clears the date
    #[serde(default, deserialize_with = "present_or_null")]
    pub desired_consumption_date: Option<Option<NaiveDate>>,
    pub status: Option<ItemStatus>,
}

fn present_or_null<'de, D>(deserializer: D) -> std::result::Result<Option<Option<NaiveDate>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NaiveDate>::deserialize(deserializer).map(Some)
}

/// Member's storage history grouped by storage date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumptionStats {
    /// Newest storage date first
    pub days: Vec<DailyConsumption>,
    pub total_stored: i64,
    pub total_consumed: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListFilter {
    pub status: Option<ItemStatus>,
}

fn normalize_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Item invariants checked before every write
fn validate(item: &FridgeItem) -> Result<()> {
    if item.expiry_date < item.storage_date {
        return Err(Error::Validation(format!(
            "expiry_date {} is before storage_date {}",
            item.expiry_date, item.storage_date
        )));
    }
    if item.part.is_none() && item.custom_name.is_none() {
        return Err(Error::Validation(
            "An item needs a part or a custom name".to_string(),
        ));
    }
    if let Some(desired) = item.desired_consumption_date {
        if desired < item.storage_date {
            return Err(Error::Validation(format!(
                "desired_consumption_date {} is before storage_date {}",
                desired, item.storage_date
            )));
        }
    }
    Ok(())
}

/// Drop a slaughter date that postdates storage
fn sanitize_trace(mut trace: TraceSnapshot, storage_date: NaiveDate) -> TraceSnapshot {
    if let Some(slaughter_date) = trace.slaughter_date {
        if slaughter_date > storage_date {
            warn!(
                slaughter_date = %slaughter_date,
                storage_date = %storage_date,
                "Ignoring slaughter date later than storage date"
            );
            trace.slaughter_date = None;
        }
    }
    trace
}

pub struct FridgeStore {
    pool: SqlitePool,
    scheduler: Arc<NotificationScheduler>,
    events: EventBus,
    retry: LockRetry,
}

impl FridgeStore {
    pub fn new(pool: SqlitePool, scheduler: Arc<NotificationScheduler>, events: EventBus) -> Self {
        Self {
            pool,
            scheduler,
            events,
            retry: LockRetry::default(),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.scheduler.today()
    }

    pub async fn create(&self, member_id: Uuid, new_item: NewFridgeItem) -> Result<FridgeItem> {
        let now = self.scheduler.now();
        let item = FridgeItem {
            id: Uuid::new_v4(),
            member_id,
            part: new_item.part,
            custom_name: normalize_name(new_item.custom_name),
            storage_date: new_item.storage_date,
            expiry_date: new_item.expiry_date,
            desired_consumption_date: new_item.desired_consumption_date,
            trace: sanitize_trace(new_item.trace, new_item.storage_date),
            status: ItemStatus::Stored,
            alert_before: new_item.alert_before,
            use_push: new_item.use_push,
            created_at: now,
            updated_at: now,
        };
        validate(&item)?;

        self.retry
            .run("insert fridge item", || fridge_items::insert_item(&self.pool, &item))
            .await?;

        info!(
            item_id = %item.id,
            member_id = %member_id,
            name = %item.display_name(),
            expiry_date = %item.expiry_date,
            "Fridge item stored"
        );
        self.events.emit_lossy(FridgeEvent::ItemCreated {
            item_id: item.id,
            member_id,
            timestamp: now,
        });

        self.reschedule(item.id).await;
        Ok(item)
    }

    /// Fetch an item the caller owns
    pub async fn get(&self, item_id: Uuid, member_id: Uuid) -> Result<FridgeItem> {
        let item = fridge_items::get_item(&self.pool, item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Fridge item {}", item_id)))?;
        ensure_owner(&item, member_id)?;
        Ok(item)
    }

    pub async fn list(&self, member_id: Uuid, filter: ListFilter) -> Result<Vec<FridgeItem>> {
        fridge_items::list_items(&self.pool, member_id, filter.status).await
    }

    /// Stored vs consumed counts per storage date, with totals
    pub async fn consumption_stats(&self, member_id: Uuid) -> Result<ConsumptionStats> {
        let days = fridge_items::consumption_by_storage_date(&self.pool, member_id).await?;
        Ok(ConsumptionStats {
            total_stored: days.iter().map(|d| d.stored).sum(),
            total_consumed: days.iter().map(|d| d.consumed).sum(),
            days,
        })
    }

    /// Apply a partial edit
    ///
    /// `consumed` is terminal. Changing `alert_before` or `expiry_date`
    /// reschedules the item's alert; consuming it cancels the alert.
    pub async fn update(&self, item_id: Uuid, member_id: Uuid, changes: FridgeItemUpdate) -> Result<FridgeItem> {
        let (item, reschedule, consumed) = {
            let _guard = self.scheduler.locks().acquire(item_id).await;
            let mut item = self.get(item_id, member_id).await?;

            let mut reschedule = false;
            let mut consumed = false;

            if let Some(status) = changes.status {
                match (item.status, status) {
                    (ItemStatus::Consumed, ItemStatus::Stored) => {
                        return Err(Error::Validation("A consumed item cannot be restored".to_string()));
                    }
                    (ItemStatus::Stored, ItemStatus::Consumed) => {
                        item.status = ItemStatus::Consumed;
                        consumed = true;
                        reschedule = true;
                    }
                    _ => {}
                }
            }
            if let Some(name) = changes.custom_name {
                item.custom_name = normalize_name(Some(name));
            }
            if let Some(use_push) = changes.use_push {
                item.use_push = use_push;
            }
            if let Some(alert_before) = changes.alert_before {
                reschedule |= alert_before != item.alert_before;
                item.alert_before = alert_before;
            }
            if let Some(expiry_date) = changes.expiry_date {
                reschedule |= expiry_date != item.expiry_date;
                item.expiry_date = expiry_date;
            }
            if let Some(desired) = changes.desired_consumption_date {
                item.desired_consumption_date = desired;
            }

            validate(&item)?;
            item.updated_at = self.scheduler.now();
            self.write(&item).await?;
            (item, reschedule, consumed)
        };

        let event = if consumed {
            info!(item_id = %item_id, "Fridge item consumed");
            FridgeEvent::ItemConsumed {
                item_id,
                member_id,
                timestamp: item.updated_at,
            }
        } else {
            FridgeEvent::ItemUpdated {
                item_id,
                member_id,
                timestamp: item.updated_at,
            }
        };
        self.events.emit_lossy(event);

        if reschedule {
            self.reschedule(item_id).await;
        }
        Ok(item)
    }

    /// Replace the traceability snapshot after a re-enrichment
    pub async fn apply_trace_snapshot(
        &self,
        item_id: Uuid,
        member_id: Uuid,
        snapshot: TraceSnapshot,
    ) -> Result<FridgeItem> {
        let item = {
            let _guard = self.scheduler.locks().acquire(item_id).await;
            let mut item = self.get(item_id, member_id).await?;
            item.trace = sanitize_trace(snapshot, item.storage_date);
            item.updated_at = self.scheduler.now();
            self.write(&item).await?;
            item
        };

        self.events.emit_lossy(FridgeEvent::ItemUpdated {
            item_id,
            member_id,
            timestamp: item.updated_at,
        });
        Ok(item)
    }

    /// Delete an item
    ///
    /// Live intents are cancelled and every intent keeps its row with the item
    /// reference cleared.
    pub async fn delete(&self, item_id: Uuid, member_id: Uuid) -> Result<()> {
        let _guard = self.scheduler.locks().acquire(item_id).await;
        self.get(item_id, member_id).await?;

        let (cancelled, detached) = self.retry.run("delete fridge item", || async {
            let mut tx = self.pool.begin().await?;
            let cancelled = notifications::cancel_all_live_for_item(&mut *tx, item_id).await?;
            let detached = notifications::detach_item(&mut *tx, item_id).await?;
            fridge_items::delete_item(&mut *tx, item_id).await?;
            tx.commit().await?;
            Ok::<_, Error>((cancelled, detached))
        })
        .await?;

        info!(
            item_id = %item_id,
            member_id = %member_id,
            cancelled_notifications = cancelled,
            detached_notifications = detached,
            "Fridge item deleted"
        );
        self.events.emit_lossy(FridgeEvent::ItemDeleted {
            item_id,
            member_id,
            timestamp: self.scheduler.now(),
        });
        Ok(())
    }

    async fn write(&self, item: &FridgeItem) -> Result<()> {
        let updated = self
            .retry
            .run("update fridge item", || fridge_items::update_item(&self.pool, item))
            .await?;
        if !updated {
            return Err(Error::NotFound(format!("Fridge item {}", item.id)));
        }
        Ok(())
    }

    async fn reschedule(&self, item_id: Uuid) {
        if let Err(e) = self.scheduler.recompute(item_id).await {
            warn!(item_id = %item_id, error = %e, "Failed to recompute expiry alert");
        }
    }
}

fn ensure_owner(item: &FridgeItem, member_id: Uuid) -> Result<()> {
    if item.member_id != member_id {
        return Err(Error::Forbidden(format!("Fridge item {} belongs to another member", item.id)));
    }
    Ok(())
}
