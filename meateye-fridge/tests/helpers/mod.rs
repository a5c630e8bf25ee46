//! Test Helper Utilities
//!
//! Temporary database, manual clock and fake collaborators for the
//! meateye-fridge integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use meateye_common::db::PushSubscription;
use meateye_common::events::EventBus;
use meateye_common::time::local_date;
use meateye_common::{Clock, ManualClock};
use meateye_fridge::services::{
    DeliveryGateway, DeliveryOutcome, PushMessage, TraceError, TraceRecord, TraceabilityLookup,
};
use meateye_fridge::{AppState, FridgeConfig};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// 2026-10-19 12:00 KST
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap()
}

/// Gateway that records every call and answers per endpoint (default: delivered)
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<(String, PushMessage)>>,
    outcomes: Mutex<HashMap<String, DeliveryOutcome>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl RecordingGateway {
    pub fn set_outcome(&self, endpoint: &str, outcome: DeliveryOutcome) {
        self.outcomes.lock().unwrap().insert(endpoint.to_string(), outcome);
    }

    /// Stall every send for `delay` before answering
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<(String, PushMessage)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(e, _)| e == endpoint).count()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn send(&self, subscription: &PushSubscription, message: &PushMessage) -> DeliveryOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((subscription.endpoint.clone(), message.clone()));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .get(&subscription.endpoint)
            .cloned()
            .unwrap_or(DeliveryOutcome::Delivered)
    }
}

/// Registry stand-in keyed by normalized trace number (default: not found)
#[derive(Default)]
pub struct FakeLookup {
    records: Mutex<HashMap<String, Result<TraceRecord, TraceError>>>,
}

impl FakeLookup {
    pub fn insert(&self, trace_number: &str, result: Result<TraceRecord, TraceError>) {
        self.records.lock().unwrap().insert(trace_number.to_string(), result);
    }
}

#[async_trait]
impl TraceabilityLookup for FakeLookup {
    async fn lookup(&self, trace_number: &str) -> Result<TraceRecord, TraceError> {
        self.records
            .lock()
            .unwrap()
            .get(trace_number)
            .cloned()
            .unwrap_or_else(|| Err(TraceError::NotFound(trace_number.to_string())))
    }
}

/// Everything a test needs; keep it alive for the duration of the test
pub struct TestHarness {
    _temp_dir: TempDir,
    pub pool: SqlitePool,
    pub clock: ManualClock,
    pub gateway: Arc<RecordingGateway>,
    pub lookup: Arc<FakeLookup>,
    pub state: AppState,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(FridgeConfig::default()).await
    }

    pub async fn with_config(config: FridgeConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = meateye_common::db::init_database(&temp_dir.path().join("test_meateye.db"))
            .await
            .expect("Failed to initialize database");

        let clock = ManualClock::new(start_time());
        let gateway = Arc::new(RecordingGateway::default());
        let lookup = Arc::new(FakeLookup::default());

        let state = AppState::new(
            pool.clone(),
            EventBus::default(),
            Arc::new(clock.clone()),
            lookup.clone(),
            gateway.clone(),
            &config,
        );

        Self {
            _temp_dir: temp_dir,
            pool,
            clock,
            gateway,
            lookup,
            state,
        }
    }

    pub fn today(&self) -> NaiveDate {
        local_date(self.clock.now(), self.state.scheduler.settings().utc_offset)
    }

    pub fn days_from_today(&self, days: i64) -> NaiveDate {
        self.today() + chrono::Duration::days(days)
    }

    /// Register a push endpoint for `member_id`
    pub async fn subscribe(&self, member_id: uuid::Uuid, endpoint: &str) -> PushSubscription {
        self.state
            .push_registry
            .register(member_id, endpoint, "p256dh-key", "auth-key", Some("test-agent"))
            .await
            .expect("Failed to register subscription")
    }
}
