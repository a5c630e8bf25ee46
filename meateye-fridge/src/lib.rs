//! meateye-fridge library interface
//!
//! Fridge item lifecycle, expiry alert scheduling and delivery for Meat-A-Eye.
//! Exposed as a library so integration tests can drive the services and the
//! router directly.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::config::FridgeConfig;
pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use meateye_common::events::EventBus;
use meateye_common::Clock;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::services::{
    DeliveryGateway, FridgeStore, Ingestion, NotificationScheduler, PushRegistry, TraceEnricher,
    TraceabilityLookup,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    pub store: Arc<FridgeStore>,
    pub scheduler: Arc<NotificationScheduler>,
    pub ingestion: Arc<Ingestion>,
    pub push_registry: Arc<PushRegistry>,
    /// Default expiry offset for items entered without an expiry date
    pub shelf_life_days: u32,
    pub clock: Arc<dyn Clock>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the services around a database and the two external collaborators
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
        lookup: Arc<dyn TraceabilityLookup>,
        gateway: Arc<dyn DeliveryGateway>,
        config: &FridgeConfig,
    ) -> Self {
        let scheduler = Arc::new(NotificationScheduler::new(
            db.clone(),
            clock.clone(),
            gateway,
            event_bus.clone(),
            config.scheduler_settings(),
        ));
        let store = Arc::new(FridgeStore::new(db.clone(), scheduler.clone(), event_bus.clone()));
        let enricher = Arc::new(TraceEnricher::new(lookup, config.traceability_timeout()));
        let ingestion = Arc::new(Ingestion::new(
            store.clone(),
            enricher,
            config.default_shelf_life_days,
        ));
        let push_registry = Arc::new(PushRegistry::new(db.clone(), clock.clone()));

        Self {
            db,
            event_bus,
            store,
            scheduler,
            ingestion,
            push_registry,
            shelf_life_days: config.default_shelf_life_days,
            startup_time: clock.now(),
            clock,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::fridge_routes())
        .merge(api::notification_routes())
        .merge(api::push_routes())
        .merge(api::part_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
