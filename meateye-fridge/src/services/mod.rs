//! Services for meateye-fridge

pub mod delivery_gateway;
pub mod fridge_store;
pub mod ingestion;
pub mod item_locks;
pub mod notification_scheduler;
pub mod push_registry;
pub mod sweep_loop;
pub mod traceability_client;

pub use delivery_gateway::{DeliveryGateway, DeliveryOutcome, HttpPushRelay, PushMessage};
pub use fridge_store::{ConsumptionStats, FridgeItemUpdate, FridgeStore, ListFilter, NewFridgeItem};
pub use ingestion::{EnrichmentStatus, Ingestion, IngestionInput, IngestionOutcome};
pub use item_locks::ItemLocks;
pub use notification_scheduler::{
    NotificationScheduler, NotificationSummary, SchedulerSettings, SweepReport,
};
pub use push_registry::PushRegistry;
pub use sweep_loop::spawn_sweep_loop;
pub use traceability_client::{
    TraceEnricher, TraceError, TraceRecord, TraceabilityClient, TraceabilityLookup,
};
