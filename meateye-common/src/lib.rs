//! # Meat-A-Eye Common Library
//!
//! Shared code for the Meat-A-Eye services including:
//! - Database schema and row models
//! - Canonical meat part table and label resolution
//! - Event types (FridgeEvent enum) and the EventBus
//! - Configuration file and root folder resolution
//! - Injectable clock

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod parts;
pub mod time;

pub use error::{Error, Result};
pub use parts::{CanonicalPart, PartResolution, Species};
pub use time::{Clock, ManualClock, SystemClock};
