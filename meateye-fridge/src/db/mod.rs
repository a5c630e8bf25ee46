//! Database access for meateye-fridge
//!
//! Query functions take any SQLite executor so the same code runs against
//! the pool or inside a transaction (`&mut *tx`).

pub mod fridge_items;
pub mod notifications;
pub mod subscriptions;

use meateye_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}
