//! Ingestion pipeline
//!
//! Takes the output of the recognition layer (a part label and/or a trace
//! number), resolves and enriches it, and stores a new fridge item.

use chrono::Days;
use meateye_common::db::{FridgeItem, TraceSnapshot};
use meateye_common::parts;
use meateye_common::{CanonicalPart, Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::fridge_store::{FridgeStore, NewFridgeItem, DEFAULT_ALERT_BEFORE};
use super::traceability_client::{normalize_trace_number, TraceEnricher, TraceError};

/// Recognition result plus optional user overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestionInput {
    #[serde(default)]
    pub raw_part_label: Option<String>,
    #[serde(default)]
    pub trace_number: Option<String>,
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub alert_before: Option<u32>,
    #[serde(default)]
    pub use_push: Option<bool>,
}

/// What became of the traceability lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Enriched,
    NotFound,
    Unavailable,
    /// No trace number supplied
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionOutcome {
    pub item: FridgeItem,
    pub part: Option<CanonicalPart>,
    pub enrichment: EnrichmentStatus,
}

pub struct Ingestion {
    store: Arc<FridgeStore>,
    enricher: Arc<TraceEnricher>,
    shelf_life_days: u32,
}

impl Ingestion {
    pub fn new(store: Arc<FridgeStore>, enricher: Arc<TraceEnricher>, shelf_life_days: u32) -> Self {
        Self {
            store,
            enricher,
            shelf_life_days,
        }
    }

    pub async fn ingest(&self, member_id: Uuid, input: IngestionInput) -> Result<IngestionOutcome> {
        let trace_number = match non_blank(input.trace_number.as_deref()) {
            Some(raw) => Some(
                normalize_trace_number(raw).map_err(|e| Error::Validation(e.to_string()))?,
            ),
            None => None,
        };

        let label = non_blank(input.raw_part_label.as_deref());
        let mut part = label.map(parts::resolve).and_then(|r| r.part());

        let (enrichment, trace) = match &trace_number {
            None => (EnrichmentStatus::Skipped, TraceSnapshot::default()),
            Some(number) => match self.enricher.enrich(number).await {
                Ok(record) => {
                    if part.is_none() {
                        part = record
                            .part_name
                            .as_deref()
                            .map(parts::resolve)
                            .and_then(|r| r.part());
                    }
                    (EnrichmentStatus::Enriched, TraceSnapshot::from(record))
                }
                Err(e) => {
                    let status = match e {
                        TraceError::NotFound(_) => EnrichmentStatus::NotFound,
                        _ => EnrichmentStatus::Unavailable,
                    };
                    warn!(trace_number = %number, error = %e, "Enrichment skipped, storing without registry data");
                    (
                        status,
                        TraceSnapshot {
                            trace_number: Some(number.clone()),
                            ..Default::default()
                        },
                    )
                }
            },
        };

        // An unrecognized label still names the item
        let custom_name = non_blank(input.custom_name.as_deref())
            .or(match part {
                None => label,
                Some(_) => None,
            })
            .map(str::to_string);

        if part.is_none() && custom_name.is_none() {
            return Err(Error::Validation(
                "Nothing to name the item by: no recognized part, label or custom name".to_string(),
            ));
        }

        let today = self.store.today();
        let expiry_date = today
            .checked_add_days(Days::new(u64::from(self.shelf_life_days)))
            .unwrap_or(today);

        debug!(
            member_id = %member_id,
            image_ref = input.image_ref.as_deref().unwrap_or("-"),
            resolved = ?part,
            "Ingesting recognition result"
        );

        let mut new_item = NewFridgeItem::new(today, expiry_date)
            .with_trace(trace)
            .with_alert_before(input.alert_before.unwrap_or(DEFAULT_ALERT_BEFORE))
            .with_use_push(input.use_push.unwrap_or(false));
        new_item.part = part;
        new_item.custom_name = custom_name;

        let item = self.store.create(member_id, new_item).await?;

        info!(
            item_id = %item.id,
            part = part.map(|p| p.as_str()).unwrap_or("unresolved"),
            enrichment = ?enrichment,
            "Ingestion complete"
        );

        Ok(IngestionOutcome {
            item,
            part,
            enrichment,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" Pork_Belly ")), Some("Pork_Belly"));
        assert_eq!(non_blank(None), None);
    }
}
